//! Shared, read-only compile-time state: options, command DB, model
//! registry, and the process-wide diagnostic sink. Constructed once before
//! any job begins, then shared by `Arc` across worker threads (see
//! [`crate::job`]).

use crate::command_db::CommandDatabase;
use crate::diagnostics::DiagnosticSink;
use crate::model_registry::ModelRegistry;
use crate::options::Options;
use crate::symbol_table::ScriptNameRegistry;
use std::sync::{Arc, Mutex};

pub struct ProgramContext {
    pub options: Options,
    pub command_db: CommandDatabase,
    pub model_registry: ModelRegistry,
    pub diagnostics: Arc<DiagnosticSink>,
    /// The only piece of program-wide *mutable* state besides the
    /// diagnostic counters: `SCRIPT_NAME` uniqueness spans every job.
    pub script_names: Mutex<ScriptNameRegistry>,
}

impl ProgramContext {
    pub fn new(options: Options, command_db: CommandDatabase, model_registry: ModelRegistry) -> Arc<Self> {
        Arc::new(ProgramContext {
            options,
            command_db,
            model_registry,
            diagnostics: DiagnosticSink::new(),
            script_names: Mutex::new(ScriptNameRegistry::new()),
        })
    }
}
