//! The parallel-workers-over-independent-translation-units scheduler:
//! every input script is one job; jobs run on a plain `std::thread` pool
//! and share only the read-only [`ProgramContext`] and its atomic
//! diagnostic counters.

use crate::codegen::{binary, ir2};
use crate::context::ProgramContext;
use crate::options::{EmitMode, EmitTarget};
use crate::{lower, parser, sema};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

#[derive(Debug, Clone, PartialEq)]
pub enum JobOutput {
    Binary(Vec<u8>),
    Ir2(String),
    None,
}

pub struct JobResult {
    pub path: PathBuf,
    pub output: Option<JobOutput>,
}

/// Compiles every script in `paths`, one job per script, across a fixed
/// pool of worker threads. Returns one [`JobResult`] per input, in
/// completion order (not necessarily input order: jobs run in parallel).
pub fn run_jobs(ctx: Arc<ProgramContext>, paths: Vec<PathBuf>) -> Vec<JobResult> {
    let worker_count = thread::available_parallelism().map(|n| n.get()).unwrap_or(1).min(paths.len().max(1));
    let (work_tx, work_rx) = mpsc::channel::<PathBuf>();
    let work_rx = Arc::new(std::sync::Mutex::new(work_rx));
    let (result_tx, result_rx) = mpsc::channel::<JobResult>();

    for path in paths.iter().cloned() {
        work_tx.send(path).expect("work channel receiver outlives every sender");
    }
    drop(work_tx);

    let mut handles = Vec::with_capacity(worker_count);
    for _ in 0..worker_count {
        let ctx = Arc::clone(&ctx);
        let work_rx = Arc::clone(&work_rx);
        let result_tx = result_tx.clone();
        handles.push(thread::spawn(move || loop {
            let next = work_rx.lock().expect("work queue poisoned").recv();
            let Ok(path) = next else { break };
            let output = run_one_job(&ctx, &path);
            let _ = result_tx.send(JobResult { path, output });
        }));
    }
    drop(result_tx);

    let mut results: Vec<JobResult> = result_rx.into_iter().collect();
    for handle in handles {
        let _ = handle.join();
    }
    results.sort_by(|a, b| a.path.cmp(&b.path));
    results
}

/// Compiles one script. A fatal diagnostic (from parsing or analysis)
/// unwinds this function by short-circuiting to `None`; other jobs are
/// unaffected since every thread only touches this job's own state plus
/// the shared, read-only [`ProgramContext`].
fn run_one_job(ctx: &ProgramContext, path: &Path) -> Option<JobOutput> {
    let source = std::fs::read_to_string(path)
        .inspect_err(|e| log::warn!("{}: failed to read: {e}", path.display()))
        .ok()?;
    let script_name = path.file_stem().and_then(|s| s.to_str()).unwrap_or("script").to_string();

    let script = match parser::parse_script(&script_name, &source) {
        Ok(script) => script,
        Err(err) => {
            log::error!("{}: {err}", path.display());
            return None;
        }
    };

    let analysis = sema::analyze(ctx, path, &source, &script).ok()?;
    lower_and_emit(ctx, &script_name, &analysis.symbols, &script)
}

fn lower_and_emit(
    ctx: &ProgramContext,
    script_name: &str,
    symbols: &crate::symbol_table::SymbolTable,
    script: &crate::ast::Script,
) -> Option<JobOutput> {
    match ctx.options.emit {
        EmitMode::SyntaxOnly => Some(JobOutput::None),
        EmitMode::Emit(EmitTarget::Ir2) => {
            let items = lower::lower(script_name, symbols, script, &ctx.options);
            Some(JobOutput::Ir2(ir2::emit(&items)))
        }
        EmitMode::Emit(EmitTarget::Binary) => {
            let items = lower::lower(script_name, symbols, script, &ctx.options);
            match binary::emit(&items, &ctx.command_db, ctx.options.relax_not, ctx.options.use_local_offsets) {
                Ok(bytes) => Some(JobOutput::Binary(bytes)),
                Err(err) => {
                    log::error!("{script_name}: {err}");
                    None
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command_db::CommandDatabase;
    use crate::model_registry::ModelRegistry;
    use crate::options::Options;
    use std::io::Write;

    fn write_script(dir: &std::path::Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn syntax_only_jobs_produce_no_output() {
        let dir = std::env::temp_dir().join(format!("gta3sc-job-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = write_script(&dir, "main.sc", "WAIT 0\n");

        let mut options = Options::default();
        options.emit = EmitMode::SyntaxOnly;
        let mut db = CommandDatabase::new(false);
        db.insert_command(crate::command_db::Command {
            name: "WAIT".to_string(),
            opcode: 1,
            supported: true,
            params: vec![crate::command_db::ParamDesc::new(crate::command_db::ParamKind::Int32)],
            entity_type: None,
            is_keyword: false,
            is_terminator: false,
        });
        let ctx = ProgramContext::new(options, db, ModelRegistry::new());

        let results = run_jobs(ctx, vec![path]);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].output, Some(JobOutput::None));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
