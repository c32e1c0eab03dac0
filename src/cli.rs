//! Command-line surface. Mirrors the options table in `SPEC_FULL.md` §6;
//! [`Cli::into_options`] lowers the parsed flags into the plain [`Options`]
//! record every pass actually reads.

use crate::options::{EmitMode, EmitTarget, HeaderVersion, Options};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "gta3sc", about = "Compiler and decompiler for GTA3script", version)]
pub struct Cli {
    /// Source scripts to compile.
    pub inputs: Vec<PathBuf>,

    /// Path to the XML command database.
    #[arg(long)]
    pub command_db: PathBuf,

    /// Target game: gta3, gtavc, or gtasa.
    #[arg(long, default_value = "gtasa")]
    pub config: HeaderVersion,

    /// Infer variable types from first use instead of requiring a
    /// declaration.
    #[arg(long)]
    pub guesser: bool,

    /// Escalate nonstandard usage (e.g. unsupported commands) to errors
    /// instead of fatal diagnostics.
    #[arg(long)]
    pub pedantic: bool,

    /// Emit textual IR2 instead of a binary .scm.
    #[arg(long = "emit-ir2")]
    pub emit_ir2: bool,

    /// Parse and analyze only; write no output.
    #[arg(long = "fsyntax-only")]
    pub syntax_only: bool,

    /// Enable the SWITCH statement.
    #[arg(long = "fswitch")]
    pub switch: bool,

    /// Enable array syntax.
    #[arg(long = "farrays")]
    pub arrays: bool,

    /// Place a freshly opened scope's labels ahead of the scope itself.
    #[arg(long = "fscope-then-label")]
    pub scope_then_label: bool,

    /// Emit CLEO-format output, optionally pinned to version N.
    #[arg(long, value_name = "N", num_args = 0..=1, default_missing_value = "1", require_equals = true)]
    pub cleo: Option<u32>,

    /// Omit the .scm header entirely.
    #[arg(long)]
    pub headerless: bool,

    /// Emit the streamed-script table (San Andreas only).
    #[arg(long = "streamed-scripts")]
    pub streamed_scripts: bool,

    /// Predefine a preprocessor symbol: `-D SYM` or `-D SYM=VAL`.
    #[arg(short = 'D', value_name = "SYM[=VAL]")]
    pub defines: Vec<String>,

    /// Directory level-specific IDE/DAT model tables are loaded from.
    #[arg(long)]
    pub models: Vec<PathBuf>,

    /// Output file or directory; defaults next to each input.
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl Cli {
    pub fn into_options(&self) -> Options {
        let mut options = Options::for_config(self.config);
        options.guesser = self.guesser;
        options.pedantic = self.pedantic;
        options.emit = if self.syntax_only {
            EmitMode::SyntaxOnly
        } else if self.emit_ir2 {
            EmitMode::Emit(EmitTarget::Ir2)
        } else {
            EmitMode::Emit(EmitTarget::Binary)
        };
        if self.switch {
            options.switch_statements = true;
        }
        if self.arrays {
            options.arrays = true;
        }
        if self.scope_then_label {
            options.scope_then_label = true;
        }
        options.cleo_version = self.cleo;
        options.headerless = self.headerless;
        if self.streamed_scripts {
            options.streamed_scripts = true;
        }
        options
    }
}
