//! Compile-time configuration: a plain record of typed fields, deliberately
//! *not* a type-erased any-map (see `SPEC_FULL.md` §9 "type-erased option
//! payloads" design note). Built once, shared read-only by every job.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderVersion {
    /// GTA III / "Liberty"
    Gta3,
    /// GTA Vice City / "Miami"
    GtaVc,
    /// GTA San Andreas / "SanAndreas"
    GtaSa,
}

impl fmt::Display for HeaderVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HeaderVersion::Gta3 => "gta3",
            HeaderVersion::GtaVc => "gtavc",
            HeaderVersion::GtaSa => "gtasa",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for HeaderVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gta3" => Ok(HeaderVersion::Gta3),
            "gtavc" => Ok(HeaderVersion::GtaVc),
            "gtasa" => Ok(HeaderVersion::GtaSa),
            other => Err(format!("unknown config: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitTarget {
    Binary,
    Ir2,
}

/// Chosen output surface: emit nothing (`-fsyntax-only`), IR2 text, or a
/// binary `.scm`/CLEO file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitMode {
    SyntaxOnly,
    Emit(EmitTarget),
}

#[derive(Debug, Clone)]
pub struct Options {
    pub config: HeaderVersion,
    pub guesser: bool,
    pub pedantic: bool,
    pub emit: EmitMode,
    pub switch_statements: bool,
    pub arrays: bool,
    pub scope_then_label: bool,
    pub cleo_version: Option<u32>,
    pub headerless: bool,
    pub streamed_scripts: bool,

    // Analyzer behaviors referenced throughout SPEC_FULL §4.2-4.4.
    pub entity_tracking: bool,
    pub allow_break_continue: bool,
    pub script_name_check: bool,
    pub skip_single_ifs: bool,
    pub text_label_vars: bool,
    pub relax_not: bool,
    pub use_local_offsets: bool,
    pub switch_case_limit: Option<usize>,

    /// Variable layout, derived from `config` unless overridden.
    pub mission_var_begin: u32,
    pub local_var_limit: u32,
    pub mission_var_limit: u32,
}

impl Default for Options {
    fn default() -> Self {
        Options::for_config(HeaderVersion::GtaSa)
    }
}

impl Options {
    /// Produces the option set a bare `--config=X` invocation would
    /// produce, before any further flags are layered on top.
    pub fn for_config(config: HeaderVersion) -> Self {
        let (mission_var_begin, local_var_limit, mission_var_limit) = match config {
            HeaderVersion::Gta3 => (16, 16, 32),
            HeaderVersion::GtaVc => (16, 16, 32),
            HeaderVersion::GtaSa => (32, 32, 64),
        };
        Options {
            config,
            guesser: false,
            pedantic: false,
            emit: EmitMode::Emit(EmitTarget::Binary),
            switch_statements: matches!(config, HeaderVersion::GtaSa),
            arrays: matches!(config, HeaderVersion::GtaSa),
            scope_then_label: false,
            cleo_version: None,
            headerless: false,
            streamed_scripts: matches!(config, HeaderVersion::GtaSa),
            entity_tracking: true,
            allow_break_continue: true,
            script_name_check: true,
            skip_single_ifs: true,
            text_label_vars: matches!(config, HeaderVersion::GtaSa),
            relax_not: false,
            use_local_offsets: matches!(config, HeaderVersion::GtaSa),
            switch_case_limit: None,
            mission_var_begin,
            local_var_limit,
            mission_var_limit,
        }
    }
}
