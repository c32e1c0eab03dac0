//! Diagnostic accumulation and formatting.
//!
//! A process-wide [`DiagnosticSink`] counts errors/warnings/fatals atomically
//! (shared across worker threads, see [`crate::job`]) while each diagnostic
//! carries an explicit, tagged location context rather than a type-erased
//! payload.

use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// A single point (or none) a diagnostic can be anchored to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub file: PathBuf,
    pub line: u32,
    pub column: u32,
    pub source_line: String,
}

/// Where a diagnostic originated, modeled as a tagged variant rather than an
/// any-typed context object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticContext {
    Token(SourceLocation),
    Script(String),
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DiagnosticKind {
    Note,
    Warning,
    Error,
    Fatal,
    Internal,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DiagnosticKind::Note => "note",
            DiagnosticKind::Warning => "warning",
            DiagnosticKind::Error => "error",
            DiagnosticKind::Fatal => "fatal error",
            DiagnosticKind::Internal => "internal error",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub context: DiagnosticContext,
    pub message: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, context: DiagnosticContext, message: impl Into<String>) -> Self {
        Diagnostic {
            kind,
            context,
            message: message.into(),
        }
    }

    pub fn note(message: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::Note, DiagnosticContext::None, message)
    }

    pub fn error_at(loc: SourceLocation, message: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::Error, DiagnosticContext::Token(loc), message)
    }

    pub fn fatal_at(loc: SourceLocation, message: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::Fatal, DiagnosticContext::Token(loc), message)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.context {
            DiagnosticContext::Token(loc) => {
                writeln!(
                    f,
                    "{}:{}:{}: {}: {}",
                    loc.file.display(),
                    loc.line,
                    loc.column,
                    self.kind,
                    self.message
                )?;
                writeln!(f, " {}", loc.source_line)?;
                let caret_offset = loc.column.saturating_sub(1) as usize;
                write!(f, " {}^", " ".repeat(caret_offset))
            }
            DiagnosticContext::Script(script) => {
                write!(f, "{}: {}: {}", script, self.kind, self.message)
            }
            DiagnosticContext::None => {
                write!(f, "{}: {}", self.kind, self.message)
            }
        }
    }
}

/// Job was aborted by a fatal diagnostic. Carries no payload: the fatal
/// itself was already recorded into the sink before this was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Halted;

impl fmt::Display for Halted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("compilation halted after a fatal diagnostic")
    }
}

impl std::error::Error for Halted {}

/// Soft cutoff for the open question in the spec's design notes: after this
/// many accumulated error+fatal diagnostics, stop the job rather than
/// flooding the user with cascades.
pub const MAX_DIAGNOSTICS: usize = 100;

/// Process-wide (or job-wide, when jobs run in parallel workers) diagnostic
/// counters, shared by reference so every pass can report without threading
/// a `&mut` sink through the whole pipeline.
#[derive(Debug, Default)]
pub struct DiagnosticSink {
    errors: AtomicU32,
    warnings: AtomicU32,
    fatals: AtomicU32,
    notes: AtomicU32,
}

impl DiagnosticSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Records a diagnostic, printing it and bumping the relevant counter.
    /// Returns `Err(Halted)` if the diagnostic is fatal, or if the
    /// accumulated error+fatal count has crossed [`MAX_DIAGNOSTICS`].
    pub fn report(&self, diagnostic: &Diagnostic) -> Result<(), Halted> {
        eprintln!("{diagnostic}");
        match diagnostic.kind {
            DiagnosticKind::Note => {
                self.notes.fetch_add(1, Ordering::Relaxed);
            }
            DiagnosticKind::Warning => {
                self.warnings.fetch_add(1, Ordering::Relaxed);
            }
            DiagnosticKind::Error => {
                self.errors.fetch_add(1, Ordering::Relaxed);
            }
            DiagnosticKind::Fatal => {
                self.fatals.fetch_add(1, Ordering::Relaxed);
                return Err(Halted);
            }
            DiagnosticKind::Internal => {
                self.errors.fetch_add(1, Ordering::Relaxed);
                return Err(Halted);
            }
        }
        if self.blocking_count() >= MAX_DIAGNOSTICS {
            eprintln!(
                "{}",
                Diagnostic::new(
                    DiagnosticKind::Internal,
                    DiagnosticContext::None,
                    format!("too many errors, stopping after {MAX_DIAGNOSTICS}"),
                )
            );
            self.fatals.fetch_add(1, Ordering::Relaxed);
            return Err(Halted);
        }
        Ok(())
    }

    pub fn error_count(&self) -> u32 {
        self.errors.load(Ordering::Relaxed)
    }

    pub fn warning_count(&self) -> u32 {
        self.warnings.load(Ordering::Relaxed)
    }

    pub fn fatal_count(&self) -> u32 {
        self.fatals.load(Ordering::Relaxed)
    }

    fn blocking_count(&self) -> usize {
        (self.error_count() + self.fatal_count()) as usize
    }

    /// Whether output should be suppressed: `error_count + fatal_count > 0`.
    pub fn has_failed(&self) -> bool {
        self.blocking_count() > 0
    }
}
