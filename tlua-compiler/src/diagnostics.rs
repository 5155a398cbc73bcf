use std::fmt;

use crate::ast::SourceSpan;

/// The checker's two-level split: errors block emission, warnings
/// (shadowing, interface redeclaration, tolerated-but-suspicious
/// assignments) do not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// Every diagnostic is anchored to a source range. The message may span
/// several lines when it carries an assignability crumb chain; the CLI
/// prints it as-is.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub span: SourceSpan,
}

impl Diagnostic {
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(
            f,
            "{}:{}: {}: {}",
            self.span.line, self.span.column, severity, self.message
        )
    }
}

/// Ordered log of everything a checking session reported. Phases append
/// and keep going; nothing recorded here stops the pass.
#[derive(Debug, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn error<S: Into<String>>(&mut self, message: S, span: SourceSpan) {
        self.entries.push(Diagnostic {
            severity: Severity::Error,
            message: message.into(),
            span,
        });
    }

    pub fn warning<S: Into<String>>(&mut self, message: S, span: SourceSpan) {
        self.entries.push(Diagnostic {
            severity: Severity::Warning,
            message: message.into(),
            span,
        });
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.entries.extend(other.entries);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        self.entries.iter().any(Diagnostic::is_error)
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }
}
