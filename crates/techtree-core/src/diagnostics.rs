//! Unified diagnostics.
//!
//! Every failure in the pipeline is non-fatal for the load as a whole: it
//! becomes a [`Diagnostic`] queued on the catalog or registry and drained by
//! the caller. Each stage keeps its own error enum; [`DiagnosticKind`] wraps
//! them so a load can report one flat list.

use crate::graph::GraphError;
use crate::registry::IngestError;
use crate::resolve::ResolutionError;
use serde::{Deserialize, Serialize};
use std::fmt;
use techtree_script::{LexError, ParseError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => f.write_str("warning"),
            Severity::Error => f.write_str("error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DiagnosticKind {
    #[error("lex error: {0}")]
    Lex(#[from] LexError),

    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("resolution error: {0}")]
    Resolution(#[from] ResolutionError),

    #[error("ingest error: {0}")]
    Ingest(#[from] IngestError),

    #[error("graph error: {0}")]
    Graph(#[from] GraphError),
}

impl DiagnosticKind {
    /// Lex and parse failures lose data; everything else falls back.
    pub fn severity(&self) -> Severity {
        match self {
            DiagnosticKind::Lex(_) | DiagnosticKind::Parse(_) => Severity::Error,
            DiagnosticKind::Resolution(_)
            | DiagnosticKind::Ingest(_)
            | DiagnosticKind::Graph(_) => Severity::Warning,
        }
    }
}

/// One problem, attributed to the file it came from when known.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub file: Option<String>,
    pub kind: DiagnosticKind,
}

impl Diagnostic {
    pub fn new(file: Option<String>, kind: impl Into<DiagnosticKind>) -> Self {
        Self {
            file,
            kind: kind.into(),
        }
    }

    pub fn in_file(file: impl Into<String>, kind: impl Into<DiagnosticKind>) -> Self {
        Self::new(Some(file.into()), kind)
    }

    pub fn severity(&self) -> Severity {
        self.kind.severity()
    }

    pub fn is_error(&self) -> bool {
        self.severity() == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.file {
            Some(file) => write!(f, "{}: {file}: {}", self.severity(), self.kind),
            None => write!(f, "{}: {}", self.severity(), self.kind),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lex_errors_are_errors() {
        let d = Diagnostic::in_file(
            "a.txt",
            LexError::UnterminatedString { offset: 4, line: 2 },
        );
        assert_eq!(d.severity(), Severity::Error);
        assert!(d.is_error());
        assert!(d.to_string().starts_with("error: a.txt: lex error"));
    }

    #[test]
    fn ingest_errors_are_warnings() {
        let d = Diagnostic::new(None, IngestError::EmptyId);
        assert_eq!(d.severity(), Severity::Warning);
        assert!(d.to_string().starts_with("warning: ingest error"));
    }

    #[test]
    fn severity_orders_errors_last() {
        assert!(Severity::Error > Severity::Warning);
    }
}
