use super::NodeKind;
use thiserror::Error;

/// Errors raised while reading or editing a document tree.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DocumentError {
    #[error("Invalid document at line {line}: {reason}")]
    Syntax { line: usize, reason: String },

    #[error("Document is not valid UTF-8: {0}")]
    Encoding(String),

    #[error("Document has no content")]
    Empty,

    #[error("Unexpected document shape: {reason}")]
    Shape { reason: String },

    #[error("Expected a {expected} node, found a {found} node")]
    WrongKind { expected: NodeKind, found: NodeKind },
}

impl DocumentError {
    pub(crate) fn syntax(line: usize, reason: impl Into<String>) -> Self {
        DocumentError::Syntax {
            line,
            reason: reason.into(),
        }
    }

    pub(crate) fn shape(reason: impl Into<String>) -> Self {
        DocumentError::Shape {
            reason: reason.into(),
        }
    }

    /// 1-based line number for syntax errors.
    pub fn line(&self) -> Option<usize> {
        match self {
            DocumentError::Syntax { line, .. } => Some(*line),
            _ => None,
        }
    }
}
