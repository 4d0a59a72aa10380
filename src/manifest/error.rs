//! Manifest error types

use crate::document::DocumentError;

/// Errors from reading or rewriting a service manifest.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ManifestError {
    #[error("Invalid manifest: {0}")]
    InvalidDocument(#[from] DocumentError),

    #[error("Service '{service}' does not match a known schema: {reason}")]
    Schema { service: String, reason: String },

    #[error("Service '{service}' is declared more than once")]
    DuplicateService { service: String },
}

impl ManifestError {
    pub(crate) fn schema(service: impl Into<String>, reason: impl Into<String>) -> Self {
        ManifestError::Schema {
            service: service.into(),
            reason: reason.into(),
        }
    }

    /// Name of the service the error is about, if any.
    pub fn service(&self) -> Option<&str> {
        match self {
            ManifestError::Schema { service, .. } | ManifestError::DuplicateService { service } => {
                Some(service)
            }
            ManifestError::InvalidDocument(_) => None,
        }
    }
}
