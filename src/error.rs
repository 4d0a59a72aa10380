use crate::document::DocumentError;
use crate::manifest::ManifestError;
use crate::transport::FetchError;
use thiserror::Error;

/// Structured error context for better error handling and debugging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// Field path or configuration key that caused the error (e.g., "services[2].pattern", "platforms.web")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., expected type, actual value)
    pub details: Option<String>,
    /// Source of the error (e.g., "config_loader", "mapping_table")
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self {
            field_path: None,
            details: None,
            source: None,
        }
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Unified error type for pinsync.
/// Each layer keeps its own error enum; this aggregates them.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Manifest error: {0}")]
    Manifest(#[from] ManifestError),

    #[error("Document error: {0}")]
    Document(#[from] DocumentError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// A fan-out step failed. `source` is the first concrete failure in
    /// dispatch order.
    #[error("Reconciliation failed during {operation} ({subject}): {source}")]
    Reconciliation {
        operation: String,
        subject: String,
        #[source]
        source: Box<Error>,
    },

    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("Runtime error: {message}{}", format_context(.context))]
    Runtime {
        message: String,
        context: ErrorContext,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

// Helper function to format error context for display
fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref field) = ctx.field_path {
        parts.push(format!("field: {}", field));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

impl Error {
    /// Create a new runtime error with structured context
    pub fn runtime_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Runtime {
            message: msg.into(),
            context,
        }
    }

    /// Create a new configuration error with structured context
    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    /// Wrap `source` as the failure of one reconciliation step.
    pub fn reconciliation(
        operation: impl Into<String>,
        subject: impl Into<String>,
        source: impl Into<Error>,
    ) -> Self {
        Error::Reconciliation {
            operation: operation.into(),
            subject: subject.into(),
            source: Box::new(source.into()),
        }
    }

    /// Extract error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::Configuration { context, .. } | Error::Runtime { context, .. } => Some(context),
            _ => None,
        }
    }

    /// The innermost error, looking through reconciliation wrappers.
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::Reconciliation { source, .. } => source.root_cause(),
            other => other,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.root_cause(), Error::Fetch(e) if e.is_not_found())
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.root_cause(), Error::Fetch(FetchError::Cancelled))
    }
}
