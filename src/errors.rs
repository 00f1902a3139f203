//! Error types for ingestion and indexing operations
//!
//! Per-document conversion failures are recoverable and travel through the
//! error side channel; job and writer failures are reported the same way.
//! Slot state violations are programming errors and panic instead.

use tantivy::TantivyError;
use thiserror::Error;

/// Result type alias for index operations
pub type IndexResult<T> = Result<T, IndexError>;

/// Error types for ingestion and indexing operations
#[derive(Debug, Error)]
pub enum IndexError {
    /// Input could not be parsed as JSON
    #[error("Invalid JSON input: {0}")]
    InvalidJson(String),

    /// Input parsed but is not a JSON object
    #[error("Document is not a JSON object (found {found})")]
    NotAnObject { found: &'static str },

    /// Identity field missing or empty
    #[error("Document has no identity at '{field}'")]
    IdentityMissing { field: String },

    /// Content type missing and no default configured
    #[error("Document has no content type at '{field}'")]
    ContentTypeMissing { field: String },

    /// Field materialization failed
    #[error("Failed to materialize field '{field}': {message}")]
    Materialize { field: String, message: String },

    /// A scheduled job returned an error
    #[error("Job '{job}' failed: {message}")]
    JobFailed { job: &'static str, message: String },

    /// A scheduled job panicked
    #[error("Job '{job}' panicked: {message}")]
    JobPanicked { job: &'static str, message: String },

    /// The index writer rejected an operation
    #[error("Index writer failed for {identity}: {message}")]
    WriterFailed { identity: String, message: String },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Work submitted after shutdown started
    #[error("Inflow pipeline is shutting down")]
    ShuttingDown,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Tantivy error wrapper
    #[error("Tantivy error: {0}")]
    Tantivy(#[from] TantivyError),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for IndexError {
    fn from(error: anyhow::Error) -> Self {
        IndexError::Other(error.to_string())
    }
}

impl From<serde_json::Error> for IndexError {
    fn from(error: serde_json::Error) -> Self {
        IndexError::InvalidJson(error.to_string())
    }
}

impl IndexError {
    /// True for failures isolated to a single input document
    #[must_use]
    pub fn is_per_item(&self) -> bool {
        matches!(
            self,
            IndexError::InvalidJson(_)
                | IndexError::NotAnObject { .. }
                | IndexError::IdentityMissing { .. }
                | IndexError::ContentTypeMissing { .. }
                | IndexError::Materialize { .. }
        )
    }

    /// Stable category name used for error statistics
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            IndexError::InvalidJson(_) | IndexError::NotAnObject { .. } => "invalid_document",
            IndexError::IdentityMissing { .. } => "identity_missing",
            IndexError::ContentTypeMissing { .. } => "content_type_missing",
            IndexError::Materialize { .. } => "materialize_error",
            IndexError::JobFailed { .. } => "job_failed",
            IndexError::JobPanicked { .. } => "job_panicked",
            IndexError::WriterFailed { .. } | IndexError::Tantivy(_) => "index_error",
            IndexError::Config(_) => "config_error",
            IndexError::ShuttingDown => "shutting_down",
            IndexError::Io(_) => "io_error",
            IndexError::Other(_) => "other",
        }
    }
}

/// Readable text of a caught panic payload
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_item_errors_are_recoverable() {
        let missing = IndexError::IdentityMissing {
            field: "id".to_string(),
        };
        assert!(missing.is_per_item());
        assert_eq!(missing.category(), "identity_missing");

        let job = IndexError::JobFailed {
            job: "convert",
            message: "boom".to_string(),
        };
        assert!(!job.is_per_item());
        assert_eq!(job.category(), "job_failed");
    }

    #[test]
    fn json_errors_convert() {
        let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let converted: IndexError = err.into();
        assert!(matches!(converted, IndexError::InvalidJson(_)));
    }
}
