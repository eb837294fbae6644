//! Error types for the NLU pipeline and its service boundary.

use thiserror::Error;

/// Result type alias for NLU operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for NLU operations
///
/// Unrecognized input and missing slots are not errors; they are regular
/// pipeline outcomes (see [`crate::nlu::query::Outcome`]).
#[derive(Debug, Error)]
pub enum Error {
    /// Inbound request has no text, or only whitespace
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    /// Optional external annotator missing or failing
    #[error("Annotator unavailable: {0}")]
    AnnotatorUnavailable(String),

    /// Unexpected fault inside a pattern matcher
    #[error("Extraction fault: {0}")]
    Extraction(String),

    /// Catalog tables failed validation
    #[error("Invalid catalog: {0}")]
    InvalidCatalog(String),

    /// Pattern compilation error
    #[error("Pattern error: {0}")]
    Pattern(#[from] regex::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parse error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the caller sent something unusable (as opposed to a fault on our side)
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::MalformedRequest(_))
    }

    /// Whether the pipeline can carry on without the failed capability
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::MalformedRequest(_) | Error::AnnotatorUnavailable(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::MalformedRequest("Missing 'text' field".to_string());
        assert_eq!(err.to_string(), "Malformed request: Missing 'text' field");
    }

    #[test]
    fn test_client_error_classification() {
        assert!(Error::MalformedRequest("empty".into()).is_client_error());
        assert!(!Error::Extraction("boom".into()).is_client_error());
        assert!(!Error::AnnotatorUnavailable("down".into()).is_client_error());
    }

    #[test]
    fn test_recoverable_classification() {
        assert!(Error::AnnotatorUnavailable("down".into()).is_recoverable());
        assert!(!Error::Extraction("capture missing".into()).is_recoverable());
    }
}
