// src/error.rs

//! Unified error handling for the dashboard.

use std::fmt;

use thiserror::Error;

use crate::schema::SchemaViolation;

/// Result type alias for dashboard operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Broad failure classes a caller can react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Request never completed or returned a non-success status.
    Network,
    /// Response completed but did not have the expected shape.
    Schema,
    /// The operation was invoked in a state where it cannot proceed.
    Precondition,
    /// Local I/O or configuration problem.
    Local,
}

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Payload did not match its exact-shape schema
    #[error("invalid {context} payload: {}", format_violations(.violations))]
    Schema {
        context: String,
        violations: Vec<SchemaViolation>,
    },

    /// Operation called without what it needs to proceed
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// A page fetch for this validator is already outstanding
    #[error("a page fetch for validator {validator_id} is already in flight")]
    FetchInFlight { validator_id: u64 },

    /// Referenced record is not held locally
    #[error("Not found: {0}")]
    NotFound(String),
}

impl AppError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a schema error for the given payload context.
    pub fn schema(context: impl Into<String>, violations: Vec<SchemaViolation>) -> Self {
        Self::Schema {
            context: context.into(),
            violations,
        }
    }

    /// Create a precondition error.
    pub fn precondition(message: impl fmt::Display) -> Self {
        Self::Precondition(message.to_string())
    }

    /// Create a not-found error.
    pub fn not_found(message: impl fmt::Display) -> Self {
        Self::NotFound(message.to_string())
    }

    /// Classify the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Http(_) | Self::Status { .. } => ErrorKind::Network,
            Self::Json(_) | Self::Schema { .. } => ErrorKind::Schema,
            Self::Precondition(_) | Self::FetchInFlight { .. } | Self::NotFound(_) => {
                ErrorKind::Precondition
            }
            Self::Toml(_) | Self::Url(_) | Self::Io(_) | Self::Config(_) => ErrorKind::Local,
        }
    }

    /// Violations carried by a schema error, empty for every other kind.
    pub fn violations(&self) -> &[SchemaViolation] {
        match self {
            Self::Schema { violations, .. } => violations,
            _ => &[],
        }
    }
}

fn format_violations(violations: &[SchemaViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert_eq!(
            AppError::Status {
                url: "http://x/".into(),
                status: 500
            }
            .kind(),
            ErrorKind::Network
        );
        assert_eq!(AppError::schema("page", vec![]).kind(), ErrorKind::Schema);
        assert_eq!(
            AppError::FetchInFlight { validator_id: 1 }.kind(),
            ErrorKind::Precondition
        );
        assert_eq!(AppError::config("bad").kind(), ErrorKind::Local);
    }

    #[test]
    fn test_schema_message_lists_violations() {
        let err = AppError::schema(
            "validator-summary",
            vec![
                SchemaViolation::new("[0]", "missing field `id`"),
                SchemaViolation::new("[0].extra", "unexpected field"),
            ],
        );
        let text = err.to_string();
        assert!(text.contains("validator-summary"));
        assert!(text.contains("[0]: missing field `id`"));
        assert!(text.contains("[0].extra: unexpected field"));
        assert_eq!(err.violations().len(), 2);
    }
}
