//! Engine error taxonomy
//!
//! Only specification-parse failures and total completion-service
//! unavailability are run-fatal; everything per-scenario is absorbed into
//! the run report instead of propagating here.

use thiserror::Error;

use shared::SharedError;

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Engine error types
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Malformed specification: {message}")]
    MalformedSpec { message: String },

    #[error("Unsupported specification feature: {feature}")]
    UnsupportedFeature { feature: String },

    #[error("Completion service unavailable: {message}")]
    CompletionServiceUnavailable { message: String },

    #[error("Not found: {what} {id}")]
    NotFound { what: String, id: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Result storage error: {message}")]
    StorageError { message: String },

    #[error("Shared component error")]
    SharedError(#[from] SharedError),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Task join error: {0}")]
    JoinError(#[from] tokio::task::JoinError),
}

impl EngineError {
    /// Stable taxonomy tag reported in `failed-to-start` run statuses
    pub fn tag(&self) -> &'static str {
        match self {
            EngineError::MalformedSpec { .. } => "MalformedSpecError",
            EngineError::UnsupportedFeature { .. } => "UnsupportedFeatureError",
            EngineError::CompletionServiceUnavailable { .. } => {
                "CompletionServiceUnavailableError"
            }
            EngineError::NotFound { .. } => "NotFoundError",
            EngineError::ConfigError { .. } => "ConfigError",
            EngineError::StorageError { .. } => "StorageError",
            EngineError::SharedError(_) => "SharedError",
            EngineError::IoError(_) => "IoError",
            EngineError::JsonError(_) => "JsonError",
            EngineError::JoinError(_) => "JoinError",
        }
    }

    /// Errors that abort a run before any scenario is executed
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            EngineError::MalformedSpec { .. }
                | EngineError::UnsupportedFeature { .. }
                | EngineError::CompletionServiceUnavailable { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_taxonomy_tags_are_stable() {
        let err = EngineError::MalformedSpec {
            message: "bad json".to_string(),
        };
        assert_eq!(err.tag(), "MalformedSpecError");

        let err = EngineError::CompletionServiceUnavailable {
            message: "connection refused".to_string(),
        };
        assert_eq!(err.tag(), "CompletionServiceUnavailableError");
    }

    #[test]
    fn test_fatal_classification() {
        assert!(EngineError::MalformedSpec {
            message: String::new()
        }
        .is_fatal());
        assert!(EngineError::UnsupportedFeature {
            feature: String::new()
        }
        .is_fatal());
        assert!(EngineError::CompletionServiceUnavailable {
            message: String::new()
        }
        .is_fatal());
        assert!(!EngineError::StorageError {
            message: String::new()
        }
        .is_fatal());
    }
}
