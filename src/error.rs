//! Error types for sgsync.
//!
//! [`ModuleError`](crate::modules::ModuleError) covers the reconciliation
//! itself; [`Error`] wraps it together with the failures of the surrounding
//! configuration and request-loading layer.

use crate::modules::ModuleError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for sgsync operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for sgsync.
#[derive(Error, Debug)]
pub enum Error {
    /// Error loading a configuration file.
    #[error("Failed to load config '{path}': {message}")]
    Config {
        /// Path to the configuration file
        path: PathBuf,
        /// Error message
        message: String,
    },

    /// Error loading the request payload.
    #[error("Failed to load request '{path}': {message}")]
    Request {
        /// Path to the payload file
        path: PathBuf,
        /// Error message
        message: String,
    },

    /// Invalid command-line input.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The reconciliation failed.
    #[error(transparent)]
    Module(#[from] ModuleError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Create a config error.
    pub fn config(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Config {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a request error.
    pub fn request(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Request {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Whether the error happened before any remote call could be attempted.
    pub fn is_input_error(&self) -> bool {
        match self {
            Error::Config { .. }
            | Error::Request { .. }
            | Error::InvalidArgument(_)
            | Error::Json(_)
            | Error::Yaml(_) => true,
            Error::Module(err) => matches!(
                err,
                ModuleError::InvalidParameter(_)
                    | ModuleError::MissingParameter(_)
                    | ModuleError::ConflictingRule(_)
            ),
            Error::Io(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_error_is_transparent() {
        let err: Error = ModuleError::ConflictingRule("both set".to_string()).into();
        assert_eq!(
            err.to_string(),
            "Conflicting rule specification: both set"
        );
        assert!(err.is_input_error());
    }

    #[test]
    fn test_remote_errors_are_not_input_errors() {
        let err: Error = ModuleError::Connection("timeout".to_string()).into();
        assert!(!err.is_input_error());
    }

    #[test]
    fn test_config_error_display() {
        let err = Error::config("/etc/sgsync.toml", "bad key");
        assert_eq!(err.to_string(), "Failed to load config '/etc/sgsync.toml': bad key");
    }
}
