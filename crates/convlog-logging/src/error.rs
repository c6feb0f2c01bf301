//! Error types for convlog-logging

use thiserror::Error;

/// Errors that can occur installing the subscriber
#[derive(Debug, Error)]
pub enum LoggingError {
    /// A global subscriber was already installed
    #[error("subscriber already installed: {0}")]
    AlreadyInstalled(String),

    /// The log file or directory could not be created
    #[error("cannot open log file: {0}")]
    File(String),

    /// The level directive did not parse
    #[error("invalid log level {level:?}: {message}")]
    InvalidLevel { level: String, message: String },
}
