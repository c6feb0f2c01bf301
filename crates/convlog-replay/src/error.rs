//! Error types for convlog-replay

use convlog_storage::StorageError;
use thiserror::Error;

/// Error returned by a [`Sink`](crate::Sink) implementation
pub type SinkError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur while replaying or serving a log
#[derive(Debug, Error)]
pub enum ReplayError {
    /// Reading the log failed
    #[error("log error: {0}")]
    Storage(#[from] StorageError),

    /// The sink rejected a record; replay stopped there
    #[error("sink failed on {identity} at offset {offset}: {source}")]
    Sink {
        identity: String,
        offset: u64,
        #[source]
        source: SinkError,
    },

    /// The emulation server could not bind or stopped with an error
    #[error("server error: {0}")]
    Server(#[from] std::io::Error),
}

/// Result type for replay operations
pub type ReplayResult<T> = Result<T, ReplayError>;
