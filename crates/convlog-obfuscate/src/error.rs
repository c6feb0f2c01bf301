//! Error types for convlog-obfuscate

use convlog_storage::StorageError;
use thiserror::Error;

/// Errors that can occur while anonymizing a log
#[derive(Debug, Error)]
pub enum ObfuscateError {
    /// Reading the source log failed
    #[error("source log: {0}")]
    Storage(#[from] StorageError),

    /// Writing the output log failed
    #[error("write failed at source offset {offset}: {source}")]
    Write {
        offset: u64,
        #[source]
        source: std::io::Error,
    },

    /// A rewritten record could not be encoded
    #[error("encode failed at source offset {offset}: {message}")]
    Encode { offset: u64, message: String },

    /// The source or destination file could not be opened
    #[error("cannot open {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for anonymizer operations
pub type ObfuscateResult<T> = Result<T, ObfuscateError>;
