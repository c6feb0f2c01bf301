//! Error types for convlog-storage
//!
//! Errors carry strings rather than source errors so they can be cloned: the
//! recorder hands the same write failure to every caller that arrives after
//! it.

use thiserror::Error;

/// Errors that can occur reading or writing a log
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StorageError {
    /// I/O error on the underlying stream
    #[error("I/O error: {0}")]
    Io(String),

    /// The identity was never recorded
    #[error("not found: {0}")]
    NotFound(String),

    /// The identity was recorded, and every record has been read
    #[error("exhausted: {0}")]
    Exhausted(String),

    /// A record could not be encoded
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A record could not be decoded
    #[error("malformed record at offset {offset}: {message}")]
    Deserialization { offset: u64, message: String },

    /// The recorder no longer accepts records
    #[error("recorder is closed")]
    Closed,

    /// A state document was written by an incompatible version
    #[error("state version mismatch: expected {expected}, got {actual}")]
    StateVersion { expected: f64, actual: f64 },
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err.to_string())
    }
}

impl StorageError {
    /// Create a new NotFound error
    pub fn not_found(identity: impl Into<String>) -> Self {
        Self::NotFound(identity.into())
    }

    /// Create a new Exhausted error
    pub fn exhausted(identity: impl Into<String>) -> Self {
        Self::Exhausted(identity.into())
    }

    /// Create a new Serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization(message.into())
    }

    /// Create a new Deserialization error at a byte offset
    pub fn deserialization(offset: u64, message: impl Into<String>) -> Self {
        Self::Deserialization {
            offset,
            message: message.into(),
        }
    }

    /// True for [`StorageError::NotFound`]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// True for [`StorageError::Exhausted`]
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_and_exhausted_are_distinct() {
        let nf = StorageError::not_found("C1");
        let ex = StorageError::exhausted("C1");
        assert!(nf.is_not_found());
        assert!(!nf.is_exhausted());
        assert!(ex.is_exhausted());
        assert!(!ex.is_not_found());
        assert_ne!(nf, ex);
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let storage_err: StorageError = io_err.into();
        assert!(matches!(storage_err, StorageError::Io(_)));
    }

    #[test]
    fn test_deserialization_carries_offset() {
        let err = StorageError::deserialization(42, "expected value");
        assert!(err.to_string().contains("offset 42"));
    }
}
