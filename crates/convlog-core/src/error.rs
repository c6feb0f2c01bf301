//! Error types for convlog-core

use thiserror::Error;

/// Errors produced when parsing conversation timestamps
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimestampError {
    /// The timestamp was empty
    #[error("empty timestamp")]
    Empty,

    /// The seconds or fractional part was not a number
    #[error("invalid timestamp {0:?}")]
    Invalid(String),

    /// The fractional part had more than six digits
    #[error("timestamp {0:?} has more than microsecond precision")]
    TooPrecise(String),
}
