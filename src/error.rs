//! Error types shared by every layer of the store.
//!
//! Soft misses (a `GET` on an absent key, an `HDEL` of a missing field, ...)
//! are not errors: they come back as `None`, `0` or an empty collection.
//! Everything here aborts the command it was raised from.

use std::time::Duration;
use thiserror::Error;

/// Errors returned by store operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A key or argument was rejected before any I/O happened, or a list
    /// ran out of index space.
    #[error("validation error: {0}")]
    Validation(String),

    /// The command implies a different data type than the one the key holds.
    #[error("WRONGTYPE key `{key}` holds a {existing} value, not a {requested}")]
    TypeConflict {
        key: String,
        existing: &'static str,
        requested: &'static str,
    },

    /// A named lease could not be acquired in time.
    #[error("timed out after {timeout:?} waiting for lease `{name}`")]
    LeaseTimeout { name: String, timeout: Duration },

    /// Every pooled handle of a shard stayed busy for the whole retry budget.
    #[error("no free connection for shard `{shard}` after {attempts} attempts")]
    ResourceExhausted { shard: String, attempts: u32 },

    /// `INCR`/`DECR` family applied to a value that is not an integer.
    #[error("value is not an integer or out of range: {0}")]
    NumericConversion(String),

    /// Failure inside the ordered store backing a shard.
    #[error("storage error: {0}")]
    Storage(#[from] redb::Error),

    /// Filesystem failure (shard directory, lease files).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_conflict_message() {
        let err = Error::TypeConflict {
            key: "k".to_string(),
            existing: "string",
            requested: "hash",
        };
        assert_eq!(
            err.to_string(),
            "WRONGTYPE key `k` holds a string value, not a hash"
        );
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
