//! Reply values produced by the command table.
//!
//! A [`Reply`] mirrors the shapes a Redis client shows: status lines, errors,
//! integers, bulk values, nil and arrays. Its `Display` impl renders them the
//! way `redis-cli` prints them, which is all the shell needs.

use crate::store::Value;
use bytes::Bytes;
use std::fmt;

/// The result of executing one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Short status such as `OK`.
    Status(String),

    /// Failed command; the message starts with an error code (`ERR`, `WRONGTYPE`).
    Error(String),

    Integer(i64),

    /// A stored value, binary safe.
    Bulk(Bytes),

    /// Missing value.
    Nil,

    Array(Vec<Reply>),
}

impl Reply {
    /// Creates a status reply.
    ///
    /// # Example
    /// ```
    /// use shelfkv::protocol::Reply;
    /// assert_eq!(Reply::status("OK").to_string(), "OK");
    /// ```
    pub fn status(s: impl Into<String>) -> Self {
        Reply::Status(s.into())
    }

    /// Creates an error reply.
    pub fn error(s: impl Into<String>) -> Self {
        Reply::Error(s.into())
    }

    pub fn integer(n: i64) -> Self {
        Reply::Integer(n)
    }

    /// Creates a bulk reply.
    ///
    /// # Example
    /// ```
    /// use shelfkv::protocol::Reply;
    /// assert_eq!(Reply::bulk("hello").to_string(), "\"hello\"");
    /// ```
    pub fn bulk(data: impl Into<Bytes>) -> Self {
        Reply::Bulk(data.into())
    }

    pub fn nil() -> Self {
        Reply::Nil
    }

    pub fn array(values: Vec<Reply>) -> Self {
        Reply::Array(values)
    }

    /// Common reply for successful writes
    pub fn ok() -> Self {
        Reply::Status("OK".to_string())
    }

    /// Bulk reply for a value, nil for a missing one.
    pub fn from_value(value: Option<Value>) -> Self {
        match value {
            Some(value) => Reply::Bulk(value.into_bytes()),
            None => Reply::Nil,
        }
    }

    /// Array of bulk replies.
    pub fn values(values: Vec<Value>) -> Self {
        Reply::Array(values.into_iter().map(|v| Reply::Bulk(v.into_bytes())).collect())
    }

    /// Array of bulk replies for plain strings (key names).
    pub fn strings(strings: Vec<String>) -> Self {
        Reply::Array(strings.into_iter().map(|s| Reply::Bulk(Bytes::from(s))).collect())
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Reply::Nil)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Reply::Error(_))
    }

    /// Text of a status, error or UTF-8 bulk reply.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Reply::Status(s) | Reply::Error(s) => Some(s),
            Reply::Bulk(b) => std::str::from_utf8(b).ok(),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Reply::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Reply]> {
        match self {
            Reply::Array(values) => Some(values),
            _ => None,
        }
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Status(s) => write!(f, "{}", s),
            Reply::Error(s) => write!(f, "(error) {}", s),
            Reply::Integer(n) => write!(f, "(integer) {}", n),
            Reply::Bulk(data) => {
                if let Ok(s) = std::str::from_utf8(data) {
                    write!(f, "\"{}\"", s.escape_default())
                } else {
                    write!(f, "(binary data, {} bytes)", data.len())
                }
            }
            Reply::Nil => write!(f, "(nil)"),
            Reply::Array(values) => {
                if values.is_empty() {
                    return write!(f, "(empty array)");
                }
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "{}) {}", i + 1, v)?;
                }
                Ok(())
            }
        }
    }
}
