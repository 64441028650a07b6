use bytes::Bytes;
use std::fmt;

/// A value read back from the store.
///
/// Stores opened with `decode_responses` return [`Value::Text`] (invalid
/// UTF-8 is replaced lossily); otherwise values come back untouched as
/// [`Value::Bytes`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Bytes(Bytes),
    Text(String),
}

impl Value {
    pub(crate) fn from_raw(raw: Vec<u8>, decode: bool) -> Self {
        if decode {
            match String::from_utf8(raw) {
                Ok(text) => Value::Text(text),
                Err(e) => Value::Text(String::from_utf8_lossy(e.as_bytes()).into_owned()),
            }
        } else {
            Value::Bytes(Bytes::from(raw))
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Value::Bytes(bytes) => bytes,
            Value::Text(text) => text.as_bytes(),
        }
    }

    /// The value as text, if it is valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Bytes(bytes) => std::str::from_utf8(bytes).ok(),
            Value::Text(text) => Some(text),
        }
    }

    pub fn into_bytes(self) -> Bytes {
        match self {
            Value::Bytes(bytes) => bytes,
            Value::Text(text) => Bytes::from(text),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bytes(bytes) => write!(f, "{}", String::from_utf8_lossy(bytes)),
            Value::Text(text) => write!(f, "{}", text),
        }
    }
}

impl PartialEq<str> for Value {
    fn eq(&self, other: &str) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl PartialEq<&str> for Value {
    fn eq(&self, other: &&str) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl PartialEq<[u8]> for Value {
    fn eq(&self, other: &[u8]) -> bool {
        self.as_bytes() == other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_modes() {
        let raw = Value::from_raw(b"hello".to_vec(), false);
        assert_eq!(raw, Value::Bytes(Bytes::from_static(b"hello")));

        let text = Value::from_raw(b"hello".to_vec(), true);
        assert_eq!(text, Value::Text("hello".to_string()));

        // Both compare equal to the same text
        assert_eq!(raw, "hello");
        assert_eq!(text, "hello");
    }

    #[test]
    fn test_lossy_decode() {
        let value = Value::from_raw(vec![b'a', 0xff, b'b'], true);
        assert_eq!(value.to_string(), "a\u{fffd}b");
        assert_eq!(Value::from_raw(vec![0xff], false).as_str(), None);
    }
}
