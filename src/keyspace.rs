//! KeySpace codec.
//!
//! Every structure lives inside one shard's ordered byte namespace. This
//! module turns logical keys and per-type sub-keys into storage keys and back.
//! It performs no I/O.
//!
//! ## Layout
//!
//! ```text
//! scalar      <key>
//! list slot   <key> SEP l SEP <12-digit zero-padded index>
//! hash field  <key> SEP h SEP <field>
//! expiry      SEP expire SEP <key>
//! ```
//!
//! Because the ordered store sorts by raw bytes, fixed-width zero padding makes
//! byte order equal numeric order for list indices. New lists start at
//! [`LIST_MID_INDEX`] so both ends can grow without renumbering anything.

use crate::error::{Error, Result};
use regex::Regex;
use sha1::{Digest, Sha1};

/// Reserved separator. Logical keys must not contain it.
pub const SEP: &str = "\u{fe41}";

/// Number of decimal digits of a list slot index.
pub const LIST_INDEX_WIDTH: usize = 12;

/// Index of the first element pushed onto an empty list.
pub const LIST_MID_INDEX: u64 = 1_000_000;

/// Largest index that still fits in [`LIST_INDEX_WIDTH`] digits.
pub const LIST_MAX_INDEX: u64 = 999_999_999_999;

const EXPIRE_NAMESPACE: &str = "expire";

/// Data type bound to a logical key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
    Scalar,
    List,
    Hash,
}

impl TypeTag {
    /// The tag embedded in compound storage keys (empty for scalars).
    pub fn as_str(self) -> &'static str {
        match self {
            TypeTag::Scalar => "",
            TypeTag::List => "l",
            TypeTag::Hash => "h",
        }
    }

    /// Name reported by the `TYPE` command.
    pub fn name(self) -> &'static str {
        match self {
            TypeTag::Scalar => "string",
            TypeTag::List => "list",
            TypeTag::Hash => "hash",
        }
    }

    /// Reads the tag at the start of the part of a compound key that follows
    /// `<key> SEP`.
    fn from_compound_rest(rest: &[u8]) -> Option<Self> {
        let tag = match rest.first()? {
            b'l' => TypeTag::List,
            b'h' => TypeTag::Hash,
            _ => return None,
        };
        rest[1..].starts_with(SEP.as_bytes()).then_some(tag)
    }
}

/// Rejects keys that would corrupt the compound key layout.
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(Error::validation("key must not be empty"));
    }
    if key.contains(SEP) {
        return Err(Error::validation(format!(
            "key `{}` contains the reserved separator",
            key
        )));
    }
    Ok(())
}

/// Shard holding `key`: the first `spread_factor` hex digits of SHA-1(key).
pub fn shard_id(key: &str, spread_factor: usize) -> String {
    let digest = format!("{:x}", Sha1::digest(key.as_bytes()));
    digest[..spread_factor.min(digest.len())].to_string()
}

/// Storage key of a scalar.
pub fn scalar_key(key: &str) -> Vec<u8> {
    key.as_bytes().to_vec()
}

/// `<key> SEP`: every compound storage key of `key` starts with this.
pub fn compound_prefix(key: &str) -> Vec<u8> {
    format!("{}{}", key, SEP).into_bytes()
}

fn typed_prefix(key: &str, tag: TypeTag) -> Vec<u8> {
    format!("{}{}{}{}", key, SEP, tag.as_str(), SEP).into_bytes()
}

/// Prefix shared by every slot of the list at `key`.
pub fn list_prefix(key: &str) -> Vec<u8> {
    typed_prefix(key, TypeTag::List)
}

/// Storage key of the list slot at `index` under `prefix`.
pub fn list_slot_key(prefix: &[u8], index: u64) -> Vec<u8> {
    let mut slot = Vec::with_capacity(prefix.len() + LIST_INDEX_WIDTH);
    slot.extend_from_slice(prefix);
    slot.extend_from_slice(format!("{:0width$}", index, width = LIST_INDEX_WIDTH).as_bytes());
    slot
}

/// Decodes the numeric index from a list slot key.
pub fn list_slot_index(prefix: &[u8], slot: &[u8]) -> Option<u64> {
    let digits = slot.strip_prefix(prefix)?;
    if digits.len() != LIST_INDEX_WIDTH {
        return None;
    }
    std::str::from_utf8(digits).ok()?.parse().ok()
}

/// Index for an `RPUSH` given the current maximum slot index.
pub fn next_right_index(max: Option<u64>) -> Result<u64> {
    match max {
        None => Ok(LIST_MID_INDEX),
        Some(max) if max < LIST_MAX_INDEX => Ok(max + 1),
        Some(_) => Err(Error::validation("list too large: right index space exhausted")),
    }
}

/// Index for an `LPUSH` given the current minimum slot index.
pub fn next_left_index(min: Option<u64>) -> Result<u64> {
    match min {
        None => Ok(LIST_MID_INDEX),
        Some(min) => min
            .checked_sub(1)
            .ok_or_else(|| Error::validation("list too large: left index space exhausted")),
    }
}

/// Prefix shared by every field of the hash at `key`.
pub fn hash_prefix(key: &str) -> Vec<u8> {
    typed_prefix(key, TypeTag::Hash)
}

/// Storage key of `field` inside the hash at `key`.
pub fn hash_field_key(key: &str, field: &[u8]) -> Vec<u8> {
    let mut storage_key = hash_prefix(key);
    storage_key.extend_from_slice(field);
    storage_key
}

/// Storage key of the persisted expiry record of `key`.
pub fn expire_key(key: &str) -> Vec<u8> {
    format!("{}{}{}{}", SEP, EXPIRE_NAMESPACE, SEP, key).into_bytes()
}

/// Type of a compound storage key known to start with `compound_prefix(key)`.
pub fn compound_type(prefix: &[u8], storage_key: &[u8]) -> Option<TypeTag> {
    TypeTag::from_compound_rest(storage_key.strip_prefix(prefix)?)
}

/// Splits a storage key into its logical key and whether it is compound.
///
/// Returns `None` for keys in the reserved namespace (expiry records).
pub fn logical_key(storage_key: &[u8]) -> Option<(&[u8], bool)> {
    let sep = SEP.as_bytes();
    match storage_key.windows(sep.len()).position(|w| w == sep) {
        Some(0) => None,
        Some(at) => Some((&storage_key[..at], true)),
        None => Some((storage_key, false)),
    }
}

/// Maps any integer onto `0..n`, counting negative indices from the end.
///
/// `normalize_index(-1, n)` is the last position. Returns 0 for an empty list.
pub fn normalize_index(index: i64, len: u64) -> u64 {
    if len == 0 {
        return 0;
    }
    index.rem_euclid(len as i64) as u64
}

/// Translates a glob (`*`, `?`, `[...]`, `\x`) into an anchored regex.
pub fn glob_to_regex(pattern: &str) -> Result<Regex> {
    let mut out = String::with_capacity(pattern.len() * 2 + 2);
    let mut buf = [0u8; 4];
    let mut chars = pattern.chars().peekable();

    out.push('^');
    while let Some(c) = chars.next() {
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            '[' => {
                out.push('[');
                if matches!(chars.peek(), Some('!') | Some('^')) {
                    chars.next();
                    out.push('^');
                }
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == ']' {
                        closed = true;
                        break;
                    }
                    if matches!(c, '\\' | '[' | '&' | '~') {
                        out.push('\\');
                    }
                    out.push(c);
                }
                if !closed {
                    return Err(Error::validation(format!(
                        "invalid pattern `{}`: unterminated character class",
                        pattern
                    )));
                }
                out.push(']');
            }
            '\\' => match chars.next() {
                Some(escaped) => out.push_str(&regex::escape(escaped.encode_utf8(&mut buf))),
                None => out.push_str(r"\\"),
            },
            other => out.push_str(&regex::escape(other.encode_utf8(&mut buf))),
        }
    }
    out.push('$');

    Regex::new(&out)
        .map_err(|e| Error::validation(format!("invalid pattern `{}`: {}", pattern, e)))
}
