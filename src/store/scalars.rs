//! String values: one storage key per logical key, holding the raw bytes.

use crate::error::{Error, Result};
use crate::keyspace;
use crate::storage::{OrderedStore, WriteBatch};

pub fn get(db: &dyn OrderedStore, key: &str) -> Result<Option<Vec<u8>>> {
    db.get(&keyspace::scalar_key(key))
}

/// Writes `value` and drops the persisted expiry record in the same batch.
pub fn set(db: &dyn OrderedStore, key: &str, value: &[u8]) -> Result<()> {
    let mut batch = WriteBatch::new();
    batch.put(keyspace::scalar_key(key), value);
    batch.delete(keyspace::expire_key(key));
    db.write(batch)
}

/// Adds `delta` to the integer stored at `key` (missing counts as 0) and
/// returns the result.
pub fn incr_by(db: &dyn OrderedStore, key: &str, delta: i64) -> Result<i64> {
    let storage_key = keyspace::scalar_key(key);
    let current = match db.get(&storage_key)? {
        Some(raw) => parse_integer(&raw)?,
        None => 0,
    };

    let next = current
        .checked_add(delta)
        .ok_or_else(|| Error::NumericConversion("increment or decrement would overflow".into()))?;
    db.put(&storage_key, next.to_string().as_bytes())?;
    Ok(next)
}

fn parse_integer(raw: &[u8]) -> Result<i64> {
    std::str::from_utf8(raw)
        .ok()
        .and_then(|text| text.parse().ok())
        .ok_or_else(|| Error::NumericConversion(String::from_utf8_lossy(raw).into_owned()))
}
