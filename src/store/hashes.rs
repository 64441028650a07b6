//! Hashes: one storage key per field, `<key> SEP h SEP <field>`.
//!
//! Fields of one hash are contiguous in the shard, so listing them is a single
//! prefix scan and comes back in byte order of the field names.

use crate::error::Result;
use crate::keyspace::{hash_field_key, hash_prefix};
use crate::storage::{Direction, OrderedStore, WriteBatch};
use std::ops::ControlFlow;

/// Returns 1 for a new field, 0 for an overwrite.
pub fn hset(db: &dyn OrderedStore, key: &str, field: &[u8], value: &[u8]) -> Result<i64> {
    let storage_key = hash_field_key(key, field);
    let existed = db.get(&storage_key)?.is_some();
    db.put(&storage_key, value)?;
    Ok(if existed { 0 } else { 1 })
}

pub fn hget(db: &dyn OrderedStore, key: &str, field: &[u8]) -> Result<Option<Vec<u8>>> {
    db.get(&hash_field_key(key, field))
}

pub fn hdel(db: &dyn OrderedStore, key: &str, field: &[u8]) -> Result<i64> {
    Ok(db.delete(&hash_field_key(key, field))? as i64)
}

fn visit_fields(
    db: &dyn OrderedStore,
    key: &str,
    mut visit: impl FnMut(&[u8], &[u8]),
) -> Result<()> {
    let prefix = hash_prefix(key);
    db.scan_prefix(&prefix, Direction::Ascending, &mut |storage_key, value| {
        if let Some(field) = storage_key.strip_prefix(prefix.as_slice()) {
            visit(field, value);
        }
        ControlFlow::Continue(())
    })
}

pub fn hkeys(db: &dyn OrderedStore, key: &str) -> Result<Vec<Vec<u8>>> {
    let mut fields = Vec::new();
    visit_fields(db, key, |field, _| fields.push(field.to_vec()))?;
    Ok(fields)
}

pub fn hvalues(db: &dyn OrderedStore, key: &str) -> Result<Vec<Vec<u8>>> {
    let mut values = Vec::new();
    visit_fields(db, key, |_, value| values.push(value.to_vec()))?;
    Ok(values)
}

pub fn hgetall(db: &dyn OrderedStore, key: &str) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
    let mut pairs = Vec::new();
    visit_fields(db, key, |field, value| {
        pairs.push((field.to_vec(), value.to_vec()))
    })?;
    Ok(pairs)
}

/// Writes every pair in one batch.
pub fn hmset<F, V>(db: &dyn OrderedStore, key: &str, pairs: &[(F, V)]) -> Result<()>
where
    F: AsRef<[u8]>,
    V: AsRef<[u8]>,
{
    let mut batch = WriteBatch::new();
    for (field, value) in pairs {
        batch.put(hash_field_key(key, field.as_ref()), value.as_ref());
    }
    db.write(batch)
}

pub fn hmget<F: AsRef<[u8]>>(
    db: &dyn OrderedStore,
    key: &str,
    fields: &[F],
) -> Result<Vec<Option<Vec<u8>>>> {
    fields
        .iter()
        .map(|field| hget(db, key, field.as_ref()))
        .collect()
}

#[cfg(test)]
mod tests {
    use crate::error::Error;
    use crate::store::tests::open_store;
    use crate::store::Value;
    use tempfile::TempDir;

    fn texts(values: Vec<Value>) -> Vec<String> {
        values.into_iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn test_hset_hget_hdel() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        assert_eq!(store.hset("user:1", "name", "Ariz").unwrap(), 1);
        assert_eq!(store.hset("user:1", "name", "Ariz K").unwrap(), 0);
        assert_eq!(store.hget("user:1", "name").unwrap().unwrap(), "Ariz K");
        assert_eq!(store.hget("user:1", "missing").unwrap(), None);
        assert_eq!(store.hget("user:2", "name").unwrap(), None);

        assert_eq!(store.hdel("user:1", "name").unwrap(), 1);
        assert_eq!(store.hdel("user:1", "name").unwrap(), 0);
        assert_eq!(store.type_of("user:1").unwrap(), "none");
    }

    #[test]
    fn test_listing_in_field_order() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        store.hset("map", "b", "2").unwrap();
        store.hset("map", "a", "1").unwrap();
        store.hset("map", "c", "3").unwrap();
        // A neighbouring key must not leak into the scan
        store.set("map2", "other").unwrap();

        assert_eq!(texts(store.hkeys("map").unwrap()), vec!["a", "b", "c"]);
        assert_eq!(texts(store.hvalues("map").unwrap()), vec!["1", "2", "3"]);

        let pairs: Vec<(String, String)> = store
            .hgetall("map")
            .unwrap()
            .into_iter()
            .map(|(field, value)| (field.to_string(), value.to_string()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "2".to_string()),
                ("c".to_string(), "3".to_string()),
            ]
        );
        assert!(store.hkeys("empty").unwrap().is_empty());
    }

    #[test]
    fn test_hmset_hmget() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        store
            .hmset("config", &[("host", "localhost"), ("port", "6379")])
            .unwrap();
        let values = store.hmget("config", &["port", "missing", "host"]).unwrap();
        assert_eq!(values.len(), 3);
        assert_eq!(values[0].as_ref().unwrap(), "6379");
        assert_eq!(values[1], None);
        assert_eq!(values[2].as_ref().unwrap(), "localhost");

        let empty: [(&str, &str); 0] = [];
        assert!(matches!(
            store.hmset("config", &empty),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_binary_fields() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        store.hset("bin", [0u8, 1, 2], [9u8, 9]).unwrap();
        let fields = store.hkeys("bin").unwrap();
        assert_eq!(fields[0].as_bytes(), &[0u8, 1, 2]);
    }
}
