//! Type-agnostic key commands: existence, type probing, deletion, expiry,
//! pattern listing and the whole-database flush.
//!
//! ## Expiry records
//!
//! An expiry is stored in the key's own shard under `SEP expire SEP <key>`,
//! holding the absolute deadline in unix milliseconds as decimal text. The
//! [`Store`] keeps a cache of deadlines it has seen; the record is the source
//! of truth after a restart. Expiry is only ever enforced lazily, when a
//! command touches the key (or when `KEYS` walks past it).

use crate::error::Result;
use crate::keyspace::{self, TypeTag};
use crate::storage::{Direction, OrderedStore, WriteBatch};
use crate::store::{now_millis, Store};
use regex::Regex;
use std::collections::HashMap;
use std::ops::ControlFlow;
use std::time::Duration;
use tracing::{debug, warn};

/// Type currently stored at `key`, read from the shard.
///
/// A scalar is the bare key itself; lists and hashes are found from the tag
/// of the first compound key under `<key> SEP`.
pub fn probe_type(db: &dyn OrderedStore, key: &str) -> Result<Option<TypeTag>> {
    if db.get(&keyspace::scalar_key(key))?.is_some() {
        return Ok(Some(TypeTag::Scalar));
    }

    let prefix = keyspace::compound_prefix(key);
    Ok(db
        .first_in_prefix(&prefix, Direction::Ascending)?
        .and_then(|(storage_key, _)| keyspace::compound_type(&prefix, &storage_key)))
}

pub fn exists(db: &dyn OrderedStore, key: &str) -> Result<bool> {
    Ok(probe_type(db, key)?.is_some())
}

/// Deletes every storage key of `key` plus its expiry record in one batch,
/// and evicts both caches. Returns whether the key held anything.
pub fn purge(store: &Store, db: &dyn OrderedStore, key: &str) -> Result<bool> {
    let mut batch = WriteBatch::new();

    let scalar = keyspace::scalar_key(key);
    let existed = db.get(&scalar)?.is_some();
    if existed {
        batch.delete(scalar);
    }
    db.scan_prefix(
        &keyspace::compound_prefix(key),
        Direction::Ascending,
        &mut |storage_key, _| {
            batch.delete(storage_key);
            ControlFlow::Continue(())
        },
    )?;
    let existed = existed || !batch.is_empty();
    batch.delete(keyspace::expire_key(key));

    db.write(batch)?;
    store.forget(key);
    Ok(existed)
}

/// Persisted deadline of `key`. A record that does not parse is dropped.
pub fn read_expiry(db: &dyn OrderedStore, key: &str) -> Result<Option<u64>> {
    let record_key = keyspace::expire_key(key);
    let Some(raw) = db.get(&record_key)? else {
        return Ok(None);
    };

    match std::str::from_utf8(&raw).ok().and_then(|text| text.parse().ok()) {
        Some(deadline) => Ok(Some(deadline)),
        None => {
            warn!(key, "dropping corrupt expiry record");
            db.delete(&record_key)?;
            Ok(None)
        }
    }
}

/// Schedules `key` to expire `ttl` from now. `false` when the key is missing.
pub fn expire(store: &Store, db: &dyn OrderedStore, key: &str, ttl: Duration) -> Result<bool> {
    if !exists(db, key)? {
        return Ok(false);
    }

    let ttl = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
    let deadline = now_millis().saturating_add(ttl);
    db.put(&keyspace::expire_key(key), deadline.to_string().as_bytes())?;
    store.remember_expiry(key, deadline);
    Ok(true)
}

/// Drops a pending expiry. `false` when none was scheduled.
pub fn persist(store: &Store, db: &dyn OrderedStore, key: &str) -> Result<bool> {
    match store.expiry_deadline(db, key)? {
        Some(deadline) if deadline > now_millis() => {
            db.delete(&keyspace::expire_key(key))?;
            store.forget_expiry(key);
            Ok(true)
        }
        _ => Ok(false),
    }
}

/// Milliseconds left before `key` expires: `-1` without expiry, `-2` when
/// the key does not exist.
pub fn ttl_millis(store: &Store, db: &dyn OrderedStore, key: &str) -> Result<i64> {
    if !exists(db, key)? {
        return Ok(-2);
    }
    Ok(match store.expiry_deadline(db, key)? {
        Some(deadline) => {
            i64::try_from(deadline.saturating_sub(now_millis())).unwrap_or(i64::MAX)
        }
        None => -1,
    })
}

/// Logical keys matching `pattern` across every shard, in shard order and
/// then key order.
///
/// Runs under the exclusive global lease, but other processes' in-memory
/// caches are not consulted, so the result is a best-effort view. With
/// `check_expired`, keys whose deadline has passed are purged instead of
/// listed.
pub fn keys(store: &Store, pattern: &Regex, check_expired: bool) -> Result<Vec<String>> {
    let now = now_millis();
    let mut matched = Vec::new();

    for conn in store.router().all_connections()? {
        let conn = conn?;
        let mut found: Vec<String> = Vec::new();
        let mut deadlines: HashMap<String, u64> = HashMap::new();
        let expire_prefix = keyspace::expire_key("");

        conn.scan(b"", None, Direction::Ascending, &mut |storage_key, value| {
            match keyspace::logical_key(storage_key) {
                Some((logical, compound)) => {
                    let logical = String::from_utf8_lossy(logical);
                    // Compound keys of one logical key are contiguous
                    if !(compound && found.last().map(String::as_str) == Some(&*logical)) {
                        found.push(logical.into_owned());
                    }
                }
                None => {
                    let deadline = std::str::from_utf8(value).ok().and_then(|v| v.parse().ok());
                    if let (Some(key), Some(deadline)) =
                        (storage_key.strip_prefix(expire_prefix.as_slice()), deadline)
                    {
                        deadlines.insert(String::from_utf8_lossy(key).into_owned(), deadline);
                    }
                }
            }
            ControlFlow::Continue(())
        })?;

        for key in found {
            if check_expired && deadlines.get(&key).is_some_and(|deadline| *deadline <= now) {
                purge(store, &*conn, &key)?;
                debug!(key = %key, "expired key purged during scan");
                continue;
            }
            if pattern.is_match(&key) {
                matched.push(key);
            }
        }
    }

    Ok(matched)
}

/// Deletes every shard file and clears both caches.
pub fn flushdb(store: &Store) -> Result<()> {
    store.router().reset()?;
    store.clear_caches();
    debug!(path = %store.db_path().display(), "database flushed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::open_store;
    use std::thread;
    use tempfile::TempDir;

    #[test]
    fn test_exists_and_delete_every_type() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        store.set("s", "v").unwrap();
        store.rpush("l", "v").unwrap();
        store.hset("h", "f", "v").unwrap();

        for key in ["s", "l", "h"] {
            assert!(store.exists(key).unwrap());
            assert!(store.delete(key).unwrap());
            assert!(!store.exists(key).unwrap());
            assert!(!store.delete(key).unwrap());
        }
        assert_eq!(store.type_of("s").unwrap(), "none");
    }

    #[test]
    fn test_type_of() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        store.set("s", "v").unwrap();
        store.lpush("l", "v").unwrap();
        store.hmset("h", &[("f", "v")]).unwrap();

        assert_eq!(store.type_of("s").unwrap(), "string");
        assert_eq!(store.type_of("l").unwrap(), "list");
        assert_eq!(store.type_of("h").unwrap(), "hash");
        assert_eq!(store.type_of("nothing").unwrap(), "none");
    }

    #[test]
    fn test_expire_then_get() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        assert!(!store.expire("missing", Duration::from_secs(1)).unwrap());

        store.set("k", "v").unwrap();
        assert!(store.expire("k", Duration::from_millis(500)).unwrap());
        assert_eq!(store.get("k").unwrap().unwrap(), "v");
        let ttl = store.pttl("k").unwrap();
        assert!(ttl > 0 && ttl <= 500);

        thread::sleep(Duration::from_millis(600));
        assert_eq!(store.get("k").unwrap(), None);
        assert_eq!(store.ttl("k").unwrap(), -2);
    }

    #[test]
    fn test_expired_list_frees_key_for_other_type() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        store.rpush("k", "v").unwrap();
        store.expire("k", Duration::from_millis(50)).unwrap();
        thread::sleep(Duration::from_millis(100));

        // Stale list binding does not block a new scalar
        store.set("k", "fresh").unwrap();
        assert_eq!(store.type_of("k").unwrap(), "string");
        assert_eq!(store.ttl("k").unwrap(), -1);
    }

    #[test]
    fn test_persist() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        store.set("k", "v").unwrap();
        assert!(!store.persist("k").unwrap());

        store.expire("k", Duration::from_millis(300)).unwrap();
        assert!(store.persist("k").unwrap());
        assert!(!store.persist("k").unwrap());
        assert_eq!(store.ttl("k").unwrap(), -1);

        thread::sleep(Duration::from_millis(400));
        assert_eq!(store.get("k").unwrap().unwrap(), "v");
    }

    #[test]
    fn test_huge_ttl_saturates() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        store.set("k", "v").unwrap();
        // Milliseconds of this TTL do not fit in a u64
        assert!(store
            .expire("k", Duration::from_secs(18_446_744_073_709_552))
            .unwrap());

        assert_eq!(store.pttl("k").unwrap(), i64::MAX);
        assert!(store.ttl("k").unwrap() > 0);

        thread::sleep(Duration::from_millis(50));
        assert_eq!(store.get("k").unwrap().unwrap(), "v");
        assert!(store.persist("k").unwrap());
    }

    #[test]
    fn test_expiry_survives_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let store = open_store(&dir);
            store.hset("h", "f", "v").unwrap();
            store.expire("h", Duration::from_millis(200)).unwrap();
        }

        let store = open_store(&dir);
        let ttl = store.pttl("h").unwrap();
        assert!(ttl >= 0 && ttl <= 200);

        thread::sleep(Duration::from_millis(300));
        assert_eq!(store.hget("h", "f").unwrap(), None);
        assert!(!store.exists("h").unwrap());
    }

    #[test]
    fn test_corrupt_expiry_record_is_ignored() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        store.set("k", "v").unwrap();

        let conn = store.router().connection("k").unwrap();
        conn.put(&keyspace::expire_key("k"), b"not-a-number").unwrap();
        assert_eq!(read_expiry(&*conn, "k").unwrap(), None);
        assert_eq!(conn.get(&keyspace::expire_key("k")).unwrap(), None);
    }

    #[test]
    fn test_keys_dedupes_and_matches() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        store.set("user:1", "a").unwrap();
        store.set("user:2", "b").unwrap();
        for value in ["x", "y", "z"] {
            store.rpush("user:list", value).unwrap();
        }
        store.hmset("map-1", &[("f1", "1"), ("f2", "2")]).unwrap();
        store.expire("user:1", Duration::from_secs(60)).unwrap();

        let mut all = store.keys("*").unwrap();
        all.sort();
        assert_eq!(all, vec!["map-1", "user:1", "user:2", "user:list"]);

        let mut users = store.keys("user:?").unwrap();
        users.sort();
        assert_eq!(users, vec!["user:1", "user:2"]);

        assert_eq!(store.keys("map-*").unwrap(), vec!["map-1"]);
        assert!(store.keys("nothing*").unwrap().is_empty());
    }

    #[test]
    fn test_keys_purges_expired() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        store.set("gone", "v").unwrap();
        store.set("kept", "v").unwrap();
        store.expire("gone", Duration::from_millis(20)).unwrap();
        thread::sleep(Duration::from_millis(60));

        let mut without_check = store.keys_with("*", false).unwrap();
        without_check.sort();
        assert_eq!(without_check, vec!["gone", "kept"]);

        assert_eq!(store.keys("*").unwrap(), vec!["kept"]);
        assert_eq!(store.keys_with("*", false).unwrap(), vec!["kept"]);
    }

    #[test]
    fn test_scan_is_single_page() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        store.set("a", "1").unwrap();
        store.set("b", "2").unwrap();

        let (cursor, mut page) = store.scan(0, "*").unwrap();
        page.sort();
        assert_eq!(cursor, 0);
        assert_eq!(page, vec!["a", "b"]);
        assert_eq!(store.scan(7, "*").unwrap(), (0, Vec::new()));
    }

    #[test]
    fn test_flushdb() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        store.set("s", "v").unwrap();
        store.rpush("l", "v").unwrap();
        store.flushdb().unwrap();

        assert!(store.keys("*").unwrap().is_empty());
        assert_eq!(store.get("s").unwrap(), None);
        // Caches were cleared, so the old list binding is gone too
        store.set("l", "now a string").unwrap();
        assert_eq!(store.get("l").unwrap().unwrap(), "now a string");
    }
}
