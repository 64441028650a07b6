//! The store facade and its dispatcher.
//!
//! [`Store`] is the object applications hold. Every public method funnels
//! through one of two wrappers:
//!
//! ```text
//!   key-scoped command                         global command
//!   ──────────────────                         ──────────────
//!   validate key                               global lease (exclusive)
//!   type check against the registry            run handler
//!   global lease (shared)                      record latency
//!   key lease (exclusive)
//!   shard connection
//!   enforce expiry
//!   type re-check (creating commands)
//!   run handler
//!   update type registry
//!   record latency
//! ```
//!
//! Handlers live in [`scalars`], [`lists`], [`hashes`] and [`keys`]. They are
//! free functions over an [`OrderedStore`] handle and hold no state of their
//! own; the type registry and the expiry cache belong to the `Store`.
//!
//! Leases are taken in the order global, key, and the pooled connection is
//! acquired last, so a caller never waits on a key lease while holding a pool
//! slot. The one exception is the type check, which borrows a connection for
//! a single probe before any lease and returns it before leasing. Commands
//! that may create a key repeat the probe under the key lease.

pub mod hashes;
pub mod keys;
pub mod lists;
pub mod scalars;
mod value;

pub use lists::InsertPosition;
pub use value::Value;

use crate::config::StoreConfig;
use crate::error::{Error, Result};
use crate::keyspace::{self, TypeTag};
use crate::storage::lease::{key_lease_name, LeaseManager, LeaseMode, GLOBAL_LEASE};
use crate::storage::{Connection, OrderedStore, ShardRouter};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

/// Directory under the database path holding the lease files.
const LEASE_DIR: &str = ".leases";

/// Every command the store understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Get,
    Set,
    Delete,
    Exists,
    Type,
    Incr,
    IncrBy,
    Decr,
    DecrBy,
    Expire,
    Persist,
    Ttl,
    Pttl,
    RPush,
    LPush,
    RPop,
    LPop,
    LLen,
    LIndex,
    LSet,
    LRange,
    LTrim,
    LRem,
    LInsert,
    HSet,
    HGet,
    HDel,
    HKeys,
    HValues,
    HGetAll,
    HMSet,
    HMGet,
    Keys,
    Scan,
    FlushDb,
}

impl Command {
    pub const ALL: [Command; 35] = [
        Command::Get,
        Command::Set,
        Command::Delete,
        Command::Exists,
        Command::Type,
        Command::Incr,
        Command::IncrBy,
        Command::Decr,
        Command::DecrBy,
        Command::Expire,
        Command::Persist,
        Command::Ttl,
        Command::Pttl,
        Command::RPush,
        Command::LPush,
        Command::RPop,
        Command::LPop,
        Command::LLen,
        Command::LIndex,
        Command::LSet,
        Command::LRange,
        Command::LTrim,
        Command::LRem,
        Command::LInsert,
        Command::HSet,
        Command::HGet,
        Command::HDel,
        Command::HKeys,
        Command::HValues,
        Command::HGetAll,
        Command::HMSet,
        Command::HMGet,
        Command::Keys,
        Command::Scan,
        Command::FlushDb,
    ];

    /// Upper-case command name.
    pub fn name(self) -> &'static str {
        match self {
            Command::Get => "GET",
            Command::Set => "SET",
            Command::Delete => "DELETE",
            Command::Exists => "EXISTS",
            Command::Type => "TYPE",
            Command::Incr => "INCR",
            Command::IncrBy => "INCRBY",
            Command::Decr => "DECR",
            Command::DecrBy => "DECRBY",
            Command::Expire => "EXPIRE",
            Command::Persist => "PERSIST",
            Command::Ttl => "TTL",
            Command::Pttl => "PTTL",
            Command::RPush => "RPUSH",
            Command::LPush => "LPUSH",
            Command::RPop => "RPOP",
            Command::LPop => "LPOP",
            Command::LLen => "LLEN",
            Command::LIndex => "LINDEX",
            Command::LSet => "LSET",
            Command::LRange => "LRANGE",
            Command::LTrim => "LTRIM",
            Command::LRem => "LREM",
            Command::LInsert => "LINSERT",
            Command::HSet => "HSET",
            Command::HGet => "HGET",
            Command::HDel => "HDEL",
            Command::HKeys => "HKEYS",
            Command::HValues => "HVALUES",
            Command::HGetAll => "HGETALL",
            Command::HMSet => "HMSET",
            Command::HMGet => "HMGET",
            Command::Keys => "KEYS",
            Command::Scan => "SCAN",
            Command::FlushDb => "FLUSHDB",
        }
    }

    /// Case-insensitive lookup by name.
    pub fn from_name(name: &str) -> Option<Command> {
        Command::ALL
            .into_iter()
            .find(|command| command.name().eq_ignore_ascii_case(name))
    }

    /// Global commands serialize against the whole store instead of one key.
    pub fn is_global(self) -> bool {
        matches!(self, Command::Keys | Command::Scan | Command::FlushDb)
    }

    /// Data type the command implies, or `None` for type-agnostic commands.
    pub fn type_tag(self) -> Option<TypeTag> {
        use Command::*;
        match self {
            Get | Set | Incr | IncrBy | Decr | DecrBy => Some(TypeTag::Scalar),
            RPush | LPush | RPop | LPop | LLen | LIndex | LSet | LRange | LTrim | LRem
            | LInsert => Some(TypeTag::List),
            HSet | HGet | HDel | HKeys | HValues | HGetAll | HMSet | HMGet => Some(TypeTag::Hash),
            Delete | Exists | Type | Expire | Persist | Ttl | Pttl | Keys | Scan | FlushDb => None,
        }
    }

    /// Commands that may bring a key into existence.
    fn creates(self) -> bool {
        use Command::*;
        matches!(
            self,
            Set | Incr | IncrBy | Decr | DecrBy | RPush | LPush | HSet | HMSet
        )
    }

    /// Commands that may leave a key without any storage.
    fn may_remove(self) -> bool {
        use Command::*;
        matches!(self, RPop | LPop | LRem | LTrim | HDel)
    }
}

/// Latency record of one command.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OpStats {
    /// Running average over every call
    pub average: Duration,
    pub calls: u64,
}

impl OpStats {
    fn record(&mut self, elapsed: Duration) {
        self.calls += 1;
        let average = self.average.as_secs_f64();
        let next = average + (elapsed.as_secs_f64() - average) / self.calls as f64;
        self.average = Duration::from_secs_f64(next.max(0.0));
    }
}

/// An on-disk data-structure store.
///
/// `Store` is `Send + Sync`; share it between threads behind an [`Arc`].
/// Several processes may open the same database directory: the key and
/// global leases are file locks, so they serialize across processes too.
///
/// # Example
///
/// ```no_run
/// use shelfkv::{Store, StoreConfig};
///
/// let store = Store::open(StoreConfig::new("/tmp/shelfkv").with_decode_responses(true))?;
/// store.set("greeting", "hello")?;
/// assert_eq!(store.get("greeting")?.unwrap(), "hello");
///
/// store.rpush("queue", "job-1")?;
/// store.rpush("queue", "job-2")?;
/// assert_eq!(store.llen("queue")?, 2);
/// # Ok::<(), shelfkv::Error>(())
/// ```
pub struct Store {
    config: StoreConfig,
    router: ShardRouter,
    leases: Arc<LeaseManager>,
    types: RwLock<HashMap<String, TypeTag>>,
    expiries: RwLock<HashMap<String, u64>>,
    stats: Option<Mutex<HashMap<&'static str, OpStats>>>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("db_path", &self.router.dir())
            .field("spread_factor", &self.config.spread_factor)
            .field("pool_size", &self.config.pool_size)
            .finish()
    }
}

impl Store {
    /// Opens (creating if needed) the database described by `config`.
    pub fn open(config: StoreConfig) -> Result<Self> {
        config.validate()?;
        let leases = Arc::new(LeaseManager::new(
            config.db_path().join(LEASE_DIR),
            config.lease_timeout,
        )?);
        let router = ShardRouter::new(&config, Arc::clone(&leases))?;

        info!(
            path = %router.dir().display(),
            shards = config.shard_count(),
            pool_size = config.pool_size,
            "store opened"
        );

        Ok(Self {
            stats: config.benchmark.then(|| Mutex::new(HashMap::new())),
            config,
            router,
            leases,
            types: RwLock::new(HashMap::new()),
            expiries: RwLock::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// The `<root>/<NN>` directory holding this database's shards.
    pub fn db_path(&self) -> &Path {
        self.router.dir()
    }

    /// Per-command latency averages, or `None` unless benchmarking is on.
    pub fn stats(&self) -> Option<HashMap<&'static str, OpStats>> {
        self.stats.as_ref().map(|stats| stats.lock().clone())
    }

    /// Free (`true`) / busy (`false`) flags of every opened shard pool.
    pub fn pool_status(&self) -> BTreeMap<String, Vec<bool>> {
        self.router.pool_status()
    }

    // ========================================================================
    // Scalars
    // ========================================================================

    pub fn get(&self, key: &str) -> Result<Option<Value>> {
        let raw = self.dispatch(Command::Get, key, |db| scalars::get(db, key))?;
        Ok(raw.map(|raw| self.make_value(raw)))
    }

    /// Stores `value` at `key`, dropping any scheduled expiry.
    pub fn set(&self, key: &str, value: impl AsRef<[u8]>) -> Result<()> {
        self.dispatch(Command::Set, key, |db| {
            scalars::set(db, key, value.as_ref())?;
            self.forget_expiry(key);
            Ok(())
        })
    }

    pub fn incr(&self, key: &str) -> Result<i64> {
        self.dispatch(Command::Incr, key, |db| scalars::incr_by(db, key, 1))
    }

    pub fn incrby(&self, key: &str, amount: i64) -> Result<i64> {
        self.dispatch(Command::IncrBy, key, |db| scalars::incr_by(db, key, amount))
    }

    pub fn decr(&self, key: &str) -> Result<i64> {
        self.dispatch(Command::Decr, key, |db| scalars::incr_by(db, key, -1))
    }

    pub fn decrby(&self, key: &str, amount: i64) -> Result<i64> {
        let delta = amount
            .checked_neg()
            .ok_or_else(|| Error::NumericConversion(format!("cannot negate {}", amount)))?;
        self.dispatch(Command::DecrBy, key, |db| scalars::incr_by(db, key, delta))
    }

    // ========================================================================
    // Type-agnostic key commands
    // ========================================================================

    /// Removes every storage entry of `key`. Returns whether anything existed.
    pub fn delete(&self, key: &str) -> Result<bool> {
        self.dispatch(Command::Delete, key, |db| keys::purge(self, db, key))
    }

    pub fn exists(&self, key: &str) -> Result<bool> {
        self.dispatch(Command::Exists, key, |db| keys::exists(db, key))
    }

    /// `"string"`, `"list"`, `"hash"`, or `"none"` for a missing key.
    pub fn type_of(&self, key: &str) -> Result<&'static str> {
        self.dispatch(Command::Type, key, |db| {
            Ok(keys::probe_type(db, key)?.map_or("none", TypeTag::name))
        })
    }

    /// Schedules `key` to disappear after `ttl`. Returns `false` when the key
    /// does not exist.
    pub fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        self.dispatch(Command::Expire, key, |db| keys::expire(self, db, key, ttl))
    }

    /// Cancels a pending expiry. Returns `false` when none was scheduled.
    pub fn persist(&self, key: &str) -> Result<bool> {
        self.dispatch(Command::Persist, key, |db| keys::persist(self, db, key))
    }

    /// Remaining time to live in seconds (rounded), `-1` without expiry,
    /// `-2` for a missing key.
    pub fn ttl(&self, key: &str) -> Result<i64> {
        let millis = self.dispatch(Command::Ttl, key, |db| keys::ttl_millis(self, db, key))?;
        Ok(if millis < 0 { millis } else { millis.saturating_add(500) / 1000 })
    }

    /// Like [`Store::ttl`], in milliseconds.
    pub fn pttl(&self, key: &str) -> Result<i64> {
        self.dispatch(Command::Pttl, key, |db| keys::ttl_millis(self, db, key))
    }

    // ========================================================================
    // Lists
    // ========================================================================

    pub fn rpush(&self, key: &str, value: impl AsRef<[u8]>) -> Result<()> {
        self.dispatch(Command::RPush, key, |db| lists::rpush(db, key, value.as_ref()))
    }

    pub fn lpush(&self, key: &str, value: impl AsRef<[u8]>) -> Result<()> {
        self.dispatch(Command::LPush, key, |db| lists::lpush(db, key, value.as_ref()))
    }

    pub fn rpop(&self, key: &str) -> Result<Option<Value>> {
        let raw = self.dispatch(Command::RPop, key, |db| lists::rpop(db, key))?;
        Ok(raw.map(|raw| self.make_value(raw)))
    }

    pub fn lpop(&self, key: &str) -> Result<Option<Value>> {
        let raw = self.dispatch(Command::LPop, key, |db| lists::lpop(db, key))?;
        Ok(raw.map(|raw| self.make_value(raw)))
    }

    pub fn llen(&self, key: &str) -> Result<u64> {
        self.dispatch(Command::LLen, key, |db| lists::llen(db, key))
    }

    pub fn lindex(&self, key: &str, index: i64) -> Result<Option<Value>> {
        let raw = self.dispatch(Command::LIndex, key, |db| lists::lindex(db, key, index))?;
        Ok(raw.map(|raw| self.make_value(raw)))
    }

    /// Overwrites the element at `index`. Returns `false` when there is none.
    pub fn lset(&self, key: &str, index: i64, value: impl AsRef<[u8]>) -> Result<bool> {
        self.dispatch(Command::LSet, key, |db| {
            lists::lset(db, key, index, value.as_ref())
        })
    }

    /// Elements from `start` to `end`, both inclusive.
    pub fn lrange(&self, key: &str, start: i64, end: i64) -> Result<Vec<Value>> {
        let raw = self.dispatch(Command::LRange, key, |db| {
            lists::lrange(db, key, start, end)
        })?;
        Ok(self.make_values(raw))
    }

    /// Keeps only the elements from `start` to `end`, both inclusive.
    pub fn ltrim(&self, key: &str, start: i64, end: i64) -> Result<()> {
        self.dispatch(Command::LTrim, key, |db| lists::ltrim(db, key, start, end))
    }

    /// Removes elements equal to `value`: all of them for `count == 0`, the
    /// first `count` for positive counts, the last `|count|` for negative ones.
    pub fn lrem(&self, key: &str, count: i64, value: impl AsRef<[u8]>) -> Result<u64> {
        self.dispatch(Command::LRem, key, |db| {
            lists::lrem(db, key, count, value.as_ref())
        })
    }

    /// Inserts `value` next to the first element equal to `pivot`.
    ///
    /// Returns the new length, `0` when the list does not exist and `-1` when
    /// `pivot` is not in it.
    pub fn linsert(
        &self,
        key: &str,
        position: InsertPosition,
        pivot: impl AsRef<[u8]>,
        value: impl AsRef<[u8]>,
    ) -> Result<i64> {
        self.dispatch(Command::LInsert, key, |db| {
            lists::linsert(db, key, position, pivot.as_ref(), value.as_ref())
        })
    }

    // ========================================================================
    // Hashes
    // ========================================================================

    /// Returns 1 when `field` is new, 0 when it was overwritten.
    pub fn hset(&self, key: &str, field: impl AsRef<[u8]>, value: impl AsRef<[u8]>) -> Result<i64> {
        self.dispatch(Command::HSet, key, |db| {
            hashes::hset(db, key, field.as_ref(), value.as_ref())
        })
    }

    pub fn hget(&self, key: &str, field: impl AsRef<[u8]>) -> Result<Option<Value>> {
        let raw = self.dispatch(Command::HGet, key, |db| hashes::hget(db, key, field.as_ref()))?;
        Ok(raw.map(|raw| self.make_value(raw)))
    }

    /// Returns 1 when `field` existed, 0 otherwise.
    pub fn hdel(&self, key: &str, field: impl AsRef<[u8]>) -> Result<i64> {
        self.dispatch(Command::HDel, key, |db| hashes::hdel(db, key, field.as_ref()))
    }

    pub fn hkeys(&self, key: &str) -> Result<Vec<Value>> {
        let raw = self.dispatch(Command::HKeys, key, |db| hashes::hkeys(db, key))?;
        Ok(self.make_values(raw))
    }

    pub fn hvalues(&self, key: &str) -> Result<Vec<Value>> {
        let raw = self.dispatch(Command::HValues, key, |db| hashes::hvalues(db, key))?;
        Ok(self.make_values(raw))
    }

    /// Field/value pairs in field order.
    pub fn hgetall(&self, key: &str) -> Result<Vec<(Value, Value)>> {
        let raw = self.dispatch(Command::HGetAll, key, |db| hashes::hgetall(db, key))?;
        Ok(raw
            .into_iter()
            .map(|(field, value)| (self.make_value(field), self.make_value(value)))
            .collect())
    }

    /// Sets every pair in one write.
    pub fn hmset<F, V>(&self, key: &str, pairs: &[(F, V)]) -> Result<()>
    where
        F: AsRef<[u8]>,
        V: AsRef<[u8]>,
    {
        if pairs.is_empty() {
            return Err(Error::validation("HMSET needs at least one field"));
        }
        self.dispatch(Command::HMSet, key, |db| hashes::hmset(db, key, pairs))
    }

    pub fn hmget<F: AsRef<[u8]>>(&self, key: &str, fields: &[F]) -> Result<Vec<Option<Value>>> {
        let raw = self.dispatch(Command::HMGet, key, |db| hashes::hmget(db, key, fields))?;
        Ok(raw
            .into_iter()
            .map(|value| value.map(|raw| self.make_value(raw)))
            .collect())
    }

    // ========================================================================
    // Global commands
    // ========================================================================

    /// Every logical key matching the glob `pattern`, enforcing expiry on the
    /// way. Best effort: see [`keys::keys`].
    pub fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        self.keys_with(pattern, true)
    }

    /// [`Store::keys`] with expiry enforcement optional.
    pub fn keys_with(&self, pattern: &str, check_expired: bool) -> Result<Vec<String>> {
        let matcher = keyspace::glob_to_regex(pattern)?;
        self.dispatch_global(Command::Keys, || {
            keys::keys(self, &matcher, check_expired)
        })
    }

    /// Single-page scan: cursor `0` returns every match with next cursor `0`,
    /// any other cursor returns nothing.
    pub fn scan(&self, cursor: u64, pattern: &str) -> Result<(u64, Vec<String>)> {
        let matcher = keyspace::glob_to_regex(pattern)?;
        self.dispatch_global(Command::Scan, || {
            if cursor != 0 {
                return Ok((0, Vec::new()));
            }
            Ok((0, keys::keys(self, &matcher, true)?))
        })
    }

    /// Destroys every shard of this database.
    pub fn flushdb(&self) -> Result<()> {
        self.dispatch_global(Command::FlushDb, || keys::flushdb(self))
    }

    // ========================================================================
    // Dispatcher
    // ========================================================================

    /// Runs a key-scoped handler under the key's lease with expiry enforced.
    fn dispatch<T>(
        &self,
        command: Command,
        key: &str,
        op: impl FnOnce(&dyn OrderedStore) -> Result<T>,
    ) -> Result<T> {
        let started = Instant::now();
        keyspace::validate_key(key)?;
        if let Some(requested) = command.type_tag() {
            self.check_type(key, requested)?;
        }

        let result = (|| -> Result<T> {
            let _global = self.leases.acquire(GLOBAL_LEASE, LeaseMode::Shared)?;
            let _key = self
                .leases
                .acquire(&key_lease_name(key), LeaseMode::Exclusive)?;
            let conn = self.router.connection(key)?;

            self.enforce_expiry(&conn, key)?;
            if command.creates() {
                if let Some(requested) = command.type_tag() {
                    self.confirm_type(&*conn, key, requested)?;
                }
            }
            let value = op(&*conn)?;

            if command.may_remove() {
                self.types.write().remove(key);
            } else if command.creates() {
                if let Some(tag) = command.type_tag() {
                    self.types.write().insert(key.to_string(), tag);
                }
            }
            Ok(value)
        })();

        self.record(command, started);
        result
    }

    /// Runs a global handler with every key-scoped command drained.
    fn dispatch_global<T>(&self, command: Command, op: impl FnOnce() -> Result<T>) -> Result<T> {
        let started = Instant::now();
        let result = self
            .leases
            .acquire(GLOBAL_LEASE, LeaseMode::Exclusive)
            .and_then(|_global| op());
        self.record(command, started);
        result
    }

    fn record(&self, command: Command, started: Instant) {
        if let Some(stats) = &self.stats {
            stats
                .lock()
                .entry(command.name())
                .or_default()
                .record(started.elapsed());
        }
    }

    /// Fails when `key` already holds a different type than `requested`.
    ///
    /// Runs before any lease is taken, so it borrows a shard connection of
    /// its own for the probe. A cached tag that disagrees is checked against
    /// the shard first, since another process may have replaced the key. A
    /// conflicting key whose expiry has passed is not a conflict: it is
    /// purged once the lease is held.
    fn check_type(&self, key: &str, requested: TypeTag) -> Result<()> {
        if self.types.read().get(key) == Some(&requested) {
            return Ok(());
        }

        let conn = self.router.connection(key)?;
        let Some(existing) = self.refresh_type(&*conn, key)? else {
            return Ok(());
        };
        if existing == requested {
            return Ok(());
        }

        if let Some(deadline) = keys::read_expiry(&*conn, key)? {
            if deadline <= now_millis() {
                return Ok(());
            }
        }
        Err(type_conflict(key, existing, requested))
    }

    /// Re-checks the type under the key lease before a command that may
    /// create the key, so two creators of different types cannot both pass
    /// the unlocked check on a missing key.
    fn confirm_type(&self, db: &dyn OrderedStore, key: &str, requested: TypeTag) -> Result<()> {
        match self.refresh_type(db, key)? {
            Some(existing) if existing != requested => {
                Err(type_conflict(key, existing, requested))
            }
            _ => Ok(()),
        }
    }

    /// Probes the shard for the type of `key` and syncs the registry with it.
    fn refresh_type(&self, db: &dyn OrderedStore, key: &str) -> Result<Option<TypeTag>> {
        let tag = keys::probe_type(db, key)?;
        match tag {
            Some(tag) => {
                self.types.write().insert(key.to_string(), tag);
            }
            None => {
                self.types.write().remove(key);
            }
        }
        Ok(tag)
    }

    /// Purges `key` when its expiry has passed. Returns whether it did.
    ///
    /// Reads the persisted record rather than the cache: under the key lease
    /// the record is authoritative, and another process may have changed it.
    fn enforce_expiry(&self, conn: &Connection, key: &str) -> Result<bool> {
        match keys::read_expiry(&**conn, key)? {
            Some(deadline) if deadline <= now_millis() => {
                keys::purge(self, &**conn, key)?;
                debug!(key, shard = conn.shard(), "expired key purged");
                Ok(true)
            }
            Some(deadline) => {
                self.remember_expiry(key, deadline);
                Ok(false)
            }
            None => {
                self.forget_expiry(key);
                Ok(false)
            }
        }
    }

    /// Absolute expiry of `key` in unix milliseconds, from the cache or the
    /// persisted record.
    pub(crate) fn expiry_deadline(&self, db: &dyn OrderedStore, key: &str) -> Result<Option<u64>> {
        if let Some(deadline) = self.expiries.read().get(key) {
            return Ok(Some(*deadline));
        }

        let deadline = keys::read_expiry(db, key)?;
        if let Some(deadline) = deadline {
            self.expiries.write().insert(key.to_string(), deadline);
        }
        Ok(deadline)
    }

    pub(crate) fn remember_expiry(&self, key: &str, deadline: u64) {
        self.expiries.write().insert(key.to_string(), deadline);
    }

    pub(crate) fn forget_expiry(&self, key: &str) {
        self.expiries.write().remove(key);
    }

    /// Drops both cache entries of `key`.
    pub(crate) fn forget(&self, key: &str) {
        self.types.write().remove(key);
        self.expiries.write().remove(key);
    }

    pub(crate) fn clear_caches(&self) {
        self.types.write().clear();
        self.expiries.write().clear();
    }

    pub(crate) fn router(&self) -> &ShardRouter {
        &self.router
    }

    fn make_value(&self, raw: Vec<u8>) -> Value {
        Value::from_raw(raw, self.config.decode_responses)
    }

    fn make_values(&self, raw: Vec<Vec<u8>>) -> Vec<Value> {
        raw.into_iter().map(|raw| self.make_value(raw)).collect()
    }
}

fn type_conflict(key: &str, existing: TypeTag, requested: TypeTag) -> Error {
    Error::TypeConflict {
        key: key.to_string(),
        existing: existing.name(),
        requested: requested.name(),
    }
}

/// Current unix time in milliseconds.
pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Direction;
    use std::thread;
    use tempfile::TempDir;

    pub(crate) fn open_store(dir: &TempDir) -> Store {
        Store::open(
            StoreConfig::new(dir.path())
                .with_spread_factor(1)
                .with_pool_size(4)
                .with_decode_responses(true)
                .with_lease_timeout(Duration::from_secs(30)),
        )
        .unwrap()
    }

    #[test]
    fn test_command_table_is_consistent() {
        for command in Command::ALL {
            assert_eq!(Command::from_name(command.name()), Some(command));
            assert_eq!(
                Command::from_name(&command.name().to_lowercase()),
                Some(command)
            );
        }
        assert_eq!(Command::from_name("NOPE"), None);

        let global: Vec<_> = Command::ALL.into_iter().filter(|c| c.is_global()).collect();
        assert_eq!(global, vec![Command::Keys, Command::Scan, Command::FlushDb]);
        assert_eq!(Command::RPop.type_tag(), Some(TypeTag::List));
        assert_eq!(Command::Delete.type_tag(), None);
    }

    #[test]
    fn test_type_conflict_and_delete() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        store.set("k", "x").unwrap();
        let err = store.hset("k", "f", "v").unwrap_err();
        assert!(matches!(
            err,
            Error::TypeConflict { existing: "string", requested: "hash", .. }
        ));
        assert!(matches!(
            store.rpush("k", "v"),
            Err(Error::TypeConflict { .. })
        ));

        assert!(store.delete("k").unwrap());
        assert_eq!(store.hset("k", "f", "v").unwrap(), 1);
        assert_eq!(store.type_of("k").unwrap(), "hash");
        assert!(matches!(store.get("k"), Err(Error::TypeConflict { .. })));
    }

    #[test]
    fn test_type_survives_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let store = open_store(&dir);
            store.rpush("list", "a").unwrap();
        }
        let store = open_store(&dir);
        assert_eq!(store.type_of("list").unwrap(), "list");
        assert!(matches!(store.set("list", "x"), Err(Error::TypeConflict { .. })));
        assert_eq!(store.lpop("list").unwrap().unwrap(), "a");

        // The emptied list no longer binds the key
        store.set("list", "x").unwrap();
        assert_eq!(store.type_of("list").unwrap(), "string");
    }

    #[test]
    fn test_invalid_keys_rejected_before_io() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        let bad = format!("a{}b", keyspace::SEP);
        assert!(matches!(store.set(&bad, "v"), Err(Error::Validation(_))));
        assert!(matches!(store.get(""), Err(Error::Validation(_))));
        assert!(store.pool_status().is_empty());
    }

    #[test]
    fn test_concurrent_incr_is_serialized() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(open_store(&dir));

        let workers: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for _ in 0..25 {
                        store.incr("counter").unwrap();
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        assert_eq!(store.get("counter").unwrap().unwrap(), "100");
    }

    #[test]
    fn test_two_stores_share_a_directory() {
        let dir = TempDir::new().unwrap();
        let a = open_store(&dir);
        let b = open_store(&dir);

        a.set("k", "v").unwrap();
        assert_eq!(b.get("k").unwrap().unwrap(), "v");

        // `a` has "x" cached as a string; `b` turns it into a list
        a.set("x", "s").unwrap();
        assert!(b.delete("x").unwrap());
        b.rpush("x", "item").unwrap();
        assert_eq!(a.lrange("x", 0, -1).unwrap(), vec!["item"]);
        assert!(matches!(a.get("x"), Err(Error::TypeConflict { .. })));

        // Expiry set through one store is enforced by the other
        a.expire("k", Duration::from_secs(60)).unwrap();
        assert!(b.persist("k").unwrap());
        assert_eq!(a.ttl("k").unwrap(), -1);
    }

    #[test]
    fn test_concurrent_incr_across_stores() {
        let dir = TempDir::new().unwrap();
        let stores = [Arc::new(open_store(&dir)), Arc::new(open_store(&dir))];

        let workers: Vec<_> = stores
            .iter()
            .flat_map(|store| [Arc::clone(store), Arc::clone(store)])
            .map(|store| {
                thread::spawn(move || {
                    for _ in 0..20 {
                        store.incr("counter").unwrap();
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        assert_eq!(stores[0].get("counter").unwrap().unwrap(), "80");
        assert_eq!(stores[1].get("counter").unwrap().unwrap(), "80");
    }

    #[test]
    fn test_racing_creators_of_different_types() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(open_store(&dir));

        for round in 0..20 {
            let key = format!("race:{}", round);
            let scalar = {
                let store = Arc::clone(&store);
                let key = key.clone();
                thread::spawn(move || store.set(&key, "v"))
            };
            let hash = {
                let store = Arc::clone(&store);
                let key = key.clone();
                thread::spawn(move || store.hset(&key, "f", "v"))
            };

            let scalar = scalar.join().unwrap();
            let hash = hash.join().unwrap();
            assert!(scalar.is_ok() != hash.is_ok(), "round {}", round);
            for result in [scalar.err(), hash.err()].into_iter().flatten() {
                assert!(matches!(result, Error::TypeConflict { .. }));
            }

            let conn = store.router().connection(&key).unwrap();
            let bare = conn.get(&keyspace::scalar_key(&key)).unwrap().is_some();
            let compound = conn
                .first_in_prefix(&keyspace::compound_prefix(&key), Direction::Ascending)
                .unwrap()
                .is_some();
            assert!(bare != compound, "round {}", round);
        }
    }

    #[test]
    fn test_stats_only_when_benchmarking() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        store.set("k", "v").unwrap();
        assert!(store.stats().is_none());

        let dir = TempDir::new().unwrap();
        let store = Store::open(
            StoreConfig::new(dir.path())
                .with_spread_factor(1)
                .with_benchmark(true),
        )
        .unwrap();
        store.set("k", "v").unwrap();
        store.set("k", "w").unwrap();
        store.get("k").unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats["SET"].calls, 2);
        assert_eq!(stats["GET"].calls, 1);
        assert!(!stats.contains_key("HGET"));
    }

    #[test]
    fn test_op_stats_running_average() {
        let mut stats = OpStats::default();
        stats.record(Duration::from_millis(10));
        stats.record(Duration::from_millis(30));
        assert_eq!(stats.calls, 2);
        let average = stats.average.as_secs_f64();
        assert!((average - 0.020).abs() < 1e-9);
    }

    #[test]
    fn test_db_path_and_pool_status() {
        let dir = TempDir::new().unwrap();
        let store = Store::open(
            StoreConfig::new(dir.path())
                .with_db(4)
                .with_spread_factor(1)
                .with_pool_size(3),
        )
        .unwrap();
        assert_eq!(store.db_path(), dir.path().join("04").as_path());

        store.set("k", "v").unwrap();
        let status = store.pool_status();
        assert_eq!(status.len(), 1);
        assert!(status.values().all(|slots| slots == &vec![true, true, true]));
    }
}
