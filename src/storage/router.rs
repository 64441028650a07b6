//! Hash-sharding router with a bounded handle pool per shard.
//!
//! ## Routing
//!
//! ```text
//!   logical key ──SHA-1──> "a9993e36..." ──first N hex digits──> shard "a9"
//!                                                                   │
//!                                        <db path>/a9.shelfdb  <────┘
//! ```
//!
//! Every storage key of a logical key lives in that single shard file, so a
//! command only ever touches one shard.
//!
//! ## Pooling
//!
//! Pools are created lazily, the first time a shard is addressed. A pool
//! hands out a fixed number of [`Connection`]s. When all are busy the caller
//! polls with a short sleep, up to a bounded number of attempts, then gives up
//! with [`Error::ResourceExhausted`]. Connections go back to the pool when
//! dropped.
//!
//! ## Sharing a shard file between processes
//!
//! A redb file can only be open in one process at a time. The first
//! connection checked out of an idle pool takes the shard's lease exclusively
//! and opens the file; the last connection returned closes it and then
//! releases the lease. Threads of one process share the open file, while
//! other processes wait on the lease until this one goes idle on the shard.
//!
//! ```text
//!   checkout:  active == 0 ? lease(shard) + open file : reuse   active += 1
//!   checkin:   active -= 1   active == 0 ? close file, then drop lease
//! ```

use crate::config::StoreConfig;
use crate::error::{Error, Result};
use crate::keyspace;
use crate::storage::lease::{shard_lease_name, Lease, LeaseManager, LeaseMode};
use crate::storage::ordered::OrderedStore;
use crate::storage::redb_store::RedbStore;
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// File extension of shard files.
pub const SHARD_EXTENSION: &str = "shelfdb";

/// A shard file opened under its lease.
///
/// Fields drop in declaration order: the file is closed before the lease
/// lets another process open it.
struct OpenShard {
    store: RedbStore,
    _lease: Lease,
}

/// Open file of a pool and the number of connections using it.
#[derive(Default)]
struct ShardFile {
    active: usize,
    open: Option<Arc<OpenShard>>,
}

/// The fixed set of handles of one shard.
pub struct ShardPool {
    shard: String,
    path: PathBuf,
    leases: Arc<LeaseManager>,
    busy: Vec<AtomicBool>,
    file: Mutex<ShardFile>,
}

impl std::fmt::Debug for ShardPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardPool")
            .field("shard", &self.shard)
            .field("size", &self.busy.len())
            .field("open", &self.is_open())
            .finish()
    }
}

impl ShardPool {
    fn new(shard: &str, path: PathBuf, leases: Arc<LeaseManager>, size: usize) -> Self {
        Self {
            shard: shard.to_string(),
            path,
            leases,
            busy: (0..size).map(|_| AtomicBool::new(false)).collect(),
            file: Mutex::new(ShardFile::default()),
        }
    }

    /// Claims the first free slot, if any.
    fn try_claim(&self) -> Option<usize> {
        self.busy.iter().position(|flag| {
            flag.compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
        })
    }

    /// Turns a claimed slot into a connection, opening the file if the pool
    /// was idle. The slot is freed again when opening fails.
    fn connect(self: &Arc<Self>, slot: usize) -> Result<Connection> {
        match self.checkout() {
            Ok(open) => Ok(Connection {
                pool: Arc::clone(self),
                slot,
                open,
            }),
            Err(e) => {
                self.busy[slot].store(false, Ordering::Release);
                Err(e)
            }
        }
    }

    fn checkout(&self) -> Result<Arc<OpenShard>> {
        let mut file = self.file.lock();
        if let Some(open) = file.open.clone() {
            file.active += 1;
            return Ok(open);
        }

        let lease = self
            .leases
            .acquire(&shard_lease_name(&self.shard), LeaseMode::Exclusive)?;
        let store = RedbStore::open(&self.path)?;
        let open = Arc::new(OpenShard {
            store,
            _lease: lease,
        });
        file.open = Some(Arc::clone(&open));
        file.active += 1;
        trace!(shard = %self.shard, "shard file opened");
        Ok(open)
    }

    /// Forgets the open file once no connection uses it. The file itself
    /// closes when the returning connection drops its handle.
    fn checkin(&self) {
        let mut file = self.file.lock();
        file.active = file.active.saturating_sub(1);
        if file.active == 0 && file.open.take().is_some() {
            trace!(shard = %self.shard, "shard file released");
        }
    }

    /// Whether this process currently holds the shard file open.
    pub fn is_open(&self) -> bool {
        self.file.lock().open.is_some()
    }

    /// `true` for every free slot.
    pub fn status(&self) -> Vec<bool> {
        self.busy
            .iter()
            .map(|flag| !flag.load(Ordering::Relaxed))
            .collect()
    }
}

/// A pooled shard handle. Dereferences to the shard's [`OrderedStore`] and
/// frees its slot when dropped.
pub struct Connection {
    pool: Arc<ShardPool>,
    slot: usize,
    open: Arc<OpenShard>,
}

impl Connection {
    pub fn shard(&self) -> &str {
        &self.pool.shard
    }
}

impl Deref for Connection {
    type Target = dyn OrderedStore;

    fn deref(&self) -> &Self::Target {
        &self.open.store
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.pool.checkin();
        self.pool.busy[self.slot].store(false, Ordering::Release);
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("shard", &self.pool.shard)
            .field("slot", &self.slot)
            .finish()
    }
}

/// Maps logical keys to shard files and owns their pools.
pub struct ShardRouter {
    dir: PathBuf,
    spread_factor: usize,
    pool_size: usize,
    poll_interval: Duration,
    max_retries: u32,
    leases: Arc<LeaseManager>,
    pools: RwLock<BTreeMap<String, Arc<ShardPool>>>,
}

impl std::fmt::Debug for ShardRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardRouter")
            .field("dir", &self.dir)
            .field("spread_factor", &self.spread_factor)
            .field("open_shards", &self.pools.read().len())
            .finish()
    }
}

impl ShardRouter {
    /// Creates a router over `config.db_path()`. No shard is opened yet.
    pub fn new(config: &StoreConfig, leases: Arc<LeaseManager>) -> Result<Self> {
        config.validate()?;
        let dir = config.db_path();
        std::fs::create_dir_all(&dir)?;

        Ok(Self {
            dir,
            spread_factor: config.spread_factor,
            pool_size: config.pool_size,
            poll_interval: config.pool_poll_interval,
            max_retries: config.pool_max_retries,
            leases,
            pools: RwLock::new(BTreeMap::new()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Shard id of `key`.
    pub fn shard_id(&self, key: &str) -> String {
        keyspace::shard_id(key, self.spread_factor)
    }

    /// Path of the file backing `shard`.
    pub fn shard_path(&self, shard: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", shard, SHARD_EXTENSION))
    }

    /// A handle to the shard holding `key`.
    pub fn connection(&self, key: &str) -> Result<Connection> {
        let shard = self.shard_id(key);
        self.shard_connection(&shard)
    }

    /// A handle to every shard that has a file on disk, ascending by shard id.
    ///
    /// Handles are acquired one at a time as the iterator advances, so a
    /// caller walking all shards holds at most one at once.
    pub fn all_connections(&self) -> Result<impl Iterator<Item = Result<Connection>> + '_> {
        let shards = self.existing_shards()?;
        Ok(shards
            .into_iter()
            .map(move |shard| self.shard_connection(&shard)))
    }

    /// Closes every pool and deletes every shard file.
    pub fn reset(&self) -> Result<()> {
        let mut pools = self.pools.write();
        pools.clear();

        let shards = self.existing_shards()?;
        for shard in &shards {
            std::fs::remove_file(self.shard_path(shard))?;
        }
        debug!(dir = %self.dir.display(), removed = shards.len(), "shards reset");
        Ok(())
    }

    /// Free/busy flags of every opened pool (`true` = free).
    pub fn pool_status(&self) -> BTreeMap<String, Vec<bool>> {
        self.pools
            .read()
            .iter()
            .map(|(shard, pool)| (shard.clone(), pool.status()))
            .collect()
    }

    fn shard_connection(&self, shard: &str) -> Result<Connection> {
        let pool = self.pool(shard);

        for attempt in 0..self.max_retries {
            if let Some(slot) = pool.try_claim() {
                return pool.connect(slot);
            }
            if attempt == 0 {
                debug!(shard, "all pooled connections busy, waiting");
            }
            thread::sleep(self.poll_interval);
        }

        warn!(
            shard,
            attempts = self.max_retries,
            "giving up on shard connection"
        );
        Err(Error::ResourceExhausted {
            shard: shard.to_string(),
            attempts: self.max_retries,
        })
    }

    fn pool(&self, shard: &str) -> Arc<ShardPool> {
        if let Some(pool) = self.pools.read().get(shard) {
            return Arc::clone(pool);
        }

        let mut pools = self.pools.write();
        let pool = pools.entry(shard.to_string()).or_insert_with(|| {
            debug!(shard, size = self.pool_size, "shard pool created");
            Arc::new(ShardPool::new(
                shard,
                self.shard_path(shard),
                Arc::clone(&self.leases),
                self.pool_size,
            ))
        });
        Arc::clone(pool)
    }

    /// Shard ids with a file on disk, sorted.
    fn existing_shards(&self) -> Result<Vec<String>> {
        let mut shards = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(SHARD_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                if stem.len() == self.spread_factor && stem.chars().all(|c| c.is_ascii_hexdigit())
                {
                    shards.push(stem.to_string());
                }
            }
        }
        shards.sort();
        Ok(shards)
    }
}
