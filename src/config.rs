//! Store configuration.
//!
//! Everything is fixed at construction time; a [`StoreConfig`] is consumed by
//! [`Store::open`](crate::Store::open) and never changes afterwards.

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default database root, relative to the working directory.
pub const DEFAULT_PATH: &str = "shelfkv-data";

/// Largest accepted spread factor (16^8 shards is already far too many files).
pub const MAX_SPREAD_FACTOR: usize = 8;

/// Constructor-level configuration of a [`Store`](crate::Store).
///
/// # Example
///
/// ```
/// use shelfkv::StoreConfig;
/// use std::time::Duration;
///
/// let config = StoreConfig::new("/tmp/shelfkv")
///     .with_db(3)
///     .with_spread_factor(1)
///     .with_pool_size(4)
///     .with_lease_timeout(Duration::from_secs(2));
///
/// assert!(config.db_path().ends_with("03"));
/// ```
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Root directory holding one sub-directory per database index
    pub path: PathBuf,
    /// Database index, used as a two-digit path segment
    pub db: u32,
    /// Number of hex digits of SHA-1(key) selecting the shard (16^factor shards)
    pub spread_factor: usize,
    /// Pooled handles per shard
    pub pool_size: usize,
    /// Return values as UTF-8 text instead of raw bytes
    pub decode_responses: bool,
    /// Record per-command running-average latency
    pub benchmark: bool,
    /// How long to wait for a key-scoped or global lease
    pub lease_timeout: Duration,
    /// Sleep between attempts to grab a free pooled handle
    pub pool_poll_interval: Duration,
    /// Attempts before pool acquisition gives up
    pub pool_max_retries: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_PATH),
            db: 0,
            spread_factor: 2,
            pool_size: 16,
            decode_responses: false,
            benchmark: false,
            lease_timeout: Duration::from_secs(5),
            pool_poll_interval: Duration::from_millis(10),
            pool_max_retries: 500,
        }
    }
}

impl StoreConfig {
    /// Creates a default configuration rooted at `path`.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            ..Default::default()
        }
    }

    pub fn with_db(mut self, db: u32) -> Self {
        self.db = db;
        self
    }

    pub fn with_spread_factor(mut self, spread_factor: usize) -> Self {
        self.spread_factor = spread_factor;
        self
    }

    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    pub fn with_decode_responses(mut self, decode: bool) -> Self {
        self.decode_responses = decode;
        self
    }

    pub fn with_benchmark(mut self, benchmark: bool) -> Self {
        self.benchmark = benchmark;
        self
    }

    pub fn with_lease_timeout(mut self, timeout: Duration) -> Self {
        self.lease_timeout = timeout;
        self
    }

    pub fn with_pool_retry(mut self, poll_interval: Duration, max_retries: u32) -> Self {
        self.pool_poll_interval = poll_interval;
        self.pool_max_retries = max_retries;
        self
    }

    /// The directory holding this database's shard files: `<path>/<NN>`.
    pub fn db_path(&self) -> PathBuf {
        self.path.join(format!("{:02}", self.db))
    }

    /// Number of shards this configuration can spread keys over.
    pub fn shard_count(&self) -> u64 {
        16u64.pow(self.spread_factor as u32)
    }

    /// Rejects configurations the router cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.spread_factor == 0 || self.spread_factor > MAX_SPREAD_FACTOR {
            return Err(Error::validation(format!(
                "spread factor must be between 1 and {}, got {}",
                MAX_SPREAD_FACTOR, self.spread_factor
            )));
        }
        if self.pool_size == 0 {
            return Err(Error::validation("pool size must be at least 1"));
        }
        if self.pool_max_retries == 0 {
            return Err(Error::validation("pool retry budget must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = StoreConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.shard_count(), 256);
    }

    #[test]
    fn test_db_path_is_two_digits() {
        let config = StoreConfig::new("/data").with_db(7);
        assert_eq!(config.db_path(), PathBuf::from("/data/07"));

        let config = StoreConfig::new("/data").with_db(12);
        assert_eq!(config.db_path(), PathBuf::from("/data/12"));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(StoreConfig::default().with_spread_factor(0).validate().is_err());
        assert!(StoreConfig::default().with_spread_factor(9).validate().is_err());
        assert!(StoreConfig::default().with_pool_size(0).validate().is_err());
        assert!(StoreConfig::default()
            .with_pool_retry(Duration::from_millis(1), 0)
            .validate()
            .is_err());
    }
}
