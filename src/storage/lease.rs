//! Named, timeout-bounded leases shared between threads and processes.
//!
//! A lease is an advisory lock (`flock` on Unix, `LockFileEx` on Windows) on a
//! small file whose name is derived from the lease name. Every acquisition
//! opens its own file handle, so two threads of the same process contend just
//! like two processes do.
//!
//! Leases come in two modes. Key-scoped commands hold the global lease
//! [`LeaseMode::Shared`] and their key's lease [`LeaseMode::Exclusive`];
//! global commands (`KEYS`, `SCAN`, `FLUSHDB`) hold the global lease
//! exclusively, which drains and blocks all key-scoped traffic.

use crate::error::{Error, Result};
use fs2::FileExt;
use sha1::{Digest, Sha1};
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};
use tracing::trace;

/// Name of the lease serializing global commands against everything else.
pub const GLOBAL_LEASE: &str = "global";

const MIN_BACKOFF: Duration = Duration::from_millis(1);
const MAX_BACKOFF: Duration = Duration::from_millis(25);

/// How a lease is held.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaseMode {
    Shared,
    Exclusive,
}

/// Hands out leases stored under one directory.
#[derive(Debug)]
pub struct LeaseManager {
    dir: PathBuf,
    timeout: Duration,
}

/// A held lease. Released when dropped.
#[derive(Debug)]
pub struct Lease {
    file: File,
    name: String,
}

impl Lease {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
        trace!(lease = %self.name, "lease released");
    }
}

impl LeaseManager {
    /// Creates a manager keeping its lock files in `dir`.
    pub fn new(dir: impl AsRef<Path>, timeout: Duration) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Acquires `name` in `mode`, polling until the configured timeout.
    ///
    /// Fails with [`Error::LeaseTimeout`] when the lease stays taken; there is
    /// no retry beyond that.
    pub fn acquire(&self, name: &str, mode: LeaseMode) -> Result<Lease> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(self.lease_path(name))?;

        let deadline = Instant::now() + self.timeout;
        let mut backoff = MIN_BACKOFF;

        loop {
            let attempt = match mode {
                LeaseMode::Shared => FileExt::try_lock_shared(&file),
                LeaseMode::Exclusive => FileExt::try_lock_exclusive(&file),
            };

            match attempt {
                Ok(()) => {
                    trace!(lease = %name, ?mode, "lease acquired");
                    return Ok(Lease {
                        file,
                        name: name.to_string(),
                    });
                }
                Err(e) if is_contended(&e) => {}
                Err(e) => return Err(e.into()),
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(Error::LeaseTimeout {
                    name: name.to_string(),
                    timeout: self.timeout,
                });
            }
            thread::sleep(backoff.min(deadline - now));
            backoff = (backoff * 2).min(MAX_BACKOFF);
        }
    }

    /// Lock file for `name`. Names are hashed so any key maps to a valid
    /// file name.
    fn lease_path(&self, name: &str) -> PathBuf {
        self.dir
            .join(format!("{:x}.lease", Sha1::digest(name.as_bytes())))
    }
}

fn is_contended(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::WouldBlock
        || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

/// Lease name guarding a single logical key.
pub fn key_lease_name(key: &str) -> String {
    format!("key-{}", key)
}

/// Lease name held by the process that has a shard's file open.
pub fn shard_lease_name(shard: &str) -> String {
    format!("shard-{}", shard)
}
