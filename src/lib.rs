//! # ShelfKV - An On-Disk Data-Structure Store
//!
//! ShelfKV is an embeddable store with a Redis-like command surface (strings,
//! lists, hashes, expiry) that keeps every structure on disk instead of in
//! RAM, so datasets can grow far beyond memory.
//!
//! ## Features
//!
//! - **Sharded Files**: keys are spread over `16^spread` redb files by SHA-1
//! - **O(1) Push at Both Ends**: lists are numbered slots growing outward from a midpoint
//! - **Multi-Process Safe**: leases are file locks, and a shard file is only
//!   held open while a process is using it
//! - **Lazy Expiry**: deadlines are persisted and enforced when a key is touched
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              ShelfKV                                    │
//! │                                                                         │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────────────────────┐  │
//! │  │   Shell     │───>│  Command    │───>│          Store              │  │
//! │  │ (tokenizer) │    │  Handler    │    │  validate → type check →    │  │
//! │  └─────────────┘    └─────────────┘    │  leases → expiry → handler  │  │
//! │                                        └──────────────┬──────────────┘  │
//! │                                                       │                 │
//! │                                                       ▼                 │
//! │  ┌─────────────┐    ┌──────────────────────────────────────────────┐    │
//! │  │   Lease     │    │              ShardRouter                     │    │
//! │  │  Manager    │    │  ┌────────┐ ┌────────┐ ┌────────┐ ┌────────┐ │    │
//! │  │ (flock)     │    │  │ 00.db  │ │ 01.db  │ │ 02.db  │ │...ff   │ │    │
//! │  └─────────────┘    │  │pool: N │ │pool: N │ │pool: N │ │        │ │    │
//! │                     │  └────────┘ └────────┘ └────────┘ └────────┘ │    │
//! │                     └──────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use shelfkv::{InsertPosition, Store, StoreConfig};
//! use std::time::Duration;
//!
//! let store = Store::open(StoreConfig::new("/tmp/shelfkv").with_decode_responses(true))?;
//!
//! store.set("name", "Ariz")?;
//! store.expire("name", Duration::from_secs(60))?;
//!
//! store.rpush("queue", "b")?;
//! store.lpush("queue", "a")?;
//! store.linsert("queue", InsertPosition::After, "b", "c")?;
//! assert_eq!(store.lrange("queue", 0, -1)?, vec!["a", "b", "c"]);
//!
//! store.hset("user:1", "email", "ariz@example.com")?;
//! assert_eq!(store.keys("user:*")?, vec!["user:1"]);
//! # Ok::<(), shelfkv::Error>(())
//! ```
//!
//! ## Module Overview
//!
//! - [`store`]: the [`Store`] facade, dispatcher and per-type handlers
//! - [`storage`]: shard router, pools, leases and the ordered-store backend
//! - [`keyspace`]: encoding of logical keys into storage keys
//! - [`commands`]: name-to-handler command table used by the shell
//! - [`protocol`]: shell tokenizer and reply type
//!
//! ## Design Highlights
//!
//! ### One Key, One Shard
//!
//! Every storage key derived from a logical key starts with that key, and the
//! shard is chosen from the logical key alone, so a command never spans
//! shards.
//!
//! ### Locking Order
//!
//! A key-scoped command holds the global lease shared and its key's lease
//! exclusively; `KEYS`, `SCAN` and `FLUSHDB` hold the global lease
//! exclusively. Pooled shard handles are taken once the leases are held,
//! except for the type probe that runs before leasing.

pub mod commands;
pub mod config;
pub mod error;
pub mod keyspace;
pub mod protocol;
pub mod storage;
pub mod store;

// Re-export commonly used types for convenience
pub use commands::CommandHandler;
pub use config::StoreConfig;
pub use error::{Error, Result};
pub use keyspace::TypeTag;
pub use protocol::{tokenize, ParseError, Reply};
pub use store::{Command, InsertPosition, OpStats, Store, Value};

/// Version of ShelfKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
