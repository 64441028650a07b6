//! Storage layer: shard files, their pools, and cross-process leases.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       ShardRouter                           │
//! │   SHA-1(key)[..spread] ──> shard id ──> ShardPool           │
//! │                                                             │
//! │  ┌───────────┐ ┌───────────┐ ┌───────────┐                  │
//! │  │ 0a.shelfdb│ │ 3f.shelfdb│ │ c7.shelfdb│  ... lazily      │
//! │  │ pool: N   │ │ pool: N   │ │ pool: N   │      opened      │
//! │  └───────────┘ └───────────┘ └───────────┘                  │
//! └─────────────────────────────────────────────────────────────┘
//!                ▲
//!                │  named leases (file locks), shared by every
//!                │  process using the same database directory
//!       ┌────────┴────────┐
//!       │  LeaseManager   │
//!       └─────────────────┘
//! ```
//!
//! Each shard file is an [`OrderedStore`]: a sorted byte-key/byte-value map
//! with range scans in both directions. [`RedbStore`] is the backend used
//! for shard files. A process keeps a shard file open only while it has a
//! connection to it checked out, holding the shard's lease for that time.

pub mod lease;
pub mod ordered;
pub mod redb_store;
pub mod router;

// Re-export commonly used types
pub use lease::{Lease, LeaseManager, LeaseMode};
pub use ordered::{BatchOp, Direction, OrderedStore, Visitor, WriteBatch};
pub use redb_store::RedbStore;
pub use router::{Connection, ShardPool, ShardRouter, SHARD_EXTENSION};
