//! # levelkv-store — Redis-style composite types on an ordered KV engine
//!
//! Lists and sorted sets encoded as flat, lexicographically ordered keys.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   key string   ┌─────────────┐
//! │ command     │ ─────────────► │  Registry   │  one instance per key
//! │ layer       │                └──────┬──────┘
//! └─────────────┘                       │
//!                          ┌────────────┴────────────┐
//!                          ▼                         ▼
//!                   ┌─────────────┐           ┌─────────────┐
//!                   │ LevelList   │           │ LevelZSet   │
//!                   │ (window)    │           │ (dual index)│
//!                   └──────┬──────┘           └──────┬──────┘
//!                          │  codec keys + WriteBatch │
//!                          └────────────┬─────────────┘
//!                                       ▼
//!                               ┌──────────────┐
//!                               │  OrderedKv   │  RocksDB / memory
//!                               └──────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`engine`] — engine contract, write batches, RocksDB and in-memory backends
//! - [`codec`] — key layout and order-preserving score encoding
//! - [`list`] — deque over a sliding cursor window
//! - [`zset`] — sorted set over member and score indices
//! - [`registry`] — per-key instance table
//!
//! Every mutation is exactly one atomic batch. In-memory cursors and counts
//! change only after that batch succeeds.

pub mod codec;
pub mod engine;
pub mod error;
pub mod list;
pub mod registry;
pub mod zset;

pub use engine::{
    BatchOp, Direction, MemoryEngine, OrderedKv, RocksEngine, ScanFn, StoreConfig, WriteBatch,
};
pub use error::{StoreError, StoreResult};
pub use list::{End, LevelList};
pub use registry::Registry;
pub use zset::{LevelZSet, ScoredMember};
