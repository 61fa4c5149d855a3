//! Ordered key-value engine adapter.
//!
//! Architecture:
//! ```text
//! ┌──────────────┐  get / write(batch) / enumerate  ┌──────────────┐
//! │ LevelList    │ ───────────────────────────────► │  OrderedKv   │
//! │ LevelZSet    │                                  │  (dyn trait) │
//! └──────────────┘                                  └──────┬───────┘
//!                                                          │
//!                                          ┌───────────────┴──────────────┐
//!                                          ▼                              ▼
//!                                  ┌──────────────┐               ┌──────────────┐
//!                                  │ MemoryEngine │               │ RocksEngine  │
//!                                  │ (BTreeMap)   │               │ (RocksDB)    │
//!                                  └──────────────┘               └──────────────┘
//! ```
//!
//! The adapter carries no business logic. Structures collect every mutation
//! of one operation into a [`WriteBatch`] and submit it once; the engine
//! applies it fully or not at all.
//!
//! Reference: Kleppmann — DDIA, Chapter 3 (SSTables and LSM-Trees)

pub mod batch;
pub mod memory;
pub mod rocks;

pub use batch::{BatchOp, WriteBatch};
pub use memory::MemoryEngine;
pub use rocks::{RocksEngine, StoreConfig};

use crate::error::StoreResult;
use std::ops::ControlFlow;

/// Scan direction for [`OrderedKv::enumerate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Ascending key order, starting at `min`
    Forward,
    /// Descending key order, starting at `max`
    Backward,
}

/// Callback driven by [`OrderedKv::enumerate`].
///
/// Receives `(sequence_index, key, value)`; the index counts visited entries
/// from zero in scan order. Returning `ControlFlow::Break(())` ends the scan.
pub type ScanFn<'a> = dyn FnMut(usize, &[u8], &[u8]) -> StoreResult<ControlFlow<()>> + 'a;

/// Minimal contract over an embedded ordered key-value engine.
pub trait OrderedKv: Send + Sync {
    /// Point lookup.
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>>;

    /// Apply every operation in `batch` atomically, in insertion order.
    fn write(&self, batch: WriteBatch) -> StoreResult<()>;

    /// Visit every key in the closed interval `[min, max]` in `direction`.
    ///
    /// Entries are handed to `f` as the scan reaches them, so a `Break` ends
    /// the work early. Scans are snapshot-free: concurrent writes may or may
    /// not be observed.
    fn enumerate(
        &self,
        min: &[u8],
        max: &[u8],
        direction: Direction,
        f: &mut ScanFn<'_>,
    ) -> StoreResult<()>;
}
