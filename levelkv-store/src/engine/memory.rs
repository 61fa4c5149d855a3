//! In-memory ordered engine.
//!
//! Not meant for production data, but handy for tests and for embedding
//! the structures without a database directory.

use super::{BatchOp, Direction, OrderedKv, ScanFn, WriteBatch};
use crate::error::{StoreError, StoreResult};
use std::collections::BTreeMap;
use std::ops::{Bound, ControlFlow};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

/// Entries copied per lock acquisition during a scan.
const SCAN_CHUNK: usize = 64;

/// A `BTreeMap` behind an [`RwLock`].
///
/// Reads run concurrently; a batch holds the write lock for its whole
/// application, which makes it atomic with respect to every other call.
///
/// Scans walk the range a fixed number of entries at a time and do not hold the
/// lock across chunks, so a scan is not a snapshot: batches committed between
/// chunks are visible to the rest of it.
#[derive(Default)]
pub struct MemoryEngine {
    map: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
    /// When set, every `write` fails without touching the map
    fail_writes: AtomicBool,
}

impl std::fmt::Debug for MemoryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryEngine")
            .field("fail_writes", &self.fail_writes.load(Ordering::Relaxed))
            .finish()
    }
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent batch writes fail with a `DatabaseError`.
    ///
    /// Lets callers exercise the rollback path of every structure.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of keys currently stored.
    pub fn len(&self) -> StoreResult<usize> {
        Ok(self.map.read()?.len())
    }

    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.map.read()?.is_empty())
    }

    /// Copy of every key in ascending order.
    pub fn keys(&self) -> StoreResult<Vec<Vec<u8>>> {
        Ok(self.map.read()?.keys().cloned().collect())
    }
}

impl OrderedKv for MemoryEngine {
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.map.read()?.get(key).cloned())
    }

    fn write(&self, batch: WriteBatch) -> StoreResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::DatabaseError("injected write failure".into()));
        }
        let mut map = self.map.write()?;
        for op in batch.into_ops() {
            match op {
                BatchOp::Put { key, value } => {
                    map.insert(key, value);
                }
                BatchOp::Delete { key } => {
                    map.remove(&key);
                }
            }
        }
        Ok(())
    }

    fn enumerate(
        &self,
        min: &[u8],
        max: &[u8],
        direction: Direction,
        f: &mut ScanFn<'_>,
    ) -> StoreResult<()> {
        if min > max {
            return Ok(());
        }
        let mut lower = Bound::Included(min.to_vec());
        let mut upper = Bound::Included(max.to_vec());
        let mut i = 0;
        loop {
            // The read lock is released before the callback runs, so the
            // callback may read or write the engine.
            let mut chunk: Vec<(Vec<u8>, Vec<u8>)> = {
                let map = self.map.read()?;
                let range = map.range::<Vec<u8>, _>((lower.as_ref(), upper.as_ref()));
                match direction {
                    Direction::Forward => range
                        .take(SCAN_CHUNK)
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect(),
                    Direction::Backward => range
                        .rev()
                        .take(SCAN_CHUNK)
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect(),
                }
            };
            let exhausted = chunk.len() < SCAN_CHUNK;

            for (key, value) in &chunk {
                if let ControlFlow::Break(()) = f(i, key, value)? {
                    return Ok(());
                }
                i += 1;
            }
            if exhausted {
                return Ok(());
            }

            // Resume strictly past the last key handed out
            let Some((last, _)) = chunk.pop() else {
                return Ok(());
            };
            match direction {
                Direction::Forward => lower = Bound::Excluded(last),
                Direction::Backward => upper = Bound::Excluded(last),
            }
        }
    }
}
