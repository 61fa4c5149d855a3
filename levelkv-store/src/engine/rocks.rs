//! RocksDB-backed ordered engine.
//!
//! All structures share the default column family; their key spaces are kept
//! apart by the structural prefixes in [`crate::codec`].
//!
//! Performance targets:
//! - Open (1M keys): <100ms (bloom filters + block cache)
//! - Point read (cache hit): <5μs
//! - Batch write (≤64 ops): <50μs without fsync
//!
//! Reference: Kleppmann — DDIA, Chapter 3 (LSM Trees, SSTables)

use super::{BatchOp, Direction, OrderedKv, ScanFn, WriteBatch};
use crate::error::{StoreError, StoreResult};
use rocksdb::{BlockBasedOptions, Cache, DBCompressionType, IteratorMode, Options, WriteOptions, DB};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

/// Tuning for [`RocksEngine`].
///
/// Workload shape: small keys, one point lookup per member check, short
/// range scans over the score index, and exactly one batch per structure
/// mutation.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Database directory, created on open if missing
    pub path: PathBuf,
    /// LRU block cache shared by member lookups and score scans
    pub block_cache_bytes: usize,
    /// Bloom filter bits per key; `0.0` disables the filter. Lookups of
    /// absent members and list elements are what it saves.
    pub bloom_bits_per_key: f64,
    /// Sync the WAL after each batch. Every push, pop, add or remove is one
    /// batch, so this costs one fsync per operation and makes it survive
    /// power loss rather than only a process crash.
    pub sync_writes: bool,
    /// Memtable size. A long list transaction writes one key per element
    /// before the window record, so this bounds how much of it sits in memory.
    pub memtable_bytes: usize,
    /// Table files kept open; `-1` keeps every file open
    pub max_open_files: i32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("levelkv_data"),
            block_cache_bytes: 64 << 20,
            bloom_bits_per_key: 10.0,
            sync_writes: false,
            memtable_bytes: 32 << 20,
            max_open_files: -1,
        }
    }
}

impl StoreConfig {
    /// Small memtable so tests reach SST files quickly.
    pub fn for_testing(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            block_cache_bytes: 4 << 20,
            bloom_bits_per_key: 10.0,
            sync_writes: false,
            memtable_bytes: 1 << 20,
            max_open_files: 32,
        }
    }

    /// Same tuning with every batch synced to disk.
    pub fn durable(mut self) -> Self {
        self.sync_writes = true;
        self
    }
}

/// RocksDB engine handle, shared by every structure of a registry.
pub struct RocksEngine {
    db: DB,
    config: StoreConfig,
}

impl std::fmt::Debug for RocksEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RocksEngine")
            .field("path", &self.config.path)
            .finish()
    }
}

impl RocksEngine {
    /// Open (or create) the database at the configured path.
    pub fn open(config: StoreConfig) -> StoreResult<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_max_open_files(config.max_open_files);
        opts.set_keep_log_file_num(5);
        opts.increase_parallelism(num_cpus());
        opts.set_write_buffer_size(config.memtable_bytes);
        opts.set_max_write_buffer_number(4);

        let mut block_opts = BlockBasedOptions::default();
        let cache = Cache::new_lru_cache(config.block_cache_bytes);
        block_opts.set_block_cache(&cache);
        if config.bloom_bits_per_key > 0.0 {
            block_opts.set_bloom_filter(config.bloom_bits_per_key, false);
        }
        block_opts.set_block_size(16 * 1024);
        opts.set_block_based_table_factory(&block_opts);
        opts.set_compression_type(DBCompressionType::Lz4);

        let db = DB::open(&opts, &config.path)?;
        log::debug!(
            "Opened RocksDB engine at {} (sync_writes={})",
            config.path.display(),
            config.sync_writes
        );

        Ok(Self { db, config })
    }

    /// Force memtables to disk.
    pub fn flush(&self) -> StoreResult<()> {
        self.db.flush()?;
        Ok(())
    }

    /// Get the database path.
    pub fn path(&self) -> &Path {
        &self.config.path
    }
}

impl OrderedKv for RocksEngine {
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.db.get(key)?)
    }

    fn write(&self, batch: WriteBatch) -> StoreResult<()> {
        let mut rocks_batch = rocksdb::WriteBatch::default();
        for op in batch.into_ops() {
            match op {
                BatchOp::Put { key, value } => rocks_batch.put(key, value),
                BatchOp::Delete { key } => rocks_batch.delete(key),
            }
        }

        let mut write_opts = WriteOptions::default();
        write_opts.set_sync(self.config.sync_writes);
        self.db.write_opt(rocks_batch, &write_opts)?;
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
        let mode = match direction {
            Direction::Forward => IteratorMode::From(min, rocksdb::Direction::Forward),
            // Reverse seek lands on the last key <= max
            Direction::Backward => IteratorMode::From(max, rocksdb::Direction::Reverse),
        };

        for (i, item) in self.db.iterator(mode).enumerate() {
            let (key, value) = item?;
            let in_range = match direction {
                Direction::Forward => key.as_ref() <= max,
                Direction::Backward => key.as_ref() >= min,
            };
            if !in_range {
                break;
            }
            if let ControlFlow::Break(()) = f(i, &key, &value)? {
                break;
            }
        }
        Ok(())
    }
}

/// Get number of CPU cores for RocksDB parallelism.
fn num_cpus() -> i32 {
    std::thread::available_parallelism()
        .map(|n| n.get() as i32)
        .unwrap_or(4)
}
