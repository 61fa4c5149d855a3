//! Lookup table from user key to structure instance.
//!
//! Lists cache their cursor window and sorted sets their element count, so
//! two instances for one user key would drift apart. The registry hands out
//! the one shared instance per key and is the only place that creates them.
//!
//! ```text
//! ┌───────────── Registry ─────────────┐
//! │ lists: Mutex<HashMap<key, Arc<_>>> │──► LevelList (own lock)
//! │ zsets: Mutex<HashMap<key, Arc<_>>> │──► LevelZSet (own lock)
//! │ engine: Arc<dyn OrderedKv>         │
//! └────────────────────────────────────┘
//! ```

use crate::engine::OrderedKv;
use crate::error::StoreResult;
use crate::list::LevelList;
use crate::zset::LevelZSet;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Owns every open list and sorted set for one engine.
pub struct Registry {
    engine: Arc<dyn OrderedKv>,
    lists: Mutex<HashMap<String, Arc<LevelList>>>,
    zsets: Mutex<HashMap<String, Arc<LevelZSet>>>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("lists", &self.lists.lock().map(|m| m.len()).unwrap_or_default())
            .field("zsets", &self.zsets.lock().map(|m| m.len()).unwrap_or_default())
            .finish()
    }
}

impl Registry {
    pub fn new(engine: Arc<dyn OrderedKv>) -> Self {
        Self {
            engine,
            lists: Mutex::new(HashMap::new()),
            zsets: Mutex::new(HashMap::new()),
        }
    }

    /// Shared engine handle.
    pub fn engine(&self) -> &Arc<dyn OrderedKv> {
        &self.engine
    }

    /// The list for `key`, opened on first access.
    ///
    /// The window is read without holding the map lock. When two callers
    /// race on a new key, the instance inserted first wins and the other is
    /// discarded before anyone can mutate through it.
    pub fn list(&self, key: &str) -> StoreResult<Arc<LevelList>> {
        if let Some(list) = self.lists.lock()?.get(key) {
            return Ok(list.clone());
        }
        let opened = Arc::new(LevelList::open(self.engine.clone(), key)?);

        let mut lists = self.lists.lock()?;
        let list = lists
            .entry(key.to_string())
            .or_insert_with(|| {
                log::debug!("Registered list {key}");
                opened
            })
            .clone();
        Ok(list)
    }

    /// The sorted set for `key`, created on first access.
    pub fn zset(&self, key: &str) -> StoreResult<Arc<LevelZSet>> {
        let mut zsets = self.zsets.lock()?;
        let zset = zsets
            .entry(key.to_string())
            .or_insert_with(|| {
                log::debug!("Registered zset {key}");
                Arc::new(LevelZSet::new(self.engine.clone(), key))
            })
            .clone();
        Ok(zset)
    }

    /// Delete the list's data.
    ///
    /// The instance stays registered, now empty, because callers may still
    /// hold it and a second instance for the key would fight over cursors.
    pub fn drop_list(&self, key: &str) -> StoreResult<()> {
        self.list(key)?.drop_all()
    }

    /// Delete the sorted set's data. The emptied instance stays registered.
    pub fn drop_zset(&self, key: &str) -> StoreResult<()> {
        self.zset(key)?.drop_all()
    }

    /// Number of list instances currently cached.
    pub fn cached_lists(&self) -> StoreResult<usize> {
        Ok(self.lists.lock()?.len())
    }

    pub fn cached_zsets(&self) -> StoreResult<usize> {
        Ok(self.zsets.lock()?.len())
    }
}
