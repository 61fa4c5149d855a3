//! Engine-backed ordered list (deque).
//!
//! Architecture:
//! ```text
//!            push_left                     push_right
//!               │                              │
//!               ▼                              ▼
//!   … ┌──────┬──────┬──────┬──────┬──────┐ …
//!     │ -2   │ -1   │  0   │  1   │  2   │   __list{k}:idx:<cursor>
//!     └──────┴──────┴──────┴──────┴──────┘
//!        ▲ start                      ▲ end      __key{k}:list = "start,end"
//! ```
//!
//! Every cursor in `[start, end]` has exactly one element key. The window
//! grows outward on push and shrinks inward on pop/trim; an emptied list
//! returns to the canonical `start = 0, end = -1` and its info key is
//! removed.
//!
//! Each mutation stages the next window in a local copy, submits a single
//! batch, and publishes the copy only when the batch succeeds.
//!
//! Inside a transaction pushes skip the info key, so the persisted window
//! only advances on [`LevelList::commit`]. Elements pushed before a crash
//! that never committed stay in the engine outside the persisted window;
//! [`LevelList::drop_all`] sweeps them.
//!
//! Reference: Kleppmann — DDIA, Chapter 7 (Atomic Writes)

use crate::codec;
use crate::engine::{Direction, OrderedKv, WriteBatch};
use crate::error::{StoreError, StoreResult};
use std::ops::ControlFlow;
use std::sync::{Arc, Mutex};

/// Which end of the list an operation applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum End {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Window {
    start: i64,
    end: i64,
    in_transaction: bool,
}

impl Window {
    const EMPTY: Window = Window {
        start: 0,
        end: -1,
        in_transaction: false,
    };

    fn len(&self) -> i64 {
        if self.end < self.start {
            0
        } else {
            self.end - self.start + 1
        }
    }

    fn reset(&mut self) {
        self.start = 0;
        self.end = -1;
    }
}

/// Deque stored as one engine key per element plus a window record.
pub struct LevelList {
    engine: Arc<dyn OrderedKv>,
    key: String,
    info_key: Vec<u8>,
    window: Mutex<Window>,
}

impl std::fmt::Debug for LevelList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LevelList")
            .field("key", &self.key)
            .field("window", &self.window)
            .finish()
    }
}

impl LevelList {
    /// Open the list stored under `key`, loading its window if one exists.
    pub fn open(engine: Arc<dyn OrderedKv>, key: impl Into<String>) -> StoreResult<Self> {
        let key = key.into();
        let info_key = codec::list_info_key(&key);
        let mut window = Window::EMPTY;
        if let Some(raw) = engine.get(&info_key)? {
            let (start, end) = codec::decode_window(&raw)?;
            window.start = start;
            window.end = end;
        }
        log::debug!("Opened list {key} with window [{}, {}]", window.start, window.end);

        Ok(Self {
            engine,
            key,
            info_key,
            window: Mutex::new(window),
        })
    }

    /// User key this list is stored under.
    pub fn key(&self) -> &str {
        &self.key
    }

    fn element_key(&self, cursor: i64) -> Vec<u8> {
        codec::list_element_key(&self.key, cursor)
    }

    /// Queue the window record (or its removal when empty).
    fn stage_info(&self, window: &Window, batch: &mut WriteBatch) {
        if window.len() == 0 {
            batch.delete(self.info_key.clone());
        } else {
            batch.put(self.info_key.clone(), codec::encode_window(window.start, window.end));
        }
    }

    fn submit(&self, op: &str, batch: WriteBatch) -> StoreResult<()> {
        self.engine.write(batch).inspect_err(|e| {
            log::warn!("list {}: {op} rolled back: {e}", self.key);
        })
    }

    // ─── Mutations ────────────────────────────────────────────────────

    /// Push `values` onto `end`, one at a time, in one batch.
    ///
    /// Left pushes therefore end up in reverse order: pushing `a, b` on the
    /// left yields `b, a, …`. Returns the new length.
    pub fn push<V: AsRef<[u8]>>(&self, end: End, values: &[V]) -> StoreResult<u64> {
        let mut window = self.window.lock()?;
        if values.is_empty() {
            return Ok(window.len() as u64);
        }

        let mut next = *window;
        let mut batch = WriteBatch::new();
        for value in values {
            let cursor = match end {
                End::Left => {
                    next.start -= 1;
                    next.start
                }
                End::Right => {
                    next.end += 1;
                    next.end
                }
            };
            batch.put(self.element_key(cursor), value.as_ref());
        }
        if !next.in_transaction {
            self.stage_info(&next, &mut batch);
        }

        self.submit("push", batch)?;
        *window = next;
        log::trace!("list {}: pushed {} values, window [{}, {}]", self.key, values.len(), next.start, next.end);
        Ok(next.len() as u64)
    }

    pub fn push_left<V: AsRef<[u8]>>(&self, values: &[V]) -> StoreResult<u64> {
        self.push(End::Left, values)
    }

    pub fn push_right<V: AsRef<[u8]>>(&self, values: &[V]) -> StoreResult<u64> {
        self.push(End::Right, values)
    }

    /// Remove and return the element at `end`; `Ok(None)` when empty.
    pub fn pop(&self, end: End) -> StoreResult<Option<Vec<u8>>> {
        let mut window = self.window.lock()?;
        if window.len() == 0 {
            return Ok(None);
        }

        let cursor = match end {
            End::Left => window.start,
            End::Right => window.end,
        };
        let element_key = self.element_key(cursor);
        let value = self.engine.get(&element_key)?.ok_or_else(|| {
            StoreError::Corruption(format!("list {} missing element at cursor {cursor}", self.key))
        })?;

        let mut next = *window;
        if next.len() == 1 {
            next.reset();
        } else {
            match end {
                End::Left => next.start += 1,
                End::Right => next.end -= 1,
            }
        }
        let mut batch = WriteBatch::new();
        batch.delete(element_key);
        self.stage_info(&next, &mut batch);

        self.submit("pop", batch)?;
        *window = next;
        Ok(Some(value))
    }

    pub fn pop_left(&self) -> StoreResult<Option<Vec<u8>>> {
        self.pop(End::Left)
    }

    pub fn pop_right(&self) -> StoreResult<Option<Vec<u8>>> {
        self.pop(End::Right)
    }

    /// Delete up to `count` elements from the left. Returns how many went.
    pub fn trim_left(&self, count: usize) -> StoreResult<usize> {
        let mut window = self.window.lock()?;
        let removed = (count as u64).min(window.len() as u64) as i64;
        if removed == 0 {
            return Ok(0);
        }

        let mut next = *window;
        let mut batch = WriteBatch::new();
        for cursor in window.start..window.start + removed {
            batch.delete(self.element_key(cursor));
        }
        next.start += removed;
        if next.len() == 0 {
            next.reset();
        }
        self.stage_info(&next, &mut batch);

        self.submit("trim", batch)?;
        *window = next;
        Ok(removed as usize)
    }

    /// Delete every element key, orphans included, and the info key.
    pub fn drop_all(&self) -> StoreResult<()> {
        let mut window = self.window.lock()?;

        let prefix = codec::list_element_prefix(&self.key);
        let max = codec::upper_bound(&prefix);
        let mut batch = WriteBatch::new();
        self.engine
            .enumerate(&prefix, &max, Direction::Forward, &mut |_, key, _| {
                // Skip keys of other lists whose user key extends this one
                if codec::parse_list_cursor(&prefix, key).is_some() {
                    batch.delete(key.to_vec());
                }
                Ok(ControlFlow::Continue(()))
            })?;
        batch.delete(self.info_key.clone());

        let deleted = batch.len() - 1;
        self.submit("drop", batch)?;
        *window = Window::EMPTY;
        log::debug!("list {}: dropped {deleted} elements", self.key);
        Ok(())
    }

    // ─── Transactions ─────────────────────────────────────────────────

    /// Stop persisting the window on every push until [`commit`](Self::commit).
    pub fn begin_transaction(&self) -> StoreResult<()> {
        let mut window = self.window.lock()?;
        window.in_transaction = true;
        Ok(())
    }

    /// Persist the window once and close the transaction. No-op when none is open.
    pub fn commit(&self) -> StoreResult<()> {
        let mut window = self.window.lock()?;
        if !window.in_transaction {
            return Ok(());
        }
        let mut batch = WriteBatch::new();
        self.stage_info(&window, &mut batch);
        self.submit("commit", batch)?;
        window.in_transaction = false;
        Ok(())
    }

    pub fn in_transaction(&self) -> StoreResult<bool> {
        Ok(self.window.lock()?.in_transaction)
    }

    // ─── Reads ────────────────────────────────────────────────────────

    /// Number of elements, from the cached window.
    pub fn len(&self) -> StoreResult<u64> {
        Ok(self.window.lock()?.len() as u64)
    }

    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Element at 0-based position `i` from the left; `Ok(None)` out of range.
    pub fn index(&self, i: i64) -> StoreResult<Option<Vec<u8>>> {
        let window = self.window.lock()?;
        if i < 0 || i >= window.len() {
            return Ok(None);
        }
        self.engine.get(&self.element_key(window.start + i))
    }

    /// Elements at positions `start..=stop` (`stop = None` runs to the end).
    pub fn range(&self, start: usize, stop: Option<usize>) -> StoreResult<Vec<Vec<u8>>> {
        if let Some(stop) = stop {
            if start > stop {
                return Err(StoreError::InvalidArgument(format!("start {start} > stop {stop}")));
            }
        }
        let window = self.window.lock()?;
        let len = window.len() as u64;
        let last = match stop {
            Some(stop) => (stop as u64).min(len.saturating_sub(1)),
            None => len.saturating_sub(1),
        };
        if len == 0 || start as u64 > last {
            return Ok(Vec::new());
        }

        let mut values = Vec::with_capacity((last - start as u64 + 1).min(1024) as usize);
        for i in start as u64..=last {
            match self.engine.get(&self.element_key(window.start + i as i64))? {
                Some(value) => values.push(value),
                None => break,
            }
        }
        Ok(values)
    }
}
