//! Engine-backed sorted set with a dual key index.
//!
//! Architecture:
//! ```text
//!   member index                       score index
//!   __zset{k}m#alice = <1.5>   ◄──►    __zset{k}s#<1.5>#alice = ""
//!   __zset{k}m#bob   = <0.2>   ◄──►    __zset{k}s#<0.2>#bob   = ""
//!
//!   __key{k}:zset = "2"                (cached element count)
//! ```
//!
//! The member index answers point lookups; the score index is what range
//! scans walk, ordered by score then member bytes. Both entries of a member
//! change together in one batch, and a score change deletes the stale score
//! entry in that same batch.
//!
//! The element count is loaded from the info key on first use and kept in
//! memory afterwards. It is only accurate while this instance is the sole
//! mutator of the key, which the [`crate::Registry`] guarantees.
//!
//! Reference: Kleppmann — DDIA, Chapter 3 (Secondary Indexes)

use crate::codec;
use crate::engine::{Direction, OrderedKv, WriteBatch};
use crate::error::{StoreError, StoreResult};
use std::collections::{HashMap, HashSet};
use std::ops::ControlFlow;
use std::sync::{Arc, Mutex};

/// A `(score, member)` pair as returned by range queries.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredMember {
    pub score: f64,
    pub member: Vec<u8>,
}

fn check_score(score: f64) -> StoreResult<()> {
    if score.is_nan() {
        return Err(StoreError::InvalidArgument("score is NaN".into()));
    }
    Ok(())
}

fn check_rank(start: usize, stop: Option<usize>) -> StoreResult<()> {
    match stop {
        Some(stop) if start > stop => {
            Err(StoreError::InvalidArgument(format!("start {start} > stop {stop}")))
        }
        _ => Ok(()),
    }
}

fn check_score_bounds(min: f64, max: f64) -> StoreResult<()> {
    check_score(min)?;
    check_score(max)?;
    if min > max {
        return Err(StoreError::InvalidArgument(format!("min {min} > max {max}")));
    }
    Ok(())
}

/// Sorted set stored as a member index plus a score index.
pub struct LevelZSet {
    engine: Arc<dyn OrderedKv>,
    key: String,
    info_key: Vec<u8>,
    score_prefix: Vec<u8>,
    /// Element count, `None` until first loaded from the info key
    count: Mutex<Option<u64>>,
}

impl std::fmt::Debug for LevelZSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LevelZSet")
            .field("key", &self.key)
            .field("count", &self.count)
            .finish()
    }
}

impl LevelZSet {
    /// Handle for the sorted set under `key`. Touches the engine lazily.
    pub fn new(engine: Arc<dyn OrderedKv>, key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            engine,
            info_key: codec::zset_info_key(&key),
            score_prefix: codec::zset_score_prefix(&key),
            key,
            count: Mutex::new(None),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    fn load_count(&self, cached: &mut Option<u64>) -> StoreResult<u64> {
        if let Some(count) = *cached {
            return Ok(count);
        }
        let count = match self.engine.get(&self.info_key)? {
            Some(raw) => codec::decode_count(&raw)?,
            None => 0,
        };
        *cached = Some(count);
        Ok(count)
    }

    fn stage_count(&self, count: u64, batch: &mut WriteBatch) {
        if count == 0 {
            batch.delete(self.info_key.clone());
        } else {
            batch.put(self.info_key.clone(), codec::encode_count(count));
        }
    }

    fn stage_removal(&self, score: f64, member: &[u8], batch: &mut WriteBatch) {
        batch.delete(codec::zset_member_key(&self.key, member));
        batch.delete(codec::zset_score_key(&self.key, score, member));
    }

    fn submit(&self, op: &str, batch: WriteBatch) -> StoreResult<()> {
        self.engine.write(batch).inspect_err(|e| {
            log::warn!("zset {}: {op} rolled back: {e}", self.key);
        })
    }

    /// Write a removal batch and publish the reduced count.
    fn finish_removal(
        &self,
        cached: &mut Option<u64>,
        count: u64,
        removed: usize,
        mut batch: WriteBatch,
    ) -> StoreResult<usize> {
        if removed == 0 {
            return Ok(0);
        }
        let next = count.saturating_sub(removed as u64);
        self.stage_count(next, &mut batch);
        self.submit("remove", batch)?;
        *cached = Some(next);
        Ok(removed)
    }

    /// Whether a score-index entry belongs to this set.
    ///
    /// The key format has no escaping, so a set whose user key extends this
    /// one with `}` can place keys inside this set's score range. Any such
    /// key carries a `}` after the score prefix; those are confirmed against
    /// the member index.
    fn owns_score_entry(&self, rest: &[u8], entry: &ScoredMember) -> StoreResult<bool> {
        if !rest.contains(&codec::SEP_RIGHT) {
            return Ok(true);
        }
        let stored = self.engine.get(&codec::zset_member_key(&self.key, &entry.member))?;
        Ok(stored.as_deref() == Some(&rest[..codec::SCORE_LEN]))
    }

    /// Scan this set's score index between two engine keys.
    ///
    /// `visit` sees every entry with its 0-based position in scan order.
    /// Keys of other sets that fall in the range are skipped and not counted.
    fn scan_scores(
        &self,
        min: &[u8],
        max: &[u8],
        direction: Direction,
        mut visit: impl FnMut(usize, ScoredMember) -> ControlFlow<()>,
    ) -> StoreResult<()> {
        let prefix = &self.score_prefix;
        let mut position = 0;
        self.engine.enumerate(min, max, direction, &mut |_, key, _| {
            let Ok((score, member)) = codec::split_score_key(prefix, key) else {
                log::trace!("zset {}: skipping foreign key {:?}", self.key, String::from_utf8_lossy(key));
                return Ok(ControlFlow::Continue(()));
            };
            let entry = ScoredMember { score, member };
            if !self.owns_score_entry(&key[prefix.len()..], &entry)? {
                log::trace!("zset {}: skipping foreign key {:?}", self.key, String::from_utf8_lossy(key));
                return Ok(ControlFlow::Continue(()));
            }
            let flow = visit(position, entry);
            position += 1;
            Ok(flow)
        })
    }

    fn score_bounds(&self, min: f64, max: f64) -> (Vec<u8>, Vec<u8>) {
        let mut lower = self.score_prefix.clone();
        lower.extend_from_slice(&codec::encode_score(min));
        let mut upper = self.score_prefix.clone();
        upper.extend_from_slice(&codec::encode_score(max));
        (lower, codec::upper_bound(&upper))
    }

    /// Bounds covering every storable score. A bare `prefix + MAX_BYTE` would
    /// stop short of encoded scores that start with `0xFF`, such as `+inf`.
    fn all_scores(&self) -> (Vec<u8>, Vec<u8>) {
        self.score_bounds(f64::NEG_INFINITY, f64::INFINITY)
    }

    // ─── Mutations ────────────────────────────────────────────────────

    /// Set the score of each member. Returns how many members are new.
    ///
    /// A member repeated within `pairs` ends with its last score.
    pub fn add<M: AsRef<[u8]>>(&self, pairs: &[(f64, M)]) -> StoreResult<usize> {
        for (score, _) in pairs {
            check_score(*score)?;
        }
        if pairs.is_empty() {
            return Ok(0);
        }

        let mut cached = self.count.lock()?;
        let count = self.load_count(&mut cached)?;

        let mut staged: HashMap<&[u8], f64> = HashMap::with_capacity(pairs.len());
        let mut batch = WriteBatch::new();
        let mut added = 0usize;
        for (score, member) in pairs {
            let member = member.as_ref();
            let previous = match staged.get(member) {
                Some(score) => Some(*score),
                None => self.score(member)?,
            };
            match previous {
                Some(old) => batch.delete(codec::zset_score_key(&self.key, old, member)),
                None => added += 1,
            }
            batch.put(codec::zset_member_key(&self.key, member), codec::encode_score(*score).to_vec());
            batch.put(codec::zset_score_key(&self.key, *score, member), Vec::new());
            staged.insert(member, *score);
        }
        let next = count + added as u64;
        self.stage_count(next, &mut batch);

        self.submit("add", batch)?;
        *cached = Some(next);
        Ok(added)
    }

    /// Add `delta` to the member's score; an absent member starts at `delta`.
    pub fn increment_by(&self, member: &[u8], delta: f64) -> StoreResult<f64> {
        check_score(delta)?;
        let mut cached = self.count.lock()?;
        let count = self.load_count(&mut cached)?;

        let previous = self.score(member)?;
        let score = previous.unwrap_or(0.0) + delta;
        if score.is_nan() {
            return Err(StoreError::InvalidArgument("increment produced NaN".into()));
        }

        let mut batch = WriteBatch::new();
        if let Some(old) = previous {
            batch.delete(codec::zset_score_key(&self.key, old, member));
        }
        batch.put(codec::zset_member_key(&self.key, member), codec::encode_score(score).to_vec());
        batch.put(codec::zset_score_key(&self.key, score, member), Vec::new());
        let next = if previous.is_some() { count } else { count + 1 };
        if next != count {
            self.stage_count(next, &mut batch);
        }

        self.submit("increment", batch)?;
        *cached = Some(next);
        Ok(score)
    }

    /// Remove the listed members. Absent and repeated members are ignored.
    pub fn remove_by_members<M: AsRef<[u8]>>(&self, members: &[M]) -> StoreResult<usize> {
        let mut cached = self.count.lock()?;
        let count = self.load_count(&mut cached)?;

        let mut seen = HashSet::with_capacity(members.len());
        let mut batch = WriteBatch::new();
        let mut removed = 0;
        for member in members {
            let member = member.as_ref();
            if !seen.insert(member) {
                continue;
            }
            if let Some(score) = self.score(member)? {
                self.stage_removal(score, member, &mut batch);
                removed += 1;
            }
        }
        self.finish_removal(&mut cached, count, removed, batch)
    }

    /// Remove members ranked `start..=stop` in ascending order.
    pub fn remove_by_rank(&self, start: usize, stop: Option<usize>) -> StoreResult<usize> {
        check_rank(start, stop)?;
        let mut cached = self.count.lock()?;
        let count = self.load_count(&mut cached)?;

        let mut batch = WriteBatch::new();
        let mut removed = 0;
        let (min, max) = self.all_scores();
        self.scan_scores(&min, &max, Direction::Forward, |i, entry| {
            if i < start {
                return ControlFlow::Continue(());
            }
            if stop.is_some_and(|stop| i > stop) {
                return ControlFlow::Break(());
            }
            self.stage_removal(entry.score, &entry.member, &mut batch);
            removed += 1;
            ControlFlow::Continue(())
        })?;
        self.finish_removal(&mut cached, count, removed, batch)
    }

    /// Remove members whose score lies in `[min, max]`.
    pub fn remove_by_score(&self, min: f64, max: f64) -> StoreResult<usize> {
        check_score_bounds(min, max)?;
        let mut cached = self.count.lock()?;
        let count = self.load_count(&mut cached)?;

        let mut batch = WriteBatch::new();
        let mut removed = 0;
        let (lower, upper) = self.score_bounds(min, max);
        self.scan_scores(&lower, &upper, Direction::Forward, |_, entry| {
            self.stage_removal(entry.score, &entry.member, &mut batch);
            removed += 1;
            ControlFlow::Continue(())
        })?;
        self.finish_removal(&mut cached, count, removed, batch)
    }

    /// Delete both indices and the count record.
    ///
    /// Walks the score index and removes each entry with its member-index
    /// twin, so sets whose user key extends this one are left alone.
    pub fn drop_all(&self) -> StoreResult<()> {
        let mut cached = self.count.lock()?;

        let (min, max) = self.all_scores();
        let mut batch = WriteBatch::new();
        self.scan_scores(&min, &max, Direction::Forward, |_, entry| {
            self.stage_removal(entry.score, &entry.member, &mut batch);
            ControlFlow::Continue(())
        })?;
        batch.delete(self.info_key.clone());

        let dropped = (batch.len() - 1) / 2;
        self.submit("drop", batch)?;
        *cached = Some(0);
        log::debug!("zset {}: dropped {dropped} members", self.key);
        Ok(())
    }

    // ─── Reads ────────────────────────────────────────────────────────

    /// Current score of `member`, or `None` if it is not in the set.
    pub fn score(&self, member: &[u8]) -> StoreResult<Option<f64>> {
        match self.engine.get(&codec::zset_member_key(&self.key, member))? {
            Some(raw) => Ok(Some(codec::decode_score(&raw)?)),
            None => Ok(None),
        }
    }

    /// Cached element count; reads the count record on first call only.
    pub fn len(&self) -> StoreResult<u64> {
        let mut cached = self.count.lock()?;
        self.load_count(&mut cached)
    }

    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Members ranked `start..=stop` (`None` = to the end), in scan order.
    pub fn range_by_rank(
        &self,
        high_to_low: bool,
        start: usize,
        stop: Option<usize>,
    ) -> StoreResult<Vec<ScoredMember>> {
        check_rank(start, stop)?;
        let direction = if high_to_low { Direction::Backward } else { Direction::Forward };
        let (min, max) = self.all_scores();

        let mut out = Vec::new();
        self.scan_scores(&min, &max, direction, |i, entry| {
            if i < start {
                return ControlFlow::Continue(());
            }
            if stop.is_some_and(|stop| i > stop) {
                return ControlFlow::Break(());
            }
            out.push(entry);
            ControlFlow::Continue(())
        })?;
        Ok(out)
    }

    /// Members with score in `[min, max]`, skipping `offset` and returning
    /// at most `count` (`None` = unbounded).
    pub fn range_by_score(
        &self,
        high_to_low: bool,
        min: f64,
        max: f64,
        offset: usize,
        count: Option<usize>,
    ) -> StoreResult<Vec<ScoredMember>> {
        check_score_bounds(min, max)?;
        if count == Some(0) {
            return Ok(Vec::new());
        }
        let direction = if high_to_low { Direction::Backward } else { Direction::Forward };
        let (lower, upper) = self.score_bounds(min, max);

        let mut out = Vec::new();
        self.scan_scores(&lower, &upper, direction, |i, entry| {
            if i < offset {
                return ControlFlow::Continue(());
            }
            out.push(entry);
            if count.is_some_and(|count| out.len() >= count) {
                return ControlFlow::Break(());
            }
            ControlFlow::Continue(())
        })?;
        Ok(out)
    }
}
