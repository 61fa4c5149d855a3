//! Property-based tests for the list and sorted-set encodings.
//!
//! 1. **Deque model**: any push/pop sequence matches a `VecDeque` replay
//! 2. **Index**: `index(i)` agrees with the model inside and outside bounds
//! 3. **Single score entry**: re-adding a member never leaves stale entries
//! 4. **Order**: ascending rank order is (score, member); descending is its reverse
//! 5. **Pages**: score pages equal the matching rank slice

use levelkv_store::{codec, End, LevelList, LevelZSet, MemoryEngine, ScoredMember};
use proptest::prelude::*;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

// =============================================================================
// Strategies
// =============================================================================

#[derive(Debug, Clone)]
enum ListOp {
    Push(End, Vec<u8>),
    Pop(End),
    Trim(usize),
}

fn arb_end() -> impl Strategy<Value = End> {
    prop_oneof![Just(End::Left), Just(End::Right)]
}

fn arb_list_op() -> impl Strategy<Value = ListOp> {
    prop_oneof![
        4 => (arb_end(), prop::collection::vec(any::<u8>(), 0..8)).prop_map(|(e, v)| ListOp::Push(e, v)),
        3 => arb_end().prop_map(ListOp::Pop),
        1 => (0usize..4).prop_map(ListOp::Trim),
    ]
}

/// Small member alphabet so re-adds and ties are frequent.
fn arb_pairs() -> impl Strategy<Value = Vec<(f64, String)>> {
    prop::collection::vec(((-5i32..5).prop_map(f64::from), "[a-e]{1,2}"), 0..40)
}

/// Expected ascending order from the last score written per member.
fn model_order(pairs: &[(f64, String)]) -> Vec<(f64, String)> {
    let mut latest = BTreeMap::new();
    for (score, member) in pairs {
        latest.insert(member.clone(), *score);
    }
    let mut order: Vec<(f64, String)> = latest.into_iter().map(|(m, s)| (s, m)).collect();
    order.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
    order
}

fn as_pairs(entries: &[ScoredMember]) -> Vec<(f64, String)> {
    entries
        .iter()
        .map(|e| (e.score, String::from_utf8(e.member.clone()).unwrap()))
        .collect()
}

// =============================================================================
// Lists
// =============================================================================

proptest! {
    #[test]
    fn prop_list_matches_deque_model(ops in prop::collection::vec(arb_list_op(), 0..60)) {
        let engine = Arc::new(MemoryEngine::new());
        let list = LevelList::open(engine.clone(), "p").unwrap();
        let mut model: VecDeque<Vec<u8>> = VecDeque::new();

        for op in ops {
            match op {
                ListOp::Push(End::Left, v) => {
                    list.push(End::Left, &[&v]).unwrap();
                    model.push_front(v);
                }
                ListOp::Push(End::Right, v) => {
                    list.push(End::Right, &[&v]).unwrap();
                    model.push_back(v);
                }
                ListOp::Pop(End::Left) => {
                    prop_assert_eq!(list.pop(End::Left).unwrap(), model.pop_front());
                }
                ListOp::Pop(End::Right) => {
                    prop_assert_eq!(list.pop(End::Right).unwrap(), model.pop_back());
                }
                ListOp::Trim(n) => {
                    let removed = list.trim_left(n).unwrap();
                    prop_assert_eq!(removed, n.min(model.len()));
                    model.rotate_left(removed);
                    model.truncate(model.len() - removed);
                }
            }
            prop_assert_eq!(list.len().unwrap(), model.len() as u64);
        }

        for (i, expected) in model.iter().enumerate() {
            prop_assert_eq!(list.index(i as i64).unwrap().as_ref(), Some(expected));
        }
        prop_assert_eq!(list.index(model.len() as i64).unwrap(), None);
        prop_assert_eq!(list.index(-1).unwrap(), None);

        // A fresh instance sees the same window
        let reopened = LevelList::open(engine.clone(), "p").unwrap();
        prop_assert_eq!(reopened.range(0, None).unwrap(), model.iter().cloned().collect::<Vec<_>>());

        if model.is_empty() {
            prop_assert!(engine.is_empty().unwrap());
        }
    }

    #[test]
    fn prop_pushes_minus_pops(pushes in 0usize..30, pops in 0usize..40) {
        let list = LevelList::open(Arc::new(MemoryEngine::new()), "n").unwrap();
        for i in 0..pushes {
            list.push_right(&[i.to_string()]).unwrap();
        }
        for _ in 0..pops {
            list.pop_left().unwrap();
        }
        prop_assert_eq!(list.len().unwrap(), pushes.saturating_sub(pops) as u64);
    }
}

// =============================================================================
// Sorted sets
// =============================================================================

proptest! {
    #[test]
    fn prop_single_score_entry_per_member(pairs in arb_pairs()) {
        let engine = Arc::new(MemoryEngine::new());
        let zset = LevelZSet::new(engine.clone(), "z");
        for pair in &pairs {
            zset.add(std::slice::from_ref(pair)).unwrap();
        }
        let expected = model_order(&pairs);

        let prefix = codec::zset_score_prefix("z");
        let score_keys = engine.keys().unwrap().iter().filter(|k| k.starts_with(&prefix)).count();
        prop_assert_eq!(score_keys, expected.len());
        prop_assert_eq!(zset.len().unwrap(), expected.len() as u64);
        for (score, member) in &expected {
            prop_assert_eq!(zset.score(member.as_bytes()).unwrap(), Some(*score));
        }
    }

    #[test]
    fn prop_rank_order_and_reverse(pairs in arb_pairs()) {
        let zset = LevelZSet::new(Arc::new(MemoryEngine::new()), "z");
        zset.add(&pairs).unwrap();
        let expected = model_order(&pairs);

        let asc = as_pairs(&zset.range_by_rank(false, 0, None).unwrap());
        prop_assert_eq!(&asc, &expected);

        let mut desc = as_pairs(&zset.range_by_rank(true, 0, None).unwrap());
        desc.reverse();
        prop_assert_eq!(desc, expected);
    }

    #[test]
    fn prop_score_page_equals_rank_slice(
        pairs in arb_pairs(),
        offset in 0usize..20,
        count in 1usize..20,
        high_to_low in any::<bool>(),
    ) {
        let zset = LevelZSet::new(Arc::new(MemoryEngine::new()), "z");
        zset.add(&pairs).unwrap();

        let page = zset.range_by_score(high_to_low, -5.0, 5.0, offset, Some(count)).unwrap();
        let slice = zset.range_by_rank(high_to_low, offset, Some(offset + count - 1)).unwrap();
        prop_assert_eq!(page, slice);
    }

    #[test]
    fn prop_remove_everything_clears_engine(pairs in arb_pairs()) {
        let engine = Arc::new(MemoryEngine::new());
        let zset = LevelZSet::new(engine.clone(), "z");
        zset.add(&pairs).unwrap();

        let members: Vec<String> = pairs.iter().map(|(_, m)| m.clone()).collect();
        zset.remove_by_members(&members).unwrap();
        prop_assert!(engine.is_empty().unwrap());

        let fresh = LevelZSet::new(engine.clone(), "z");
        prop_assert_eq!(fresh.len().unwrap(), 0);
        for member in &members {
            prop_assert_eq!(fresh.score(member.as_bytes()).unwrap(), None);
        }
    }
}
