//! Key codec: maps (structure kind, user key, sub-key) to engine keys.
//!
//! Key space:
//! ```text
//! __key{<user>}:list                  = "<start>,<end>"
//! __list{<user>}:idx:<cursor>         = element bytes
//! __key{<user>}:zset                  = "<count>"
//! __zset{<user>}m#<member>            = score (8 bytes)
//! __zset{<user>}s#<score:8>#<member>  = ""
//! ```
//!
//! Scores are stored in an order-preserving 8-byte form, so the score index
//! sorts by score first and by member bytes second. The width is fixed, which
//! lets [`split_score_key`] cut by position; members may contain `#`.
//!
//! Every function here is pure.

use crate::error::{StoreError, StoreResult};

pub const KEY_PREFIX: &str = "__key";
pub const LIST_PREFIX: &str = "__list";
pub const ZSET_PREFIX: &str = "__zset";
pub const SEP_LEFT: u8 = b'{';
pub const SEP_RIGHT: u8 = b'}';
/// Delimiter inside sorted-set keys.
pub const SEP: u8 = b'#';
/// Sentinel that sorts after every delimiter; closes open-ended range scans.
pub const MAX_BYTE: u8 = 0xFF;
pub const LIST_SUFFIX: &str = ":list";
pub const ZSET_SUFFIX: &str = ":zset";
const LIST_IDX: &str = ":idx:";
const MEMBER_TAG: u8 = b'm';
const SCORE_TAG: u8 = b's';
/// Width of an encoded score.
pub const SCORE_LEN: usize = 8;

const SIGN_BIT: u64 = 1 << 63;

/// `<prefix>{<user_key>}`
fn scoped(prefix: &str, user_key: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(prefix.len() + user_key.len() + 2);
    key.extend_from_slice(prefix.as_bytes());
    key.push(SEP_LEFT);
    key.extend_from_slice(user_key.as_bytes());
    key.push(SEP_RIGHT);
    key
}

/// Inclusive upper bound for a prefix scan: `prefix` + `MAX_BYTE`.
pub fn upper_bound(prefix: &[u8]) -> Vec<u8> {
    let mut max = Vec::with_capacity(prefix.len() + 1);
    max.extend_from_slice(prefix);
    max.push(MAX_BYTE);
    max
}

// ─── List ─────────────────────────────────────────────────────────────

pub fn list_info_key(user_key: &str) -> Vec<u8> {
    let mut key = scoped(KEY_PREFIX, user_key);
    key.extend_from_slice(LIST_SUFFIX.as_bytes());
    key
}

pub fn list_element_prefix(user_key: &str) -> Vec<u8> {
    let mut key = scoped(LIST_PREFIX, user_key);
    key.extend_from_slice(LIST_IDX.as_bytes());
    key
}

pub fn list_element_key(user_key: &str, cursor: i64) -> Vec<u8> {
    let mut key = list_element_prefix(user_key);
    key.extend_from_slice(cursor.to_string().as_bytes());
    key
}

/// Recover the cursor from an element key, or `None` if `key` is not an
/// element key under `prefix`.
pub fn parse_list_cursor(prefix: &[u8], key: &[u8]) -> Option<i64> {
    let suffix = key.strip_prefix(prefix)?;
    std::str::from_utf8(suffix).ok()?.parse().ok()
}

/// Encode a cursor window as `"<start>,<end>"`.
pub fn encode_window(start: i64, end: i64) -> Vec<u8> {
    format!("{start},{end}").into_bytes()
}

pub fn decode_window(raw: &[u8]) -> StoreResult<(i64, i64)> {
    let corrupt = || StoreError::Corruption(format!("list window {:?}", String::from_utf8_lossy(raw)));
    let text = std::str::from_utf8(raw).map_err(|_| corrupt())?;
    let (start, end) = text.split_once(',').ok_or_else(corrupt)?;
    let start = start.parse().map_err(|_| corrupt())?;
    let end = end.parse().map_err(|_| corrupt())?;
    Ok((start, end))
}

// ─── Sorted set ───────────────────────────────────────────────────────

pub fn zset_info_key(user_key: &str) -> Vec<u8> {
    let mut key = scoped(KEY_PREFIX, user_key);
    key.extend_from_slice(ZSET_SUFFIX.as_bytes());
    key
}

/// Prefix shared by the member index and the score index.
pub fn zset_prefix(user_key: &str) -> Vec<u8> {
    scoped(ZSET_PREFIX, user_key)
}

pub fn zset_member_key(user_key: &str, member: &[u8]) -> Vec<u8> {
    let mut key = zset_prefix(user_key);
    key.push(MEMBER_TAG);
    key.push(SEP);
    key.extend_from_slice(member);
    key
}

pub fn zset_score_prefix(user_key: &str) -> Vec<u8> {
    let mut key = zset_prefix(user_key);
    key.push(SCORE_TAG);
    key.push(SEP);
    key
}

/// `<score prefix><score:8>#<member>`
pub fn zset_score_key(user_key: &str, score: f64, member: &[u8]) -> Vec<u8> {
    let mut key = zset_score_prefix(user_key);
    key.extend_from_slice(&encode_score(score));
    key.push(SEP);
    key.extend_from_slice(member);
    key
}

/// Split a score-index key into `(score, member)`.
pub fn split_score_key(score_prefix: &[u8], key: &[u8]) -> StoreResult<(f64, Vec<u8>)> {
    let rest = key
        .strip_prefix(score_prefix)
        .filter(|rest| rest.len() > SCORE_LEN && rest[SCORE_LEN] == SEP)
        .ok_or_else(|| {
            StoreError::Corruption(format!("score key {:?}", String::from_utf8_lossy(key)))
        })?;
    let score = decode_score(&rest[..SCORE_LEN])?;
    Ok((score, rest[SCORE_LEN + 1..].to_vec()))
}

/// Order-preserving score encoding.
///
/// Non-negative values get the sign bit set, negative values are inverted,
/// so unsigned big-endian comparison matches numeric order. `-0.0` encodes
/// like `0.0`.
pub fn encode_score(score: f64) -> [u8; SCORE_LEN] {
    let score = if score == 0.0 { 0.0 } else { score };
    let bits = score.to_bits();
    let ordered = if bits & SIGN_BIT == 0 { bits | SIGN_BIT } else { !bits };
    ordered.to_be_bytes()
}

pub fn decode_score(raw: &[u8]) -> StoreResult<f64> {
    let bytes: [u8; SCORE_LEN] = raw
        .try_into()
        .map_err(|_| StoreError::Corruption(format!("score of {} bytes", raw.len())))?;
    let ordered = u64::from_be_bytes(bytes);
    let bits = if ordered & SIGN_BIT != 0 { ordered & !SIGN_BIT } else { !ordered };
    Ok(f64::from_bits(bits))
}

pub fn encode_count(count: u64) -> Vec<u8> {
    count.to_string().into_bytes()
}

pub fn decode_count(raw: &[u8]) -> StoreResult<u64> {
    std::str::from_utf8(raw)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| StoreError::Corruption(format!("zset count {:?}", String::from_utf8_lossy(raw))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout() {
        assert_eq!(list_info_key("jobs"), b"__key{jobs}:list");
        assert_eq!(list_element_key("jobs", -3), b"__list{jobs}:idx:-3");
        assert_eq!(zset_info_key("rank"), b"__key{rank}:zset");
        assert_eq!(zset_member_key("rank", b"alice"), b"__zset{rank}m#alice");

        let score_key = zset_score_key("rank", 1.0, b"alice");
        assert!(score_key.starts_with(b"__zset{rank}s#"));
        assert!(score_key.ends_with(b"#alice"));
    }

    #[test]
    fn test_score_order_matches_numeric_order() {
        let scores = [
            f64::NEG_INFINITY,
            -1e300,
            -2.5,
            -1.0,
            -f64::MIN_POSITIVE,
            0.0,
            f64::MIN_POSITIVE,
            1.0,
            2.5,
            1e300,
            f64::INFINITY,
        ];
        for pair in scores.windows(2) {
            assert!(encode_score(pair[0]) < encode_score(pair[1]), "{} vs {}", pair[0], pair[1]);
        }
        for s in scores {
            assert_eq!(decode_score(&encode_score(s)).unwrap(), s);
        }
    }

    #[test]
    fn test_negative_zero_normalised() {
        assert_eq!(encode_score(-0.0), encode_score(0.0));
    }

    #[test]
    fn test_split_score_key_allows_separator_in_member() {
        let prefix = zset_score_prefix("k");
        let key = zset_score_key("k", -7.25, b"a#b#c");
        let (score, member) = split_score_key(&prefix, &key).unwrap();
        assert_eq!(score, -7.25);
        assert_eq!(member, b"a#b#c");
    }

    #[test]
    fn test_split_score_key_rejects_foreign_keys() {
        let prefix = zset_score_prefix("k");
        assert!(split_score_key(&prefix, b"__zset{k}m#x").is_err());
        assert!(split_score_key(&prefix, b"__zset{k}s#short").is_err());
    }

    #[test]
    fn test_max_bound_covers_every_member_at_score() {
        let prefix = zset_score_prefix("k");
        let mut max = prefix.clone();
        max.extend_from_slice(&encode_score(3.0));
        let max = upper_bound(&max);
        assert!(zset_score_key("k", 3.0, &[0xFF, 0xFF]) <= max);
        assert!(zset_score_key("k", 3.5, b"") > max);
    }

    #[test]
    fn test_window_and_count_codecs() {
        assert_eq!(decode_window(&encode_window(-4, 10)).unwrap(), (-4, 10));
        assert!(decode_window(b"nonsense").is_err());
        assert!(decode_window(b"1,x").is_err());
        assert_eq!(decode_count(&encode_count(42)).unwrap(), 42);
        assert!(decode_count(b"-1").is_err());
    }

    #[test]
    fn test_parse_list_cursor_filters_other_keys() {
        let prefix = list_element_prefix("a");
        assert_eq!(parse_list_cursor(&prefix, &list_element_key("a", -12)), Some(-12));
        // Element of a user key that merely starts with "a}:idx:"
        assert_eq!(parse_list_cursor(&prefix, b"__list{a}:idx:x}:idx:1"), None);
        assert_eq!(parse_list_cursor(&prefix, b"__key{a}:list"), None);
    }
}
