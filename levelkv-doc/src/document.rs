//! Path-addressed JSON document with a small update DSL.
//!
//! Paths are dot-separated keys (`"profile.settings.mute"`). Writes create
//! missing or non-object intermediates as empty objects; reads and deletes
//! never create anything.
//!
//! Update operators accepted by [`MapDocument::rich_set`]:
//!
//! | Key      | Argument                  | Effect                                  |
//! |----------|---------------------------|-----------------------------------------|
//! | `path`   | any value                 | assign                                  |
//! | `$set`   | `{path: value, ..}`       | assign each                             |
//! | `$rpush` | `{path: value or [..], ..}` | append to the array at path           |
//! | `$inc`   | `{path: number, ..}`      | add to the number at path               |
//! | `$del`   | `[path, ..]`              | remove each leaf if present             |
//!
//! A `rich_set` call is all-or-nothing: updates run against a staged copy
//! and the first error discards the copy.

use crate::error::DocumentError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

/// Separator between path segments.
pub const PATH_DELIMITER: char = '.';
/// Prefix marking an update operator key.
pub const OPERATOR_SIGIL: char = '$';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Set,
    RPush,
    Inc,
    Del,
}

impl Operator {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "set" => Some(Operator::Set),
            "rpush" => Some(Operator::RPush),
            "inc" => Some(Operator::Inc),
            "del" => Some(Operator::Del),
            _ => None,
        }
    }
}

/// Nested string-keyed document.
///
/// Not tied to any storage: callers decode it with [`MapDocument::from_slice`]
/// and persist [`MapDocument::to_vec`] as one opaque value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MapDocument {
    data: Map<String, Value>,
}

impl MapDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(data: Map<String, Value>) -> Self {
        Self { data }
    }

    /// Decode a document previously produced by [`to_vec`](Self::to_vec).
    pub fn from_slice(bytes: &[u8]) -> Result<Self, DocumentError> {
        let data = serde_json::from_slice(bytes).map_err(|e| DocumentError::Decode(e.to_string()))?;
        Ok(Self { data })
    }

    /// Canonical JSON encoding for persistence.
    pub fn to_vec(&self) -> Result<Vec<u8>, DocumentError> {
        serde_json::to_vec(&self.data).map_err(|e| DocumentError::Encode(e.to_string()))
    }

    /// Underlying mapping.
    pub fn map(&self) -> &Map<String, Value> {
        &self.data
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.data
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Resolve `path` to its parent object and leaf key.
    ///
    /// With `create_if_missing`, missing or non-object intermediates are
    /// replaced by empty objects and the lookup always succeeds. Without it,
    /// a broken path yields `None` and nothing changes.
    pub fn find_element<'p>(
        &mut self,
        path: &'p str,
        create_if_missing: bool,
    ) -> Option<(&mut Map<String, Value>, &'p str)> {
        if create_if_missing {
            Some(find_parent_mut(&mut self.data, path))
        } else {
            find_existing_mut(&mut self.data, path)
        }
    }

    /// Assign `value` at `path`, creating intermediates.
    pub fn set(&mut self, path: &str, value: Value) {
        let (parent, leaf) = find_parent_mut(&mut self.data, path);
        parent.insert(leaf.to_string(), value);
    }

    pub fn get(&self, path: &str) -> Option<&Value> {
        let (parent, leaf) = find_existing(&self.data, path)?;
        parent.get(leaf)
    }

    /// Remove and return the leaf at `path`.
    pub fn remove(&mut self, path: &str) -> Option<Value> {
        let (parent, leaf) = find_existing_mut(&mut self.data, path)?;
        parent.remove(leaf)
    }

    /// Apply a batch of direct writes and operator updates atomically.
    ///
    /// Keys apply in the map's iteration order. On error the document is
    /// left exactly as it was.
    pub fn rich_set(&mut self, updates: Map<String, Value>) -> Result<(), DocumentError> {
        let mut staged = self.data.clone();
        for (key, arg) in updates {
            apply_update(&mut staged, key, arg).inspect_err(|e| {
                log::debug!("rich_set rejected: {e}");
            })?;
        }
        self.data = staged;
        Ok(())
    }

    /// Copy of the requested sub-trees, or of the whole document when
    /// `paths` is empty.
    ///
    /// Walking a path stops at the first non-object value, which is copied
    /// whole. Paths that hit a missing key contribute nothing.
    pub fn rich_get(&self, paths: &[&str]) -> Map<String, Value> {
        if paths.is_empty() {
            return self.data.clone();
        }

        let mut result = Map::new();
        for path in paths {
            let segments: Vec<&str> = path.split(PATH_DELIMITER).collect();
            let mut src = &self.data;
            for (depth, segment) in segments.iter().enumerate() {
                let Some(value) = src.get(*segment) else {
                    break;
                };
                match value {
                    Value::Object(child) if depth + 1 < segments.len() => src = child,
                    _ => {
                        insert_at(&mut result, &segments[..=depth], value.clone());
                        break;
                    }
                }
            }
        }
        result
    }
}

impl std::fmt::Display for MapDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = serde_json::to_string(&self.data).map_err(|_| std::fmt::Error)?;
        f.write_str(&text)
    }
}

// ─── Path resolution ─────────────────────────────────────────────────

/// `("a.b", "c")` for `"a.b.c"`; the leaf alone for a single segment.
fn split_leaf(path: &str) -> (Option<&str>, &str) {
    match path.rsplit_once(PATH_DELIMITER) {
        Some((parents, leaf)) => (Some(parents), leaf),
        None => (None, path),
    }
}

/// Replace a non-object with an empty object and borrow it as a map.
fn ensure_map(slot: &mut Value) -> &mut Map<String, Value> {
    if !slot.is_object() {
        *slot = Value::Object(Map::new());
    }
    match slot {
        Value::Object(map) => map,
        _ => unreachable!("slot holds an object"),
    }
}

fn find_parent_mut<'a, 'p>(
    root: &'a mut Map<String, Value>,
    path: &'p str,
) -> (&'a mut Map<String, Value>, &'p str) {
    let (parents, leaf) = split_leaf(path);
    let mut parent = root;
    for segment in parents.into_iter().flat_map(|p| p.split(PATH_DELIMITER)) {
        let slot = parent
            .entry(segment)
            .or_insert_with(|| Value::Object(Map::new()));
        parent = ensure_map(slot);
    }
    (parent, leaf)
}

fn find_existing_mut<'a, 'p>(
    root: &'a mut Map<String, Value>,
    path: &'p str,
) -> Option<(&'a mut Map<String, Value>, &'p str)> {
    let (parents, leaf) = split_leaf(path);
    let mut parent = root;
    for segment in parents.into_iter().flat_map(|p| p.split(PATH_DELIMITER)) {
        parent = parent.get_mut(segment)?.as_object_mut()?;
    }
    Some((parent, leaf))
}

fn find_existing<'a, 'p>(
    root: &'a Map<String, Value>,
    path: &'p str,
) -> Option<(&'a Map<String, Value>, &'p str)> {
    let (parents, leaf) = split_leaf(path);
    let mut parent = root;
    for segment in parents.into_iter().flat_map(|p| p.split(PATH_DELIMITER)) {
        parent = parent.get(segment)?.as_object()?;
    }
    Some((parent, leaf))
}

/// Write `value` under `segments`, merging into objects already there.
fn insert_at(root: &mut Map<String, Value>, segments: &[&str], value: Value) {
    let Some((leaf, parents)) = segments.split_last() else {
        return;
    };
    let mut parent = root;
    for segment in parents {
        let slot = parent
            .entry(*segment)
            .or_insert_with(|| Value::Object(Map::new()));
        parent = ensure_map(slot);
    }
    parent.insert(leaf.to_string(), value);
}

// ─── Update operators ────────────────────────────────────────────────

fn apply_update(data: &mut Map<String, Value>, key: String, arg: Value) -> Result<(), DocumentError> {
    let Some(name) = key.strip_prefix(OPERATOR_SIGIL) else {
        let (parent, leaf) = find_parent_mut(data, &key);
        parent.insert(leaf.to_string(), arg);
        return Ok(());
    };
    let operator = Operator::parse(name).ok_or_else(|| DocumentError::UnknownOperator(key.clone()))?;

    if operator == Operator::Del {
        let Value::Array(paths) = arg else {
            return Err(bad_argument(&key, "expected an array of paths"));
        };
        for path in paths {
            let Value::String(path) = path else {
                return Err(bad_argument(&key, "paths must be strings"));
            };
            if let Some((parent, leaf)) = find_existing_mut(data, &path) {
                parent.remove(leaf);
            }
        }
        return Ok(());
    }

    let Value::Object(fields) = arg else {
        return Err(bad_argument(&key, "expected an object of path/value pairs"));
    };
    for (path, value) in fields {
        let (parent, leaf) = find_parent_mut(data, &path);
        match operator {
            Operator::Set => {
                parent.insert(leaf.to_string(), value);
            }
            Operator::RPush => rpush(parent, leaf, &path, value)?,
            Operator::Inc => increment(parent, leaf, &path, &value)?,
            Operator::Del => {}
        }
    }
    Ok(())
}

fn bad_argument(operator: &str, reason: &str) -> DocumentError {
    DocumentError::BadArgument {
        operator: operator.to_string(),
        reason: reason.to_string(),
    }
}

fn type_mismatch(path: &str, reason: String) -> DocumentError {
    DocumentError::TypeMismatch {
        path: path.to_string(),
        reason,
    }
}

fn rpush(parent: &mut Map<String, Value>, leaf: &str, path: &str, value: Value) -> Result<(), DocumentError> {
    let items = match value {
        Value::Array(items) => items,
        single => vec![single],
    };
    match parent.get_mut(leaf) {
        None | Some(Value::Null) => {
            parent.insert(leaf.to_string(), Value::Array(items));
        }
        Some(Value::Array(existing)) => existing.extend(items),
        Some(other) => {
            return Err(type_mismatch(path, format!("cannot push onto {}", kind(other))));
        }
    }
    Ok(())
}

fn increment(parent: &mut Map<String, Value>, leaf: &str, path: &str, delta: &Value) -> Result<(), DocumentError> {
    let Value::Number(delta_num) = delta else {
        return Err(type_mismatch(path, format!("increment is {}", kind(delta))));
    };
    let next = match parent.get(leaf) {
        None | Some(Value::Null) => delta_num.clone(),
        Some(Value::Number(current)) => add_numbers(current, delta_num)
            .ok_or_else(|| type_mismatch(path, "sum is not a finite number".into()))?,
        Some(other) => return Err(type_mismatch(path, format!("cannot increment {}", kind(other)))),
    };
    parent.insert(leaf.to_string(), Value::Number(next));
    Ok(())
}

/// Integer sum when both sides are integers and it fits, float otherwise.
fn add_numbers(a: &Number, b: &Number) -> Option<Number> {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        if let Some(sum) = x.checked_add(y) {
            return Some(Number::from(sum));
        }
    }
    Number::from_f64(a.as_f64()? + b.as_f64()?)
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
