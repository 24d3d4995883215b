/*!
Path addressing and structural merging over state trees.

State trees are plain [`serde_json::Value`]s. Nodes are addressed with dotted
paths such as `"todos.items"`; bracketed indexes (`"todos.items[0].title"`) and
numeric segments (`"todos.items.0"`) address array elements.

The deep merge defined here is shared by the transform engine and the
rehydration enhancer:

- object onto object merges key by key, recursing into shared keys
- array onto array merges index by index, extending the target when the
  source is longer
- anything else is replaced by the source value
*/

use serde_json::{Map, Value};

/// Split a path into its segments.
///
/// Dots separate segments, `[n]` introduces an index segment, and quotes inside
/// brackets are stripped so `a["b.c"]` addresses the key `b.c`.
pub fn segments(path: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut chars = path.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '.' => {
                if !current.is_empty() {
                    parts.push(std::mem::take(&mut current));
                }
            }
            '[' => {
                if !current.is_empty() {
                    parts.push(std::mem::take(&mut current));
                }
                let mut inner = String::new();
                for next in chars.by_ref() {
                    if next == ']' {
                        break;
                    }
                    inner.push(next);
                }
                let inner = inner.trim_matches(|c| c == '"' || c == '\'');
                parts.push(inner.to_string());
            }
            _ => current.push(ch),
        }
    }
    if !current.is_empty() {
        parts.push(current);
    }
    parts
}

fn as_index(segment: &str) -> Option<usize> {
    if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    segment.parse().ok()
}

fn child<'a>(node: &'a Value, segment: &str) -> Option<&'a Value> {
    match node {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => as_index(segment).and_then(|i| items.get(i)),
        _ => None,
    }
}

/// Read the value at `path`, if every segment along the way exists.
pub fn get<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut node = root;
    for segment in segments(path) {
        node = child(node, &segment)?;
    }
    Some(node)
}

fn blank_for(next_segment: &str) -> Value {
    if as_index(next_segment).is_some() {
        Value::Array(Vec::new())
    } else {
        Value::Object(Map::new())
    }
}

fn ensure_object(node: &mut Value) -> &mut Map<String, Value> {
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    match node {
        Value::Object(map) => map,
        _ => unreachable!("node was just replaced with an object"),
    }
}

fn slot<'a>(node: &'a mut Value, segment: &str, next: Option<&str>) -> &'a mut Value {
    let slot = match (node, as_index(segment)) {
        (Value::Array(items), Some(index)) => {
            if items.len() <= index {
                items.resize(index + 1, Value::Null);
            }
            &mut items[index]
        }
        (node, _) => ensure_object(node)
            .entry(segment.to_string())
            .or_insert(Value::Null),
    };

    if let Some(next) = next {
        if !slot.is_object() && !slot.is_array() {
            *slot = blank_for(next);
        }
    }
    slot
}

/// Write `value` at `path`, creating intermediate objects or arrays as needed.
///
/// Intermediate nodes that are not containers are replaced. An empty path
/// replaces the root.
pub fn set(root: &mut Value, path: &str, value: Value) {
    let parts = segments(path);
    if parts.is_empty() {
        *root = value;
        return;
    }

    let mut node = root;
    for (i, segment) in parts.iter().enumerate() {
        let next = parts.get(i + 1).map(String::as_str);
        node = slot(node, segment, next);
    }
    *node = value;
}

/// Remove the value at `path`. Array elements are nulled rather than shifted.
///
/// Returns whether anything was removed.
pub fn unset(root: &mut Value, path: &str) -> bool {
    let parts = segments(path);
    let Some((last, parents)) = parts.split_last() else {
        return false;
    };

    let mut node = root;
    for segment in parents {
        node = match node {
            Value::Object(map) => match map.get_mut(segment) {
                Some(next) => next,
                None => return false,
            },
            Value::Array(items) => match as_index(segment).and_then(|i| items.get_mut(i)) {
                Some(next) => next,
                None => return false,
            },
            _ => return false,
        };
    }

    match node {
        Value::Object(map) => map.remove(last).is_some(),
        Value::Array(items) => match as_index(last).and_then(|i| items.get_mut(i)) {
            Some(item) => {
                *item = Value::Null;
                true
            }
            None => false,
        },
        _ => false,
    }
}

/// Build a new object holding only the listed paths that exist in `root`.
pub fn pick<S: AsRef<str>>(root: &Value, paths: &[S]) -> Value {
    let mut picked = Value::Object(Map::new());
    for path in paths {
        if let Some(value) = get(root, path.as_ref()) {
            set(&mut picked, path.as_ref(), value.clone());
        }
    }
    picked
}

/// Copy `root` without the listed paths. Non-object roots yield `{}`.
pub fn omit<S: AsRef<str>>(root: &Value, paths: &[S]) -> Value {
    if !root.is_object() {
        return Value::Object(Map::new());
    }
    let mut kept = root.clone();
    for path in paths {
        unset(&mut kept, path.as_ref());
    }
    kept
}

/// Deep-merge `source` into `target`; `source` wins on conflicts.
pub fn merge(target: &mut Value, source: &Value) {
    match (target, source) {
        (Value::Object(into), Value::Object(from)) => {
            for (key, value) in from {
                match into.get_mut(key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        into.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (Value::Array(into), Value::Array(from)) => {
            for (i, value) in from.iter().enumerate() {
                match into.get_mut(i) {
                    Some(existing) => merge(existing, value),
                    None => into.push(value.clone()),
                }
            }
        }
        (target, source) => *target = source.clone(),
    }
}

/// Merge `base` then `overlay` onto a fresh object.
///
/// Sources that are absent or not objects contribute nothing, so the result is
/// always an object.
pub fn merged(base: Option<&Value>, overlay: Option<&Value>) -> Value {
    let mut out = Value::Object(Map::new());
    for source in [base, overlay].into_iter().flatten() {
        if source.is_object() {
            merge(&mut out, source);
        }
    }
    out
}
