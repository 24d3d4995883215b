/*!
Path-based transform engine applied to the store state before it is saved.

A [`TransformMap`] is an ordered list of rules keyed by a source path. A rule
either renames (copies) the source value to another path, or derives new
values from it with a closure.
*/

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::path;

/// Closure signature for derived transforms: `(source_key, source_value, full_state)`.
pub type DeriveFn = Arc<dyn Fn(&str, Option<&Value>, &Value) -> Derived + Send + Sync>;

/// Writes requested by a derive rule.
///
/// `target_value` is written at `target_key` only when both are present and the
/// key is non-empty. `source_value` rewrites the rule's own source path.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Derived {
    pub target_key: Option<String>,
    pub target_value: Option<Value>,
    pub source_value: Option<Value>,
}

impl Derived {
    /// Write `value` at `key`.
    pub fn target<K: Into<String>>(key: K, value: Value) -> Self {
        Self {
            target_key: Some(key.into()),
            target_value: Some(value),
            source_value: None,
        }
    }

    /// Rewrite the source path in place.
    pub fn source(value: Value) -> Self {
        Self {
            source_value: Some(value),
            ..Self::default()
        }
    }

    /// Also rewrite the source path in place.
    pub fn with_source(mut self, value: Value) -> Self {
        self.source_value = Some(value);
        self
    }
}

/// A single transform rule.
#[derive(Clone)]
pub enum TransformRule {
    /// Copy the source value to another path.
    Rename { to: String },
    /// Compute writes from the source value.
    Derive(DeriveFn),
}

impl fmt::Debug for TransformRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rename { to } => f.debug_struct("Rename").field("to", to).finish(),
            Self::Derive(_) => f.write_str("Derive(..)"),
        }
    }
}

/// Ordered set of transform rules. Later rules win on overlapping writes.
#[derive(Debug, Clone, Default)]
pub struct TransformMap {
    rules: Vec<(String, TransformRule)>,
}

impl TransformMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule copying the value at `from` to `to`.
    pub fn rename<F: Into<String>, T: Into<String>>(mut self, from: F, to: T) -> Self {
        self.rules
            .push((from.into(), TransformRule::Rename { to: to.into() }));
        self
    }

    /// Add a rule deriving writes from the value at `from`.
    pub fn derive<F, D>(mut self, from: F, derive: D) -> Self
    where
        F: Into<String>,
        D: Fn(&str, Option<&Value>, &Value) -> Derived + Send + Sync + 'static,
    {
        self.rules
            .push((from.into(), TransformRule::Derive(Arc::new(derive))));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Apply every rule to `state`, returning the transformed copy.
    pub fn apply(&self, state: &Value) -> Value {
        transform(self, state)
    }
}

/// Apply `map` to `state`.
///
/// Rule writes are collected into a fresh object which is then deep-merged over
/// a copy of `state`, so every path the map does not touch is preserved.
pub fn transform(map: &TransformMap, state: &Value) -> Value {
    let mut result = Value::Object(Map::new());

    for (key, rule) in &map.rules {
        let source = path::get(state, key);
        match rule {
            TransformRule::Rename { to } => {
                if let Some(value) = source {
                    path::set(&mut result, to, value.clone());
                }
            }
            TransformRule::Derive(derive) => {
                let derived = derive(key, source, state);
                if let (Some(target_key), Some(target_value)) =
                    (derived.target_key.as_deref(), derived.target_value)
                {
                    if !target_key.is_empty() {
                        path::set(&mut result, target_key, target_value);
                    }
                }
                if let Some(source_value) = derived.source_value {
                    path::set(&mut result, key, source_value);
                }
            }
        }
    }

    path::merged(Some(state), Some(&result))
}
