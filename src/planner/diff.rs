//! Attribute diff engine.
//!
//! Computes the minimal set of attribute writes that turns the previous
//! attribute set into the desired one. A desired attribute is emitted only
//! when it is truthy and its serialized form differs from the previous one.
//! A previous attribute that is no longer desired is emitted with an empty
//! value, which providers interpret as an explicit unset.

use std::collections::BTreeMap;

use serde_json::Value;

/// A single attribute write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeChange {
    /// Attribute name.
    pub key: String,
    /// Serialized value; empty means unset.
    pub value: String,
}

impl AttributeChange {
    /// Creates a set operation.
    #[must_use]
    pub fn set(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Creates an explicit unset.
    #[must_use]
    pub fn unset(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: String::new(),
        }
    }

    /// Returns true if this change clears the attribute.
    #[must_use]
    pub fn is_unset(&self) -> bool {
        self.value.is_empty()
    }
}

impl std::fmt::Display for AttributeChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_unset() {
            write!(f, "-{}", self.key)
        } else {
            write!(f, "{}={}", self.key, self.value)
        }
    }
}

/// Returns true if `value` counts as present.
///
/// `null`, `false`, zero and the empty string are absent. Lists and mappings
/// are present even when empty.
#[must_use]
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Serializes an attribute value for the provider.
///
/// Strings are passed through verbatim, everything else is JSON-encoded.
#[must_use]
pub fn serialize_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Computes the writes turning `previous` into `desired`.
///
/// Sets come first in key order, followed by unsets in key order. A key
/// never appears twice.
#[must_use]
pub fn diff(
    desired: &BTreeMap<String, Value>,
    previous: &BTreeMap<String, Value>,
) -> Vec<AttributeChange> {
    let mut changes = Vec::new();

    for (key, value) in desired {
        if !is_truthy(value) {
            continue;
        }
        let serialized = serialize_value(value);
        let unchanged = previous
            .get(key)
            .is_some_and(|old| is_truthy(old) && serialize_value(old) == serialized);
        if !unchanged {
            changes.push(AttributeChange::set(key.clone(), serialized));
        }
    }

    for (key, value) in previous {
        let still_desired = desired.get(key).is_some_and(is_truthy);
        if is_truthy(value) && !still_desired {
            changes.push(AttributeChange::unset(key.clone()));
        }
    }

    changes
}

/// Merges multi-entry attribute groups into one flat mapping.
///
/// Later entries win on key collisions.
#[must_use]
pub fn flatten_entries(entries: &[BTreeMap<String, Value>]) -> BTreeMap<String, Value> {
    entries
        .iter()
        .flat_map(|entry| entry.iter().map(|(k, v)| (k.clone(), v.clone())))
        .collect()
}

/// Applies `changes` to a serialized attribute set, as a provider would.
#[must_use]
pub fn apply_changes(
    attributes: &BTreeMap<String, String>,
    changes: &[AttributeChange],
) -> BTreeMap<String, String> {
    let mut result = attributes.clone();
    for change in changes {
        if change.is_unset() {
            result.remove(&change.key);
        } else {
            result.insert(change.key.clone(), change.value.clone());
        }
    }
    result
}
