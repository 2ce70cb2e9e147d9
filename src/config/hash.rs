//! Configuration hashing for change detection.
//!
//! Hashes are recorded in history entries so an operator can tell which
//! configuration produced a given snapshot.

use serde_json::Value;
use sha2::{Digest, Sha256};

use super::spec::StackConfig;

/// Hasher for computing configuration hashes.
#[derive(Debug, Default)]
pub struct ConfigHasher;

impl ConfigHasher {
    /// Creates a new configuration hasher.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Computes a hash of the entire stack configuration.
    ///
    /// Provider connection details and the state path are not hashed.
    #[must_use]
    pub fn hash_config(&self, config: &StackConfig) -> String {
        let mut hasher = Sha256::new();

        hasher.update(config.project.name.as_bytes());
        hasher.update(config.project.environment.as_bytes());
        hasher.update(config.engine.update_ordering.to_string().as_bytes());
        hasher.update(config.engine.min_update_interval_ms.to_be_bytes());
        hasher.update(self.hash_declaration(&config.root).as_bytes());

        hex::encode(hasher.finalize())
    }

    /// Computes a hash for one component declaration and its children.
    #[must_use]
    pub fn hash_declaration(&self, declaration: &Value) -> String {
        let mut hasher = Sha256::new();
        hash_value(&mut hasher, declaration);
        hex::encode(hasher.finalize())
    }

    /// Computes a short hash (first 8 characters) for display purposes.
    #[must_use]
    pub fn short_hash(&self, hash: &str) -> String {
        hash.chars().take(8).collect()
    }

    /// Compares two hashes to determine if they are equal.
    #[must_use]
    pub fn hashes_match(hash1: &str, hash2: &str) -> bool {
        if hash1.len() != hash2.len() {
            return false;
        }

        hash1
            .bytes()
            .zip(hash2.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}

/// Feeds a value into the hasher with a type tag per node, so `"1"` and `1`
/// hash differently.
fn hash_value(hasher: &mut Sha256, value: &Value) {
    match value {
        Value::Null => hasher.update([0u8]),
        Value::Bool(b) => hasher.update([1u8, u8::from(*b)]),
        Value::Number(n) => {
            hasher.update([2u8]);
            hasher.update(n.to_string().as_bytes());
        }
        Value::String(s) => {
            hasher.update([3u8]);
            hasher.update((s.len() as u64).to_be_bytes());
            hasher.update(s.as_bytes());
        }
        Value::Array(items) => {
            hasher.update([4u8]);
            hasher.update((items.len() as u64).to_be_bytes());
            for item in items {
                hash_value(hasher, item);
            }
        }
        Value::Object(map) => {
            hasher.update([5u8]);
            hasher.update((map.len() as u64).to_be_bytes());
            // Sorted for determinism
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            for (key, item) in entries {
                hasher.update((key.len() as u64).to_be_bytes());
                hasher.update(key.as_bytes());
                hash_value(hasher, item);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::config::{EngineConfig, ProjectConfig, ProviderConfig, StateConfig};

    fn create_test_config(root: Value) -> StackConfig {
        StackConfig {
            project: ProjectConfig {
                name: String::from("shop"),
                environment: String::from("dev"),
            },
            state: StateConfig::default(),
            provider: ProviderConfig::default(),
            engine: EngineConfig::default(),
            root,
        }
    }

    #[test]
    fn test_config_hash_deterministic() {
        let hasher = ConfigHasher::new();
        let config = create_test_config(json!({"type": "topic", "topicName": "orders"}));

        assert_eq!(hasher.hash_config(&config), hasher.hash_config(&config));
    }

    #[test]
    fn test_declaration_change_changes_hash() {
        let hasher = ConfigHasher::new();
        let a = create_test_config(json!({"type": "topic", "topicName": "orders"}));
        let b = create_test_config(json!({"type": "topic", "topicName": "orders", "displayName": "Orders"}));

        assert_ne!(hasher.hash_config(&a), hasher.hash_config(&b));
    }

    #[test]
    fn test_value_types_are_distinguished() {
        let hasher = ConfigHasher::new();
        assert_ne!(
            hasher.hash_declaration(&json!({"rate": 1})),
            hasher.hash_declaration(&json!({"rate": "1"}))
        );
    }

    #[test]
    fn test_provider_endpoint_is_not_hashed() {
        let hasher = ConfigHasher::new();
        let a = create_test_config(json!({"type": "topic", "topicName": "orders"}));
        let mut b = a.clone();
        b.provider.endpoint = Some(String::from("http://elsewhere"));

        assert_eq!(hasher.hash_config(&a), hasher.hash_config(&b));
    }

    #[test]
    fn test_short_hash() {
        let hasher = ConfigHasher::new();
        let short = hasher.short_hash("abcdef1234567890abcdef1234567890");

        assert_eq!(short, "abcdef12");
    }

    #[test]
    fn test_hashes_match() {
        assert!(ConfigHasher::hashes_match("abc123", "abc123"));
        assert!(!ConfigHasher::hashes_match("abc123", "abc124"));
        assert!(!ConfigHasher::hashes_match("abc123", "abc12"));
    }
}
