//! In-memory topic provider.
//!
//! Keeps topics in process memory and records every call, which makes it
//! the transport of choice for local dry runs and for exercising adapters
//! in tests.

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{ProviderError, Result};

use super::api::TopicApi;

const ARN_PREFIX: &str = "arn:canopy:topic:";

/// A call received by [`InMemoryTopicApi`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderCall {
    /// `create_topic`.
    Create {
        /// Topic name.
        name: String,
        /// Initial attributes.
        attributes: BTreeMap<String, String>,
    },
    /// `find_topic`.
    Find {
        /// Topic name.
        name: String,
    },
    /// `get_topic_attributes`.
    Get {
        /// Topic ARN.
        arn: String,
    },
    /// `set_topic_attribute`.
    Set {
        /// Topic ARN.
        arn: String,
        /// Attribute name.
        key: String,
        /// Serialized value.
        value: String,
    },
    /// `delete_topic`.
    Delete {
        /// Topic ARN.
        arn: String,
    },
}

#[derive(Debug, Default)]
struct Inner {
    topics: HashMap<String, BTreeMap<String, String>>,
    calls: Vec<ProviderCall>,
    failing_keys: HashSet<String>,
}

/// Topic provider backed by process memory.
#[derive(Debug, Default)]
pub struct InMemoryTopicApi {
    inner: Mutex<Inner>,
}

impl InMemoryTopicApi {
    /// Creates an empty provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// ARN assigned to the topic `name`.
    #[must_use]
    pub fn arn_for(name: &str) -> String {
        format!("{ARN_PREFIX}{name}")
    }

    /// Adds a topic without recording a call.
    pub async fn seed_topic(&self, name: &str, attributes: BTreeMap<String, String>) -> String {
        self.inner
            .lock()
            .await
            .topics
            .insert(name.to_string(), attributes);
        Self::arn_for(name)
    }

    /// Deletes a topic without recording a call, as if removed by someone else.
    pub async fn delete_out_of_band(&self, name: &str) {
        self.inner.lock().await.topics.remove(name);
    }

    /// Makes every write to `key` fail.
    pub async fn fail_attribute(&self, key: &str) {
        self.inner.lock().await.failing_keys.insert(key.to_string());
    }

    /// Current attributes of `name`.
    pub async fn attributes(&self, name: &str) -> Option<BTreeMap<String, String>> {
        self.inner.lock().await.topics.get(name).cloned()
    }

    /// Every call received so far.
    pub async fn calls(&self) -> Vec<ProviderCall> {
        self.inner.lock().await.calls.clone()
    }

    /// Number of `create_topic` calls.
    pub async fn create_count(&self) -> usize {
        self.count(|call| matches!(call, ProviderCall::Create { .. })).await
    }

    /// Number of `set_topic_attribute` calls.
    pub async fn set_count(&self) -> usize {
        self.count(|call| matches!(call, ProviderCall::Set { .. })).await
    }

    /// Number of `delete_topic` calls.
    pub async fn delete_count(&self) -> usize {
        self.count(|call| matches!(call, ProviderCall::Delete { .. })).await
    }

    async fn count(&self, predicate: impl Fn(&ProviderCall) -> bool) -> usize {
        self.inner
            .lock()
            .await
            .calls
            .iter()
            .filter(|call| predicate(call))
            .count()
    }
}

fn name_from_arn(arn: &str) -> Option<&str> {
    arn.strip_prefix(ARN_PREFIX)
}

#[async_trait]
impl TopicApi for InMemoryTopicApi {
    async fn create_topic(&self, name: &str, attributes: &BTreeMap<String, String>) -> Result<String> {
        let mut inner = self.inner.lock().await;
        inner.calls.push(ProviderCall::Create {
            name: name.to_string(),
            attributes: attributes.clone(),
        });
        inner
            .topics
            .entry(name.to_string())
            .or_default()
            .extend(attributes.iter().map(|(k, v)| (k.clone(), v.clone())));

        debug!(topic = name, "Created topic");
        Ok(Self::arn_for(name))
    }

    async fn find_topic(&self, name: &str) -> Result<Option<String>> {
        let mut inner = self.inner.lock().await;
        inner.calls.push(ProviderCall::Find {
            name: name.to_string(),
        });
        Ok(inner.topics.contains_key(name).then(|| Self::arn_for(name)))
    }

    async fn get_topic_attributes(&self, arn: &str) -> Result<Option<BTreeMap<String, String>>> {
        let mut inner = self.inner.lock().await;
        inner.calls.push(ProviderCall::Get {
            arn: arn.to_string(),
        });
        Ok(name_from_arn(arn).and_then(|name| inner.topics.get(name).cloned()))
    }

    async fn set_topic_attribute(&self, arn: &str, key: &str, value: &str) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.calls.push(ProviderCall::Set {
            arn: arn.to_string(),
            key: key.to_string(),
            value: value.to_string(),
        });

        if inner.failing_keys.contains(key) {
            return Err(ProviderError::api_error(400, format!("Invalid value for {key}")).into());
        }

        let attributes = name_from_arn(arn)
            .and_then(|name| inner.topics.get_mut(name))
            .ok_or_else(|| ProviderError::not_found(arn))?;
        if value.is_empty() {
            attributes.remove(key);
        } else {
            attributes.insert(key.to_string(), value.to_string());
        }
        Ok(())
    }

    async fn delete_topic(&self, arn: &str) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.calls.push(ProviderCall::Delete {
            arn: arn.to_string(),
        });

        let removed = name_from_arn(arn).and_then(|name| inner.topics.remove(name));
        if removed.is_none() {
            return Err(ProviderError::not_found(arn).into());
        }
        Ok(())
    }
}
