//! Pub/sub topic adapter.
//!
//! A topic is identified by its name and FIFO flag. Its primary attributes
//! (display name, access policy, delivery policy) are updated concurrently.
//! Delivery-status logging settings form a secondary group of per-protocol
//! entries that the provider rate-limits, so they are written one at a time.

use std::collections::BTreeMap;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::component::{Context, DeployDecision, Resource, ResourceInfo, SyncStatus};
use crate::error::{ComponentError, Result};
use crate::planner::{
    AttributeChange, SerialQueue, UpdateOrdering, diff, flatten_entries, is_truthy, run_concurrently,
    serialize_value,
};
use crate::provider::{TopicApi, topic_api};

/// Maximum topic name length, suffix included.
const MAX_NAME_LEN: usize = 256;

/// Name suffix required for FIFO topics.
const FIFO_SUFFIX: &str = ".fifo";

/// Attribute marking a FIFO topic at creation.
const FIFO_ATTRIBUTE: &str = "fifoTopic";

/// Maximum success sample rate, in percent.
const MAX_SAMPLE_RATE: u8 = 100;

/// Endpoint protocol for delivery-status logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryProtocol {
    /// Mobile application endpoints.
    Application,
    /// Firehose delivery streams.
    Firehose,
    /// HTTP/S endpoints.
    Http,
    /// Lambda functions.
    Lambda,
    /// Queues.
    Sqs,
}

impl DeliveryProtocol {
    /// Every protocol.
    pub const ALL: [Self; 5] = [
        Self::Application,
        Self::Firehose,
        Self::Http,
        Self::Lambda,
        Self::Sqs,
    ];

    /// Attribute key prefix.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Application => "application",
            Self::Firehose => "firehose",
            Self::Http => "http",
            Self::Lambda => "lambda",
            Self::Sqs => "sqs",
        }
    }
}

/// Delivery-status logging settings for one protocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DeliveryStatus {
    /// Protocol the settings apply to.
    pub protocol: DeliveryProtocol,
    /// Role used to log successful deliveries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success_feedback_role_arn: Option<String>,
    /// Percentage of successful deliveries to log.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success_feedback_sample_rate: Option<u8>,
    /// Role used to log failed deliveries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_feedback_role_arn: Option<String>,
}

impl DeliveryStatus {
    fn keys(protocol: DeliveryProtocol) -> [String; 3] {
        let prefix = protocol.as_str();
        [
            format!("{prefix}SuccessFeedbackRoleArn"),
            format!("{prefix}SuccessFeedbackSampleRate"),
            format!("{prefix}FailureFeedbackRoleArn"),
        ]
    }

    /// Flattens the entry into provider attribute keys.
    #[must_use]
    pub fn attributes(&self) -> BTreeMap<String, Value> {
        let [success_role, sample_rate, failure_role] = Self::keys(self.protocol);
        let mut attributes = BTreeMap::new();
        if let Some(arn) = &self.success_feedback_role_arn {
            attributes.insert(success_role, Value::String(arn.clone()));
        }
        if let Some(rate) = self.success_feedback_sample_rate {
            attributes.insert(sample_rate, Value::from(rate));
        }
        if let Some(arn) = &self.failure_feedback_role_arn {
            attributes.insert(failure_role, Value::String(arn.clone()));
        }
        attributes
    }

    fn from_live(protocol: DeliveryProtocol, live: &BTreeMap<String, String>) -> Option<Self> {
        let [success_role, sample_rate, failure_role] = Self::keys(protocol);
        let present = |key: &str| live.get(key).filter(|v| !v.is_empty()).cloned();

        let status = Self {
            protocol,
            success_feedback_role_arn: present(&success_role),
            success_feedback_sample_rate: present(&sample_rate).and_then(|v| v.parse().ok()),
            failure_feedback_role_arn: present(&failure_role),
        };
        let empty = status.success_feedback_role_arn.is_none()
            && status.success_feedback_sample_rate.is_none()
            && status.failure_feedback_role_arn.is_none();
        (!empty).then_some(status)
    }
}

/// A pub/sub topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Topic {
    /// Topic name.
    pub topic_name: String,
    /// Whether the topic is FIFO.
    #[serde(default)]
    pub fifo: bool,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Access policy document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<Value>,
    /// Delivery retry policy document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_policy: Option<Value>,
    /// Delivery-status logging, at most one entry per protocol.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub delivery_status: Vec<DeliveryStatus>,
    /// Provider-assigned ARN, set once deployed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arn: Option<String>,
}

/// Declared inputs of a [`Topic`].
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TopicInputs {
    /// Topic name.
    pub topic_name: String,
    /// Whether the topic is FIFO.
    #[serde(default)]
    pub fifo: bool,
    /// Display name.
    #[serde(default)]
    pub display_name: Option<String>,
    /// Access policy, as a document or a JSON string.
    #[serde(default)]
    pub policy: Option<Value>,
    /// Delivery policy, as a document or a JSON string.
    #[serde(default)]
    pub delivery_policy: Option<Value>,
    /// Delivery-status logging entries.
    #[serde(default)]
    pub delivery_status: Vec<DeliveryStatus>,
}

impl Topic {
    fn same_identity(&self, other: &Self) -> bool {
        self.topic_name == other.topic_name && self.fifo == other.fifo
    }

    /// Attributes updated concurrently.
    #[must_use]
    pub fn primary_attributes(&self) -> BTreeMap<String, Value> {
        let mut attributes = BTreeMap::new();
        if let Some(name) = &self.display_name {
            attributes.insert(String::from("displayName"), Value::String(name.clone()));
        }
        if let Some(policy) = &self.policy {
            attributes.insert(String::from("policy"), policy.clone());
        }
        if let Some(policy) = &self.delivery_policy {
            attributes.insert(String::from("deliveryPolicy"), policy.clone());
        }
        attributes
    }

    /// Delivery-status attributes, updated one at a time.
    #[must_use]
    pub fn secondary_attributes(&self) -> BTreeMap<String, Value> {
        let entries: Vec<_> = self.delivery_status.iter().map(DeliveryStatus::attributes).collect();
        flatten_entries(&entries)
    }

    fn creation_attributes(&self) -> BTreeMap<String, String> {
        let mut attributes: BTreeMap<String, String> = self
            .primary_attributes()
            .into_iter()
            .chain(self.secondary_attributes())
            .filter(|(_, value)| is_truthy(value))
            .map(|(key, value)| (key, serialize_value(&value)))
            .collect();
        if self.fifo {
            attributes.insert(String::from(FIFO_ATTRIBUTE), String::from("true"));
        }
        attributes
    }

    fn apply_live(&mut self, live: &BTreeMap<String, String>) {
        let present = |key: &str| live.get(key).filter(|v| !v.is_empty());

        self.display_name = present("displayName").cloned();
        self.policy = present("policy").map(|raw| decode_document(raw));
        self.delivery_policy = present("deliveryPolicy").map(|raw| decode_document(raw));
        self.delivery_status = DeliveryProtocol::ALL
            .into_iter()
            .filter_map(|protocol| DeliveryStatus::from_live(protocol, live))
            .collect();
        if let Some(flag) = live.get(FIFO_ATTRIBUTE) {
            self.fifo = flag == "true";
        }
    }

    async fn update(&self, previous: &Self, arn: &str, api: &dyn TopicApi, ctx: &Context) -> Result<()> {
        let primary = diff(&self.primary_attributes(), &previous.primary_attributes());
        let secondary = diff(&self.secondary_attributes(), &previous.secondary_attributes());
        if primary.is_empty() && secondary.is_empty() {
            debug!(topic = %self.topic_name, "No attribute changes");
            return Ok(());
        }

        let queue = SerialQueue::new().with_min_interval(ctx.settings().min_update_interval);

        match ctx.settings().update_ordering {
            UpdateOrdering::PrimaryThenSecondary => {
                run_concurrently(attribute_writes(api, arn, &primary)).await?;
                queue.run(attribute_writes(api, arn, &secondary)).await?;
            }
            UpdateOrdering::Concurrent => {
                futures::try_join!(
                    run_concurrently(attribute_writes(api, arn, &primary)),
                    queue.run(attribute_writes(api, arn, &secondary)),
                )?;
            }
        }

        ctx.log(&format!(
            "Updated topic {} ({} attribute writes)",
            self.topic_name,
            primary.len() + secondary.len()
        ));
        Ok(())
    }
}

fn attribute_writes<'a>(
    api: &'a dyn TopicApi,
    arn: &'a str,
    changes: &'a [AttributeChange],
) -> Vec<BoxFuture<'a, Result<()>>> {
    changes
        .iter()
        .map(|change| api.set_topic_attribute(arn, &change.key, &change.value))
        .collect()
}

/// Decodes a live attribute string holding a JSON document.
fn decode_document(raw: &str) -> Value {
    match serde_json::from_str::<Value>(raw) {
        Ok(document @ (Value::Object(_) | Value::Array(_))) => document,
        _ => Value::String(raw.to_string()),
    }
}

fn normalize_document(value: Option<Value>) -> Option<Value> {
    match value {
        Some(Value::String(raw)) => Some(decode_document(&raw)),
        other => other,
    }
}

fn validate_name(name: &str, fifo: bool) -> std::result::Result<(), String> {
    if name.len() > MAX_NAME_LEN {
        return Err(format!("topic name must be at most {MAX_NAME_LEN} characters"));
    }

    let base = match (fifo, name.strip_suffix(FIFO_SUFFIX)) {
        (true, Some(base)) => base,
        (true, None) => return Err(format!("FIFO topic name must end with '{FIFO_SUFFIX}'")),
        (false, Some(_)) => {
            return Err(format!("topic name ending with '{FIFO_SUFFIX}' requires fifo: true"));
        }
        (false, None) => name,
    };

    if base.is_empty() {
        return Err(String::from("topic name cannot be empty"));
    }
    if !base.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        return Err(format!(
            "topic name '{name}' may only contain alphanumerics, hyphens and underscores"
        ));
    }
    Ok(())
}

#[async_trait]
impl Resource for Topic {
    const TYPE: &'static str = "topic";
    type Inputs = TopicInputs;

    fn construct(inputs: TopicInputs, _ctx: &Context) -> Result<Self> {
        validate_name(&inputs.topic_name, inputs.fifo)
            .map_err(|message| ComponentError::invalid_inputs(Self::TYPE, message))?;

        let mut seen = Vec::with_capacity(inputs.delivery_status.len());
        for status in &inputs.delivery_status {
            if seen.contains(&status.protocol) {
                return Err(ComponentError::invalid_inputs(
                    Self::TYPE,
                    format!("duplicate delivery status for {}", status.protocol.as_str()),
                )
                .into());
            }
            seen.push(status.protocol);

            if status
                .success_feedback_sample_rate
                .is_some_and(|rate| rate > MAX_SAMPLE_RATE)
            {
                return Err(ComponentError::invalid_inputs(
                    Self::TYPE,
                    format!("success sample rate must be between 0 and {MAX_SAMPLE_RATE}"),
                )
                .into());
            }
        }

        Ok(Self {
            topic_name: inputs.topic_name,
            fifo: inputs.fifo,
            display_name: inputs.display_name,
            policy: normalize_document(inputs.policy),
            delivery_policy: normalize_document(inputs.delivery_policy),
            delivery_status: inputs.delivery_status,
            arn: None,
        })
    }

    fn declared(&self) -> Self {
        Self {
            arn: None,
            ..self.clone()
        }
    }

    fn adopt(&mut self, resolved: &Self) {
        if self.same_identity(resolved) {
            self.arn.clone_from(&resolved.arn);
        }
    }

    async fn sync(&mut self, ctx: &Context) -> Result<SyncStatus> {
        let api = topic_api(ctx)?;

        let arn = match &self.arn {
            Some(arn) => Some(arn.clone()),
            None => api.find_topic(&self.topic_name).await?,
        };
        let Some(arn) = arn else {
            return Ok(SyncStatus::Removed);
        };
        let Some(live) = api.get_topic_attributes(&arn).await? else {
            return Ok(SyncStatus::Removed);
        };

        self.apply_live(&live);
        self.arn = Some(arn);
        Ok(SyncStatus::Active)
    }

    fn external_id(&self) -> Option<String> {
        self.arn.clone()
    }

    fn should_deploy(&self, previous: Option<&Self>) -> DeployDecision {
        match previous {
            None => DeployDecision::Deploy,
            Some(prev) if !self.same_identity(prev) => DeployDecision::Replace,
            Some(prev) => {
                let pending = !diff(&self.primary_attributes(), &prev.primary_attributes()).is_empty()
                    || !diff(&self.secondary_attributes(), &prev.secondary_attributes()).is_empty();
                if pending {
                    DeployDecision::Deploy
                } else {
                    DeployDecision::None
                }
            }
        }
    }

    async fn deploy(&mut self, previous: Option<&Self>, ctx: &Context) -> Result<()> {
        let api = topic_api(ctx)?;

        let existing = previous
            .filter(|prev| self.same_identity(prev))
            .and_then(|prev| prev.arn.clone().map(|arn| (prev, arn)));

        match existing {
            Some((prev, arn)) => {
                self.update(prev, &arn, api, ctx).await?;
                self.arn = Some(arn);
            }
            None => {
                let arn = api
                    .create_topic(&self.topic_name, &self.creation_attributes())
                    .await?;
                ctx.log(&format!("Created topic {} ({arn})", self.topic_name));
                self.arn = Some(arn);
            }
        }
        Ok(())
    }

    async fn remove(&self, ctx: &Context) -> Result<()> {
        let Some(arn) = &self.arn else {
            debug!(topic = %self.topic_name, "Topic was never deployed, nothing to remove");
            return Ok(());
        };

        match topic_api(ctx)?.delete_topic(arn).await {
            Ok(()) => {
                ctx.log(&format!("Removed topic {}", self.topic_name));
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                warn!(topic = %self.topic_name, arn = %arn, "Topic already gone");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn info(&self) -> ResourceInfo {
        ResourceInfo {
            title: self.topic_name.clone(),
            type_name: String::from("Topic"),
            data: json!({
                "arn": self.arn,
                "displayName": self.display_name,
                "fifo": self.fifo,
            }),
        }
    }
}
