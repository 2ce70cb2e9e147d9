//! Transport contract for topic operations.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::component::Context;
use crate::error::Result;

/// Topic operations offered by a provider.
///
/// Attribute values are already serialized; an empty value clears the attribute.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TopicApi: Send + Sync {
    /// Creates a topic with its initial attributes and returns its ARN.
    async fn create_topic(&self, name: &str, attributes: &BTreeMap<String, String>) -> Result<String>;

    /// Looks up a topic ARN by name.
    async fn find_topic(&self, name: &str) -> Result<Option<String>>;

    /// Reads the attributes of a topic, `None` if it does not exist.
    async fn get_topic_attributes(&self, arn: &str) -> Result<Option<BTreeMap<String, String>>>;

    /// Sets a single attribute.
    async fn set_topic_attribute(&self, arn: &str, key: &str, value: &str) -> Result<()>;

    /// Deletes a topic.
    async fn delete_topic(&self, arn: &str) -> Result<()>;
}

/// Shared handle stored in the [`Context`].
pub type SharedTopicApi = Arc<dyn TopicApi>;

/// Returns the topic API registered in `ctx`.
///
/// # Errors
///
/// Returns `ComponentError::MissingService` if none was registered.
pub fn topic_api(ctx: &Context) -> Result<&dyn TopicApi> {
    ctx.service::<SharedTopicApi>().map(|api| api.as_ref())
}
