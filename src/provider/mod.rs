//! Provider transports used by resource adapters.
//!
//! Adapters talk to the provider through the [`TopicApi`] trait. Two
//! transports are available: an in-memory provider for local runs and
//! tests, and an HTTP client for a JSON provider gateway.

mod api;
mod http;
mod memory;

pub use api::{SharedTopicApi, TopicApi, topic_api};
pub use http::HttpTopicApi;
pub use memory::{InMemoryTopicApi, ProviderCall};

#[cfg(test)]
pub use api::MockTopicApi;
