//! HTTP client for a JSON provider gateway.
//!
//! Every operation is a `POST` of `{"action": ..., "params": {...}}` to the
//! gateway endpoint. The gateway answers with `{"data": ...}` on success or
//! `{"error": {"code": ..., "message": ...}}` on failure.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, header};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, trace};

use crate::error::{CanopyError, ProviderError, Result};

use super::api::TopicApi;

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Maximum number of attempts for transient failures.
const MAX_RETRIES: u32 = 3;

/// Delay between retries in milliseconds.
const RETRY_DELAY_MS: u64 = 1000;

/// Longest wait honored from a `retry-after` header, in seconds.
const MAX_RETRY_AFTER_SECS: u64 = 30;

/// Error code the gateway uses for missing resources.
const NOT_FOUND_CODE: &str = "NotFound";

/// Provider gateway client.
#[derive(Debug, Clone)]
pub struct HttpTopicApi {
    client: Client,
    endpoint: String,
    token: Option<String>,
    retry_delay: Duration,
    max_retry_after: Duration,
}

#[derive(Debug, Serialize)]
struct GatewayRequest<'a> {
    action: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct GatewayResponse {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    error: Option<GatewayError>,
}

#[derive(Debug, Deserialize)]
struct GatewayError {
    code: String,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ArnData {
    topic_arn: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AttributesData {
    attributes: Option<BTreeMap<String, String>>,
}

impl HttpTopicApi {
    /// Creates a client for `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(endpoint: &str, token: Option<String>) -> Result<Self> {
        Self::with_timeout(endpoint, token, DEFAULT_TIMEOUT_SECS)
    }

    /// Creates a client with a custom timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn with_timeout(endpoint: &str, token: Option<String>, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ProviderError::network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            token,
            retry_delay: Duration::from_millis(RETRY_DELAY_MS),
            max_retry_after: Duration::from_secs(MAX_RETRY_AFTER_SECS),
        })
    }

    /// Overrides the base delay between retries.
    #[must_use]
    pub const fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Caps how long a rate-limited call waits on the gateway's `retry-after`.
    #[must_use]
    pub const fn with_max_retry_after(mut self, max: Duration) -> Self {
        self.max_retry_after = max;
        self
    }

    fn backoff(&self, attempt: u32, last_error: Option<&CanopyError>) -> Duration {
        last_error
            .and_then(CanopyError::retry_delay_secs)
            .map_or(self.retry_delay * attempt, |secs| {
                Duration::from_secs(secs).min(self.max_retry_after)
            })
    }

    async fn call<T: DeserializeOwned>(&self, action: &str, params: Value) -> Result<T> {
        let request = GatewayRequest { action, params };
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                let delay = self.backoff(attempt, last_error.as_ref());
                debug!("Retry attempt {attempt} of {MAX_RETRIES} for {action} in {delay:?}");
                tokio::time::sleep(delay).await;
            }

            match self.call_once(&request).await {
                Ok(data) => {
                    return serde_json::from_value(data).map_err(|e| {
                        ProviderError::InvalidResponse {
                            message: format!("Unexpected {action} payload: {e}"),
                        }
                        .into()
                    });
                }
                Err(e) if e.is_retryable() => last_error = Some(e),
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| ProviderError::network("Max retries exceeded").into()))
    }

    async fn call_once(&self, request: &GatewayRequest<'_>) -> Result<Value> {
        trace!(action = request.action, "Calling provider gateway");

        let mut builder = self
            .client
            .post(&self.endpoint)
            .header(header::CONTENT_TYPE, "application/json")
            .json(request);
        if let Some(token) = &self.token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ProviderError::network(format!("Request failed: {e}")))?;

        let status = response.status();

        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or_default();
            let retry_after = if retry_after == 0 { 60 } else { retry_after };

            return Err(ProviderError::RateLimited {
                retry_after_secs: retry_after,
            }
            .into());
        }

        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(ProviderError::AuthenticationFailed {
                message: String::from("Invalid provider token"),
            }
            .into());
        }

        let body: Option<GatewayResponse> = response.json().await.ok();

        if let Some(error) = body.as_ref().and_then(|b| b.error.as_ref()) {
            if error.code == NOT_FOUND_CODE {
                return Err(ProviderError::not_found(error.message.clone()).into());
            }
            return Err(ProviderError::api_error(status.as_u16(), format!("{}: {}", error.code, error.message)).into());
        }

        if !status.is_success() {
            return Err(ProviderError::api_error(status.as_u16(), status.to_string()).into());
        }

        let body = body.ok_or_else(|| ProviderError::InvalidResponse {
            message: String::from("Response is not a gateway envelope"),
        })?;
        Ok(body.data.unwrap_or(Value::Null))
    }
}

#[async_trait]
impl TopicApi for HttpTopicApi {
    async fn create_topic(&self, name: &str, attributes: &BTreeMap<String, String>) -> Result<String> {
        let data: ArnData = self
            .call("CreateTopic", json!({"name": name, "attributes": attributes}))
            .await?;
        data.topic_arn.ok_or_else(|| {
            CanopyError::from(ProviderError::InvalidResponse {
                message: String::from("CreateTopic returned no topicArn"),
            })
        })
    }

    async fn find_topic(&self, name: &str) -> Result<Option<String>> {
        let data: ArnData = self.call("FindTopic", json!({"name": name})).await?;
        Ok(data.topic_arn)
    }

    async fn get_topic_attributes(&self, arn: &str) -> Result<Option<BTreeMap<String, String>>> {
        match self
            .call::<AttributesData>("GetTopicAttributes", json!({"topicArn": arn}))
            .await
        {
            Ok(data) => Ok(data.attributes),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn set_topic_attribute(&self, arn: &str, key: &str, value: &str) -> Result<()> {
        let _: Value = self
            .call(
                "SetTopicAttributes",
                json!({"topicArn": arn, "attributeName": key, "attributeValue": value}),
            )
            .await?;
        Ok(())
    }

    async fn delete_topic(&self, arn: &str) -> Result<()> {
        let _: Value = self.call("DeleteTopic", json!({"topicArn": arn})).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_partial_json, header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn client(server: &MockServer) -> HttpTopicApi {
        HttpTopicApi::new(&server.uri(), Some(String::from("secret")))
            .unwrap()
            .with_retry_delay(Duration::from_millis(1))
            .with_max_retry_after(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_create_topic_sends_attributes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("authorization", "Bearer secret"))
            .and(body_partial_json(json!({
                "action": "CreateTopic",
                "params": {"name": "orders", "attributes": {"displayName": "Orders"}}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"topicArn": "arn:gw:orders"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let attributes = BTreeMap::from([(String::from("displayName"), String::from("Orders"))]);
        let arn = client(&server).create_topic("orders", &attributes).await.unwrap();

        assert_eq!(arn, "arn:gw:orders");
    }

    #[tokio::test]
    async fn test_not_found_code_maps_to_absent_topic() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": {"code": "NotFound", "message": "arn:gw:ghost"}
            })))
            .mount(&server)
            .await;

        let api = client(&server);
        assert!(api.get_topic_attributes("arn:gw:ghost").await.unwrap().is_none());
        assert!(api.delete_topic("arn:gw:ghost").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_rate_limit_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "1"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {}})))
            .mount(&server)
            .await;

        let api = client(&server);
        api.set_topic_attribute("arn:gw:orders", "displayName", "Orders")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_rate_limit_waits_for_retry_after() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "1"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {}})))
            .mount(&server)
            .await;

        let api = client(&server).with_max_retry_after(Duration::from_secs(5));
        let started = std::time::Instant::now();
        api.delete_topic("arn:gw:orders").await.unwrap();

        assert!(started.elapsed() >= Duration::from_secs(1));
    }

    #[test]
    fn test_backoff_caps_retry_after() {
        let api = HttpTopicApi::new("http://localhost:1", None)
            .unwrap()
            .with_retry_delay(Duration::from_millis(10))
            .with_max_retry_after(Duration::from_secs(2));
        let limited = CanopyError::Provider(ProviderError::RateLimited { retry_after_secs: 60 });
        let network = CanopyError::Provider(ProviderError::network("reset"));

        assert_eq!(api.backoff(1, Some(&limited)), Duration::from_secs(2));
        assert_eq!(api.backoff(2, Some(&network)), Duration::from_millis(20));
        assert_eq!(api.backoff(1, None), Duration::from_millis(10));
    }

    #[tokio::test]
    async fn test_unauthorized_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let err = client(&server).find_topic("orders").await.unwrap_err();
        assert!(matches!(
            err,
            CanopyError::Provider(ProviderError::AuthenticationFailed { .. })
        ));
    }
}
