//! Outbound JSON delivery.
//!
//! The only outbound capability the channels need is "POST this JSON to that
//! URL". [`Transport`] captures it so channels can be exercised against
//! recording fakes or a mock server, and [`Deliverer`] layers the
//! error-notice fallback on top.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::DeliveryError;

/// Something that can POST a JSON body to a URL.
#[async_trait]
pub trait Transport: Send + Sync {
    /// POST `payload` to `url`, optionally with a bearer token.
    ///
    /// Any transport failure or non-2xx answer is an error.
    async fn post_json(
        &self,
        url: &str,
        bearer: Option<&str>,
        payload: &Value,
    ) -> Result<(), DeliveryError>;
}

/// `reqwest`-backed transport with a fixed per-request timeout.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport whose requests expire after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post_json(
        &self,
        url: &str,
        bearer: Option<&str>,
        payload: &Value,
    ) -> Result<(), DeliveryError> {
        let mut request = self.client.post(url).json(payload);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            warn!(status = %status, body = %body, "Chat endpoint rejected payload");
            return Err(DeliveryError::Status {
                status: status.as_u16(),
                body,
            });
        }

        // Slack's Web API reports failures in a 200 body.
        if let Ok(Value::Object(reply)) = serde_json::from_str::<Value>(&body) {
            if reply.get("ok") == Some(&Value::Bool(false)) {
                warn!(status = %status, body = %body, "Chat API returned ok=false");
                return Err(DeliveryError::Status {
                    status: status.as_u16(),
                    body,
                });
            }
        }

        debug!(status = %status, "Payload delivered");
        Ok(())
    }
}

/// A URL plus the credentials needed to post to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub url: String,
    pub bearer: Option<String>,
}

impl Endpoint {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            bearer: None,
        }
    }

    #[must_use]
    pub fn with_bearer(mut self, token: Option<String>) -> Self {
        self.bearer = token;
        self
    }
}

/// Serializes messages and hands them to a [`Transport`].
#[derive(Clone)]
pub struct Deliverer {
    transport: Arc<dyn Transport>,
}

impl Deliverer {
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Serialize `message` and POST it once to `endpoint`.
    pub async fn deliver<M>(&self, message: &M, endpoint: &Endpoint) -> Result<(), DeliveryError>
    where
        M: Serialize + Sync + ?Sized,
    {
        let payload = serde_json::to_value(message)?;
        self.transport
            .post_json(&endpoint.url, endpoint.bearer.as_deref(), &payload)
            .await
    }

    /// Deliver `message`; on failure send one error notice built by `notice`.
    ///
    /// The notice is best effort: its own failure is logged and dropped, and
    /// the original delivery error is returned either way.
    pub async fn deliver_or_report<M, N, F>(
        &self,
        message: &M,
        endpoint: &Endpoint,
        error_endpoint: Option<&Endpoint>,
        notice: F,
    ) -> Result<(), DeliveryError>
    where
        M: Serialize + Sync + ?Sized,
        N: Serialize + Sync,
        F: FnOnce(String) -> N + Send,
    {
        let Err(err) = self.deliver(message, endpoint).await else {
            return Ok(());
        };

        if let Some(error_endpoint) = error_endpoint {
            let notice = notice(err.to_string());
            self.report(&notice, error_endpoint).await;
        } else {
            debug!("No error channel configured, skipping error notice");
        }

        Err(err)
    }

    /// Best-effort post to an error channel.
    pub async fn report<N>(&self, notice: &N, endpoint: &Endpoint)
    where
        N: Serialize + Sync + ?Sized,
    {
        if let Err(e) = self.deliver(notice, endpoint).await {
            warn!(error = %e, "Failed to post error notice");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn transport() -> Arc<dyn Transport> {
        Arc::new(HttpTransport::new(Duration::from_secs(2)).unwrap())
    }

    #[tokio::test]
    async fn test_post_json_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(header("content-type", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        let deliverer = Deliverer::new(transport());
        let endpoint = Endpoint::new(format!("{}/hook", server.uri()));
        deliverer
            .deliver(&json!({"text": "hi"}), &endpoint)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_bearer_token_sent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let deliverer = Deliverer::new(transport());
        let endpoint = Endpoint::new(server.uri()).with_bearer(Some("secret".to_string()));
        deliverer.deliver(&json!({}), &endpoint).await.unwrap();
    }

    #[tokio::test]
    async fn test_non_success_status_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let deliverer = Deliverer::new(transport());
        let err = deliverer
            .deliver(&json!({}), &Endpoint::new(server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, DeliveryError::Status { status: 500, ref body } if body == "boom"));
    }

    #[tokio::test]
    async fn test_api_ok_false_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"ok": false, "error": "channel_not_found"})),
            )
            .mount(&server)
            .await;

        let deliverer = Deliverer::new(transport());
        let err = deliverer
            .deliver(&json!({}), &Endpoint::new(server.uri()))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("channel_not_found"));
    }

    #[tokio::test]
    async fn test_timeout_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let transport = Arc::new(HttpTransport::new(Duration::from_millis(100)).unwrap());
        let deliverer = Deliverer::new(transport);
        let err = deliverer
            .deliver(&json!({}), &Endpoint::new(server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, DeliveryError::Http(_)));
    }

    #[tokio::test]
    async fn test_failure_posts_notice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/primary"))
            .respond_with(ResponseTemplate::new(500).set_body_string("down"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/errors"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let deliverer = Deliverer::new(transport());
        let primary = Endpoint::new(format!("{}/primary", server.uri()));
        let errors = Endpoint::new(format!("{}/errors", server.uri()));

        let result = deliverer
            .deliver_or_report(&json!({"text": ""}), &primary, Some(&errors), |detail| {
                json!({ "detail": detail })
            })
            .await;
        assert!(matches!(result, Err(DeliveryError::Status { status: 500, .. })));

        let requests = server.received_requests().await.unwrap();
        let notice = requests
            .iter()
            .find(|r| r.url.path() == "/errors")
            .expect("error notice should be posted");
        let body: Value = serde_json::from_slice(&notice.body).unwrap();
        assert!(body["detail"].as_str().unwrap().contains("500"));
    }

    #[tokio::test]
    async fn test_failed_notice_keeps_original_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .expect(2)
            .mount(&server)
            .await;

        let deliverer = Deliverer::new(transport());
        let endpoint = Endpoint::new(server.uri());
        let result = deliverer
            .deliver_or_report(&json!({}), &endpoint, Some(&endpoint), |detail| detail)
            .await;
        assert!(matches!(result, Err(DeliveryError::Status { status: 503, .. })));
    }
}
