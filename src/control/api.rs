//! Remote control API client
//!
//! `POST /control` carries `{"cmd": "<wire command>"}` and answers with a
//! `message`. `GET /state` answers with the bot's current `status`.
//! Any 2xx with a parseable JSON body is success; everything else is an
//! [`ApiError`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use serde::Serialize;
use tracing::debug;

/// Errors from the remote control API
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Connection failure, timeout, or body read failure
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("server returned HTTP {0}")]
    HttpStatus(u16),

    /// Body was not JSON or lacked an expected field
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Reply to a control command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlReply {
    /// Human-readable server message, if the body carried one
    pub message: Option<String>,
}

/// Snapshot of the bot's remote state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteState {
    pub status: String,
}

/// The remote control service
#[async_trait]
pub trait ControlApi: Send + Sync {
    /// Send one wire command
    async fn send_command(&self, cmd: &str) -> Result<ControlReply, ApiError>;

    /// Fetch the authoritative remote state
    async fn fetch_state(&self) -> Result<RemoteState, ApiError>;
}

#[derive(Serialize)]
struct ControlRequest<'a> {
    cmd: &'a str,
}

/// HTTP implementation of [`ControlApi`]
pub struct HttpControlApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpControlApi {
    /// Create a client for the API rooted at `base_url`
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn read_json(response: reqwest::Response) -> Result<serde_json::Value, ApiError> {
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::HttpStatus(status.as_u16()));
        }

        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| ApiError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl ControlApi for HttpControlApi {
    async fn send_command(&self, cmd: &str) -> Result<ControlReply, ApiError> {
        let response = self
            .client
            .post(self.endpoint("control"))
            .json(&ControlRequest { cmd })
            .send()
            .await?;

        let body = Self::read_json(response).await?;
        debug!(%cmd, ?body, "control response");

        Ok(ControlReply {
            message: body
                .get("message")
                .and_then(|m| m.as_str())
                .map(str::to_string),
        })
    }

    async fn fetch_state(&self) -> Result<RemoteState, ApiError> {
        let response = self.client.get(self.endpoint("state")).send().await?;
        let body = Self::read_json(response).await?;

        match body.get("status").and_then(|s| s.as_str()) {
            Some(status) => Ok(RemoteState {
                status: status.to_string(),
            }),
            None => Err(ApiError::Malformed("missing `status` field".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> HttpControlApi {
        HttpControlApi::new(&server.uri(), Duration::from_secs(2)).unwrap()
    }

    #[tokio::test]
    async fn test_send_command_posts_cmd_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/control"))
            .and(header("accept", "application/json"))
            .and(body_json(json!({ "cmd": "forward" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "message": "ok" })))
            .expect(1)
            .mount(&server)
            .await;

        let reply = assert_ok!(client_for(&server).send_command("forward").await);
        assert_eq!(reply.message.as_deref(), Some("ok"));
    }

    #[tokio::test]
    async fn test_send_command_without_message_is_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/control"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let reply = assert_ok!(client_for(&server).send_command("stop").await);
        assert_eq!(reply.message, None);
    }

    #[tokio::test]
    async fn test_send_command_non_2xx_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/control"))
            .respond_with(ResponseTemplate::new(503).set_body_json(json!({ "message": "down" })))
            .mount(&server)
            .await;

        let err = assert_err!(client_for(&server).send_command("left").await);
        assert!(matches!(err, ApiError::HttpStatus(503)));
    }

    #[tokio::test]
    async fn test_send_command_non_json_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/control"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = assert_err!(client_for(&server).send_command("left").await);
        assert!(matches!(err, ApiError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_send_command_timeout_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/control"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "message": "late" }))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let api = HttpControlApi::new(&server.uri(), Duration::from_millis(50)).unwrap();
        let err = assert_err!(api.send_command("right").await);
        assert!(matches!(err, ApiError::Transport(_)));
    }

    #[tokio::test]
    async fn test_fetch_state() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/state"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "moving" })))
            .mount(&server)
            .await;

        // trailing slash on the base URL is tolerated
        let api = HttpControlApi::new(&format!("{}/", server.uri()), Duration::from_secs(2)).unwrap();
        let state = assert_ok!(api.fetch_state().await);
        assert_eq!(state.status, "moving");
    }

    #[tokio::test]
    async fn test_fetch_state_missing_status_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/state"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "state": "idle" })))
            .mount(&server)
            .await;

        let err = assert_err!(client_for(&server).fetch_state().await);
        assert!(matches!(err, ApiError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_fetch_state_connection_refused() {
        let server = MockServer::start().await;
        let uri = server.uri();
        drop(server);

        let api = HttpControlApi::new(&uri, Duration::from_secs(2)).unwrap();
        assert!(matches!(api.fetch_state().await, Err(ApiError::Transport(_))));
    }
}
