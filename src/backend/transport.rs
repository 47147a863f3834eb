//! HTTP transport seam
//!
//! The pipeline talks to the backend through [`Transport`] so the network can
//! be swapped out. [`HttpTransport`] is the reqwest implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::error::{DownloadError, DownloadResult};

/// Status and body of one backend reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: u16,
    pub body: String,
}

impl Reply {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    /// Parse the body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> DownloadResult<T> {
        serde_json::from_str(&self.body).map_err(DownloadError::from)
    }
}

/// A minimal async HTTP client
///
/// Non-200 statuses are replies, not errors; only transport failures are
/// returned as `Err`.
#[async_trait]
pub trait Transport: Send + Sync {
    /// GET `url`, optionally with a bearer token
    async fn get(&self, url: &str, bearer: Option<&str>) -> DownloadResult<Reply>;

    /// POST `body` as JSON to `url`
    async fn post_json(&self, url: &str, body: &Value) -> DownloadResult<Reply>;
}

/// reqwest-backed transport
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Create a transport whose requests time out after `timeout`
    pub fn new(timeout: Duration) -> DownloadResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("compass-downloader/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DownloadError::Network(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    async fn into_reply(response: reqwest::Response) -> DownloadResult<Reply> {
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(Reply { status, body })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str, bearer: Option<&str>) -> DownloadResult<Reply> {
        debug!(url, "GET");
        let mut request = self.client.get(url);
        if let Some(token) = bearer {
            request = request.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        Self::into_reply(request.send().await?).await
    }

    async fn post_json(&self, url: &str, body: &Value) -> DownloadResult<Reply> {
        debug!(url, "POST");
        let response = self.client.post(url).json(body).send().await?;
        Self::into_reply(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_json() {
        let reply = Reply::new(200, r#"{"access_token":"abc"}"#);
        assert!(reply.is_ok());
        let value: Value = reply.json().unwrap();
        assert_eq!(value["access_token"], "abc");

        let broken = Reply::new(200, "<html>");
        assert!(matches!(broken.json::<Value>(), Err(DownloadError::Json(_))));
    }

    #[test]
    fn test_http_transport_builds() {
        assert!(HttpTransport::new(Duration::from_secs(5)).is_ok());
    }
}
