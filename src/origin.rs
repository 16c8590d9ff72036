//! Origin store access.
//!
//! The playback handler only needs one thing from the origin: the raw text of
//! the manifest stored under a key. [`OriginStore`] is that seam;
//! [`HttpOrigin`] implements it over the store's HTTP interface.

use crate::http_retry::{FetchError, RetryConfig, fetch_with_retry};
use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OriginError {
    /// Nothing stored under the key yet.
    #[error("no object at {0}")]
    NotFound(String),

    /// Network trouble or upstream 5xx; the caller may retry later.
    #[error("transient origin failure: {0}")]
    Transient(String),

    #[error("origin failure: {0}")]
    Failed(String),
}

#[async_trait]
pub trait OriginStore: Send + Sync {
    /// Fetch the manifest stored at `storage_key`.
    async fn fetch_manifest(&self, storage_key: &str) -> Result<String, OriginError>;
}

/// Origin store reachable over plain HTTP(S), e.g. an S3-compatible bucket
/// endpoint. Objects live at `{base_url}/{storage_key}`.
#[derive(Clone, Debug)]
pub struct HttpOrigin {
    client: Client,
    base_url: String,
    retry: RetryConfig,
}

impl HttpOrigin {
    pub fn new(client: Client, base_url: impl Into<String>, retry: RetryConfig) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            retry,
        }
    }

    pub fn object_url(&self, storage_key: &str) -> String {
        format!("{}/{}", self.base_url, storage_key.trim_start_matches('/'))
    }
}

#[async_trait]
impl OriginStore for HttpOrigin {
    async fn fetch_manifest(&self, storage_key: &str) -> Result<String, OriginError> {
        let url = self.object_url(storage_key);
        debug!("Fetching manifest from origin: {}", url);

        let response = fetch_with_retry(&self.client, &url, &self.retry)
            .await
            .map_err(|e| match e {
                FetchError::NotFound { .. } => OriginError::NotFound(storage_key.to_string()),
                FetchError::Transient { .. } => OriginError::Transient(e.to_string()),
                FetchError::Failed { .. } => OriginError::Failed(e.to_string()),
            })?;

        let body = response
            .text()
            .await
            .map_err(|e| OriginError::Transient(format!("reading body of {url}: {e}")))?;

        info!("Fetched manifest {} ({} bytes)", storage_key, body.len());
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const KEY: &str = "orgs/o1/uploads/a1/streaming/index.m3u8";

    fn origin(server: &MockServer) -> HttpOrigin {
        HttpOrigin::new(
            Client::new(),
            format!("{}/media/", server.uri()),
            RetryConfig {
                max_attempts: 2,
                backoff: Duration::from_millis(1),
                timeout: None,
            },
        )
    }

    #[test]
    fn object_url_joins_without_double_slash() {
        let origin = HttpOrigin::new(Client::new(), "https://origin.example.com/", RetryConfig::default());
        assert_eq!(
            origin.object_url("/orgs/o1/x.m3u8"),
            "https://origin.example.com/orgs/o1/x.m3u8"
        );
    }

    #[tokio::test]
    async fn fetches_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/media/{KEY}")))
            .respond_with(ResponseTemplate::new(200).set_body_string("#EXTM3U\n"))
            .mount(&server)
            .await;

        let body = origin(&server).fetch_manifest(KEY).await.unwrap();
        assert_eq!(body, "#EXTM3U\n");
    }

    #[tokio::test]
    async fn missing_object_maps_to_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = origin(&server).fetch_manifest(KEY).await.unwrap_err();
        assert_eq!(err, OriginError::NotFound(KEY.to_string()));
    }

    #[tokio::test]
    async fn server_errors_map_to_transient() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let err = origin(&server).fetch_manifest(KEY).await.unwrap_err();
        assert!(matches!(err, OriginError::Transient(_)));
    }

    #[tokio::test]
    async fn forbidden_maps_to_failed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let err = origin(&server).fetch_manifest(KEY).await.unwrap_err();
        assert!(matches!(err, OriginError::Failed(_)));
    }
}
