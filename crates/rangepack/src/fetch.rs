//! Record retrieval
//!
//! [`RecordFetcher`] is the seam between the batch controller and the origin.
//! Production runs use [`HttpFetcher`]; tests substitute fetchers that count
//! concurrency or inject failures.

use crate::config::PipelineConfig;
use crate::error::{FetchError, PipelineError};
use crate::key::RecordKey;
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use tracing::trace;

/// Fetch one record into a caller-owned buffer
#[async_trait]
pub trait RecordFetcher: Send + Sync {
    /// Replace the contents of `slot` with the body of record `key`
    ///
    /// On success `slot` holds exactly the record's bytes. On failure its
    /// contents are unspecified.
    async fn fetch_into(&self, key: RecordKey, slot: &mut Vec<u8>) -> Result<(), FetchError>;
}

#[async_trait]
impl<F: RecordFetcher + ?Sized> RecordFetcher for Arc<F> {
    async fn fetch_into(&self, key: RecordKey, slot: &mut Vec<u8>) -> Result<(), FetchError> {
        (**self).fetch_into(key, slot).await
    }
}

/// Fetches records with `GET <base_url>/<key>`
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    base_url: String,
}

impl HttpFetcher {
    /// Build a fetcher whose connection pool matches the configured concurrency
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Client` if the HTTP client cannot be built.
    pub fn new(config: &PipelineConfig) -> Result<Self, PipelineError> {
        // Ignore the error, a provider may already be installed
        let _ = rustls::crypto::ring::default_provider().install_default();

        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .pool_max_idle_per_host(config.concurrency)
            .tcp_nodelay(true)
            .user_agent(concat!("rangepack/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(PipelineError::Client)?;

        Ok(Self::with_client(client, &config.base_url))
    }

    /// Wrap an existing client
    ///
    /// The crate builds reqwest without a bundled TLS crypto provider, so a
    /// rustls provider must be installed before `client` is built.
    /// [`new`](Self::new) does this itself.
    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Base URL records are fetched from
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// URL of one record
    pub fn record_url(&self, key: RecordKey) -> String {
        format!("{}/{}", self.base_url, key)
    }
}

#[async_trait]
impl RecordFetcher for HttpFetcher {
    async fn fetch_into(&self, key: RecordKey, slot: &mut Vec<u8>) -> Result<(), FetchError> {
        let url = self.record_url(key);
        trace!("Fetching {}", url);

        let mut response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|source| FetchError::Transport { key, source })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::UnexpectedStatus { key, status });
        }

        // Stream into the slot so its existing capacity is reused
        slot.clear();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|source| FetchError::Transport { key, source })?
        {
            slot.extend_from_slice(&chunk);
        }

        trace!("Fetched {} ({} bytes)", key, slot.len());
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::key::{Prefix, Suffix};
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_key() -> RecordKey {
        Prefix::new(0x01).key(Suffix::new(0x2ab).unwrap())
    }

    fn fetcher_for(server: &MockServer) -> HttpFetcher {
        let config = PipelineConfig::new(format!("{}/range/", server.uri()), 1)
            .with_request_timeout(Duration::from_secs(5));
        HttpFetcher::new(&config).unwrap()
    }

    #[test]
    fn test_record_url_joins_single_slash() {
        let config = PipelineConfig::new("http://origin:8009/range//", 1);
        let fetcher = HttpFetcher::new(&config).unwrap();
        assert_eq!(fetcher.base_url(), "http://origin:8009/range");
        assert_eq!(
            fetcher.record_url(test_key()),
            "http://origin:8009/range/012ab"
        );
    }

    #[test]
    fn test_with_client_after_provider_install() {
        let _ = rustls::crypto::ring::default_provider().install_default();
        let client = Client::builder().build().unwrap();
        let fetcher = HttpFetcher::with_client(client, "http://origin:8009/range");
        assert_eq!(
            fetcher.record_url(test_key()),
            "http://origin:8009/range/012ab"
        );
    }

    #[tokio::test]
    async fn test_fetch_replaces_slot_contents() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/range/012ab"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"record body".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = fetcher_for(&server);
        let mut slot = Vec::with_capacity(64);
        slot.extend_from_slice(b"stale bytes from a previous prefix");
        let capacity = slot.capacity();

        fetcher.fetch_into(test_key(), &mut slot).await.unwrap();
        assert_eq!(slot, b"record body");
        assert_eq!(slot.capacity(), capacity);
    }

    #[tokio::test]
    async fn test_fetch_empty_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/range/012ab"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let fetcher = fetcher_for(&server);
        let mut slot = b"old".to_vec();
        fetcher.fetch_into(test_key(), &mut slot).await.unwrap();
        assert!(slot.is_empty());
    }

    #[tokio::test]
    async fn test_non_success_status_names_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/range/012ab"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let fetcher = fetcher_for(&server);
        let mut slot = Vec::new();
        let err = fetcher.fetch_into(test_key(), &mut slot).await.unwrap_err();
        match err {
            FetchError::UnexpectedStatus { key, status } => {
                assert_eq!(key, test_key());
                assert_eq!(status.as_u16(), 404);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_timeout_is_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/range/012ab"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let config = PipelineConfig::new(format!("{}/range", server.uri()), 1)
            .with_request_timeout(Duration::from_millis(100));
        let fetcher = HttpFetcher::new(&config).unwrap();
        let mut slot = Vec::new();
        let err = fetcher.fetch_into(test_key(), &mut slot).await.unwrap_err();
        assert!(matches!(err, FetchError::Transport { .. }));
        assert_eq!(err.key(), test_key());
    }

    #[tokio::test]
    async fn test_shared_fetcher_through_arc() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/range/012ab"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"x".to_vec()))
            .mount(&server)
            .await;

        let fetcher = Arc::new(fetcher_for(&server));
        let mut slot = Vec::new();
        RecordFetcher::fetch_into(&fetcher, test_key(), &mut slot)
            .await
            .unwrap();
        assert_eq!(slot, b"x");
    }
}
