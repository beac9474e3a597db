//! HTTP feed connector implementation
//!
//! Implements the `ProviderFeed` trait over the `HttpClient` bridge.

use async_trait::async_trait;
use bridge_traits::error::Result;
use bridge_traits::feed::{FeedEntry, FeedSource, ProviderFeed};
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse, RetryPolicy};
use core_runtime::logging::redact_url_credentials;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::error::HttpFeedError;
use crate::types::FeedPayload;

/// Longest slice of an error body carried into the error message
const MAX_ERROR_BODY: usize = 200;

/// HTTP feed connector
///
/// Fetches `FeedSource::url` and decodes the normalized JSON entry list.
///
/// # Example
///
/// ```ignore
/// use provider_http::HttpFeedConnector;
/// use bridge_traits::feed::ProviderFeed;
///
/// let connector = HttpFeedConnector::new(http_client).with_retry_attempts(3);
/// let entries = connector.fetch(&provider.feed_source()).await?;
/// ```
pub struct HttpFeedConnector {
    http_client: Arc<dyn HttpClient>,
    retry_policy: RetryPolicy,
    request_timeout: Option<Duration>,
}

impl HttpFeedConnector {
    pub fn new(http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            http_client,
            retry_policy: RetryPolicy::default(),
            request_timeout: None,
        }
    }

    /// Attempts per fetch, including the first
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_policy = RetryPolicy::with_attempts(attempts);
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Per-request timeout. The caller's fetch timeout still bounds the
    /// whole fetch including retries.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    fn build_request(&self, url: &str) -> HttpRequest {
        let request = HttpRequest::get(url).header("Accept", "application/json");
        match self.request_timeout {
            Some(timeout) => request.timeout(timeout),
            None => request,
        }
    }

    /// Decode a successful response into entries.
    ///
    /// Entries without a URI are dropped; repeated URIs are kept, first
    /// occurrence first.
    fn decode(response: &HttpResponse) -> crate::Result<Vec<FeedEntry>> {
        let payload: FeedPayload = serde_json::from_slice(&response.body)
            .map_err(|e| HttpFeedError::Parse(e.to_string()))?;

        let wire = payload.into_entries();
        let total = wire.len();
        let entries: Vec<FeedEntry> = wire
            .into_iter()
            .map(FeedEntry::from)
            .filter(FeedEntry::is_usable)
            .collect();

        if entries.len() < total {
            warn!(dropped = total - entries.len(), "Feed entries without a URI were dropped");
        }

        let distinct: HashSet<&str> = entries.iter().map(|e| e.uri.as_str()).collect();
        if distinct.len() < entries.len() {
            debug!(
                repeated = entries.len() - distinct.len(),
                "Feed repeats some URIs"
            );
        }

        Ok(entries)
    }

    fn status_error(response: &HttpResponse) -> HttpFeedError {
        let body = String::from_utf8_lossy(&response.body);
        let message: String = body.trim().chars().take(MAX_ERROR_BODY).collect();
        HttpFeedError::Status {
            status_code: response.status,
            message,
        }
    }

    async fn fetch_entries(&self, source: &FeedSource) -> crate::Result<Vec<FeedEntry>> {
        let url = source.url.trim();
        if url.is_empty() {
            return Err(HttpFeedError::InvalidUrl {
                provider_id: source.provider_id,
                url: source.url.clone(),
            });
        }

        let response = self
            .http_client
            .execute_with_retry(self.build_request(url), self.retry_policy.clone())
            .await?;

        if !response.is_success() {
            warn!(status = response.status, "Feed request failed");
            return Err(Self::status_error(&response));
        }

        Self::decode(&response)
    }
}

#[async_trait]
impl ProviderFeed for HttpFeedConnector {
    #[instrument(
        skip(self, source),
        fields(provider_id = source.provider_id, url = %redact_url_credentials(&source.url))
    )]
    async fn fetch(&self, source: &FeedSource) -> Result<Vec<FeedEntry>> {
        let entries = self.fetch_entries(source).await?;
        info!(entries = entries.len(), "Fetched provider feed");
        Ok(entries)
    }
}
