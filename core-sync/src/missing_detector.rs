//! # Missing Detector
//!
//! Read-only report of stored records a provider no longer serves. Uses the
//! same URI set as the sync diff, so with `include_inactive = false` the
//! result is exactly what a sync with the same feed would deactivate.

use crate::error::{Result, StoreContext, SyncError};
use crate::plan::feed_uris;
use crate::sync_engine::fetch_feed;
use bridge_traits::{FeedEntry, ProviderFeed};
use core_catalog::{Provider, StreamRecord, StreamStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{info, instrument};

/// Records whose URI is absent from `feed`, in input order.
///
/// Inactive records are only reported when `include_inactive` is set.
pub fn missing_in(
    records: Vec<StreamRecord>,
    feed: &[FeedEntry],
    include_inactive: bool,
) -> Vec<StreamRecord> {
    let served = feed_uris(feed);
    records
        .into_iter()
        .filter(|record| include_inactive || record.active)
        .filter(|record| !served.contains(record.stream_uri.as_str()))
        .collect()
}

pub struct MissingDetector {
    store: Arc<dyn StreamStore>,
    feed: Arc<dyn ProviderFeed>,
    feed_timeout: Duration,
    store_timeout: Duration,
}

impl MissingDetector {
    pub fn new(
        store: Arc<dyn StreamStore>,
        feed: Arc<dyn ProviderFeed>,
        feed_timeout: Duration,
        store_timeout: Duration,
    ) -> Self {
        Self {
            store,
            feed,
            feed_timeout,
            store_timeout,
        }
    }

    /// Fetch the provider's feed and report what it no longer serves.
    ///
    /// # Errors
    ///
    /// - `ProviderFetch` if the feed cannot be fetched in time
    /// - `Store` if the provider's records cannot be read
    #[instrument(skip(self, provider), fields(provider_id = %provider.id))]
    pub async fn check_provider(
        &self,
        provider: &Provider,
        include_inactive: bool,
    ) -> Result<Vec<StreamRecord>> {
        let entries = fetch_feed(self.feed.as_ref(), provider, self.feed_timeout).await?;

        let records = timeout(self.store_timeout, self.store.load_by_provider(provider.id))
            .await
            .map_err(|_| {
                SyncError::store(
                    "load_by_provider",
                    format!("timed out after {:?}", self.store_timeout),
                )
            })?
            .during("load_by_provider")?;

        let stored = records.len();
        let missing = missing_in(records, &entries, include_inactive);
        info!(
            stored,
            served = entries.len(),
            missing = missing.len(),
            include_inactive,
            "Missing check finished"
        );
        Ok(missing)
    }
}
