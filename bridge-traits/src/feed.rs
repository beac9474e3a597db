//! Provider Feed Abstraction
//!
//! A provider feed is the current list of playback URIs and display names an
//! external IPTV provider serves. How the list is obtained (HTTP, file,
//! fixture) and which wire format it arrives in is the implementation's
//! concern; the core only sees normalized [`FeedEntry`] values.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Everything a feed implementation needs to know about one provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedSource {
    /// Provider identifier in the catalog
    pub provider_id: i64,
    /// Owner of the provider
    pub user_id: i64,
    /// Human-readable provider name
    pub name: String,
    /// Location the feed is served from
    pub url: String,
}

/// One channel as served by a provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeedEntry {
    /// Playback URI, the natural key within a provider
    pub uri: String,
    /// Provider-supplied display name
    pub display_name: String,
}

impl FeedEntry {
    pub fn new(uri: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            display_name: display_name.into(),
        }
    }

    /// An entry without a URI cannot be matched against the catalog.
    pub fn is_usable(&self) -> bool {
        !self.uri.trim().is_empty()
    }
}

/// Provider feed trait
///
/// Returns the complete current feed for a provider. Implementations must not
/// page lazily: callers treat the returned list as the full set the provider
/// serves, and anything absent from it as no longer served.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::feed::{FeedSource, ProviderFeed};
///
/// async fn count(feed: &dyn ProviderFeed, source: &FeedSource) -> usize {
///     feed.fetch(source).await.map(|entries| entries.len()).unwrap_or(0)
/// }
/// ```
#[async_trait]
pub trait ProviderFeed: Send + Sync {
    /// Fetch the provider's current entries
    ///
    /// # Errors
    ///
    /// Returns an error if the provider cannot be reached or its payload
    /// cannot be turned into entries.
    async fn fetch(&self, source: &FeedSource) -> Result<Vec<FeedEntry>>;
}
