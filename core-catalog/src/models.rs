//! Domain models for the stream catalog
//!
//! Rows map straight onto these types with `sqlx::FromRow`. Curated metadata
//! columns are nullable; an empty string and `NULL` both mean "no value".

use crate::error::{CatalogError, Result};
use bridge_traits::FeedSource;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

// =============================================================================
// ID Types
// =============================================================================

/// Storage-assigned stream identifier, never reused
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct StreamId(pub i64);

/// Provider identifier
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct ProviderId(pub i64);

/// Owning user identifier
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct UserId(pub i64);

macro_rules! display_id {
    ($($ty:ty),*) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    write!(f, "{}", self.0)
                }
            }
        )*
    };
}

display_id!(StreamId, ProviderId, UserId);

// =============================================================================
// Stream lifecycle
// =============================================================================

/// Lifecycle of a stream record
///
/// ```text
/// Active ──sync──> Inactive ──cleanup──> Removed
///   ^                 │
///   └──sync (seen)────┘
/// ```
///
/// `Removed` is terminal and has no stored form: cleanup deletes the row
/// outright, so the state is only implied by the record's absence. The
/// `-> Removed` edges exist for callers reasoning about a record in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamState {
    Active,
    Inactive,
    Removed,
}

impl StreamState {
    pub fn from_active(active: bool) -> Self {
        if active {
            StreamState::Active
        } else {
            StreamState::Inactive
        }
    }

    pub fn can_transition_to(self, next: StreamState) -> bool {
        matches!(
            (self, next),
            (StreamState::Active, StreamState::Inactive)
                | (StreamState::Inactive, StreamState::Active)
                | (StreamState::Active, StreamState::Removed)
                | (StreamState::Inactive, StreamState::Removed)
        )
    }

    /// Validate and perform a transition.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::InvalidTransition`] for a self-transition or
    /// any transition out of `Removed`.
    pub fn transition_to(self, next: StreamState) -> Result<StreamState> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(CatalogError::InvalidTransition {
                from: self,
                to: next,
            })
        }
    }
}

impl fmt::Display for StreamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            StreamState::Active => "active",
            StreamState::Inactive => "inactive",
            StreamState::Removed => "removed",
        };
        f.write_str(label)
    }
}

// =============================================================================
// Curated metadata fields
// =============================================================================

/// The curated columns fixup may write. `stream_uri` and `orig_name` have no
/// variant here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataField {
    TvgId,
    Logo,
    TvgGroup,
    Name,
    Channel,
}

impl MetadataField {
    pub const ALL: [MetadataField; 5] = [
        MetadataField::TvgId,
        MetadataField::Logo,
        MetadataField::TvgGroup,
        MetadataField::Name,
        MetadataField::Channel,
    ];

    /// Column name, also the name accepted on the command line.
    pub fn column(self) -> &'static str {
        match self {
            MetadataField::TvgId => "tvg_id",
            MetadataField::Logo => "logo",
            MetadataField::TvgGroup => "tvg_group",
            MetadataField::Name => "name",
            MetadataField::Channel => "channel",
        }
    }
}

impl fmt::Display for MetadataField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

impl FromStr for MetadataField {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        MetadataField::ALL
            .into_iter()
            .find(|field| field.column().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| CatalogError::InvalidInput {
                field: "metadata_field".to_string(),
                message: format!("unknown field '{}'", wanted),
            })
    }
}

// =============================================================================
// Stream records
// =============================================================================

/// A stored channel entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct StreamRecord {
    pub id: StreamId,
    pub provider_id: ProviderId,
    pub user_id: UserId,
    pub stream_uri: String,
    pub orig_name: String,
    pub tvg_id: Option<String>,
    pub logo: Option<String>,
    pub tvg_group: Option<String>,
    pub name: Option<String>,
    pub channel: Option<String>,
    pub active: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl StreamRecord {
    /// Build an active record in memory. Storage assigns real ids; this is
    /// for pure computations and tests.
    pub fn new(
        id: StreamId,
        provider_id: ProviderId,
        user_id: UserId,
        stream_uri: impl Into<String>,
        orig_name: impl Into<String>,
    ) -> Self {
        Self {
            id,
            provider_id,
            user_id,
            stream_uri: stream_uri.into(),
            orig_name: orig_name.into(),
            tvg_id: None,
            logo: None,
            tvg_group: None,
            name: None,
            channel: None,
            active: true,
            created_at: 0,
            updated_at: 0,
        }
    }

    pub fn with_metadata(mut self, field: MetadataField, value: impl Into<String>) -> Self {
        *self.metadata_slot(field) = Some(value.into());
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    pub fn state(&self) -> StreamState {
        StreamState::from_active(self.active)
    }

    /// Curated value, with blank strings reported as absent.
    pub fn metadata(&self, field: MetadataField) -> Option<&str> {
        let value = match field {
            MetadataField::TvgId => &self.tvg_id,
            MetadataField::Logo => &self.logo,
            MetadataField::TvgGroup => &self.tvg_group,
            MetadataField::Name => &self.name,
            MetadataField::Channel => &self.channel,
        };
        value.as_deref().filter(|v| !v.trim().is_empty())
    }

    pub fn set_metadata(&mut self, field: MetadataField, value: impl Into<String>) {
        *self.metadata_slot(field) = Some(value.into());
    }

    fn metadata_slot(&mut self, field: MetadataField) -> &mut Option<String> {
        match field {
            MetadataField::TvgId => &mut self.tvg_id,
            MetadataField::Logo => &mut self.logo,
            MetadataField::TvgGroup => &mut self.tvg_group,
            MetadataField::Name => &mut self.name,
            MetadataField::Channel => &mut self.channel,
        }
    }
}

/// A stream about to be created by sync
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewStream {
    pub provider_id: ProviderId,
    pub user_id: UserId,
    pub stream_uri: String,
    pub orig_name: String,
}

impl NewStream {
    pub fn validate(&self) -> Result<()> {
        if self.stream_uri.trim().is_empty() {
            return Err(CatalogError::InvalidInput {
                field: "stream_uri".to_string(),
                message: "stream URI cannot be empty".to_string(),
            });
        }
        Ok(())
    }
}

// =============================================================================
// Providers
// =============================================================================

/// An external feed owned by one user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Provider {
    pub id: ProviderId,
    pub user_id: UserId,
    pub name: String,
    pub feed_url: String,
    pub last_synced_at: Option<i64>,
    pub created_at: i64,
}

impl Provider {
    /// Descriptor handed to the feed collaborator.
    pub fn feed_source(&self) -> FeedSource {
        FeedSource {
            provider_id: self.id.0,
            user_id: self.user_id.0,
            name: self.name.clone(),
            url: self.feed_url.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProvider {
    pub user_id: UserId,
    pub name: String,
    pub feed_url: String,
}

impl NewProvider {
    pub fn new(user_id: UserId, name: impl Into<String>, feed_url: impl Into<String>) -> Self {
        Self {
            user_id,
            name: name.into(),
            feed_url: feed_url.into(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(CatalogError::InvalidInput {
                field: "name".to_string(),
                message: "provider name cannot be empty".to_string(),
            });
        }
        if self.feed_url.trim().is_empty() {
            return Err(CatalogError::InvalidInput {
                field: "feed_url".to_string(),
                message: "feed URL cannot be empty".to_string(),
            });
        }
        Ok(())
    }
}

/// Scope of a reconciliation run. Empty means every provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderFilter {
    pub user_id: Option<UserId>,
    pub provider_id: Option<ProviderId>,
}

impl ProviderFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn for_user(user_id: UserId) -> Self {
        Self {
            user_id: Some(user_id),
            provider_id: None,
        }
    }

    pub fn for_provider(provider_id: ProviderId) -> Self {
        Self {
            user_id: None,
            provider_id: Some(provider_id),
        }
    }

    pub fn matches(&self, provider: &Provider) -> bool {
        self.user_id.map_or(true, |id| id == provider.user_id)
            && self.provider_id.map_or(true, |id| id == provider.id)
    }
}

impl fmt::Display for ProviderFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.user_id, self.provider_id) {
            (None, None) => f.write_str("all providers"),
            (Some(user), None) => write!(f, "user {}", user),
            (None, Some(provider)) => write!(f, "provider {}", provider),
            (Some(user), Some(provider)) => write!(f, "provider {} of user {}", provider, user),
        }
    }
}

/// Rows removed by the cleanup procedure
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupReport {
    pub orphans_removed: u64,
    pub duplicates_removed: u64,
}

impl CleanupReport {
    pub fn total(&self) -> u64 {
        self.orphans_removed + self.duplicates_removed
    }
}
