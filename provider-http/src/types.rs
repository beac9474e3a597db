//! Feed payload types
//!
//! Two shapes are accepted: a bare array of entries, or an object with the
//! array under `streams`.

use bridge_traits::FeedEntry;
use serde::Deserialize;

/// One channel as published by the provider
#[derive(Debug, Clone, Deserialize)]
pub struct WireEntry {
    #[serde(alias = "url", alias = "stream_uri")]
    pub uri: String,

    #[serde(default, alias = "display_name", alias = "title")]
    pub name: Option<String>,
}

impl From<WireEntry> for FeedEntry {
    fn from(entry: WireEntry) -> Self {
        FeedEntry::new(
            entry.uri.trim(),
            entry.name.as_deref().map(str::trim).unwrap_or_default(),
        )
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum FeedPayload {
    List(Vec<WireEntry>),
    Wrapped { streams: Vec<WireEntry> },
}

impl FeedPayload {
    pub fn into_entries(self) -> Vec<WireEntry> {
        match self {
            FeedPayload::List(entries) | FeedPayload::Wrapped { streams: entries } => entries,
        }
    }
}
