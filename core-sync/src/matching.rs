//! # Match Keys
//!
//! Decides which stream records of one user denote the same logical channel.
//! Grouping is a strategy so the policy can change without touching
//! propagation.
//!
//! Normalization folds case and removes all whitespace; punctuation is kept,
//! so `"CNN HD"` and `"cnnhd"` match but `"CNN-HD"` does not.

use core_catalog::{MetadataField, StreamRecord};
use core_runtime::config::MatchKeySetting;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Derives the grouping key for a record
///
/// Returning `None` leaves the record out of every group.
pub trait MatchKeyStrategy: Send + Sync {
    fn key(&self, record: &StreamRecord) -> Option<String>;

    /// Label used in logs
    fn name(&self) -> &'static str;
}

/// Lowercase and strip whitespace. Blank input has no key.
pub fn normalize_key(value: &str) -> Option<String> {
    let normalized: String = value
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect();

    (!normalized.is_empty()).then_some(normalized)
}

/// Group by curated `name`
#[derive(Debug, Clone, Copy, Default)]
pub struct NameKey;

impl MatchKeyStrategy for NameKey {
    fn key(&self, record: &StreamRecord) -> Option<String> {
        record.metadata(MetadataField::Name).and_then(normalize_key)
    }

    fn name(&self) -> &'static str {
        "name"
    }
}

/// Group by curated `channel`
#[derive(Debug, Clone, Copy, Default)]
pub struct ChannelKey;

impl MatchKeyStrategy for ChannelKey {
    fn key(&self, record: &StreamRecord) -> Option<String> {
        record.metadata(MetadataField::Channel).and_then(normalize_key)
    }

    fn name(&self) -> &'static str {
        "channel"
    }
}

/// Group by `name`, falling back to `channel` for records without one
///
/// Keys are namespaced, so a record named `"5"` never groups with a record on
/// channel `"5"`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NameOrChannelKey;

impl MatchKeyStrategy for NameOrChannelKey {
    fn key(&self, record: &StreamRecord) -> Option<String> {
        NameKey
            .key(record)
            .map(|key| format!("name:{}", key))
            .or_else(|| ChannelKey.key(record).map(|key| format!("channel:{}", key)))
    }

    fn name(&self) -> &'static str {
        "name_or_channel"
    }
}

/// Adapter turning a closure into a strategy
pub struct FnMatchKey<F> {
    label: &'static str,
    derive: F,
}

impl<F> FnMatchKey<F>
where
    F: Fn(&StreamRecord) -> Option<String> + Send + Sync,
{
    pub fn new(label: &'static str, derive: F) -> Self {
        Self { label, derive }
    }
}

impl<F> MatchKeyStrategy for FnMatchKey<F>
where
    F: Fn(&StreamRecord) -> Option<String> + Send + Sync,
{
    fn key(&self, record: &StreamRecord) -> Option<String> {
        (self.derive)(record)
    }

    fn name(&self) -> &'static str {
        self.label
    }
}

/// Strategy selected in configuration
pub fn strategy_for(setting: MatchKeySetting) -> Arc<dyn MatchKeyStrategy> {
    match setting {
        MatchKeySetting::Name => Arc::new(NameKey),
        MatchKeySetting::Channel => Arc::new(ChannelKey),
        MatchKeySetting::NameOrChannel => Arc::new(NameOrChannelKey),
    }
}

/// Records judged to be the same logical channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchGroup {
    pub key: String,
    /// Ordered by id
    pub members: Vec<StreamRecord>,
}

/// Partition records by key, in key order. Keyless records are dropped.
pub fn group_records(records: &[StreamRecord], strategy: &dyn MatchKeyStrategy) -> Vec<MatchGroup> {
    let mut groups: BTreeMap<String, Vec<StreamRecord>> = BTreeMap::new();

    for record in records {
        if let Some(key) = strategy.key(record) {
            groups.entry(key).or_default().push(record.clone());
        }
    }

    groups
        .into_iter()
        .map(|(key, mut members)| {
            members.sort_by_key(|member| member.id);
            MatchGroup { key, members }
        })
        .collect()
}
