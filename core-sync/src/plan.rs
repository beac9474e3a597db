//! # Feed Diff
//!
//! Pure comparison of a provider's stored records against a fetched feed.
//! `SyncEngine` applies the resulting [`SyncPlan`]; `MissingDetector` uses the
//! same URI set, so "what sync would deactivate" and "what is missing" are the
//! same computation.
//!
//! Rules:
//! - Entries with a blank URI are ignored.
//! - When a URI appears twice in the feed, the first entry wins.
//! - When stored records share a URI, an active record is preferred over an
//!   inactive one, then the highest id.
//! - A stored active record is deactivated when its URI is absent from the
//!   feed. Inactive records are never touched unless their URI reappears.

use bridge_traits::FeedEntry;
use core_catalog::{StreamId, StreamRecord};
use std::collections::{HashMap, HashSet};

/// A previously removed record seen in the feed again
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reactivation {
    pub id: StreamId,
    /// New `orig_name` when the feed's name differs from the stored one
    pub orig_name: Option<String>,
}

/// An active record whose provider-supplied name changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rename {
    pub id: StreamId,
    pub orig_name: String,
}

/// Everything one sync of one provider will write
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncPlan {
    pub inserts: Vec<FeedEntry>,
    pub reactivations: Vec<Reactivation>,
    pub renames: Vec<Rename>,
    pub deactivations: Vec<StreamId>,
}

impl SyncPlan {
    /// Records inserted, reactivated or renamed. A reactivated record whose
    /// name also changed counts once.
    pub fn changed(&self) -> u64 {
        (self.inserts.len() + self.reactivations.len() + self.renames.len()) as u64
    }

    pub fn is_empty(&self) -> bool {
        self.changed() == 0 && self.deactivations.is_empty()
    }
}

/// URIs present in the feed, blank entries excluded.
pub fn feed_uris(feed: &[FeedEntry]) -> HashSet<&str> {
    feed.iter()
        .filter(|entry| entry.is_usable())
        .map(|entry| entry.uri.as_str())
        .collect()
}

/// Stored records keyed by URI, one record per URI.
pub fn index_by_uri(existing: &[StreamRecord]) -> HashMap<&str, &StreamRecord> {
    let mut index: HashMap<&str, &StreamRecord> = HashMap::with_capacity(existing.len());

    for record in existing {
        index
            .entry(record.stream_uri.as_str())
            .and_modify(|current| {
                if (record.active, record.id) > (current.active, current.id) {
                    *current = record;
                }
            })
            .or_insert(record);
    }

    index
}

/// Compute the writes that bring `existing` in line with `feed`.
pub fn plan_sync(existing: &[StreamRecord], feed: &[FeedEntry]) -> SyncPlan {
    let index = index_by_uri(existing);
    let mut seen: HashSet<&str> = HashSet::with_capacity(feed.len());
    let mut plan = SyncPlan::default();

    for entry in feed.iter().filter(|entry| entry.is_usable()) {
        if !seen.insert(entry.uri.as_str()) {
            continue;
        }

        match index.get(entry.uri.as_str()) {
            Some(record) if record.active => {
                if record.orig_name != entry.display_name {
                    plan.renames.push(Rename {
                        id: record.id,
                        orig_name: entry.display_name.clone(),
                    });
                }
            }
            Some(record) => plan.reactivations.push(Reactivation {
                id: record.id,
                orig_name: (record.orig_name != entry.display_name)
                    .then(|| entry.display_name.clone()),
            }),
            None => plan.inserts.push(entry.clone()),
        }
    }

    plan.deactivations = existing
        .iter()
        .filter(|record| record.active && !seen.contains(record.stream_uri.as_str()))
        .map(|record| record.id)
        .collect();

    plan
}
