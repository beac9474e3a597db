//! # Fixup Engine
//!
//! Propagates curated metadata across one user's records that denote the
//! same logical channel.
//!
//! ## Workflow
//!
//! 1. Open a transaction and load every record of the user (active or not)
//! 2. Group records with the configured [`MatchKeyStrategy`]
//! 3. For each group of two or more, and each field not ignored, compute the
//!    [`canonical_value`] and overwrite members that differ
//! 4. Commit
//!
//! Only `tvg_id`, `logo`, `tvg_group`, `name` and `channel` can be written;
//! the write API has no way to express anything else.

use crate::canonical::canonical_value;
use crate::error::{Result, StoreContext, SyncError};
use crate::ignore::IgnoreFields;
use crate::matching::{group_records, MatchKeyStrategy};
use crate::report::FixupOutcome;
use core_catalog::{MetadataField, StreamId, StreamRecord, StreamStore, StreamTransaction, UserId};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

/// New values for one record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldUpdate {
    pub id: StreamId,
    pub values: Vec<(MetadataField, String)>,
}

/// Writes one fixup of one user will perform
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FixupPlan {
    /// Ordered by record id
    pub updates: Vec<FieldUpdate>,
    pub groups_considered: u64,
}

impl FixupPlan {
    pub fn outcome(&self) -> FixupOutcome {
        FixupOutcome {
            records_updated: self.updates.len() as u64,
            fields_updated: self.updates.iter().map(|u| u.values.len() as u64).sum(),
            groups_considered: self.groups_considered,
        }
    }
}

/// Compute fixup writes without touching storage.
pub fn plan_fixup(
    records: &[StreamRecord],
    strategy: &dyn MatchKeyStrategy,
    ignore: &IgnoreFields,
) -> FixupPlan {
    let fields = ignore.writable_fields();
    let mut pending: BTreeMap<StreamId, Vec<(MetadataField, String)>> = BTreeMap::new();
    let mut groups_considered = 0;

    for group in group_records(records, strategy) {
        if group.members.len() < 2 {
            continue;
        }
        groups_considered += 1;

        for &field in &fields {
            let Some(canonical) = canonical_value(field, &group.members) else {
                continue;
            };

            for member in &group.members {
                if member.metadata(field) != Some(canonical.as_str()) {
                    pending
                        .entry(member.id)
                        .or_default()
                        .push((field, canonical.clone()));
                }
            }
        }
    }

    FixupPlan {
        updates: pending
            .into_iter()
            .map(|(id, values)| FieldUpdate { id, values })
            .collect(),
        groups_considered,
    }
}

pub struct FixupEngine {
    store: Arc<dyn StreamStore>,
    strategy: Arc<dyn MatchKeyStrategy>,
    store_timeout: Duration,
}

impl FixupEngine {
    pub fn new(
        store: Arc<dyn StreamStore>,
        strategy: Arc<dyn MatchKeyStrategy>,
        store_timeout: Duration,
    ) -> Self {
        Self {
            store,
            strategy,
            store_timeout,
        }
    }

    /// Propagate canonical values within the user's match groups.
    ///
    /// # Errors
    ///
    /// Returns `Store` if reading or writing fails; the user's records are
    /// left as they were.
    #[instrument(skip(self, ignore), fields(user_id = %user_id, strategy = self.strategy.name()))]
    pub async fn fixup_user(&self, user_id: UserId, ignore: &IgnoreFields) -> Result<FixupOutcome> {
        let outcome = timeout(self.store_timeout, self.fixup_in_transaction(user_id, ignore))
            .await
            .map_err(|_| {
                SyncError::store(
                    "fixup_user",
                    format!("timed out after {:?}", self.store_timeout),
                )
            })??;

        info!(
            records_updated = outcome.records_updated,
            fields_updated = outcome.fields_updated,
            groups = outcome.groups_considered,
            "User fixup finished"
        );
        Ok(outcome)
    }

    async fn fixup_in_transaction(
        &self,
        user_id: UserId,
        ignore: &IgnoreFields,
    ) -> Result<FixupOutcome> {
        let mut tx = self.store.begin().await.during("begin")?;

        let applied = self.apply(tx.as_mut(), user_id, ignore).await;
        match applied {
            Ok(outcome) => {
                tx.commit().await.during("commit")?;
                Ok(outcome)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "Rollback failed");
                }
                Err(e)
            }
        }
    }

    async fn apply(
        &self,
        tx: &mut dyn StreamTransaction,
        user_id: UserId,
        ignore: &IgnoreFields,
    ) -> Result<FixupOutcome> {
        let records = tx.load_by_user(user_id).await.during("load_by_user")?;
        let plan = plan_fixup(&records, self.strategy.as_ref(), ignore);
        debug!(
            records = records.len(),
            updates = plan.updates.len(),
            "Fixup plan computed"
        );

        for update in &plan.updates {
            tx.update_metadata(update.id, &update.values)
                .await
                .during("update_metadata")?;
        }

        Ok(plan.outcome())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::{ChannelKey, NameKey, NameOrChannelKey};
    use core_catalog::ProviderId;

    fn record(id: i64, name: &str) -> StreamRecord {
        StreamRecord::new(StreamId(id), ProviderId(1), UserId(1), format!("u{}", id), "orig")
            .with_metadata(MetadataField::Name, name)
    }

    #[test]
    fn test_outlier_logo_is_corrected() {
        let records = vec![
            record(1, "CNN").with_metadata(MetadataField::Logo, "A"),
            record(2, "CNN").with_metadata(MetadataField::Logo, "A"),
            record(3, "CNN").with_metadata(MetadataField::Logo, "B"),
            record(4, "CNN").with_metadata(MetadataField::Logo, "A"),
        ];

        let plan = plan_fixup(&records, &NameKey, &IgnoreFields::none());
        assert_eq!(
            plan.updates,
            vec![FieldUpdate {
                id: StreamId(3),
                values: vec![(MetadataField::Logo, "A".to_string())]
            }]
        );
        assert_eq!(plan.outcome().records_updated, 1);
        assert_eq!(plan.groups_considered, 1);
    }

    #[test]
    fn test_ignored_fields_are_untouched() {
        let records = vec![
            record(1, "CNN")
                .with_metadata(MetadataField::Logo, "A")
                .with_metadata(MetadataField::TvgGroup, "News"),
            record(2, "CNN")
                .with_metadata(MetadataField::Logo, "A")
                .with_metadata(MetadataField::TvgGroup, "News"),
            record(3, "CNN")
                .with_metadata(MetadataField::Logo, "B")
                .with_metadata(MetadataField::TvgGroup, "Misc"),
        ];

        let ignore = IgnoreFields::parse("logo").unwrap();
        let plan = plan_fixup(&records, &NameKey, &ignore);
        assert_eq!(
            plan.updates,
            vec![FieldUpdate {
                id: StreamId(3),
                values: vec![(MetadataField::TvgGroup, "News".to_string())]
            }]
        );
    }

    #[test]
    fn test_name_variants_converge_to_majority_spelling() {
        let records = vec![record(1, "cnn"), record(2, "CNN"), record(3, "CNN ")];

        let plan = plan_fixup(&records, &NameKey, &IgnoreFields::none());
        // "CNN" and "CNN " differ as values; tie between three singletons goes
        // to the lowest id.
        let outcome = plan.outcome();
        assert_eq!(outcome.records_updated, 2);
        assert!(plan
            .updates
            .iter()
            .all(|u| u.values == vec![(MetadataField::Name, "cnn".to_string())]));
    }

    #[test]
    fn test_empty_values_are_filled_from_group() {
        let records = vec![
            record(1, "BBC").with_metadata(MetadataField::TvgId, "bbc.uk"),
            record(2, "BBC"),
            record(3, "bbc").with_metadata(MetadataField::TvgId, ""),
        ];

        let plan = plan_fixup(&records, &NameKey, &IgnoreFields::parse("name").unwrap());
        let ids: Vec<_> = plan.updates.iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![StreamId(2), StreamId(3)]);
    }

    #[test]
    fn test_singletons_and_keyless_records_are_skipped() {
        let records = vec![
            record(1, "CNN").with_metadata(MetadataField::Logo, "A"),
            StreamRecord::new(StreamId(2), ProviderId(1), UserId(1), "u2", "orig")
                .with_metadata(MetadataField::Logo, "B"),
            StreamRecord::new(StreamId(3), ProviderId(1), UserId(1), "u3", "orig")
                .with_metadata(MetadataField::Logo, "C"),
        ];

        let plan = plan_fixup(&records, &NameKey, &IgnoreFields::none());
        assert!(plan.updates.is_empty());
        assert_eq!(plan.groups_considered, 0);
    }

    #[test]
    fn test_channel_strategy() {
        let records = vec![
            record(1, "CNN").with_metadata(MetadataField::Channel, "101"),
            record(2, "CNN US").with_metadata(MetadataField::Channel, "101"),
        ];

        let by_name = plan_fixup(&records, &NameKey, &IgnoreFields::none());
        assert!(by_name.updates.is_empty());

        let by_channel = plan_fixup(&records, &ChannelKey, &IgnoreFields::none());
        assert_eq!(by_channel.updates.len(), 1);
        assert_eq!(by_channel.updates[0].id, StreamId(2));
        assert_eq!(
            by_channel.updates[0].values,
            vec![(MetadataField::Name, "CNN".to_string())]
        );
    }

    #[test]
    fn test_plan_is_idempotent_after_application() {
        let mut records = vec![
            record(1, "ESPN").with_metadata(MetadataField::Logo, "x"),
            record(2, "espn").with_metadata(MetadataField::Channel, "7"),
            record(3, "E S P N").with_metadata(MetadataField::Logo, "y"),
            StreamRecord::new(StreamId(4), ProviderId(1), UserId(1), "u4", "orig")
                .with_metadata(MetadataField::Channel, "7"),
        ];

        for strategy in [
            &NameKey as &dyn MatchKeyStrategy,
            &ChannelKey,
            &NameOrChannelKey,
        ] {
            let plan = plan_fixup(&records, strategy, &IgnoreFields::none());
            for update in plan.updates {
                let record = records.iter_mut().find(|r| r.id == update.id).unwrap();
                for (field, value) in update.values {
                    record.set_metadata(field, value);
                }
            }
            let again = plan_fixup(&records, strategy, &IgnoreFields::none());
            assert!(again.updates.is_empty(), "{} did not converge", strategy.name());
        }
    }
}
