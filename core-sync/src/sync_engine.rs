//! # Sync Engine
//!
//! Merges one provider's fetched feed into its stored stream records.
//!
//! ## Workflow
//!
//! 1. Fetch the feed (bounded by the feed timeout)
//! 2. Open a transaction and load every record of the provider
//! 3. Diff with [`plan_sync`]
//! 4. Insert, reactivate, rename and deactivate
//! 5. Commit
//!
//! Steps 2-5 are one transaction bounded by the store timeout. Any error
//! rolls the whole provider back. Sync only ever writes `orig_name` and
//! `active` on existing records; curated metadata is never touched.

use crate::error::{Result, StoreContext, SyncError};
use crate::plan::{plan_sync, SyncPlan};
use crate::report::SyncOutcome;
use bridge_traits::{FeedEntry, ProviderFeed};
use core_catalog::{NewStream, Provider, StreamId, StreamState, StreamStore, StreamTransaction};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

/// Fetch a provider's feed, bounded by `limit`.
pub(crate) async fn fetch_feed(
    feed: &dyn ProviderFeed,
    provider: &Provider,
    limit: Duration,
) -> Result<Vec<FeedEntry>> {
    let source = provider.feed_source();
    match timeout(limit, feed.fetch(&source)).await {
        Ok(Ok(entries)) => {
            debug!(provider_id = %provider.id, entries = entries.len(), "Fetched feed");
            Ok(entries)
        }
        Ok(Err(e)) => Err(SyncError::provider_fetch(provider.id, e)),
        Err(_) => Err(SyncError::provider_fetch(
            provider.id,
            format!("timed out after {:?}", limit),
        )),
    }
}

pub struct SyncEngine {
    store: Arc<dyn StreamStore>,
    feed: Arc<dyn ProviderFeed>,
    feed_timeout: Duration,
    store_timeout: Duration,
}

impl SyncEngine {
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

    /// Fetch the provider's feed and apply it.
    ///
    /// # Errors
    ///
    /// - `ProviderFetch` if the feed cannot be fetched in time
    /// - `Store` if persistence fails; nothing of this provider is written
    #[instrument(skip(self, provider), fields(provider_id = %provider.id, user_id = %provider.user_id))]
    pub async fn sync_provider(&self, provider: &Provider) -> Result<SyncOutcome> {
        let entries = fetch_feed(self.feed.as_ref(), provider, self.feed_timeout).await?;
        self.apply_feed(provider, &entries).await
    }

    /// Apply an already fetched feed in one transaction.
    pub async fn apply_feed(&self, provider: &Provider, entries: &[FeedEntry]) -> Result<SyncOutcome> {
        let outcome = timeout(self.store_timeout, self.apply_in_transaction(provider, entries))
            .await
            .map_err(|_| {
                SyncError::store(
                    "sync_provider",
                    format!("timed out after {:?}", self.store_timeout),
                )
            })??;

        info!(
            provider_id = %provider.id,
            inserted = outcome.inserted,
            reactivated = outcome.reactivated,
            renamed = outcome.renamed,
            deactivated = outcome.deactivated,
            "Provider synced"
        );
        Ok(outcome)
    }

    async fn apply_in_transaction(
        &self,
        provider: &Provider,
        entries: &[FeedEntry],
    ) -> Result<SyncOutcome> {
        let mut tx = self.store.begin().await.during("begin")?;

        let applied = Self::apply_plan(tx.as_mut(), provider, entries).await;
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

    async fn apply_plan(
        tx: &mut dyn StreamTransaction,
        provider: &Provider,
        entries: &[FeedEntry],
    ) -> Result<SyncOutcome> {
        let existing = tx.load_by_provider(provider.id).await.during("load_by_provider")?;
        let plan = plan_sync(&existing, entries);
        debug!(
            existing = existing.len(),
            inserts = plan.inserts.len(),
            deactivations = plan.deactivations.len(),
            "Sync plan computed"
        );

        let states: HashMap<_, _> = existing.iter().map(|r| (r.id, r.state())).collect();
        let outcome = outcome_of(&plan);
        let SyncPlan {
            inserts,
            reactivations,
            renames,
            deactivations,
        } = plan;

        for entry in inserts {
            let stream = NewStream {
                provider_id: provider.id,
                user_id: provider.user_id,
                stream_uri: entry.uri,
                orig_name: entry.display_name,
            };
            tx.insert(&stream).await.during("insert")?;
        }

        for reactivation in reactivations {
            transition(&states, reactivation.id, StreamState::Active)?;
            tx.set_active(reactivation.id, true).await.during("set_active")?;
            if let Some(name) = reactivation.orig_name {
                tx.update_orig_name(reactivation.id, &name)
                    .await
                    .during("update_orig_name")?;
            }
        }

        for rename in renames {
            tx.update_orig_name(rename.id, &rename.orig_name)
                .await
                .during("update_orig_name")?;
        }

        for id in deactivations {
            transition(&states, id, StreamState::Inactive)?;
            tx.set_active(id, false).await.during("set_active")?;
        }

        Ok(outcome)
    }
}

fn outcome_of(plan: &SyncPlan) -> SyncOutcome {
    SyncOutcome {
        inserted: plan.inserts.len() as u64,
        reactivated: plan.reactivations.len() as u64,
        renamed: plan.renames.len() as u64,
        deactivated: plan.deactivations.len() as u64,
    }
}

fn transition(
    states: &HashMap<StreamId, StreamState>,
    id: StreamId,
    next: StreamState,
) -> Result<()> {
    let current = states
        .get(&id)
        .copied()
        .ok_or_else(|| SyncError::store("set_active", format!("stream {} not loaded", id)))?;
    current.transition_to(next).during("set_active")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::{BridgeError, FeedSource};
    use core_catalog::db::create_test_pool;
    use core_catalog::{
        MetadataField, NewProvider, ProviderRepository, SqliteProviderRepository,
        SqliteStreamStore, UserId,
    };
    use mockall::mock;

    mock! {
        Feed {}

        #[async_trait]
        impl ProviderFeed for Feed {
            async fn fetch(&self, source: &FeedSource) -> bridge_traits::error::Result<Vec<FeedEntry>>;
        }
    }

    struct SlowFeed;

    #[async_trait]
    impl ProviderFeed for SlowFeed {
        async fn fetch(&self, _source: &FeedSource) -> bridge_traits::error::Result<Vec<FeedEntry>> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(Vec::new())
        }
    }

    async fn setup() -> (Arc<SqliteStreamStore>, Provider) {
        let pool = create_test_pool().await.unwrap();
        let providers = SqliteProviderRepository::new(pool.clone());
        let id = providers
            .insert(&NewProvider::new(UserId(1), "Main", "http://feed/main.json"))
            .await
            .unwrap();
        let provider = providers.find_by_id(id).await.unwrap().unwrap();
        (Arc::new(SqliteStreamStore::new(pool)), provider)
    }

    fn engine(store: Arc<SqliteStreamStore>, feed: Arc<dyn ProviderFeed>) -> SyncEngine {
        SyncEngine::new(store, feed, Duration::from_secs(5), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_sync_provider_uses_feed() {
        let (store, provider) = setup().await;
        let mut feed = MockFeed::new();
        feed.expect_fetch()
            .withf(|source| source.url == "http://feed/main.json")
            .times(1)
            .returning(|_| Ok(vec![FeedEntry::new("u1", "CNN"), FeedEntry::new("u2", "BBC")]));

        let outcome = engine(store.clone(), Arc::new(feed))
            .sync_provider(&provider)
            .await
            .unwrap();

        assert_eq!(outcome.inserted, 2);
        assert_eq!(outcome.changed(), 2);

        let records = store.load_by_provider(provider.id).await.unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.active && r.user_id == UserId(1)));
    }

    #[tokio::test]
    async fn test_feed_error_is_provider_fetch() {
        let (store, provider) = setup().await;
        let mut feed = MockFeed::new();
        feed.expect_fetch()
            .returning(|_| Err(BridgeError::Feed("HTTP 503".to_string())));

        let result = engine(store.clone(), Arc::new(feed)).sync_provider(&provider).await;

        match result {
            Err(SyncError::ProviderFetch { provider_id, cause }) => {
                assert_eq!(provider_id, provider.id);
                assert!(cause.contains("503"));
            }
            other => panic!("expected ProviderFetch, got {:?}", other),
        }
        assert!(store.load_by_provider(provider.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_feed_timeout_is_provider_fetch() {
        let (store, provider) = setup().await;
        let engine = SyncEngine::new(
            store,
            Arc::new(SlowFeed),
            Duration::from_millis(50),
            Duration::from_secs(5),
        );

        let result = engine.sync_provider(&provider).await;
        assert!(matches!(
            result,
            Err(SyncError::ProviderFetch { ref cause, .. }) if cause.contains("timed out")
        ));
    }

    #[tokio::test]
    async fn test_store_failure_is_store_error() {
        let pool = create_test_pool().await.unwrap();
        let store = Arc::new(SqliteStreamStore::new(pool.clone()));
        pool.close().await;

        let provider = Provider {
            id: core_catalog::ProviderId(1),
            user_id: UserId(1),
            name: "Main".to_string(),
            feed_url: "http://feed".to_string(),
            last_synced_at: None,
            created_at: 0,
        };
        let result = engine(store, Arc::new(MockFeed::new()))
            .apply_feed(&provider, &[FeedEntry::new("u1", "CNN")])
            .await;

        assert!(matches!(result, Err(SyncError::Store { ref operation, .. }) if operation == "begin"));
    }

    #[tokio::test]
    async fn test_rename_and_reactivate_keep_curated_fields() {
        let (store, provider) = setup().await;
        let engine = engine(store.clone(), Arc::new(MockFeed::new()));

        engine
            .apply_feed(&provider, &[FeedEntry::new("u1", "CNN")])
            .await
            .unwrap();
        let id = store.load_by_provider(provider.id).await.unwrap()[0].id;

        let mut tx = store.begin().await.unwrap();
        tx.update_metadata(id, &[(MetadataField::Logo, "cnn.png".to_string())])
            .await
            .unwrap();
        tx.commit().await.unwrap();

        // Disappears, then returns under a new name.
        let gone = engine.apply_feed(&provider, &[]).await.unwrap();
        assert_eq!(gone.deactivated, 1);
        assert_eq!(gone.changed(), 0);

        let back = engine
            .apply_feed(&provider, &[FeedEntry::new("u1", "CNN International")])
            .await
            .unwrap();
        assert_eq!(back.reactivated, 1);
        assert_eq!(back.renamed, 0);
        assert_eq!(back.changed(), 1);

        let record = &store.load_by_provider(provider.id).await.unwrap()[0];
        assert_eq!(record.id, id);
        assert!(record.active);
        assert_eq!(record.orig_name, "CNN International");
        assert_eq!(record.logo.as_deref(), Some("cnn.png"));
    }
}
