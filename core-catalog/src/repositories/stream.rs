//! Stream store trait and implementation

use crate::error::{CatalogError, Result};
use crate::models::{
    CleanupReport, MetadataField, NewStream, ProviderId, StreamId, StreamRecord, UserId,
};
use crate::repositories::cleanup;
use async_trait::async_trait;
use sqlx::{query, query_as, Sqlite, SqlitePool, Transaction};
use tracing::debug;

const STREAM_COLUMNS: &str = "id, provider_id, user_id, stream_uri, orig_name, tvg_id, logo, \
     tvg_group, name, channel, active, created_at, updated_at";

const NOW: &str = "CAST(strftime('%s', 'now') AS INTEGER)";

/// Read access to stream records plus the entry point for writes
#[async_trait]
pub trait StreamStore: Send + Sync {
    /// All records of one provider, active or not, ordered by id
    async fn load_by_provider(&self, provider_id: ProviderId) -> Result<Vec<StreamRecord>>;

    /// All records of one user across providers, ordered by id
    async fn load_by_user(&self, user_id: UserId) -> Result<Vec<StreamRecord>>;

    /// Open a transaction scoped to one reconciliation unit
    async fn begin(&self) -> Result<Box<dyn StreamTransaction>>;

    /// Run the cleanup procedure atomically
    ///
    /// # Errors
    /// Returns error if any step fails; nothing is removed in that case.
    async fn run_cleanup_procedure(&self) -> Result<CleanupReport>;
}

/// Writes to stream records, all inside one transaction
///
/// Dropping a transaction without calling `commit` rolls it back.
#[async_trait]
pub trait StreamTransaction: Send {
    async fn load_by_provider(&mut self, provider_id: ProviderId) -> Result<Vec<StreamRecord>>;

    async fn load_by_user(&mut self, user_id: UserId) -> Result<Vec<StreamRecord>>;

    /// Create an active record and return its storage-assigned id
    ///
    /// # Errors
    /// Returns error if:
    /// - The URI is blank
    /// - Another active record of the provider already has this URI
    async fn insert(&mut self, stream: &NewStream) -> Result<StreamId>;

    /// Overwrite the provider-supplied display name
    ///
    /// # Returns
    /// - `Ok(true)` if the record exists
    async fn update_orig_name(&mut self, id: StreamId, orig_name: &str) -> Result<bool>;

    /// Flip the `active` flag
    async fn set_active(&mut self, id: StreamId, active: bool) -> Result<bool>;

    /// Overwrite curated fields. An empty slice is a no-op.
    async fn update_metadata(
        &mut self,
        id: StreamId,
        values: &[(MetadataField, String)],
    ) -> Result<bool>;

    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}

/// Takes the write lock up front. A deferred transaction that reads and
/// then writes cannot wait for a concurrent writer and fails with
/// `SQLITE_BUSY`; an immediate one waits out the busy timeout instead.
const BEGIN_WRITE: &str = "BEGIN IMMEDIATE";

/// SQLite implementation of StreamStore
#[derive(Clone)]
pub struct SqliteStreamStore {
    pool: SqlitePool,
}

impl SqliteStreamStore {
    /// Create a new SQLite stream store
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StreamStore for SqliteStreamStore {
    async fn load_by_provider(&self, provider_id: ProviderId) -> Result<Vec<StreamRecord>> {
        let sql = format!(
            "SELECT {} FROM streams WHERE provider_id = ? ORDER BY id",
            STREAM_COLUMNS
        );
        let records = query_as::<_, StreamRecord>(&sql)
            .bind(provider_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(records)
    }

    async fn load_by_user(&self, user_id: UserId) -> Result<Vec<StreamRecord>> {
        let sql = format!(
            "SELECT {} FROM streams WHERE user_id = ? ORDER BY id",
            STREAM_COLUMNS
        );
        let records = query_as::<_, StreamRecord>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(records)
    }

    async fn begin(&self) -> Result<Box<dyn StreamTransaction>> {
        let tx = self.pool.begin_with(BEGIN_WRITE).await?;
        Ok(Box::new(SqliteStreamTransaction { tx }))
    }

    async fn run_cleanup_procedure(&self) -> Result<CleanupReport> {
        let mut tx = self.pool.begin_with(BEGIN_WRITE).await?;
        let report = cleanup::run(&mut tx).await?;
        tx.commit().await?;
        Ok(report)
    }
}

/// A stream transaction over one pooled SQLite connection
pub struct SqliteStreamTransaction {
    tx: Transaction<'static, Sqlite>,
}

#[async_trait]
impl StreamTransaction for SqliteStreamTransaction {
    async fn load_by_provider(&mut self, provider_id: ProviderId) -> Result<Vec<StreamRecord>> {
        let sql = format!(
            "SELECT {} FROM streams WHERE provider_id = ? ORDER BY id",
            STREAM_COLUMNS
        );
        let records = query_as::<_, StreamRecord>(&sql)
            .bind(provider_id)
            .fetch_all(&mut *self.tx)
            .await?;

        Ok(records)
    }

    async fn load_by_user(&mut self, user_id: UserId) -> Result<Vec<StreamRecord>> {
        let sql = format!(
            "SELECT {} FROM streams WHERE user_id = ? ORDER BY id",
            STREAM_COLUMNS
        );
        let records = query_as::<_, StreamRecord>(&sql)
            .bind(user_id)
            .fetch_all(&mut *self.tx)
            .await?;

        Ok(records)
    }

    async fn insert(&mut self, stream: &NewStream) -> Result<StreamId> {
        stream.validate()?;

        let result = query(
            r#"
            INSERT INTO streams (provider_id, user_id, stream_uri, orig_name, active)
            VALUES (?, ?, ?, ?, 1)
            "#,
        )
        .bind(stream.provider_id)
        .bind(stream.user_id)
        .bind(&stream.stream_uri)
        .bind(&stream.orig_name)
        .execute(&mut *self.tx)
        .await?;

        let id = StreamId(result.last_insert_rowid());
        debug!(stream_id = %id, provider_id = %stream.provider_id, "Inserted stream");
        Ok(id)
    }

    async fn update_orig_name(&mut self, id: StreamId, orig_name: &str) -> Result<bool> {
        let sql = format!(
            "UPDATE streams SET orig_name = ?, updated_at = {} WHERE id = ?",
            NOW
        );
        let result = query(&sql)
            .bind(orig_name)
            .bind(id)
            .execute(&mut *self.tx)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn set_active(&mut self, id: StreamId, active: bool) -> Result<bool> {
        let sql = format!(
            "UPDATE streams SET active = ?, updated_at = {} WHERE id = ?",
            NOW
        );
        let result = query(&sql)
            .bind(active)
            .bind(id)
            .execute(&mut *self.tx)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn update_metadata(
        &mut self,
        id: StreamId,
        values: &[(MetadataField, String)],
    ) -> Result<bool> {
        if values.is_empty() {
            return Ok(false);
        }

        let mut assignments: Vec<String> = Vec::with_capacity(values.len() + 1);
        for (field, _) in values {
            let assignment = format!("{} = ?", field.column());
            if assignments.contains(&assignment) {
                return Err(CatalogError::InvalidInput {
                    field: field.column().to_string(),
                    message: "field assigned twice".to_string(),
                });
            }
            assignments.push(assignment);
        }
        assignments.push(format!("updated_at = {}", NOW));

        let sql = format!(
            "UPDATE streams SET {} WHERE id = ?",
            assignments.join(", ")
        );
        let mut update = query(&sql);
        for (_, value) in values {
            update = update.bind(value);
        }
        let result = update.bind(id).execute(&mut *self.tx).await?;

        Ok(result.rows_affected() > 0)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;

    fn new_stream(provider: i64, user: i64, uri: &str, name: &str) -> NewStream {
        NewStream {
            provider_id: ProviderId(provider),
            user_id: UserId(user),
            stream_uri: uri.to_string(),
            orig_name: name.to_string(),
        }
    }

    async fn store() -> SqliteStreamStore {
        SqliteStreamStore::new(create_test_pool().await.unwrap())
    }

    #[tokio::test]
    async fn test_insert_and_load() {
        let store = store().await;

        let mut tx = store.begin().await.unwrap();
        let first = tx.insert(&new_stream(1, 10, "http://a/1", "CNN")).await.unwrap();
        let second = tx.insert(&new_stream(1, 10, "http://a/2", "BBC")).await.unwrap();
        tx.insert(&new_stream(2, 20, "http://b/1", "ESPN")).await.unwrap();
        tx.commit().await.unwrap();

        assert!(second > first);

        let records = store.load_by_provider(ProviderId(1)).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, first);
        assert_eq!(records[0].orig_name, "CNN");
        assert!(records[0].active);
        assert_eq!(records[0].name, None);

        let user_records = store.load_by_user(UserId(20)).await.unwrap();
        assert_eq!(user_records.len(), 1);
        assert_eq!(user_records[0].stream_uri, "http://b/1");
    }

    #[tokio::test]
    async fn test_rollback_discards_writes() {
        let store = store().await;

        let mut tx = store.begin().await.unwrap();
        tx.insert(&new_stream(1, 10, "http://a/1", "CNN")).await.unwrap();
        tx.rollback().await.unwrap();

        assert!(store.load_by_provider(ProviderId(1)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dropped_transaction_rolls_back() {
        let store = store().await;

        {
            let mut tx = store.begin().await.unwrap();
            tx.insert(&new_stream(1, 10, "http://a/1", "CNN")).await.unwrap();
        }

        assert!(store.load_by_provider(ProviderId(1)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_transaction_sees_its_own_writes() {
        let store = store().await;

        let mut tx = store.begin().await.unwrap();
        tx.insert(&new_stream(1, 10, "http://a/1", "CNN")).await.unwrap();
        assert_eq!(tx.load_by_provider(ProviderId(1)).await.unwrap().len(), 1);
        assert_eq!(tx.load_by_user(UserId(10)).await.unwrap().len(), 1);
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_update_orig_name_and_active() {
        let store = store().await;

        let mut tx = store.begin().await.unwrap();
        let id = tx.insert(&new_stream(1, 10, "http://a/1", "CNN")).await.unwrap();
        assert!(tx.update_orig_name(id, "CNN HD").await.unwrap());
        assert!(tx.set_active(id, false).await.unwrap());
        assert!(!tx.set_active(StreamId(999), false).await.unwrap());
        tx.commit().await.unwrap();

        let record = &store.load_by_provider(ProviderId(1)).await.unwrap()[0];
        assert_eq!(record.orig_name, "CNN HD");
        assert!(!record.active);
        assert_eq!(record.stream_uri, "http://a/1");
    }

    #[tokio::test]
    async fn test_update_metadata_touches_only_named_fields() {
        let store = store().await;

        let mut tx = store.begin().await.unwrap();
        let id = tx.insert(&new_stream(1, 10, "http://a/1", "CNN")).await.unwrap();
        let values = vec![
            (MetadataField::Logo, "http://logo/cnn.png".to_string()),
            (MetadataField::Name, "CNN".to_string()),
        ];
        assert!(tx.update_metadata(id, &values).await.unwrap());
        assert!(!tx.update_metadata(id, &[]).await.unwrap());
        tx.commit().await.unwrap();

        let record = &store.load_by_provider(ProviderId(1)).await.unwrap()[0];
        assert_eq!(record.logo.as_deref(), Some("http://logo/cnn.png"));
        assert_eq!(record.name.as_deref(), Some("CNN"));
        assert_eq!(record.tvg_id, None);
        assert_eq!(record.orig_name, "CNN");
    }

    #[tokio::test]
    async fn test_update_metadata_rejects_repeated_field() {
        let store = store().await;

        let mut tx = store.begin().await.unwrap();
        let id = tx.insert(&new_stream(1, 10, "http://a/1", "CNN")).await.unwrap();
        let values = vec![
            (MetadataField::Logo, "a".to_string()),
            (MetadataField::Logo, "b".to_string()),
        ];
        assert!(matches!(
            tx.update_metadata(id, &values).await,
            Err(CatalogError::InvalidInput { .. })
        ));
        tx.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn test_duplicate_active_uri_rejected() {
        let store = store().await;

        let mut tx = store.begin().await.unwrap();
        let id = tx.insert(&new_stream(1, 10, "http://a/1", "CNN")).await.unwrap();
        assert!(matches!(
            tx.insert(&new_stream(1, 10, "http://a/1", "CNN")).await,
            Err(CatalogError::Database(_))
        ));

        // Allowed once the first copy is inactive.
        tx.set_active(id, false).await.unwrap();
        tx.insert(&new_stream(1, 10, "http://a/1", "CNN")).await.unwrap();
        // Same URI under another provider is independent.
        tx.insert(&new_stream(2, 10, "http://a/1", "CNN")).await.unwrap();
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_blank_uri_rejected() {
        let store = store().await;

        let mut tx = store.begin().await.unwrap();
        assert!(matches!(
            tx.insert(&new_stream(1, 10, "  ", "CNN")).await,
            Err(CatalogError::InvalidInput { .. })
        ));
        tx.rollback().await.unwrap();
    }
}
