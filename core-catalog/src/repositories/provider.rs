//! Provider repository trait and implementation

use crate::error::{CatalogError, Result};
use crate::models::{NewProvider, Provider, ProviderFilter, ProviderId, UserId};
use async_trait::async_trait;
use sqlx::{query, query_as, query_scalar, SqlitePool};

/// Provider repository interface for data access operations
#[async_trait]
pub trait ProviderRepository: Send + Sync {
    /// Providers in scope, ordered by id
    async fn list(&self, filter: &ProviderFilter) -> Result<Vec<Provider>>;

    /// Distinct owners of the providers in scope, ascending
    async fn list_user_ids(&self, filter: &ProviderFilter) -> Result<Vec<UserId>>;

    /// Find a provider by its ID
    ///
    /// # Returns
    /// - `Ok(Some(provider))` if found
    /// - `Ok(None)` if not found
    async fn find_by_id(&self, id: ProviderId) -> Result<Option<Provider>>;

    /// Insert a new provider
    ///
    /// # Errors
    /// Returns error if validation fails or a database error occurs
    async fn insert(&self, provider: &NewProvider) -> Result<ProviderId>;

    /// Record a successful sync
    ///
    /// # Errors
    /// Returns `NotFound` if the provider does not exist
    async fn update_last_synced(&self, id: ProviderId, synced_at: i64) -> Result<()>;

    /// Delete a provider. Its streams stay behind until cleanup runs.
    ///
    /// # Returns
    /// - `Ok(true)` if the provider was deleted
    async fn delete(&self, id: ProviderId) -> Result<bool>;
}

/// SQLite implementation of ProviderRepository
#[derive(Clone)]
pub struct SqliteProviderRepository {
    pool: SqlitePool,
}

impl SqliteProviderRepository {
    /// Create a new SQLite provider repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProviderRepository for SqliteProviderRepository {
    async fn list(&self, filter: &ProviderFilter) -> Result<Vec<Provider>> {
        let providers = query_as::<_, Provider>(
            r#"
            SELECT id, user_id, name, feed_url, last_synced_at, created_at
            FROM providers
            WHERE (?1 IS NULL OR user_id = ?1)
              AND (?2 IS NULL OR id = ?2)
            ORDER BY id
            "#,
        )
        .bind(filter.user_id)
        .bind(filter.provider_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(providers)
    }

    async fn list_user_ids(&self, filter: &ProviderFilter) -> Result<Vec<UserId>> {
        let users = query_scalar::<_, UserId>(
            r#"
            SELECT DISTINCT user_id
            FROM providers
            WHERE (?1 IS NULL OR user_id = ?1)
              AND (?2 IS NULL OR id = ?2)
            ORDER BY user_id
            "#,
        )
        .bind(filter.user_id)
        .bind(filter.provider_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    async fn find_by_id(&self, id: ProviderId) -> Result<Option<Provider>> {
        let provider = query_as::<_, Provider>(
            "SELECT id, user_id, name, feed_url, last_synced_at, created_at FROM providers WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(provider)
    }

    async fn insert(&self, provider: &NewProvider) -> Result<ProviderId> {
        provider.validate()?;

        let result = query("INSERT INTO providers (user_id, name, feed_url) VALUES (?, ?, ?)")
            .bind(provider.user_id)
            .bind(&provider.name)
            .bind(&provider.feed_url)
            .execute(&self.pool)
            .await?;

        Ok(ProviderId(result.last_insert_rowid()))
    }

    async fn update_last_synced(&self, id: ProviderId, synced_at: i64) -> Result<()> {
        let result = query("UPDATE providers SET last_synced_at = ? WHERE id = ?")
            .bind(synced_at)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(CatalogError::NotFound {
                entity_type: "Provider".to_string(),
                id: id.to_string(),
            });
        }

        Ok(())
    }

    async fn delete(&self, id: ProviderId) -> Result<bool> {
        let result = query("DELETE FROM providers WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;

    async fn repository() -> SqliteProviderRepository {
        SqliteProviderRepository::new(create_test_pool().await.unwrap())
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let repo = repository().await;

        let id = repo
            .insert(&NewProvider::new(UserId(7), "Main", "http://feed/main.json"))
            .await
            .unwrap();

        let provider = repo.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(provider.user_id, UserId(7));
        assert_eq!(provider.name, "Main");
        assert_eq!(provider.last_synced_at, None);
        assert!(provider.created_at > 0);

        assert!(repo.find_by_id(ProviderId(999)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_with_filters() {
        let repo = repository().await;
        let a = repo.insert(&NewProvider::new(UserId(1), "A", "http://a")).await.unwrap();
        let b = repo.insert(&NewProvider::new(UserId(1), "B", "http://b")).await.unwrap();
        let c = repo.insert(&NewProvider::new(UserId(2), "C", "http://c")).await.unwrap();

        let all: Vec<_> = repo
            .list(&ProviderFilter::all())
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(all, vec![a, b, c]);

        let user_one = repo.list(&ProviderFilter::for_user(UserId(1))).await.unwrap();
        assert_eq!(user_one.len(), 2);

        let single = repo.list(&ProviderFilter::for_provider(c)).await.unwrap();
        assert_eq!(single.len(), 1);
        assert_eq!(single[0].name, "C");

        let mismatched = ProviderFilter {
            user_id: Some(UserId(1)),
            provider_id: Some(c),
        };
        assert!(repo.list(&mismatched).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_user_ids_is_distinct() {
        let repo = repository().await;
        repo.insert(&NewProvider::new(UserId(5), "A", "http://a")).await.unwrap();
        repo.insert(&NewProvider::new(UserId(2), "B", "http://b")).await.unwrap();
        repo.insert(&NewProvider::new(UserId(5), "C", "http://c")).await.unwrap();

        let users = repo.list_user_ids(&ProviderFilter::all()).await.unwrap();
        assert_eq!(users, vec![UserId(2), UserId(5)]);
    }

    #[tokio::test]
    async fn test_update_last_synced() {
        let repo = repository().await;
        let id = repo.insert(&NewProvider::new(UserId(1), "A", "http://a")).await.unwrap();

        repo.update_last_synced(id, 1_700_000_000).await.unwrap();
        let provider = repo.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(provider.last_synced_at, Some(1_700_000_000));

        assert!(matches!(
            repo.update_last_synced(ProviderId(42), 1).await,
            Err(CatalogError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_delete_and_validation() {
        let repo = repository().await;
        let id = repo.insert(&NewProvider::new(UserId(1), "A", "http://a")).await.unwrap();

        assert!(repo.delete(id).await.unwrap());
        assert!(!repo.delete(id).await.unwrap());

        assert!(matches!(
            repo.insert(&NewProvider::new(UserId(1), "A", "")).await,
            Err(CatalogError::InvalidInput { .. })
        ));
    }
}
