//! Core service façade and bootstrap helpers.
//!
//! This crate wires host-provided bridge implementations (HTTP transport,
//! clock) and the catalog database into the reconciliation core. Desktop
//! hosts enable the `desktop-shims` feature, which pulls in
//! `bridge-desktop` and exposes [`bootstrap`].

pub mod error;

pub use error::{CoreError, Result};

use std::sync::Arc;

use bridge_traits::{Clock, HttpClient};
use core_catalog::db::{create_pool, DatabaseConfig};
use core_catalog::{
    ProviderFilter, ProviderRepository, SqliteProviderRepository, SqliteStreamStore, StreamStore,
};
use core_runtime::config::CoreConfig;
use core_runtime::events::EventBus;
use core_sync::{
    strategy_for, CleanupSummary, CoordinatorConfig, IgnoreFields, MissingReport, RunReport,
    SyncCoordinator,
};
use provider_http::HttpFeedConnector;
use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Aggregated handle to the bridge dependencies the core requires.
pub struct CoreDependencies {
    pub http_client: Arc<dyn HttpClient>,
    pub clock: Arc<dyn Clock>,
}

impl CoreDependencies {
    /// Construct a dependency bundle from explicit bridge handles.
    pub fn new(http_client: Arc<dyn HttpClient>, clock: Arc<dyn Clock>) -> Self {
        Self { http_client, clock }
    }

    /// Desktop bridges: `reqwest` transport bounded by the feed timeout and
    /// the system clock.
    #[cfg(feature = "desktop-shims")]
    pub fn desktop(config: &CoreConfig) -> Result<Self> {
        let http_client =
            bridge_desktop::ReqwestHttpClient::with_timeout(config.sync.feed_timeout())?;
        Ok(Self::new(
            Arc::new(http_client),
            Arc::new(bridge_traits::SystemClock),
        ))
    }
}

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct CoreService {
    config: Arc<CoreConfig>,
    pool: SqlitePool,
    providers: Arc<SqliteProviderRepository>,
    store: Arc<SqliteStreamStore>,
    coordinator: Arc<SyncCoordinator>,
    event_bus: EventBus,
}

impl CoreService {
    /// Open the catalog and wire the coordinator.
    ///
    /// # Errors
    ///
    /// Fails if the configuration is invalid or the database cannot be
    /// opened and migrated.
    pub async fn new(config: CoreConfig, deps: CoreDependencies) -> Result<Self> {
        config.validate()?;

        let pool = create_pool(DatabaseConfig::from_settings(&config.database)).await?;
        let providers = Arc::new(SqliteProviderRepository::new(pool.clone()));
        let store = Arc::new(SqliteStreamStore::new(pool.clone()));

        let feed = HttpFeedConnector::new(deps.http_client)
            .with_retry_attempts(config.sync.http_retry_attempts);
        let event_bus = EventBus::default();

        let coordinator = SyncCoordinator::new(
            providers.clone(),
            store.clone(),
            Arc::new(feed),
            strategy_for(config.sync.match_key),
            deps.clock,
            CoordinatorConfig::from(&config.sync),
        )
        .with_event_bus(event_bus.clone());

        info!(
            max_concurrency = config.sync.max_concurrency,
            match_key = ?config.sync.match_key,
            "Core service ready"
        );

        Ok(Self {
            config: Arc::new(config),
            pool,
            providers,
            store,
            coordinator: Arc::new(coordinator),
            event_bus,
        })
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn providers(&self) -> Arc<dyn ProviderRepository> {
        self.providers.clone()
    }

    pub fn streams(&self) -> Arc<dyn StreamStore> {
        self.store.clone()
    }

    pub fn coordinator(&self) -> Arc<SyncCoordinator> {
        Arc::clone(&self.coordinator)
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Cancels runs between units.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.coordinator.cancellation_token()
    }

    pub async fn sync(&self, filter: ProviderFilter) -> Result<RunReport> {
        Ok(self.coordinator.run_sync(filter).await?)
    }

    pub async fn test_missing(
        &self,
        filter: ProviderFilter,
        include_inactive: bool,
    ) -> Result<MissingReport> {
        Ok(self
            .coordinator
            .run_test_missing(filter, include_inactive)
            .await?)
    }

    pub async fn fixup(&self, filter: ProviderFilter, ignore: &IgnoreFields) -> Result<RunReport> {
        Ok(self.coordinator.run_fixup(filter, ignore).await?)
    }

    pub async fn cleanup(&self) -> CleanupSummary {
        self.coordinator.run_cleanup().await
    }

    /// Close the connection pool, waiting for checked-out connections.
    pub async fn shutdown(&self) {
        self.pool.close().await;
        info!("Core service shut down");
    }
}

/// Convenience bootstrapper for desktop hosts.
///
/// ```no_run
/// # async fn example() -> core_service::Result<()> {
/// use core_runtime::config::CoreConfig;
///
/// let config = CoreConfig::load(None)?;
/// let core = core_service::bootstrap(config).await?;
/// let report = core.sync(core_catalog::ProviderFilter::all()).await?;
/// # Ok(())
/// # }
/// ```
#[cfg(feature = "desktop-shims")]
pub async fn bootstrap(config: CoreConfig) -> Result<CoreService> {
    let deps = CoreDependencies::desktop(&config)?;
    CoreService::new(config, deps).await
}
