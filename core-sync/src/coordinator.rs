//! # Sync Coordinator
//!
//! Runs the engines over a scope of providers or users.
//!
//! ## Overview
//!
//! The `SyncCoordinator` resolves a [`ProviderFilter`] into units (one per
//! provider for `sync`/`testmissing`, one per distinct owning user for
//! `fixup`) and processes them with bounded concurrency. Each unit is its own
//! transaction; a failing unit is recorded and the rest of the run carries
//! on. Progress is published on the `EventBus`.
//!
//! Cancellation is checked before a unit starts, never inside one. Units not
//! started when the token fires are reported as skipped.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_catalog::ProviderFilter;
//!
//! let report = coordinator.run_sync(ProviderFilter::all()).await?;
//! println!("{} providers, {} changes", report.units, report.changed);
//! ```

use crate::error::{Result, StoreContext, SyncError};
use crate::fixup_engine::FixupEngine;
use crate::ignore::IgnoreFields;
use crate::matching::MatchKeyStrategy;
use crate::missing_detector::MissingDetector;
use crate::report::{
    Action, CleanupSummary, MissingReport, ProviderMissing, RunId, RunReport, UnitFailure,
};
use crate::sync_engine::SyncEngine;
use bridge_traits::{Clock, ProviderFeed};
use core_catalog::{Provider, ProviderFilter, ProviderRepository, StreamStore, UserId};
use core_runtime::config::SyncSettings;
use core_runtime::events::{CoreEvent, EventBus, ReconcileEvent};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

/// Coordinator tuning
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Units processed at the same time
    pub max_concurrency: usize,
    pub feed_timeout: Duration,
    pub store_timeout: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self::from(&SyncSettings::default())
    }
}

impl From<&SyncSettings> for CoordinatorConfig {
    fn from(settings: &SyncSettings) -> Self {
        Self {
            max_concurrency: settings.max_concurrency.max(1),
            feed_timeout: settings.feed_timeout(),
            store_timeout: settings.store_timeout(),
        }
    }
}

/// A committed provider sync
struct SyncedProvider {
    changed: u64,
    deactivated: u64,
    /// Set when `last_synced_at` could not be stamped after the commit
    warning: Option<UnitFailure>,
}

/// Outcome of one unit
enum UnitResult<T> {
    Completed(T),
    Failed(UnitFailure),
    Skipped,
}

pub struct SyncCoordinator {
    providers: Arc<dyn ProviderRepository>,
    store: Arc<dyn StreamStore>,
    sync_engine: SyncEngine,
    missing_detector: MissingDetector,
    fixup_engine: FixupEngine,
    clock: Arc<dyn Clock>,
    event_bus: EventBus,
    cancellation: CancellationToken,
    config: CoordinatorConfig,
}

impl SyncCoordinator {
    pub fn new(
        providers: Arc<dyn ProviderRepository>,
        store: Arc<dyn StreamStore>,
        feed: Arc<dyn ProviderFeed>,
        strategy: Arc<dyn MatchKeyStrategy>,
        clock: Arc<dyn Clock>,
        config: CoordinatorConfig,
    ) -> Self {
        let sync_engine = SyncEngine::new(
            store.clone(),
            feed.clone(),
            config.feed_timeout,
            config.store_timeout,
        );
        let missing_detector =
            MissingDetector::new(store.clone(), feed, config.feed_timeout, config.store_timeout);
        let fixup_engine = FixupEngine::new(store.clone(), strategy, config.store_timeout);

        Self {
            providers,
            store,
            sync_engine,
            missing_detector,
            fixup_engine,
            clock,
            event_bus: EventBus::default(),
            cancellation: CancellationToken::new(),
            config,
        }
    }

    /// Publish progress on an existing bus instead of a private one.
    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = event_bus;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Token that stops the current and future runs between units.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    /// Sync every provider in scope and stamp `last_synced_at` on success.
    ///
    /// # Errors
    ///
    /// Returns `Store` only if the providers cannot be listed; unit failures
    /// are carried in the report.
    #[instrument(skip(self, filter), fields(scope = %filter))]
    pub async fn run_sync(&self, filter: ProviderFilter) -> Result<RunReport> {
        let run_id = RunId::new();
        let started = Instant::now();
        let providers = self.list_providers(&filter).await?;
        self.start_run(run_id, Action::Sync, providers.len());

        let results: Vec<UnitResult<SyncedProvider>> = stream::iter(providers)
            .map(|provider| async move {
                let unit = format!("provider {}", provider.id);
                if self.cancellation.is_cancelled() {
                    return UnitResult::Skipped;
                }
                match self.sync_one(run_id, &provider).await {
                    Ok(synced) => {
                        self.unit_completed(run_id, &unit, synced.changed);
                        UnitResult::Completed(synced)
                    }
                    Err(e) => UnitResult::Failed(self.unit_failed(run_id, unit, e)),
                }
            })
            .buffer_unordered(self.config.max_concurrency)
            .collect()
            .await;

        let mut report = RunReport::new(run_id, Action::Sync);
        for result in results {
            report.units += 1;
            match result {
                UnitResult::Completed(synced) => {
                    report.succeeded += 1;
                    report.changed += synced.changed;
                    report.deactivated += synced.deactivated;
                    report.warnings.extend(synced.warning);
                }
                UnitResult::Failed(failure) => {
                    report.failed += 1;
                    report.failures.push(failure);
                }
                UnitResult::Skipped => report.skipped += 1,
            }
        }

        Ok(self.finish_run(report, started))
    }

    /// The feed merge decides success. Stamping `last_synced_at` happens
    /// after the commit, so a failure there only downgrades to a warning.
    async fn sync_one(&self, run_id: RunId, provider: &Provider) -> Result<SyncedProvider> {
        let outcome = self.sync_engine.sync_provider(provider).await?;

        let stamped = match timeout(
            self.config.store_timeout,
            self.providers
                .update_last_synced(provider.id, self.clock.unix_timestamp()),
        )
        .await
        {
            Ok(result) => result.during("update_last_synced"),
            Err(_) => Err(self.store_timed_out("update_last_synced")),
        };

        let warning = stamped.err().map(|e| {
            warn!(
                run_id = %run_id,
                provider_id = %provider.id,
                error = %e,
                "Provider synced but last_synced_at was not recorded"
            );
            UnitFailure {
                unit: format!("provider {}", provider.id),
                message: e.to_string(),
            }
        });

        Ok(SyncedProvider {
            changed: outcome.changed(),
            deactivated: outcome.deactivated,
            warning,
        })
    }

    /// Report, per provider in scope, the records its feed no longer serves.
    ///
    /// Nothing is written.
    #[instrument(skip(self, filter), fields(scope = %filter))]
    pub async fn run_test_missing(
        &self,
        filter: ProviderFilter,
        include_inactive: bool,
    ) -> Result<MissingReport> {
        let run_id = RunId::new();
        let started = Instant::now();
        let providers = self.list_providers(&filter).await?;
        self.start_run(run_id, Action::TestMissing, providers.len());

        let results: Vec<UnitResult<ProviderMissing>> = stream::iter(providers)
            .map(|provider| async move {
                let unit = format!("provider {}", provider.id);
                if self.cancellation.is_cancelled() {
                    return UnitResult::Skipped;
                }
                match self
                    .missing_detector
                    .check_provider(&provider, include_inactive)
                    .await
                {
                    Ok(missing) => {
                        self.unit_completed(run_id, &unit, 0);
                        UnitResult::Completed(ProviderMissing {
                            provider_id: provider.id,
                            provider_name: provider.name,
                            missing,
                        })
                    }
                    Err(e) => UnitResult::Failed(self.unit_failed(run_id, unit, e)),
                }
            })
            .buffer_unordered(self.config.max_concurrency)
            .collect()
            .await;

        let mut report = MissingReport {
            run_id,
            include_inactive,
            providers: Vec::new(),
            failures: Vec::new(),
            skipped: 0,
        };
        for result in results {
            match result {
                UnitResult::Completed(missing) => report.providers.push(missing),
                UnitResult::Failed(failure) => report.failures.push(failure),
                UnitResult::Skipped => report.skipped += 1,
            }
        }
        report.providers.sort_by_key(|p| p.provider_id);

        let mut summary = RunReport::new(run_id, Action::TestMissing);
        summary.units = report.providers.len() + report.failures.len() + report.skipped;
        summary.succeeded = report.providers.len();
        summary.failed = report.failures.len();
        summary.skipped = report.skipped;
        self.finish_run(summary, started);

        Ok(report)
    }

    /// Fix up every user owning a provider in scope.
    #[instrument(skip(self, filter, ignore), fields(scope = %filter, ignore = %ignore))]
    pub async fn run_fixup(&self, filter: ProviderFilter, ignore: &IgnoreFields) -> Result<RunReport> {
        let run_id = RunId::new();
        let started = Instant::now();
        let users = self.list_users(&filter).await?;
        self.start_run(run_id, Action::Fixup, users.len());

        let results: Vec<UnitResult<u64>> = stream::iter(users)
            .map(|user_id| async move {
                let unit = format!("user {}", user_id);
                if self.cancellation.is_cancelled() {
                    return UnitResult::Skipped;
                }
                match self.fixup_engine.fixup_user(user_id, ignore).await {
                    Ok(outcome) => {
                        self.unit_completed(run_id, &unit, outcome.records_updated);
                        UnitResult::Completed(outcome.records_updated)
                    }
                    Err(e) => UnitResult::Failed(self.unit_failed(run_id, unit, e)),
                }
            })
            .buffer_unordered(self.config.max_concurrency)
            .collect()
            .await;

        let mut report = RunReport::new(run_id, Action::Fixup);
        for result in results {
            report.units += 1;
            match result {
                UnitResult::Completed(changed) => {
                    report.succeeded += 1;
                    report.changed += changed;
                }
                UnitResult::Failed(failure) => {
                    report.failed += 1;
                    report.failures.push(failure);
                }
                UnitResult::Skipped => report.skipped += 1,
            }
        }

        Ok(self.finish_run(report, started))
    }

    /// Run the cleanup procedure. A failure is reported in the summary.
    #[instrument(skip(self))]
    pub async fn run_cleanup(&self) -> CleanupSummary {
        let run_id = RunId::new();
        let started = Instant::now();
        self.start_run(run_id, Action::Cleanup, 1);

        let result = match timeout(self.config.store_timeout, self.store.run_cleanup_procedure())
            .await
        {
            Ok(result) => result.during("run_cleanup_procedure"),
            Err(_) => Err(self.store_timed_out("run_cleanup_procedure")),
        };

        let mut summary = RunReport::new(run_id, Action::Cleanup);
        summary.units = 1;
        let cleanup = match result {
            Ok(removed) => {
                summary.succeeded = 1;
                summary.changed = removed.total();
                self.emit(ReconcileEvent::CleanupCompleted {
                    run_id: run_id.to_string(),
                    orphans_removed: removed.orphans_removed,
                    duplicates_removed: removed.duplicates_removed,
                });
                CleanupSummary {
                    run_id,
                    removed: Some(removed),
                    error: None,
                }
            }
            Err(e) => {
                error!(run_id = %run_id, error = %e, "Cleanup procedure failed");
                let message = e.to_string();
                summary.failed = 1;
                summary
                    .failures
                    .push(self.unit_failed(run_id, "cleanup".to_string(), e));
                CleanupSummary {
                    run_id,
                    removed: None,
                    error: Some(message),
                }
            }
        };

        self.finish_run(summary, started);
        cleanup
    }

    async fn list_providers(&self, filter: &ProviderFilter) -> Result<Vec<Provider>> {
        timeout(self.config.store_timeout, self.providers.list(filter))
            .await
            .map_err(|_| self.store_timed_out("list_providers"))?
            .during("list_providers")
    }

    async fn list_users(&self, filter: &ProviderFilter) -> Result<Vec<UserId>> {
        timeout(self.config.store_timeout, self.providers.list_user_ids(filter))
            .await
            .map_err(|_| self.store_timed_out("list_user_ids"))?
            .during("list_user_ids")
    }

    fn store_timed_out(&self, operation: &str) -> SyncError {
        SyncError::store(
            operation,
            format!("timed out after {:?}", self.config.store_timeout),
        )
    }

    fn start_run(&self, run_id: RunId, action: Action, units: usize) {
        info!(run_id = %run_id, action = %action, units, "Run started");
        self.emit(ReconcileEvent::RunStarted {
            run_id: run_id.to_string(),
            action: action.to_string(),
            units,
        });
    }

    fn unit_completed(&self, run_id: RunId, unit: &str, changed: u64) {
        self.emit(ReconcileEvent::UnitCompleted {
            run_id: run_id.to_string(),
            unit: unit.to_string(),
            changed,
        });
    }

    fn unit_failed(&self, run_id: RunId, unit: String, error: SyncError) -> UnitFailure {
        warn!(run_id = %run_id, unit = %unit, error = %error, "Unit failed");
        let failure = UnitFailure {
            unit,
            message: error.to_string(),
        };
        self.emit(ReconcileEvent::UnitFailed {
            run_id: run_id.to_string(),
            unit: failure.unit.clone(),
            message: failure.message.clone(),
        });
        failure
    }

    fn finish_run(&self, mut report: RunReport, started: Instant) -> RunReport {
        report.duration_ms = started.elapsed().as_millis() as u64;
        info!(
            run_id = %report.run_id,
            action = %report.action,
            succeeded = report.succeeded,
            failed = report.failed,
            skipped = report.skipped,
            changed = report.changed,
            warnings = report.warnings.len(),
            duration_ms = report.duration_ms,
            "Run finished"
        );
        self.emit(ReconcileEvent::RunCompleted {
            run_id: report.run_id.to_string(),
            action: report.action.to_string(),
            succeeded: report.succeeded,
            failed: report.failed,
            duration_ms: report.duration_ms,
        });
        report
    }

    fn emit(&self, event: ReconcileEvent) {
        // No subscribers is fine.
        let _ = self.event_bus.emit(CoreEvent::Reconcile(event));
    }
}
