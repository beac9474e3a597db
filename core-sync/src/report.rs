//! Outcome and report types returned by the engines and the coordinator

use core_catalog::{CleanupReport, ProviderId, StreamRecord};
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

/// Correlates every log line and event of one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The operator-facing actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Sync,
    TestMissing,
    Fixup,
    Cleanup,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Sync => "sync",
            Action::TestMissing => "testmissing",
            Action::Fixup => "fixup",
            Action::Cleanup => "cleanup",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of syncing one provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncOutcome {
    pub inserted: u64,
    /// Includes reactivated records whose name also changed
    pub reactivated: u64,
    /// Active records whose `orig_name` changed
    pub renamed: u64,
    pub deactivated: u64,
}

impl SyncOutcome {
    /// Records inserted, reactivated or name-updated.
    pub fn changed(&self) -> u64 {
        self.inserted + self.reactivated + self.renamed
    }
}

/// Result of fixing up one user
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FixupOutcome {
    /// Records with at least one field overwritten
    pub records_updated: u64,
    pub fields_updated: u64,
    /// Groups with two or more members
    pub groups_considered: u64,
}

/// Why one unit failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitFailure {
    /// `provider <id>` or `user <id>`
    pub unit: String,
    pub message: String,
}

/// Aggregate of a sync or fixup run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub run_id: RunId,
    pub action: Action,
    pub units: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Units never started because the run was cancelled
    pub skipped: usize,
    pub changed: u64,
    pub deactivated: u64,
    pub failures: Vec<UnitFailure>,
    /// Problems in units whose changes were still committed
    pub warnings: Vec<UnitFailure>,
    pub duration_ms: u64,
}

impl RunReport {
    pub fn new(run_id: RunId, action: Action) -> Self {
        Self {
            run_id,
            action,
            units: 0,
            succeeded: 0,
            failed: 0,
            skipped: 0,
            changed: 0,
            deactivated: 0,
            failures: Vec::new(),
            warnings: Vec::new(),
            duration_ms: 0,
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.skipped == 0
    }
}

/// Missing records of one provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderMissing {
    pub provider_id: ProviderId,
    pub provider_name: String,
    pub missing: Vec<StreamRecord>,
}

/// Aggregate of a testmissing run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingReport {
    pub run_id: RunId,
    pub include_inactive: bool,
    /// Providers checked successfully, ordered by id
    pub providers: Vec<ProviderMissing>,
    pub failures: Vec<UnitFailure>,
    pub skipped: usize,
}

impl MissingReport {
    pub fn total_missing(&self) -> usize {
        self.providers.iter().map(|p| p.missing.len()).sum()
    }
}

/// Result of the cleanup procedure; a failure is carried, not raised
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleanupSummary {
    pub run_id: RunId,
    pub removed: Option<CleanupReport>,
    pub error: Option<String>,
}

impl CleanupSummary {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}
