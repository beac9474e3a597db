//! # Reconciliation Module
//!
//! Keeps a user's stored stream catalog consistent with the feeds their
//! providers serve.
//!
//! ## Overview
//!
//! - Merging a fetched feed into a provider's records (`sync`)
//! - Reporting records a feed no longer serves, without writing (`testmissing`)
//! - Propagating curated metadata across matching records (`fixup`)
//! - Running the catalog cleanup procedure (`cleanup`)
//!
//! ## Components
//!
//! - **Sync Plan** (`plan`): Pure diff of stored records against a feed
//! - **Sync Engine** (`sync_engine`): Applies a plan in one transaction per provider
//! - **Missing Detector** (`missing_detector`): Read-only absence report
//! - **Match Keys** (`matching`): Pluggable strategies grouping equivalent records
//! - **Canonical Values** (`canonical`): Majority vote per field within a group
//! - **Fixup Engine** (`fixup_engine`): Applies canonical values per user
//! - **Sync Coordinator** (`coordinator`): Runs the engines over a scope with
//!   bounded concurrency, cancellation and progress events

pub mod canonical;
pub mod coordinator;
pub mod error;
pub mod fixup_engine;
pub mod ignore;
pub mod matching;
pub mod missing_detector;
pub mod plan;
pub mod report;
pub mod sync_engine;

pub use canonical::canonical_value;
pub use coordinator::{CoordinatorConfig, SyncCoordinator};
pub use error::{Result, SyncError};
pub use fixup_engine::{plan_fixup, FieldUpdate, FixupEngine, FixupPlan};
pub use ignore::IgnoreFields;
pub use matching::{
    group_records, normalize_key, strategy_for, ChannelKey, FnMatchKey, MatchGroup,
    MatchKeyStrategy, NameKey, NameOrChannelKey,
};
pub use missing_detector::{missing_in, MissingDetector};
pub use plan::{plan_sync, Reactivation, Rename, SyncPlan};
pub use report::{
    Action, CleanupSummary, FixupOutcome, MissingReport, ProviderMissing, RunId, RunReport,
    SyncOutcome, UnitFailure,
};
pub use sync_engine::SyncEngine;
