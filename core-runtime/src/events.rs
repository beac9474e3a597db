//! # Event Bus System
//!
//! Broadcast channel for run progress, built on `tokio::sync::broadcast`.
//!
//! The coordinator emits a [`ReconcileEvent`] when a run starts, as each unit
//! (provider or user) finishes or fails, and when the run completes. Anything
//! interested in progress (the CLI, tests, a future status endpoint)
//! subscribes independently.
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, ReconcileEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus = EventBus::new(16);
//! let mut stream = bus.subscribe();
//!
//! bus.emit(CoreEvent::Reconcile(ReconcileEvent::RunStarted {
//!     run_id: "run-1".to_string(),
//!     action: "sync".to_string(),
//!     units: 3,
//! }))
//! .ok();
//!
//! let event = stream.recv().await.unwrap();
//! assert!(matches!(event, CoreEvent::Reconcile(ReconcileEvent::RunStarted { .. })));
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: the subscriber fell behind and missed `n` events.
//! - **`RecvError::Closed`**: every sender has been dropped.
//!
//! `emit` fails only when nobody is subscribed; emitters treat that as a no-op.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::{self, error::SendError};

/// Default number of events buffered per subscriber.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 256;

/// Top-level event type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "domain", content = "event")]
pub enum CoreEvent {
    Reconcile(ReconcileEvent),
}

impl CoreEvent {
    /// Short human-readable summary, used for log lines.
    pub fn description(&self) -> String {
        match self {
            CoreEvent::Reconcile(event) => event.description(),
        }
    }
}

/// Progress of a reconciliation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReconcileEvent {
    /// A run was accepted and its units resolved
    RunStarted {
        run_id: String,
        action: String,
        units: usize,
    },
    /// One provider or user finished successfully
    UnitCompleted {
        run_id: String,
        unit: String,
        changed: u64,
    },
    /// One provider or user failed; the run continues
    UnitFailed {
        run_id: String,
        unit: String,
        message: String,
    },
    /// Every unit has been processed (or skipped after cancellation)
    RunCompleted {
        run_id: String,
        action: String,
        succeeded: usize,
        failed: usize,
        duration_ms: u64,
    },
    /// The database cleanup procedure ran
    CleanupCompleted {
        run_id: String,
        orphans_removed: u64,
        duplicates_removed: u64,
    },
}

impl ReconcileEvent {
    pub fn run_id(&self) -> &str {
        match self {
            ReconcileEvent::RunStarted { run_id, .. }
            | ReconcileEvent::UnitCompleted { run_id, .. }
            | ReconcileEvent::UnitFailed { run_id, .. }
            | ReconcileEvent::RunCompleted { run_id, .. }
            | ReconcileEvent::CleanupCompleted { run_id, .. } => run_id,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, ReconcileEvent::UnitFailed { .. })
    }

    pub fn description(&self) -> String {
        match self {
            ReconcileEvent::RunStarted { action, units, .. } => {
                format!("{} started for {} unit(s)", action, units)
            }
            ReconcileEvent::UnitCompleted { unit, changed, .. } => {
                format!("{} completed ({} changed)", unit, changed)
            }
            ReconcileEvent::UnitFailed { unit, message, .. } => {
                format!("{} failed: {}", unit, message)
            }
            ReconcileEvent::RunCompleted {
                action,
                succeeded,
                failed,
                ..
            } => format!(
                "{} finished: {} succeeded, {} failed",
                action, succeeded, failed
            ),
            ReconcileEvent::CleanupCompleted {
                orphans_removed,
                duplicates_removed,
                ..
            } => format!(
                "cleanup removed {} orphan(s) and {} duplicate(s)",
                orphans_removed, duplicates_removed
            ),
        }
    }
}

/// Central event bus
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus buffering up to `capacity` events per
    /// subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an
    /// error if there are none.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> broadcast::Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}
