//! # Host Bridge Traits
//!
//! Contracts between the reconciliation core and the collaborators it does
//! not own.
//!
//! ## Overview
//!
//! The core never talks to the network or reads provider payloads itself.
//! Each trait here represents a capability the core requires but that is
//! implemented elsewhere (`bridge-desktop`, `provider-http`, or a test
//! double).
//!
//! ## Traits
//!
//! - [`ProviderFeed`](feed::ProviderFeed) - Current `(uri, display_name)` list served by a provider
//! - [`HttpClient`](http::HttpClient) - Async HTTP transport used by feed connectors
//! - [`Clock`](time::Clock) - Time source for `last_synced_at` bookkeeping and deterministic tests
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Implementations
//! should convert transport-specific errors into it and keep enough context
//! (URL, status) to diagnose a failure without their internal state.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so implementations can be shared
//! across the coordinator's concurrent units.

pub mod error;
pub mod feed;
pub mod http;
pub mod time;

pub use error::BridgeError;

pub use feed::{FeedEntry, FeedSource, ProviderFeed};
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use time::{Clock, FixedClock, LogLevel, SystemClock};
