//! # Repository Pattern Implementation
//!
//! Traits define what the reconciliation engines need from storage; the
//! SQLite implementations use sqlx.
//!
//! ## Available Repositories
//!
//! - `StreamStore` / `StreamTransaction` - stream records, read outside a
//!   transaction, written only inside one
//! - `ProviderRepository` - provider descriptors and sync bookkeeping
//!
//! The cleanup procedure lives in [`cleanup`] and is exposed through
//! `StreamStore::run_cleanup_procedure`.

pub mod cleanup;
pub mod provider;
pub mod stream;

pub use provider::{ProviderRepository, SqliteProviderRepository};
pub use stream::{SqliteStreamStore, SqliteStreamTransaction, StreamStore, StreamTransaction};
