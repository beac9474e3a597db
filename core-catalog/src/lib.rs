//! # Stream Catalog Module
//!
//! Owns the per-user stream catalog database and the repositories the
//! reconciliation engines read and write through.
//!
//! ## Overview
//!
//! This crate manages:
//! - SQLite schema and embedded migrations
//! - Domain models (`StreamRecord`, `Provider`, `StreamState`, `MetadataField`)
//! - The `StreamStore` / `StreamTransaction` and `ProviderRepository` traits
//!   with SQLite implementations
//! - The cleanup procedure (orphan removal, URI dedup, working table reset)

pub mod db;
pub mod error;
pub mod models;
pub mod repositories;

pub use error::{CatalogError, Result};
pub use models::{
    CleanupReport, MetadataField, NewProvider, NewStream, Provider, ProviderFilter, ProviderId,
    StreamId, StreamRecord, StreamState, UserId,
};
pub use repositories::{
    ProviderRepository, SqliteProviderRepository, SqliteStreamStore, SqliteStreamTransaction,
    StreamStore, StreamTransaction,
};
