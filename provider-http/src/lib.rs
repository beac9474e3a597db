//! # HTTP Feed Provider
//!
//! Implements `ProviderFeed` for providers that publish their channel list
//! over HTTP.
//!
//! ## Overview
//!
//! This module provides:
//! - Fetching a provider's feed through the `HttpClient` bridge
//! - Retry of transient statuses (429, 5xx) below the engine boundary
//! - Decoding the normalized JSON list of `{ uri, name }` entries

pub mod connector;
pub mod error;
pub mod types;

pub use connector::HttpFeedConnector;
pub use error::{HttpFeedError, Result};
