//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for hosts that run the sync as a
//! regular process (cron job, systemd timer, operator shell).
//!
//! ## Overview
//!
//! - `HttpClient` using `reqwest` with retry and exponential backoff
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::ReqwestHttpClient;
//! use std::time::Duration;
//!
//! let http_client = ReqwestHttpClient::with_timeout(Duration::from_secs(30))?;
//! ```

mod http;

pub use http::ReqwestHttpClient;
