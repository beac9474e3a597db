//! Workspace placeholder crate.
//!
//! This crate exists to expose feature flags that map to the individual
//! workspace crates (currently `core-service`). Hosts can depend on
//! `kptv-workspace` and enable `desktop-shims` to get the reqwest-backed
//! feed transport without wiring each crate individually.

#[cfg(feature = "desktop-shims")]
pub use core_service;
