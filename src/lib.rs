//! Workspace placeholder crate.
//!
//! This crate exists to expose shared feature flags that map to the individual
//! workspace crates (`core-service`, `core-cache`). Host applications can
//! depend on `podcache-workspace` and enable the documented features without
//! needing to wire each crate individually.

#[cfg(feature = "desktop-shims")]
pub use core_service::{bootstrap, CoreError, CoreService};

#[cfg(feature = "offline-cache")]
pub use core_cache as cache;
