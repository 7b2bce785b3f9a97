//! driftfs Common - Shared types and utilities
//!
//! This crate provides the error type, configuration structures, and
//! concurrency primitives used across all driftfs components.

pub mod config;
pub mod error;
pub mod metrics;
pub mod naming;
pub mod sync;

pub use config::{ApplyQueueConfig, WriteCacheConfig};
pub use error::{Error, Result};
pub use metrics::LatencyRecorder;
pub use sync::{Sleeper, SyncBarrier};
