//! driftfs Protocol - metaserver message definitions
//!
//! This crate contains the protobuf message types exchanged with the
//! metaserver and written into the replication log. The structs mirror the
//! wire schema one-to-one; field numbers are stable because encoded request
//! bodies are persisted in log entries and must decode on replay.

pub mod metaserver;

pub use metaserver::*;
