//! driftfs metaserver operator pipeline
//!
//! Every metadata RPC is wrapped in a [`MetaOperator`] that is either
//! fast-applied on the current leader under a valid lease (read-only
//! variants), proposed through the replicated log and applied once
//! committed, or redirected when this replica is not the leader. The same
//! operator types drive replay from the log during state-machine catch-up
//! and streaming responses for large result sets.
//!
//! The consensus engine, the metadata store, and the RPC stream transport
//! are external collaborators reached through the [`CopysetNode`],
//! [`MetaStore`], and [`StreamServer`] traits.

pub mod apply_queue;
pub mod codec;
pub mod metastore;
pub mod metrics;
pub mod node;
pub mod operator;
pub mod stream;

pub use apply_queue::ApplyQueue;
pub use metastore::{ChunkInfoIterator, MetaStore};
pub use metrics::OperatorMetrics;
pub use node::{CopysetNode, LeaseStatus, LogTask, ProposeDone};
pub use operator::{
    apply_log_entry, DoneClosure, MetaOperator, MetaRequest, MetaResponse, OperatorType,
};
pub use stream::{RpcController, StreamConnection, StreamServer};
