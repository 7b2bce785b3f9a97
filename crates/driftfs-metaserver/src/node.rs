//! Consensus node contract
//!
//! The replication engine lives outside this crate; operators reach it
//! through [`CopysetNode`]. A proposed [`LogTask`] carries the encoded log
//! entry, the term the proposer observed, and a completion closure the
//! engine invokes once: with the log index when the entry commits, or with
//! a status code when the task fails (for example because the term moved).

use crate::apply_queue::ApplyQueue;
use crate::metastore::MetaStore;
use crate::metrics::OperatorMetrics;
use bytes::Bytes;
use driftfs_proto::MetaStatusCode;

/// Leader-lease state reported by the consensus node
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LeaseStatus {
    /// Lease is fresh; reads may bypass the log
    Leader,
    /// This replica held a lease that has expired
    Expired,
    /// Lease state not established yet
    NotReady,
    /// Lease reads are turned off
    Disabled,
}

impl LeaseStatus {
    #[must_use]
    pub fn is_leader(self) -> bool {
        self == Self::Leader
    }

    #[must_use]
    pub fn is_expired(self) -> bool {
        self == Self::Expired
    }
}

/// Completion closure of a proposed task
pub type ProposeDone = Box<dyn FnOnce(Result<u64, MetaStatusCode>) + Send>;

/// One entry handed to the replication engine
pub struct LogTask {
    /// Encoded operator (type tag + request body)
    pub data: Bytes,
    /// Term observed at proposal time; the engine fails the task if the
    /// term has moved by commit time
    pub expected_term: i64,
    pub done: ProposeDone,
}

/// The replica this operator pipeline runs on
pub trait CopysetNode: Send + Sync {
    /// This replica is leader for the current term
    fn is_leader_term(&self) -> bool;

    /// The term this replica believes it leads
    fn leader_term(&self) -> i64;

    fn leader_lease_status(&self) -> LeaseStatus;

    /// Hand a task to the replication engine
    fn propose(&self, task: LogTask);

    /// Highest log index whose effects are visible in the state machine
    fn applied_index(&self) -> u64;

    /// Advance the applied index monotonically
    fn update_applied_index(&self, index: u64);

    fn apply_queue(&self) -> &ApplyQueue;

    fn meta_store(&self) -> &dyn MetaStore;

    fn metrics(&self) -> &OperatorMetrics;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lease_predicates() {
        assert!(LeaseStatus::Leader.is_leader());
        assert!(!LeaseStatus::Leader.is_expired());
        assert!(LeaseStatus::Expired.is_expired());
        assert!(!LeaseStatus::NotReady.is_leader());
        assert!(!LeaseStatus::Disabled.is_expired());
    }
}
