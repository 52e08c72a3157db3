//! The replication seam between the zone cache and the cluster
//!
//! The cache commits locally first, then hands the change to a
//! [`Replicator`] for fan-out. The replicator decides quorum; on failure it
//! reports which peers acknowledged so the cache can drive compensation.

use async_trait::async_trait;
use authdns_core::{DnsError, DnsResult, Zone};
use serde::{Deserialize, Serialize};

/// The four replicated change kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeAction {
    Create,
    Update,
    Put,
    Delete,
}

/// Fans changes out to peers and fetches zones this node does not hold
#[async_trait]
pub trait Replicator: Send + Sync {
    /// Replicate `action` to every peer and evaluate quorum
    ///
    /// The local node counts as the first ack; the change must already be
    /// applied locally. Returns the acknowledging peers on success, or
    /// [`DnsError::QuorumFailed`] carrying the same list on failure.
    async fn broadcast(
        &self,
        action: ChangeAction,
        domain: &str,
        payload: Option<&Zone>,
    ) -> DnsResult<Vec<String>>;

    /// Undo `aborted` on every peer that acknowledged it
    ///
    /// Best-effort: results are ignored. The local rollback must already
    /// have been applied by the caller.
    async fn rollback(
        &self,
        aborted: ChangeAction,
        domain: &str,
        previous: Option<&Zone>,
        acked_peers: &[String],
    );

    /// Ask peers, in turn, for a zone missing locally
    async fn fetch_remote(&self, domain: &str) -> DnsResult<Zone>;
}

/// Replicator for a cluster of one
///
/// No peers exist, so quorum is evaluated over this node alone: with the
/// default ratio every change commits immediately, and a ratio above 1.0
/// makes every change fail quorum (useful for exercising rollback).
#[derive(Debug, Clone)]
pub struct StandaloneReplicator {
    quorum_ratio: f64,
}

impl StandaloneReplicator {
    pub fn new(quorum_ratio: f64) -> Self {
        Self { quorum_ratio }
    }
}

impl Default for StandaloneReplicator {
    fn default() -> Self {
        Self::new(1.0)
    }
}

#[async_trait]
impl Replicator for StandaloneReplicator {
    async fn broadcast(
        &self,
        _action: ChangeAction,
        _domain: &str,
        _payload: Option<&Zone>,
    ) -> DnsResult<Vec<String>> {
        let required = (self.quorum_ratio.ceil() as usize).max(1);
        if 1 >= required {
            Ok(Vec::new())
        } else {
            Err(DnsError::QuorumFailed { acks: 1, required, acked_peers: Vec::new() })
        }
    }

    async fn rollback(
        &self,
        _aborted: ChangeAction,
        _domain: &str,
        _previous: Option<&Zone>,
        _acked_peers: &[String],
    ) {
    }

    async fn fetch_remote(&self, _domain: &str) -> DnsResult<Zone> {
        Err(DnsError::NotFound)
    }
}
