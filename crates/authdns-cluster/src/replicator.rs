//! Quorum-acknowledged change fan-out and compensation

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use authdns_core::{DnsError, DnsResult, Zone};
use authdns_zone::{ChangeAction, Replicator};
use futures::future::join_all;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::rpc::{self, PeerRequest, PeerResponse};

/// Source of the current peer set
///
/// The core is told the membership; how it is discovered is someone else's
/// problem. Implementations return every known node except self.
pub trait PeerProvider: Send + Sync {
    fn peers(&self) -> Vec<String>;
}

/// Fixed peer set handed over at boot
#[derive(Debug, Clone, Default)]
pub struct StaticPeers {
    peers: Vec<String>,
}

impl StaticPeers {
    pub fn new(peers: Vec<String>) -> Self {
        Self { peers }
    }
}

impl PeerProvider for StaticPeers {
    fn peers(&self) -> Vec<String> {
        self.peers.clone()
    }
}

/// Replicator fanning changes out over the peer RPC transport
pub struct ClusterReplicator {
    peers: Arc<dyn PeerProvider>,
    quorum_ratio: f64,
    rpc_timeout: Duration,
}

impl ClusterReplicator {
    pub fn new(peers: Arc<dyn PeerProvider>, quorum_ratio: f64, rpc_timeout: Duration) -> Self {
        Self { peers, quorum_ratio, rpc_timeout }
    }

    fn required_acks(&self, total_nodes: usize) -> usize {
        ((total_nodes as f64 * self.quorum_ratio).ceil() as usize).max(1)
    }
}

#[async_trait]
impl Replicator for ClusterReplicator {
    async fn broadcast(
        &self,
        action: ChangeAction,
        domain: &str,
        payload: Option<&Zone>,
    ) -> DnsResult<Vec<String>> {
        let peers = self.peers.peers();
        let required = self.required_acks(peers.len() + 1);

        let request = PeerRequest::ApplyChange {
            action,
            domain: domain.to_string(),
            zone: payload.cloned(),
        };

        // One concurrent RPC per peer; a peer that times out is abandoned
        // and simply does not count toward quorum.
        let calls = peers.into_iter().map(|peer| {
            let request = request.clone();
            let rpc_timeout = self.rpc_timeout;
            async move {
                let acked = match timeout(rpc_timeout, rpc::call(&peer, &request)).await {
                    Ok(Ok(PeerResponse::Ok { .. })) => true,
                    Ok(Ok(PeerResponse::NotFound)) => false,
                    Ok(Ok(PeerResponse::Error { message })) => {
                        warn!(%peer, %message, "peer rejected change");
                        false
                    }
                    Ok(Err(err)) => {
                        warn!(%peer, %err, "peer call failed");
                        false
                    }
                    Err(_) => {
                        warn!(%peer, "peer call timed out");
                        false
                    }
                };
                (peer, acked)
            }
        });

        let acked_peers: Vec<String> = join_all(calls)
            .await
            .into_iter()
            .filter_map(|(peer, acked)| acked.then_some(peer))
            .collect();

        // Self already applied the change before the broadcast
        let acks = 1 + acked_peers.len();
        if acks >= required {
            debug!(%domain, ?action, acks, required, "change reached quorum");
            Ok(acked_peers)
        } else {
            Err(DnsError::QuorumFailed { acks, required, acked_peers })
        }
    }

    async fn rollback(
        &self,
        aborted: ChangeAction,
        domain: &str,
        previous: Option<&Zone>,
        acked_peers: &[String],
    ) {
        // An aborted create is compensated by deleting; everything else is
        // compensated by restoring the pre-change snapshot.
        let request = match (aborted, previous) {
            (ChangeAction::Create, _) | (_, None) => PeerRequest::ApplyChange {
                action: ChangeAction::Delete,
                domain: domain.to_string(),
                zone: None,
            },
            (_, Some(previous)) => PeerRequest::ApplyChange {
                action: ChangeAction::Put,
                domain: domain.to_string(),
                zone: Some(previous.clone()),
            },
        };

        let calls = acked_peers.iter().map(|peer| {
            let request = request.clone();
            let rpc_timeout = self.rpc_timeout;
            async move {
                match timeout(rpc_timeout, rpc::call(peer, &request)).await {
                    Ok(Ok(_)) => debug!(%peer, %domain, "rollback applied"),
                    Ok(Err(err)) => warn!(%peer, %domain, %err, "rollback call failed"),
                    Err(_) => warn!(%peer, %domain, "rollback call timed out"),
                }
            }
        });
        join_all(calls).await;
    }

    async fn fetch_remote(&self, domain: &str) -> DnsResult<Zone> {
        let request = PeerRequest::FetchZone { domain: domain.to_string() };

        for peer in self.peers.peers() {
            match timeout(self.rpc_timeout, rpc::call(&peer, &request)).await {
                Ok(Ok(PeerResponse::Ok { zone: Some(zone) })) => {
                    debug!(%domain, %peer, "zone served by peer");
                    return Ok(zone);
                }
                Ok(Ok(_)) => {}
                Ok(Err(err)) => debug!(%peer, %err, "peer fetch failed"),
                Err(_) => debug!(%peer, "peer fetch timed out"),
            }
        }
        Err(DnsError::NotFound)
    }
}
