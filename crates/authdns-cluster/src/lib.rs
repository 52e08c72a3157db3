//! Cluster replication
//!
//! Changes committed by the local zone cache are fanned out to every peer
//! as an `apply_change` RPC. Each peer call is bounded by the replication
//! timeout; quorum is `max(1, ceil(total_nodes * ratio))` counted inclusive
//! of self. When quorum fails, the acknowledging peers receive a
//! compensating rollback. Peers are also probed, in turn, to serve zones
//! missing locally.

mod listener;
mod replicator;
mod rpc;

pub use listener::PeerServer;
pub use replicator::{ClusterReplicator, PeerProvider, StaticPeers};
pub use rpc::{PeerRequest, PeerResponse, MAX_FRAME_LEN};
