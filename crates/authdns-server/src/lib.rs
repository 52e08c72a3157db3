//! authdns server wiring
//!
//! Boot order: open the zone store and scan it, start the cache over the
//! cluster replicator, then bring up the three listeners (peer RPC, UDP
//! DNS, HTTP API) and wait for a shutdown signal.

mod config;
mod udp;

use std::sync::Arc;
use std::time::Duration;

use authdns_api::ApiState;
use authdns_cluster::{ClusterReplicator, PeerServer, StaticPeers};
use authdns_core::{DnsError, DnsResult};
use authdns_store::ZoneStore;
use authdns_zone::ZoneCache;
use tokio::signal;
use tracing::{info, warn};

pub use config::Config;
pub use udp::DnsUdpServer;

/// Run the server until interrupted
pub async fn run(config: Config) -> DnsResult<()> {
    info!(
        zones_folder = %config.zones_folder,
        dns_port = config.dns_port,
        http_port = config.http_port,
        cluster_port = config.cluster_port,
        peers = config.peers.len(),
        "starting authdns"
    );

    let store = ZoneStore::new(&config.zones_folder);
    let report = store.scan();
    info!(valid = report.valid, invalid = report.invalid.len(), "zone directory scanned");

    let replicator = Arc::new(ClusterReplicator::new(
        Arc::new(StaticPeers::new(config.peers.clone())),
        config.replication_quorum_ratio,
        Duration::from_millis(config.replication_timeout_ms),
    ));
    let cache = ZoneCache::spawn(store, replicator);

    let peer_server = PeerServer::bind(&format!("0.0.0.0:{}", config.cluster_port)).await?;
    peer_server.spawn(cache.clone());

    let dns_server = DnsUdpServer::bind(&format!("0.0.0.0:{}", config.dns_port)).await?;
    dns_server.spawn(cache.clone());

    let app = authdns_api::router(ApiState::new(cache, config.api_token.clone()));
    let http_listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.http_port))
        .await
        .map_err(|err| DnsError::transport(format!("bind http port: {err}")))?;
    info!(addr = %format!("0.0.0.0:{}", config.http_port), "HTTP API started");
    tokio::spawn(async move {
        if let Err(err) = axum::serve(http_listener, app).await {
            warn!(%err, "HTTP server exited");
        }
    });

    info!("authdns started");

    match signal::ctrl_c().await {
        Ok(()) => info!("received shutdown signal, stopping"),
        Err(err) => warn!(%err, "unable to listen for shutdown signal"),
    }
    Ok(())
}
