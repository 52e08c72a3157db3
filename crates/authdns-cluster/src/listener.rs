//! Peer RPC listener
//!
//! Serves `apply_change` and `fetch_zone` requests from other nodes against
//! the local zone cache. The remote-applied path never replicates further,
//! so a cluster-wide change settles after one hop.

use authdns_core::{DnsError, DnsResult};
use authdns_zone::ZoneCache;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::rpc::{read_frame, write_frame, PeerRequest, PeerResponse};

/// TCP listener accepting peer RPCs
pub struct PeerServer {
    listener: TcpListener,
}

impl PeerServer {
    pub async fn bind(addr: &str) -> DnsResult<PeerServer> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|err| DnsError::transport(format!("bind {addr}: {err}")))?;
        Ok(PeerServer { listener })
    }

    pub fn local_addr(&self) -> DnsResult<std::net::SocketAddr> {
        self.listener
            .local_addr()
            .map_err(|err| DnsError::transport(format!("local addr: {err}")))
    }

    /// Accept connections forever, dispatching requests to `cache`
    pub fn spawn(self, cache: ZoneCache) -> JoinHandle<()> {
        tokio::spawn(async move {
            if let Ok(addr) = self.listener.local_addr() {
                info!(%addr, "peer listener started");
            }
            loop {
                match self.listener.accept().await {
                    Ok((stream, peer_addr)) => {
                        let cache = cache.clone();
                        tokio::spawn(async move {
                            debug!(%peer_addr, "peer connected");
                            serve_connection(stream, cache).await;
                        });
                    }
                    Err(err) => {
                        warn!(%err, "failed to accept peer connection");
                    }
                }
            }
        })
    }
}

async fn serve_connection(mut stream: TcpStream, cache: ZoneCache) {
    loop {
        let raw = match read_frame(&mut stream).await {
            Ok(raw) => raw,
            // EOF or a broken pipe; either way the conversation is over
            Err(_) => break,
        };

        let response = match serde_json::from_slice::<PeerRequest>(&raw) {
            Ok(request) => dispatch(request, &cache).await,
            Err(err) => PeerResponse::Error { message: format!("malformed request: {err}") },
        };

        let payload = match serde_json::to_vec(&response) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(%err, "failed to encode peer response");
                break;
            }
        };
        if write_frame(&mut stream, &payload).await.is_err() {
            break;
        }
    }
}

async fn dispatch(request: PeerRequest, cache: &ZoneCache) -> PeerResponse {
    match request {
        PeerRequest::ApplyChange { action, domain, zone } => {
            match cache.apply_change(action, &domain, zone).await {
                Ok(()) => PeerResponse::Ok { zone: None },
                Err(DnsError::NotFound) => PeerResponse::NotFound,
                Err(err) => {
                    warn!(%domain, %err, "failed to apply replicated change");
                    PeerResponse::Error { message: err.to_string() }
                }
            }
        }
        PeerRequest::FetchZone { domain } => match cache.fetch_local(&domain).await {
            Ok(zone) => PeerResponse::Ok { zone: Some(zone) },
            Err(DnsError::NotFound) => PeerResponse::NotFound,
            Err(err) => PeerResponse::Error { message: err.to_string() },
        },
    }
}
