//! UDP DNS listener
//!
//! Reads whole datagrams, hands each to the resolver, and replies on the
//! same socket. Messages that fail to decode get no reply at all.

use std::sync::Arc;

use authdns_core::{DnsError, DnsResult};
use authdns_proto::Message;
use authdns_zone::ZoneCache;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const MAX_DATAGRAM: usize = 4096;

/// Bound UDP DNS server
pub struct DnsUdpServer {
    socket: Arc<UdpSocket>,
}

impl DnsUdpServer {
    pub async fn bind(addr: &str) -> DnsResult<DnsUdpServer> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|err| DnsError::transport(format!("bind {addr}: {err}")))?;
        Ok(DnsUdpServer { socket: Arc::new(socket) })
    }

    pub fn local_addr(&self) -> DnsResult<std::net::SocketAddr> {
        self.socket
            .local_addr()
            .map_err(|err| DnsError::transport(format!("local addr: {err}")))
    }

    /// Receive datagrams forever, answering through `cache`
    pub fn spawn(self, cache: ZoneCache) -> JoinHandle<()> {
        tokio::spawn(async move {
            if let Ok(addr) = self.socket.local_addr() {
                info!(%addr, "DNS listener started");
            }
            let mut buffer = [0u8; MAX_DATAGRAM];
            loop {
                let (len, source) = match self.socket.recv_from(&mut buffer).await {
                    Ok(received) => received,
                    Err(err) => {
                        warn!(%err, "UDP receive failed");
                        continue;
                    }
                };

                let datagram = buffer[..len].to_vec();
                let socket = Arc::clone(&self.socket);
                let cache = cache.clone();
                tokio::spawn(async move {
                    let request = match Message::decode(&datagram) {
                        Ok(request) => request,
                        Err(err) => {
                            // Fatal for this message; never reply
                            debug!(%source, %err, "dropping undecodable query");
                            return;
                        }
                    };

                    let response = authdns_resolver::resolve(&cache, &request).await;
                    match response.encode() {
                        Ok(wire) => {
                            if let Err(err) = socket.send_to(&wire, source).await {
                                warn!(%source, %err, "failed to send response");
                            }
                        }
                        Err(err) => warn!(%source, %err, "failed to encode response"),
                    }
                });
            }
        })
    }
}
