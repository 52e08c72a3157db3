//! Peer RPC transport: length-prefixed JSON frames over TCP
//!
//! Every request/reply pair is a u32 big-endian length followed by a JSON
//! payload. Transport failures never abort a broadcast; the caller demotes
//! them to "peer did not ack".

use authdns_core::{DnsError, DnsResult, Zone};
use authdns_zone::ChangeAction;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

/// Upper bound on a single frame; a zone document never comes close
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Requests served by every node's peer listener
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum PeerRequest {
    /// Materialize a replicated (or rolled-back) change locally
    ApplyChange {
        action: ChangeAction,
        domain: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        zone: Option<Zone>,
    },
    /// Return the local copy of a zone, if any
    FetchZone { domain: String },
}

/// Replies from the peer listener
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PeerResponse {
    Ok {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        zone: Option<Zone>,
    },
    NotFound,
    Error { message: String },
}

pub(crate) async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    payload: &[u8],
) -> DnsResult<()> {
    if payload.len() > MAX_FRAME_LEN {
        return Err(DnsError::transport(format!("frame too large: {} bytes", payload.len())));
    }
    writer
        .write_all(&(payload.len() as u32).to_be_bytes())
        .await
        .map_err(|err| DnsError::transport(format!("write frame length: {err}")))?;
    writer
        .write_all(payload)
        .await
        .map_err(|err| DnsError::transport(format!("write frame: {err}")))?;
    writer
        .flush()
        .await
        .map_err(|err| DnsError::transport(format!("flush frame: {err}")))
}

pub(crate) async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> DnsResult<Vec<u8>> {
    let mut length = [0u8; 4];
    reader
        .read_exact(&mut length)
        .await
        .map_err(|err| DnsError::transport(format!("read frame length: {err}")))?;
    let length = u32::from_be_bytes(length) as usize;
    if length > MAX_FRAME_LEN {
        return Err(DnsError::transport(format!("frame too large: {length} bytes")));
    }

    let mut payload = vec![0u8; length];
    reader
        .read_exact(&mut payload)
        .await
        .map_err(|err| DnsError::transport(format!("read frame: {err}")))?;
    Ok(payload)
}

/// One request/reply exchange with the peer at `addr`
pub(crate) async fn call(addr: &str, request: &PeerRequest) -> DnsResult<PeerResponse> {
    let mut stream = TcpStream::connect(addr)
        .await
        .map_err(|err| DnsError::transport(format!("connect {addr}: {err}")))?;

    let payload = serde_json::to_vec(request)
        .map_err(|err| DnsError::internal(format!("encode peer request: {err}")))?;
    write_frame(&mut stream, &payload).await?;

    let raw = read_frame(&mut stream).await?;
    serde_json::from_slice(&raw)
        .map_err(|err| DnsError::transport(format!("malformed reply from {addr}: {err}")))
}
