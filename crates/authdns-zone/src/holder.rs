//! Per-zone holder actor
//!
//! A holder owns the authoritative in-memory copy of one zone. Commands
//! arrive over a channel and are processed in order, so readers only ever
//! observe fully applied values. `put` persists through the store before
//! swapping memory: if the write fails, the held content is unchanged and
//! the storage error is returned to the caller as-is.

use authdns_core::{DnsError, DnsResult, Zone};
use authdns_store::ZoneStore;
use tokio::sync::{mpsc, oneshot};

const HOLDER_QUEUE_DEPTH: usize = 32;

enum HolderCommand {
    Get { reply: oneshot::Sender<Zone> },
    Put { zone: Zone, reply: oneshot::Sender<DnsResult<()>> },
}

/// Handle to a running zone holder
#[derive(Debug, Clone)]
pub struct ZoneHolder {
    tx: mpsc::Sender<HolderCommand>,
}

impl ZoneHolder {
    /// Start a holder task owning `zone` for `domain`
    pub fn spawn(domain: String, zone: Zone, store: ZoneStore) -> ZoneHolder {
        let (tx, rx) = mpsc::channel(HOLDER_QUEUE_DEPTH);
        tokio::spawn(run(domain, zone, store, rx));
        ZoneHolder { tx }
    }

    /// The holder task is still consuming commands
    pub fn is_alive(&self) -> bool {
        !self.tx.is_closed()
    }

    /// Current zone content
    pub async fn get(&self) -> DnsResult<Zone> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(HolderCommand::Get { reply })
            .await
            .map_err(|_| holder_gone())?;
        rx.await.map_err(|_| holder_gone())
    }

    /// Persist `zone` through the store, then swap it in memory
    pub async fn put(&self, zone: Zone) -> DnsResult<()> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(HolderCommand::Put { zone, reply })
            .await
            .map_err(|_| holder_gone())?;
        rx.await.map_err(|_| holder_gone())?
    }
}

fn holder_gone() -> DnsError {
    DnsError::internal("zone holder stopped")
}

async fn run(
    domain: String,
    mut current: Zone,
    store: ZoneStore,
    mut rx: mpsc::Receiver<HolderCommand>,
) {
    while let Some(command) = rx.recv().await {
        match command {
            HolderCommand::Get { reply } => {
                let _ = reply.send(current.clone());
            }
            HolderCommand::Put { zone, reply } => {
                let result = store.write(&domain, &zone);
                if result.is_ok() {
                    current = zone;
                }
                let _ = reply.send(result);
            }
        }
    }
    tracing::debug!(%domain, "zone holder stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn zone(version: u64) -> Zone {
        serde_json::from_value(json!({
            "name": "hello.test",
            "version": version,
            "records": [{"type": "A", "data": "1.2.3.4"}]
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn get_returns_held_content_and_put_swaps_it() {
        let dir = TempDir::new().unwrap();
        let store = ZoneStore::new(dir.path());
        let holder = ZoneHolder::spawn("hello.test".into(), zone(1), store.clone());

        assert_eq!(holder.get().await.unwrap(), zone(1));

        holder.put(zone(2)).await.unwrap();
        assert_eq!(holder.get().await.unwrap(), zone(2));
        assert_eq!(store.read("hello.test").unwrap(), zone(2));
    }

    #[tokio::test]
    async fn failed_put_leaves_memory_untouched() {
        let dir = TempDir::new().unwrap();
        // Root the store below a regular file so directory creation fails
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"").unwrap();
        let store = ZoneStore::new(&blocker);

        let holder = ZoneHolder::spawn("hello.test".into(), zone(1), store);
        assert!(holder.put(zone(2)).await.is_err());
        assert_eq!(holder.get().await.unwrap(), zone(1));
    }

    #[tokio::test]
    async fn dropped_handle_stops_the_task() {
        let dir = TempDir::new().unwrap();
        let store = ZoneStore::new(dir.path());
        let holder = ZoneHolder::spawn("hello.test".into(), zone(1), store);
        let probe = holder.clone();
        drop(holder);

        // The remaining clone keeps the task alive; dropping it ends it
        assert!(probe.is_alive());
        drop(probe);
    }
}
