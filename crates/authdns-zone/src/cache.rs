//! The zone cache: coordinator of holders, storage, and replication
//!
//! A single-consumer actor keyed by domain. Every CRUD and activation
//! request is serialized through its command loop, which keeps the
//! domain-to-holder index and the on-disk files free of races without any
//! shared-memory locking. Mutations commit locally first, then broadcast;
//! when quorum fails the cache restores the pre-change snapshot locally and
//! drives the same snapshot to every peer that acknowledged the aborted
//! change.

use std::collections::HashMap;
use std::sync::Arc;

use authdns_core::{normalize_domain, DnsError, DnsResult, Zone};
use authdns_store::ZoneStore;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::holder::ZoneHolder;
use crate::replication::{ChangeAction, Replicator};

const CACHE_QUEUE_DEPTH: usize = 256;

enum CacheCommand {
    Fetch {
        domain: String,
        remote: bool,
        reply: oneshot::Sender<DnsResult<Zone>>,
    },
    Create {
        domain: String,
        zone: Zone,
        reply: oneshot::Sender<DnsResult<()>>,
    },
    Update {
        domain: String,
        zone: Zone,
        reply: oneshot::Sender<DnsResult<u64>>,
    },
    Put {
        domain: String,
        zone: Zone,
        reply: oneshot::Sender<DnsResult<()>>,
    },
    Delete {
        domain: String,
        reply: oneshot::Sender<DnsResult<()>>,
    },
    Apply {
        action: ChangeAction,
        domain: String,
        zone: Option<Zone>,
        reply: oneshot::Sender<DnsResult<()>>,
    },
}

/// Handle to the zone cache actor
#[derive(Clone)]
pub struct ZoneCache {
    tx: mpsc::Sender<CacheCommand>,
}

impl ZoneCache {
    /// Start the cache actor over `store`, replicating through `replicator`
    pub fn spawn(store: ZoneStore, replicator: Arc<dyn Replicator>) -> ZoneCache {
        let (tx, rx) = mpsc::channel(CACHE_QUEUE_DEPTH);
        tokio::spawn(CacheActor { store, replicator, holders: HashMap::new() }.run(rx));
        ZoneCache { tx }
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<DnsResult<T>>) -> CacheCommand,
    ) -> DnsResult<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(build(reply))
            .await
            .map_err(|_| DnsError::internal("zone cache stopped"))?;
        rx.await.map_err(|_| DnsError::internal("zone cache stopped"))?
    }

    /// Look a zone up locally, falling back to peers on a local miss
    pub async fn fetch(&self, domain: &str) -> DnsResult<Zone> {
        let domain = normalize_domain(domain);
        self.request(|reply| CacheCommand::Fetch { domain, remote: true, reply }).await
    }

    /// Look a zone up locally only
    pub async fn fetch_local(&self, domain: &str) -> DnsResult<Zone> {
        let domain = normalize_domain(domain);
        self.request(|reply| CacheCommand::Fetch { domain, remote: false, reply }).await
    }

    /// Create a zone that must not already exist
    pub async fn create(&self, domain: &str, zone: Zone) -> DnsResult<()> {
        let domain = normalize_domain(domain);
        self.request(|reply| CacheCommand::Create { domain, zone, reply }).await
    }

    /// Replace a zone's records, guarded by its version
    ///
    /// `zone.version` must carry the expected current version; the stored
    /// version becomes `expected + 1`, which is returned.
    pub async fn update(&self, domain: &str, zone: Zone) -> DnsResult<u64> {
        let domain = normalize_domain(domain);
        self.request(|reply| CacheCommand::Update { domain, zone, reply }).await
    }

    /// Free-form upsert; also the rollback primitive
    pub async fn put(&self, domain: &str, zone: Zone) -> DnsResult<()> {
        let domain = normalize_domain(domain);
        self.request(|reply| CacheCommand::Put { domain, zone, reply }).await
    }

    /// Remove a zone
    pub async fn delete(&self, domain: &str) -> DnsResult<()> {
        let domain = normalize_domain(domain);
        self.request(|reply| CacheCommand::Delete { domain, reply }).await
    }

    /// Materialize a change arriving from a peer
    ///
    /// Applies the action locally (write or delete, then activate or stop
    /// the holder) without replicating further.
    pub async fn apply_change(
        &self,
        action: ChangeAction,
        domain: &str,
        zone: Option<Zone>,
    ) -> DnsResult<()> {
        let domain = normalize_domain(domain);
        self.request(|reply| CacheCommand::Apply { action, domain, zone, reply }).await
    }
}

struct CacheActor {
    store: ZoneStore,
    replicator: Arc<dyn Replicator>,
    holders: HashMap<String, ZoneHolder>,
}

impl CacheActor {
    async fn run(mut self, mut rx: mpsc::Receiver<CacheCommand>) {
        while let Some(command) = rx.recv().await {
            match command {
                CacheCommand::Fetch { domain, remote, reply } => {
                    let _ = reply.send(self.fetch(&domain, remote).await);
                }
                CacheCommand::Create { domain, zone, reply } => {
                    let _ = reply.send(self.create(&domain, zone).await);
                }
                CacheCommand::Update { domain, zone, reply } => {
                    let _ = reply.send(self.update(&domain, zone).await);
                }
                CacheCommand::Put { domain, zone, reply } => {
                    let _ = reply.send(self.put(&domain, zone).await);
                }
                CacheCommand::Delete { domain, reply } => {
                    let _ = reply.send(self.delete(&domain).await);
                }
                CacheCommand::Apply { action, domain, zone, reply } => {
                    let _ = reply.send(self.apply(action, &domain, zone).await);
                }
            }
        }
    }

    /// Live holder for `domain`, if one is indexed
    ///
    /// A holder whose task has exited is dropped from the index here, so a
    /// crashed holder costs at most one failed access before reactivation.
    fn live_holder(&mut self, domain: &str) -> Option<ZoneHolder> {
        if self.holders.get(domain).is_some_and(|h| !h.is_alive()) {
            warn!(%domain, "dropping dead zone holder");
            self.holders.remove(domain);
        }
        self.holders.get(domain).cloned()
    }

    /// Holder for `domain`, activating from disk (or `content`) on demand
    fn ensure_holder(&mut self, domain: &str, content: Option<Zone>) -> DnsResult<ZoneHolder> {
        if let Some(holder) = self.live_holder(domain) {
            return Ok(holder);
        }

        let zone = match content {
            Some(zone) => zone,
            None => self.store.read(domain)?,
        };
        let holder = ZoneHolder::spawn(domain.to_string(), zone, self.store.clone());
        self.holders.insert(domain.to_string(), holder.clone());
        debug!(%domain, "activated zone holder");
        Ok(holder)
    }

    async fn fetch(&mut self, domain: &str, remote: bool) -> DnsResult<Zone> {
        match self.ensure_holder(domain, None) {
            Ok(holder) => holder.get().await,
            Err(DnsError::NotFound) if remote => self.replicator.fetch_remote(domain).await,
            Err(err) => Err(err),
        }
    }

    async fn create(&mut self, domain: &str, mut zone: Zone) -> DnsResult<()> {
        if self.store.exists(domain) {
            return Err(DnsError::ZoneExists { zone: domain.to_string() });
        }
        if zone.version.is_none() {
            zone.version = Some(1);
        }

        self.store.write(domain, &zone)?;
        self.ensure_holder(domain, Some(zone.clone()))?;

        match self.replicator.broadcast(ChangeAction::Create, domain, Some(&zone)).await {
            Ok(_) => Ok(()),
            Err(err) => {
                warn!(%domain, %err, "create failed quorum, rolling back");
                if let Err(remove) = self.store.delete(domain) {
                    if !remove.is_not_found() {
                        warn!(%domain, %remove, "rollback delete failed");
                    }
                }
                self.holders.remove(domain);
                if let DnsError::QuorumFailed { acked_peers, .. } = &err {
                    self.replicator
                        .rollback(ChangeAction::Create, domain, None, acked_peers)
                        .await;
                }
                Err(err)
            }
        }
    }

    async fn update(&mut self, domain: &str, zone: Zone) -> DnsResult<u64> {
        let expected = zone.version.ok_or(DnsError::VersionRequired)?;

        let holder = self.ensure_holder(domain, None)?;
        let previous = holder.get().await?;
        let current = previous.version.ok_or(DnsError::VersionMissing)?;
        if current != expected {
            return Err(DnsError::VersionMismatch { expected, actual: current });
        }

        let mut next = zone;
        next.version = Some(expected + 1);
        holder.put(next.clone()).await?;

        match self.replicator.broadcast(ChangeAction::Update, domain, Some(&next)).await {
            Ok(_) => Ok(expected + 1),
            Err(err) => {
                warn!(%domain, %err, "update failed quorum, restoring previous content");
                if let Err(restore) = holder.put(previous.clone()).await {
                    warn!(%domain, %restore, "local update rollback failed");
                }
                if let DnsError::QuorumFailed { acked_peers, .. } = &err {
                    self.replicator
                        .rollback(ChangeAction::Update, domain, Some(&previous), acked_peers)
                        .await;
                }
                Err(err)
            }
        }
    }

    async fn put(&mut self, domain: &str, zone: Zone) -> DnsResult<()> {
        let previous = match self.live_holder(domain) {
            Some(holder) => Some(holder.get().await?),
            None => match self.store.read(domain) {
                Ok(zone) => Some(zone),
                Err(DnsError::NotFound) => None,
                Err(err) => return Err(err),
            },
        };

        match self.live_holder(domain) {
            Some(holder) => holder.put(zone.clone()).await?,
            None => {
                self.store.write(domain, &zone)?;
                self.ensure_holder(domain, Some(zone.clone()))?;
            }
        }

        match self.replicator.broadcast(ChangeAction::Put, domain, Some(&zone)).await {
            Ok(_) => Ok(()),
            Err(err) => {
                warn!(%domain, %err, "put failed quorum, rolling back");
                match &previous {
                    Some(previous) => {
                        if let Some(holder) = self.live_holder(domain) {
                            if let Err(restore) = holder.put(previous.clone()).await {
                                warn!(%domain, %restore, "local put rollback failed");
                            }
                        }
                    }
                    None => {
                        if let Err(remove) = self.store.delete(domain) {
                            if !remove.is_not_found() {
                                warn!(%domain, %remove, "rollback delete failed");
                            }
                        }
                        self.holders.remove(domain);
                    }
                }
                if let DnsError::QuorumFailed { acked_peers, .. } = &err {
                    self.replicator
                        .rollback(ChangeAction::Put, domain, previous.as_ref(), acked_peers)
                        .await;
                }
                Err(err)
            }
        }
    }

    async fn delete(&mut self, domain: &str) -> DnsResult<()> {
        let previous = match self.live_holder(domain) {
            Some(holder) => Some(holder.get().await?),
            None => match self.store.read(domain) {
                Ok(zone) => Some(zone),
                Err(DnsError::NotFound) => None,
                Err(err) => return Err(err),
            },
        };

        match self.store.delete(domain) {
            Ok(()) => {}
            Err(DnsError::NotFound) if previous.is_none() => return Err(DnsError::NotFound),
            Err(DnsError::NotFound) => {}
            Err(err) => return Err(err),
        }
        self.holders.remove(domain);

        match self.replicator.broadcast(ChangeAction::Delete, domain, None).await {
            Ok(_) => Ok(()),
            Err(err) => {
                warn!(%domain, %err, "delete failed quorum, restoring zone");
                if let Some(previous) = &previous {
                    match self.store.write(domain, previous) {
                        Ok(()) => {
                            let _ = self.ensure_holder(domain, Some(previous.clone()));
                        }
                        Err(restore) => {
                            warn!(%domain, %restore, "local delete rollback failed");
                        }
                    }
                }
                if let DnsError::QuorumFailed { acked_peers, .. } = &err {
                    self.replicator
                        .rollback(ChangeAction::Delete, domain, previous.as_ref(), acked_peers)
                        .await;
                }
                Err(err)
            }
        }
    }

    /// Remote-applied path: materialize the action without re-replicating
    async fn apply(
        &mut self,
        action: ChangeAction,
        domain: &str,
        zone: Option<Zone>,
    ) -> DnsResult<()> {
        match action {
            ChangeAction::Create | ChangeAction::Update | ChangeAction::Put => {
                let zone = zone.ok_or_else(|| {
                    DnsError::validation(format!("{action:?} change carries no zone payload"))
                })?;
                match self.live_holder(domain) {
                    Some(holder) => holder.put(zone).await,
                    None => {
                        self.store.write(domain, &zone)?;
                        self.ensure_holder(domain, Some(zone))?;
                        Ok(())
                    }
                }
            }
            ChangeAction::Delete => {
                match self.store.delete(domain) {
                    Ok(()) | Err(DnsError::NotFound) => {}
                    Err(err) => return Err(err),
                }
                self.holders.remove(domain);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn zone(domain: &str, version: u64) -> Zone {
        serde_json::from_value(json!({
            "name": domain,
            "version": version,
            "records": [{"type": "A", "data": "1.2.3.4", "ttl": 300}]
        }))
        .unwrap()
    }

    /// Test replicator: quorum outcome is toggled by a flag, and every
    /// rollback call is recorded for inspection.
    #[derive(Default)]
    struct ScriptedReplicator {
        fail: AtomicBool,
        rollbacks: Mutex<Vec<(ChangeAction, String, Option<Zone>)>>,
        remote: Mutex<Option<Zone>>,
    }

    #[async_trait]
    impl Replicator for ScriptedReplicator {
        async fn broadcast(
            &self,
            _action: ChangeAction,
            _domain: &str,
            _payload: Option<&Zone>,
        ) -> DnsResult<Vec<String>> {
            if self.fail.load(Ordering::SeqCst) {
                Err(DnsError::QuorumFailed {
                    acks: 1,
                    required: 2,
                    acked_peers: vec!["peer-1:5300".into()],
                })
            } else {
                Ok(vec!["peer-1:5300".into()])
            }
        }

        async fn rollback(
            &self,
            aborted: ChangeAction,
            domain: &str,
            previous: Option<&Zone>,
            _acked_peers: &[String],
        ) {
            self.rollbacks.lock().unwrap().push((
                aborted,
                domain.to_string(),
                previous.cloned(),
            ));
        }

        async fn fetch_remote(&self, _domain: &str) -> DnsResult<Zone> {
            self.remote.lock().unwrap().clone().ok_or(DnsError::NotFound)
        }
    }

    fn setup() -> (TempDir, ZoneStore, Arc<ScriptedReplicator>, ZoneCache) {
        let dir = TempDir::new().unwrap();
        let store = ZoneStore::new(dir.path());
        let replicator = Arc::new(ScriptedReplicator::default());
        let cache = ZoneCache::spawn(store.clone(), replicator.clone());
        (dir, store, replicator, cache)
    }

    #[tokio::test]
    async fn create_then_fetch_roundtrip() {
        let (_dir, store, _rep, cache) = setup();

        cache.create("hello.test", zone("hello.test", 1)).await.unwrap();
        assert_eq!(cache.fetch("hello.test").await.unwrap().version, Some(1));
        assert!(store.exists("hello.test"));

        let err = cache.create("hello.test", zone("hello.test", 1)).await.unwrap_err();
        assert!(matches!(err, DnsError::ZoneExists { .. }));
    }

    #[tokio::test]
    async fn create_defaults_version_to_one() {
        let (_dir, _store, _rep, cache) = setup();
        let mut unversioned = zone("hello.test", 1);
        unversioned.version = None;

        cache.create("hello.test", unversioned).await.unwrap();
        assert_eq!(cache.fetch_local("hello.test").await.unwrap().version, Some(1));
    }

    #[tokio::test]
    async fn update_bumps_version_and_detects_conflicts() {
        let (_dir, store, _rep, cache) = setup();
        cache.create("a.test", zone("a.test", 1)).await.unwrap();

        let new_version = cache.update("a.test", zone("a.test", 1)).await.unwrap();
        assert_eq!(new_version, 2);
        assert_eq!(store.read("a.test").unwrap().version, Some(2));

        let err = cache.update("a.test", zone("a.test", 1)).await.unwrap_err();
        assert!(matches!(err, DnsError::VersionMismatch { expected: 1, actual: 2 }));
        assert!(err.to_string().starts_with("version mismatch"));
    }

    #[tokio::test]
    async fn update_requires_a_version() {
        let (_dir, _store, _rep, cache) = setup();
        cache.create("a.test", zone("a.test", 1)).await.unwrap();

        let mut unversioned = zone("a.test", 1);
        unversioned.version = None;
        let err = cache.update("a.test", unversioned).await.unwrap_err();
        assert_eq!(err, DnsError::VersionRequired);
    }

    #[tokio::test]
    async fn update_of_absent_zone_is_not_found() {
        let (_dir, _store, _rep, cache) = setup();
        let err = cache.update("ghost.test", zone("ghost.test", 1)).await.unwrap_err();
        assert_eq!(err, DnsError::NotFound);
    }

    #[tokio::test]
    async fn failed_create_leaves_no_trace_and_rolls_back_peers() {
        let (_dir, store, replicator, cache) = setup();
        replicator.fail.store(true, Ordering::SeqCst);

        let err = cache.create("r.test", zone("r.test", 1)).await.unwrap_err();
        assert!(matches!(err, DnsError::QuorumFailed { .. }));

        assert_eq!(cache.fetch("r.test").await.unwrap_err(), DnsError::NotFound);
        assert!(!store.exists("r.test"));

        let rollbacks = replicator.rollbacks.lock().unwrap();
        assert_eq!(rollbacks.len(), 1);
        assert_eq!(rollbacks[0].0, ChangeAction::Create);
        assert!(rollbacks[0].2.is_none());
    }

    #[tokio::test]
    async fn failed_update_restores_previous_content() {
        let (_dir, store, replicator, cache) = setup();
        cache.create("u.test", zone("u.test", 1)).await.unwrap();

        replicator.fail.store(true, Ordering::SeqCst);
        let err = cache.update("u.test", zone("u.test", 1)).await.unwrap_err();
        assert!(matches!(err, DnsError::QuorumFailed { .. }));

        assert_eq!(store.read("u.test").unwrap().version, Some(1));
        assert_eq!(cache.fetch_local("u.test").await.unwrap().version, Some(1));

        let rollbacks = replicator.rollbacks.lock().unwrap();
        assert_eq!(rollbacks.len(), 1);
        assert_eq!(rollbacks[0].0, ChangeAction::Update);
        assert_eq!(rollbacks[0].2.as_ref().unwrap().version, Some(1));
    }

    #[tokio::test]
    async fn failed_delete_restores_the_zone() {
        let (_dir, store, replicator, cache) = setup();
        cache.create("d.test", zone("d.test", 1)).await.unwrap();

        replicator.fail.store(true, Ordering::SeqCst);
        let err = cache.delete("d.test").await.unwrap_err();
        assert!(matches!(err, DnsError::QuorumFailed { .. }));

        assert_eq!(store.read("d.test").unwrap(), zone("d.test", 1));
        assert_eq!(cache.fetch_local("d.test").await.unwrap(), zone("d.test", 1));
    }

    #[tokio::test]
    async fn failed_put_over_nothing_removes_the_upsert() {
        let (_dir, store, replicator, cache) = setup();
        replicator.fail.store(true, Ordering::SeqCst);

        let err = cache.put("p.test", zone("p.test", 1)).await.unwrap_err();
        assert!(matches!(err, DnsError::QuorumFailed { .. }));
        assert!(!store.exists("p.test"));
    }

    #[tokio::test]
    async fn unreachable_quorum_ratio_forces_rollback_on_a_single_node() {
        use crate::replication::StandaloneReplicator;

        let dir = TempDir::new().unwrap();
        let store = ZoneStore::new(dir.path());
        let cache = ZoneCache::spawn(store.clone(), Arc::new(StandaloneReplicator::new(2.0)));

        let err = cache.create("r.test", zone("r.test", 1)).await.unwrap_err();
        assert!(matches!(err, DnsError::QuorumFailed { .. }));
        assert_eq!(cache.fetch("r.test").await.unwrap_err(), DnsError::NotFound);
        assert!(!store.exists("r.test"));
    }

    #[tokio::test]
    async fn delete_of_absent_zone_is_not_found() {
        let (_dir, _store, _rep, cache) = setup();
        assert_eq!(cache.delete("ghost.test").await.unwrap_err(), DnsError::NotFound);
    }

    #[tokio::test]
    async fn fetch_falls_back_to_peers() {
        let (_dir, _store, replicator, cache) = setup();
        *replicator.remote.lock().unwrap() = Some(zone("far.test", 4));

        assert_eq!(cache.fetch("far.test").await.unwrap().version, Some(4));
        // fetch_local never consults peers
        assert_eq!(cache.fetch_local("far.test").await.unwrap_err(), DnsError::NotFound);
    }

    #[tokio::test]
    async fn apply_change_materializes_without_replicating() {
        let (_dir, store, _rep, cache) = setup();

        cache
            .apply_change(ChangeAction::Create, "peer.test", Some(zone("peer.test", 1)))
            .await
            .unwrap();
        assert_eq!(store.read("peer.test").unwrap().version, Some(1));

        cache
            .apply_change(ChangeAction::Put, "peer.test", Some(zone("peer.test", 7)))
            .await
            .unwrap();
        assert_eq!(cache.fetch_local("peer.test").await.unwrap().version, Some(7));

        cache.apply_change(ChangeAction::Delete, "peer.test", None).await.unwrap();
        assert!(!store.exists("peer.test"));
        assert_eq!(cache.fetch_local("peer.test").await.unwrap_err(), DnsError::NotFound);
    }

    #[tokio::test]
    async fn lazy_activation_reads_zones_written_outside_the_cache() {
        let (_dir, store, _rep, cache) = setup();
        store.write("cold.test", &zone("cold.test", 3)).unwrap();

        assert_eq!(cache.fetch_local("cold.test").await.unwrap().version, Some(3));
    }
}
