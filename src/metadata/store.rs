use super::types::*;
use crate::error::StoreError;

use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Holder {
    address: String,
    size: i64,
}

/// Local metadata for one node.
///
/// Every operation is atomic on its own: holder lists and active-request lists
/// are mutated under their `DashMap` shard lock, the peer list under its `RwLock`.
/// There are no multi-record transactions.
pub struct MetadataStore {
    local_address: String,
    /// `fileId -> holders`, in the order they were recorded.
    holders: DashMap<FileId, Vec<Holder>>,
    peers: RwLock<Vec<PeerRecord>>,
    /// `fileId -> requesters`; one entry per in-flight read.
    active: DashMap<FileId, Vec<String>>,
    order: PeerOrder,
    snapshot_path: Option<PathBuf>,
    persist_lock: Mutex<()>,
}

impl MetadataStore {
    /// Creates a purely in-memory store.
    pub fn new(local_address: impl Into<String>, order: PeerOrder) -> Self {
        Self {
            local_address: local_address.into(),
            holders: DashMap::new(),
            peers: RwLock::new(Vec::new()),
            active: DashMap::new(),
            order,
            snapshot_path: None,
            persist_lock: Mutex::new(()),
        }
    }

    /// Opens a store backed by a JSON snapshot, loading it if it exists.
    pub fn open(
        local_address: impl Into<String>,
        order: PeerOrder,
        path: impl AsRef<Path>,
    ) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let mut store = Self::new(local_address, order);

        if path.exists() {
            let raw = fs::read(&path)
                .map_err(|e| StoreError::Persistence(format!("read {}: {}", path.display(), e)))?;
            let snapshot: MetadataSnapshot = serde_json::from_slice(&raw)
                .map_err(|e| StoreError::Persistence(format!("decode {}: {}", path.display(), e)))?;

            for record in snapshot.files {
                store
                    .holders
                    .entry(record.file_id)
                    .or_default()
                    .push(Holder {
                        address: record.holder,
                        size: record.size,
                    });
            }
            let mut peers = store.peers.write();
            for peer in snapshot.peers {
                if peer.address != store.local_address
                    && !peers.iter().any(|p| p.address == peer.address)
                {
                    peers.push(peer);
                }
            }
            drop(peers);

            tracing::info!(
                "Loaded metadata snapshot: {} files, {} peers",
                store.holders.len(),
                store.peers.read().len()
            );
        }

        store.snapshot_path = Some(path);
        Ok(store)
    }

    pub fn local_address(&self) -> &str {
        &self.local_address
    }

    // --- Holders ---

    /// Returns a holder of `file_id`, the first one recorded.
    /// With `exclude_self` our own address is never returned.
    pub fn lookup_holder(&self, file_id: &FileId, exclude_self: bool) -> Option<String> {
        self.holders.get(file_id).and_then(|holders| {
            holders
                .iter()
                .find(|h| !exclude_self || h.address != self.local_address)
                .map(|h| h.address.clone())
        })
    }

    pub fn is_held_locally(&self, file_id: &FileId) -> bool {
        self.holders
            .get(file_id)
            .map(|holders| holders.iter().any(|h| h.address == self.local_address))
            .unwrap_or(false)
    }

    /// Idempotent upsert of a `(file_id, address)` holder record.
    ///
    /// Re-recording an existing pair only refreshes the size, and only when the
    /// new size is known. If the snapshot cannot be written the change is undone.
    pub async fn record_holder(&self, file_id: &FileId, address: &str, size: i64) -> Result<(), StoreError> {
        let change = {
            let mut holders = self.holders.entry(file_id.clone()).or_default();
            match holders.iter_mut().find(|h| h.address == address) {
                Some(existing) if size != UNKNOWN_SIZE && existing.size != size => {
                    let previous = existing.size;
                    existing.size = size;
                    Some(HolderChange::Resized(previous))
                }
                Some(_) => None,
                None => {
                    holders.push(Holder {
                        address: address.to_string(),
                        size,
                    });
                    Some(HolderChange::Added)
                }
            }
        };
        let Some(change) = change else {
            return Ok(());
        };

        tracing::debug!("Recorded holder {} for {}", address, file_id);
        if let Err(e) = self.persist().await {
            match change {
                HolderChange::Added => {
                    if let Some(mut holders) = self.holders.get_mut(file_id) {
                        holders.retain(|h| h.address != address);
                    }
                    self.holders.remove_if(file_id, |_, holders| holders.is_empty());
                }
                HolderChange::Resized(previous) => {
                    if let Some(mut holders) = self.holders.get_mut(file_id)
                        && let Some(existing) = holders.iter_mut().find(|h| h.address == address)
                    {
                        existing.size = previous;
                    }
                }
            }
            return Err(e);
        }
        Ok(())
    }

    /// Removes a holder record. Returns whether one existed.
    /// If the snapshot cannot be written the record is put back.
    pub async fn remove_holder(&self, file_id: &FileId, address: &str) -> Result<bool, StoreError> {
        let removed = match self.holders.get_mut(file_id) {
            Some(mut holders) => holders
                .iter()
                .position(|h| h.address == address)
                .map(|idx| (idx, holders.remove(idx))),
            None => None,
        };
        self.holders.remove_if(file_id, |_, holders| holders.is_empty());
        let Some((idx, holder)) = removed else {
            return Ok(false);
        };

        tracing::debug!("Removed holder {} for {}", address, file_id);
        if let Err(e) = self.persist().await {
            let mut holders = self.holders.entry(file_id.clone()).or_default();
            let idx = idx.min(holders.len());
            holders.insert(idx, holder);
            return Err(e);
        }
        Ok(true)
    }

    /// All files recorded as held by `address`.
    pub fn list_holders(&self, address: &str) -> HashSet<FileId> {
        self.holders
            .iter()
            .filter(|entry| entry.value().iter().any(|h| h.address == address))
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Every address recorded as holding `file_id`, in recording order.
    pub fn holders_of(&self, file_id: &FileId) -> Vec<String> {
        self.holders
            .get(file_id)
            .map(|holders| holders.iter().map(|h| h.address.clone()).collect())
            .unwrap_or_default()
    }

    pub fn holder_size(&self, file_id: &FileId, address: &str) -> Option<i64> {
        self.holders.get(file_id).and_then(|holders| {
            holders
                .iter()
                .find(|h| h.address == address)
                .map(|h| h.size)
        })
    }

    // --- Peers ---

    /// Known peers, never including ourselves.
    pub fn list_peers(&self) -> Vec<String> {
        let peers = self.peers.read();
        match self.order {
            PeerOrder::Registration => peers.iter().map(|p| p.address.clone()).collect(),
            PeerOrder::Distance => {
                let mut sorted: Vec<&PeerRecord> = peers.iter().collect();
                // Stable: equal distances keep registration order.
                sorted.sort_by_key(|p| {
                    if p.distance < 0 {
                        i64::MAX
                    } else {
                        p.distance
                    }
                });
                sorted.into_iter().map(|p| p.address.clone()).collect()
            }
        }
    }

    pub fn peer_records(&self) -> Vec<PeerRecord> {
        self.peers.read().clone()
    }

    /// Registers a peer or updates the distance of a known one.
    /// Returns `true` if the peer was new. Our own address is ignored.
    pub async fn register_peer(&self, address: &str, distance: i64) -> Result<bool, StoreError> {
        if address == self.local_address {
            return Ok(false);
        }

        // `Some(None)`: inserted. `Some(Some(d))`: distance changed from `d`.
        let previous = {
            let mut peers = self.peers.write();
            match peers.iter_mut().find(|p| p.address == address) {
                Some(existing) if existing.distance == distance => None,
                Some(existing) => {
                    let old = existing.distance;
                    existing.distance = distance;
                    Some(Some(old))
                }
                None => {
                    peers.push(PeerRecord {
                        address: address.to_string(),
                        distance,
                    });
                    Some(None)
                }
            }
        };
        let Some(previous) = previous else {
            return Ok(false);
        };

        if let Err(e) = self.persist().await {
            let mut peers = self.peers.write();
            match previous {
                None => peers.retain(|p| p.address != address),
                Some(old) => {
                    if let Some(existing) = peers.iter_mut().find(|p| p.address == address) {
                        existing.distance = old;
                    }
                }
            }
            return Err(e);
        }

        let inserted = previous.is_none();
        if inserted {
            tracing::info!("Registered peer {} (distance {})", address, distance);
        }
        Ok(inserted)
    }

    /// Wipes peers, holders and active requests. Nothing is wiped if the empty
    /// snapshot cannot be written.
    pub async fn clear_all(&self) -> Result<(), StoreError> {
        let peers = std::mem::take(&mut *self.peers.write());
        let holders: Vec<(FileId, Vec<Holder>)> = self
            .holders
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        self.holders.clear();

        if let Err(e) = self.persist().await {
            *self.peers.write() = peers;
            for (file_id, list) in holders {
                self.holders.insert(file_id, list);
            }
            return Err(e);
        }

        self.active.clear();
        tracing::warn!("Cleared all metadata");
        Ok(())
    }

    // --- Active requests ---

    pub fn add_active_request(&self, file_id: &FileId, requester: &str) {
        self.active
            .entry(file_id.clone())
            .or_default()
            .push(requester.to_string());
    }

    /// Removes one active record for `(file_id, requester)`.
    /// Returns `false` if there was none; the count never goes negative.
    pub fn remove_active_request(&self, file_id: &FileId, requester: &str) -> bool {
        let removed = match self.active.get_mut(file_id) {
            Some(mut requesters) => match requesters.iter().position(|r| r == requester) {
                Some(idx) => {
                    requesters.swap_remove(idx);
                    true
                }
                None => false,
            },
            None => false,
        };
        self.active.remove_if(file_id, |_, requesters| requesters.is_empty());
        removed
    }

    pub fn concurrent_count(&self, file_id: &FileId) -> usize {
        self.active.get(file_id).map(|r| r.len()).unwrap_or(0)
    }

    pub fn list_active_requesters(&self, file_id: &FileId) -> Vec<String> {
        self.active
            .get(file_id)
            .map(|r| r.value().clone())
            .unwrap_or_default()
    }

    /// Adds an active record and returns a guard that removes it when dropped.
    pub fn begin_request(self: &Arc<Self>, file_id: &FileId, requester: &str) -> ActiveRequestGuard {
        self.add_active_request(file_id, requester);
        ActiveRequestGuard {
            store: self.clone(),
            file_id: file_id.clone(),
            requester: requester.to_string(),
        }
    }

    // --- Persistence ---

    pub fn snapshot(&self) -> MetadataSnapshot {
        let mut files: Vec<FileRecord> = self
            .holders
            .iter()
            .flat_map(|entry| {
                let file_id = entry.key().clone();
                entry
                    .value()
                    .iter()
                    .map(|h| FileRecord {
                        file_id: file_id.clone(),
                        holder: h.address.clone(),
                        size: h.size,
                    })
                    .collect::<Vec<_>>()
            })
            .collect();
        // Stable: keeps each file's holders in recording order.
        files.sort_by(|a, b| a.file_id.cmp(&b.file_id));

        MetadataSnapshot {
            files,
            peers: self.peers.read().clone(),
        }
    }

    /// Writes the current snapshot. Encoding happens here; the file write runs
    /// on the blocking pool so request tasks never wait on disk I/O.
    async fn persist(&self) -> Result<(), StoreError> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };

        // Serializes writers so a later snapshot never lands before an earlier one.
        let _lock = self.persist_lock.lock().await;
        let encoded = serde_json::to_vec_pretty(&self.snapshot())
            .map_err(|e| StoreError::Persistence(format!("encode: {}", e)))?;

        let path = path.clone();
        tokio::task::spawn_blocking(move || write_snapshot(&path, &encoded))
            .await
            .map_err(|e| StoreError::Persistence(format!("snapshot task: {}", e)))?
    }
}

/// Temp file then rename, so a crash never leaves a truncated snapshot.
fn write_snapshot(path: &Path, encoded: &[u8]) -> Result<(), StoreError> {
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, encoded)
        .and_then(|_| fs::rename(&tmp, path))
        .map_err(|e| StoreError::Persistence(format!("write {}: {}", path.display(), e)))
}

/// How a holder upsert changed the store, kept for undoing it.
enum HolderChange {
    Added,
    Resized(i64),
}

/// Releases an active-request record on drop, whatever path the read took.
pub struct ActiveRequestGuard {
    store: Arc<MetadataStore>,
    file_id: FileId,
    requester: String,
}

impl ActiveRequestGuard {
    pub fn file_id(&self) -> &FileId {
        &self.file_id
    }
}

impl Drop for ActiveRequestGuard {
    fn drop(&mut self) {
        if !self
            .store
            .remove_active_request(&self.file_id, &self.requester)
        {
            tracing::warn!(
                "Active request for {} by {} was already gone",
                self.file_id,
                self.requester
            );
        }
    }
}
