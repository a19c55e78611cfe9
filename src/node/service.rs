//! The Node: request orchestration.
//!
//! Every public operation here is transport-agnostic; `handlers.rs` binds them to
//! HTTP. The node owns no state of its own beyond handles to the metadata store,
//! the blob store, the peer client, the replication controller and the access log.

use super::types::{CapacityDecision, ReadOutcome};
use crate::access_log::record::{AccessRecord, RequestType};
use crate::access_log::writer::AccessLog;
use crate::config::NodeConfig;
use crate::error::NodeError;
use crate::metadata::store::MetadataStore;
use crate::metadata::types::{FileId, UNKNOWN_SIZE};
use crate::peer::client::PeerClient;
use crate::replication::controller::{PlacementRequest, ReplicationController};
use crate::storage::blobs::BlobStore;

use std::io;
use std::sync::Arc;
use std::time::Duration;

/// File id logged for a write that carried no file.
const NO_FILE: &str = "NO_FILE";

pub struct Node {
    config: Arc<NodeConfig>,
    metadata: Arc<MetadataStore>,
    blobs: Arc<BlobStore>,
    peers: Arc<dyn PeerClient>,
    replication: Arc<ReplicationController>,
    access_log: Arc<AccessLog>,
}

impl Node {
    pub fn new(
        config: Arc<NodeConfig>,
        metadata: Arc<MetadataStore>,
        blobs: Arc<BlobStore>,
        peers: Arc<dyn PeerClient>,
        access_log: Arc<AccessLog>,
    ) -> Arc<Self> {
        let replication = Arc::new(ReplicationController::new(
            config.clone(),
            metadata.clone(),
            blobs.clone(),
            peers.clone(),
            access_log.clone(),
        ));

        Arc::new(Self {
            config,
            metadata,
            blobs,
            peers,
            replication,
            access_log,
        })
    }

    /// Opens the on-disk state under `config.data_dir`: metadata snapshot,
    /// upload directory and access logs.
    pub fn open(config: NodeConfig, peers: Arc<dyn PeerClient>) -> Result<Arc<Self>, NodeError> {
        std::fs::create_dir_all(&config.data_dir)?;
        let metadata = Arc::new(MetadataStore::open(
            config.address.clone(),
            config.peer_order,
            config.metadata_path(),
        )?);
        let blobs = Arc::new(BlobStore::new(config.upload_dir())?);
        let access_log = Arc::new(AccessLog::new(config.log_dir())?);

        Ok(Self::new(Arc::new(config), metadata, blobs, peers, access_log))
    }

    pub fn address(&self) -> &str {
        &self.config.address
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn metadata(&self) -> &Arc<MetadataStore> {
        &self.metadata
    }

    pub fn replication(&self) -> &Arc<ReplicationController> {
        &self.replication
    }

    async fn log(
        &self,
        file_id: &str,
        requester: &str,
        request_type: RequestType,
        status: u16,
        size: i64,
        correlation_id: Option<&str>,
    ) {
        let mut record = AccessRecord::now(
            file_id,
            requester,
            self.config.address.as_str(),
            request_type,
            status,
            size,
        );
        if let Some(correlation_id) = correlation_id {
            record = record.with_correlation(correlation_id);
        }
        self.access_log.record(record).await;
    }

    // ============================================================
    // WRITE
    // ============================================================

    /// Stores an uploaded file and records this node as its holder.
    ///
    /// `file_id` is only supplied by clone-writes from other nodes, so the copy
    /// keeps the id it has everywhere else; ordinary writes get a fresh one.
    /// A supplied id that already names different local bytes is refused.
    pub async fn write(
        &self,
        payload: Option<Vec<u8>>,
        requester: &str,
        file_id: Option<FileId>,
    ) -> Result<FileId, NodeError> {
        let bytes = match payload {
            Some(bytes) if !bytes.is_empty() => bytes,
            _ => {
                self.log(NO_FILE, requester, RequestType::Write, 400, UNKNOWN_SIZE, None)
                    .await;
                return Err(NodeError::InvalidRequest("no file attached".to_string()));
            }
        };

        let supplied_id = file_id.is_some();
        let file_id = match file_id {
            Some(id) if id.is_valid() => id,
            Some(id) => {
                self.log(id.as_str(), requester, RequestType::Write, 400, UNKNOWN_SIZE, None)
                    .await;
                return Err(NodeError::InvalidRequest(format!("invalid file id {:?}", id.0)));
            }
            None => FileId::new(),
        };

        // A supplied id may only restate bytes we already have, never replace them.
        let existing = if supplied_id {
            self.blobs.get(&file_id).await?
        } else {
            None
        };
        if existing.as_ref().is_some_and(|existing| *existing != bytes) {
            self.log(file_id.as_str(), requester, RequestType::Write, 409, UNKNOWN_SIZE, None)
                .await;
            return Err(NodeError::AlreadyExists(file_id.to_string()));
        }

        let size = self.blobs.put(&file_id, &bytes).await?;
        if let Err(e) = self
            .metadata
            .record_holder(&file_id, &self.config.address, size as i64)
            .await
        {
            if existing.is_none()
                && let Err(cleanup) = self.blobs.remove(&file_id).await
            {
                tracing::warn!("Failed to remove unrecorded blob {}: {}", file_id, cleanup);
            }
            return Err(e.into());
        }

        self.log(file_id.as_str(), requester, RequestType::Write, 201, size as i64, None)
            .await;
        Ok(file_id)
    }

    // ============================================================
    // READ
    // ============================================================

    /// Resolves a read: serve locally, redirect to a known or discovered holder,
    /// or report not found.
    ///
    /// With distributed replication on, the read is counted as active for its
    /// whole duration (including `delay`) and may trigger a replica placement,
    /// which runs detached and never changes this read's outcome.
    pub async fn read(
        &self,
        file_id: &FileId,
        requester: &str,
        delay: Option<Duration>,
    ) -> Result<ReadOutcome, NodeError> {
        let correlation_id = uuid::Uuid::new_v4().to_string();

        let _active = self.config.replication.map(|_| {
            let guard = self.metadata.begin_request(file_id, requester);
            self.consider_placement(file_id, requester, &correlation_id);
            guard
        });

        let (outcome, size) = match self.resolve(file_id).await {
            Ok(resolved) => resolved,
            Err(e) => {
                self.log(
                    file_id.as_str(),
                    requester,
                    RequestType::Read,
                    500,
                    UNKNOWN_SIZE,
                    Some(&correlation_id),
                )
                .await;
                return Err(e);
            }
        };

        self.log(
            file_id.as_str(),
            requester,
            RequestType::Read,
            outcome.status(),
            size,
            Some(&correlation_id),
        )
        .await;

        if let (ReadOutcome::ServeLocal { .. }, Some(delay)) = (&outcome, delay) {
            tokio::time::sleep(delay).await;
        }

        Ok(outcome)
    }

    fn consider_placement(&self, file_id: &FileId, requester: &str, correlation_id: &str) {
        let concurrent = match self.metadata.concurrent_count(file_id) {
            0 => {
                let err = NodeError::InternalInconsistency(format!(
                    "no active request recorded for {} while reading it",
                    file_id
                ));
                tracing::error!("{}", err);
                0
            }
            n => n,
        };

        if !self.replication.should_place(concurrent) {
            return;
        }

        tracing::info!(
            "{} has {} concurrent reads, considering another replica",
            file_id,
            concurrent
        );
        self.replication.spawn_placement(PlacementRequest {
            file_id: file_id.clone(),
            triggered_by: requester.to_string(),
            requesters: self.metadata.list_active_requesters(file_id),
            correlation_id: correlation_id.to_string(),
        });
    }

    /// Routing resolution. Returns the outcome and the size to log.
    async fn resolve(&self, file_id: &FileId) -> Result<(ReadOutcome, i64), NodeError> {
        if !file_id.is_valid() {
            return Ok((ReadOutcome::NotFound, UNKNOWN_SIZE));
        }

        if self.metadata.is_held_locally(file_id) {
            match self.blobs.get(file_id).await? {
                Some(bytes) => {
                    let size = bytes.len() as i64;
                    return Ok((ReadOutcome::ServeLocal { bytes }, size));
                }
                None => {
                    tracing::warn!("Holder record for {} points here but the bytes are gone", file_id);
                    self.metadata
                        .remove_holder(file_id, &self.config.address)
                        .await?;
                }
            }
        }

        if let Some(address) = self.metadata.lookup_holder(file_id, true) {
            tracing::debug!("READ: {} known to be on {}", file_id, address);
            return Ok((ReadOutcome::Redirect { address }, UNKNOWN_SIZE));
        }

        // First responder in peer order wins; unreachable peers are skipped.
        for peer in self.metadata.list_peers() {
            match self.peers.file_exists(&peer, file_id).await {
                Ok(true) => {
                    tracing::debug!("READ: probe found {} on {}", file_id, peer);
                    if let Err(e) = self
                        .metadata
                        .record_holder(file_id, &peer, UNKNOWN_SIZE)
                        .await
                    {
                        tracing::error!("Failed to cache holder {} for {}: {}", peer, file_id, e);
                    }
                    return Ok((ReadOutcome::Redirect { address: peer }, UNKNOWN_SIZE));
                }
                Ok(false) => {
                    tracing::trace!("READ: {} does not hold {}", peer, file_id);
                }
                Err(e) => {
                    tracing::warn!("READ: skipping peer during probe: {}", e);
                }
            }
        }

        Ok((ReadOutcome::NotFound, UNKNOWN_SIZE))
    }

    // ============================================================
    // EXISTS / DELETE
    // ============================================================

    /// Whether the bytes of `file_id` are on this node's disk.
    pub async fn exists(&self, file_id: &FileId) -> bool {
        self.blobs.contains(file_id).await
    }

    pub async fn delete(&self, file_id: &FileId) -> Result<(), NodeError> {
        if !self.metadata.is_held_locally(file_id) {
            return Err(NodeError::NotFound(file_id.to_string()));
        }

        self.blobs.remove(file_id).await?;
        self.metadata
            .remove_holder(file_id, &self.config.address)
            .await?;
        tracing::info!("Deleted {}", file_id);
        Ok(())
    }

    // ============================================================
    // TRANSFER / REPLICATE
    // ============================================================

    /// Moves the local copy to `destination`. The local copy is removed only after
    /// the destination acknowledged the write; on failure nothing changes here.
    pub async fn transfer(
        &self,
        file_id: &FileId,
        destination: &str,
        requester: &str,
    ) -> Result<u64, NodeError> {
        if !self.metadata.is_held_locally(file_id) {
            return Err(NodeError::NotFound(file_id.to_string()));
        }

        self.ensure_room(file_id, destination).await?;
        let size = self
            .replication
            .clone_to(file_id, destination, RequestType::Transfer, requester, None)
            .await?;

        self.blobs.remove(file_id).await?;
        self.metadata
            .remove_holder(file_id, &self.config.address)
            .await?;
        tracing::info!("Transferred {} to {}", file_id, destination);
        Ok(size)
    }

    /// Copies the local copy to `destination`, keeping ours.
    pub async fn replicate(
        &self,
        file_id: &FileId,
        destination: &str,
        requester: &str,
    ) -> Result<u64, NodeError> {
        if !self.metadata.is_held_locally(file_id) {
            return Err(NodeError::NotFound(file_id.to_string()));
        }

        self.ensure_room(file_id, destination).await?;
        let size = self
            .replication
            .clone_to(file_id, destination, RequestType::Replicate, requester, None)
            .await?;
        tracing::info!("Replicated {} to {}", file_id, destination);
        Ok(size)
    }

    /// Asks `destination` whether it can fit our copy before sending it.
    async fn ensure_room(&self, file_id: &FileId, destination: &str) -> Result<(), NodeError> {
        if destination == self.config.address {
            return Err(NodeError::InvalidRequest(
                "destination is this node".to_string(),
            ));
        }

        let needed = self
            .blobs
            .size_of(file_id)
            .await?
            .ok_or_else(|| NodeError::NotFound(file_id.to_string()))?;
        let answer = self.peers.query_capacity(destination, needed).await?;
        if !answer.accepted {
            return Err(NodeError::CapacityExceeded {
                needed,
                space_left: answer.space_left,
            });
        }
        Ok(())
    }

    // ============================================================
    // CAPACITY / LOGS
    // ============================================================

    /// Would a file of `candidate_size` bytes fit? Strictly less than the
    /// space left is required.
    pub async fn capacity_query(&self, candidate_size: u64) -> Result<CapacityDecision, NodeError> {
        let used = self.blobs.used_bytes().await?;
        let limit = i64::try_from(self.config.storage_limit).unwrap_or(i64::MAX);
        let used = i64::try_from(used).unwrap_or(i64::MAX);
        let space_left = limit.saturating_sub(used);
        let candidate = i64::try_from(candidate_size).unwrap_or(i64::MAX);

        Ok(CapacityDecision {
            space_left,
            accepted: candidate < space_left,
        })
    }

    pub fn capacity_report(&self) -> u64 {
        self.config.storage_limit
    }

    /// The persisted access log for `date`, or the earliest one.
    pub async fn fetch_log(&self, date: Option<&str>) -> Result<Vec<u8>, NodeError> {
        match self.access_log.fetch(date).await {
            Ok(Some(bytes)) => Ok(bytes),
            Ok(None) => Err(NodeError::NotFound(format!(
                "log {}",
                date.unwrap_or("(earliest)")
            ))),
            Err(e) if e.kind() == io::ErrorKind::InvalidInput => {
                Err(NodeError::InvalidRequest(e.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}
