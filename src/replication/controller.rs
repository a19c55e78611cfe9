use super::distance::nearest_peer;
use crate::access_log::record::{AccessRecord, RequestType};
use crate::access_log::writer::AccessLog;
use crate::config::NodeConfig;
use crate::error::NodeError;
use crate::metadata::store::MetadataStore;
use crate::metadata::types::FileId;
use crate::peer::client::PeerClient;
use crate::storage::blobs::BlobStore;

use dashmap::DashSet;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Status logged for a clone-write whose destination never answered.
const UNREACHABLE_STATUS: u16 = 502;
const CREATED_STATUS: u16 = 201;

/// What a read hands over when it pushes a file over the threshold.
#[derive(Debug, Clone)]
pub struct PlacementRequest {
    pub file_id: FileId,
    /// The reader whose arrival crossed the threshold.
    pub triggered_by: String,
    /// Snapshot of every active requester at trigger time, one entry per read.
    pub requesters: Vec<String>,
    pub correlation_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlacementOutcome {
    Placed { target: String },
    /// No peers known, or no votes cast.
    NoCandidate,
    /// The chosen peer is already recorded as a holder.
    AlreadyHeld { target: String },
    /// Another placement of the same file is running on this node.
    InFlight,
    /// We no longer have a local copy to clone from.
    NotLocal,
    /// The chosen peer cannot fit the file.
    Rejected { target: String, space_left: i64 },
    Failed { target: String, reason: String },
}

/// Picks the replica target by majority vote: each requester votes for its
/// nearest peer. Ties go to the first peer, in `peers` order, with the top count.
pub fn select_target(requesters: &[String], peers: &[String]) -> Option<String> {
    let mut votes = vec![0usize; peers.len()];
    for requester in requesters {
        if let Some(idx) = nearest_peer(requester, peers) {
            votes[idx] += 1;
        }
    }

    let mut best: Option<usize> = None;
    for (idx, &count) in votes.iter().enumerate() {
        if count == 0 {
            continue;
        }
        match best {
            Some(current) if votes[current] >= count => {}
            _ => best = Some(idx),
        }
    }
    best.map(|idx| peers[idx].clone())
}

/// Places additional replicas of hot files and performs clone-writes for the
/// explicit transfer/replicate operations.
///
/// Placement is additive: it never removes the source copy. There is no
/// cross-node coordination, so two nodes may place the same file concurrently;
/// the duplicate replica is harmless.
pub struct ReplicationController {
    config: Arc<NodeConfig>,
    metadata: Arc<MetadataStore>,
    blobs: Arc<BlobStore>,
    peers: Arc<dyn PeerClient>,
    access_log: Arc<AccessLog>,
    in_flight: DashSet<FileId>,
}

impl ReplicationController {
    pub fn new(
        config: Arc<NodeConfig>,
        metadata: Arc<MetadataStore>,
        blobs: Arc<BlobStore>,
        peers: Arc<dyn PeerClient>,
        access_log: Arc<AccessLog>,
    ) -> Self {
        Self {
            config,
            metadata,
            blobs,
            peers,
            access_log,
            in_flight: DashSet::new(),
        }
    }

    /// Whether `concurrent` in-flight reads warrant a placement attempt.
    pub fn should_place(&self, concurrent: usize) -> bool {
        self.config
            .replication
            .map(|settings| concurrent >= settings.threshold)
            .unwrap_or(false)
    }

    /// Runs [`Self::place`] on a detached task so the triggering read is not
    /// held up by capacity queries and clone-writes.
    pub fn spawn_placement(self: &Arc<Self>, request: PlacementRequest) -> JoinHandle<PlacementOutcome> {
        let controller = self.clone();
        tokio::spawn(async move { controller.place(&request).await })
    }

    /// Single-shot placement attempt: one target, one capacity query, one clone.
    pub async fn place(&self, request: &PlacementRequest) -> PlacementOutcome {
        let file_id = &request.file_id;

        if !self.in_flight.insert(file_id.clone()) {
            tracing::debug!("Placement of {} already in flight", file_id);
            return PlacementOutcome::InFlight;
        }
        let _in_flight = InFlightGuard {
            set: &self.in_flight,
            file_id: file_id.clone(),
        };

        let outcome = self.try_place(request).await;
        match &outcome {
            PlacementOutcome::Placed { target } => {
                tracing::info!("Placed replica of {} on {}", file_id, target)
            }
            PlacementOutcome::Rejected { target, space_left } => tracing::info!(
                "Placement of {} aborted: {} has only {} bytes left",
                file_id,
                target,
                space_left
            ),
            PlacementOutcome::Failed { target, reason } => {
                tracing::warn!("Placement of {} on {} failed: {}", file_id, target, reason)
            }
            other => tracing::debug!("Placement of {} skipped: {:?}", file_id, other),
        }
        outcome
    }

    async fn try_place(&self, request: &PlacementRequest) -> PlacementOutcome {
        let file_id = &request.file_id;

        if !self.metadata.is_held_locally(file_id) {
            return PlacementOutcome::NotLocal;
        }

        let peers = self.metadata.list_peers();
        let Some(target) = select_target(&request.requesters, &peers) else {
            return PlacementOutcome::NoCandidate;
        };

        if self.metadata.holders_of(file_id).contains(&target) {
            return PlacementOutcome::AlreadyHeld { target };
        }

        let size = match self.blobs.size_of(file_id).await {
            Ok(Some(size)) => size,
            Ok(None) => return PlacementOutcome::NotLocal,
            Err(e) => {
                return PlacementOutcome::Failed {
                    target,
                    reason: e.to_string(),
                };
            }
        };

        let capacity = match self.peers.query_capacity(&target, size).await {
            Ok(capacity) => capacity,
            Err(e) => {
                return PlacementOutcome::Failed {
                    target,
                    reason: e.to_string(),
                };
            }
        };
        if !capacity.accepted {
            return PlacementOutcome::Rejected {
                target,
                space_left: capacity.space_left,
            };
        }

        match self
            .clone_to(
                file_id,
                &target,
                RequestType::DistributedReplicate,
                &request.triggered_by,
                Some(&request.correlation_id),
            )
            .await
        {
            Ok(_) => PlacementOutcome::Placed { target },
            Err(e) => PlacementOutcome::Failed {
                target,
                reason: e.to_string(),
            },
        }
    }

    /// Sends the local copy of `file_id` to `destination` and, once the
    /// destination acknowledges it, records the destination as a holder.
    /// Local state is never touched here. Returns the number of bytes sent.
    pub async fn clone_to(
        &self,
        file_id: &FileId,
        destination: &str,
        request_type: RequestType,
        requester: &str,
        correlation_id: Option<&str>,
    ) -> Result<u64, NodeError> {
        if destination == self.config.address {
            return Err(NodeError::InvalidRequest(
                "destination is this node".to_string(),
            ));
        }

        let bytes = self
            .blobs
            .get(file_id)
            .await?
            .ok_or_else(|| NodeError::NotFound(file_id.to_string()))?;
        let size = bytes.len() as u64;

        let result = self
            .peers
            .clone_file(destination, file_id, bytes, &self.config.address)
            .await;

        let status = match &result {
            Ok(status) => *status,
            Err(_) => UNREACHABLE_STATUS,
        };
        let mut record = AccessRecord::now(
            file_id.as_str(),
            requester,
            self.config.address.as_str(),
            request_type,
            status,
            size as i64,
        );
        if let Some(correlation_id) = correlation_id {
            record = record.with_correlation(correlation_id);
        }
        self.access_log.record(record).await;

        let status = result?;
        if status != CREATED_STATUS {
            return Err(NodeError::PeerRejected {
                peer: destination.to_string(),
                status,
            });
        }

        self.metadata
            .record_holder(file_id, destination, size as i64)
            .await?;
        Ok(size)
    }
}

struct InFlightGuard<'a> {
    set: &'a DashSet<FileId>,
    file_id: FileId,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.set.remove(&self.file_id);
    }
}
