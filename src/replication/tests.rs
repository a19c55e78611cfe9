//! Replication Module Tests
//!
//! ## Test Scopes
//! - **Target selection**: vote tally and deterministic tie-break.
//! - **Placement**: capacity gate, skip conditions, holder recording, access log.
//!
//! Peers are scripted with an in-memory `PeerClient` that records every call.

#[cfg(test)]
mod tests {
    use crate::access_log::writer::AccessLog;
    use crate::config::NodeConfig;
    use crate::error::PeerError;
    use crate::metadata::store::MetadataStore;
    use crate::metadata::types::{FileId, PeerOrder, UNKNOWN_DISTANCE};
    use crate::peer::client::{CapacityAnswer, PeerClient};
    use crate::replication::controller::{
        PlacementOutcome, PlacementRequest, ReplicationController, select_target,
    };
    use crate::storage::blobs::BlobStore;

    use async_trait::async_trait;
    use dashmap::DashMap;
    use parking_lot::Mutex;
    use std::sync::Arc;

    const SELF_ADDR: &str = "10.0.0.1:5000";
    const PEER_B: &str = "10.0.0.2:5000";
    const PEER_C: &str = "10.1.0.2:5000";

    /// Scripted peers: fixed space left per peer, clone status per peer.
    #[derive(Default)]
    struct ScriptedPeers {
        space_left: DashMap<String, i64>,
        clone_status: DashMap<String, u16>,
        capacity_calls: Mutex<Vec<String>>,
        clone_calls: Mutex<Vec<(String, FileId, usize)>>,
    }

    #[async_trait]
    impl PeerClient for ScriptedPeers {
        async fn file_exists(&self, _peer: &str, _file_id: &FileId) -> Result<bool, PeerError> {
            Ok(false)
        }

        async fn clone_file(
            &self,
            peer: &str,
            file_id: &FileId,
            bytes: Vec<u8>,
            _origin: &str,
        ) -> Result<u16, PeerError> {
            self.clone_calls
                .lock()
                .push((peer.to_string(), file_id.clone(), bytes.len()));
            Ok(self.clone_status.get(peer).map(|s| *s).unwrap_or(201))
        }

        async fn query_capacity(&self, peer: &str, file_size: u64) -> Result<CapacityAnswer, PeerError> {
            self.capacity_calls.lock().push(peer.to_string());
            match self.space_left.get(peer) {
                Some(space_left) => Ok(CapacityAnswer {
                    space_left: *space_left,
                    accepted: (file_size as i64) < *space_left,
                }),
                None => Err(PeerError::Unreachable {
                    peer: peer.to_string(),
                    reason: "scripted".to_string(),
                }),
            }
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        metadata: Arc<MetadataStore>,
        blobs: Arc<BlobStore>,
        access_log: Arc<AccessLog>,
        peers: Arc<ScriptedPeers>,
        controller: Arc<ReplicationController>,
    }

    async fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let config = Arc::new(NodeConfig::new(SELF_ADDR, dir.path()).with_replication(2));
        let metadata = Arc::new(MetadataStore::new(SELF_ADDR, PeerOrder::Registration));
        let blobs = Arc::new(BlobStore::new(config.upload_dir()).unwrap());
        let access_log = Arc::new(AccessLog::new(config.log_dir()).unwrap());
        let peers = Arc::new(ScriptedPeers::default());

        metadata.register_peer(PEER_B, UNKNOWN_DISTANCE).await.unwrap();
        metadata.register_peer(PEER_C, UNKNOWN_DISTANCE).await.unwrap();

        let controller = Arc::new(ReplicationController::new(
            config,
            metadata.clone(),
            blobs.clone(),
            peers.clone(),
            access_log.clone(),
        ));

        Fixture {
            _dir: dir,
            metadata,
            blobs,
            access_log,
            peers,
            controller,
        }
    }

    async fn store_local(fx: &Fixture, bytes: &[u8]) -> FileId {
        let id = FileId::new();
        fx.blobs.put(&id, bytes).await.unwrap();
        fx.metadata
            .record_holder(&id, SELF_ADDR, bytes.len() as i64)
            .await
            .unwrap();
        id
    }

    fn request(file_id: &FileId, requesters: &[&str]) -> PlacementRequest {
        PlacementRequest {
            file_id: file_id.clone(),
            triggered_by: requesters.last().unwrap_or(&"null").to_string(),
            requesters: requesters.iter().map(|r| r.to_string()).collect(),
            correlation_id: "corr-1".to_string(),
        }
    }

    fn peers() -> Vec<String> {
        vec![PEER_B.to_string(), PEER_C.to_string()]
    }

    // ============================================================
    // TARGET SELECTION TESTS
    // ============================================================

    #[test]
    fn test_majority_vote_picks_b() {
        // Nearest peers: B, B, C.
        let requesters = vec![
            "10.0.0.7".to_string(),
            "10.0.0.9".to_string(),
            "10.1.0.8".to_string(),
        ];
        assert_eq!(select_target(&requesters, &peers()), Some(PEER_B.to_string()));
    }

    #[test]
    fn test_tie_goes_to_first_in_peer_order() {
        let requesters = vec!["10.1.0.8".to_string(), "10.0.0.7".to_string()];
        assert_eq!(select_target(&requesters, &peers()), Some(PEER_B.to_string()));

        let reversed = vec![PEER_C.to_string(), PEER_B.to_string()];
        assert_eq!(select_target(&requesters, &reversed), Some(PEER_C.to_string()));
    }

    #[test]
    fn test_no_peers_or_no_requesters() {
        assert_eq!(select_target(&["10.0.0.7".to_string()], &[]), None);
        assert_eq!(select_target(&[], &peers()), None);
    }

    #[tokio::test]
    async fn test_should_place_threshold() {
        let fx = fixture().await;
        assert!(!fx.controller.should_place(1));
        assert!(fx.controller.should_place(2));
        assert!(fx.controller.should_place(3));
    }

    // ============================================================
    // PLACEMENT TESTS
    // ============================================================

    #[tokio::test]
    async fn test_placement_clones_to_voted_peer_and_records_holder() {
        let fx = fixture().await;
        fx.peers.space_left.insert(PEER_B.to_string(), 1_000);
        let id = store_local(&fx, b"hot bytes").await;

        let outcome = fx
            .controller
            .place(&request(&id, &["10.0.0.7", "10.0.0.9"]))
            .await;

        assert_eq!(
            outcome,
            PlacementOutcome::Placed {
                target: PEER_B.to_string()
            }
        );
        assert_eq!(fx.peers.clone_calls.lock().len(), 1);
        assert_eq!(
            fx.metadata.holders_of(&id),
            vec![SELF_ADDR.to_string(), PEER_B.to_string()]
        );
        // Additive: our copy stays.
        assert!(fx.metadata.is_held_locally(&id));
        assert!(fx.blobs.contains(&id).await);

        let log = String::from_utf8(fx.access_log.fetch(None).await.unwrap().unwrap()).unwrap();
        let fields: Vec<&str> = log.lines().next().unwrap().split('\t').collect();
        assert_eq!(fields[3], "DISTRIBUTED_REPLICATE");
        assert_eq!(fields[4], "201");
        assert_eq!(fields[7], "corr-1");
    }

    #[tokio::test]
    async fn test_capacity_rejection_aborts_without_clone() {
        let fx = fixture().await;
        let id = store_local(&fx, &[7u8; 64]).await;
        // Exactly the file size is not enough.
        fx.peers.space_left.insert(PEER_B.to_string(), 64);
        fx.peers.space_left.insert(PEER_C.to_string(), 1_000_000);

        let outcome = fx
            .controller
            .place(&request(&id, &["10.0.0.7", "10.0.0.9"]))
            .await;

        assert_eq!(
            outcome,
            PlacementOutcome::Rejected {
                target: PEER_B.to_string(),
                space_left: 64
            }
        );
        // No fallback to C.
        assert_eq!(*fx.peers.capacity_calls.lock(), vec![PEER_B.to_string()]);
        assert!(fx.peers.clone_calls.lock().is_empty());
        assert_eq!(fx.metadata.holders_of(&id), vec![SELF_ADDR.to_string()]);
    }

    #[tokio::test]
    async fn test_unreachable_target_fails_quietly() {
        let fx = fixture().await;
        let id = store_local(&fx, b"data").await;

        let outcome = fx.controller.place(&request(&id, &["10.0.0.7"])).await;

        assert!(matches!(outcome, PlacementOutcome::Failed { .. }));
        assert_eq!(fx.metadata.holders_of(&id), vec![SELF_ADDR.to_string()]);
    }

    #[tokio::test]
    async fn test_refused_clone_does_not_record_holder() {
        let fx = fixture().await;
        fx.peers.space_left.insert(PEER_B.to_string(), 1_000);
        fx.peers.clone_status.insert(PEER_B.to_string(), 500);
        let id = store_local(&fx, b"data").await;

        let outcome = fx.controller.place(&request(&id, &["10.0.0.7"])).await;

        assert!(matches!(outcome, PlacementOutcome::Failed { .. }));
        assert!(!fx.metadata.holders_of(&id).contains(&PEER_B.to_string()));
    }

    #[tokio::test]
    async fn test_skips_when_target_already_holds() {
        let fx = fixture().await;
        fx.peers.space_left.insert(PEER_B.to_string(), 1_000);
        let id = store_local(&fx, b"data").await;
        fx.metadata.record_holder(&id, PEER_B, 4).await.unwrap();

        let outcome = fx.controller.place(&request(&id, &["10.0.0.7"])).await;

        assert_eq!(
            outcome,
            PlacementOutcome::AlreadyHeld {
                target: PEER_B.to_string()
            }
        );
        assert!(fx.peers.capacity_calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_skips_when_not_held_locally() {
        let fx = fixture().await;
        let id = FileId::new();

        let outcome = fx.controller.place(&request(&id, &["10.0.0.7"])).await;
        assert_eq!(outcome, PlacementOutcome::NotLocal);
    }

    #[tokio::test]
    async fn test_spawned_placement_reports_outcome() {
        let fx = fixture().await;
        fx.peers.space_left.insert(PEER_C.to_string(), 1_000);
        let id = store_local(&fx, b"data").await;

        let handle = fx
            .controller
            .spawn_placement(request(&id, &["10.1.0.8", "10.1.0.9"]));

        assert_eq!(
            handle.await.unwrap(),
            PlacementOutcome::Placed {
                target: PEER_C.to_string()
            }
        );
    }
}
