//! Storage Module Tests
//!
//! Validates the on-disk blob store.
//!
//! ## Test Scopes
//! - **Put/Get**: bytes round-trip, overwrite, missing ids.
//! - **Removal**: idempotent delete.
//! - **Accounting**: sizes and total used bytes.
//! - **Id hygiene**: ids that could escape the upload directory are refused.

#[cfg(test)]
mod tests {
    use crate::metadata::types::FileId;
    use crate::storage::blobs::BlobStore;

    use std::io;

    fn store() -> (tempfile::TempDir, BlobStore) {
        let dir = tempfile::tempdir().unwrap();
        let blobs = BlobStore::new(dir.path().join("uploaded")).unwrap();
        (dir, blobs)
    }

    // ============================================================
    // PUT / GET TESTS
    // ============================================================

    #[tokio::test]
    async fn test_put_then_get() {
        let (_dir, blobs) = store();
        let id = FileId::new();

        let written = blobs.put(&id, b"some bytes").await.unwrap();
        assert_eq!(written, 10);
        assert!(blobs.contains(&id).await);
        assert_eq!(blobs.get(&id).await.unwrap(), Some(b"some bytes".to_vec()));
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let (_dir, blobs) = store();
        let id = FileId::new();

        blobs.put(&id, b"first version").await.unwrap();
        blobs.put(&id, b"second").await.unwrap();

        assert_eq!(blobs.get(&id).await.unwrap(), Some(b"second".to_vec()));
        assert_eq!(blobs.size_of(&id).await.unwrap(), Some(6));
    }

    #[tokio::test]
    async fn test_missing_file() {
        let (_dir, blobs) = store();
        let id = FileId::new();

        assert!(!blobs.contains(&id).await);
        assert_eq!(blobs.get(&id).await.unwrap(), None);
        assert_eq!(blobs.size_of(&id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_no_partial_file_left_behind() {
        let (_dir, blobs) = store();
        let id = FileId::new();
        blobs.put(&id, b"complete").await.unwrap();

        let names: Vec<String> = std::fs::read_dir(blobs.root())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec![id.to_string()]);
    }

    // ============================================================
    // REMOVAL TESTS
    // ============================================================

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let (_dir, blobs) = store();
        let id = FileId::new();
        blobs.put(&id, b"bye").await.unwrap();

        assert!(blobs.remove(&id).await.unwrap());
        assert!(!blobs.remove(&id).await.unwrap());
        assert!(!blobs.contains(&id).await);
    }

    // ============================================================
    // ACCOUNTING TESTS
    // ============================================================

    #[tokio::test]
    async fn test_used_bytes_sums_all_files() {
        let (_dir, blobs) = store();
        assert_eq!(blobs.used_bytes().await.unwrap(), 0);

        blobs.put(&FileId::new(), &[0u8; 100]).await.unwrap();
        let second = FileId::new();
        blobs.put(&second, &[0u8; 23]).await.unwrap();
        assert_eq!(blobs.used_bytes().await.unwrap(), 123);

        blobs.remove(&second).await.unwrap();
        assert_eq!(blobs.used_bytes().await.unwrap(), 100);
    }

    // ============================================================
    // ID HYGIENE TESTS
    // ============================================================

    #[tokio::test]
    async fn test_path_like_ids_are_refused() {
        let (_dir, blobs) = store();

        for raw in ["../outside", "a/b", "", ".."] {
            let id = FileId::from(raw);
            let err = blobs.put(&id, b"x").await.unwrap_err();
            assert_eq!(err.kind(), io::ErrorKind::InvalidInput, "id {:?}", raw);
            assert_eq!(blobs.get(&id).await.unwrap(), None);
            assert!(!blobs.contains(&id).await);
            assert!(!blobs.remove(&id).await.unwrap());
        }
        assert_eq!(blobs.used_bytes().await.unwrap(), 0);
    }
}
