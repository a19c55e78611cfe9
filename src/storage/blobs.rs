//! Local file bytes.
//!
//! One file per `FileId` under the upload directory. Writes go through a temp
//! file and a rename so a crashed write never leaves a truncated blob behind.

use crate::metadata::types::FileId;

use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;

const TMP_SUFFIX: &str = ".partial";

pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    pub fn new(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, file_id: &FileId) -> Option<PathBuf> {
        file_id
            .is_valid()
            .then(|| self.root.join(file_id.as_str()))
    }

    /// Stores `bytes` under `file_id`, replacing any previous copy.
    /// Returns the number of bytes written.
    pub async fn put(&self, file_id: &FileId, bytes: &[u8]) -> io::Result<u64> {
        let path = self.path_for(file_id).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid file id {:?}", file_id.as_str()),
            )
        })?;

        let tmp = self
            .root
            .join(format!("{}{}", file_id.as_str(), TMP_SUFFIX));
        fs::write(&tmp, bytes).await?;
        fs::rename(&tmp, &path).await?;
        Ok(bytes.len() as u64)
    }

    pub async fn get(&self, file_id: &FileId) -> io::Result<Option<Vec<u8>>> {
        let Some(path) = self.path_for(file_id) else {
            return Ok(None);
        };
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn contains(&self, file_id: &FileId) -> bool {
        match self.path_for(file_id) {
            Some(path) => fs::metadata(&path)
                .await
                .map(|m| m.is_file())
                .unwrap_or(false),
            None => false,
        }
    }

    pub async fn size_of(&self, file_id: &FileId) -> io::Result<Option<u64>> {
        let Some(path) = self.path_for(file_id) else {
            return Ok(None);
        };
        match fs::metadata(&path).await {
            Ok(meta) => Ok(Some(meta.len())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Deletes the local copy. Returns whether there was one.
    pub async fn remove(&self, file_id: &FileId) -> io::Result<bool> {
        let Some(path) = self.path_for(file_id) else {
            return Ok(false);
        };
        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Total bytes held in the upload directory, partial writes included.
    pub async fn used_bytes(&self) -> io::Result<u64> {
        let mut total = 0u64;
        let mut entries = fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let meta = entry.metadata().await?;
            if meta.is_file() {
                total += meta.len();
            }
        }
        Ok(total)
    }
}
