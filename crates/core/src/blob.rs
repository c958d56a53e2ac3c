//! Filesystem blob store.
//!
//! Every blob is a `{id}.bin` data file plus a `{id}.meta.json` sidecar.
//! Writes and reads move one chunk at a time, so memory use does not grow
//! with the file size.

use crate::error::{ChatError, Result};
use crate::models::BlobInfo;
use crate::traits::{BlobReader, BlobStore, ByteStream};
use async_trait::async_trait;
use chrono::Utc;
use futures_util::{StreamExt, TryStreamExt};
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};
use uuid::Uuid;

pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .await
            .map_err(|error| storage_error(&root, error))?;
        Ok(Self { root })
    }

    fn data_path(&self, id: &Uuid) -> PathBuf {
        self.root.join(format!("{id}.bin"))
    }

    fn meta_path(&self, id: &Uuid) -> PathBuf {
        self.root.join(format!("{id}.meta.json"))
    }

    async fn write_body(&self, path: &Path, mut body: ByteStream<'_>) -> Result<(u64, String)> {
        let mut file = File::create(path)
            .await
            .map_err(|error| storage_error(path, error))?;
        let mut hasher = Sha256::new();
        let mut size = 0u64;

        while let Some(chunk) = body
            .try_next()
            .await
            .map_err(|error| ChatError::Storage(format!("upload stream failed: {error}")))?
        {
            hasher.update(&chunk);
            size += chunk.len() as u64;
            file.write_all(&chunk)
                .await
                .map_err(|error| storage_error(path, error))?;
        }

        file.flush().await.map_err(|error| storage_error(path, error))?;
        Ok((size, format!("{:x}", hasher.finalize())))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put_stream(
        &self,
        file_name: &str,
        content_type: &str,
        body: ByteStream<'_>,
    ) -> Result<BlobInfo> {
        let id = Uuid::new_v4();
        let data_path = self.data_path(&id);

        let (size, checksum) = match self.write_body(&data_path, body).await {
            Ok(written) => written,
            Err(error) => {
                remove_if_present(&data_path).await;
                return Err(error);
            }
        };

        let info = BlobInfo {
            id: id.to_string(),
            file_name: file_name.to_string(),
            content_type: content_type.to_string(),
            size,
            checksum,
            created_at: Utc::now(),
        };

        let meta_path = self.meta_path(&id);
        if let Err(error) = fs::write(&meta_path, serde_json::to_vec_pretty(&info)?).await {
            remove_if_present(&data_path).await;
            return Err(storage_error(&meta_path, error));
        }

        debug!(blob_id = %info.id, size = info.size, "blob stored");
        Ok(info)
    }

    async fn info(&self, blob_id: &str) -> Result<BlobInfo> {
        let id = parse_blob_id(blob_id)?;
        let meta_path = self.meta_path(&id);
        let raw = fs::read(&meta_path).await.map_err(|error| {
            if error.kind() == ErrorKind::NotFound {
                ChatError::NotFound(format!("blob {blob_id}"))
            } else {
                storage_error(&meta_path, error)
            }
        })?;
        Ok(serde_json::from_slice(&raw)?)
    }

    async fn open_read(&self, blob_id: &str) -> Result<BlobReader> {
        let info = self.info(blob_id).await?;
        let data_path = self.data_path(&parse_blob_id(blob_id)?);
        let file = File::open(&data_path).await.map_err(|error| {
            if error.kind() == ErrorKind::NotFound {
                ChatError::NotFound(format!("blob {blob_id}"))
            } else {
                storage_error(&data_path, error)
            }
        })?;

        Ok(BlobReader {
            info,
            body: ReaderStream::new(file).boxed(),
        })
    }

    async fn delete(&self, blob_id: &str) -> Result<()> {
        let id = parse_blob_id(blob_id)?;
        for path in [self.data_path(&id), self.meta_path(&id)] {
            match fs::remove_file(&path).await {
                Ok(()) => {}
                Err(error) if error.kind() == ErrorKind::NotFound => {}
                Err(error) => return Err(storage_error(&path, error)),
            }
        }
        Ok(())
    }
}

/// Blob ids are UUIDs; anything else cannot name a stored blob.
fn parse_blob_id(blob_id: &str) -> Result<Uuid> {
    Uuid::parse_str(blob_id)
        .map_err(|_| ChatError::Validation(format!("invalid blob id: {blob_id}")))
}

fn storage_error(path: &Path, error: std::io::Error) -> ChatError {
    ChatError::Storage(format!("{}: {error}", path.display()))
}

async fn remove_if_present(path: &Path) {
    if let Err(error) = fs::remove_file(path).await {
        if error.kind() != ErrorKind::NotFound {
            warn!(path = %path.display(), %error, "failed to remove partial blob");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use futures_util::stream;
    use tempfile::tempdir;

    fn body(parts: &[&str]) -> ByteStream<'static> {
        stream::iter(
            parts
                .iter()
                .map(|part| Ok(Bytes::copy_from_slice(part.as_bytes())))
                .collect::<Vec<_>>(),
        )
        .boxed()
    }

    #[tokio::test]
    async fn streamed_blob_round_trips_with_metadata() -> Result<()> {
        let dir = tempdir().map_err(|error| ChatError::Storage(error.to_string()))?;
        let store = LocalBlobStore::open(dir.path()).await?;

        let info = store
            .put_stream("invoice.pdf", "application/pdf", body(&["%PDF-", "1.4 body"]))
            .await?;
        assert_eq!(info.size, 13);
        assert_eq!(info.content_type, "application/pdf");

        let stored = store.info(&info.id).await?;
        assert_eq!(stored, info);
        assert_eq!(store.read_all(&info.id).await?, b"%PDF-1.4 body".to_vec());
        Ok(())
    }

    #[tokio::test]
    async fn checksum_is_reproducible() -> Result<()> {
        let dir = tempdir().map_err(|error| ChatError::Storage(error.to_string()))?;
        let store = LocalBlobStore::open(dir.path()).await?;

        let first = store.put_stream("a.pdf", "application/pdf", body(&["abc"])).await?;
        let second = store.put_stream("b.pdf", "application/pdf", body(&["a", "bc"])).await?;
        assert_ne!(first.id, second.id);
        assert_eq!(first.checksum, second.checksum);
        Ok(())
    }

    #[tokio::test]
    async fn unknown_blob_is_not_found() -> Result<()> {
        let dir = tempdir().map_err(|error| ChatError::Storage(error.to_string()))?;
        let store = LocalBlobStore::open(dir.path()).await?;

        let missing = Uuid::new_v4().to_string();
        assert!(matches!(store.open_read(&missing).await, Err(ChatError::NotFound(_))));
        assert!(matches!(store.open_read("../etc/passwd").await, Err(ChatError::Validation(_))));
        Ok(())
    }

    #[tokio::test]
    async fn failed_stream_leaves_nothing_behind() -> Result<()> {
        let dir = tempdir().map_err(|error| ChatError::Storage(error.to_string()))?;
        let store = LocalBlobStore::open(dir.path()).await?;

        let failing = stream::iter(vec![
            Ok(Bytes::from_static(b"partial")),
            Err(std::io::Error::other("client went away")),
        ])
        .boxed();
        assert!(store.put_stream("a.pdf", "application/pdf", failing).await.is_err());

        let leftovers = std::fs::read_dir(dir.path())
            .map_err(|error| ChatError::Storage(error.to_string()))?
            .count();
        assert_eq!(leftovers, 0);
        Ok(())
    }

    #[tokio::test]
    async fn delete_removes_blob_and_is_idempotent() -> Result<()> {
        let dir = tempdir().map_err(|error| ChatError::Storage(error.to_string()))?;
        let store = LocalBlobStore::open(dir.path()).await?;

        let info = store.put_stream("a.pdf", "application/pdf", body(&["abc"])).await?;
        store.delete(&info.id).await?;
        store.delete(&info.id).await?;
        assert!(matches!(store.info(&info.id).await, Err(ChatError::NotFound(_))));
        Ok(())
    }
}
