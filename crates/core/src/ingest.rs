//! Upload finalisation and bulk folder import.

use crate::error::{ChatError, IngestError, Result};
use crate::models::{BlobInfo, DocumentRecord, NewDocument};
use crate::traits::{BlobStore, MetadataStore};
use chrono::Utc;
use futures_util::StreamExt;
use serde_json::{json, Map};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio_util::io::ReaderStream;
use tracing::{info, warn};
use walkdir::WalkDir;

pub const PDF_CONTENT_TYPE: &str = "application/pdf";

pub fn discover_pdf_files(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let is_pdf = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

        if is_pdf {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

/// Turns a stored blob into a document record. The blob is removed again
/// when it is empty or the record cannot be created, so no orphan is left.
pub async fn finalize_upload(
    blobs: &dyn BlobStore,
    metadata: &dyn MetadataStore,
    blob: BlobInfo,
    external_id: &str,
    owner_id: &str,
) -> Result<DocumentRecord> {
    if blob.size == 0 {
        discard_blob(blobs, &blob.id).await;
        return Err(ChatError::Validation("Empty file".to_string()));
    }

    let mut extra = Map::new();
    extra.insert("originalName".to_string(), json!(blob.file_name));
    extra.insert("uploadDate".to_string(), json!(Utc::now().to_rfc3339()));
    extra.insert("checksum".to_string(), json!(blob.checksum));

    let created = metadata
        .create_document(NewDocument {
            external_id: external_id.to_string(),
            owner_id: owner_id.to_string(),
            file_name: blob.file_name.clone(),
            file_size: blob.size,
            mime_type: blob.content_type.clone(),
            blob_id: blob.id.clone(),
            metadata: extra,
        })
        .await;

    match created {
        Ok(record) => {
            info!(
                document_id = %record.id,
                external_id,
                owner_id,
                size = record.file_size,
                "upload stored"
            );
            Ok(record)
        }
        Err(error) => {
            discard_blob(blobs, &blob.id).await;
            Err(error)
        }
    }
}

pub struct SkippedPdf {
    pub path: PathBuf,
    pub reason: String,
}

pub struct ImportReport {
    pub imported: Vec<DocumentRecord>,
    pub skipped: Vec<SkippedPdf>,
}

/// Uploads every PDF under `folder` for `owner_id`. Files that fail, or
/// were already imported, are reported as skipped instead of aborting.
pub async fn import_folder(
    folder: &Path,
    owner_id: &str,
    blobs: &dyn BlobStore,
    metadata: &dyn MetadataStore,
) -> Result<ImportReport> {
    let files = discover_pdf_files(folder);

    if files.is_empty() {
        return Err(IngestError::InvalidArgument(format!(
            "no pdf files found in {}",
            folder.display()
        ))
        .into());
    }

    let mut imported = Vec::new();
    let mut skipped = Vec::new();

    for path in files {
        match import_file(&path, owner_id, blobs, metadata).await {
            Ok(record) => imported.push(record),
            Err(error) => {
                warn!(path = %path.display(), %error, "skipping pdf");
                skipped.push(SkippedPdf {
                    path,
                    reason: error.to_string(),
                });
            }
        }
    }

    Ok(ImportReport { imported, skipped })
}

async fn import_file(
    path: &Path,
    owner_id: &str,
    blobs: &dyn BlobStore,
    metadata: &dyn MetadataStore,
) -> Result<DocumentRecord> {
    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| {
            IngestError::MissingFileName(format!("path missing filename: {}", path.display()))
        })?;

    let external_id = generate_external_id(path);
    if metadata.find_document(&external_id, owner_id).await?.is_some() {
        return Err(ChatError::Validation(format!(
            "{} was already imported",
            path.display()
        )));
    }

    let file = File::open(path).await.map_err(IngestError::from)?;
    let blob = blobs
        .put_stream(name, PDF_CONTENT_TYPE, ReaderStream::new(file).boxed())
        .await?;
    finalize_upload(blobs, metadata, blob, &external_id, owner_id).await
}

fn generate_external_id(path: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.to_string_lossy().as_bytes());
    format!("{:x}", hasher.finalize())
}

async fn discard_blob(blobs: &dyn BlobStore, blob_id: &str) {
    if let Err(error) = blobs.delete(blob_id).await {
        warn!(blob_id, %error, "failed to remove orphaned blob");
    }
}
