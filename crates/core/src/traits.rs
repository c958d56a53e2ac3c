use crate::error::{ChatError, Result};
use crate::models::{
    BlobInfo, ChatMessage, DocumentRecord, DocumentStatus, IngestionState, NewDocument,
    RetrievedChunk, VectorRecord,
};
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::TryStreamExt;
use serde_json::{Map, Value};
use std::collections::HashMap;

pub type ByteStream<'a> = BoxStream<'a, std::io::Result<Bytes>>;

pub struct BlobReader {
    pub info: BlobInfo,
    pub body: ByteStream<'static>,
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Writes `body` chunk by chunk; the id is assigned by the store.
    async fn put_stream(
        &self,
        file_name: &str,
        content_type: &str,
        body: ByteStream<'_>,
    ) -> Result<BlobInfo>;

    async fn info(&self, blob_id: &str) -> Result<BlobInfo>;

    /// Fails with [`ChatError::NotFound`] when the blob was never written.
    async fn open_read(&self, blob_id: &str) -> Result<BlobReader>;

    async fn delete(&self, blob_id: &str) -> Result<()>;

    async fn read_all(&self, blob_id: &str) -> Result<Vec<u8>> {
        let reader = self.open_read(blob_id).await?;
        let mut bytes = Vec::with_capacity(reader.info.size as usize);
        let mut body = reader.body;
        while let Some(chunk) = body
            .try_next()
            .await
            .map_err(|error| ChatError::Storage(format!("reading blob {blob_id}: {error}")))?
        {
            bytes.extend_from_slice(&chunk);
        }
        Ok(bytes)
    }
}

#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Fails with [`ChatError::Validation`] when the owner already has a
    /// document with the same external id.
    async fn create_document(&self, document: NewDocument) -> Result<DocumentRecord>;

    async fn get_document(&self, id: &str) -> Result<Option<DocumentRecord>>;

    async fn find_document(
        &self,
        external_id: &str,
        owner_id: &str,
    ) -> Result<Option<DocumentRecord>>;

    /// Newest upload first.
    async fn list_documents(&self, owner_id: &str) -> Result<Vec<DocumentRecord>>;

    async fn set_status(
        &self,
        id: &str,
        status: DocumentStatus,
        ingestion: IngestionState,
    ) -> Result<()>;

    /// Shallow-merges `patch` into the record's metadata map.
    async fn merge_metadata(&self, id: &str, patch: Map<String, Value>) -> Result<()>;

    async fn delete_document(&self, id: &str) -> Result<()>;

    async fn append_chat_message(&self, message: &ChatMessage) -> Result<()>;

    /// Oldest message first.
    async fn list_chat_messages(
        &self,
        document_id: &str,
        owner_id: &str,
    ) -> Result<Vec<ChatMessage>>;
}

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Vector count per namespace across the whole index.
    async fn namespace_stats(&self) -> Result<HashMap<String, u64>>;

    async fn upsert(&self, namespace: &str, records: &[VectorRecord]) -> Result<()>;

    async fn query(
        &self,
        namespace: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<RetrievedChunk>>;

    /// Deleting a namespace that does not exist is not an error.
    async fn delete_namespace(&self, namespace: &str) -> Result<()>;
}
