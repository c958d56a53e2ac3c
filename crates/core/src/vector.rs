//! Per-document vector namespaces.
//!
//! Every document gets its own namespace, named after the document id, so
//! retrieval for one document never sees another document's chunks.

use crate::embeddings::Embedder;
use crate::error::{ChatError, Result};
use crate::models::{RetrievedChunk, TextChunk, VectorRecord};
use crate::traits::VectorIndex;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct VectorStoreAdapter {
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn Embedder>,
}

impl VectorStoreAdapter {
    pub fn new(index: Arc<dyn VectorIndex>, embedder: Arc<dyn Embedder>) -> Self {
        Self { index, embedder }
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    /// An unreachable index reads as "no namespace" so the caller
    /// regenerates instead of failing outright.
    pub async fn namespace_exists(&self, document_id: &str) -> bool {
        match self.index.namespace_stats().await {
            Ok(stats) => stats.contains_key(document_id),
            Err(error) => {
                warn!(document_id, %error, "namespace lookup failed");
                false
            }
        }
    }

    pub async fn upsert_chunks(
        &self,
        document_id: &str,
        chunks: &[TextChunk],
        embeddings: &[Vec<f32>],
    ) -> Result<usize> {
        if chunks.len() != embeddings.len() {
            return Err(ChatError::EmbeddingService(format!(
                "embedding count {} doesn't match chunk count {}",
                embeddings.len(),
                chunks.len()
            )));
        }

        // Dimensions are checked once at startup by `probe_dimensions`.
        let records = chunks
            .iter()
            .zip(embeddings)
            .map(|(chunk, values)| VectorRecord {
                id: chunk.chunk_id.clone(),
                values: values.clone(),
                text: chunk.content.clone(),
                metadata: chunk.metadata.clone(),
            })
            .collect::<Vec<_>>();

        if records.is_empty() {
            return Ok(0);
        }

        self.index.upsert(document_id, &records).await?;
        debug!(document_id, vectors = records.len(), "chunks upserted");
        Ok(records.len())
    }

    pub async fn retrieve_top_k(
        &self,
        document_id: &str,
        query_text: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievedChunk>> {
        let query_vector = self.embedder.embed(query_text).await?;
        let chunks = self.index.query(document_id, &query_vector, top_k).await?;
        debug!(document_id, hits = chunks.len(), "retrieval complete");
        Ok(chunks)
    }

    pub async fn clear_namespace(&self, document_id: &str) -> Result<()> {
        self.index.delete_namespace(document_id).await
    }
}
