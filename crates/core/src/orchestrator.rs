//! Question answering over one uploaded document.
//!
//! Each question walks `EnsureEmbeddings -> Retrieve -> Prompt -> Done`.
//! An empty retrieval sends the walk back to `EnsureEmbeddings` with a
//! forced regeneration, at most once per question.

use crate::chunking::build_chunks;
use crate::config::ChatConfig;
use crate::embeddings::Embedder;
use crate::error::{ChatError, IngestError, Result};
use crate::extractor::PdfExtractor;
use crate::llm::ChatModel;
use crate::models::{
    Answer, ChatMessage, DocumentRecord, DocumentStatus, IngestionState, IngestionSummary,
    Question, RetrievedChunk,
};
use crate::prompt::{build_prompt, NOT_FOUND_SENTINEL};
use crate::traits::{BlobStore, MetadataStore, VectorIndex};
use crate::vector::VectorStoreAdapter;
use chrono::Utc;
use serde_json::{json, Map};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Backing services, injected so every handle can be swapped in tests.
#[derive(Clone)]
pub struct Services {
    pub blobs: Arc<dyn BlobStore>,
    pub metadata: Arc<dyn MetadataStore>,
    pub extractor: Arc<dyn PdfExtractor>,
    pub index: Arc<dyn VectorIndex>,
    pub embedder: Arc<dyn Embedder>,
    pub model: Arc<dyn ChatModel>,
}

enum Stage {
    EnsureEmbeddings { force: bool },
    Retrieve,
    Prompt(Vec<RetrievedChunk>),
    Done(Answer),
}

/// Per-document advisory locks. Only guards regeneration inside this
/// process; another process may still race on the same namespace.
#[derive(Default)]
struct IngestLocks {
    inner: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl IngestLocks {
    fn for_document(&self, document_id: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = match self.inner.lock() {
            Ok(locks) => locks,
            Err(poisoned) => poisoned.into_inner(),
        };
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        Arc::clone(locks.entry(document_id.to_string()).or_default())
    }
}

pub struct AnswerOrchestrator {
    blobs: Arc<dyn BlobStore>,
    metadata: Arc<dyn MetadataStore>,
    extractor: Arc<dyn PdfExtractor>,
    vectors: VectorStoreAdapter,
    model: Arc<dyn ChatModel>,
    config: ChatConfig,
    locks: IngestLocks,
}

impl AnswerOrchestrator {
    pub fn new(services: Services, config: ChatConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            blobs: services.blobs,
            metadata: services.metadata,
            extractor: services.extractor,
            vectors: VectorStoreAdapter::new(services.index, services.embedder),
            model: services.model,
            config,
            locks: IngestLocks::default(),
        })
    }

    pub fn blobs(&self) -> &Arc<dyn BlobStore> {
        &self.blobs
    }

    pub fn metadata(&self) -> &Arc<dyn MetadataStore> {
        &self.metadata
    }

    pub async fn find_document(&self, external_id: &str, owner_id: &str) -> Result<DocumentRecord> {
        self.metadata
            .find_document(external_id, owner_id)
            .await?
            .ok_or_else(|| ChatError::NotFound(format!("document {external_id}")))
    }

    pub async fn answer(&self, question: &Question) -> Result<Answer> {
        require_question(&question.text)?;
        let document = self
            .find_document(&question.external_id, &question.owner_id)
            .await?;
        self.answer_document(&document, &question.text).await
    }

    /// Like [`answer`](Self::answer), but a failing backing service turns
    /// into [`Answer::degraded`]. Unknown documents and empty questions are
    /// still returned as errors.
    pub async fn answer_or_fallback(&self, question: &Question) -> Result<Answer> {
        require_question(&question.text)?;
        match self
            .find_document(&question.external_id, &question.owner_id)
            .await
        {
            Ok(document) => {
                self.answer_document_or_fallback(&document, &question.text)
                    .await
            }
            Err(error) if error.is_service_failure() => {
                warn!(external_id = %question.external_id, %error, "document lookup failed, answering degraded");
                Ok(Answer::degraded())
            }
            Err(error) => Err(error),
        }
    }

    pub async fn answer_document(&self, document: &DocumentRecord, question: &str) -> Result<Answer> {
        require_question(question)?;
        let answer = self.run(document, question.trim()).await?;
        self.record_exchange(document, question, &answer).await;
        Ok(answer)
    }

    pub async fn answer_document_or_fallback(
        &self,
        document: &DocumentRecord,
        question: &str,
    ) -> Result<Answer> {
        require_question(question)?;
        match self.run(document, question.trim()).await {
            Ok(answer) => {
                self.record_exchange(document, question, &answer).await;
                Ok(answer)
            }
            Err(error) if error.is_service_failure() => {
                warn!(document_id = %document.id, %error, "answer failed, returning degraded response");
                let answer = Answer::degraded();
                self.record_exchange(document, question, &answer).await;
                Ok(answer)
            }
            Err(error) => Err(error),
        }
    }

    /// Makes sure the document has embeddings. Unless `force` is set, a
    /// document whose ingestion is complete and whose namespace exists is
    /// left as it is.
    pub async fn ingest(&self, document: &DocumentRecord, force: bool) -> Result<IngestionSummary> {
        let lock = self.locks.for_document(&document.id);
        let _guard = lock.lock().await;

        // Another request may have finished ingestion while we waited.
        let current = self.reload(&document.id).await?;
        if !force && self.embeddings_present(&current).await {
            debug!(document_id = %current.id, "embeddings present");
            return Ok(IngestionSummary::existing(&current));
        }

        self.generate_embeddings(&current).await
    }

    /// Removes the namespace, the blob and the record, in that order.
    pub async fn delete_document(&self, document: &DocumentRecord) -> Result<()> {
        let lock = self.locks.for_document(&document.id);
        let _guard = lock.lock().await;
        self.vectors.clear_namespace(&document.id).await?;
        self.blobs.delete(&document.blob_id).await?;
        self.metadata.delete_document(&document.id).await?;
        info!(document_id = %document.id, "document deleted");
        Ok(())
    }

    async fn run(&self, document: &DocumentRecord, question: &str) -> Result<Answer> {
        let mut stage = Stage::EnsureEmbeddings { force: false };
        let mut regenerated = false;

        loop {
            stage = match stage {
                Stage::EnsureEmbeddings { force } => {
                    self.ingest(document, force).await?;
                    Stage::Retrieve
                }
                Stage::Retrieve => {
                    let chunks = self
                        .vectors
                        .retrieve_top_k(&document.id, question, self.config.top_k)
                        .await?;
                    if !chunks.is_empty() {
                        Stage::Prompt(chunks)
                    } else if !regenerated {
                        info!(document_id = %document.id, "retrieval came back empty, regenerating embeddings");
                        regenerated = true;
                        Stage::EnsureEmbeddings { force: true }
                    } else {
                        warn!(document_id = %document.id, "retrieval still empty after regeneration");
                        Stage::Done(Answer {
                            answer_text: NOT_FOUND_SENTINEL.to_string(),
                            source_chunks: Vec::new(),
                            regenerated,
                            degraded: false,
                        })
                    }
                }
                Stage::Prompt(chunks) => {
                    let prompt = build_prompt(question, &chunks);
                    let answer_text = self.model.complete(&prompt).await?;
                    Stage::Done(Answer {
                        answer_text,
                        source_chunks: chunks,
                        regenerated,
                        degraded: false,
                    })
                }
                Stage::Done(answer) => return Ok(answer),
            };
        }
    }

    async fn embeddings_present(&self, document: &DocumentRecord) -> bool {
        if !document.embeddings_ready() {
            return false;
        }
        if self.vectors.namespace_exists(&document.id).await {
            return true;
        }
        warn!(document_id = %document.id, "ingestion marked complete but namespace is missing");
        false
    }

    async fn generate_embeddings(&self, document: &DocumentRecord) -> Result<IngestionSummary> {
        info!(document_id = %document.id, file_name = %document.file_name, "generating embeddings");
        self.metadata
            .set_status(&document.id, DocumentStatus::Processing, IngestionState::Pending)
            .await?;

        let chunk_count = match self.run_pipeline(document).await {
            Ok(count) => count,
            Err(error) => {
                warn!(document_id = %document.id, %error, "embedding generation failed");
                if let Err(status_error) = self
                    .metadata
                    .set_status(&document.id, DocumentStatus::Error, IngestionState::Failed)
                    .await
                {
                    warn!(document_id = %document.id, error = %status_error, "could not mark document as failed");
                }
                return Err(error);
            }
        };

        let generated_at = Utc::now();
        let mut flags = Map::new();
        flags.insert("embeddingsGenerated".to_string(), json!(true));
        flags.insert("embeddingsGeneratedAt".to_string(), json!(generated_at.to_rfc3339()));
        flags.insert("chunkCount".to_string(), json!(chunk_count));
        self.metadata.merge_metadata(&document.id, flags).await?;
        self.metadata
            .set_status(&document.id, DocumentStatus::Ready, IngestionState::Complete)
            .await?;

        info!(document_id = %document.id, chunk_count, "embeddings generated");
        Ok(IngestionSummary {
            document_id: document.id.clone(),
            chunk_count,
            generated_at: Some(generated_at),
            regenerated: true,
        })
    }

    async fn run_pipeline(&self, document: &DocumentRecord) -> Result<usize> {
        let bytes = self.blobs.read_all(&document.blob_id).await?;

        let extractor = Arc::clone(&self.extractor);
        let text = tokio::task::spawn_blocking(move || extractor.extract_text(&bytes))
            .await
            .map_err(|error| IngestError::Extraction(format!("extraction task failed: {error}")))??;

        let chunks = build_chunks(document, &text, self.config.chunking)?;
        let texts = chunks
            .iter()
            .map(|chunk| chunk.content.clone())
            .collect::<Vec<_>>();
        let embeddings = self.vectors.embedder().embed_batch(&texts).await?;

        // Drop whatever a previous partial run left before writing.
        self.vectors.clear_namespace(&document.id).await?;
        let count = self
            .vectors
            .upsert_chunks(&document.id, &chunks, &embeddings)
            .await?;

        if !self.config.settle_delay.is_zero() {
            tokio::time::sleep(self.config.settle_delay).await;
        }
        Ok(count)
    }

    async fn reload(&self, document_id: &str) -> Result<DocumentRecord> {
        self.metadata
            .get_document(document_id)
            .await?
            .ok_or_else(|| ChatError::NotFound(format!("document {document_id}")))
    }

    async fn record_exchange(&self, document: &DocumentRecord, question: &str, answer: &Answer) {
        let message = ChatMessage {
            id: Uuid::new_v4().to_string(),
            document_id: document.id.clone(),
            owner_id: document.owner_id.clone(),
            question: question.trim().to_string(),
            answer: answer.answer_text.clone(),
            degraded: answer.degraded,
            created_at: Utc::now(),
        };
        if let Err(error) = self.metadata.append_chat_message(&message).await {
            warn!(document_id = %document.id, %error, "failed to record chat message");
        }
    }
}

fn require_question(question: &str) -> Result<()> {
    if question.trim().is_empty() {
        return Err(ChatError::Validation("message is required".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::LocalBlobStore;
    use crate::embeddings::CharacterNgramEmbedder;
    use crate::extractor::tests::render_pdf;
    use crate::extractor::LopdfExtractor;
    use crate::ingest::{finalize_upload, PDF_CONTENT_TYPE};
    use crate::metadata::SqliteMetadataStore;
    use crate::models::VectorRecord;
    use crate::prompt::DEGRADED_ANSWER;
    use crate::stores::MemoryVectorIndex;
    use async_trait::async_trait;
    use bytes::Bytes;
    use futures_util::{stream, StreamExt};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;

    const INVOICE: &str = "Invoice INV-7\nBilled to: Acme Ltd\nTotal due: $42\nThank you for your business.";

    /// Treats the uploaded bytes as the document text; `IMAGE` marks a
    /// scan with no text layer.
    struct TextExtractor {
        calls: AtomicUsize,
    }

    impl PdfExtractor for TextExtractor {
        fn extract_text(&self, bytes: &[u8]) -> Result<String, IngestError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let text = String::from_utf8_lossy(bytes).to_string();
            if text.starts_with("IMAGE") {
                return Err(IngestError::Extraction("pdf had no extractable text".to_string()));
            }
            Ok(text)
        }
    }

    /// Answers from the context like a well-behaved model would.
    struct InvoiceModel {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ChatModel for InvoiceModel {
        async fn complete(&self, prompt: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if prompt.contains("Total due: $42") {
                Ok("The invoice total is $42.".to_string())
            } else {
                Ok(NOT_FOUND_SENTINEL.to_string())
            }
        }
    }

    /// Memory index that counts upserts and can hide the next few query
    /// results, like an index that has not caught up yet.
    struct CountingIndex {
        inner: MemoryVectorIndex,
        upserts: AtomicUsize,
        blank_queries: AtomicUsize,
    }

    #[async_trait]
    impl VectorIndex for CountingIndex {
        async fn namespace_stats(&self) -> Result<HashMap<String, u64>> {
            self.inner.namespace_stats().await
        }

        async fn upsert(&self, namespace: &str, records: &[VectorRecord]) -> Result<()> {
            self.upserts.fetch_add(1, Ordering::SeqCst);
            self.inner.upsert(namespace, records).await
        }

        async fn query(
            &self,
            namespace: &str,
            vector: &[f32],
            top_k: usize,
        ) -> Result<Vec<RetrievedChunk>> {
            if self.blank_queries.load(Ordering::SeqCst) > 0 {
                self.blank_queries.fetch_sub(1, Ordering::SeqCst);
                return Ok(Vec::new());
            }
            self.inner.query(namespace, vector, top_k).await
        }

        async fn delete_namespace(&self, namespace: &str) -> Result<()> {
            self.inner.delete_namespace(namespace).await
        }
    }

    struct Harness {
        orchestrator: AnswerOrchestrator,
        extractor: Arc<TextExtractor>,
        model: Arc<InvoiceModel>,
        index: Arc<CountingIndex>,
        _dir: TempDir,
    }

    impl Harness {
        async fn new() -> Self {
            Self::build(None).await
        }

        /// Runs real PDF parsing instead of reading the bytes as text.
        async fn with_lopdf() -> Self {
            Self::build(Some(Arc::new(LopdfExtractor))).await
        }

        async fn build(pdf_extractor: Option<Arc<dyn PdfExtractor>>) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let blobs = LocalBlobStore::open(dir.path().join("blobs")).await.unwrap();
            let extractor = Arc::new(TextExtractor {
                calls: AtomicUsize::new(0),
            });
            let model = Arc::new(InvoiceModel {
                calls: AtomicUsize::new(0),
            });
            let index = Arc::new(CountingIndex {
                inner: MemoryVectorIndex::new(),
                upserts: AtomicUsize::new(0),
                blank_queries: AtomicUsize::new(0),
            });

            let services = Services {
                blobs: Arc::new(blobs),
                metadata: Arc::new(SqliteMetadataStore::in_memory().await.unwrap()),
                extractor: pdf_extractor
                    .unwrap_or_else(|| extractor.clone() as Arc<dyn PdfExtractor>),
                index: index.clone(),
                embedder: Arc::new(CharacterNgramEmbedder { dimensions: 64 }),
                model: model.clone(),
            };
            let config = ChatConfig {
                settle_delay: Duration::ZERO,
                ..ChatConfig::default()
            };

            Self {
                orchestrator: AnswerOrchestrator::new(services, config).unwrap(),
                extractor,
                model,
                index,
                _dir: dir,
            }
        }

        async fn upload(&self, external_id: &str, content: impl AsRef<[u8]>) -> DocumentRecord {
            let body = stream::iter(vec![Ok::<_, std::io::Error>(Bytes::copy_from_slice(
                content.as_ref(),
            ))])
            .boxed();
            let blobs = self.orchestrator.blobs();
            let blob = blobs
                .put_stream("invoice.pdf", PDF_CONTENT_TYPE, body)
                .await
                .unwrap();
            finalize_upload(
                blobs.as_ref(),
                self.orchestrator.metadata().as_ref(),
                blob,
                external_id,
                "alice",
            )
            .await
            .unwrap()
        }

        async fn has_namespace(&self, document: &DocumentRecord) -> bool {
            self.index
                .namespace_stats()
                .await
                .unwrap()
                .contains_key(&document.id)
        }
    }

    fn question(external_id: &str, text: &str) -> Question {
        Question {
            external_id: external_id.to_string(),
            owner_id: "alice".to_string(),
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn first_question_creates_namespace_and_answers_from_invoice() {
        let harness = Harness::new().await;
        let document = harness.upload("file-1", INVOICE).await;
        assert!(!harness.has_namespace(&document).await);

        let answer = harness
            .orchestrator
            .answer(&question("file-1", "What is the invoice total?"))
            .await
            .unwrap();

        assert_eq!(answer.answer_text, "The invoice total is $42.");
        assert!(!answer.regenerated);
        assert!(!answer.degraded);
        assert!(answer
            .source_chunks
            .iter()
            .any(|chunk| chunk.content.contains("$42")));
        assert!(harness.has_namespace(&document).await);

        let stored = harness
            .orchestrator
            .metadata()
            .get_document(&document.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, DocumentStatus::Ready);
        assert_eq!(stored.ingestion, IngestionState::Complete);
        assert_eq!(stored.metadata["embeddingsGenerated"], true);
        assert_eq!(stored.metadata["chunkCount"], 1);
    }

    #[tokio::test]
    async fn rendered_pdf_is_answered_end_to_end() {
        let harness = Harness::with_lopdf().await;
        let pdf = render_pdf(&["Invoice INV-7 Billed to: Acme Ltd Total due: $42"]);
        let document = harness.upload("file-1", pdf).await;

        let answer = harness
            .orchestrator
            .answer(&question("file-1", "What is the invoice total?"))
            .await
            .unwrap();

        assert_eq!(answer.answer_text, "The invoice total is $42.");
        assert!(!answer.degraded);
        assert!(answer
            .source_chunks
            .iter()
            .all(|chunk| chunk.metadata.document_id == document.id));
        assert!(answer
            .source_chunks
            .iter()
            .any(|chunk| chunk.content.contains("Total due: $42")));
    }

    #[tokio::test]
    async fn ingest_keeps_existing_embeddings_unless_forced() {
        let harness = Harness::new().await;
        let document = harness.upload("file-1", INVOICE).await;

        let first = harness.orchestrator.ingest(&document, false).await.unwrap();
        let second = harness.orchestrator.ingest(&document, false).await.unwrap();

        assert!(first.regenerated);
        assert!(!second.regenerated);
        assert_eq!(second.chunk_count, first.chunk_count);
        assert_eq!(
            second.generated_at.map(|at| at.timestamp_micros()),
            first.generated_at.map(|at| at.timestamp_micros())
        );
        assert_eq!(harness.index.upserts.load(Ordering::SeqCst), 1);
        assert_eq!(harness.extractor.calls.load(Ordering::SeqCst), 1);

        let forced = harness.orchestrator.ingest(&document, true).await.unwrap();
        assert!(forced.regenerated);
        assert_eq!(harness.index.upserts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn asking_again_reuses_embeddings() {
        let harness = Harness::new().await;
        harness.upload("file-1", INVOICE).await;

        for _ in 0..3 {
            harness
                .orchestrator
                .answer(&question("file-1", "What is the invoice total?"))
                .await
                .unwrap();
        }

        assert_eq!(harness.extractor.calls.load(Ordering::SeqCst), 1);
        assert_eq!(harness.index.upserts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_first_questions_ingest_once() {
        let harness = Harness::new().await;
        harness.upload("file-1", INVOICE).await;

        let ask = question("file-1", "What is the invoice total?");
        let (first, second) = tokio::join!(
            harness.orchestrator.answer(&ask),
            harness.orchestrator.answer(&ask)
        );
        assert!(first.is_ok() && second.is_ok());
        assert_eq!(harness.extractor.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_answer_yields_sentinel() {
        let harness = Harness::new().await;
        harness
            .upload("notes", "Meeting notes: the roadmap review moved to Thursday.")
            .await;

        let answer = harness
            .orchestrator
            .answer(&question("notes", "What is the invoice total?"))
            .await
            .unwrap();
        assert_eq!(answer.answer_text, NOT_FOUND_SENTINEL);
        assert!(!answer.source_chunks.is_empty());
    }

    #[tokio::test]
    async fn empty_retrieval_regenerates_once() {
        let harness = Harness::new().await;
        harness.upload("file-1", INVOICE).await;
        harness.index.blank_queries.store(1, Ordering::SeqCst);

        let answer = harness
            .orchestrator
            .answer(&question("file-1", "What is the invoice total?"))
            .await
            .unwrap();

        assert!(answer.regenerated);
        assert_eq!(answer.answer_text, "The invoice total is $42.");
        assert_eq!(harness.index.upserts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn persistent_empty_retrieval_returns_sentinel_without_model_call() {
        let harness = Harness::new().await;
        harness.upload("file-1", INVOICE).await;
        harness.index.blank_queries.store(2, Ordering::SeqCst);

        let answer = harness
            .orchestrator
            .answer(&question("file-1", "What is the invoice total?"))
            .await
            .unwrap();

        assert!(answer.regenerated);
        assert_eq!(answer.answer_text, NOT_FOUND_SENTINEL);
        assert!(answer.source_chunks.is_empty());
        assert_eq!(harness.model.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn deleted_namespace_is_rebuilt() {
        let harness = Harness::new().await;
        let document = harness.upload("file-1", INVOICE).await;
        let ask = question("file-1", "What is the invoice total?");

        harness.orchestrator.answer(&ask).await.unwrap();
        harness.index.delete_namespace(&document.id).await.unwrap();
        let answer = harness.orchestrator.answer(&ask).await.unwrap();

        assert!(!answer.regenerated);
        assert_eq!(harness.extractor.calls.load(Ordering::SeqCst), 2);
        assert!(harness.has_namespace(&document).await);
    }

    #[tokio::test]
    async fn image_only_document_fails_and_degrades() {
        let harness = Harness::new().await;
        let document = harness.upload("scan", "IMAGE-ONLY scan").await;
        let ask = question("scan", "What is the invoice total?");

        let error = harness.orchestrator.answer(&ask).await.unwrap_err();
        assert!(matches!(
            error,
            ChatError::Ingest(IngestError::Extraction(_))
        ));

        let fallback = harness.orchestrator.answer_or_fallback(&ask).await.unwrap();
        assert!(fallback.degraded);
        assert_eq!(fallback.answer_text, DEGRADED_ANSWER);

        let stored = harness
            .orchestrator
            .metadata()
            .get_document(&document.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, DocumentStatus::Error);
        assert_eq!(stored.ingestion, IngestionState::Failed);
        assert!(!harness.has_namespace(&document).await);
    }

    #[tokio::test]
    async fn caller_errors_are_not_degraded() {
        let harness = Harness::new().await;
        harness.upload("file-1", INVOICE).await;

        let unknown = harness
            .orchestrator
            .answer_or_fallback(&question("missing", "What is the total?"))
            .await;
        assert!(matches!(unknown, Err(ChatError::NotFound(_))));

        let blank = harness
            .orchestrator
            .answer_or_fallback(&question("file-1", "   "))
            .await;
        assert!(matches!(blank, Err(ChatError::Validation(_))));
    }

    #[tokio::test]
    async fn answers_are_logged_per_document() {
        let harness = Harness::new().await;
        let document = harness.upload("file-1", INVOICE).await;

        harness
            .orchestrator
            .answer(&question("file-1", "What is the invoice total?"))
            .await
            .unwrap();

        let log = harness
            .orchestrator
            .metadata()
            .list_chat_messages(&document.id, "alice")
            .await
            .unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].question, "What is the invoice total?");
        assert_eq!(log[0].answer, "The invoice total is $42.");
        assert!(!log[0].degraded);
    }

    #[tokio::test]
    async fn ingest_and_delete_manage_the_namespace() {
        let harness = Harness::new().await;
        let document = harness.upload("file-1", INVOICE).await;

        let summary = harness.orchestrator.ingest(&document, false).await.unwrap();
        assert_eq!(summary.chunk_count, 1);
        assert!(summary.regenerated);
        assert!(harness.has_namespace(&document).await);

        harness.orchestrator.delete_document(&document).await.unwrap();
        assert!(!harness.has_namespace(&document).await);
        assert!(matches!(
            harness.orchestrator.blobs().info(&document.blob_id).await,
            Err(ChatError::NotFound(_))
        ));
        assert!(harness
            .orchestrator
            .metadata()
            .get_document(&document.id)
            .await
            .unwrap()
            .is_none());
    }
}
