pub mod blob;
pub mod chunking;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod ingest;
pub mod llm;
pub mod metadata;
pub mod models;
pub mod openai;
pub mod orchestrator;
pub mod prompt;
pub mod stores;
pub mod traits;
pub mod vector;

pub use blob::LocalBlobStore;
pub use chunking::{build_chunks, merge_chunks, split_text, ChunkingConfig};
pub use config::{ChatConfig, OpenAiConfig, PineconeConfig, DEFAULT_TOP_K, MAX_TOP_K};
pub use embeddings::{
    probe_dimensions, CharacterNgramEmbedder, Embedder, DEFAULT_EMBEDDING_DIMENSIONS,
};
pub use error::{ChatError, IngestError};
pub use extractor::{LopdfExtractor, PdfExtractor};
pub use ingest::{
    discover_pdf_files, finalize_upload, import_folder, ImportReport, SkippedPdf,
    PDF_CONTENT_TYPE,
};
pub use llm::{ChatModel, ExtractiveModel};
pub use metadata::SqliteMetadataStore;
pub use models::{
    Answer, BlobInfo, ChatMessage, ChunkMetadata, DocumentRecord, DocumentStatus,
    IngestionState, IngestionSummary, NewDocument, Question, RetrievedChunk, TextChunk,
    VectorRecord,
};
pub use openai::OpenAiClient;
pub use orchestrator::{AnswerOrchestrator, Services};
pub use prompt::{DEGRADED_ANSWER, NOT_FOUND_SENTINEL};
pub use stores::{MemoryVectorIndex, PineconeStore};
pub use traits::{BlobReader, BlobStore, ByteStream, MetadataStore, VectorIndex};
pub use vector::VectorStoreAdapter;
