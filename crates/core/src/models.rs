use crate::error::ChatError;
use crate::prompt::DEGRADED_ANSWER;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Uploading,
    Uploaded,
    Processing,
    Ready,
    Error,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uploading => "uploading",
            Self::Uploaded => "uploaded",
            Self::Processing => "processing",
            Self::Ready => "ready",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentStatus {
    type Err = ChatError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "uploading" => Ok(Self::Uploading),
            "uploaded" => Ok(Self::Uploaded),
            "processing" => Ok(Self::Processing),
            "ready" => Ok(Self::Ready),
            "error" => Ok(Self::Error),
            other => Err(ChatError::Storage(format!("unknown document status: {other}"))),
        }
    }
}

/// Whether the document's vectors have been fully written. This, not the
/// vector database, decides if ingestion has to run again.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum IngestionState {
    Pending,
    Complete,
    Failed,
}

impl IngestionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Complete => "complete",
            Self::Failed => "failed",
        }
    }
}

impl FromStr for IngestionState {
    type Err = ChatError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(Self::Pending),
            "complete" => Ok(Self::Complete),
            "failed" => Ok(Self::Failed),
            other => Err(ChatError::Storage(format!("unknown ingestion state: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRecord {
    pub id: String,
    #[serde(rename = "fileId")]
    pub external_id: String,
    #[serde(rename = "userId")]
    pub owner_id: String,
    pub file_name: String,
    pub file_size: u64,
    #[serde(rename = "fileType")]
    pub mime_type: String,
    pub file_url: String,
    pub status: DocumentStatus,
    pub ingestion: IngestionState,
    pub uploaded_at: DateTime<Utc>,
    pub blob_id: String,
    pub metadata: Map<String, Value>,
}

impl DocumentRecord {
    pub fn embeddings_ready(&self) -> bool {
        self.ingestion == IngestionState::Complete
    }
}

#[derive(Debug, Clone)]
pub struct NewDocument {
    pub external_id: String,
    pub owner_id: String,
    pub file_name: String,
    pub file_size: u64,
    pub mime_type: String,
    pub blob_id: String,
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BlobInfo {
    pub id: String,
    pub file_name: String,
    pub content_type: String,
    pub size: u64,
    pub checksum: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChunkMetadata {
    pub document_id: String,
    pub blob_id: String,
    pub chunk_index: u64,
    pub source_file_name: String,
    pub upload_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextChunk {
    pub chunk_id: String,
    pub content: String,
    pub metadata: ChunkMetadata,
}

#[derive(Debug, Clone)]
pub struct VectorRecord {
    pub id: String,
    pub values: Vec<f32>,
    pub text: String,
    pub metadata: ChunkMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievedChunk {
    pub chunk_id: String,
    pub content: String,
    pub score: f32,
    pub metadata: ChunkMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub document_id: String,
    #[serde(rename = "userId")]
    pub owner_id: String,
    pub question: String,
    pub answer: String,
    pub degraded: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Question {
    pub external_id: String,
    pub owner_id: String,
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    pub answer_text: String,
    pub source_chunks: Vec<RetrievedChunk>,
    /// Set when the empty-retrieval retry forced a regeneration.
    pub regenerated: bool,
    pub degraded: bool,
}

impl Answer {
    /// Canned reply used when a backing service failed.
    pub fn degraded() -> Self {
        Self {
            answer_text: DEGRADED_ANSWER.to_string(),
            source_chunks: Vec::new(),
            regenerated: false,
            degraded: true,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionSummary {
    pub document_id: String,
    pub chunk_count: usize,
    pub generated_at: Option<DateTime<Utc>>,
    /// False when existing embeddings were kept.
    pub regenerated: bool,
}

impl IngestionSummary {
    /// Reads the flags a previous ingestion left in the record's metadata.
    pub fn existing(document: &DocumentRecord) -> Self {
        let chunk_count = document
            .metadata
            .get("chunkCount")
            .and_then(Value::as_u64)
            .unwrap_or_default() as usize;
        let generated_at = document
            .metadata
            .get("embeddingsGeneratedAt")
            .and_then(Value::as_str)
            .and_then(|value| DateTime::parse_from_rfc3339(value).ok())
            .map(|value| value.with_timezone(&Utc));

        Self {
            document_id: document.id.clone(),
            chunk_count,
            generated_at,
            regenerated: false,
        }
    }
}
