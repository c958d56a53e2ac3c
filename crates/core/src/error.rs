use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pdf extraction failed: {0}")]
    Extraction(String),

    #[error("regex error: {0}")]
    RegexError(#[from] regex::Error),

    #[error("path has no file name: {0}")]
    MissingFileName(String),

    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error("embedding service error: {0}")]
    EmbeddingService(String),

    #[error("invalid response from {backend}: {details}")]
    VectorStore { backend: String, details: String },

    #[error("answer generation failed: {0}")]
    AnswerGeneration(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),
}

impl ChatError {
    pub fn vector_store(backend: &str, details: impl Into<String>) -> Self {
        Self::VectorStore {
            backend: backend.to_string(),
            details: details.into(),
        }
    }

    /// Caller mistakes (missing document, bad input) are not service failures
    /// and are never hidden behind a degraded answer.
    pub fn is_service_failure(&self) -> bool {
        !matches!(self, Self::NotFound(_) | Self::Validation(_))
    }
}

impl From<sqlx::Error> for ChatError {
    fn from(error: sqlx::Error) -> Self {
        match error {
            sqlx::Error::RowNotFound => Self::NotFound("row not found".to_string()),
            other => Self::Storage(other.to_string()),
        }
    }
}

pub type Result<T, E = ChatError> = std::result::Result<T, E>;
