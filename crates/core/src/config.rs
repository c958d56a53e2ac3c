use crate::chunking::ChunkingConfig;
use crate::error::{ChatError, Result};
use std::time::Duration;
use url::Url;

pub const DEFAULT_TOP_K: usize = 4;
pub const MAX_TOP_K: usize = 6;

#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub chunking: ChunkingConfig,
    pub top_k: usize,
    /// Pause after an upsert so the vector database can make the new
    /// namespace readable before the follow-up query.
    pub settle_delay: Duration,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            chunking: ChunkingConfig::default(),
            top_k: DEFAULT_TOP_K,
            settle_delay: Duration::from_secs(1),
        }
    }
}

impl ChatConfig {
    pub fn validate(&self) -> Result<()> {
        self.chunking.validate()?;
        if !(1..=MAX_TOP_K).contains(&self.top_k) {
            return Err(ChatError::Validation(format!(
                "top_k must be between 1 and {MAX_TOP_K}, got {}",
                self.top_k
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub embedding_model: String,
    pub embedding_dimensions: usize,
    pub chat_model: String,
    pub temperature: f32,
    pub timeout: Duration,
}

impl OpenAiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "https://api.openai.com/v1".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            embedding_dimensions: 1536,
            chat_model: "gpt-4o".to_string(),
            temperature: 0.0,
            timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PineconeConfig {
    pub api_key: String,
    /// Data-plane host of the index, e.g. `https://pdfs-abc123.svc.pinecone.io`.
    pub index_host: String,
    pub timeout: Duration,
}

/// Parses `raw` as an absolute http(s) URL and strips the trailing slash so
/// paths can be appended with `format!`.
pub fn normalize_base_url(raw: &str) -> Result<String> {
    let parsed = Url::parse(raw.trim())?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ChatError::Validation(format!(
            "expected an http(s) url, got {raw}"
        )));
    }
    Ok(parsed.as_str().trim_end_matches('/').to_string())
}
