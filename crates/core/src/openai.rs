//! OpenAI-compatible REST client for embeddings and chat completions.

use crate::config::{normalize_base_url, OpenAiConfig};
use crate::embeddings::Embedder;
use crate::error::{ChatError, Result};
use crate::llm::ChatModel;
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde_json::{json, Value};
use tracing::debug;

const EMBEDDING_BATCH: usize = 96;

pub struct OpenAiClient {
    config: OpenAiConfig,
    base_url: String,
    client: Client,
}

impl OpenAiClient {
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(ChatError::Validation("openai api key is empty".to_string()));
        }
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|error| ChatError::EmbeddingService(error.to_string()))?;
        Ok(Self {
            base_url: normalize_base_url(&config.base_url)?,
            config,
            client,
        })
    }

    async fn post(&self, path: &str, body: &Value) -> reqwest::Result<Response> {
        self.client
            .post(format!("{}{path}", self.base_url))
            .bearer_auth(&self.config.api_key)
            .json(body)
            .send()
            .await
    }

    async fn embed_inputs(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = embedding_request(&self.config, inputs);
        let response = self
            .post("/embeddings", &body)
            .await
            .map_err(|error| ChatError::EmbeddingService(error.to_string()))?;
        let parsed = read_json(response)
            .await
            .map_err(ChatError::EmbeddingService)?;
        let vectors = parse_embeddings(&parsed).map_err(ChatError::EmbeddingService)?;

        if vectors.len() != inputs.len() {
            return Err(ChatError::EmbeddingService(format!(
                "requested {} embeddings, received {}",
                inputs.len(),
                vectors.len()
            )));
        }
        Ok(vectors)
    }
}

#[async_trait]
impl Embedder for OpenAiClient {
    fn dimensions(&self) -> usize {
        self.config.embedding_dimensions
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_inputs(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| ChatError::EmbeddingService("empty embedding response".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(EMBEDDING_BATCH) {
            vectors.extend(self.embed_inputs(batch).await?);
        }
        debug!(count = vectors.len(), model = %self.config.embedding_model, "embedded batch");
        Ok(vectors)
    }
}

#[async_trait]
impl ChatModel for OpenAiClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let body = json!({
            "model": self.config.chat_model,
            "temperature": self.config.temperature,
            "messages": [{ "role": "user", "content": prompt }],
        });
        let response = self
            .post("/chat/completions", &body)
            .await
            .map_err(|error| ChatError::AnswerGeneration(error.to_string()))?;
        let parsed = read_json(response)
            .await
            .map_err(ChatError::AnswerGeneration)?;
        parse_completion(&parsed).map_err(ChatError::AnswerGeneration)
    }
}

async fn read_json(response: Response) -> std::result::Result<Value, String> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(format!("{status}: {}", body.trim()));
    }
    response.json().await.map_err(|error| error.to_string())
}

fn embedding_request(config: &OpenAiConfig, inputs: &[String]) -> Value {
    let mut body = json!({
        "model": config.embedding_model,
        "input": inputs,
    });
    // Only the v3 embedding models accept a reduced output size.
    if config.embedding_model.starts_with("text-embedding-3") {
        body["dimensions"] = json!(config.embedding_dimensions);
    }
    body
}

fn parse_embeddings(parsed: &Value) -> std::result::Result<Vec<Vec<f32>>, String> {
    let data = parsed
        .pointer("/data")
        .and_then(Value::as_array)
        .ok_or_else(|| "embedding response has no data array".to_string())?;

    let mut indexed = data
        .iter()
        .map(|item| {
            let index = item.pointer("/index").and_then(Value::as_u64).unwrap_or(0);
            let values = item
                .pointer("/embedding")
                .and_then(Value::as_array)
                .ok_or_else(|| format!("embedding {index} has no values"))?
                .iter()
                .map(|value| value.as_f64().map(|value| value as f32))
                .collect::<Option<Vec<_>>>()
                .ok_or_else(|| format!("embedding {index} has non-numeric values"))?;
            Ok((index, values))
        })
        .collect::<std::result::Result<Vec<_>, String>>()?;

    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, values)| values).collect())
}

fn parse_completion(parsed: &Value) -> std::result::Result<String, String> {
    let content = parsed
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or_default();
    if content.is_empty() {
        return Err("completion response had no content".to_string());
    }
    Ok(content.to_string())
}
