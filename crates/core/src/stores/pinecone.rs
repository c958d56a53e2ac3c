use crate::config::{normalize_base_url, PineconeConfig};
use crate::error::{ChatError, Result};
use crate::models::{ChunkMetadata, RetrievedChunk, VectorRecord};
use crate::traits::VectorIndex;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Response, StatusCode};
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::debug;

const BACKEND: &str = "pinecone";
const API_VERSION: &str = "2024-07";
const UPSERT_BATCH: usize = 100;

pub struct PineconeStore {
    host: String,
    api_key: String,
    client: Client,
}

impl PineconeStore {
    pub fn new(config: &PineconeConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|error| ChatError::vector_store(BACKEND, error.to_string()))?;
        Ok(Self {
            host: normalize_base_url(&config.index_host)?,
            api_key: config.api_key.clone(),
            client,
        })
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Response> {
        self.client
            .post(format!("{}{path}", self.host))
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
            .json(body)
            .send()
            .await
            .map_err(|error| ChatError::vector_store(BACKEND, error.to_string()))
    }

    async fn post_json(&self, path: &str, body: &Value) -> Result<Value> {
        let response = expect_success(self.post(path, body).await?).await?;
        response
            .json()
            .await
            .map_err(|error| ChatError::vector_store(BACKEND, error.to_string()))
    }
}

#[async_trait]
impl VectorIndex for PineconeStore {
    async fn namespace_stats(&self) -> Result<HashMap<String, u64>> {
        let stats = self.post_json("/describe_index_stats", &json!({})).await?;
        Ok(parse_namespaces(&stats))
    }

    async fn upsert(&self, namespace: &str, records: &[VectorRecord]) -> Result<()> {
        for batch in records.chunks(UPSERT_BATCH) {
            self.post_json("/vectors/upsert", &build_upsert_body(namespace, batch))
                .await?;
        }
        debug!(namespace, vectors = records.len(), "pinecone upsert complete");
        Ok(())
    }

    async fn query(
        &self,
        namespace: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<RetrievedChunk>> {
        let parsed = self
            .post_json(
                "/query",
                &json!({
                    "namespace": namespace,
                    "vector": vector,
                    "topK": top_k,
                    "includeMetadata": true,
                }),
            )
            .await?;
        Ok(parse_matches(&parsed))
    }

    async fn delete_namespace(&self, namespace: &str) -> Result<()> {
        let response = self
            .post(
                "/vectors/delete",
                &json!({ "deleteAll": true, "namespace": namespace }),
            )
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        expect_success(response).await?;
        Ok(())
    }
}

async fn expect_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ChatError::vector_store(
        BACKEND,
        format!("{status}: {}", body.trim()),
    ))
}

fn build_upsert_body(namespace: &str, records: &[VectorRecord]) -> Value {
    let vectors = records
        .iter()
        .map(|record| {
            json!({
                "id": record.id,
                "values": record.values,
                "metadata": {
                    "documentId": record.metadata.document_id,
                    "blobId": record.metadata.blob_id,
                    "chunkIndex": record.metadata.chunk_index,
                    "sourceFileName": record.metadata.source_file_name,
                    "uploadDate": record.metadata.upload_date.to_rfc3339(),
                    "text": record.text,
                },
            })
        })
        .collect::<Vec<_>>();

    json!({ "namespace": namespace, "vectors": vectors })
}

fn parse_namespaces(stats: &Value) -> HashMap<String, u64> {
    stats
        .pointer("/namespaces")
        .and_then(Value::as_object)
        .map(|namespaces| {
            namespaces
                .iter()
                .map(|(name, summary)| {
                    let count = summary
                        .pointer("/vectorCount")
                        .and_then(Value::as_u64)
                        .unwrap_or(0);
                    (name.clone(), count)
                })
                .collect()
        })
        .unwrap_or_default()
}

fn parse_matches(parsed: &Value) -> Vec<RetrievedChunk> {
    let hits = parsed
        .pointer("/matches")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let mut result = Vec::new();
    for hit in hits {
        let text = hit
            .pointer("/metadata/text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        // Matches without stored text are useless as prompt context.
        if text.is_empty() {
            continue;
        }

        let string_field = |field: &str| {
            hit.pointer(&format!("/metadata/{field}"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        let upload_date = hit
            .pointer("/metadata/uploadDate")
            .and_then(Value::as_str)
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|parsed| parsed.with_timezone(&Utc))
            .unwrap_or_default();

        result.push(RetrievedChunk {
            chunk_id: hit
                .pointer("/id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            content: text,
            score: hit.pointer("/score").and_then(Value::as_f64).unwrap_or(0.0) as f32,
            metadata: ChunkMetadata {
                document_id: string_field("documentId"),
                blob_id: string_field("blobId"),
                chunk_index: hit
                    .pointer("/metadata/chunkIndex")
                    .and_then(Value::as_f64)
                    .map(|index| index as u64)
                    .unwrap_or(0),
                source_file_name: string_field("sourceFileName"),
                upload_date,
            },
        });
    }

    result
}
