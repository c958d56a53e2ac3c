use crate::error::Result;
use crate::models::{RetrievedChunk, VectorRecord};
use crate::traits::VectorIndex;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// In-process vector index with exact cosine search. Used for local runs
/// and tests where a hosted index is not available.
#[derive(Default)]
pub struct MemoryVectorIndex {
    namespaces: RwLock<HashMap<String, Vec<VectorRecord>>>,
}

impl MemoryVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorIndex for MemoryVectorIndex {
    async fn namespace_stats(&self) -> Result<HashMap<String, u64>> {
        let namespaces = self.namespaces.read().await;
        Ok(namespaces
            .iter()
            .filter(|(_, records)| !records.is_empty())
            .map(|(name, records)| (name.clone(), records.len() as u64))
            .collect())
    }

    async fn upsert(&self, namespace: &str, records: &[VectorRecord]) -> Result<()> {
        let mut namespaces = self.namespaces.write().await;
        let stored = namespaces.entry(namespace.to_string()).or_default();
        for record in records {
            match stored.iter_mut().find(|existing| existing.id == record.id) {
                Some(existing) => *existing = record.clone(),
                None => stored.push(record.clone()),
            }
        }
        Ok(())
    }

    async fn query(
        &self,
        namespace: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<RetrievedChunk>> {
        let namespaces = self.namespaces.read().await;
        let Some(records) = namespaces.get(namespace) else {
            return Ok(Vec::new());
        };

        let mut scored = records
            .iter()
            .map(|record| (cosine_similarity(vector, &record.values), record))
            .collect::<Vec<_>>();
        scored.sort_by(|left, right| right.0.total_cmp(&left.0));

        Ok(scored
            .into_iter()
            .take(top_k)
            .map(|(score, record)| RetrievedChunk {
                chunk_id: record.id.clone(),
                content: record.text.clone(),
                score,
                metadata: record.metadata.clone(),
            })
            .collect())
    }

    async fn delete_namespace(&self, namespace: &str) -> Result<()> {
        self.namespaces.write().await.remove(namespace);
        Ok(())
    }
}

fn cosine_similarity(left: &[f32], right: &[f32]) -> f32 {
    if left.len() != right.len() {
        return 0.0;
    }
    let dot = left.iter().zip(right).map(|(a, b)| a * b).sum::<f32>();
    let left_norm = left.iter().map(|value| value * value).sum::<f32>().sqrt();
    let right_norm = right.iter().map(|value| value * value).sum::<f32>().sqrt();
    if left_norm == 0.0 || right_norm == 0.0 {
        return 0.0;
    }
    dot / (left_norm * right_norm)
}
