use crate::error::IngestError;
use crate::models::{ChunkMetadata, DocumentRecord, TextChunk};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub const DEFAULT_CHUNK_SIZE: usize = 1_000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// Window sizes are counted in characters, not bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.chunk_size == 0 {
            return Err(IngestError::InvalidChunkConfig(
                "chunk size must be positive".to_string(),
            ));
        }

        if self.chunk_overlap >= self.chunk_size {
            return Err(IngestError::InvalidChunkConfig(format!(
                "chunk overlap {} must be smaller than chunk size {}",
                self.chunk_overlap, self.chunk_size
            )));
        }

        Ok(())
    }

    fn stride(&self) -> usize {
        self.chunk_size - self.chunk_overlap
    }
}

/// Splits `text` into windows of at most `chunk_size` characters. Window
/// `i + 1` starts `chunk_size - chunk_overlap` characters after window `i`,
/// so neighbours share exactly `chunk_overlap` characters.
pub fn split_text(text: &str, config: ChunkingConfig) -> Result<Vec<String>, IngestError> {
    config.validate()?;

    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return Ok(Vec::new());
    }

    let mut windows = Vec::new();
    let mut start = 0;
    loop {
        let end = (start + config.chunk_size).min(chars.len());
        windows.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start += config.stride();
    }

    Ok(windows)
}

/// Inverse of [`split_text`]: drops the shared prefix of every window after
/// the first.
pub fn merge_chunks<S: AsRef<str>>(chunks: &[S], chunk_overlap: usize) -> String {
    let mut merged = String::new();
    for (index, chunk) in chunks.iter().enumerate() {
        if index == 0 {
            merged.push_str(chunk.as_ref());
        } else {
            merged.extend(chunk.as_ref().chars().skip(chunk_overlap));
        }
    }
    merged
}

pub fn build_chunks(
    document: &DocumentRecord,
    text: &str,
    config: ChunkingConfig,
) -> Result<Vec<TextChunk>, IngestError> {
    let chunks = split_text(text, config)?
        .into_iter()
        .enumerate()
        .map(|(index, content)| {
            let chunk_index = index as u64;
            TextChunk {
                chunk_id: make_chunk_id(&document.id, chunk_index, &content),
                metadata: ChunkMetadata {
                    document_id: document.id.clone(),
                    blob_id: document.blob_id.clone(),
                    chunk_index,
                    source_file_name: document.file_name.clone(),
                    upload_date: document.uploaded_at,
                },
                content,
            }
        })
        .collect();

    Ok(chunks)
}

fn make_chunk_id(document_id: &str, index: u64, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(document_id.as_bytes());
    hasher.update(index.to_le_bytes());
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DocumentStatus, IngestionState};

    fn small() -> ChunkingConfig {
        ChunkingConfig {
            chunk_size: 10,
            chunk_overlap: 4,
        }
    }

    fn document() -> DocumentRecord {
        DocumentRecord {
            id: "doc-1".to_string(),
            external_id: "client-1".to_string(),
            owner_id: "demo-user".to_string(),
            file_name: "invoice.pdf".to_string(),
            file_size: 10,
            mime_type: "application/pdf".to_string(),
            file_url: "/api/files/blob-1".to_string(),
            status: DocumentStatus::Uploaded,
            ingestion: IngestionState::Pending,
            uploaded_at: chrono::Utc::now(),
            blob_id: "blob-1".to_string(),
            metadata: Default::default(),
        }
    }

    #[test]
    fn defaults_match_thousand_by_two_hundred() {
        let config = ChunkingConfig::default();
        assert_eq!(config.chunk_size, 1_000);
        assert_eq!(config.chunk_overlap, 200);
    }

    #[test]
    fn neighbours_share_exactly_the_overlap() {
        let text = "abcdefghijklmnopqrstuvwxyz0123456789";
        let chunks = split_text(text, small()).unwrap();

        assert!(chunks.len() > 2);
        for pair in chunks.windows(2) {
            let left: Vec<char> = pair[0].chars().collect();
            let tail: String = left[left.len() - 4..].iter().collect();
            let head: String = pair[1].chars().take(4).collect();
            assert_eq!(tail, head);
        }
        assert!(chunks.iter().all(|chunk| chunk.chars().count() <= 10));
    }

    #[test]
    fn merging_reconstructs_the_source() {
        let text = "The invoice total is $42. Payment is due in thirty days, net.";
        let chunks = split_text(text, small()).unwrap();
        assert_eq!(merge_chunks(&chunks, 4), text);
    }

    #[test]
    fn splitting_is_deterministic_and_counts_characters() {
        let text = "é".repeat(25);
        let first = split_text(&text, small()).unwrap();
        let second = split_text(&text, small()).unwrap();

        assert_eq!(first, second);
        assert_eq!(first[0].chars().count(), 10);
        assert_eq!(merge_chunks(&first, 4), text);
    }

    #[test]
    fn short_and_empty_texts() {
        assert_eq!(split_text("tiny", small()).unwrap(), vec!["tiny".to_string()]);
        assert!(split_text("", small()).unwrap().is_empty());
    }

    #[test]
    fn overlap_must_be_smaller_than_size() {
        let config = ChunkingConfig {
            chunk_size: 4,
            chunk_overlap: 4,
        };
        assert!(matches!(
            split_text("abcdef", config),
            Err(IngestError::InvalidChunkConfig(_))
        ));
    }

    #[test]
    fn built_chunks_carry_document_metadata() {
        let doc = document();
        let chunks = build_chunks(&doc, "abcdefghijklmnopqrst", small()).unwrap();

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2].metadata.chunk_index, 2);
        assert_eq!(chunks[0].metadata.blob_id, "blob-1");
        assert_eq!(chunks[0].metadata.source_file_name, "invoice.pdf");
        assert_ne!(chunks[0].chunk_id, chunks[1].chunk_id);

        let again = build_chunks(&doc, "abcdefghijklmnopqrst", small()).unwrap();
        assert_eq!(chunks[1].chunk_id, again[1].chunk_id);
    }
}
