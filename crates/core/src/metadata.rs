use crate::error::{ChatError, Result};
use crate::models::{
    ChatMessage, DocumentRecord, DocumentStatus, IngestionState, NewDocument,
};
use crate::traits::MetadataStore;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::path::Path;
use tracing::debug;
use uuid::Uuid;

const SCHEMA: [&str; 4] = [
    "CREATE TABLE IF NOT EXISTS documents (
        id TEXT PRIMARY KEY,
        external_id TEXT NOT NULL,
        owner_id TEXT NOT NULL,
        file_name TEXT NOT NULL,
        file_size INTEGER NOT NULL,
        mime_type TEXT NOT NULL,
        status TEXT NOT NULL,
        ingestion TEXT NOT NULL,
        uploaded_at TEXT NOT NULL,
        blob_id TEXT NOT NULL,
        metadata TEXT NOT NULL DEFAULT '{}'
    )",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_documents_owner_external
        ON documents(owner_id, external_id)",
    "CREATE TABLE IF NOT EXISTS chat_messages (
        id TEXT PRIMARY KEY,
        document_id TEXT NOT NULL,
        owner_id TEXT NOT NULL,
        question TEXT NOT NULL,
        answer TEXT NOT NULL,
        degraded INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_chat_messages_document
        ON chat_messages(document_id, created_at)",
];

#[derive(Clone)]
pub struct SqliteMetadataStore {
    pool: SqlitePool,
}

impl SqliteMetadataStore {
    pub async fn open(path: &Path) -> Result<Self> {
        let conn_str = format!("sqlite://{}?mode=rwc", path.to_string_lossy());
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&conn_str)
            .await?;
        Self::init(pool).await
    }

    /// Single-connection in-memory database; every extra connection would
    /// see its own empty database.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        Self::init(pool).await
    }

    async fn init(pool: SqlitePool) -> Result<Self> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&pool).await?;
        }
        Ok(Self { pool })
    }
}

#[async_trait]
impl MetadataStore for SqliteMetadataStore {
    async fn create_document(&self, document: NewDocument) -> Result<DocumentRecord> {
        let record = DocumentRecord {
            id: Uuid::new_v4().to_string(),
            file_url: format!("/api/files/{}", document.blob_id),
            external_id: document.external_id,
            owner_id: document.owner_id,
            file_name: document.file_name,
            file_size: document.file_size,
            mime_type: document.mime_type,
            status: DocumentStatus::Uploaded,
            ingestion: IngestionState::Pending,
            uploaded_at: Utc::now(),
            blob_id: document.blob_id,
            metadata: document.metadata,
        };

        let inserted = sqlx::query(
            "INSERT INTO documents (id, external_id, owner_id, file_name, file_size, mime_type, \
             status, ingestion, uploaded_at, blob_id, metadata) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.id)
        .bind(&record.external_id)
        .bind(&record.owner_id)
        .bind(&record.file_name)
        .bind(record.file_size as i64)
        .bind(&record.mime_type)
        .bind(record.status.as_str())
        .bind(record.ingestion.as_str())
        .bind(timestamp(&record.uploaded_at))
        .bind(&record.blob_id)
        .bind(serde_json::to_string(&record.metadata)?)
        .execute(&self.pool)
        .await;

        match inserted {
            Ok(_) => {
                debug!(document_id = %record.id, external_id = %record.external_id, "document created");
                Ok(record)
            }
            Err(sqlx::Error::Database(error)) if error.is_unique_violation() => {
                Err(ChatError::Validation(format!(
                    "document {} already exists for owner {}",
                    record.external_id, record.owner_id
                )))
            }
            Err(error) => Err(error.into()),
        }
    }

    async fn get_document(&self, id: &str) -> Result<Option<DocumentRecord>> {
        let row = sqlx::query("SELECT * FROM documents WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(document_from_row).transpose()
    }

    async fn find_document(
        &self,
        external_id: &str,
        owner_id: &str,
    ) -> Result<Option<DocumentRecord>> {
        let row = sqlx::query("SELECT * FROM documents WHERE external_id = ? AND owner_id = ?")
            .bind(external_id)
            .bind(owner_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(document_from_row).transpose()
    }

    async fn list_documents(&self, owner_id: &str) -> Result<Vec<DocumentRecord>> {
        let rows = sqlx::query(
            "SELECT * FROM documents WHERE owner_id = ? ORDER BY uploaded_at DESC, rowid DESC",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(document_from_row).collect()
    }

    async fn set_status(
        &self,
        id: &str,
        status: DocumentStatus,
        ingestion: IngestionState,
    ) -> Result<()> {
        let result = sqlx::query("UPDATE documents SET status = ?, ingestion = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(ingestion.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;
        require_row(result.rows_affected(), id)
    }

    async fn merge_metadata(&self, id: &str, patch: Map<String, Value>) -> Result<()> {
        let result =
            sqlx::query("UPDATE documents SET metadata = json_patch(metadata, ?) WHERE id = ?")
                .bind(serde_json::to_string(&patch)?)
                .bind(id)
                .execute(&self.pool)
                .await?;
        require_row(result.rows_affected(), id)
    }

    async fn delete_document(&self, id: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM chat_messages WHERE document_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        require_row(result.rows_affected(), id)?;
        tx.commit().await?;
        Ok(())
    }

    async fn append_chat_message(&self, message: &ChatMessage) -> Result<()> {
        sqlx::query(
            "INSERT INTO chat_messages (id, document_id, owner_id, question, answer, degraded, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&message.id)
        .bind(&message.document_id)
        .bind(&message.owner_id)
        .bind(&message.question)
        .bind(&message.answer)
        .bind(message.degraded)
        .bind(timestamp(&message.created_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_chat_messages(
        &self,
        document_id: &str,
        owner_id: &str,
    ) -> Result<Vec<ChatMessage>> {
        let rows = sqlx::query(
            "SELECT * FROM chat_messages WHERE document_id = ? AND owner_id = ? \
             ORDER BY created_at ASC, rowid ASC",
        )
        .bind(document_id)
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(ChatMessage {
                    id: row.try_get("id")?,
                    document_id: row.try_get("document_id")?,
                    owner_id: row.try_get("owner_id")?,
                    question: row.try_get("question")?,
                    answer: row.try_get("answer")?,
                    degraded: row.try_get("degraded")?,
                    created_at: parse_timestamp(&row.try_get::<String, _>("created_at")?)?,
                })
            })
            .collect()
    }
}

fn document_from_row(row: &SqliteRow) -> Result<DocumentRecord> {
    let blob_id: String = row.try_get("blob_id")?;
    let metadata: String = row.try_get("metadata")?;
    let file_size: i64 = row.try_get("file_size")?;

    Ok(DocumentRecord {
        id: row.try_get("id")?,
        external_id: row.try_get("external_id")?,
        owner_id: row.try_get("owner_id")?,
        file_name: row.try_get("file_name")?,
        file_size: file_size.max(0) as u64,
        mime_type: row.try_get("mime_type")?,
        file_url: format!("/api/files/{blob_id}"),
        status: row.try_get::<String, _>("status")?.parse()?,
        ingestion: row.try_get::<String, _>("ingestion")?.parse()?,
        uploaded_at: parse_timestamp(&row.try_get::<String, _>("uploaded_at")?)?,
        blob_id,
        metadata: serde_json::from_str(&metadata)?,
    })
}

/// Fixed-width UTC timestamps so `ORDER BY` on the text column is
/// chronological.
fn timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|error| ChatError::Storage(format!("invalid timestamp {raw}: {error}")))
}

fn require_row(rows_affected: u64, id: &str) -> Result<()> {
    if rows_affected == 0 {
        return Err(ChatError::NotFound(format!("document {id}")));
    }
    Ok(())
}
