//! Document listing, lookup, deletion and the explicit embedding trigger

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{owner_or_default, OwnerQuery};
use crate::server::error::{ApiError, ApiResult};
use crate::server::extract::AppJson;
use crate::server::AppState;

/// GET /api/documents - newest first
pub async fn list_documents(
    State(state): State<AppState>,
    Query(query): Query<OwnerQuery>,
) -> ApiResult<Json<Value>> {
    let owner = owner_or_default(query.user_id);
    let documents = state.orchestrator.metadata().list_documents(&owner).await?;
    Ok(Json(json!({ "success": true, "documents": documents })))
}

/// GET /api/documents/:fileId
pub async fn get_document(
    State(state): State<AppState>,
    Path(file_id): Path<String>,
    Query(query): Query<OwnerQuery>,
) -> ApiResult<Json<Value>> {
    let owner = owner_or_default(query.user_id);
    let document = state.orchestrator.find_document(&file_id, &owner).await?;
    Ok(Json(json!({ "success": true, "document": document })))
}

/// DELETE /api/documents/:fileId
pub async fn delete_document(
    State(state): State<AppState>,
    Path(file_id): Path<String>,
    Query(query): Query<OwnerQuery>,
) -> ApiResult<Json<Value>> {
    let owner = owner_or_default(query.user_id);
    let document = state.orchestrator.find_document(&file_id, &owner).await?;
    state.orchestrator.delete_document(&document).await?;
    Ok(Json(json!({
        "success": true,
        "message": format!("Deleted {}", document.file_name),
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddingsRequest {
    file_id: Option<String>,
    user_id: Option<String>,
    /// Rebuild even when the document already has embeddings.
    #[serde(default)]
    force: bool,
}

/// POST /api/embeddings - make sure a document has embeddings
pub async fn generate_embeddings(
    State(state): State<AppState>,
    AppJson(request): AppJson<EmbeddingsRequest>,
) -> ApiResult<Json<Value>> {
    let file_id = request
        .file_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("fileId is required".to_string()))?;
    let owner = owner_or_default(request.user_id);

    let document = state.orchestrator.find_document(&file_id, &owner).await?;
    let summary = state.orchestrator.ingest(&document, request.force).await?;
    let message = if summary.regenerated {
        "Embeddings generated successfully"
    } else {
        "Embeddings already exist"
    };

    Ok(Json(json!({
        "success": true,
        "documentId": summary.document_id,
        "chunkCount": summary.chunk_count,
        "generatedAt": summary.generated_at,
        "regenerated": summary.regenerated,
        "message": message,
    })))
}
