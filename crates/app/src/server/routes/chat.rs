//! Chat endpoint and chat history

use axum::extract::{Path, Query, State};
use axum::Json;
use pdf_chat_core::{Answer, ChatError};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use super::{owner_or_default, OwnerQuery};
use crate::server::error::{ApiError, ApiResult};
use crate::server::extract::AppJson;
use crate::server::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    message: Option<String>,
    user_id: Option<String>,
}

/// POST /api/chat/:fileId
///
/// Backing-service failures still answer 200 with the canned degraded
/// response; only an empty message (400) and an unknown document (404)
/// are errors.
pub async fn chat(
    State(state): State<AppState>,
    Path(file_id): Path<String>,
    AppJson(request): AppJson<ChatRequest>,
) -> ApiResult<Json<Value>> {
    let message = request
        .message
        .filter(|message| !message.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Message and fileId are required".to_string()))?;
    let owner = owner_or_default(request.user_id);

    let document = match state.orchestrator.find_document(&file_id, &owner).await {
        Ok(document) => Some(document),
        Err(ChatError::NotFound(_)) => {
            return Err(ApiError::NotFound("Document not found".to_string()))
        }
        Err(error) => {
            warn!(file_id, %error, "document lookup failed, answering degraded");
            None
        }
    };

    let answer = match &document {
        Some(document) => {
            state
                .orchestrator
                .answer_document_or_fallback(document, &message)
                .await?
        }
        None => Answer::degraded(),
    };

    let document_info = document.as_ref().map(|document| {
        json!({
            "fileName": document.file_name,
            "fileSize": document.file_size,
            "uploadedAt": document.uploaded_at,
            "blobId": document.blob_id,
            "status": document.status,
        })
    });

    Ok(Json(json!({
        "success": true,
        "response": answer.answer_text,
        "sources": answer.source_chunks,
        "degraded": answer.degraded,
        "regenerated": answer.regenerated,
        "documentInfo": document_info,
    })))
}

/// GET /api/chat/:fileId/messages - oldest first
pub async fn list_messages(
    State(state): State<AppState>,
    Path(file_id): Path<String>,
    Query(query): Query<OwnerQuery>,
) -> ApiResult<Json<Value>> {
    let owner = owner_or_default(query.user_id);
    let document = state.orchestrator.find_document(&file_id, &owner).await?;
    let messages = state
        .orchestrator
        .metadata()
        .list_chat_messages(&document.id, &owner)
        .await?;
    Ok(Json(json!({ "success": true, "messages": messages })))
}
