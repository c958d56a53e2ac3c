//! Multipart upload endpoint

use axum::extract::{Multipart, State};
use axum::Json;
use futures_util::{StreamExt, TryStreamExt};
use pdf_chat_core::{finalize_upload, BlobInfo, PDF_CONTENT_TYPE};
use serde_json::{json, Value};
use tracing::warn;

use crate::server::error::{ApiError, ApiResult};
use crate::server::AppState;

#[derive(Default)]
struct UploadForm {
    blob: Option<BlobInfo>,
    file_id: Option<String>,
    user_id: Option<String>,
}

/// POST /api/upload - stream one PDF into the blob store and register it
pub async fn upload(State(state): State<AppState>, mut multipart: Multipart) -> ApiResult<Json<Value>> {
    let mut form = UploadForm::default();
    if let Err(error) = read_form(&state, &mut multipart, &mut form).await {
        discard(&state, form.blob.as_ref()).await;
        return Err(error);
    }

    let (blob, file_id, user_id) = match (form.blob, form.file_id, form.user_id) {
        (Some(blob), Some(file_id), Some(user_id)) => (blob, file_id, user_id),
        (blob, _, _) => {
            discard(&state, blob.as_ref()).await;
            return Err(ApiError::BadRequest("Missing required fields".to_string()));
        }
    };

    let orchestrator = &state.orchestrator;
    let blob_id = blob.id.clone();
    let record = finalize_upload(
        orchestrator.blobs().as_ref(),
        orchestrator.metadata().as_ref(),
        blob,
        &file_id,
        &user_id,
    )
    .await?;

    Ok(Json(json!({
        "success": true,
        "fileId": record.external_id,
        "documentId": record.id,
        "blobId": blob_id,
        "message": "File uploaded successfully",
    })))
}

async fn read_form(state: &AppState, multipart: &mut Multipart, form: &mut UploadForm) -> ApiResult<()> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|error| ApiError::BadRequest(format!("invalid multipart body: {error}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                if form.blob.is_some() {
                    return Err(ApiError::BadRequest("only one file per upload".to_string()));
                }
                let file_name = field
                    .file_name()
                    .filter(|name| !name.is_empty())
                    .unwrap_or("document.pdf")
                    .to_string();
                let content_type = field.content_type().unwrap_or(PDF_CONTENT_TYPE).to_string();
                let body = field.map_err(std::io::Error::other).boxed();
                let blob = state
                    .orchestrator
                    .blobs()
                    .put_stream(&file_name, &content_type, body)
                    .await?;
                form.blob = Some(blob);
            }
            "fileId" => form.file_id = non_empty(field.text().await),
            "userId" => form.user_id = non_empty(field.text().await),
            _ => {}
        }
    }
    Ok(())
}

fn non_empty<E>(value: Result<String, E>) -> Option<String> {
    value
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

async fn discard(state: &AppState, blob: Option<&BlobInfo>) {
    if let Some(blob) = blob {
        if let Err(error) = state.orchestrator.blobs().delete(&blob.id).await {
            warn!(blob_id = %blob.id, %error, "failed to remove rejected upload");
        }
    }
}
