//! Blob download endpoint

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::Response;
use pdf_chat_core::ChatError;
use serde::Deserialize;

use crate::server::error::{ApiError, ApiResult};
use crate::server::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct FileQuery {
    download: Option<String>,
}

/// GET /api/files/:id - stream a stored file back to the client
pub async fn get_file(
    State(state): State<AppState>,
    Path(blob_id): Path<String>,
    Query(query): Query<FileQuery>,
) -> ApiResult<Response> {
    let reader = state.orchestrator.blobs().open_read(&blob_id).await?;

    let disposition = if query.download.as_deref() == Some("true") {
        "attachment"
    } else {
        "inline"
    };
    let file_name = header_safe(&reader.info.file_name);

    Response::builder()
        .header(header::CONTENT_TYPE, reader.info.content_type.as_str())
        .header(header::CONTENT_LENGTH, reader.info.size)
        .header(header::CACHE_CONTROL, "private, max-age=3600")
        .header(
            header::CONTENT_DISPOSITION,
            format!("{disposition}; filename=\"{file_name}\""),
        )
        .body(Body::from_stream(reader.body))
        .map_err(|error| ApiError::Chat(ChatError::Storage(error.to_string())))
}

/// Keeps printable ASCII so the name is a valid quoted header value.
fn header_safe(file_name: &str) -> String {
    let cleaned: String = file_name
        .chars()
        .filter(|ch| (ch.is_ascii_graphic() || *ch == ' ') && *ch != '"' && *ch != '\\')
        .collect();
    if cleaned.trim().is_empty() {
        "document.pdf".to_string()
    } else {
        cleaned
    }
}
