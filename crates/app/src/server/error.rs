use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use pdf_chat_core::{ChatError, IngestError};
use serde_json::json;
use tracing::error;

/// Error returned by the HTTP handlers, rendered as
/// `{"success": false, "error": "..."}`.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Chat(ChatError),
}

impl From<ChatError> for ApiError {
    fn from(error: ChatError) -> Self {
        Self::Chat(error)
    }
}

impl ApiError {
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message.clone()),
            Self::NotFound(message) => (StatusCode::NOT_FOUND, message.clone()),
            Self::Chat(error) => {
                let status = match error {
                    ChatError::NotFound(_) => StatusCode::NOT_FOUND,
                    ChatError::Validation(_) => StatusCode::BAD_REQUEST,
                    ChatError::Ingest(IngestError::Extraction(_)) => {
                        StatusCode::UNPROCESSABLE_ENTITY
                    }
                    ChatError::EmbeddingService(_)
                    | ChatError::VectorStore { .. }
                    | ChatError::AnswerGeneration(_) => StatusCode::BAD_GATEWAY,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                let message = match error {
                    ChatError::NotFound(message) | ChatError::Validation(message) => {
                        message.clone()
                    }
                    other => other.to_string(),
                };
                (status, message)
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();
        if status.is_server_error() {
            error!(status = %status, error = %message, "request failed");
        }
        (status, Json(json!({ "success": false, "error": message }))).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(error: ChatError) -> StatusCode {
        ApiError::from(error).status_and_message().0
    }

    #[test]
    fn chat_errors_map_to_statuses() {
        assert_eq!(status_of(ChatError::NotFound("doc".into())), StatusCode::NOT_FOUND);
        assert_eq!(
            status_of(ChatError::Validation("dup".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(ChatError::Ingest(IngestError::Extraction("scan".into()))),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_of(ChatError::vector_store("pinecone", "503")),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_of(ChatError::Storage("disk full".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn caller_errors_keep_their_bare_message() {
        let (_, message) = ApiError::from(ChatError::Validation("Empty file".into()))
            .status_and_message();
        assert_eq!(message, "Empty file");
    }
}
