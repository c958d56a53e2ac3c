//! API routes

pub mod chat;
pub mod documents;
pub mod files;
pub mod upload;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::server::AppState;

/// Owner used when a request does not name one.
pub const DEFAULT_OWNER: &str = "demo-user";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerQuery {
    pub user_id: Option<String>,
}

pub(crate) fn owner_or_default(user_id: Option<String>) -> String {
    user_id
        .map(|owner| owner.trim().to_string())
        .filter(|owner| !owner.is_empty())
        .unwrap_or_else(|| DEFAULT_OWNER.to_string())
}

pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/api/upload",
            post(upload::upload).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route("/api/files/:id", get(files::get_file))
        .route("/api/documents", get(documents::list_documents))
        .route(
            "/api/documents/:file_id",
            get(documents::get_document).delete(documents::delete_document),
        )
        .route("/api/embeddings", post(documents::generate_embeddings))
        .route("/api/chat/:file_id", post(chat::chat))
        .route("/api/chat/:file_id/messages", get(chat::list_messages))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
