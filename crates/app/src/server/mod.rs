//! HTTP API for uploading PDFs and chatting with them.

pub mod error;
pub mod extract;
pub mod routes;

use pdf_chat_core::AnswerOrchestrator;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<AnswerOrchestrator>,
}

impl AppState {
    pub fn new(orchestrator: AnswerOrchestrator) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
        }
    }
}

pub async fn serve(state: AppState, bind: SocketAddr, max_upload_bytes: usize) -> std::io::Result<()> {
    let app = routes::router(state, max_upload_bytes);
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(address = %bind, "pdf-chat-server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("pdf-chat-server shut down");
    Ok(())
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            warn!(%error, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                warn!(%error, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { info!("received SIGINT"); }
        () = terminate => { info!("received SIGTERM"); }
    }
}
