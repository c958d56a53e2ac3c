mod server;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use pdf_chat_core::{
    import_folder, probe_dimensions, AnswerOrchestrator, CharacterNgramEmbedder, ChatConfig,
    ChatModel, ChunkingConfig, Embedder, ExtractiveModel, LocalBlobStore, LopdfExtractor,
    MemoryVectorIndex, MetadataStore, OpenAiClient, OpenAiConfig, PineconeConfig, PineconeStore,
    Question, Services, SqliteMetadataStore, VectorIndex, DEFAULT_EMBEDDING_DIMENSIONS,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_LOG_FILTER: &str = "pdf_chat_core=info,pdf_chat_server=info,tower_http=info";

#[derive(Parser)]
#[command(name = "pdf-chat-server", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Directory holding the blob store and the metadata database.
    #[arg(long, env = "PDF_CHAT_DATA_DIR", default_value = "./data", global = true)]
    data_dir: PathBuf,

    /// Where document vectors are stored.
    #[arg(long, env = "PDF_CHAT_VECTOR_BACKEND", value_enum, default_value_t = VectorBackend::Pinecone, global = true)]
    vector_backend: VectorBackend,

    /// Which embedding and completion models answer questions.
    #[arg(long, env = "PDF_CHAT_MODEL_BACKEND", value_enum, default_value_t = ModelBackend::Openai, global = true)]
    model_backend: ModelBackend,

    /// Pinecone API key
    #[arg(long, env = "PINECONE_API_KEY", hide_env_values = true, global = true)]
    pinecone_api_key: Option<String>,

    /// Pinecone index host, e.g. https://pdfs-abc123.svc.pinecone.io
    #[arg(long, env = "PINECONE_INDEX_HOST", global = true)]
    pinecone_index_host: Option<String>,

    /// OpenAI API key
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true, global = true)]
    openai_api_key: Option<String>,

    /// Base URL of an OpenAI-compatible API.
    #[arg(long, env = "OPENAI_BASE_URL", default_value = "https://api.openai.com/v1", global = true)]
    openai_base_url: String,

    #[arg(long, env = "OPENAI_EMBEDDING_MODEL", default_value = "text-embedding-3-small", global = true)]
    embedding_model: String,

    /// Must match the dimension of the vector index.
    #[arg(long, env = "OPENAI_EMBEDDING_DIMENSIONS", default_value = "1536", global = true)]
    embedding_dimensions: usize,

    #[arg(long, env = "OPENAI_CHAT_MODEL", default_value = "gpt-4o", global = true)]
    chat_model: String,

    #[arg(long, env = "PDF_CHAT_CHUNK_SIZE", default_value = "1000", global = true)]
    chunk_size: usize,

    #[arg(long, env = "PDF_CHAT_CHUNK_OVERLAP", default_value = "200", global = true)]
    chunk_overlap: usize,

    /// Chunks retrieved per question.
    #[arg(long, env = "PDF_CHAT_TOP_K", default_value = "4", global = true)]
    top_k: usize,

    /// Pause after writing vectors before they are queried.
    #[arg(long, env = "PDF_CHAT_SETTLE_DELAY_MS", default_value = "1000", global = true)]
    settle_delay_ms: u64,

    /// Timeout for every call to a hosted API.
    #[arg(long, env = "PDF_CHAT_HTTP_TIMEOUT_SECS", default_value = "60", global = true)]
    http_timeout_secs: u64,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API.
    Serve {
        #[arg(long, env = "PDF_CHAT_BIND", default_value = "127.0.0.1:3000")]
        bind: SocketAddr,
        /// Largest accepted upload, in bytes.
        #[arg(long, env = "PDF_CHAT_MAX_UPLOAD_BYTES", default_value = "52428800")]
        max_upload_bytes: usize,
    },
    /// Upload every PDF below a folder.
    Import {
        /// Folder that contains PDFs recursively.
        #[arg(long)]
        folder: PathBuf,
        #[arg(long, default_value = server::routes::DEFAULT_OWNER)]
        owner: String,
    },
    /// Ask one question about an uploaded document.
    Ask {
        /// Client file id the document was uploaded with.
        #[arg(long)]
        file_id: String,
        #[arg(long, default_value = server::routes::DEFAULT_OWNER)]
        owner: String,
        #[arg(long)]
        question: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum VectorBackend {
    Pinecone,
    Memory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ModelBackend {
    Openai,
    Offline,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        "pdf-chat-server boot"
    );

    match &cli.command {
        Command::Serve {
            bind,
            max_upload_bytes,
        } => {
            let orchestrator = build_orchestrator(&cli).await?;
            server::serve(server::AppState::new(orchestrator), *bind, *max_upload_bytes)
                .await
                .context("http server failed")?;
        }
        Command::Import { folder, owner } => {
            let blobs = LocalBlobStore::open(cli.data_dir.join("blobs")).await?;
            let metadata = open_metadata(&cli).await?;
            let report = import_folder(folder, owner, &blobs, metadata.as_ref()).await?;

            for skipped in &report.skipped {
                warn!(path = %skipped.path.display(), reason = %skipped.reason, "skipped pdf");
            }
            for record in &report.imported {
                println!("{}  {}  {}", record.external_id, record.id, record.file_name);
            }
            println!(
                "{} pdf(s) imported, {} skipped at {}",
                report.imported.len(),
                report.skipped.len(),
                Utc::now().to_rfc3339()
            );
        }
        Command::Ask {
            file_id,
            owner,
            question,
        } => {
            let orchestrator = build_orchestrator(&cli).await?;
            let answer = orchestrator
                .answer(&Question {
                    external_id: file_id.clone(),
                    owner_id: owner.clone(),
                    text: question.clone(),
                })
                .await?;

            println!("{}", answer.answer_text);
            if answer.regenerated {
                println!("(embeddings were regenerated for this question)");
            }
            for chunk in answer.source_chunks {
                println!(
                    "[chunk {}] score={:.4} file={}",
                    chunk.metadata.chunk_index, chunk.score, chunk.metadata.source_file_name
                );
                println!("  {}", chunk.content.replace('\n', "\n  "));
            }
        }
    }

    Ok(())
}

async fn open_metadata(cli: &Cli) -> anyhow::Result<Arc<dyn MetadataStore>> {
    tokio::fs::create_dir_all(&cli.data_dir)
        .await
        .with_context(|| format!("creating {}", cli.data_dir.display()))?;
    let store = SqliteMetadataStore::open(&cli.data_dir.join("metadata.db")).await?;
    Ok(Arc::new(store))
}

async fn build_orchestrator(cli: &Cli) -> anyhow::Result<AnswerOrchestrator> {
    let timeout = Duration::from_secs(cli.http_timeout_secs);

    let embedder: Arc<dyn Embedder>;
    let model: Arc<dyn ChatModel>;
    match cli.model_backend {
        ModelBackend::Openai => {
            let api_key = cli
                .openai_api_key
                .clone()
                .context("OPENAI_API_KEY is required for the openai model backend")?;
            let client = Arc::new(OpenAiClient::new(OpenAiConfig {
                base_url: cli.openai_base_url.clone(),
                embedding_model: cli.embedding_model.clone(),
                embedding_dimensions: cli.embedding_dimensions,
                chat_model: cli.chat_model.clone(),
                timeout,
                ..OpenAiConfig::new(api_key)
            })?);
            embedder = client.clone();
            model = client;
        }
        ModelBackend::Offline => {
            embedder = Arc::new(CharacterNgramEmbedder {
                dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
            });
            model = Arc::new(ExtractiveModel);
        }
    }

    probe_dimensions(embedder.as_ref())
        .await
        .context("embedding model check failed")?;

    let index: Arc<dyn VectorIndex> = match cli.vector_backend {
        VectorBackend::Pinecone => {
            let config = PineconeConfig {
                api_key: cli
                    .pinecone_api_key
                    .clone()
                    .context("PINECONE_API_KEY is required for the pinecone vector backend")?,
                index_host: cli
                    .pinecone_index_host
                    .clone()
                    .context("PINECONE_INDEX_HOST is required for the pinecone vector backend")?,
                timeout,
            };
            Arc::new(PineconeStore::new(&config)?)
        }
        VectorBackend::Memory => {
            warn!("memory vector backend: embeddings are lost on restart and rebuilt on demand");
            Arc::new(MemoryVectorIndex::new())
        }
    };

    let services = Services {
        blobs: Arc::new(LocalBlobStore::open(cli.data_dir.join("blobs")).await?),
        metadata: open_metadata(cli).await?,
        extractor: Arc::new(LopdfExtractor),
        index,
        embedder,
        model,
    };
    let config = ChatConfig {
        chunking: ChunkingConfig {
            chunk_size: cli.chunk_size,
            chunk_overlap: cli.chunk_overlap,
        },
        top_k: cli.top_k,
        settle_delay: Duration::from_millis(cli.settle_delay_ms),
    };

    Ok(AnswerOrchestrator::new(services, config)?)
}
