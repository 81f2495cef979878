use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use react_rag::chat::IMAGE_FETCH_TIMEOUT;
use react_rag::config::{DatasetArgs, LimitArgs, OpenAiArgs, PineconeArgs, StoreArgs};
use react_rag::server::{router, AppState};
use react_rag::{
    ChatService, HttpImageFetcher, OpenAiChat, ReactAssistant, SnippetIngestor, SnippetRetriever,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "react-rag-server",
    about = "HTTP API generating React code with retrieved snippet context"
)]
struct ServerCli {
    /// Address to bind the HTTP server to (host:port)
    #[arg(long, env = "REACT_RAG_BIND", default_value = "127.0.0.1:5000")]
    bind: String,

    /// Chat model used for code generation and mockup analysis
    #[arg(long, env = "REACT_RAG_CHAT_MODEL", default_value = "gpt-4o")]
    chat_model: String,

    /// Sampling temperature for code generation
    #[arg(long, default_value_t = 0.3)]
    code_temperature: f32,

    /// Seconds before a code-generation request times out
    #[arg(long, default_value_t = 45)]
    code_timeout_secs: u64,

    /// Sampling temperature for mockup analysis
    #[arg(long, default_value_t = 0.1)]
    vision_temperature: f32,

    /// Seconds before a mockup-analysis request times out
    #[arg(long, default_value_t = 30)]
    vision_timeout_secs: u64,

    /// Attempts per completion request
    #[arg(long, default_value_t = 2)]
    completion_attempts: usize,

    /// Max cached query embeddings kept in-memory (0 disables caching)
    #[arg(long, default_value_t = 1024)]
    embedding_cache_size: usize,

    /// Generate code without retrieved context
    #[arg(long, default_value_t = false)]
    disable_retrieval: bool,

    #[command(flatten)]
    dataset: DatasetArgs,

    #[command(flatten)]
    limits: LimitArgs,

    #[command(flatten)]
    openai: OpenAiArgs,

    #[command(flatten)]
    pinecone: PineconeArgs,

    #[command(flatten)]
    store: StoreArgs,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let cli = ServerCli::parse();
    let addr: SocketAddr = cli
        .bind
        .parse()
        .with_context(|| format!("invalid bind address {}", cli.bind))?;

    // Blocking clients are built and dropped outside the async runtime.
    let state = build_state(&cli)?;
    let runtime = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;
    runtime.block_on(serve(addr, state.clone()))?;
    drop(runtime);
    drop(state);
    Ok(())
}

fn build_state(cli: &ServerCli) -> Result<AppState> {
    let limits = cli.limits.limits();
    let store = Arc::new(cli.store.connect()?);
    let embedder = Arc::new(cli.openai.embedder()?);
    let index = Arc::new(cli.pinecone.open().context("failed to open Pinecone index")?);
    info!(host = index.host(), "pinecone index ready");

    let retriever = (!cli.disable_retrieval).then(|| {
        Arc::new(SnippetRetriever::new(
            embedder.clone(),
            index.clone(),
            cli.embedding_cache_size,
        ))
    });
    let code_llm = OpenAiChat::new(
        &cli.openai.openai_api_key,
        &cli.openai.openai_base_url,
        cli.chat_model.clone(),
        cli.code_temperature,
        Duration::from_secs(cli.code_timeout_secs.max(1)),
        cli.completion_attempts,
    )?;
    let vision_llm = OpenAiChat::new(
        &cli.openai.openai_api_key,
        &cli.openai.openai_base_url,
        cli.chat_model.clone(),
        cli.vision_temperature,
        Duration::from_secs(cli.vision_timeout_secs.max(1)),
        cli.completion_attempts,
    )?;
    info!(
        model = code_llm.model(),
        retrieval = !cli.disable_retrieval,
        "chat models ready"
    );
    let assistant = Arc::new(ReactAssistant::new(
        retriever,
        Arc::new(code_llm),
        Arc::new(vision_llm),
    ));
    let images = Arc::new(HttpImageFetcher::new(IMAGE_FETCH_TIMEOUT)?);

    let chat = ChatService::new(
        store.clone(),
        assistant,
        images,
        embedder.clone(),
        index.clone(),
        limits.clone(),
    );
    let ingestor = SnippetIngestor::new(store, embedder, index, limits);
    let dataset = Arc::new(cli.dataset.source()?);
    Ok(AppState::new(Arc::new(chat), Arc::new(ingestor), dataset))
}

async fn serve(addr: SocketAddr, state: AppState) -> Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("react-rag-server listening on http://{addr}");
    axum::serve(listener, app).await.context("server shutdown")?;
    Ok(())
}
