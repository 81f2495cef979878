use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use react_rag::config::{DatasetArgs, LimitArgs, OpenAiArgs, PineconeArgs, StoreArgs};
use react_rag::dataset::DatasetSource;
use react_rag::{JsonlDataset, SnippetIngestor};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "snippet-loader",
    about = "Load React code examples into the document store and vector index"
)]
struct LoaderCli {
    /// Local JSONL file of dataset records (reads the Hugging Face dataset when absent)
    #[arg(long, env = "REACT_RAG_INPUT")]
    input: Option<PathBuf>,

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
    let cli = LoaderCli::parse();

    let source: Box<dyn DatasetSource> = match &cli.input {
        Some(path) => Box::new(JsonlDataset::new(cli.dataset.dataset.clone(), path.clone())),
        None => Box::new(cli.dataset.source()?),
    };
    let store = Arc::new(cli.store.connect()?);
    let embedder = Arc::new(cli.openai.embedder()?);
    let index = Arc::new(cli.pinecone.open().context("failed to open Pinecone index")?);
    info!(dataset = source.name(), "loader configured");

    let ingestor = SnippetIngestor::new(store, embedder, index, cli.limits.limits());
    let report = ingestor
        .run(source.as_ref())
        .context("ingestion run failed")?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
