mod app;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use finrag_core::PageTextExtractor;
use finrag_llm::GenerateClient;
use finrag_rag::{EmbeddingClient, Pipeline, PipelineSettings, RagConfig, SqliteVectorStore};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::app::{build_router, AppState};

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = RagConfig::load(None)?;
    let store = SqliteVectorStore::open(&config.store.path, config.store.collection.clone())?;
    let generator = GenerateClient::new(config.services.generate_url.clone());
    let embedder = EmbeddingClient::new(config.services.embed_url.clone());
    info!(
        generate = generator.endpoint(),
        embed = embedder.endpoint(),
        store = %store.path().display(),
        collection = store.collection(),
        "pipeline configured"
    );
    let pipeline = Pipeline::new(
        Arc::new(generator),
        Arc::new(embedder),
        Arc::new(store),
        Arc::new(PageTextExtractor::new(config.layout.clone())),
        PipelineSettings::from(&config),
    );
    let app = build_router(Arc::new(AppState::new(pipeline)));

    let addr: SocketAddr = config
        .server
        .bind_addr
        .parse()
        .with_context(|| format!("invalid bind address {}", config.server.bind_addr))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}
