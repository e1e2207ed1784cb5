mod cli;
mod logging;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use finrag_core::{discover_documents, DocumentReader, PageTextExtractor};
use finrag_llm::GenerateClient;
use finrag_rag::{
    build_knowledge_base, EmbeddingClient, Pipeline, PipelineSettings, RagConfig, ReportRequest,
    SqliteVectorStore,
};
use serde_json::Value;
use tracing::info;

use crate::cli::{Cli, Command};

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose || logging::env_flag());
    let config = RagConfig::load(cli.config.as_deref())?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    match cli.command {
        Command::Pages { input } => print_pages(&config, &input),
        Command::Build { input, output } => runtime.block_on(build(&config, input, &output)),
        Command::Load { input } => runtime.block_on(load(&config, input)),
        Command::Report { prompt, query } => runtime.block_on(report(&config, prompt, query)),
    }
}

fn print_pages(config: &RagConfig, input: &Path) -> Result<()> {
    let extractor = PageTextExtractor::new(config.layout.clone());
    let pages = extractor
        .extract_path(input)
        .with_context(|| format!("failed to extract text from {}", input.display()))?;
    for (idx, text) in pages.iter().enumerate() {
        println!("--- Page {} ---", idx + 1);
        println!("{text}");
    }
    Ok(())
}

fn pipeline(config: &RagConfig) -> Result<Pipeline> {
    let store = SqliteVectorStore::open(&config.store.path, config.store.collection.clone())?;
    Ok(Pipeline::new(
        Arc::new(GenerateClient::new(config.services.generate_url.clone())),
        Arc::new(EmbeddingClient::new(config.services.embed_url.clone())),
        Arc::new(store),
        Arc::new(PageTextExtractor::new(config.layout.clone())),
        PipelineSettings::from(config),
    ))
}

async fn build(config: &RagConfig, input: Option<PathBuf>, output: &Path) -> Result<()> {
    let dir = input.unwrap_or_else(|| config.documents.dir.clone());
    if !dir.is_dir() {
        bail!("document directory {} does not exist", dir.display());
    }
    let extractor: Arc<dyn DocumentReader> = Arc::new(PageTextExtractor::new(config.layout.clone()));
    let generator = GenerateClient::new(config.services.generate_url.clone());
    let documents = discover_documents(&dir, &config.documents.pattern)
        .with_context(|| format!("failed to list documents in {}", dir.display()))?;
    let options = PipelineSettings::from(config).build;
    let report = build_knowledge_base(&generator, extractor, &documents, &options).await;
    for skipped in &report.skipped {
        eprintln!("skipped {}: {}", skipped.source.display(), skipped.reason);
    }
    let json = report.knowledge_base.to_json_pretty()?;
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(output, json).with_context(|| format!("failed to write {}", output.display()))?;
    info!(
        output = %output.display(),
        documents = report.knowledge_base.files.len(),
        pages = report.knowledge_base.page_count(),
        metrics = report.knowledge_base.metric_count(),
        "knowledge base written"
    );
    Ok(())
}

async fn load(config: &RagConfig, input: Option<PathBuf>) -> Result<()> {
    let pipeline = pipeline(config)?;
    let summary = match input {
        Some(dir) => pipeline.load_from(&dir).await?,
        None => pipeline.load().await?,
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

async fn report(config: &RagConfig, prompt: String, query: Option<String>) -> Result<()> {
    let answer = pipeline(config)?
        .report(&ReportRequest {
            prompt,
            milvus_prompt: query,
        })
        .await?;
    match answer.answer {
        Value::String(text) => println!("{text}"),
        other => println!("{}", serde_json::to_string_pretty(&other)?),
    }
    Ok(())
}
