use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use finrag_core::{discover_documents, DocumentReader, KnowledgeBase};
use finrag_llm::{generate_with_retry, GenerationRequest, Generator, RetryPolicy};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::config::RagConfig;
use crate::embedding::Embedder;
use crate::knowledge::{build_knowledge_base, BuildOptions, BuildReport};
use crate::prompts::ANSWER_SAMPLING;
use crate::store::{IndexedRecord, SearchHit, VectorStore};

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    pub documents_dir: PathBuf,
    pub pattern: String,
    pub dimension: usize,
    pub build: BuildOptions,
    pub default_retrieval: String,
    pub top_k: usize,
    pub retry: RetryPolicy,
}

impl From<&RagConfig> for PipelineSettings {
    fn from(config: &RagConfig) -> Self {
        let retry = config.extraction.retry_policy();
        Self {
            documents_dir: config.documents.dir.clone(),
            pattern: config.documents.pattern.clone(),
            dimension: config.store.dimension,
            build: BuildOptions {
                workers: config.extraction.workers.max(1),
                retry,
            },
            default_retrieval: config.query.default_retrieval.clone(),
            top_k: config.query.top_k,
            retry,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoadSummary {
    pub documents: usize,
    pub documents_skipped: usize,
    pub pages: usize,
    pub records: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ReportRequest {
    pub prompt: String,
    /// Retrieval text; the configured default query is used when absent or blank.
    #[serde(default, alias = "retrieval_query")]
    pub milvus_prompt: Option<String>,
}

impl ReportRequest {
    pub fn retrieval_text<'a>(&'a self, default: &'a str) -> &'a str {
        self.milvus_prompt
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .unwrap_or(default)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportAnswer {
    pub answer: Value,
    pub retrieval_query: String,
    pub hits: Vec<SearchHit>,
}

/// Ingestion and query paths wired to their collaborators.
pub struct Pipeline {
    generator: Arc<dyn Generator>,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    reader: Arc<dyn DocumentReader>,
    settings: PipelineSettings,
}

impl Pipeline {
    pub fn new(
        generator: Arc<dyn Generator>,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        reader: Arc<dyn DocumentReader>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            generator,
            embedder,
            store,
            reader,
            settings,
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Extracts a fresh knowledge base from the documents under `dir`.
    pub async fn build_knowledge_base(&self, dir: &Path) -> Result<BuildReport> {
        if !dir.is_dir() {
            bail!("document directory {} does not exist", dir.display());
        }
        let documents = discover_documents(dir, &self.settings.pattern)
            .with_context(|| format!("failed to list documents in {}", dir.display()))?;
        info!(dir = %dir.display(), documents = documents.len(), "building knowledge base");
        Ok(build_knowledge_base(
            self.generator.as_ref(),
            self.reader.clone(),
            &documents,
            &self.settings.build,
        )
        .await)
    }

    pub async fn load(&self) -> Result<LoadSummary> {
        let dir = self.settings.documents_dir.clone();
        self.load_from(&dir).await
    }

    /// Full re-ingestion: rebuild the knowledge base, then replace the collection.
    pub async fn load_from(&self, dir: &Path) -> Result<LoadSummary> {
        let report = self.build_knowledge_base(dir).await?;
        let records = self.index_knowledge_base(&report.knowledge_base).await?;
        let summary = LoadSummary {
            documents: report.knowledge_base.files.len(),
            documents_skipped: report.skipped.len(),
            pages: report.knowledge_base.page_count(),
            records,
        };
        info!(
            documents = summary.documents,
            skipped = summary.documents_skipped,
            pages = summary.pages,
            records = summary.records,
            "load finished"
        );
        Ok(summary)
    }

    /// Drops and recreates the collection, then embeds and inserts every
    /// metric of `kb` page by page. Returns the number of inserted records.
    pub async fn index_knowledge_base(&self, kb: &KnowledgeBase) -> Result<usize> {
        let dimension = self.settings.dimension;
        self.with_store(move |store| {
            if store.has_collection()? {
                store.drop_collection()?;
            }
            store.create_collection(dimension)
        })
        .await
        .context("failed to recreate collection")?;

        let mut next_id = 0i64;
        let mut inserted = 0usize;
        for page in kb.pages() {
            let texts = page.metric_texts();
            if texts.is_empty() {
                continue;
            }
            let vectors = self
                .embedder
                .embed_batch(&texts)
                .await
                .with_context(|| format!("failed to embed metrics of page {}", page.page))?;
            info!(page = page.page, doc_type = %page.doc_type, texts = ?texts, "indexing page");
            let records: Vec<IndexedRecord> = texts
                .into_iter()
                .zip(vectors)
                .map(|(text, vector)| {
                    let record = IndexedRecord {
                        id: next_id,
                        vector,
                        text,
                    };
                    next_id += 1;
                    record
                })
                .collect();
            inserted += self
                .with_store(move |store| store.insert(&records))
                .await?;
        }
        Ok(inserted)
    }

    /// Retrieves context for the request and asks the model for the answer.
    pub async fn report(&self, request: &ReportRequest) -> Result<ReportAnswer> {
        let retrieval_query = request
            .retrieval_text(&self.settings.default_retrieval)
            .to_string();
        let query_vector = self
            .embedder
            .embed(&retrieval_query)
            .await
            .context("failed to embed retrieval query")?;
        let top_k = self.settings.top_k;
        let hits = self
            .with_store(move |store| store.search(&query_vector, top_k))
            .await
            .context("vector search failed")?;
        debug!(hits = hits.len(), query = %retrieval_query, "retrieved context");

        let prompt = format!("{}\n\n{}", request.prompt, render_context(&hits));
        let generation = GenerationRequest::new(prompt, ANSWER_SAMPLING);
        let body = generate_with_retry(self.generator.as_ref(), &generation, &self.settings.retry)
            .await
            .context("answer generation failed")?;
        let answer = serde_json::from_str::<Value>(&body).unwrap_or(Value::String(body));
        Ok(ReportAnswer {
            answer,
            retrieval_query,
            hits,
        })
    }

    async fn with_store<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn VectorStore) -> Result<T> + Send + 'static,
    {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || f(store.as_ref()))
            .await
            .map_err(|err| anyhow!("vector store task failed: {err}"))?
    }
}

/// One retrieved record per line.
pub fn render_context(hits: &[SearchHit]) -> String {
    hits.iter()
        .map(|hit| format!("{} (score {:.4})", hit.text, hit.score))
        .collect::<Vec<_>>()
        .join("\n")
}
