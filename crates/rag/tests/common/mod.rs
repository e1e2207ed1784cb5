#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use finrag_core::{CoreError, DocumentReader};
use finrag_rag::prompts::METRICS_INSTRUCTIONS;
use finrag_rag::{
    BuildOptions, Embedder, GenerationRequest, Generator, LlmError, Pipeline, PipelineSettings,
    RetryPolicy, SqliteVectorStore,
};
use serde_json::Value;
use tempfile::TempDir;

pub const DIMENSION: usize = 4;

pub enum Call<'a> {
    Classify(&'a str),
    Metrics(&'a str),
    Answer(&'a str),
}

impl<'a> Call<'a> {
    fn of(request: &'a GenerationRequest) -> Self {
        let is_classify = request
            .schema
            .as_ref()
            .and_then(|schema| schema["properties"].get("report_type"))
            .is_some();
        if is_classify {
            Call::Classify(&request.prompt)
        } else if let Some(page) = request.prompt.strip_prefix(METRICS_INSTRUCTIONS) {
            Call::Metrics(page)
        } else {
            Call::Answer(&request.prompt)
        }
    }
}

type Respond = dyn Fn(Call<'_>) -> Result<String, LlmError> + Send + Sync;

pub struct ScriptedGenerator {
    respond: Box<Respond>,
    pub seen: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedGenerator {
    pub fn new<F>(respond: F) -> Arc<Self>
    where
        F: Fn(Call<'_>) -> Result<String, LlmError> + Send + Sync + 'static,
    {
        Arc::new(Self {
            respond: Box::new(respond),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn prompts(&self) -> Vec<String> {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .map(|req| req.prompt.clone())
            .collect()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, LlmError> {
        self.seen.lock().unwrap().push(request.clone());
        (self.respond)(Call::of(request))
    }
}

/// A JSON string holding `payload`, as the model service sends it.
pub fn encoded(payload: Value) -> String {
    Value::String(payload.to_string()).to_string()
}

/// Deterministic embeddings derived from the text bytes.
#[derive(Default)]
pub struct StubEmbedder {
    pub fail: AtomicBool,
    pub inputs: Mutex<Vec<String>>,
}

pub fn vector_for(text: &str) -> Vec<f32> {
    let sum: u32 = text.bytes().map(u32::from).sum();
    vec![
        1.0,
        text.len() as f32 / 100.0,
        (sum % 97) as f32 / 97.0,
        (sum % 13) as f32 / 13.0,
    ]
}

#[async_trait]
impl Embedder for StubEmbedder {
    async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(anyhow!("embedding request failed: 500 Internal Server Error"));
        }
        self.inputs.lock().unwrap().extend(inputs.iter().cloned());
        Ok(inputs.iter().map(|text| vector_for(text)).collect())
    }
}

/// Serves page texts by file name; names without an entry fail extraction.
#[derive(Default)]
pub struct MapReader {
    pages: HashMap<String, Vec<String>>,
}

impl MapReader {
    pub fn with(mut self, name: &str, pages: &[&str]) -> Self {
        self.pages.insert(
            name.to_string(),
            pages.iter().map(|page| page.to_string()).collect(),
        );
        self
    }
}

impl DocumentReader for MapReader {
    fn read_pages(&self, path: &Path) -> finrag_core::Result<Vec<String>> {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.pages
            .get(&name)
            .cloned()
            .ok_or_else(|| CoreError::UnsupportedInput(path.to_path_buf()))
    }
}

pub struct Harness {
    pub dir: TempDir,
    pub docs: PathBuf,
    pub store: Arc<SqliteVectorStore>,
    pub embedder: Arc<StubEmbedder>,
    pub pipeline: Pipeline,
}

pub fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        base_delay: std::time::Duration::from_millis(1),
        max_delay: std::time::Duration::from_millis(2),
    }
}

pub fn settings(docs: &Path) -> PipelineSettings {
    PipelineSettings {
        documents_dir: docs.to_path_buf(),
        pattern: "*.pdf".to_string(),
        dimension: DIMENSION,
        build: BuildOptions {
            workers: 2,
            retry: fast_retry(3),
        },
        default_retrieval: "all MTS data from Q1 2020 to Q3 2022".to_string(),
        top_k: 10,
        retry: fast_retry(3),
    }
}

/// Creates placeholder files for `names` and wires a pipeline over them.
pub fn harness(generator: Arc<ScriptedGenerator>, reader: MapReader, names: &[&str]) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let docs = dir.path().join("samples");
    std::fs::create_dir_all(&docs).unwrap();
    for name in names {
        std::fs::write(docs.join(name), b"%PDF-1.4").unwrap();
    }
    let store =
        Arc::new(SqliteVectorStore::open(dir.path().join("db/test.sqlite"), "metrics").unwrap());
    let embedder = Arc::new(StubEmbedder::default());
    let pipeline = Pipeline::new(
        generator,
        embedder.clone(),
        store.clone(),
        Arc::new(reader),
        settings(&docs),
    );
    Harness {
        dir,
        docs,
        store,
        embedder,
        pipeline,
    }
}
