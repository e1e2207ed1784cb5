use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use finrag_core::ExtractorConfig;
use finrag_llm::RetryPolicy;
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_PATH: &str = "finrag.toml";
pub const DEFAULT_RETRIEVAL_QUERY: &str = "Дай все данные компании МТС c начала ПЕРВОГО квартала 2020 (Q1 2020) года по конец ТРЕТЬЕГО квартала 2022 (Q3 2022)";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    pub services: ServicesConfig,
    pub store: StoreConfig,
    pub documents: DocumentsConfig,
    pub layout: ExtractorConfig,
    pub extraction: ExtractionConfig,
    pub query: QueryConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServicesConfig {
    pub generate_url: String,
    pub embed_url: String,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            generate_url: "http://127.0.0.1:8080/generate".to_string(),
            embed_url: "http://127.0.0.1:8081/embed".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub path: PathBuf,
    pub collection: String,
    pub dimension: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("db/finrag.sqlite"),
            collection: "metrics_collection".to_string(),
            dimension: 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentsConfig {
    pub dir: PathBuf,
    pub pattern: String,
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("samples"),
            pattern: "*.pdf".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Upper bound on concurrent page extraction calls per document.
    pub workers: usize,
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            workers: 8,
            max_attempts: 6,
            base_delay_ms: 500,
            max_delay_ms: 30_000,
        }
    }
}

impl ExtractionConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms.max(self.base_delay_ms)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Used when a report request carries no retrieval text of its own.
    pub default_retrieval: String,
    pub top_k: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_retrieval: DEFAULT_RETRIEVAL_QUERY.to_string(),
            top_k: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:5555".to_string(),
        }
    }
}

impl RagConfig {
    /// Reads `path` (or `FINRAG_CONFIG`, or `finrag.toml`) and applies
    /// `FINRAG_*` environment overrides. A missing file means defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => env::var("FINRAG_CONFIG")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH)),
        };
        let mut config = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            Self::from_toml(&contents)
                .with_context(|| format!("invalid config {}", path.display()))?
        } else {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            Self::default()
        };
        config.apply_overrides(|key| env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("FINRAG_GENERATE_URL") {
            self.services.generate_url = url;
        }
        if let Some(url) = lookup("FINRAG_EMBED_URL") {
            self.services.embed_url = url;
        }
        if let Some(path) = lookup("FINRAG_DB") {
            self.store.path = PathBuf::from(path);
        }
        if let Some(name) = lookup("FINRAG_COLLECTION") {
            self.store.collection = name;
        }
        if let Some(dir) = lookup("FINRAG_SAMPLES") {
            self.documents.dir = PathBuf::from(dir);
        }
        if let Some(workers) = lookup("FINRAG_WORKERS") {
            self.extraction.workers = workers
                .trim()
                .parse()
                .with_context(|| format!("FINRAG_WORKERS must be a number, got {workers}"))?;
        }
        if let Some(addr) = lookup("FINRAG_BIND_ADDR") {
            self.server.bind_addr = addr;
        }
        Ok(())
    }
}
