pub mod config;
pub mod embedding;
pub mod knowledge;
pub mod metadata;
pub mod metrics;
pub mod pipeline;
pub mod prompts;
pub mod store;

#[cfg(test)]
mod testing;

pub use config::{
    DocumentsConfig, ExtractionConfig, QueryConfig, RagConfig, ServerConfig, ServicesConfig,
    StoreConfig, DEFAULT_CONFIG_PATH, DEFAULT_RETRIEVAL_QUERY,
};
pub use embedding::{Embedder, EmbeddingClient};
pub use finrag_llm::{GenerateClient, GenerationRequest, Generator, LlmError, RetryPolicy};
pub use knowledge::{
    build_knowledge_base, extract_document, BuildOptions, BuildReport, SkippedDocument,
};
pub use metadata::{classify_report_type, ClassifyError, ReportTypePayload};
pub use metrics::{extract_page_metrics, MetricsPayload};
pub use pipeline::{
    render_context, LoadSummary, Pipeline, PipelineSettings, ReportAnswer, ReportRequest,
};
pub use store::{cosine_similarity, IndexedRecord, SearchHit, SqliteVectorStore, VectorStore};
