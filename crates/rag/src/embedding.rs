use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

/// Text to vector seam used by indexing and retrieval.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// One vector per input, in input order.
    async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>>;

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let inputs = vec![text.to_string()];
        let mut output = self.embed_batch(&inputs).await?;
        output
            .pop()
            .ok_or_else(|| anyhow!("embedding service returned no vector"))
    }
}

/// HTTP client for the embedding service: `{"inputs": [...]}` in, `[[f32]]` out.
#[derive(Clone)]
pub struct EmbeddingClient {
    http: Client,
    endpoint: String,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    inputs: &'a [String],
}

impl EmbeddingClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Embedder for EmbeddingClient {
    async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }
        let response = self
            .http
            .post(&self.endpoint)
            .json(&EmbedRequest { inputs })
            .send()
            .await
            .with_context(|| format!("embedding request to {} failed", self.endpoint))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("embedding request failed: {status}: {body}"));
        }
        let vectors: Vec<Vec<f32>> = response
            .json()
            .await
            .context("embedding response is not a list of vectors")?;
        if vectors.len() != inputs.len() {
            return Err(anyhow!(
                "embedding service returned {} vectors for {} inputs",
                vectors.len(),
                inputs.len()
            ));
        }
        Ok(vectors)
    }
}
