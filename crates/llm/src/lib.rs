use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio::time::sleep;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sampling {
    pub frequency_penalty: f32,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Wire shape of one call to the generation endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationRequest {
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    pub frequency_penalty: f32,
    pub temperature: f32,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<Value>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, sampling: Sampling) -> Self {
        Self {
            prompt: prompt.into(),
            system_prompt: None,
            frequency_penalty: sampling.frequency_penalty,
            temperature: sampling.temperature,
            max_tokens: sampling.max_tokens,
            schema: None,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system_prompt = Some(system.into());
        self
    }

    pub fn with_schema(mut self, schema: Value) -> Self {
        self.schema = Some(schema);
        self
    }
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("model service is busy (503)")]
    Busy,
    #[error("model service returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("model request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("failed to decode model payload: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("model payload is not a JSON-encoded string")]
    NotEncodedString,
    #[error("model service still busy after {attempts} attempts")]
    Exhausted { attempts: u32 },
}

impl LlmError {
    pub fn is_busy(&self) -> bool {
        matches!(self, LlmError::Busy)
    }
}

/// A generative-model endpoint.
///
/// Implementations return the raw response body on success, [`LlmError::Busy`]
/// on 503 and [`LlmError::Status`] for any other failure status.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, LlmError>;
}

#[derive(Clone)]
pub struct GenerateClient {
    http: Client,
    endpoint: String,
}

impl GenerateClient {
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
impl Generator for GenerateClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, LlmError> {
        let response = self.http.post(&self.endpoint).json(request).send().await?;
        let status = response.status();
        if status == StatusCode::SERVICE_UNAVAILABLE {
            return Err(LlmError::Busy);
        }
        let body = response.text().await?;
        if !status.is_success() {
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }
}

/// Decodes a body that carries its JSON payload as a JSON string, e.g.
/// `"{\"metrics\":[]}"`.
///
/// A body that is already an object is rejected with
/// [`LlmError::NotEncodedString`] instead of being accepted as-is.
pub fn decode_double<T: DeserializeOwned>(body: &str) -> Result<T, LlmError> {
    let outer: Value = serde_json::from_str(body)?;
    let Value::String(inner) = outer else {
        return Err(LlmError::NotEncodedString);
    };
    Ok(serde_json::from_str(&inner)?)
}

/// Exponential backoff for busy responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 6,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Delay before retrying after failed attempt number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }
}

/// Sends `request`, resending the identical request while the service reports busy.
///
/// Gives up with [`LlmError::Exhausted`] once `policy.max_attempts` busy
/// responses were seen. Other errors are returned immediately.
pub async fn generate_with_retry<G>(
    generator: &G,
    request: &GenerationRequest,
    policy: &RetryPolicy,
) -> Result<String, LlmError>
where
    G: Generator + ?Sized,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match generator.generate(request).await {
            Err(LlmError::Busy) => {
                if attempt >= max_attempts {
                    return Err(LlmError::Exhausted { attempts: attempt });
                }
                let wait = policy.delay_for(attempt);
                warn!(attempt, max_attempts, wait_ms = wait.as_millis() as u64, "model busy, retrying");
                sleep(wait).await;
            }
            other => return other,
        }
    }
}
