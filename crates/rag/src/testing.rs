use std::sync::Mutex;

use async_trait::async_trait;
use finrag_llm::{GenerationRequest, Generator, LlmError};

type Respond = dyn Fn(&GenerationRequest) -> Result<String, LlmError> + Send + Sync;

/// Generator driven by a closure; records every request it sees.
pub(crate) struct FnGenerator {
    respond: Box<Respond>,
    pub(crate) seen: Mutex<Vec<GenerationRequest>>,
}

impl FnGenerator {
    pub(crate) fn new<F>(respond: F) -> Self
    where
        F: Fn(&GenerationRequest) -> Result<String, LlmError> + Send + Sync + 'static,
    {
        Self {
            respond: Box::new(respond),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

#[async_trait]
impl Generator for FnGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, LlmError> {
        self.seen.lock().unwrap().push(request.clone());
        (self.respond)(request)
    }
}

pub(crate) fn is_report_type_request(request: &GenerationRequest) -> bool {
    request
        .schema
        .as_ref()
        .and_then(|schema| schema["properties"].get("report_type"))
        .is_some()
}

/// Wraps `payload` the way the model service does: a JSON string holding JSON.
pub(crate) fn encoded(payload: serde_json::Value) -> String {
    serde_json::Value::String(payload.to_string()).to_string()
}
