use finrag_core::Metric;
use finrag_llm::{decode_double, generate_with_retry, GenerationRequest, Generator, RetryPolicy};
use serde::Deserialize;
use tracing::error;

use crate::prompts::{metrics_schema, METRICS_INSTRUCTIONS, METRICS_SAMPLING, METRICS_SYSTEM_PROMPT};

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct MetricsPayload {
    pub metrics: Vec<Metric>,
}

impl MetricsPayload {
    /// Trims values and drops blank ones.
    fn cleaned(self) -> Self {
        let metrics = self
            .metrics
            .into_iter()
            .filter_map(|metric| {
                let value = metric.value.trim();
                (!value.is_empty()).then(|| Metric::new(value))
            })
            .collect();
        Self { metrics }
    }
}

pub fn metrics_request(page_text: &str) -> GenerationRequest {
    GenerationRequest::new(format!("{METRICS_INSTRUCTIONS}{page_text}"), METRICS_SAMPLING)
        .with_system(METRICS_SYSTEM_PROMPT)
        .with_schema(metrics_schema())
}

/// Extracts the metric statements of one page.
///
/// `Some` with an empty list when the payload could not be parsed, `None` when
/// the request itself failed (including a service that stayed busy). Neither
/// case is raised to the caller.
pub async fn extract_page_metrics<G>(
    generator: &G,
    page_text: &str,
    policy: &RetryPolicy,
) -> Option<MetricsPayload>
where
    G: Generator + ?Sized,
{
    let request = metrics_request(page_text);
    let body = match generate_with_retry(generator, &request, policy).await {
        Ok(body) => body,
        Err(err) => {
            error!(error = %err, "metrics request failed for page");
            return None;
        }
    };
    match decode_double::<MetricsPayload>(&body) {
        Ok(payload) => Some(payload.cleaned()),
        Err(err) => {
            error!(error = %err, "failed to parse metrics payload");
            Some(MetricsPayload::default())
        }
    }
}
