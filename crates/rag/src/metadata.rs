//! Document-level classification: one report-type label per document,
//! derived from the text of its first page.

use finrag_llm::{
    decode_double, generate_with_retry, GenerationRequest, Generator, LlmError, RetryPolicy,
};
use serde::Deserialize;
use thiserror::Error;
use tracing::{error, info};

use crate::prompts::{report_type_schema, REPORT_TYPE_SAMPLING, REPORT_TYPE_SYSTEM_PROMPT};

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ReportTypePayload {
    pub report_type: String,
}

#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("report type classification gave up: {0}")]
    Exhausted(#[source] LlmError),
}

pub fn report_type_request(first_page: &str) -> GenerationRequest {
    GenerationRequest::new(first_page, REPORT_TYPE_SAMPLING)
        .with_system(REPORT_TYPE_SYSTEM_PROMPT)
        .with_schema(report_type_schema())
}

/// Returns the trimmed report type, or an empty string when the document
/// cannot be classified.
///
/// Failure statuses and unparseable payloads are logged and yield `""`. Only a
/// service that stays busy for every allowed attempt is reported as an error.
pub async fn classify_report_type<G>(
    generator: &G,
    first_page: &str,
    policy: &RetryPolicy,
) -> Result<String, ClassifyError>
where
    G: Generator + ?Sized,
{
    let request = report_type_request(first_page);
    let body = match generate_with_retry(generator, &request, policy).await {
        Ok(body) => body,
        Err(err @ LlmError::Exhausted { .. }) => return Err(ClassifyError::Exhausted(err)),
        Err(err) => {
            error!(error = %err, "report type request failed");
            return Ok(String::new());
        }
    };
    match decode_double::<ReportTypePayload>(&body) {
        Ok(payload) => {
            let report_type = payload.report_type.trim().to_string();
            info!(report_type = %report_type, "classified document");
            Ok(report_type)
        }
        Err(err) => {
            error!(error = %err, "failed to parse report type");
            Ok(String::new())
        }
    }
}
