use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use finrag_core::{DocumentReader, DocumentResult, KnowledgeBase, PageResult};
use finrag_llm::{Generator, RetryPolicy};
use futures::stream::{self, StreamExt};
use tracing::{debug, error, info, warn};

use crate::metadata::{classify_report_type, ClassifyError};
use crate::metrics::{extract_page_metrics, MetricsPayload};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildOptions {
    /// Maximum number of pages extracted concurrently.
    pub workers: usize,
    pub retry: RetryPolicy,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            workers: 8,
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedDocument {
    pub source: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub knowledge_base: KnowledgeBase,
    pub skipped: Vec<SkippedDocument>,
}

/// Turns one document's page texts into its retained pages.
///
/// The first page decides the report type for the whole document; an empty
/// label keeps every page out. Pages are extracted concurrently (at most
/// `options.workers` at a time) and come back in page order. Pages whose
/// extraction failed or found nothing are dropped.
pub async fn extract_document<G>(
    generator: &G,
    pages: &[String],
    options: &BuildOptions,
) -> Result<Vec<PageResult>, ClassifyError>
where
    G: Generator + ?Sized,
{
    let Some(first_page) = pages.first() else {
        return Ok(Vec::new());
    };
    let report_type = classify_report_type(generator, first_page, &options.retry).await?;
    if report_type.is_empty() {
        warn!("document has no report type, skipping its pages");
        return Ok(Vec::new());
    }

    let total = pages.len();
    let tasks: Vec<_> = pages
        .iter()
        .enumerate()
        .map(|(idx, text)| async move {
            debug!(page = idx + 1, total, "extracting page metrics");
            (idx, extract_page_metrics(generator, text, &options.retry).await)
        })
        .collect();
    let mut extracted: Vec<(usize, Option<MetricsPayload>)> = stream::iter(tasks)
        .buffer_unordered(options.workers.max(1))
        .collect()
        .await;
    extracted.sort_by_key(|(idx, _)| *idx);

    Ok(extracted
        .into_iter()
        .filter_map(|(idx, payload)| {
            let metrics = payload?.metrics;
            if metrics.is_empty() {
                return None;
            }
            Some(PageResult {
                doc_type: report_type.clone(),
                page: u32::try_from(idx + 1).unwrap_or(u32::MAX),
                metrics,
            })
        })
        .collect())
}

/// Builds a fresh knowledge base from `documents`, in the given order.
///
/// A document whose text cannot be extracted, or whose classification gave
/// up, is skipped and listed in the report.
pub async fn build_knowledge_base<G, R>(
    generator: &G,
    reader: Arc<R>,
    documents: &[PathBuf],
    options: &BuildOptions,
) -> BuildReport
where
    G: Generator + ?Sized,
    R: DocumentReader + ?Sized + 'static,
{
    let mut report = BuildReport::default();
    for (idx, path) in documents.iter().enumerate() {
        info!(document = %path.display(), index = idx + 1, total = documents.len(), "processing document");
        let pages = match read_pages(reader.clone(), path).await {
            Ok(pages) => pages,
            Err(err) => {
                error!(document = %path.display(), error = %format!("{err:#}"), "text extraction failed");
                report.skipped.push(SkippedDocument {
                    source: path.clone(),
                    reason: format!("{err:#}"),
                });
                continue;
            }
        };
        match extract_document(generator, &pages, options).await {
            Ok(results) => {
                info!(document = %path.display(), pages = pages.len(), kept = results.len(), "document extracted");
                report.knowledge_base.files.push(DocumentResult {
                    source: source_name(path),
                    pages: results,
                });
            }
            Err(err) => {
                error!(document = %path.display(), error = %err, "classification failed");
                report.skipped.push(SkippedDocument {
                    source: path.clone(),
                    reason: err.to_string(),
                });
            }
        }
    }
    report
}

async fn read_pages<R>(reader: Arc<R>, path: &Path) -> Result<Vec<String>>
where
    R: DocumentReader + ?Sized + 'static,
{
    let owned = path.to_path_buf();
    tokio::task::spawn_blocking(move || reader.read_pages(&owned))
        .await
        .context("text extraction task failed")?
        .with_context(|| format!("failed to extract text from {}", path.display()))
}

fn source_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompts::METRICS_INSTRUCTIONS;
    use crate::testing::{encoded, is_report_type_request, FnGenerator};
    use async_trait::async_trait;
    use finrag_core::Metric;
    use finrag_llm::LlmError;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn options(workers: usize) -> BuildOptions {
        BuildOptions {
            workers,
            retry: RetryPolicy {
                max_attempts: 2,
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(1),
            },
        }
    }

    fn page_of(request: &finrag_llm::GenerationRequest) -> &str {
        request.prompt.trim_start_matches(METRICS_INSTRUCTIONS)
    }

    fn pages(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|t| t.to_string()).collect()
    }

    #[tokio::test]
    async fn label_is_shared_and_order_preserved() {
        let generator = FnGenerator::new(|req| {
            if is_report_type_request(req) {
                return Ok(encoded(json!({"report_type": "Balance Sheet 2022"})));
            }
            let page = page_of(req);
            if page == "p2" {
                return Ok(encoded(json!({"metrics": []})));
            }
            Ok(encoded(json!({"metrics": [{"value": format!("{page} metric")}]})))
        });
        let texts = pages(&["p1", "p2", "p3", "p4", "p5"]);
        let results = extract_document(&generator, &texts, &options(3))
            .await
            .unwrap();
        let numbers: Vec<u32> = results.iter().map(|r| r.page).collect();
        assert_eq!(numbers, vec![1, 3, 4, 5]);
        assert!(results.iter().all(|r| r.doc_type == "Balance Sheet 2022"));
        assert_eq!(results[1].metrics, vec![Metric::new("p3 metric")]);
    }

    /// Later pages answer sooner, so completion order is the reverse of page order.
    struct Staggered {
        pages: u64,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl Generator for Staggered {
        async fn generate(
            &self,
            request: &finrag_llm::GenerationRequest,
        ) -> Result<String, LlmError> {
            if is_report_type_request(request) {
                return Ok(encoded(json!({"report_type": "Report"})));
            }
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            let page: u64 = page_of(request).trim_start_matches('p').parse().unwrap();
            tokio::time::sleep(Duration::from_millis((self.pages + 1 - page) * 15)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(encoded(json!({"metrics": [{"value": format!("p{page} metric")}]})))
        }
    }

    #[tokio::test]
    async fn out_of_order_completion_is_resorted_and_bounded() {
        for workers in [1, 2, 5] {
            let generator = Staggered {
                pages: 5,
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            };
            let texts = pages(&["p1", "p2", "p3", "p4", "p5"]);
            let results = extract_document(&generator, &texts, &options(workers))
                .await
                .unwrap();
            let numbers: Vec<u32> = results.iter().map(|r| r.page).collect();
            assert_eq!(numbers, vec![1, 2, 3, 4, 5], "workers={workers}");
            assert_eq!(results[3].metrics, vec![Metric::new("p4 metric")]);
            let peak = generator.peak.load(Ordering::SeqCst);
            assert!(peak <= workers, "peak {peak} exceeds {workers} workers");
            if workers > 1 {
                assert!(peak > 1, "pages never overlapped with {workers} workers");
            }
        }
    }

    #[tokio::test]
    async fn empty_label_drops_every_page() {
        let generator = FnGenerator::new(|req| {
            if is_report_type_request(req) {
                Ok(encoded(json!({"report_type": "  "})))
            } else {
                Ok(encoded(json!({"metrics": [{"value": "Revenue: 100"}]})))
            }
        });
        let results = extract_document(&generator, &pages(&["a", "b"]), &options(2))
            .await
            .unwrap();
        assert!(results.is_empty());
        assert_eq!(generator.calls(), 1);
    }

    #[tokio::test]
    async fn failed_pages_are_dropped() {
        let generator = FnGenerator::new(|req| {
            if is_report_type_request(req) {
                return Ok(encoded(json!({"report_type": "Report"})));
            }
            match page_of(req) {
                "bad-status" => Err(LlmError::Status {
                    status: 500,
                    body: String::new(),
                }),
                "busy" => Err(LlmError::Busy),
                "garbage" => Ok("not json".to_string()),
                _ => Ok(encoded(json!({"metrics": [{"value": "ok"}]}))),
            }
        });
        let texts = pages(&["first", "bad-status", "busy", "garbage", "last"]);
        let results = extract_document(&generator, &texts, &options(4))
            .await
            .unwrap();
        let numbers: Vec<u32> = results.iter().map(|r| r.page).collect();
        assert_eq!(numbers, vec![1, 5]);
    }

    #[tokio::test]
    async fn no_pages_no_calls() {
        let generator = FnGenerator::new(|_| Ok(encoded(json!({"report_type": "x"}))));
        let results = extract_document(&generator, &[], &options(1)).await.unwrap();
        assert!(results.is_empty());
        assert_eq!(generator.calls(), 0);
    }

    #[tokio::test]
    async fn classifier_exhaustion_is_an_error() {
        let generator = FnGenerator::new(|_| Err(LlmError::Busy));
        let err = extract_document(&generator, &pages(&["a"]), &options(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ClassifyError::Exhausted(_)));
    }
}
