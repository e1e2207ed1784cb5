use serde::{Deserialize, Serialize};

/// One extracted fact, e.g. `"Revenue: 180245623 thousand RUB"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metric {
    pub value: String,
}

impl Metric {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageResult {
    pub doc_type: String,
    /// 1-based page number.
    pub page: u32,
    pub metrics: Vec<Metric>,
}

impl PageResult {
    /// Metric strings as they are embedded and stored: `"<doc_type>: <value>"`.
    pub fn metric_texts(&self) -> Vec<String> {
        self.metrics
            .iter()
            .map(|metric| format!("{}: {}", self.doc_type, metric.value))
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentResult {
    #[serde(default)]
    pub source: String,
    pub pages: Vec<PageResult>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeBase {
    pub files: Vec<DocumentResult>,
}

impl KnowledgeBase {
    pub fn pages(&self) -> impl Iterator<Item = &PageResult> {
        self.files.iter().flat_map(|doc| doc.pages.iter())
    }

    pub fn page_count(&self) -> usize {
        self.pages().count()
    }

    pub fn metric_count(&self) -> usize {
        self.pages().map(|page| page.metrics.len()).sum()
    }

    pub fn to_json_pretty(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
