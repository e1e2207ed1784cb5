use std::path::{Path, PathBuf};

use image::DynamicImage;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::layout::{reconstruct_page_text, LayoutConfig};
use crate::ocr::image_to_words;
use crate::pdf::render_pdf_pages;

const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "tif", "tiff"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    pub dpi: u32,
    pub languages: Vec<String>,
    #[serde(flatten)]
    pub layout: LayoutConfig,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            dpi: 300,
            languages: vec!["rus".to_string(), "eng".to_string()],
            layout: LayoutConfig::default(),
        }
    }
}

/// Anything that can turn a source document into per-page text.
pub trait DocumentReader: Send + Sync {
    /// Returns one text per page, index-aligned with page numbers.
    fn read_pages(&self, path: &Path) -> Result<Vec<String>>;
}

/// OCR-backed reader: renders pages, recognizes words, rebuilds lines and columns.
#[derive(Debug, Clone, Default)]
pub struct PageTextExtractor {
    config: ExtractorConfig,
}

impl PageTextExtractor {
    pub fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }

    pub fn extract_path(&self, path: &Path) -> Result<Vec<String>> {
        let ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase())
            .unwrap_or_default();
        let images = if ext == "pdf" {
            render_pdf_pages(path, self.config.dpi)?
        } else if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            vec![image::open(path)?]
        } else {
            return Err(CoreError::UnsupportedInput(path.to_path_buf()));
        };
        let pages = self.extract_images(&images)?;
        tracing::info!(path = %path.display(), pages = pages.len(), "extracted page text");
        Ok(pages)
    }

    /// OCRs pages in parallel; the output keeps the input page order.
    pub fn extract_images(&self, images: &[DynamicImage]) -> Result<Vec<String>> {
        images
            .par_iter()
            .map(|image| {
                let words = image_to_words(image, &self.config.languages, self.config.dpi)?;
                Ok(reconstruct_page_text(words, &self.config.layout))
            })
            .collect()
    }
}

impl DocumentReader for PageTextExtractor {
    fn read_pages(&self, path: &Path) -> Result<Vec<String>> {
        self.extract_path(path)
    }
}

/// Lists files directly under `dir` matching any of the comma separated glob
/// `patterns`, sorted by path.
pub fn discover_documents(dir: &Path, patterns: &str) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    for pattern in patterns.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let full = dir.join(pattern);
        let full = full.to_string_lossy();
        let entries = glob::glob(&full).map_err(|e| CoreError::Pattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;
        for entry in entries {
            match entry {
                Ok(path) if path.is_file() => found.push(path),
                Ok(_) => {}
                Err(err) => tracing::warn!(error = %err, "unreadable directory entry"),
            }
        }
    }
    found.sort();
    found.dedup();
    Ok(found)
}
