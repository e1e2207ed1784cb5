use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("serde json error: {0}")]
    SerdeJson(#[from] serde_json::Error),
    #[error("pdf support not enabled: {0:?}")]
    PdfSupportDisabled(PathBuf),
    #[error("ocr support not enabled")]
    OcrSupportDisabled,
    #[error("unsupported input format: {0:?}")]
    UnsupportedInput(PathBuf),
    #[error("invalid glob pattern {pattern}: {reason}")]
    Pattern { pattern: String, reason: String },
    #[error("pdf render failed: {0}")]
    Render(String),
    #[error("ocr failed: {0}")]
    Ocr(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
