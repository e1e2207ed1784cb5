mod error;
mod extractor;
mod knowledge;
mod layout;
mod ocr;
mod pdf;

pub use error::{CoreError, Result};
pub use extractor::{discover_documents, DocumentReader, ExtractorConfig, PageTextExtractor};
pub use knowledge::{DocumentResult, KnowledgeBase, Metric, PageResult};
pub use layout::{group_lines, quantize_y, reconstruct_page_text, LayoutConfig, Line, Word};
pub use ocr::{image_to_words, parse_tsv};
pub use pdf::{points_to_pixels, render_pdf_pages};
