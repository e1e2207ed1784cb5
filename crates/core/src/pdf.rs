use std::path::Path;

use image::DynamicImage;

use crate::error::{CoreError, Result};

#[cfg(feature = "pdfium")]
use pdfium_render::prelude::*;

const POINTS_PER_INCH: f32 = 72.0;

/// Pixel size of a page of `points` PDF points rendered at `dpi`.
pub fn points_to_pixels(points: f32, dpi: u32) -> i32 {
    (points * dpi as f32 / POINTS_PER_INCH).round() as i32
}

/// Renders every page of the PDF at `path` to an image at `dpi`.
#[cfg(feature = "pdfium")]
pub fn render_pdf_pages(path: &Path, dpi: u32) -> Result<Vec<DynamicImage>> {
    let bindings = Pdfium::bind_to_system_library()
        .map_err(|e| CoreError::Render(format!("pdfium binding failed: {e}")))?;
    let pdfium = Pdfium::new(bindings);
    let document = pdfium
        .load_pdf_from_file(path, None)
        .map_err(|e| CoreError::Render(format!("pdfium load failed: {e}")))?;
    let mut images = Vec::new();
    for (idx, page) in document.pages().iter().enumerate() {
        let render_config = PdfRenderConfig::new()
            .set_target_width(points_to_pixels(page.width().value, dpi))
            .set_target_height(points_to_pixels(page.height().value, dpi));
        let render = page
            .render_with_config(&render_config)
            .map_err(|e| CoreError::Render(format!("page {} render failed: {e}", idx + 1)))?;
        images.push(render.as_image());
    }
    tracing::debug!(path = %path.display(), pages = images.len(), dpi, "rendered pdf");
    Ok(images)
}

#[cfg(not(feature = "pdfium"))]
pub fn render_pdf_pages(path: &Path, _dpi: u32) -> Result<Vec<DynamicImage>> {
    Err(CoreError::PdfSupportDisabled(path.to_path_buf()))
}
