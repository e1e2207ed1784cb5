use image::DynamicImage;

use crate::error::{CoreError, Result};
use crate::layout::Word;

#[cfg(feature = "ocr")]
use {image::ImageFormat, leptess::LepTess, std::io::Cursor};

const TSV_COLUMNS: usize = 12;

/// Parses Tesseract TSV output into positioned words.
///
/// Header rows, structural rows (block/paragraph/line) and blank tokens are skipped.
pub fn parse_tsv(tsv: &str) -> Vec<Word> {
    tsv.lines().filter_map(parse_tsv_row).collect()
}

fn parse_tsv_row(row: &str) -> Option<Word> {
    let fields: Vec<&str> = row.split('\t').collect();
    if fields.len() < TSV_COLUMNS {
        return None;
    }
    let level: u32 = fields[0].trim().parse().ok()?;
    if level != 5 {
        return None;
    }
    let text = fields[11].trim();
    if text.is_empty() {
        return None;
    }
    Some(Word {
        text: text.to_string(),
        x: fields[6].trim().parse().ok()?,
        y: fields[7].trim().parse().ok()?,
        width: fields[8].trim().parse().ok()?,
        height: fields[9].trim().parse().ok()?,
    })
}

fn language_spec(languages: &[String]) -> String {
    if languages.is_empty() {
        "eng".to_string()
    } else {
        languages.join("+")
    }
}

#[cfg(feature = "ocr")]
pub fn image_to_words(image: &DynamicImage, languages: &[String], dpi: u32) -> Result<Vec<Word>> {
    let lang = language_spec(languages);
    let mut tess = LepTess::new(None, &lang)
        .map_err(|e| CoreError::Ocr(format!("failed to initialise tesseract ({lang}): {e}")))?;
    let mut png = Vec::new();
    image.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
    tess.set_image_from_mem(&png)
        .map_err(|e| CoreError::Ocr(format!("failed to load image into tesseract: {e}")))?;
    tess.set_source_resolution(i32::try_from(dpi).unwrap_or(300));
    let tsv = tess
        .get_tsv_text(0)
        .map_err(|e| CoreError::Ocr(format!("tesseract failed: {e}")))?;
    Ok(parse_tsv(&tsv))
}

#[cfg(not(feature = "ocr"))]
pub fn image_to_words(
    _image: &DynamicImage,
    languages: &[String],
    _dpi: u32,
) -> Result<Vec<Word>> {
    tracing::debug!(lang = %language_spec(languages), "ocr requested without the ocr feature");
    Err(CoreError::OcrSupportDisabled)
}
