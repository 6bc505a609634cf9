//! Rendered article-page scraping.
//!
//! The markup coupling lives entirely behind `extract_images` and
//! `extract_pdf_url`; structural drift in the upstream page should only ever
//! touch this module.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use scraper::{Html, Selector};

const PMC_HOST: &str = "https://www.ncbi.nlm.nih.gov";

const IMAGE_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".gif", ".tif", ".tiff"];

// Figure graphics, including the "graphic zoom-in" subclass.
static GRAPHIC_IMG: Lazy<Selector> =
    Lazy::new(|| Selector::parse("img.graphic").expect("valid selector"));

static CITATION_PDF_META: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"meta[name="citation_pdf_url"]"#).expect("valid selector"));

/// Figure image URLs: absolute, first-seen order, deduplicated, recognized
/// raster extensions only.
pub fn extract_images(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut images = Vec::new();

    for element in document.select(&GRAPHIC_IMG) {
        let Some(src) = element
            .value()
            .attr("src")
            .or_else(|| element.value().attr("data-src"))
        else {
            continue;
        };
        let url = normalize_asset_url(src);
        if !has_image_extension(&url) {
            continue;
        }
        if seen.insert(url.clone()) {
            images.push(url);
        }
    }

    images
}

/// The canonical PDF rendition advertised by the citation meta tag, if any.
pub fn extract_pdf_url(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    document
        .select(&CITATION_PDF_META)
        .next()
        .and_then(|element| element.value().attr("content"))
        .map(normalize_asset_url)
}

fn normalize_asset_url(src: &str) -> String {
    if src.starts_with("//") {
        format!("https:{src}")
    } else if src.starts_with('/') {
        format!("{PMC_HOST}{src}")
    } else {
        src.to_string()
    }
}

fn has_image_extension(url: &str) -> bool {
    let lowered = url.to_lowercase();
    IMAGE_EXTENSIONS.iter().any(|ext| lowered.ends_with(ext))
}
