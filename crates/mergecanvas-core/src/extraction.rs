//! Seeding a document from the page extraction service.
//!
//! The service turns a source document (usually a PDF) into per-page lists of
//! text runs, images and vector paths. Only the first page is used.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::document::Document;
use crate::shapes::{ImageHandle, Shape, ShapeKind, ShapeVariant, MIN_DIMENSION};

/// Characters of a text run kept for its display name
const NAME_PREVIEW_CHARS: usize = 20;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("extraction service failed: {0}")]
    Service(String),
    #[error("malformed extraction result: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("extraction result has no pages")]
    NoPages,
    #[error("invalid canvas size {width}x{height}")]
    InvalidCanvas { width: f64, height: f64 },
}

/// Bounding box as `[x0, y0, x1, y1]`
pub type BBox = [f64; 4];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub pages: Vec<ExtractedPage>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractedPage {
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub texts: Vec<ExtractedText>,
    #[serde(default)]
    pub images: Vec<ExtractedImage>,
    #[serde(default)]
    pub shapes: Vec<ExtractedPath>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedText {
    pub bbox: BBox,
    #[serde(default)]
    pub text: String,
    pub size: Option<f64>,
    pub fill: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedImage {
    pub bbox: BBox,
    pub image_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedPath {
    #[serde(default)]
    pub path_data: String,
    pub fill: Option<String>,
    pub stroke: Option<String>,
    #[serde(rename = "strokeWidth")]
    pub stroke_width: Option<f64>,
}

impl ExtractionResult {
    pub fn from_json(json: &str) -> Result<Self, ExtractionError> {
        Ok(serde_json::from_str(json)?)
    }
}

impl Document {
    /// Build a document from the first extracted page.
    ///
    /// Shapes are stacked in extraction order: texts, then images, then paths.
    pub fn from_extraction(result: &ExtractionResult) -> Result<Self, ExtractionError> {
        let page = result.pages.first().ok_or(ExtractionError::NoPages)?;
        let valid = |v: f64| v.is_finite() && v >= 1.0 && v <= u32::MAX as f64;
        if !valid(page.width) || !valid(page.height) {
            return Err(ExtractionError::InvalidCanvas {
                width: page.width,
                height: page.height,
            });
        }

        let mut doc = Document::blank(page.width.round() as u32, page.height.round() as u32);
        let mut z_index = 0u32;
        let mut push = |doc: &mut Document, mut shape: Shape| {
            shape.z_index = z_index;
            z_index += 1;
            doc.push_seeded(shape);
        };

        for t in page.texts.iter().filter(|t| !t.text.is_empty()) {
            let (id, _) = doc.next_id(ShapeVariant::Text);
            let name: String = t.text.chars().take(NAME_PREVIEW_CHARS).collect();
            let kind = ShapeKind::Text {
                text: t.text.clone(),
                font_size: t.size.map(|s| s.max(MIN_DIMENSION)).unwrap_or(12.0),
                fill: t.fill.clone().unwrap_or_else(|| "#000".to_string()),
            };
            push(&mut doc, Shape::new(id, name, t.bbox[0], t.bbox[1], kind));
        }

        for im in &page.images {
            let (id, n) = doc.next_id(ShapeVariant::Image);
            let kind = ShapeKind::Image {
                width: (im.bbox[2] - im.bbox[0]).max(MIN_DIMENSION),
                height: (im.bbox[3] - im.bbox[1]).max(MIN_DIMENSION),
                image: ImageHandle::new(im.image_url.clone()),
            };
            push(&mut doc, Shape::new(id, format!("Image_{n}"), im.bbox[0], im.bbox[1], kind));
        }

        for p in page.shapes.iter().filter(|p| !p.path_data.is_empty()) {
            let (id, n) = doc.next_id(ShapeVariant::Path);
            let kind = ShapeKind::Path {
                path_data: p.path_data.clone(),
                fill: p.fill.clone(),
                stroke: p.stroke.clone(),
                stroke_width: p.stroke_width.map(|w| w.max(MIN_DIMENSION)).unwrap_or(1.0),
            };
            push(&mut doc, Shape::new(id, format!("Path_{n}"), 0.0, 0.0, kind));
        }

        tracing::debug!(
            document = %doc.id(),
            shapes = doc.len(),
            width = doc.canvas_width(),
            height = doc.canvas_height(),
            "seeded document from extraction"
        );
        Ok(doc)
    }
}
