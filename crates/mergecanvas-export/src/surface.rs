//! Offscreen render surfaces.
//!
//! A render job draws its shapes onto a fresh surface and encodes the result
//! as PNG. The default surface builds an SVG scene and rasterizes it with
//! resvg at the requested pixel ratio.

use std::fmt::Write;
use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose;
use mergecanvas_core::{Shape, ShapeKind};

use crate::error::SurfaceError;

/// A drawing target for one render job.
///
/// Shapes are added in paint order; `encode` consumes the surface.
pub trait RenderSurface {
    fn add(&mut self, shape: &Shape);

    /// Rasterize and encode everything added so far as PNG
    fn encode(self) -> Result<Vec<u8>, SurfaceError>;
}

/// Creates one surface per render job
pub trait SurfaceFactory {
    type Surface: RenderSurface;

    /// `width`/`height` are canvas units; the encoded PNG is scaled by `pixel_ratio`
    fn create(&self, width: u32, height: u32, pixel_ratio: f32) -> Self::Surface;
}

/// Surface factory backed by usvg/resvg
#[derive(Clone)]
pub struct SvgSurfaceFactory {
    options: Arc<usvg::Options<'static>>,
}

impl SvgSurfaceFactory {
    /// Factory using the fonts installed on this system
    pub fn new() -> Self {
        let mut fontdb = usvg::fontdb::Database::new();
        fontdb.load_system_fonts();
        tracing::debug!(faces = fontdb.len(), "loaded system fonts");
        Self::with_fontdb(fontdb)
    }

    /// Factory with no fonts; text nodes are dropped from the output
    pub fn without_fonts() -> Self {
        Self::with_fontdb(usvg::fontdb::Database::new())
    }

    pub fn with_fontdb(fontdb: usvg::fontdb::Database) -> Self {
        let options = usvg::Options {
            fontdb: Arc::new(fontdb),
            ..usvg::Options::default()
        };
        Self {
            options: Arc::new(options),
        }
    }
}

impl Default for SvgSurfaceFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl SurfaceFactory for SvgSurfaceFactory {
    type Surface = SvgSurface;

    fn create(&self, width: u32, height: u32, pixel_ratio: f32) -> SvgSurface {
        SvgSurface::new(width, height, pixel_ratio, Arc::clone(&self.options))
    }
}

/// SVG scene under construction
pub struct SvgSurface {
    width: u32,
    height: u32,
    pixel_ratio: f32,
    body: String,
    options: Arc<usvg::Options<'static>>,
}

impl SvgSurface {
    fn new(width: u32, height: u32, pixel_ratio: f32, options: Arc<usvg::Options<'static>>) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            pixel_ratio,
            body: String::new(),
            options,
        }
    }

    /// Complete SVG document for the scene
    pub fn svg(&self) -> String {
        let mut output = String::new();
        let _ = writeln!(
            &mut output,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
            w = self.width,
            h = self.height,
        );
        output.push_str(&self.body);
        output.push_str("</svg>\n");
        output
    }

    fn pixel_size(&self) -> (u32, u32) {
        let scale = |v: u32| ((v as f32) * self.pixel_ratio).ceil().max(1.0) as u32;
        (scale(self.width), scale(self.height))
    }
}

impl RenderSurface for SvgSurface {
    fn add(&mut self, shape: &Shape) {
        render_shape(&mut self.body, shape);
    }

    fn encode(self) -> Result<Vec<u8>, SurfaceError> {
        let svg = self.svg();
        let tree = usvg::Tree::from_str(&svg, &self.options).map_err(|e| SurfaceError::Scene(e.to_string()))?;

        let (width, height) = self.pixel_size();
        let mut pixmap = tiny_skia::Pixmap::new(width, height).ok_or(SurfaceError::Allocation { width, height })?;
        resvg::render(
            &tree,
            tiny_skia::Transform::from_scale(self.pixel_ratio, self.pixel_ratio),
            &mut pixmap.as_mut(),
        );

        pixmap.encode_png().map_err(|e| SurfaceError::Encode(e.to_string()))
    }
}

/// Append the SVG element for a single shape
fn render_shape(output: &mut String, shape: &Shape) {
    let (x, y) = (shape.x, shape.y);
    match &shape.kind {
        ShapeKind::Rect { width, height, fill } => {
            let _ = writeln!(
                output,
                r#"  <rect x="{x}" y="{y}" width="{width}" height="{height}" fill="{}"/>"#,
                escape_xml(fill)
            );
        }
        ShapeKind::Text { text, font_size, fill } => {
            // Text origin is the top-left corner of the first line
            let _ = writeln!(
                output,
                r#"  <text x="{x}" y="{y}" font-family="sans-serif" font-size="{font_size}" fill="{}" dominant-baseline="text-before-edge" xml:space="preserve">{}</text>"#,
                escape_xml(fill),
                escape_xml(text)
            );
        }
        ShapeKind::Image { width, height, image } => {
            let Some(resource) = &image.resource else {
                tracing::debug!(shape = %shape.id, "skipping image without a loaded resource");
                return;
            };
            let _ = writeln!(
                output,
                r#"  <image x="{x}" y="{y}" width="{width}" height="{height}" preserveAspectRatio="none" href="data:{};base64,{}"/>"#,
                resource.mime,
                general_purpose::STANDARD.encode(&resource.bytes)
            );
        }
        ShapeKind::Path {
            path_data,
            fill,
            stroke,
            stroke_width,
        } => {
            let _ = writeln!(
                output,
                r#"  <path transform="translate({x} {y})" d="{}" fill="{}" stroke="{}" stroke-width="{stroke_width}"/>"#,
                escape_xml(path_data),
                escape_xml(fill.as_deref().unwrap_or("none")),
                escape_xml(stroke.as_deref().unwrap_or("none"))
            );
        }
    }
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
