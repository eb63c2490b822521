//! Shape types for mergecanvas.
//!
//! `Shape` carries the fields every element shares; `ShapeKind` holds the
//! variant-specific geometry and paint. Property edits coming from the GUI
//! layer arrive as `(key, raw string)` pairs and are applied through
//! `Shape::set_property`.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Smallest value a size-like property may hold
pub const MIN_DIMENSION: f64 = 0.1;

/// Shape identifier - `<variant><n>`, unique within one document
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShapeId(pub String);

impl ShapeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ShapeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ShapeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// The four shape variants, without their data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeVariant {
    Rect,
    Text,
    Image,
    Path,
}

impl ShapeVariant {
    /// Prefix used when allocating ids
    pub fn id_prefix(self) -> &'static str {
        match self {
            ShapeVariant::Rect => "rect",
            ShapeVariant::Text => "text",
            ShapeVariant::Image => "image",
            ShapeVariant::Path => "path",
        }
    }

    /// Display label used for default shape names
    pub fn label(self) -> &'static str {
        match self {
            ShapeVariant::Rect => "Rectangle",
            ShapeVariant::Text => "Text",
            ShapeVariant::Image => "Image",
            ShapeVariant::Path => "Path",
        }
    }
}

/// A decoded-and-validated image, shared between handles.
///
/// The bytes are the original encoded file (PNG, JPEG, ...) so the render
/// surface can embed them without re-encoding.
#[derive(Debug, PartialEq, Eq)]
pub struct ImageResource {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Media type, e.g. `image/png`
    pub mime: &'static str,
}

/// Reference to an image plus the resource once it has been loaded.
///
/// Cloning produces an independent handle pointing at the same immutable
/// resource. Only the source survives serialization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImageHandle {
    pub source: String,
    #[serde(skip)]
    pub resource: Option<Arc<ImageResource>>,
}

impl ImageHandle {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            resource: None,
        }
    }

    pub fn loaded(source: impl Into<String>, resource: Arc<ImageResource>) -> Self {
        Self {
            source: source.into(),
            resource: Some(resource),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.resource.is_some()
    }
}

impl PartialEq for ImageHandle {
    fn eq(&self, other: &Self) -> bool {
        let same_resource = match (&self.resource, &other.resource) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b) || a == b,
            (None, None) => true,
            _ => false,
        };
        self.source == other.source && same_resource
    }
}

/// Variant-specific shape data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ShapeKind {
    #[serde(rename_all = "camelCase")]
    Rect { width: f64, height: f64, fill: String },
    #[serde(rename_all = "camelCase")]
    Text { text: String, font_size: f64, fill: String },
    #[serde(rename_all = "camelCase")]
    Image { width: f64, height: f64, image: ImageHandle },
    #[serde(rename_all = "camelCase")]
    Path {
        path_data: String,
        fill: Option<String>,
        stroke: Option<String>,
        stroke_width: f64,
    },
}

impl ShapeKind {
    /// Default rectangle as placed by the toolbar
    pub fn default_rect() -> Self {
        ShapeKind::Rect {
            width: 120.0,
            height: 100.0,
            fill: "#3b82f6".to_string(),
        }
    }

    /// Default text label as placed by the toolbar
    pub fn default_text() -> Self {
        ShapeKind::Text {
            text: "Sample Text".to_string(),
            font_size: 20.0,
            fill: "#1f2937".to_string(),
        }
    }

    /// Image shape with the default 120x120 frame
    pub fn image(handle: ImageHandle) -> Self {
        ShapeKind::Image {
            width: 120.0,
            height: 120.0,
            image: handle,
        }
    }

    pub fn variant(&self) -> ShapeVariant {
        match self {
            ShapeKind::Rect { .. } => ShapeVariant::Rect,
            ShapeKind::Text { .. } => ShapeVariant::Text,
            ShapeKind::Image { .. } => ShapeVariant::Image,
            ShapeKind::Path { .. } => ShapeVariant::Path,
        }
    }

    /// Position a freshly added shape of this kind lands at
    pub fn default_origin(&self) -> (f64, f64) {
        match self {
            ShapeKind::Text { .. } => (60.0, 60.0),
            ShapeKind::Path { .. } => (0.0, 0.0),
            _ => (50.0, 50.0),
        }
    }
}

/// A single element on the canvas
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shape {
    pub id: ShapeId,
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub z_index: u32,
    pub draggable: bool,
    pub data_field: Option<String>,
    #[serde(flatten)]
    pub kind: ShapeKind,
}

impl Shape {
    pub fn new(id: ShapeId, name: impl Into<String>, x: f64, y: f64, kind: ShapeKind) -> Self {
        Self {
            id,
            name: name.into(),
            x,
            y,
            z_index: 0,
            draggable: true,
            data_field: None,
            kind,
        }
    }

    pub fn variant(&self) -> ShapeVariant {
        self.kind.variant()
    }

    /// Only text labels and images consult their data field at render time
    pub fn is_bindable(&self) -> bool {
        matches!(self.kind, ShapeKind::Text { .. } | ShapeKind::Image { .. })
    }

    /// Apply a raw property edit. Returns false when the key does not exist on
    /// this variant or the value cannot be interpreted.
    pub fn set_property(&mut self, key: PropertyKey, raw: &str) -> bool {
        match key {
            PropertyKey::Name => {
                self.name = raw.to_string();
                true
            }
            PropertyKey::X => match raw.trim().parse::<f64>() {
                Ok(v) if v.is_finite() => {
                    self.x = v;
                    true
                }
                _ => false,
            },
            PropertyKey::Y => match raw.trim().parse::<f64>() {
                Ok(v) if v.is_finite() => {
                    self.y = v;
                    true
                }
                _ => false,
            },
            PropertyKey::Draggable => match raw.trim().parse::<bool>() {
                Ok(v) => {
                    self.draggable = v;
                    true
                }
                Err(_) => false,
            },
            PropertyKey::DataField => {
                self.data_field = normalize_data_field(raw);
                true
            }
            PropertyKey::Width => match &mut self.kind {
                ShapeKind::Rect { width, .. } | ShapeKind::Image { width, .. } => {
                    *width = clamp_dimension(raw);
                    true
                }
                _ => false,
            },
            PropertyKey::Height => match &mut self.kind {
                ShapeKind::Rect { height, .. } | ShapeKind::Image { height, .. } => {
                    *height = clamp_dimension(raw);
                    true
                }
                _ => false,
            },
            PropertyKey::FontSize => match &mut self.kind {
                ShapeKind::Text { font_size, .. } => {
                    *font_size = clamp_dimension(raw);
                    true
                }
                _ => false,
            },
            PropertyKey::StrokeWidth => match &mut self.kind {
                ShapeKind::Path { stroke_width, .. } => {
                    *stroke_width = clamp_dimension(raw);
                    true
                }
                _ => false,
            },
            PropertyKey::Fill => match &mut self.kind {
                ShapeKind::Rect { fill, .. } | ShapeKind::Text { fill, .. } => {
                    *fill = raw.to_string();
                    true
                }
                ShapeKind::Path { fill, .. } => {
                    *fill = Some(raw.to_string());
                    true
                }
                ShapeKind::Image { .. } => false,
            },
            PropertyKey::Stroke => match &mut self.kind {
                ShapeKind::Path { stroke, .. } => {
                    *stroke = Some(raw.to_string());
                    true
                }
                _ => false,
            },
            PropertyKey::Text => match &mut self.kind {
                ShapeKind::Text { text, .. } => {
                    *text = raw.to_string();
                    true
                }
                _ => false,
            },
            PropertyKey::PathData => match &mut self.kind {
                ShapeKind::Path { path_data, .. } => {
                    *path_data = raw.to_string();
                    true
                }
                _ => false,
            },
            PropertyKey::ImageSource => match &mut self.kind {
                ShapeKind::Image { image, .. } => {
                    *image = ImageHandle::new(raw);
                    true
                }
                _ => false,
            },
        }
    }
}

/// Parse a size-like value and apply the minimum floor.
/// Unparsable input falls back to the floor itself.
pub fn clamp_dimension(raw: &str) -> f64 {
    match raw.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => v.max(MIN_DIMENSION),
        _ => MIN_DIMENSION,
    }
}

/// Empty input means "not bound"
pub fn normalize_data_field(raw: &str) -> Option<String> {
    if raw.is_empty() {
        None
    } else {
        Some(raw.to_string())
    }
}

/// Editable shape properties, keyed by their GUI names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyKey {
    Name,
    X,
    Y,
    Draggable,
    DataField,
    Width,
    Height,
    FontSize,
    StrokeWidth,
    Fill,
    Stroke,
    Text,
    PathData,
    ImageSource,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown shape property: {0}")]
pub struct UnknownProperty(pub String);

impl FromStr for PropertyKey {
    type Err = UnknownProperty;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = match s {
            "name" => PropertyKey::Name,
            "x" => PropertyKey::X,
            "y" => PropertyKey::Y,
            "draggable" => PropertyKey::Draggable,
            "dataField" => PropertyKey::DataField,
            "width" => PropertyKey::Width,
            "height" => PropertyKey::Height,
            "fontSize" => PropertyKey::FontSize,
            "strokeWidth" => PropertyKey::StrokeWidth,
            "fill" => PropertyKey::Fill,
            "stroke" => PropertyKey::Stroke,
            "text" => PropertyKey::Text,
            "data" | "pathData" => PropertyKey::PathData,
            "src" | "imageSource" => PropertyKey::ImageSource,
            other => return Err(UnknownProperty(other.to_string())),
        };
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect() -> Shape {
        Shape::new(ShapeId::from("rect1"), "Rectangle_1", 50.0, 50.0, ShapeKind::default_rect())
    }

    #[test]
    fn numeric_keys_are_floored() {
        let mut shape = rect();
        assert!(shape.set_property(PropertyKey::Width, "-40"));
        assert!(shape.set_property(PropertyKey::Height, "abc"));
        match shape.kind {
            ShapeKind::Rect { width, height, .. } => {
                assert_eq!(width, MIN_DIMENSION);
                assert_eq!(height, MIN_DIMENSION);
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn fractional_sizes_survive() {
        let mut shape = rect();
        assert!(shape.set_property(PropertyKey::Width, " 12.75 "));
        assert!(matches!(shape.kind, ShapeKind::Rect { width, .. } if width == 12.75));
    }

    #[test]
    fn empty_data_field_unbinds() {
        let mut shape = rect();
        shape.set_property(PropertyKey::DataField, "Name");
        assert_eq!(shape.data_field.as_deref(), Some("Name"));
        shape.set_property(PropertyKey::DataField, "");
        assert_eq!(shape.data_field, None);
    }

    #[test]
    fn keys_missing_on_variant_are_rejected() {
        let mut shape = rect();
        assert!(!shape.set_property(PropertyKey::FontSize, "30"));
        assert!(!shape.set_property(PropertyKey::Text, "hello"));
        assert!(!shape.set_property(PropertyKey::X, "not a number"));
        assert_eq!(shape, rect());
    }

    #[test]
    fn gui_keys_parse() {
        assert_eq!("fontSize".parse::<PropertyKey>(), Ok(PropertyKey::FontSize));
        assert_eq!("data".parse::<PropertyKey>(), Ok(PropertyKey::PathData));
        assert!("zIndex".parse::<PropertyKey>().is_err());
    }

    #[test]
    fn image_handles_clone_independently() {
        let resource = Arc::new(ImageResource {
            bytes: vec![1, 2, 3],
            width: 1,
            height: 1,
            mime: "image/png",
        });
        let original = ImageHandle::loaded("logo.png", resource.clone());
        let mut copy = original.clone();
        copy.source = "other.png".to_string();
        copy.resource = None;

        assert_eq!(original.source, "logo.png");
        assert!(original.is_loaded());
        assert_eq!(Arc::strong_count(&resource), 2);
    }

    #[test]
    fn serializes_with_gui_field_names() {
        let mut shape = Shape::new(ShapeId::from("text1"), "Text_1", 60.0, 60.0, ShapeKind::default_text());
        shape.data_field = Some("Name".to_string());
        let json = serde_json::to_value(&shape).unwrap();
        assert_eq!(json["type"], "text");
        assert_eq!(json["fontSize"], 20.0);
        assert_eq!(json["dataField"], "Name");
        assert_eq!(json["zIndex"], 0);

        let back: Shape = serde_json::from_value(json).unwrap();
        assert_eq!(back, shape);
    }
}
