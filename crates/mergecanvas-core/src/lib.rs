//! Core types for mergecanvas: the shape document model, the tabular dataset
//! that feeds batch renders, and seeding from page extraction results.

pub mod document;
pub mod extraction;
pub mod shapes;
pub mod table;

pub use document::{Document, DocumentId, Reorder, DEFAULT_CANVAS_HEIGHT, DEFAULT_CANVAS_WIDTH};
pub use extraction::{ExtractionError, ExtractionResult};
pub use shapes::{ImageHandle, ImageResource, PropertyKey, Shape, ShapeId, ShapeKind, ShapeVariant};
pub use table::DataTable;
