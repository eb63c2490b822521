//! The canonical document - canvas size plus the shape collection.
//!
//! Every edit goes through this type. Operations never fail for unknown ids;
//! they report `false` so the caller knows nothing changed and no history
//! snapshot is due.

use std::collections::HashMap;
use std::fmt;

use uuid::Uuid;

use crate::shapes::{PropertyKey, Shape, ShapeId, ShapeKind, ShapeVariant};

/// Canvas size of a blank template when the user doesn't pick one
pub const DEFAULT_CANVAS_WIDTH: u32 = 1000;
pub const DEFAULT_CANVAS_HEIGHT: u32 = 600;

/// Unique identifier for a document (used in log spans)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentId(pub Uuid);

impl DocumentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Direction for z-order changes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reorder {
    ToFront,
    ToBack,
    /// One step towards the front
    Up,
    /// One step towards the back
    Down,
}

/// The editable document
#[derive(Debug, Clone)]
pub struct Document {
    id: DocumentId,
    canvas_width: u32,
    canvas_height: u32,
    shapes: Vec<Shape>,
    selected: Option<ShapeId>,
    /// Last number handed out per variant; ids are never reused
    counters: HashMap<ShapeVariant, u64>,
}

impl Document {
    /// Create an empty document with the given canvas size.
    /// Zero dimensions are bumped to one pixel.
    pub fn blank(canvas_width: u32, canvas_height: u32) -> Self {
        Self {
            id: DocumentId::new(),
            canvas_width: canvas_width.max(1),
            canvas_height: canvas_height.max(1),
            shapes: Vec::new(),
            selected: None,
            counters: HashMap::new(),
        }
    }

    pub fn id(&self) -> DocumentId {
        self.id
    }

    pub fn canvas_width(&self) -> u32 {
        self.canvas_width
    }

    pub fn canvas_height(&self) -> u32 {
        self.canvas_height
    }

    /// Shapes in storage order (use `paint_order` for rendering)
    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    pub fn shape(&self, id: &ShapeId) -> Option<&Shape> {
        self.shapes.iter().find(|s| &s.id == id)
    }

    pub fn selected(&self) -> Option<&ShapeId> {
        self.selected.as_ref()
    }

    pub fn selected_shape(&self) -> Option<&Shape> {
        self.selected.as_ref().and_then(|id| self.shape(id))
    }

    /// Independent copy of the shape collection
    pub fn snapshot(&self) -> Vec<Shape> {
        self.shapes.clone()
    }

    /// Shapes sorted back-to-front (stable for equal z-index)
    pub fn paint_order(&self) -> Vec<&Shape> {
        let mut ordered: Vec<&Shape> = self.shapes.iter().collect();
        ordered.sort_by_key(|s| s.z_index);
        ordered
    }

    /// Allocate the next `<variant><n>` id
    pub(crate) fn next_id(&mut self, variant: ShapeVariant) -> (ShapeId, u64) {
        let counter = self.counters.entry(variant).or_insert(0);
        *counter += 1;
        (ShapeId(format!("{}{}", variant.id_prefix(), counter)), *counter)
    }

    /// Append an already-built shape (used when seeding from extraction)
    pub(crate) fn push_seeded(&mut self, shape: Shape) {
        self.shapes.push(shape);
    }

    // --- Shape Operations ---

    /// Add a new shape at its default origin and select it
    pub fn add_shape(&mut self, kind: ShapeKind) -> ShapeId {
        let variant = kind.variant();
        let (id, n) = self.next_id(variant);
        let (x, y) = kind.default_origin();

        let mut shape = Shape::new(id.clone(), format!("{}_{}", variant.label(), n), x, y, kind);
        shape.z_index = self.shapes.len() as u32 + 1;

        self.shapes.push(shape);
        self.selected = Some(id.clone());
        id
    }

    /// Apply a raw property edit to one shape
    pub fn update_property(&mut self, id: &ShapeId, key: PropertyKey, raw: &str) -> bool {
        match self.shapes.iter_mut().find(|s| &s.id == id) {
            Some(shape) => shape.set_property(key, raw),
            None => false,
        }
    }

    /// Commit a drag gesture
    pub fn move_shape(&mut self, id: &ShapeId, x: f64, y: f64) -> bool {
        if !x.is_finite() || !y.is_finite() {
            return false;
        }
        match self.shapes.iter_mut().find(|s| &s.id == id) {
            Some(shape) => {
                shape.x = x;
                shape.y = y;
                true
            }
            None => false,
        }
    }

    /// Remove a shape, dropping the selection if it pointed at it
    pub fn delete_shape(&mut self, id: &ShapeId) -> bool {
        let before = self.shapes.len();
        self.shapes.retain(|s| &s.id != id);
        if self.shapes.len() == before {
            return false;
        }
        if self.selected.as_ref() == Some(id) {
            self.selected = None;
        }
        true
    }

    /// Change a shape's position in the z-order.
    ///
    /// Afterwards every shape's z-index equals its position, so the values are
    /// exactly `0..n`.
    pub fn reorder(&mut self, id: &ShapeId, direction: Reorder) -> bool {
        let order = self.paint_order();
        let Some(idx) = order.iter().position(|s| &s.id == id) else {
            return false;
        };
        let last = order.len() - 1;
        let at_boundary = match direction {
            Reorder::ToFront | Reorder::Up => idx == last,
            Reorder::ToBack | Reorder::Down => idx == 0,
        };
        if at_boundary {
            return false;
        }

        self.shapes.sort_by_key(|s| s.z_index);
        match direction {
            Reorder::ToFront => {
                let mut shape = self.shapes.remove(idx);
                shape.z_index = self.shapes.len() as u32;
                self.shapes.push(shape);
            }
            Reorder::ToBack => {
                let mut shape = self.shapes.remove(idx);
                shape.z_index = 0;
                self.shapes.insert(0, shape);
            }
            Reorder::Up => self.shapes.swap(idx, idx + 1),
            Reorder::Down => self.shapes.swap(idx, idx - 1),
        }

        for (i, shape) in self.shapes.iter_mut().enumerate() {
            shape.z_index = i as u32;
        }
        true
    }

    /// Select a shape, or clear the selection. Unknown ids deselect.
    pub fn select(&mut self, id: Option<&ShapeId>) {
        self.selected = id.filter(|id| self.shape(id).is_some()).cloned();
    }

    /// Replace the whole shape collection (undo/redo, binding commits)
    pub fn replace_shapes(&mut self, shapes: Vec<Shape>) {
        self.shapes = shapes;
        if let Some(selected) = &self.selected {
            if self.shape(selected).is_none() {
                self.selected = None;
            }
        }
    }

    /// Mutable access for whole-collection edits that keep ids intact
    pub fn shapes_mut(&mut self) -> impl Iterator<Item = &mut Shape> {
        self.shapes.iter_mut()
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::blank(DEFAULT_CANVAS_WIDTH, DEFAULT_CANVAS_HEIGHT)
    }
}
