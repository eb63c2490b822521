//! The editor controller - owns the live document, its history and the
//! binding state, and is the single entry point for GUI commands.
//!
//! Every command that changes the shapes is followed by a history snapshot of
//! the result. Commands issued before a document is loaded are ignored.

use mergecanvas_core::{
    DataTable, Document, ExtractionError, ExtractionResult, PropertyKey, Reorder, ShapeId, ShapeKind,
};
use tracing::{debug, info, warn};

use crate::binding::Bindings;
use crate::history::History;

#[derive(Debug, Default)]
pub struct Editor {
    /// `None` until a blank template is created or an extraction succeeds
    document: Option<Document>,
    history: History,
    bindings: Bindings,
}

impl Editor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Editor with a custom cap on undo depth
    pub fn with_history_limit(max_history: usize) -> Self {
        Self {
            history: History::new(max_history),
            ..Self::default()
        }
    }

    pub fn document(&self) -> Option<&Document> {
        self.document.as_ref()
    }

    pub fn is_loaded(&self) -> bool {
        self.document.is_some()
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn table(&self) -> &DataTable {
        self.bindings.table()
    }

    pub fn bindings(&self) -> &Bindings {
        &self.bindings
    }

    // --- Document lifecycle ---

    /// Start over with an empty canvas
    pub fn new_document(&mut self, canvas_width: u32, canvas_height: u32) -> &Document {
        let doc = Document::blank(canvas_width, canvas_height);
        info!(
            document = %doc.id(),
            width = doc.canvas_width(),
            height = doc.canvas_height(),
            "created blank document"
        );
        self.history.reset(Vec::new());
        self.document.insert(doc)
    }

    /// Seed the document from an extraction result. On failure the editor
    /// returns to the not-loaded state and the error is passed back.
    pub fn load_extraction(
        &mut self,
        result: Result<ExtractionResult, ExtractionError>,
    ) -> Result<&Document, ExtractionError> {
        match result.and_then(|r| Document::from_extraction(&r)) {
            Ok(doc) => {
                info!(document = %doc.id(), shapes = doc.len(), "loaded extracted document");
                self.history.reset(doc.snapshot());
                Ok(&*self.document.insert(doc))
            }
            Err(err) => {
                warn!(error = %err, "extraction failed, document unloaded");
                self.document = None;
                self.history.reset(Vec::new());
                Err(err)
            }
        }
    }

    // --- Shape commands ---

    pub fn add_shape(&mut self, kind: ShapeKind) -> Option<ShapeId> {
        let doc = self.document.as_mut()?;
        let id = doc.add_shape(kind);
        debug!(document = %doc.id(), shape = %id, "added shape");
        self.record();
        Some(id)
    }

    /// Apply a raw property edit from the inspector panel
    pub fn update_property(&mut self, id: &ShapeId, key: &str, raw: &str) -> bool {
        let key = match key.parse::<PropertyKey>() {
            Ok(key) => key,
            Err(err) => {
                warn!(shape = %id, error = %err, "ignoring property edit");
                return false;
            }
        };
        let changed = self
            .document
            .as_mut()
            .is_some_and(|doc| doc.update_property(id, key, raw));
        if changed {
            self.record();
        }
        changed
    }

    pub fn move_shape(&mut self, id: &ShapeId, x: f64, y: f64) -> bool {
        let changed = self.document.as_mut().is_some_and(|doc| doc.move_shape(id, x, y));
        if changed {
            self.record();
        }
        changed
    }

    pub fn delete_shape(&mut self, id: &ShapeId) -> bool {
        let changed = self.document.as_mut().is_some_and(|doc| doc.delete_shape(id));
        if changed {
            debug!(shape = %id, "deleted shape");
            self.record();
        }
        changed
    }

    pub fn reorder(&mut self, id: &ShapeId, direction: Reorder) -> bool {
        let changed = self.document.as_mut().is_some_and(|doc| doc.reorder(id, direction));
        if changed {
            debug!(shape = %id, ?direction, "reordered shape");
            self.record();
        }
        changed
    }

    /// Selection is view state; it is not recorded in history
    pub fn select(&mut self, id: Option<&ShapeId>) {
        if let Some(doc) = self.document.as_mut() {
            doc.select(id);
        }
    }

    // --- History ---

    pub fn undo(&mut self) -> bool {
        let Some(doc) = self.document.as_mut() else {
            return false;
        };
        match self.history.undo() {
            Some(shapes) => {
                doc.replace_shapes(shapes);
                debug!(remaining = self.history.undo_count(), "undo");
                true
            }
            None => false,
        }
    }

    pub fn redo(&mut self) -> bool {
        let Some(doc) = self.document.as_mut() else {
            return false;
        };
        match self.history.redo() {
            Some(shapes) => {
                doc.replace_shapes(shapes);
                debug!(remaining = self.history.redo_count(), "redo");
                true
            }
            None => false,
        }
    }

    // --- Data binding ---

    pub fn load_table(&mut self, table: DataTable) {
        info!(
            columns = table.columns().len(),
            rows = table.row_count(),
            "loaded data table"
        );
        self.bindings.load_table(table);
    }

    pub fn set_mapping(&mut self, shape_id: ShapeId, column: Option<String>) {
        self.bindings.set_mapping(shape_id, column);
    }

    /// Merge the staged mapping into the document: every shape gets its staged
    /// column, or no binding when nothing was staged for it.
    pub fn commit_mapping(&mut self) -> bool {
        let Some(doc) = self.document.as_mut() else {
            return false;
        };
        let staged = self.bindings.take_staged();
        for shape in doc.shapes_mut() {
            shape.data_field = staged.get(&shape.id).cloned().flatten();
        }
        debug!(document = %doc.id(), bound = staged.len(), "committed column mapping");
        self.record();
        true
    }

    pub fn cancel_mapping(&mut self) {
        self.bindings.cancel();
    }

    fn record(&mut self) {
        if let Some(doc) = &self.document {
            self.history.record(doc.snapshot());
        }
    }
}
