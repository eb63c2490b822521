//! Column binding state: the loaded dataset plus the mapping the user is
//! currently editing.
//!
//! Staged entries never touch the document; `Editor::commit_mapping` merges
//! them into every shape's data field in one step.

use std::collections::HashMap;

use mergecanvas_core::{DataTable, ShapeId};

#[derive(Debug, Clone, Default)]
pub struct Bindings {
    table: DataTable,
    staged: HashMap<ShapeId, Option<String>>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(&self) -> &DataTable {
        &self.table
    }

    /// Replace the dataset wholesale; any half-edited mapping is dropped
    pub fn load_table(&mut self, table: DataTable) {
        self.table = table;
        self.staged.clear();
    }

    /// Stage a column for a shape (`None` unbinds it on commit)
    pub fn set_mapping(&mut self, shape_id: ShapeId, column: Option<String>) {
        self.staged.insert(shape_id, column.filter(|c| !c.is_empty()));
    }

    /// Staged column for a shape, if any
    pub fn staged(&self, shape_id: &ShapeId) -> Option<&str> {
        self.staged.get(shape_id).and_then(|c| c.as_deref())
    }

    pub fn has_staged(&self) -> bool {
        !self.staged.is_empty()
    }

    /// Hand the staged mapping over for merging, leaving nothing staged
    pub fn take_staged(&mut self) -> HashMap<ShapeId, Option<String>> {
        std::mem::take(&mut self.staged)
    }

    pub fn cancel(&mut self) {
        self.staged.clear();
    }
}
