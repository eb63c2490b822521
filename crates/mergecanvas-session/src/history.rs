//! Undo/redo manager using shape collection snapshots.
//!
//! Snapshots are taken *after* each completed edit, so redo simply re-applies
//! the popped snapshot while undo has to look one entry further back. When
//! nothing is left behind the popped entry, the document falls back to its
//! baseline: the shapes it was seeded with (empty for a blank canvas).

use mergecanvas_core::Shape;

/// Default cap on the number of undo states kept
pub const DEFAULT_MAX_HISTORY: usize = 100;

/// An independent copy of a document's shapes at one point in time
pub type Snapshot = Vec<Shape>;

/// Manages undo/redo with shape snapshots
#[derive(Debug, Clone)]
pub struct History {
    /// Post-edit states, oldest first
    past: Vec<Snapshot>,
    /// States popped by undo, most recently undone last
    future: Vec<Snapshot>,
    /// State the document started from
    baseline: Snapshot,
    /// Maximum history size
    max_history: usize,
}

impl History {
    /// Create a new history manager
    pub fn new(max_history: usize) -> Self {
        Self {
            past: Vec::new(),
            future: Vec::new(),
            baseline: Vec::new(),
            max_history: max_history.max(1),
        }
    }

    /// Record the state produced by a completed edit
    pub fn record(&mut self, snapshot: Snapshot) {
        self.future.clear();
        self.past.push(snapshot);

        // Limit history size; the oldest dropped state becomes the undo floor
        while self.past.len() > self.max_history {
            self.baseline = self.past.remove(0);
        }
    }

    /// Step back one edit. Returns the shapes the document should now hold,
    /// or `None` when there is nothing to undo.
    pub fn undo(&mut self) -> Option<Snapshot> {
        let popped = self.past.pop()?;
        self.future.push(popped);
        Some(self.past.last().cloned().unwrap_or_else(|| self.baseline.clone()))
    }

    /// Re-apply the most recently undone edit
    pub fn redo(&mut self) -> Option<Snapshot> {
        let next = self.future.pop()?;
        self.past.push(next.clone());
        Some(next)
    }

    /// Drop all history and start over from a new baseline
    pub fn reset(&mut self, baseline: Snapshot) {
        self.past.clear();
        self.future.clear();
        self.baseline = baseline;
    }

    /// Check if undo is available
    pub fn can_undo(&self) -> bool {
        !self.past.is_empty()
    }

    /// Check if redo is available
    pub fn can_redo(&self) -> bool {
        !self.future.is_empty()
    }

    pub fn undo_count(&self) -> usize {
        self.past.len()
    }

    pub fn redo_count(&self) -> usize {
        self.future.len()
    }

    pub fn baseline(&self) -> &[Shape] {
        &self.baseline
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HISTORY)
    }
}
