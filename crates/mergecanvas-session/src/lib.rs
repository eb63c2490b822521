//! Editing session for mergecanvas: the `Editor` controller, its snapshot
//! based undo/redo history and the column binding workflow.

pub mod binding;
pub mod editor;
pub mod history;

pub use binding::Bindings;
pub use editor::Editor;
pub use history::{History, Snapshot, DEFAULT_MAX_HISTORY};
