//! Batch export for mergecanvas: renders one PNG per dataset row and
//! packages the results as a zip archive.

pub mod archive;
pub mod error;
pub mod loader;
pub mod pipeline;
pub mod surface;

pub use archive::{Archive, ArchiveEntry, ArchiveSink, MemorySink, DEFAULT_ARCHIVE_NAME, entry_name};
pub use error::{ArchiveError, JobFailure, RenderError, ResourceError, SurfaceError};
pub use loader::{FsImageLoader, ImageLoader, InMemoryImageLoader, decode_image};
pub use pipeline::{
    BatchOutput, BatchRenderer, DEFAULT_PIXEL_RATIO, ExportReport, FailurePolicy, RenderOptions, SkippedRow,
};
pub use surface::{RenderSurface, SurfaceFactory, SvgSurface, SvgSurfaceFactory};
