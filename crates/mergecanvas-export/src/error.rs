use std::time::Duration;

use thiserror::Error;

/// Failure to turn an image reference into a usable image
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResourceError {
    #[error("image not found: {0}")]
    NotFound(String),

    #[error("unsupported image reference: {0}")]
    Unsupported(String),

    #[error("failed to read image '{reference}': {message}")]
    Io { reference: String, message: String },

    #[error("failed to decode image '{reference}': {message}")]
    Decode { reference: String, message: String },

    #[error("timed out after {timeout:?} loading image '{reference}'")]
    Timeout { reference: String, timeout: Duration },
}

/// Failure inside the render surface
#[derive(Error, Debug)]
pub enum SurfaceError {
    #[error("could not allocate a {width}x{height} surface")]
    Allocation { width: u32, height: u32 },

    #[error("scene could not be parsed: {0}")]
    Scene(String),

    #[error("PNG encoding failed: {0}")]
    Encode(String),
}

/// Why a single row's render job failed
#[derive(Error, Debug)]
pub enum JobFailure {
    #[error(transparent)]
    Resource(#[from] ResourceError),

    #[error(transparent)]
    Surface(#[from] SurfaceError),
}

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum RenderError {
    /// Nothing to render (e.g. the dataset has no rows)
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("render job for row {row_index} failed: {cause}")]
    RenderJobFailed {
        row_index: usize,
        #[source]
        cause: JobFailure,
    },

    #[error("archive export failed: {0}")]
    Archive(#[from] ArchiveError),
}

impl RenderError {
    pub fn job_failed(row_index: usize, cause: impl Into<JobFailure>) -> Self {
        RenderError::RenderJobFailed {
            row_index,
            cause: cause.into(),
        }
    }
}
