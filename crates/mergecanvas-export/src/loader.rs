//! Image loading for render jobs.
//!
//! A loader turns the raw reference found in a shape or a data cell (a file
//! path, a `file://` URL or a `data:` URI) into a decoded `ImageResource`.
//! Loading is async so the pipeline can fan out all loads of a row at once.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose;
use mergecanvas_core::ImageResource;

use crate::error::ResourceError;

/// Loads image references into decoded resources
#[async_trait]
pub trait ImageLoader: Send + Sync {
    async fn load(&self, reference: &str) -> Result<Arc<ImageResource>, ResourceError>;
}

/// Validate encoded image bytes and capture their size and media type
pub fn decode_image(reference: &str, bytes: Vec<u8>) -> Result<ImageResource, ResourceError> {
    let decode_err = |message: String| ResourceError::Decode {
        reference: reference.to_string(),
        message,
    };
    let format = image::guess_format(&bytes).map_err(|e| decode_err(e.to_string()))?;
    let decoded = image::load_from_memory_with_format(&bytes, format).map_err(|e| decode_err(e.to_string()))?;

    Ok(ImageResource {
        width: decoded.width(),
        height: decoded.height(),
        mime: format.to_mime_type(),
        bytes,
    })
}

/// Decode the payload of a base64 `data:` URI
fn data_uri_bytes(reference: &str) -> Result<Vec<u8>, ResourceError> {
    let rest = reference
        .strip_prefix("data:")
        .ok_or_else(|| ResourceError::Unsupported(reference.to_string()))?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| ResourceError::Unsupported(reference.to_string()))?;
    if !meta.ends_with(";base64") {
        return Err(ResourceError::Unsupported(format!(
            "only base64 data URIs are supported: {}",
            truncate(reference)
        )));
    }
    general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| ResourceError::Decode {
            reference: truncate(reference),
            message: e.to_string(),
        })
}

/// Keep log lines readable when the reference is a large data URI
fn truncate(reference: &str) -> String {
    const MAX: usize = 64;
    match reference.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &reference[..idx]),
        None => reference.to_string(),
    }
}

/// Loads images from the local filesystem and from inline `data:` URIs.
///
/// Relative paths resolve against the base directory. Network URLs are
/// rejected; fetching them is the caller's job.
#[derive(Debug, Clone)]
pub struct FsImageLoader {
    base_path: PathBuf,
}

impl FsImageLoader {
    pub fn new<P: AsRef<Path>>(base_path: P) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    pub fn base(&self) -> &Path {
        &self.base_path
    }

    fn resolve(&self, reference: &str) -> Result<PathBuf, ResourceError> {
        let path = reference.strip_prefix("file://").unwrap_or(reference);
        if path.contains("://") {
            return Err(ResourceError::Unsupported(reference.to_string()));
        }
        let path = Path::new(path);
        if path.is_absolute() {
            Ok(path.to_path_buf())
        } else {
            Ok(self.base_path.join(path))
        }
    }
}

#[async_trait]
impl ImageLoader for FsImageLoader {
    async fn load(&self, reference: &str) -> Result<Arc<ImageResource>, ResourceError> {
        let reference = reference.trim();
        if reference.starts_with("data:") {
            let bytes = data_uri_bytes(reference)?;
            return decode_image(&truncate(reference), bytes).map(Arc::new);
        }

        let path = self.resolve(reference)?;
        let bytes = tokio::fs::read(&path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => ResourceError::NotFound(reference.to_string()),
            _ => ResourceError::Io {
                reference: reference.to_string(),
                message: e.to_string(),
            },
        })?;
        tracing::debug!(path = %path.display(), bytes = bytes.len(), "read image");
        decode_image(reference, bytes).map(Arc::new)
    }
}

/// Serves pre-registered images from memory.
///
/// Useful when the GUI already holds the uploaded files, and in tests.
#[derive(Debug, Default, Clone)]
pub struct InMemoryImageLoader {
    images: HashMap<String, Arc<ImageResource>>,
}

impl InMemoryImageLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register encoded image bytes under a reference
    pub fn insert(&mut self, reference: impl Into<String>, bytes: Vec<u8>) -> Result<(), ResourceError> {
        let reference = reference.into();
        let resource = decode_image(&reference, bytes)?;
        self.images.insert(reference, Arc::new(resource));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

#[async_trait]
impl ImageLoader for InMemoryImageLoader {
    async fn load(&self, reference: &str) -> Result<Arc<ImageResource>, ResourceError> {
        self.images
            .get(reference)
            .cloned()
            .ok_or_else(|| ResourceError::NotFound(reference.to_string()))
    }
}
