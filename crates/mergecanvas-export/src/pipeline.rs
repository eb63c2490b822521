//! Batch render pipeline: one PNG per dataset row.
//!
//! Rows are rendered strictly one after another. Within a row, every image
//! the row needs is loaded concurrently and the job waits for all of them
//! before drawing, so no design is encoded with a missing row image. Each
//! job gets its own clone of the shapes and its own surface; the document
//! is never modified.

use std::sync::Arc;
use std::time::Duration;

use mergecanvas_core::{DataTable, Document, ImageHandle, ImageResource, Shape, ShapeKind};
use tracing::instrument;

use crate::archive::{Archive, ArchiveSink};
use crate::error::{RenderError, ResourceError, SurfaceError};
use crate::loader::ImageLoader;
use crate::surface::{RenderSurface, SurfaceFactory};

/// Output pixels per canvas unit unless configured otherwise
pub const DEFAULT_PIXEL_RATIO: f32 = 2.0;

/// What to do when a row's images cannot be loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Stop the batch and produce no archive
    #[default]
    AbortBatch,
    /// Leave the row out of the archive and carry on
    SkipRow,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderOptions {
    pub pixel_ratio: f32,
    pub failure_policy: FailurePolicy,
    /// Upper bound on a single image load; `None` waits indefinitely
    pub load_timeout: Option<Duration>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            pixel_ratio: DEFAULT_PIXEL_RATIO,
            failure_policy: FailurePolicy::default(),
            load_timeout: None,
        }
    }
}

/// A row that was left out under `FailurePolicy::SkipRow`
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedRow {
    pub row_index: usize,
    pub cause: ResourceError,
}

#[derive(Debug, Default)]
pub struct BatchOutput {
    pub archive: Archive,
    pub skipped: Vec<SkippedRow>,
}

/// Summary of a batch that was encoded and handed to a sink
#[derive(Debug, Clone, PartialEq)]
pub struct ExportReport {
    pub file_name: String,
    pub rendered: usize,
    pub skipped: Vec<SkippedRow>,
    pub zip_bytes: usize,
}

/// Shapes prepared for a single row, images resolved
struct RenderJob {
    row_index: usize,
    shapes: Vec<Shape>,
}

/// Image slot within a job that still needs loading
struct PendingLoad {
    shape_index: usize,
    reference: String,
    /// Reference came from the row rather than the design
    bound: bool,
}

pub struct BatchRenderer<L, F> {
    loader: L,
    surfaces: F,
    options: RenderOptions,
}

impl<L: ImageLoader, F: SurfaceFactory> BatchRenderer<L, F> {
    pub fn new(loader: L, surfaces: F) -> Self {
        Self::with_options(loader, surfaces, RenderOptions::default())
    }

    pub fn with_options(loader: L, surfaces: F, options: RenderOptions) -> Self {
        Self {
            loader,
            surfaces,
            options,
        }
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    /// Render one PNG per row of `table` and collect them in an archive
    #[instrument(skip_all, fields(rows = table.row_count(), shapes = document.len()))]
    pub async fn generate(&self, document: &Document, table: &DataTable) -> Result<BatchOutput, RenderError> {
        if table.is_empty() {
            return Err(RenderError::Validation("the dataset has no rows".to_string()));
        }

        let mut output = BatchOutput::default();
        for row_index in 0..table.row_count() {
            let job = match self.prepare(document.shapes(), table, row_index).await {
                Ok(job) => job,
                Err(cause) => match self.options.failure_policy {
                    FailurePolicy::AbortBatch => {
                        tracing::warn!(row = row_index, error = %cause, "aborting batch");
                        return Err(RenderError::job_failed(row_index, cause));
                    }
                    FailurePolicy::SkipRow => {
                        tracing::warn!(row = row_index, error = %cause, "skipping row");
                        output.skipped.push(SkippedRow { row_index, cause });
                        continue;
                    }
                },
            };

            let png = self
                .rasterize(job, document)
                .map_err(|e| RenderError::job_failed(row_index, e))?;
            tracing::debug!(row = row_index, bytes = png.len(), "rendered row");
            output.archive.push(row_index, png);
        }

        tracing::info!(
            rendered = output.archive.len(),
            skipped = output.skipped.len(),
            "batch render complete"
        );
        Ok(output)
    }

    /// Render, zip, and hand the archive to `sink` under `file_name`
    pub async fn export<S: ArchiveSink + ?Sized>(
        &self,
        document: &Document,
        table: &DataTable,
        sink: &mut S,
        file_name: &str,
    ) -> Result<ExportReport, RenderError> {
        let output = self.generate(document, table).await?;
        let zip = output.archive.to_zip()?;
        sink.save(file_name, &zip)?;
        tracing::info!(file = file_name, bytes = zip.len(), "archive saved");

        Ok(ExportReport {
            file_name: file_name.to_string(),
            rendered: output.archive.len(),
            skipped: output.skipped,
            zip_bytes: zip.len(),
        })
    }

    /// Clone the shapes, apply the row's values and wait for every image.
    ///
    /// Only a failed load of a row value fails the job. A static image that
    /// cannot be loaded is left out of the design.
    async fn prepare(&self, shapes: &[Shape], table: &DataTable, row_index: usize) -> Result<RenderJob, ResourceError> {
        let mut shapes = shapes.to_vec();
        let mut pending = Vec::new();

        for (shape_index, shape) in shapes.iter_mut().enumerate() {
            // A column missing from the table leaves the shape as designed
            let value = shape.data_field.as_deref().and_then(|field| table.value(row_index, field));
            match &mut shape.kind {
                ShapeKind::Text { text, .. } => {
                    if let Some(value) = value {
                        *text = value.to_string();
                    }
                }
                ShapeKind::Image { image, .. } => match value.filter(|v| !v.is_empty()) {
                    Some(reference) => pending.push(PendingLoad {
                        shape_index,
                        reference: reference.to_string(),
                        bound: true,
                    }),
                    None if !image.is_loaded() && !image.source.is_empty() => pending.push(PendingLoad {
                        shape_index,
                        reference: image.source.clone(),
                        bound: false,
                    }),
                    None => {}
                },
                ShapeKind::Rect { .. } | ShapeKind::Path { .. } => {}
            }
        }

        let loads = pending.iter().map(|p| async move {
            match self.load(&p.reference).await {
                Ok(resource) => Ok(Some(resource)),
                Err(err) if !p.bound => {
                    tracing::warn!(row = row_index, error = %err, "static image could not be loaded, leaving it out");
                    Ok(None)
                }
                Err(err) => Err(err),
            }
        });
        let loaded = n0_future::try_join_all(loads).await?;

        for (resource, p) in loaded.into_iter().zip(&pending) {
            let Some(resource) = resource else {
                continue;
            };
            if let ShapeKind::Image { image, .. } = &mut shapes[p.shape_index].kind {
                *image = ImageHandle::loaded(p.reference.clone(), resource);
            }
        }

        Ok(RenderJob { row_index, shapes })
    }

    async fn load(&self, reference: &str) -> Result<Arc<ImageResource>, ResourceError> {
        let Some(timeout) = self.options.load_timeout else {
            return self.loader.load(reference).await;
        };
        tokio::time::timeout(timeout, self.loader.load(reference))
            .await
            .map_err(|_| ResourceError::Timeout {
                reference: reference.to_string(),
                timeout,
            })?
    }

    /// Draw the job in paint order on a fresh surface
    fn rasterize(&self, mut job: RenderJob, document: &Document) -> Result<Vec<u8>, SurfaceError> {
        job.shapes.sort_by_key(|s| s.z_index);
        let mut surface = self.surfaces.create(
            document.canvas_width(),
            document.canvas_height(),
            self.options.pixel_ratio,
        );
        for shape in &job.shapes {
            surface.add(shape);
        }
        tracing::trace!(row = job.row_index, "encoding surface");
        surface.encode()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use mergecanvas_core::{PropertyKey, ShapeId};

    use super::*;
    use crate::archive::MemorySink;
    use crate::error::JobFailure;
    use crate::loader::InMemoryImageLoader;
    use crate::loader::tests::png;

    /// Surface that "encodes" a readable description of what it was given
    struct RecordingSurface {
        lines: Vec<String>,
    }

    impl RenderSurface for RecordingSurface {
        fn add(&mut self, shape: &Shape) {
            let line = match &shape.kind {
                ShapeKind::Text { text, .. } => format!("{}:text:{}", shape.id, text),
                ShapeKind::Image { image, .. } => {
                    format!("{}:image:{}:{}", shape.id, image.source, image.is_loaded())
                }
                _ => format!("{}:{:?}", shape.id, shape.variant()),
            };
            self.lines.push(line);
        }

        fn encode(self) -> Result<Vec<u8>, SurfaceError> {
            Ok(self.lines.join("\n").into_bytes())
        }
    }

    #[derive(Default)]
    struct RecordingFactory {
        created: Mutex<Vec<(u32, u32, f32)>>,
    }

    impl SurfaceFactory for RecordingFactory {
        type Surface = RecordingSurface;

        fn create(&self, width: u32, height: u32, pixel_ratio: f32) -> RecordingSurface {
            self.created.lock().unwrap().push((width, height, pixel_ratio));
            RecordingSurface { lines: Vec::new() }
        }
    }

    /// Loader that never resolves
    struct StalledLoader;

    #[async_trait]
    impl ImageLoader for StalledLoader {
        async fn load(&self, _reference: &str) -> Result<Arc<ImageResource>, ResourceError> {
            std::future::pending().await
        }
    }

    fn table(columns: &[&str], rows: &[&[&str]]) -> DataTable {
        DataTable::new(
            columns.iter().map(|c| c.to_string()).collect(),
            rows.iter().map(|r| r.iter().map(|v| v.to_string()).collect()).collect(),
        )
    }

    fn bound_text_document() -> (Document, ShapeId) {
        let mut doc = Document::default();
        let id = doc.add_shape(ShapeKind::default_text());
        doc.update_property(&id, PropertyKey::DataField, "Name");
        (doc, id)
    }

    fn entry_text(output: &BatchOutput, name: &str) -> String {
        let entry = output.archive.entry(name).unwrap();
        String::from_utf8(entry.bytes.clone()).unwrap()
    }

    fn loader_with(images: &[&str]) -> InMemoryImageLoader {
        let mut loader = InMemoryImageLoader::new();
        for reference in images {
            loader.insert(*reference, png(2, 2, [9, 9, 9, 255])).unwrap();
        }
        loader
    }

    #[tokio::test]
    async fn one_entry_per_row_with_substituted_text() {
        let (doc, id) = bound_text_document();
        let data = table(&["Name"], &[&["Alice"], &["Bob"]]);
        let renderer = BatchRenderer::new(InMemoryImageLoader::new(), RecordingFactory::default());

        let output = renderer.generate(&doc, &data).await.unwrap();
        assert_eq!(output.archive.len(), 2);
        assert_eq!(entry_text(&output, "design_1.png"), "text1:text:Alice");
        assert_eq!(entry_text(&output, "design_2.png"), "text1:text:Bob");

        // The document itself is untouched
        match &doc.shape(&id).unwrap().kind {
            ShapeKind::Text { text, .. } => assert_eq!(text, "Sample Text"),
            other => panic!("unexpected kind {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_cell_renders_empty_text() {
        let (doc, _) = bound_text_document();
        let data = table(&["Other", "Name"], &[&["x"]]);
        let renderer = BatchRenderer::new(InMemoryImageLoader::new(), RecordingFactory::default());

        let output = renderer.generate(&doc, &data).await.unwrap();
        assert_eq!(entry_text(&output, "design_1.png"), "text1:text:");
    }

    #[tokio::test]
    async fn binding_to_unknown_column_keeps_design_text() {
        let mut doc = Document::default();
        let id = doc.add_shape(ShapeKind::default_text());
        doc.update_property(&id, PropertyKey::DataField, "Nmae");
        let data = table(&["Name"], &[&["Alice"]]);
        let renderer = BatchRenderer::new(InMemoryImageLoader::new(), RecordingFactory::default());

        let output = renderer.generate(&doc, &data).await.unwrap();
        assert_eq!(entry_text(&output, "design_1.png"), "text1:text:Sample Text");
    }

    #[tokio::test]
    async fn unloadable_static_image_is_left_out() {
        let mut doc = Document::default();
        doc.add_shape(ShapeKind::image(ImageHandle::new("https://cdn.example.com/page1/img0.png")));
        let data = table(&["Name"], &[&["Alice"], &["Bob"]]);
        let renderer = BatchRenderer::new(
            crate::loader::FsImageLoader::new("."),
            RecordingFactory::default(),
        );

        let output = renderer.generate(&doc, &data).await.unwrap();
        assert_eq!(output.archive.len(), 2);
        assert!(output.skipped.is_empty());
        assert_eq!(
            entry_text(&output, "design_1.png"),
            "image1:image:https://cdn.example.com/page1/img0.png:false"
        );
    }

    #[tokio::test]
    async fn whitespace_image_value_is_treated_as_a_reference() {
        let mut doc = Document::default();
        let id = doc.add_shape(ShapeKind::image(ImageHandle::new("logo.png")));
        doc.update_property(&id, PropertyKey::DataField, "Photo");
        let data = table(&["Photo"], &[&["  "]]);
        let renderer = BatchRenderer::new(loader_with(&["logo.png"]), RecordingFactory::default());

        let err = renderer.generate(&doc, &data).await.unwrap_err();
        assert!(matches!(
            err,
            RenderError::RenderJobFailed {
                row_index: 0,
                cause: JobFailure::Resource(ResourceError::NotFound(_)),
            }
        ));
    }

    #[tokio::test]
    async fn empty_dataset_is_rejected() {
        let (doc, _) = bound_text_document();
        let renderer = BatchRenderer::new(InMemoryImageLoader::new(), RecordingFactory::default());

        let err = renderer.generate(&doc, &table(&["Name"], &[])).await.unwrap_err();
        assert!(matches!(err, RenderError::Validation(_)));
    }

    #[tokio::test]
    async fn bound_images_are_loaded_before_drawing() {
        let mut doc = Document::default();
        let id = doc.add_shape(ShapeKind::image(ImageHandle::new("")));
        doc.update_property(&id, PropertyKey::DataField, "Photo");
        let data = table(&["Photo"], &[&["a.png"], &["b.png"]]);
        let renderer = BatchRenderer::new(loader_with(&["a.png", "b.png"]), RecordingFactory::default());

        let output = renderer.generate(&doc, &data).await.unwrap();
        assert_eq!(entry_text(&output, "design_1.png"), "image1:image:a.png:true");
        assert_eq!(entry_text(&output, "design_2.png"), "image1:image:b.png:true");
    }

    #[tokio::test]
    async fn blank_image_value_keeps_static_image() {
        let mut doc = Document::default();
        let id = doc.add_shape(ShapeKind::image(ImageHandle::new("logo.png")));
        doc.update_property(&id, PropertyKey::DataField, "Photo");
        let data = table(&["Photo"], &[&[""]]);
        let renderer = BatchRenderer::new(loader_with(&["logo.png"]), RecordingFactory::default());

        let output = renderer.generate(&doc, &data).await.unwrap();
        assert_eq!(entry_text(&output, "design_1.png"), "image1:image:logo.png:true");
    }

    #[tokio::test]
    async fn failed_load_aborts_the_batch() {
        let mut doc = Document::default();
        let id = doc.add_shape(ShapeKind::image(ImageHandle::new("")));
        doc.update_property(&id, PropertyKey::DataField, "Photo");
        let data = table(&["Photo"], &[&["a.png"], &["missing.png"], &["a.png"]]);
        let renderer = BatchRenderer::new(loader_with(&["a.png"]), RecordingFactory::default());

        let err = renderer.generate(&doc, &data).await.unwrap_err();
        match err {
            RenderError::RenderJobFailed {
                row_index,
                cause: JobFailure::Resource(ResourceError::NotFound(reference)),
            } => {
                assert_eq!(row_index, 1);
                assert_eq!(reference, "missing.png");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn failed_load_skips_row_when_configured() {
        let mut doc = Document::default();
        let id = doc.add_shape(ShapeKind::image(ImageHandle::new("")));
        doc.update_property(&id, PropertyKey::DataField, "Photo");
        let data = table(&["Photo"], &[&["a.png"], &["missing.png"], &["a.png"]]);
        let options = RenderOptions {
            failure_policy: FailurePolicy::SkipRow,
            ..RenderOptions::default()
        };
        let renderer = BatchRenderer::with_options(loader_with(&["a.png"]), RecordingFactory::default(), options);

        let output = renderer.generate(&doc, &data).await.unwrap();
        let names: Vec<_> = output.archive.entries().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["design_1.png", "design_3.png"]);
        assert_eq!(output.skipped.len(), 1);
        assert_eq!(output.skipped[0].row_index, 1);
    }

    #[tokio::test]
    async fn stalled_load_times_out() {
        let mut doc = Document::default();
        let id = doc.add_shape(ShapeKind::image(ImageHandle::new("")));
        doc.update_property(&id, PropertyKey::DataField, "Photo");
        let data = table(&["Photo"], &[&["slow.png"]]);
        let options = RenderOptions {
            load_timeout: Some(Duration::from_millis(20)),
            ..RenderOptions::default()
        };
        let renderer = BatchRenderer::with_options(StalledLoader, RecordingFactory::default(), options);

        let err = renderer.generate(&doc, &data).await.unwrap_err();
        assert!(matches!(
            err,
            RenderError::RenderJobFailed {
                cause: JobFailure::Resource(ResourceError::Timeout { .. }),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn shapes_are_drawn_in_paint_order() {
        let mut doc = Document::default();
        let back = doc.add_shape(ShapeKind::default_rect());
        doc.add_shape(ShapeKind::default_text());
        doc.reorder(&back, mergecanvas_core::Reorder::ToFront);
        let data = table(&["Name"], &[&["x"]]);
        let renderer = BatchRenderer::new(InMemoryImageLoader::new(), RecordingFactory::default());

        let output = renderer.generate(&doc, &data).await.unwrap();
        assert_eq!(entry_text(&output, "design_1.png"), "text1:text:Sample Text\nrect1:Rect");
    }

    #[tokio::test]
    async fn every_row_gets_a_fresh_surface_at_the_pixel_ratio() {
        let (doc, _) = bound_text_document();
        let data = table(&["Name"], &[&["a"], &["b"], &["c"]]);
        let renderer = BatchRenderer::new(InMemoryImageLoader::new(), RecordingFactory::default());

        renderer.generate(&doc, &data).await.unwrap();
        let created = renderer.surfaces.created.lock().unwrap().clone();
        assert_eq!(created, vec![(1000, 600, 2.0); 3]);
    }

    #[tokio::test]
    async fn export_hands_zip_to_sink() {
        let (doc, _) = bound_text_document();
        let data = table(&["Name"], &[&["Alice"]]);
        let renderer = BatchRenderer::new(InMemoryImageLoader::new(), RecordingFactory::default());
        let mut sink = MemorySink::default();

        let report = renderer
            .export(&doc, &data, &mut sink, crate::archive::DEFAULT_ARCHIVE_NAME)
            .await
            .unwrap();
        assert_eq!(report.rendered, 1);
        assert_eq!(sink.saved.len(), 1);
        assert_eq!(sink.saved[0].0, "designs.zip");
        assert_eq!(sink.saved[0].1.len(), report.zip_bytes);
    }

    #[test]
    fn default_options() {
        let options = RenderOptions::default();
        assert_eq!(options.pixel_ratio, 2.0);
        assert_eq!(options.failure_policy, FailurePolicy::AbortBatch);
        assert!(options.load_timeout.is_none());
    }
}
