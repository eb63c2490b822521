use std::path::PathBuf;

use anyhow::{Context, Result, anyhow, bail};
use mergecanvas_core::{DataTable, Document, ExtractionError, ExtractionResult, ShapeId};
use mergecanvas_export::{ArchiveSink, BatchRenderer, ExportReport, FsImageLoader, RenderOptions, SvgSurfaceFactory};
use mergecanvas_session::Editor;

/// Parse a `SHAPE=COLUMN` binding argument
pub fn parse_binding(arg: &str) -> Result<(String, String), String> {
    match arg.split_once('=') {
        Some((shape, column)) if !shape.trim().is_empty() => Ok((shape.trim().to_string(), column.to_string())),
        _ => Err(format!("expected SHAPE=COLUMN, got '{arg}'")),
    }
}

/// Application state: the editing session plus everything needed to export
pub struct App {
    pub editor: Editor,
    options: RenderOptions,
    images_dir: PathBuf,
    surfaces: SvgSurfaceFactory,
}

impl App {
    pub fn new(options: RenderOptions, images_dir: PathBuf) -> Self {
        Self::with_surfaces(options, images_dir, SvgSurfaceFactory::new())
    }

    pub fn with_surfaces(options: RenderOptions, images_dir: PathBuf, surfaces: SvgSurfaceFactory) -> Self {
        Self {
            editor: Editor::new(),
            options,
            images_dir,
            surfaces,
        }
    }

    pub fn document(&self) -> Result<&Document> {
        self.editor.document().ok_or_else(|| anyhow!("no document loaded"))
    }

    /// Seed the editor from an extraction result
    pub fn open(&mut self, extraction: Result<ExtractionResult, ExtractionError>) -> Result<&Document> {
        self.editor
            .load_extraction(extraction)
            .context("could not build a document from the extraction result")
    }

    pub fn load_table(&mut self, table: DataTable) {
        self.editor.load_table(table);
    }

    /// Stage and commit `SHAPE=COLUMN` bindings as one mapping
    pub fn bind(&mut self, bindings: &[(String, String)]) -> Result<()> {
        let doc = self.document()?;
        for (shape, column) in bindings {
            let id = ShapeId::from(shape.as_str());
            let Some(target) = doc.shape(&id) else {
                bail!("no shape with id '{shape}'");
            };
            if !target.is_bindable() {
                tracing::warn!(shape = %id, "shape kind ignores its data field when rendering");
            }
            if self.editor.table().column_index(column).is_none() {
                tracing::warn!(shape = %id, column = %column, "column not in dataset, shape keeps its design content");
            }
        }

        for (shape, column) in bindings {
            self.editor
                .set_mapping(ShapeId::from(shape.as_str()), Some(column.clone()));
        }
        if !bindings.is_empty() {
            self.editor.commit_mapping();
        }
        Ok(())
    }

    /// Render every dataset row and save the archive through `sink`
    pub async fn export<S: ArchiveSink + ?Sized>(&self, sink: &mut S, file_name: &str) -> Result<ExportReport> {
        let doc = self.document()?;
        let renderer = BatchRenderer::with_options(
            FsImageLoader::new(&self.images_dir),
            self.surfaces.clone(),
            self.options.clone(),
        );
        let report = renderer
            .export(doc, self.editor.table(), sink, file_name)
            .await
            .context("batch export failed")?;
        Ok(report)
    }
}
