use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use mergecanvas_core::{DataTable, ExtractionError, ExtractionResult};
use mergecanvas_export::{ArchiveError, ArchiveSink};

/// Read an extraction result. Parse failures are returned as the typed
/// error so the editor can reset itself the same way it does for a failed
/// extraction service call.
pub fn load_extraction(path: &Path) -> Result<Result<ExtractionResult, ExtractionError>> {
    let content =
        fs::read_to_string(path).with_context(|| format!("failed to read extraction result {}", path.display()))?;
    Ok(ExtractionResult::from_json(&content))
}

/// Read a dataset stored as a JSON array of string arrays, header first
pub fn load_dataset(path: &Path) -> Result<DataTable> {
    let content = fs::read_to_string(path).with_context(|| format!("failed to read dataset {}", path.display()))?;
    let records: Vec<Vec<String>> =
        serde_json::from_str(&content).with_context(|| format!("dataset {} is not an array of string arrays", path.display()))?;
    if records.is_empty() {
        bail!("dataset {} has no header record", path.display());
    }
    Ok(DataTable::from_records(records))
}

/// Writes archives into a directory
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, file_name: &str) -> PathBuf {
        self.dir.join(file_name)
    }
}

impl ArchiveSink for DirectorySink {
    fn save(&mut self, file_name: &str, bytes: &[u8]) -> Result<(), ArchiveError> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.path_for(file_name), bytes)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dataset_header_becomes_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("people.json");
        fs::write(&path, r#"[["Name","Photo"],["Alice","a.png"],["Bob"]]"#).unwrap();

        let table = load_dataset(&path).unwrap();
        assert_eq!(table.columns(), ["Name", "Photo"]);
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.value(1, "Photo"), Some(""));
    }

    #[test]
    fn empty_dataset_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.json");
        fs::write(&path, "[]").unwrap();
        assert!(load_dataset(&path).is_err());
    }

    #[test]
    fn malformed_extraction_is_a_typed_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{ not json").unwrap();

        let parsed = load_extraction(&path).unwrap();
        assert!(matches!(parsed, Err(ExtractionError::Malformed(_))));
    }

    #[test]
    fn missing_extraction_file_has_context() {
        let err = load_extraction(Path::new("/nonexistent/extraction.json")).unwrap_err();
        assert!(err.to_string().contains("failed to read extraction result"));
    }

    #[test]
    fn directory_sink_creates_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = DirectorySink::new(dir.path().join("out/nested"));
        sink.save("designs.zip", b"zip").unwrap();
        assert_eq!(fs::read(sink.path_for("designs.zip")).unwrap(), b"zip");
    }
}
