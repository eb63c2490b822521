//! Archive of rendered designs.

use std::io::{Cursor, Write};

use crate::error::ArchiveError;

/// File name used when the caller does not pick one
pub const DEFAULT_ARCHIVE_NAME: &str = "designs.zip";

/// Entry name for a dataset row; numbering is 1-based
pub fn entry_name(row_index: usize) -> String {
    format!("design_{}.png", row_index + 1)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Rendered PNGs collected in row order
#[derive(Debug, Clone, Default)]
pub struct Archive {
    entries: Vec<ArchiveEntry>,
}

impl Archive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the PNG rendered for a row
    pub fn push(&mut self, row_index: usize, png: Vec<u8>) {
        self.entries.push(ArchiveEntry {
            name: entry_name(row_index),
            bytes: png,
        });
    }

    pub fn entries(&self) -> &[ArchiveEntry] {
        &self.entries
    }

    pub fn entry(&self, name: &str) -> Option<&ArchiveEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Encode as a zip file
    pub fn to_zip(&self) -> Result<Vec<u8>, ArchiveError> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options =
            zip::write::SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

        for entry in &self.entries {
            writer.start_file(entry.name.as_str(), options)?;
            writer.write_all(&entry.bytes)?;
        }

        Ok(writer.finish()?.into_inner())
    }
}

/// Destination for the finished zip (a download prompt, a file, ...)
pub trait ArchiveSink {
    fn save(&mut self, file_name: &str, bytes: &[u8]) -> Result<(), ArchiveError>;
}

/// Keeps saved archives in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    pub saved: Vec<(String, Vec<u8>)>,
}

impl ArchiveSink for MemorySink {
    fn save(&mut self, file_name: &str, bytes: &[u8]) -> Result<(), ArchiveError> {
        self.saved.push((file_name.to_string(), bytes.to_vec()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use super::*;

    #[test]
    fn entries_are_numbered_from_one() {
        assert_eq!(entry_name(0), "design_1.png");
        assert_eq!(entry_name(9), "design_10.png");
    }

    #[test]
    fn zip_contains_every_entry() {
        let mut archive = Archive::new();
        archive.push(0, b"first".to_vec());
        archive.push(2, b"third".to_vec());

        let bytes = archive.to_zip().unwrap();
        let mut zip = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(zip.len(), 2);

        let mut contents = String::new();
        zip.by_name("design_3.png").unwrap().read_to_string(&mut contents).unwrap();
        assert_eq!(contents, "third");
    }

    #[test]
    fn empty_archive_is_still_a_valid_zip() {
        let bytes = Archive::new().to_zip().unwrap();
        let zip = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(zip.len(), 0);
    }
}
