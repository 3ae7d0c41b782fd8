//! Archive files at paths chosen through a [`FilePicker`](super::FilePicker).

use super::{StorageError, StorageResult, export_archive, import_archive};
use crate::document::ProjectDocument;
use std::fs;
use std::path::Path;

/// Write a document's archive to `path`, replacing any existing file.
pub(crate) fn write_archive_file(path: &Path, document: &ProjectDocument) -> StorageResult<()> {
    let bytes = export_archive(document)?;
    fs::write(path, bytes)
        .map_err(|e| StorageError::Io(format!("Failed to write {}: {}", path.display(), e)))
}

/// Read an archive from `path`.
pub(crate) fn read_archive_file(path: &Path) -> StorageResult<ProjectDocument> {
    let bytes = fs::read(path)
        .map_err(|e| StorageError::Io(format!("Failed to read {}: {}", path.display(), e)))?;
    import_archive(&bytes)
}
