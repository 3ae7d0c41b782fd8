//! Zip archive export and import.
//!
//! An archive holds `project.json` and, when the background came from an
//! uploaded file, that file under its own name.

use super::manifest::ProjectManifest;
use super::{StorageError, StorageResult};
use crate::background::{BackgroundImage, ImageSource};
use crate::document::ProjectDocument;
use std::io::{Cursor, Read, Write};
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

/// Archive entry holding the manifest.
pub const MANIFEST_ENTRY: &str = "project.json";

/// File name offered by the export dialog.
pub const SUGGESTED_EXPORT_NAME: &str = "cross-stitch-project.zip";

/// Whether `name` is a plain file name that cannot escape the archive root.
pub fn is_safe_entry_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains('/')
        && !name.contains('\\')
}

/// Write a document to zip bytes.
pub fn export_archive(document: &ProjectDocument) -> StorageResult<Vec<u8>> {
    let manifest = ProjectManifest::from_document(document);
    let json = manifest.to_json()?;

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    zip.start_file(MANIFEST_ENTRY, options)?;
    zip.write_all(json.as_bytes())
        .map_err(|e| StorageError::Io(format!("Failed to write {}: {}", MANIFEST_ENTRY, e)))?;

    if let Some(image) = document.background() {
        if let ImageSource::File { name } = image.source() {
            if !is_safe_entry_name(name) || name == MANIFEST_ENTRY {
                return Err(StorageError::Invalid(format!("Unsafe image entry name: {name:?}")));
            }
            zip.start_file(name.as_str(), options)?;
            zip.write_all(image.bytes())
                .map_err(|e| StorageError::Io(format!("Failed to write {}: {}", name, e)))?;
        }
    }

    let cursor = zip.finish()?;
    let bytes = cursor.into_inner();
    log::info!(
        "Exported {}x{} project ({} bytes)",
        document.grid().rows,
        document.grid().cols,
        bytes.len()
    );
    Ok(bytes)
}

/// Read a document from zip bytes.
///
/// A missing or broken image entry clears the background rather than
/// failing the import.
pub fn import_archive(bytes: &[u8]) -> StorageResult<ProjectDocument> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;

    let json = {
        let mut entry = match archive.by_name(MANIFEST_ENTRY) {
            Ok(entry) => entry,
            Err(zip::result::ZipError::FileNotFound) => return Err(StorageError::MissingManifest),
            Err(e) => return Err(e.into()),
        };
        let mut json = String::new();
        entry
            .read_to_string(&mut json)
            .map_err(|e| StorageError::Io(format!("Failed to read {}: {}", MANIFEST_ENTRY, e)))?;
        json
    };

    let manifest = ProjectManifest::from_json(&json)?;
    let background = match (&manifest.background_image_file, &manifest.background_image) {
        (Some(name), _) => read_image_entry(&mut archive, name),
        (None, Some(url)) => match BackgroundImage::from_data_url(url) {
            Ok(image) => Some(image),
            Err(e) => {
                log::warn!("Ignoring inline background image: {}", e);
                None
            }
        },
        (None, None) => None,
    };

    let document = manifest.into_document(background)?;
    log::info!(
        "Imported {}x{} project with {} lines and {} filled cells",
        document.grid().rows,
        document.grid().cols,
        document.lines().len(),
        document.cells().len()
    );
    Ok(document)
}

fn read_image_entry<R: Read + std::io::Seek>(archive: &mut ZipArchive<R>, name: &str) -> Option<BackgroundImage> {
    if !is_safe_entry_name(name) || name == MANIFEST_ENTRY {
        log::warn!("Ignoring background image with unsafe entry name {:?}", name);
        return None;
    }

    let mut bytes = Vec::new();
    match archive.by_name(name) {
        Ok(mut entry) => {
            if let Err(e) = entry.read_to_end(&mut bytes) {
                log::warn!("Failed to read background image {}: {}", name, e);
                return None;
            }
        }
        Err(e) => {
            log::warn!("Background image {} missing from archive: {}", name, e);
            return None;
        }
    }

    match BackgroundImage::from_file(name, bytes) {
        Ok(image) => Some(image),
        Err(e) => {
            log::warn!("Ignoring background image {}: {}", name, e);
            None
        }
    }
}
