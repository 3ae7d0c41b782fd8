//! Project persistence: the zip archive format and file picker export.

mod archive;
mod manifest;
#[cfg(feature = "native")]
mod picker;

#[cfg(not(target_arch = "wasm32"))]
mod file;

pub use archive::{MANIFEST_ENTRY, SUGGESTED_EXPORT_NAME, export_archive, import_archive, is_safe_entry_name};
pub use manifest::{MANIFEST_VERSION, ProjectManifest};
#[cfg(feature = "native")]
pub use picker::RfdPicker;

#[cfg(not(target_arch = "wasm32"))]
pub(crate) use file::{read_archive_file, write_archive_file};

use std::path::PathBuf;
use thiserror::Error;

/// Storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Archive error: {0}")]
    Archive(String),
    #[error("Archive has no project.json manifest")]
    MissingManifest,
    #[error("Project version {found} is newer than supported version {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },
    #[error("Invalid project: {0}")]
    Invalid(String),
}

impl From<zip::result::ZipError> for StorageError {
    fn from(e: zip::result::ZipError) -> Self {
        StorageError::Archive(e.to_string())
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Host file dialogs. `None` means the user cancelled.
pub trait FilePicker {
    /// Choose an archive to import.
    fn pick_import(&self) -> Option<PathBuf>;

    /// Choose where to write an export.
    fn pick_export(&self, suggested_name: &str) -> Option<PathBuf>;
}
