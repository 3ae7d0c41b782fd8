//! The `project.json` schema.

use super::{StorageError, StorageResult};
use crate::background::{BackgroundImage, ImageSource};
use crate::color::HexColor;
use crate::document::{CellKey, GridSize, GuideLine, Layer, ProjectDocument};
use crate::palette::Palette;
use serde::{Deserialize, Serialize};

/// Newest manifest version this build writes and reads.
pub const MANIFEST_VERSION: u32 = 1;

fn legacy_version() -> u32 {
    // Documents written before versioning carried no field
    1
}

fn full_opacity() -> f64 {
    1.0
}

/// Serialized form of a [`ProjectDocument`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectManifest {
    #[serde(default = "legacy_version")]
    pub version: u32,
    pub grid_size: GridSize,
    #[serde(default)]
    pub lines: Vec<GuideLine>,
    #[serde(default)]
    pub colored_cells: Vec<(CellKey, HexColor)>,
    #[serde(default)]
    pub palette: Vec<HexColor>,
    #[serde(default)]
    pub selected_color: Option<usize>,
    /// Inline image as a data URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_image: Option<String>,
    /// Name of the archive entry holding the image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_image_file: Option<String>,
    #[serde(default = "full_opacity")]
    pub image_opacity: f64,
    #[serde(default = "full_opacity")]
    pub grid_opacity: f64,
    #[serde(default = "full_opacity")]
    pub fill_opacity: f64,
    #[serde(default = "full_opacity")]
    pub line_opacity: f64,
}

impl ProjectManifest {
    /// Capture a document. Uploaded images are referenced by entry name;
    /// inline images are embedded as a data URL.
    pub fn from_document(document: &ProjectDocument) -> Self {
        let (background_image, background_image_file) = match document.background() {
            Some(image) => match image.source() {
                ImageSource::File { name } => (None, Some(name.clone())),
                ImageSource::Inline => (Some(image.to_data_url()), None),
            },
            None => (None, None),
        };
        let opacities = document.opacities();

        Self {
            version: MANIFEST_VERSION,
            grid_size: document.grid(),
            lines: document.lines().to_vec(),
            colored_cells: document.cells().iter().collect(),
            palette: document.palette.colors().to_vec(),
            selected_color: document.palette.selected_index(),
            background_image,
            background_image_file,
            image_opacity: opacities.background,
            grid_opacity: opacities.grid,
            fill_opacity: opacities.fills,
            line_opacity: opacities.lines,
        }
    }

    pub fn to_json(&self) -> StorageResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| StorageError::Serialization(e.to_string()))
    }

    /// Parse and version-check a manifest.
    pub fn from_json(json: &str) -> StorageResult<Self> {
        let manifest: Self =
            serde_json::from_str(json).map_err(|e| StorageError::Serialization(e.to_string()))?;
        if manifest.version > MANIFEST_VERSION {
            return Err(StorageError::UnsupportedVersion {
                found: manifest.version,
                supported: MANIFEST_VERSION,
            });
        }
        Ok(manifest)
    }

    /// Build a document. `background` is the already-resolved image, if any.
    pub fn into_document(self, background: Option<BackgroundImage>) -> StorageResult<ProjectDocument> {
        self.grid_size
            .validate()
            .map_err(|e| StorageError::Invalid(e.to_string()))?;

        let mut document = ProjectDocument::new(self.grid_size);
        for line in self.lines {
            if line.is_degenerate() {
                log::debug!("Dropping zero-length line at {:?}", line.start);
                continue;
            }
            document.add_line(line);
        }
        for (key, color) in self.colored_cells {
            document.fill_cell(key.row, key.col, color);
        }

        if let Some(index) = self.selected_color {
            if index >= self.palette.len() {
                log::warn!(
                    "Selected color {} is outside the {}-color palette; clearing selection",
                    index,
                    self.palette.len()
                );
            }
        }
        document.palette = Palette::from_colors(self.palette, self.selected_color);

        document.set_opacity(Layer::Background, self.image_opacity);
        document.set_opacity(Layer::Grid, self.grid_opacity);
        document.set_opacity(Layer::Fills, self.fill_opacity);
        document.set_opacity(Layer::Lines, self.line_opacity);
        document.set_background(background);
        Ok(document)
    }
}
