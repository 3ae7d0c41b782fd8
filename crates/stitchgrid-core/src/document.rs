//! Pattern document: grid size, guide lines, cell fills, palette and layers.

use crate::background::BackgroundImage;
use crate::color::HexColor;
use crate::palette::Palette;
use kurbo::Point;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

/// Document errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocumentError {
    #[error("Grid must have at least one row and one column (got {rows}x{cols})")]
    InvalidGridSize { rows: u32, cols: u32 },
    #[error("Grid can only be resized while the document is empty")]
    NotEmpty,
    #[error("Palette index {index} out of range (palette has {len} colors)")]
    PaletteIndex { index: usize, len: usize },
    #[error("Invalid cell key: {0:?}")]
    InvalidCellKey(String),
}

/// Hand out a revision stamp that no document has used before.
///
/// Stamps are global so that a replaced document never repeats the stamps
/// of the one it replaced.
pub(crate) fn next_revision() -> u64 {
    static REVISION_COUNTER: AtomicU64 = AtomicU64::new(1);
    REVISION_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Number of rows and columns in the pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridSize {
    pub rows: u32,
    pub cols: u32,
}

impl GridSize {
    /// Default grid offered by the "new grid" form.
    pub const DEFAULT: Self = Self { rows: 60, cols: 60 };

    pub fn new(rows: u32, cols: u32) -> Result<Self, DocumentError> {
        let size = Self { rows, cols };
        size.validate()?;
        Ok(size)
    }

    pub fn validate(&self) -> Result<(), DocumentError> {
        if self.rows == 0 || self.cols == 0 {
            return Err(DocumentError::InvalidGridSize {
                rows: self.rows,
                cols: self.cols,
            });
        }
        Ok(())
    }

    /// Whether `(row, col)` lies inside the grid.
    pub fn contains(&self, row: u32, col: u32) -> bool {
        row < self.rows && col < self.cols
    }
}

impl Default for GridSize {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Canonical key of a cell, written `"{row}-{col}"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellKey {
    pub row: u32,
    pub col: u32,
}

impl CellKey {
    pub fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }
}

impl fmt::Display for CellKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.row, self.col)
    }
}

impl FromStr for CellKey {
    type Err = DocumentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || DocumentError::InvalidCellKey(s.to_string());
        let (row, col) = s.split_once('-').ok_or_else(invalid)?;
        // Reject signs and whitespace that u32::from_str would tolerate
        let digits = |part: &str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());
        if !digits(row) || !digits(col) {
            return Err(invalid());
        }
        Ok(Self {
            row: row.parse().map_err(|_| invalid())?,
            col: col.parse().map_err(|_| invalid())?,
        })
    }
}

impl Serialize for CellKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CellKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A straight guide segment drawn over the grid, in grid units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GuideLine {
    pub start: Point,
    pub end: Point,
    pub color: HexColor,
}

impl GuideLine {
    pub fn new(start: Point, end: Point, color: HexColor) -> Self {
        Self { start, end, color }
    }

    /// Zero-length segments are never persisted.
    pub fn is_degenerate(&self) -> bool {
        self.start == self.end
    }
}

/// Filled cells, one entry per cell. Absence means unfilled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColoredCells {
    cells: BTreeMap<CellKey, HexColor>,
}

impl ColoredCells {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: CellKey) -> Option<HexColor> {
        self.cells.get(&key).copied()
    }

    /// Set a cell's color, returning the previous color.
    pub fn insert(&mut self, key: CellKey, color: HexColor) -> Option<HexColor> {
        self.cells.insert(key, color)
    }

    pub fn remove(&mut self, key: CellKey) -> Option<HexColor> {
        self.cells.remove(&key)
    }

    /// Entries ordered by row, then column.
    pub fn iter(&self) -> impl Iterator<Item = (CellKey, HexColor)> + '_ {
        self.cells.iter().map(|(&key, &color)| (key, color))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl FromIterator<(CellKey, HexColor)> for ColoredCells {
    fn from_iter<I: IntoIterator<Item = (CellKey, HexColor)>>(iter: I) -> Self {
        Self {
            cells: iter.into_iter().collect(),
        }
    }
}

/// The four raster layers, back to front.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layer {
    /// Reference image stretched over the grid.
    Background,
    /// Row and column boundaries.
    Grid,
    /// Cell fills.
    Fills,
    /// Guide lines.
    Lines,
}

impl Layer {
    /// All layers in compositing order.
    pub const ALL: [Layer; 4] = [Layer::Background, Layer::Grid, Layer::Fills, Layer::Lines];

    /// Display name for this layer.
    pub fn name(self) -> &'static str {
        match self {
            Layer::Background => "Image",
            Layer::Grid => "Grid",
            Layer::Fills => "Cells",
            Layer::Lines => "Lines",
        }
    }
}

/// Independent opacity per layer, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerOpacities {
    pub background: f64,
    pub grid: f64,
    pub fills: f64,
    pub lines: f64,
}

impl Default for LayerOpacities {
    fn default() -> Self {
        Self {
            background: 1.0,
            grid: 1.0,
            fills: 1.0,
            lines: 1.0,
        }
    }
}

impl LayerOpacities {
    pub fn get(&self, layer: Layer) -> f64 {
        match layer {
            Layer::Background => self.background,
            Layer::Grid => self.grid,
            Layer::Fills => self.fills,
            Layer::Lines => self.lines,
        }
    }

    /// Set one channel, clamped to `[0, 1]`. NaN is ignored.
    /// Returns true if the stored value changed.
    pub fn set(&mut self, layer: Layer, value: f64) -> bool {
        if value.is_nan() {
            return false;
        }
        let value = value.clamp(0.0, 1.0);
        let slot = match layer {
            Layer::Background => &mut self.background,
            Layer::Grid => &mut self.grid,
            Layer::Fills => &mut self.fills,
            Layer::Lines => &mut self.lines,
        };
        if *slot == value {
            return false;
        }
        *slot = value;
        true
    }
}

/// Revision stamps of each layer input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Revisions {
    pub lines: u64,
    pub cells: u64,
    pub background: u64,
    pub opacities: u64,
}

impl Revisions {
    fn fresh() -> Self {
        Self {
            lines: next_revision(),
            cells: next_revision(),
            background: next_revision(),
            opacities: next_revision(),
        }
    }
}

/// The persisted pattern design.
#[derive(Debug, Clone)]
pub struct ProjectDocument {
    grid: GridSize,
    lines: Vec<GuideLine>,
    cells: ColoredCells,
    /// Palette and its selection. Not a layer input, so edits need no stamp.
    pub palette: Palette,
    opacities: LayerOpacities,
    background: Option<BackgroundImage>,
    revisions: Revisions,
}

impl Default for ProjectDocument {
    fn default() -> Self {
        Self::new(GridSize::DEFAULT)
    }
}

impl ProjectDocument {
    /// Create an empty document for the given grid.
    pub fn new(grid: GridSize) -> Self {
        Self {
            grid,
            lines: Vec::new(),
            cells: ColoredCells::new(),
            palette: Palette::new(),
            opacities: LayerOpacities::default(),
            background: None,
            revisions: Revisions::fresh(),
        }
    }

    pub fn grid(&self) -> GridSize {
        self.grid
    }

    /// Change the grid size. Only allowed while nothing has been drawn.
    pub fn resize(&mut self, grid: GridSize) -> Result<(), DocumentError> {
        grid.validate()?;
        if !self.is_empty() {
            return Err(DocumentError::NotEmpty);
        }
        self.grid = grid;
        Ok(())
    }

    /// True when there are no guide lines and no filled cells.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty() && self.cells.is_empty()
    }

    pub fn revisions(&self) -> Revisions {
        self.revisions
    }

    /// Guide lines in z-order (later lines on top).
    pub fn lines(&self) -> &[GuideLine] {
        &self.lines
    }

    pub fn add_line(&mut self, line: GuideLine) {
        self.lines.push(line);
        self.revisions.lines = next_revision();
    }

    pub fn remove_line(&mut self, index: usize) -> Option<GuideLine> {
        if index >= self.lines.len() {
            return None;
        }
        let removed = self.lines.remove(index);
        self.revisions.lines = next_revision();
        Some(removed)
    }

    pub fn cells(&self) -> &ColoredCells {
        &self.cells
    }

    /// Fill a cell. Returns false if it already had this color.
    ///
    /// The row and column are not range-checked.
    pub fn fill_cell(&mut self, row: u32, col: u32, color: HexColor) -> bool {
        let previous = self.cells.insert(CellKey::new(row, col), color);
        if previous == Some(color) {
            return false;
        }
        self.revisions.cells = next_revision();
        true
    }

    /// Unfill a cell. Returns false if it was already empty.
    pub fn clear_cell(&mut self, row: u32, col: u32) -> bool {
        if self.cells.remove(CellKey::new(row, col)).is_none() {
            return false;
        }
        self.revisions.cells = next_revision();
        true
    }

    pub fn opacities(&self) -> LayerOpacities {
        self.opacities
    }

    /// Set one layer's opacity. Returns true if it changed.
    pub fn set_opacity(&mut self, layer: Layer, value: f64) -> bool {
        let changed = self.opacities.set(layer, value);
        if changed {
            self.revisions.opacities = next_revision();
        }
        changed
    }

    pub fn background(&self) -> Option<&BackgroundImage> {
        self.background.as_ref()
    }

    /// Replace only the background slot.
    pub fn set_background(&mut self, image: Option<BackgroundImage>) {
        self.background = image;
        self.revisions.background = next_revision();
    }

    /// Color of the selected palette slot.
    pub fn selected_color(&self) -> Option<HexColor> {
        self.palette.selected_color()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn red() -> HexColor {
        HexColor::new(255, 0, 0)
    }

    #[test]
    fn test_grid_size_validation() {
        assert!(GridSize::new(10, 12).is_ok());
        assert!(matches!(
            GridSize::new(0, 5),
            Err(DocumentError::InvalidGridSize { rows: 0, cols: 5 })
        ));
        assert!(GridSize::new(5, 0).is_err());
    }

    #[test]
    fn test_cell_key_format() {
        let key = CellKey::new(2, 3);
        assert_eq!(key.to_string(), "2-3");
        assert_eq!("2-3".parse::<CellKey>().unwrap(), key);
        assert_eq!("10-0".parse::<CellKey>().unwrap(), CellKey::new(10, 0));
    }

    #[test]
    fn test_cell_key_rejects_garbage() {
        for bad in ["", "2", "2-", "-3", "a-b", "2-3-4", "+2-3", " 2-3", "-1-3"] {
            assert!(bad.parse::<CellKey>().is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn test_fill_and_clear() {
        let mut doc = ProjectDocument::new(GridSize::new(10, 10).unwrap());
        assert!(doc.fill_cell(2, 3, red()));
        assert_eq!(doc.cells().len(), 1);
        assert_eq!(doc.cells().get(CellKey::new(2, 3)), Some(red()));

        assert!(doc.clear_cell(2, 3));
        assert!(doc.cells().is_empty());
    }

    #[test]
    fn test_fill_same_color_is_noop() {
        let mut doc = ProjectDocument::default();
        doc.fill_cell(1, 1, red());
        let before = doc.revisions();
        let cells_before = doc.cells().clone();

        assert!(!doc.fill_cell(1, 1, red()));
        assert_eq!(doc.cells(), &cells_before);
        assert_eq!(doc.revisions(), before);
    }

    #[test]
    fn test_fill_overwrites_color() {
        let mut doc = ProjectDocument::default();
        doc.fill_cell(1, 1, red());
        assert!(doc.fill_cell(1, 1, HexColor::BLACK));
        assert_eq!(doc.cells().get(CellKey::new(1, 1)), Some(HexColor::BLACK));
        assert_eq!(doc.cells().len(), 1);
    }

    #[test]
    fn test_clear_empty_cell_is_noop() {
        let mut doc = ProjectDocument::default();
        let before = doc.revisions();
        assert!(!doc.clear_cell(4, 4));
        assert_eq!(doc.revisions(), before);
    }

    #[test]
    fn test_line_revisions() {
        let mut doc = ProjectDocument::default();
        let before = doc.revisions();

        doc.add_line(GuideLine::new(Point::ZERO, Point::new(1.0, 1.0), red()));
        let after_add = doc.revisions();
        assert_ne!(after_add.lines, before.lines);
        assert_eq!(after_add.cells, before.cells);

        assert!(doc.remove_line(3).is_none());
        assert_eq!(doc.revisions(), after_add);

        assert!(doc.remove_line(0).is_some());
        assert_ne!(doc.revisions().lines, after_add.lines);
    }

    #[test]
    fn test_new_documents_never_share_stamps() {
        let a = ProjectDocument::default();
        let b = ProjectDocument::default();
        assert_ne!(a.revisions().lines, b.revisions().lines);
        assert_ne!(a.revisions().cells, b.revisions().cells);
    }

    #[test]
    fn test_resize_only_when_empty() {
        let mut doc = ProjectDocument::default();
        doc.resize(GridSize::new(20, 30).unwrap()).unwrap();
        assert_eq!(doc.grid(), GridSize { rows: 20, cols: 30 });

        doc.fill_cell(0, 0, red());
        assert_eq!(
            doc.resize(GridSize::new(5, 5).unwrap()),
            Err(DocumentError::NotEmpty)
        );
        assert_eq!(doc.grid().rows, 20);
    }

    #[test]
    fn test_opacity_clamped() {
        let mut doc = ProjectDocument::default();
        assert!(!doc.set_opacity(Layer::Grid, 1.5));
        assert!(doc.set_opacity(Layer::Grid, -0.5));
        assert_eq!(doc.opacities().grid, 0.0);
        assert!(!doc.set_opacity(Layer::Grid, f64::NAN));
        assert!(doc.set_opacity(Layer::Lines, 0.25));
        assert_eq!(doc.opacities().get(Layer::Lines), 0.25);
        assert_eq!(doc.opacities().fills, 1.0);
    }

    #[test]
    fn test_guide_line_json_shape() {
        let line = GuideLine::new(Point::new(0.0, 0.5), Point::new(2.0, 3.0), red());
        let value = serde_json::to_value(line).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "start": {"x": 0.0, "y": 0.5},
                "end": {"x": 2.0, "y": 3.0},
                "color": "#ff0000"
            })
        );
    }
}
