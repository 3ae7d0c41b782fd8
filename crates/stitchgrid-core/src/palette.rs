//! Ordered palette with index-based selection.
//!
//! Duplicate colors are allowed; each slot is addressed by its index, so the
//! selection is an index rather than a color value.

use crate::color::HexColor;
use crate::document::DocumentError;

/// Color given to a newly added palette slot by the palette UI.
pub const NEW_SLOT_COLOR: HexColor = HexColor::BLACK;

/// The palette and its current selection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Palette {
    colors: Vec<HexColor>,
    selected: Option<usize>,
}

impl Palette {
    /// Create an empty palette with nothing selected.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a palette from existing colors and a selection.
    ///
    /// An out-of-range selection is dropped.
    pub fn from_colors(colors: Vec<HexColor>, selected: Option<usize>) -> Self {
        let selected = selected.filter(|&index| index < colors.len());
        Self { colors, selected }
    }

    pub fn colors(&self) -> &[HexColor] {
        &self.colors
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<HexColor> {
        self.colors.get(index).copied()
    }

    /// Append a slot and return its index.
    pub fn add(&mut self, color: HexColor) -> usize {
        self.colors.push(color);
        self.colors.len() - 1
    }

    /// Remove a slot, keeping the selection pointing at the same slot.
    ///
    /// Selecting the removed slot clears the selection; a selection after it
    /// shifts down by one.
    pub fn remove(&mut self, index: usize) -> Result<HexColor, DocumentError> {
        self.check_index(index)?;
        let removed = self.colors.remove(index);
        self.selected = match self.selected {
            Some(s) if s == index => None,
            Some(s) if s > index => Some(s - 1),
            other => other,
        };
        Ok(removed)
    }

    /// Replace the color of a slot. Duplicates of other slots are allowed.
    pub fn edit(&mut self, index: usize, color: HexColor) -> Result<HexColor, DocumentError> {
        self.check_index(index)?;
        Ok(std::mem::replace(&mut self.colors[index], color))
    }

    pub fn select(&mut self, index: usize) -> Result<(), DocumentError> {
        self.check_index(index)?;
        self.selected = Some(index);
        Ok(())
    }

    pub fn deselect(&mut self) {
        self.selected = None;
    }

    /// Index of the selected slot.
    pub fn selected_index(&self) -> Option<usize> {
        self.selected
    }

    /// Color of the selected slot.
    pub fn selected_color(&self) -> Option<HexColor> {
        self.selected.and_then(|index| self.get(index))
    }

    fn check_index(&self, index: usize) -> Result<(), DocumentError> {
        if index < self.colors.len() {
            Ok(())
        } else {
            Err(DocumentError::PaletteIndex {
                index,
                len: self.colors.len(),
            })
        }
    }
}
