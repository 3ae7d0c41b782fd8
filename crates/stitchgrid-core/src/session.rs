//! Runtime aggregate tying the document to the viewport and pointer input.
//!
//! The host UI owns one [`Session`], forwards container resizes and pointer
//! events to it, and issues commands (zoom, palette edits, uploads, import
//! and export) through its methods.

use crate::background::{BackgroundError, BackgroundImage, DecodeSlot, DecodeTicket};
use crate::color::HexColor;
use crate::config::EngineConfig;
use crate::document::{DocumentError, GridSize, Layer, ProjectDocument};
use crate::input::PointerEvent;
use crate::interaction::{InteractionController, LinePreview, PointerResponse};
use crate::storage::{StorageResult, export_archive, import_archive};
use crate::viewport::{ViewportSizer, ViewportState};
use kurbo::{Size, Vec2};

#[cfg(not(target_arch = "wasm32"))]
use crate::storage::{FilePicker, SUGGESTED_EXPORT_NAME};
#[cfg(not(target_arch = "wasm32"))]
use std::path::PathBuf;

/// A single open design and everything derived from it.
#[derive(Debug)]
pub struct Session {
    document: ProjectDocument,
    sizer: ViewportSizer,
    controller: InteractionController,
    decode_slot: DecodeSlot,
    config: EngineConfig,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl Session {
    /// Start with an empty design of the default size.
    pub fn new(config: EngineConfig) -> Self {
        Self::with_document(ProjectDocument::default(), config)
    }

    pub fn with_document(document: ProjectDocument, config: EngineConfig) -> Self {
        Self {
            sizer: ViewportSizer::new(document.grid(), config.viewport),
            controller: InteractionController::new(config.interaction),
            decode_slot: DecodeSlot::new(),
            document,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn document(&self) -> &ProjectDocument {
        &self.document
    }

    pub fn viewport(&self) -> &ViewportState {
        self.sizer.state()
    }

    /// Container size last reported through [`Session::observe_container`].
    pub fn container_size(&self) -> Size {
        self.sizer.container()
    }

    /// Stamp that changes whenever the cell size or grid dimensions change.
    pub fn layout_revision(&self) -> u64 {
        self.sizer.layout_revision()
    }

    // --- Grid ---

    /// Discard the current design and start an empty one.
    pub fn new_design(&mut self, grid: GridSize) -> Result<(), DocumentError> {
        grid.validate()?;
        log::info!("New {}x{} design", grid.rows, grid.cols);
        self.replace_document(ProjectDocument::new(grid));
        Ok(())
    }

    /// Resize the grid of a design that has nothing drawn yet.
    pub fn resize_grid(&mut self, grid: GridSize) -> Result<(), DocumentError> {
        self.document.resize(grid)?;
        self.sizer.set_grid(grid);
        Ok(())
    }

    // --- Viewport ---

    /// Report the container size. Returns true if the layout changed.
    pub fn observe_container(&mut self, width: f64, height: f64) -> bool {
        self.sizer.observe(width, height)
    }

    pub fn set_origin(&mut self, origin: Vec2) {
        self.sizer.set_origin(origin);
    }

    pub fn set_zoom(&mut self, zoom: f64) -> bool {
        self.sizer.set_zoom(zoom)
    }

    pub fn zoom_in(&mut self) -> bool {
        self.sizer.zoom_in()
    }

    pub fn zoom_out(&mut self) -> bool {
        self.sizer.zoom_out()
    }

    pub fn reset_zoom(&mut self) -> bool {
        self.sizer.reset_zoom()
    }

    // --- Layers and palette ---

    pub fn set_opacity(&mut self, layer: Layer, value: f64) -> bool {
        self.document.set_opacity(layer, value)
    }

    pub fn add_palette_color(&mut self, color: HexColor) -> usize {
        self.document.palette.add(color)
    }

    pub fn remove_palette_color(&mut self, index: usize) -> Result<HexColor, DocumentError> {
        self.document.palette.remove(index)
    }

    /// Replace a slot's color, returning the old one.
    pub fn edit_palette_color(&mut self, index: usize, color: HexColor) -> Result<HexColor, DocumentError> {
        self.document.palette.edit(index, color)
    }

    pub fn select_color(&mut self, index: usize) -> Result<(), DocumentError> {
        self.document.palette.select(index)
    }

    pub fn deselect_color(&mut self) {
        self.document.palette.deselect();
    }

    // --- Pointer input ---

    pub fn handle_pointer(&mut self, event: PointerEvent) -> PointerResponse {
        self.controller.handle(event, &mut self.document, self.sizer.state())
    }

    /// Line being dragged, drawn over the composite.
    pub fn preview(&self) -> Option<LinePreview> {
        self.controller.preview(&self.document)
    }

    // --- Background image ---

    /// Start a background decode. Any earlier outstanding ticket is void.
    pub fn request_background(&mut self) -> DecodeTicket {
        self.decode_slot.begin()
    }

    /// Install a finished decode. Returns `Ok(false)` when the ticket was
    /// superseded, whatever the decode produced; only the background slot is
    /// ever replaced.
    pub fn complete_background(
        &mut self,
        ticket: DecodeTicket,
        result: Result<BackgroundImage, BackgroundError>,
    ) -> Result<bool, BackgroundError> {
        if !self.decode_slot.is_current(&ticket) {
            log::debug!("Discarding superseded background decode");
            return Ok(false);
        }
        let image = result.inspect_err(|e| log::error!("Background image failed to load: {}", e))?;
        self.decode_slot.accept(ticket);
        log::info!("Background image set ({}x{})", image.width(), image.height());
        self.document.set_background(Some(image));
        Ok(true)
    }

    /// Decode an uploaded file on the calling thread and install it.
    pub fn load_background_file(&mut self, name: &str, bytes: Vec<u8>) -> Result<(), BackgroundError> {
        let ticket = self.request_background();
        self.complete_background(ticket, BackgroundImage::from_file(name, bytes))
            .map(|_| ())
    }

    pub fn clear_background(&mut self) {
        self.decode_slot.invalidate();
        self.document.set_background(None);
    }

    // --- Import and export ---

    pub fn export_bytes(&self) -> StorageResult<Vec<u8>> {
        export_archive(&self.document)
    }

    /// Replace the design with an archive's contents. On error the current
    /// design is left as it was.
    pub fn import_bytes(&mut self, bytes: &[u8]) -> StorageResult<()> {
        let document = import_archive(bytes).inspect_err(|e| log::error!("Import failed: {}", e))?;
        self.replace_document(document);
        Ok(())
    }

    /// Ask the host for a destination and export there. `Ok(None)` if cancelled.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn export_with(&self, picker: &dyn FilePicker) -> StorageResult<Option<PathBuf>> {
        let Some(path) = picker.pick_export(SUGGESTED_EXPORT_NAME) else {
            log::debug!("Export cancelled");
            return Ok(None);
        };
        crate::storage::write_archive_file(&path, &self.document)?;
        log::info!("Exported project to {}", path.display());
        Ok(Some(path))
    }

    /// Ask for an archive and import it. `Ok(None)` if cancelled.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn import_with(&mut self, picker: &dyn FilePicker) -> StorageResult<Option<PathBuf>> {
        let Some(path) = picker.pick_import() else {
            log::debug!("Import cancelled");
            return Ok(None);
        };
        let document = crate::storage::read_archive_file(&path)?;
        self.replace_document(document);
        Ok(Some(path))
    }

    fn replace_document(&mut self, document: ProjectDocument) {
        // A decode started for the old design must not land on the new one
        self.decode_slot.invalidate();
        self.controller.cancel();
        self.sizer.set_grid(document.grid());
        self.document = document;
    }
}
