//! Renderer trait abstraction.

use kurbo::{Size, Vec2};
use peniko::Color;
use stitchgrid_core::config::RenderConfig;
use stitchgrid_core::document::ProjectDocument;
use stitchgrid_core::interaction::LinePreview;
use stitchgrid_core::session::Session;
use stitchgrid_core::viewport::ViewportState;
use thiserror::Error;

/// Renderer errors.
#[derive(Debug, Error)]
pub enum RendererError {
    #[error("Surface error: {0}")]
    Surface(String),
    #[error("Encoding failed: {0}")]
    Encode(String),
}

/// Result type for renderer operations.
pub type RenderResult<T> = Result<T, RendererError>;

/// Colors and stroke widths for the raster layers.
#[derive(Debug, Clone, Copy)]
pub struct LayerStyle {
    /// Fill behind every layer.
    pub backdrop: Color,
    pub grid_color: Color,
    /// Grid stroke width in surface pixels.
    pub grid_line_width: f64,
    /// Guide line and preview stroke width in surface pixels at zoom 1.
    pub guide_line_width: f64,
    /// Preview color while no palette color is selected.
    pub preview_color: Color,
}

impl Default for LayerStyle {
    fn default() -> Self {
        Self::from_config(&RenderConfig::default())
    }
}

impl LayerStyle {
    pub fn from_config(config: &RenderConfig) -> Self {
        Self {
            backdrop: Color::from_rgba8(255, 255, 255, 255),
            grid_color: Color::from_rgba8(160, 160, 160, 255),
            grid_line_width: config.grid_line_width,
            guide_line_width: config.guide_line_width,
            preview_color: Color::from_rgba8(0, 0, 0, 255),
        }
    }

    pub fn with_backdrop(mut self, color: Color) -> Self {
        self.backdrop = color;
        self
    }

    pub fn with_grid_color(mut self, color: Color) -> Self {
        self.grid_color = color;
        self
    }

    pub fn with_preview_color(mut self, color: Color) -> Self {
        self.preview_color = color;
        self
    }
}

/// Inputs for a single frame.
pub struct RenderContext<'a> {
    pub document: &'a ProjectDocument,
    pub viewport: &'a ViewportState,
    /// Changes whenever the cell size or grid dimensions change.
    pub layout_revision: u64,
    /// Size of the visible window in screen pixels.
    pub surface: Size,
    /// Screen position of the window's top-left corner.
    pub scroll: Vec2,
    /// Line being dragged, drawn on top of every layer.
    pub preview: Option<LinePreview>,
}

impl<'a> RenderContext<'a> {
    pub fn new(
        document: &'a ProjectDocument,
        viewport: &'a ViewportState,
        layout_revision: u64,
        surface: Size,
    ) -> Self {
        Self {
            document,
            viewport,
            layout_revision,
            surface,
            scroll: Vec2::ZERO,
            preview: None,
        }
    }

    /// Everything a session currently shows in its container, preview included.
    pub fn from_session(session: &'a Session) -> Self {
        Self::new(
            session.document(),
            session.viewport(),
            session.layout_revision(),
            session.container_size(),
        )
        .with_preview(session.preview())
    }

    pub fn with_scroll(mut self, scroll: Vec2) -> Self {
        self.scroll = scroll;
        self
    }

    pub fn with_preview(mut self, preview: Option<LinePreview>) -> Self {
        self.preview = preview;
        self
    }
}

/// Trait for rendering backends.
pub trait Renderer {
    /// Rendered output for one frame.
    type Frame;

    /// Render a frame. Returns `Ok(None)` while the viewport has no size.
    fn render(&mut self, ctx: &RenderContext) -> RenderResult<Option<Self::Frame>>;

    /// Backdrop the host should clear to around the frame.
    fn backdrop_color(&self) -> Color;
}
