//! StitchGrid Render Library
//!
//! Layered raster compositor for cross-stitch patterns. Each layer is
//! rasterized with tiny-skia and cached until its inputs change.

mod compositor;
mod renderer;

pub use compositor::{Composite, LayerCompositor, RasterStats};
pub use renderer::{LayerStyle, RenderContext, RenderResult, Renderer, RendererError};
