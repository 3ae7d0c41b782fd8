//! Cached raster layers composited with per-layer opacity.
//!
//! Each layer is rasterized at zoom 1 into its own pixmap and kept until one
//! of its inputs changes. Zoom, opacity and scrolling only affect the
//! composite step, which covers the visible window and nothing more. The
//! composite is cached as well, so a frame that only moves the line preview
//! copies it and strokes one segment.

use crate::renderer::{LayerStyle, RenderContext, RenderResult, Renderer, RendererError};
use kurbo::Vec2;
use peniko::Color;
use stitchgrid_core::background::DecodedImage;
use stitchgrid_core::document::{Layer, ProjectDocument};
use stitchgrid_core::interaction::LinePreview;
use stitchgrid_core::viewport::ViewportState;
use tiny_skia::{
    BlendMode, ColorU8, FilterQuality, LineCap, Paint, PathBuilder, Pixmap, PixmapPaint, Rect, Stroke,
    Transform,
};

/// Number of times each layer has been rasterized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RasterStats {
    pub background: u32,
    pub grid: u32,
    pub fills: u32,
    pub lines: u32,
}

impl RasterStats {
    pub fn get(&self, layer: Layer) -> u32 {
        match layer {
            Layer::Background => self.background,
            Layer::Grid => self.grid,
            Layer::Fills => self.fills,
            Layer::Lines => self.lines,
        }
    }

    fn bump(&mut self, layer: Layer) {
        match layer {
            Layer::Background => self.background += 1,
            Layer::Grid => self.grid += 1,
            Layer::Fills => self.fills += 1,
            Layer::Lines => self.lines += 1,
        }
    }
}

/// A composited frame covering the visible window. Pixel `(0, 0)` is the
/// window's top-left corner.
pub struct Composite {
    pixmap: Pixmap,
}

impl Composite {
    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }

    pub fn into_pixmap(self) -> Pixmap {
        self.pixmap
    }

    /// Straight-alpha RGBA at `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        let c = self.pixmap.pixel(x, y)?.demultiply();
        Some([c.red(), c.green(), c.blue(), c.alpha()])
    }

    /// Encode as PNG.
    pub fn to_png(&self) -> RenderResult<Vec<u8>> {
        self.pixmap
            .encode_png()
            .map_err(|e| RendererError::Encode(e.to_string()))
    }
}

/// Stamps a cached layer was rasterized from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LayerKey {
    content: u64,
    layout: u64,
}

struct CachedLayer {
    key: LayerKey,
    pixmap: Pixmap,
}

/// Everything the composite without the preview depends on.
#[derive(Debug, Clone, Copy, PartialEq)]
struct CompositeKey {
    generation: u64,
    width: u32,
    height: u32,
    transform: [f32; 3],
    opacities: [f32; 4],
}

struct CachedComposite {
    key: CompositeKey,
    pixmap: Pixmap,
}

/// Software compositor for the four pattern layers.
pub struct LayerCompositor {
    style: LayerStyle,
    cache: [Option<CachedLayer>; 4],
    composite: Option<CachedComposite>,
    /// Bumped whenever any layer is rasterized.
    generation: u64,
    stats: RasterStats,
    composed: u32,
}

impl Default for LayerCompositor {
    fn default() -> Self {
        Self::new(LayerStyle::default())
    }
}

impl LayerCompositor {
    pub fn new(style: LayerStyle) -> Self {
        Self {
            style,
            cache: [None, None, None, None],
            composite: None,
            generation: 0,
            stats: RasterStats::default(),
            composed: 0,
        }
    }

    pub fn style(&self) -> &LayerStyle {
        &self.style
    }

    /// Change the style. Every layer is rasterized again on the next frame.
    pub fn set_style(&mut self, style: LayerStyle) {
        self.style = style;
        self.invalidate();
    }

    /// Drop all cached layers.
    pub fn invalidate(&mut self) {
        self.cache = [None, None, None, None];
        self.composite = None;
    }

    pub fn stats(&self) -> RasterStats {
        self.stats
    }

    /// Number of times the layers have been blended into a window.
    pub fn composed(&self) -> u32 {
        self.composed
    }

    /// Rasterize stale layers and composite the visible window.
    pub fn composite(&mut self, ctx: &RenderContext) -> RenderResult<Option<Composite>> {
        let view = ctx.viewport;
        if !view.is_renderable() {
            return Ok(None);
        }
        let Some((width, height)) = pixel_size(view.grid_width, view.grid_height) else {
            return Ok(None);
        };
        let Some((out_width, out_height)) = pixel_size(ctx.surface.width, ctx.surface.height) else {
            return Ok(None);
        };

        for layer in Layer::ALL {
            self.refresh(layer, ctx, width, height)?;
        }

        let offset = view.origin - ctx.scroll;
        let opacities = ctx.document.opacities();
        let key = CompositeKey {
            generation: self.generation,
            width: out_width,
            height: out_height,
            transform: [view.zoom as f32, offset.x as f32, offset.y as f32],
            opacities: Layer::ALL.map(|layer| opacities.get(layer) as f32),
        };
        if self.composite.as_ref().is_none_or(|cached| cached.key != key) {
            let pixmap = self.blend_layers(&key)?;
            self.composite = Some(CachedComposite { key, pixmap });
        }
        let Some(cached) = &self.composite else {
            return Ok(None);
        };

        let mut out = cached.pixmap.clone();
        if let Some(preview) = &ctx.preview {
            self.draw_preview(&mut out, preview, view, offset);
        }
        Ok(Some(Composite { pixmap: out }))
    }

    /// Blend every visible layer into a window-sized pixmap. Only the pixels
    /// inside the window are touched, whatever the zoom.
    fn blend_layers(&mut self, key: &CompositeKey) -> RenderResult<Pixmap> {
        let mut out = new_pixmap(key.width, key.height)?;
        out.fill(skia_color(self.style.backdrop));

        let [zoom, tx, ty] = key.transform;
        let transform = Transform::from_row(zoom, 0.0, 0.0, zoom, tx, ty);
        for layer in Layer::ALL {
            let opacity = key.opacities[slot(layer)];
            if opacity <= 0.0 {
                continue;
            }
            if let Some(cached) = &self.cache[slot(layer)] {
                let paint = PixmapPaint {
                    opacity,
                    blend_mode: BlendMode::SourceOver,
                    quality: FilterQuality::Bilinear,
                };
                out.draw_pixmap(0, 0, cached.pixmap.as_ref(), &paint, transform, None);
            }
        }

        self.composed += 1;
        log::trace!("Composited {}x{} window at zoom {}", key.width, key.height, zoom);
        Ok(out)
    }

    fn refresh(&mut self, layer: Layer, ctx: &RenderContext, width: u32, height: u32) -> RenderResult<()> {
        let revisions = ctx.document.revisions();
        let content = match layer {
            Layer::Background => revisions.background,
            // Only the layout and the style affect the grid
            Layer::Grid => 0,
            Layer::Fills => revisions.cells,
            Layer::Lines => revisions.lines,
        };
        let key = LayerKey {
            content,
            layout: ctx.layout_revision,
        };
        if self.cache[slot(layer)].as_ref().is_some_and(|cached| cached.key == key) {
            return Ok(());
        }

        let mut pixmap = new_pixmap(width, height)?;
        let cell_size = ctx.viewport.cell_size;
        match layer {
            Layer::Background => {
                if let Some(image) = ctx.document.background() {
                    draw_background(&mut pixmap, image.pixels(), ctx.viewport)?;
                }
            }
            Layer::Grid => self.draw_grid(&mut pixmap, ctx.document, cell_size),
            Layer::Fills => draw_fills(&mut pixmap, ctx.document, cell_size),
            Layer::Lines => self.draw_lines(&mut pixmap, ctx.document, cell_size),
        }

        log::debug!("Rasterized {} layer at {}x{}", layer.name(), width, height);
        self.stats.bump(layer);
        self.generation += 1;
        self.cache[slot(layer)] = Some(CachedLayer { key, pixmap });
        Ok(())
    }

    fn draw_grid(&self, pixmap: &mut Pixmap, document: &ProjectDocument, cell_size: f64) {
        let grid = document.grid();
        let width = f64::from(grid.cols) * cell_size;
        let height = f64::from(grid.rows) * cell_size;

        let mut pb = PathBuilder::new();
        for col in 0..=grid.cols {
            let x = (f64::from(col) * cell_size) as f32;
            pb.move_to(x, 0.0);
            pb.line_to(x, height as f32);
        }
        for row in 0..=grid.rows {
            let y = (f64::from(row) * cell_size) as f32;
            pb.move_to(0.0, y);
            pb.line_to(width as f32, y);
        }
        let Some(path) = pb.finish() else {
            return;
        };

        let paint = solid_paint(self.style.grid_color, true);
        let stroke = Stroke {
            width: self.style.grid_line_width as f32,
            ..Stroke::default()
        };
        pixmap.stroke_path(&path, &paint, &stroke, Transform::identity(), None);
    }

    fn draw_lines(&self, pixmap: &mut Pixmap, document: &ProjectDocument, cell_size: f64) {
        let stroke = Stroke {
            width: self.style.guide_line_width as f32,
            line_cap: LineCap::Round,
            ..Stroke::default()
        };
        for line in document.lines() {
            let Some(path) = segment_path(line.start, line.end, cell_size) else {
                continue;
            };
            let paint = solid_paint(line.color.into(), true);
            pixmap.stroke_path(&path, &paint, &stroke, Transform::identity(), None);
        }
    }

    fn draw_preview(&self, pixmap: &mut Pixmap, preview: &LinePreview, view: &ViewportState, offset: Vec2) {
        let Some(path) = segment_path(preview.start, preview.end, view.scale()) else {
            return;
        };
        let color = preview.color.map(Color::from).unwrap_or(self.style.preview_color);
        let stroke = Stroke {
            width: (self.style.guide_line_width * view.zoom) as f32,
            line_cap: LineCap::Round,
            ..Stroke::default()
        };
        let transform = Transform::from_translate(offset.x as f32, offset.y as f32);
        pixmap.stroke_path(&path, &solid_paint(color, true), &stroke, transform, None);
    }
}

impl Renderer for LayerCompositor {
    type Frame = Composite;

    fn render(&mut self, ctx: &RenderContext) -> RenderResult<Option<Composite>> {
        self.composite(ctx)
    }

    fn backdrop_color(&self) -> Color {
        self.style.backdrop
    }
}

fn slot(layer: Layer) -> usize {
    match layer {
        Layer::Background => 0,
        Layer::Grid => 1,
        Layer::Fills => 2,
        Layer::Lines => 3,
    }
}

/// Whole-pixel size covering `width` x `height`, or `None` if empty.
fn pixel_size(width: f64, height: f64) -> Option<(u32, u32)> {
    let w = width.ceil();
    let h = height.ceil();
    if !(w >= 1.0 && h >= 1.0) || w > f64::from(u32::MAX) || h > f64::from(u32::MAX) {
        return None;
    }
    Some((w as u32, h as u32))
}

fn new_pixmap(width: u32, height: u32) -> RenderResult<Pixmap> {
    Pixmap::new(width, height)
        .ok_or_else(|| RendererError::Surface(format!("Failed to allocate {}x{} pixmap", width, height)))
}

fn skia_color(color: Color) -> tiny_skia::Color {
    let rgba = color.to_rgba8();
    tiny_skia::Color::from_rgba8(rgba.r, rgba.g, rgba.b, rgba.a)
}

fn solid_paint(color: Color, anti_alias: bool) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color(skia_color(color));
    paint.anti_alias = anti_alias;
    paint
}

fn segment_path(start: kurbo::Point, end: kurbo::Point, scale: f64) -> Option<tiny_skia::Path> {
    let mut pb = PathBuilder::new();
    pb.move_to((start.x * scale) as f32, (start.y * scale) as f32);
    pb.line_to((end.x * scale) as f32, (end.y * scale) as f32);
    pb.finish()
}

fn draw_fills(pixmap: &mut Pixmap, document: &ProjectDocument, cell_size: f64) {
    let grid = document.grid();
    let size = cell_size as f32;
    for (key, color) in document.cells().iter() {
        if !grid.contains(key.row, key.col) {
            continue;
        }
        let x = (f64::from(key.col) * cell_size) as f32;
        let y = (f64::from(key.row) * cell_size) as f32;
        if let Some(rect) = Rect::from_xywh(x, y, size, size) {
            // Hard edges so neighbouring cells meet without seams
            pixmap.fill_rect(rect, &solid_paint(color.into(), false), Transform::identity(), None);
        }
    }
}

/// Stretch the image over the whole grid.
fn draw_background(pixmap: &mut Pixmap, image: &DecodedImage, view: &ViewportState) -> RenderResult<()> {
    let mut source = new_pixmap(image.width, image.height)?;
    for (dst, src) in source.pixels_mut().iter_mut().zip(image.rgba.chunks_exact(4)) {
        *dst = ColorU8::from_rgba(src[0], src[1], src[2], src[3]).premultiply();
    }

    let sx = view.grid_width / f64::from(image.width);
    let sy = view.grid_height / f64::from(image.height);
    let paint = PixmapPaint {
        quality: FilterQuality::Bilinear,
        ..PixmapPaint::default()
    };
    pixmap.draw_pixmap(
        0,
        0,
        source.as_ref(),
        &paint,
        Transform::from_scale(sx as f32, sy as f32),
        None,
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::{Point, Vec2};
    use stitchgrid_core::color::HexColor;
    use stitchgrid_core::document::{GridSize, GuideLine};
    use stitchgrid_core::input::{Modifiers, MouseButton, PointerEvent};
    use stitchgrid_core::session::Session;
    use std::io::Cursor;

    const RED: HexColor = HexColor::new(255, 0, 0);

    /// 10x10 grid with 10px cells.
    fn session() -> Session {
        let mut session = Session::default();
        session.new_design(GridSize::new(10, 10).unwrap()).unwrap();
        session.observe_container(100.0, 100.0);
        session
    }

    fn render(compositor: &mut LayerCompositor, session: &Session) -> Composite {
        compositor
            .composite(&RenderContext::from_session(session))
            .unwrap()
            .expect("viewport should be renderable")
    }

    /// Fill cell (row 2, col 3) red with a click at zoom 1.
    fn fill_red_cell(session: &mut Session) {
        let index = session.add_palette_color(RED);
        session.select_color(index).unwrap();
        for event in [
            PointerEvent::Down {
                position: Point::new(35.0, 25.0),
                button: MouseButton::Left,
                modifiers: Modifiers::NONE,
            },
            PointerEvent::Up {
                position: Point::new(35.0, 25.0),
                button: MouseButton::Left,
                modifiers: Modifiers::NONE,
            },
        ] {
            session.handle_pointer(event);
        }
    }

    fn png(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(width, height, image::Rgba(rgba));
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn test_filled_cell_pixels() {
        let mut s = session();
        let mut compositor = LayerCompositor::default();
        assert_eq!(render(&mut compositor, &s).pixel(35, 25), Some([255, 255, 255, 255]));

        fill_red_cell(&mut s);

        let frame = render(&mut compositor, &s);
        assert_eq!((frame.width(), frame.height()), (100, 100));
        assert_eq!(frame.pixel(35, 25), Some([255, 0, 0, 255]));
        assert_eq!(frame.pixel(35, 15), Some([255, 255, 255, 255]));
    }

    #[test]
    fn test_not_renderable_returns_none() {
        let s = Session::default();
        let mut compositor = LayerCompositor::default();
        assert!(compositor.composite(&RenderContext::from_session(&s)).unwrap().is_none());
        assert_eq!(compositor.stats(), RasterStats::default());
    }

    #[test]
    fn test_zoom_opacity_and_preview_reuse_layers() {
        let mut s = session();
        let index = s.add_palette_color(RED);
        s.select_color(index).unwrap();
        let mut compositor = LayerCompositor::default();
        render(&mut compositor, &s);
        let first = compositor.stats();
        assert_eq!(first, RasterStats { background: 1, grid: 1, fills: 1, lines: 1 });

        s.zoom_in();
        s.set_opacity(Layer::Grid, 0.3);
        s.set_opacity(Layer::Fills, 0.5);
        s.handle_pointer(PointerEvent::Down {
            position: Point::new(0.0, 0.0),
            button: MouseButton::Left,
            modifiers: Modifiers::CTRL,
        });
        s.handle_pointer(PointerEvent::Move {
            position: Point::new(60.0, 60.0),
        });
        assert!(s.preview().is_some());

        render(&mut compositor, &s);
        assert_eq!(compositor.stats(), first);
    }

    #[test]
    fn test_only_changed_layer_rerasterizes() {
        let mut s = session();
        let mut compositor = LayerCompositor::default();
        render(&mut compositor, &s);

        let mut document = s.document().clone();
        document.add_line(GuideLine::new(Point::ZERO, Point::new(5.0, 5.0), RED));
        let ctx = RenderContext::new(&document, s.viewport(), s.layout_revision(), s.container_size());
        compositor.composite(&ctx).unwrap();
        assert_eq!(compositor.stats(), RasterStats { background: 1, grid: 1, fills: 1, lines: 2 });

        s.observe_container(200.0, 200.0);
        render(&mut compositor, &s);
        assert_eq!(compositor.stats(), RasterStats { background: 2, grid: 2, fills: 2, lines: 3 });
    }

    #[test]
    fn test_zoom_scales_composite() {
        let mut s = session();
        fill_red_cell(&mut s);
        s.set_zoom(2.0);
        let mut compositor = LayerCompositor::default();
        let frame = render(&mut compositor, &s);
        // The window stays container-sized; the grid overflows it
        assert_eq!((frame.width(), frame.height()), (100, 100));
        assert_eq!(frame.pixel(70, 50), Some([255, 0, 0, 255]));
        assert_eq!(frame.pixel(55, 45), Some([255, 255, 255, 255]));
    }

    #[test]
    fn test_max_zoom_window_stays_container_sized() {
        let mut s = Session::default();
        s.new_design(GridSize::new(60, 60).unwrap()).unwrap();
        s.observe_container(1200.0, 1200.0);
        let index = s.add_palette_color(RED);
        s.select_color(index).unwrap();
        s.set_zoom(10.0);
        assert_eq!(s.viewport().zoom, 10.0);

        s.handle_pointer(PointerEvent::Down {
            position: Point::new(0.0, 0.0),
            button: MouseButton::Left,
            modifiers: Modifiers::CTRL,
        });
        let mut compositor = LayerCompositor::default();
        for x in [300.0, 600.0, 900.0] {
            s.handle_pointer(PointerEvent::Move {
                position: Point::new(x, x),
            });
            let frame = render(&mut compositor, &s);
            assert_eq!((frame.width(), frame.height()), (1200, 1200));
        }
        // Moving the preview reuses the blended window
        assert_eq!(compositor.composed(), 1);
        assert_eq!(compositor.stats(), RasterStats { background: 1, grid: 1, fills: 1, lines: 1 });
    }

    #[test]
    fn test_scroll_offsets_window() {
        let mut s = session();
        fill_red_cell(&mut s);
        s.set_zoom(2.0);
        let mut compositor = LayerCompositor::default();
        // Cell (2, 3) spans screen x 60..80, y 40..60 at zoom 2
        let ctx = RenderContext::from_session(&s).with_scroll(Vec2::new(50.0, 30.0));
        let frame = compositor.composite(&ctx).unwrap().unwrap();
        assert_eq!(frame.pixel(20, 20), Some([255, 0, 0, 255]));
        assert_eq!(frame.pixel(5, 5), Some([255, 255, 255, 255]));
    }

    #[test]
    fn test_origin_shift_recomposes_without_rasterizing() {
        let mut s = session();
        fill_red_cell(&mut s);
        let mut compositor = LayerCompositor::default();
        render(&mut compositor, &s);

        s.set_origin(Vec2::new(10.0, 0.0));
        let frame = render(&mut compositor, &s);
        assert_eq!(frame.pixel(45, 25), Some([255, 0, 0, 255]));
        assert_eq!(frame.pixel(35, 25), Some([255, 255, 255, 255]));
        assert_eq!(compositor.composed(), 2);
        assert_eq!(compositor.stats().fills, 1);
    }

    #[test]
    fn test_layer_opacity_blends_with_backdrop() {
        let mut s = session();
        fill_red_cell(&mut s);
        s.set_opacity(Layer::Fills, 0.5);
        let mut compositor = LayerCompositor::default();
        let [r, g, b, a] = render(&mut compositor, &s).pixel(35, 25).unwrap();
        assert_eq!((r, a), (255, 255));
        assert!((120..=135).contains(&g), "g = {g}");
        assert_eq!(g, b);

        s.set_opacity(Layer::Fills, 0.0);
        assert_eq!(render(&mut compositor, &s).pixel(35, 25), Some([255, 255, 255, 255]));
    }

    #[test]
    fn test_background_stretched_over_grid() {
        let mut s = session();
        s.load_background_file("blue.png", png(2, 2, [0, 0, 255, 255])).unwrap();
        let mut compositor = LayerCompositor::default();
        let frame = render(&mut compositor, &s);
        assert_eq!(frame.pixel(55, 55), Some([0, 0, 255, 255]));
        assert_eq!(frame.pixel(95, 5), Some([0, 0, 255, 255]));

        s.clear_background();
        let frame = render(&mut compositor, &s);
        assert_eq!(frame.pixel(55, 55), Some([255, 255, 255, 255]));
        assert_eq!(compositor.stats().background, 2);
    }

    #[test]
    fn test_preview_uses_fallback_color() {
        let s = session();
        let preview = LinePreview {
            start: Point::new(0.0, 5.5),
            end: Point::new(10.0, 5.5),
            color: None,
        };
        let style = LayerStyle {
            guide_line_width: 4.0,
            ..LayerStyle::default().with_preview_color(Color::from_rgba8(0, 255, 0, 255))
        };
        let mut compositor = LayerCompositor::new(style);
        let ctx = RenderContext::from_session(&s).with_preview(Some(preview));
        let frame = compositor.composite(&ctx).unwrap().unwrap();
        assert_eq!(frame.pixel(25, 55), Some([0, 255, 0, 255]));
    }

    #[test]
    fn test_style_change_rerasterizes() {
        let s = session();
        let mut compositor = LayerCompositor::default();
        render(&mut compositor, &s);
        compositor.set_style(LayerStyle::default().with_grid_color(Color::from_rgba8(0, 0, 0, 255)));
        render(&mut compositor, &s);
        assert_eq!(compositor.stats().grid, 2);
    }

    #[test]
    fn test_png_export() {
        let mut s = session();
        fill_red_cell(&mut s);
        let mut compositor = LayerCompositor::default();
        let bytes = render(&mut compositor, &s).to_png().unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (100, 100));
        assert_eq!(decoded.get_pixel(35, 25).0, [255, 0, 0, 255]);
    }
}
