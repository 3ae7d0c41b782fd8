//! Viewport sizing and zoom.
//!
//! [`ViewportSizer`] derives a uniform cell size from the container and the
//! grid dimensions. The resulting [`ViewportState`] maps grid space to the
//! screen with `origin + grid * cell_size * zoom`.

use crate::config::ViewportConfig;
use crate::document::{GridSize, next_revision};
use crate::geometry;
use kurbo::{Point, Size, Vec2};

/// Derived view state. Not persisted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportState {
    /// Surface pixels per grid unit, equal on both axes.
    pub cell_size: f64,
    /// Extra scale applied on top of `cell_size`.
    pub zoom: f64,
    /// Grid extent in surface pixels at zoom 1.
    pub grid_width: f64,
    pub grid_height: f64,
    /// Screen position of the grid's top-left corner.
    pub origin: Vec2,
}

impl Default for ViewportState {
    fn default() -> Self {
        Self {
            cell_size: 0.0,
            zoom: 1.0,
            grid_width: 0.0,
            grid_height: 0.0,
            origin: Vec2::ZERO,
        }
    }
}

impl ViewportState {
    /// A zero cell size means the container has not been laid out yet.
    pub fn is_renderable(&self) -> bool {
        self.cell_size > 0.0 && self.cell_size.is_finite() && self.zoom > 0.0
    }

    /// Screen pixels per grid unit.
    pub fn scale(&self) -> f64 {
        self.cell_size * self.zoom
    }

    /// Convert a screen position to grid space.
    pub fn screen_to_grid(&self, screen: Point) -> Point {
        geometry::screen_to_grid(screen, self.origin, self.scale())
    }

    /// Convert a grid position to screen space.
    pub fn grid_to_screen(&self, grid: Point) -> Point {
        geometry::grid_to_screen(grid, self.origin, self.scale())
    }

    /// Grid extent on screen, including zoom.
    pub fn zoomed_size(&self) -> Size {
        Size::new(self.grid_width * self.zoom, self.grid_height * self.zoom)
    }
}

/// Watches the container size and grid dimensions and recomputes the cell
/// size only when either actually changes.
#[derive(Debug, Clone)]
pub struct ViewportSizer {
    config: ViewportConfig,
    container: Size,
    grid: GridSize,
    state: ViewportState,
    layout_revision: u64,
}

impl ViewportSizer {
    pub fn new(grid: GridSize, config: ViewportConfig) -> Self {
        let padding = config.padding.max(0.0);
        Self {
            config,
            container: Size::ZERO,
            grid,
            state: ViewportState {
                origin: Vec2::new(padding, padding),
                ..ViewportState::default()
            },
            layout_revision: next_revision(),
        }
    }

    pub fn state(&self) -> &ViewportState {
        &self.state
    }

    /// Stamp that changes whenever the cell size or grid dimensions change.
    pub fn layout_revision(&self) -> u64 {
        self.layout_revision
    }

    pub fn grid(&self) -> GridSize {
        self.grid
    }

    /// Last observed container size.
    pub fn container(&self) -> Size {
        self.container
    }

    /// Record the container size. Returns true if the layout changed.
    pub fn observe(&mut self, width: f64, height: f64) -> bool {
        let container = Size::new(width.max(0.0), height.max(0.0));
        if container == self.container {
            return false;
        }
        self.container = container;
        self.recompute()
    }

    /// Record new grid dimensions. Returns true if the layout changed.
    pub fn set_grid(&mut self, grid: GridSize) -> bool {
        if grid == self.grid {
            return false;
        }
        self.grid = grid;
        // Dimensions changed even if the cell size happens not to
        self.recompute();
        self.layout_revision = next_revision();
        true
    }

    /// Move the grid's screen origin, e.g. when the host scrolls.
    pub fn set_origin(&mut self, origin: Vec2) {
        self.state.origin = origin;
    }

    /// Set the zoom factor, clamped to the configured range.
    pub fn set_zoom(&mut self, zoom: f64) -> bool {
        if !zoom.is_finite() {
            return false;
        }
        let zoom = zoom.clamp(self.config.min_zoom, self.config.max_zoom);
        if (zoom - self.state.zoom).abs() < f64::EPSILON {
            return false;
        }
        self.state.zoom = zoom;
        true
    }

    pub fn zoom_in(&mut self) -> bool {
        self.set_zoom(self.state.zoom * self.config.zoom_step)
    }

    pub fn zoom_out(&mut self) -> bool {
        self.set_zoom(self.state.zoom / self.config.zoom_step)
    }

    pub fn reset_zoom(&mut self) -> bool {
        self.set_zoom(1.0)
    }

    fn recompute(&mut self) -> bool {
        let padding = self.config.padding.max(0.0);
        let available = Size::new(
            (self.container.width - padding * 2.0).max(0.0),
            (self.container.height - padding * 2.0).max(0.0),
        );
        let cols = f64::from(self.grid.cols);
        let rows = f64::from(self.grid.rows);
        let cell_size = if rows > 0.0 && cols > 0.0 {
            (available.width / cols).min(available.height / rows)
        } else {
            0.0
        };

        let changed = cell_size != self.state.cell_size;
        self.state.cell_size = cell_size;
        self.state.grid_width = cell_size * cols;
        self.state.grid_height = cell_size * rows;
        if changed {
            log::debug!(
                "Cell size {:.3}px for {}x{} grid in {:.0}x{:.0}",
                cell_size,
                self.grid.rows,
                self.grid.cols,
                available.width,
                available.height
            );
            self.layout_revision = next_revision();
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sizer(rows: u32, cols: u32) -> ViewportSizer {
        ViewportSizer::new(GridSize::new(rows, cols).unwrap(), ViewportConfig::default())
    }

    #[test]
    fn test_cell_size_is_min_ratio() {
        let cases = [
            (800.0, 600.0, 10, 10),
            (800.0, 600.0, 60, 60),
            (1000.0, 300.0, 5, 40),
            (333.0, 777.0, 17, 3),
            (1.0, 1.0, 1, 1),
        ];
        for (w, h, rows, cols) in cases {
            let mut s = sizer(rows, cols);
            s.observe(w, h);
            let expected = (w / f64::from(cols)).min(h / f64::from(rows));
            assert_eq!(s.state().cell_size, expected, "{w}x{h} {rows}x{cols}");
            assert!(s.state().grid_width <= w + 1e-9);
            assert!(s.state().grid_height <= h + 1e-9);
        }
    }

    #[test]
    fn test_growing_container_never_shrinks_cells() {
        let mut s = sizer(12, 20);
        let mut last = 0.0;
        for step in 1..50 {
            let w = 100.0 + 13.0 * step as f64;
            let h = 80.0 + 7.0 * step as f64;
            s.observe(w, h);
            let cell = s.state().cell_size;
            assert!(cell >= last);
            assert_eq!(cell, (w / 20.0).min(h / 12.0));
            last = cell;
        }
    }

    #[test]
    fn test_zero_size_not_renderable() {
        let mut s = sizer(10, 10);
        assert!(!s.state().is_renderable());
        s.observe(0.0, 500.0);
        assert_eq!(s.state().cell_size, 0.0);
        assert!(!s.state().is_renderable());
        s.observe(500.0, 500.0);
        assert!(s.state().is_renderable());
    }

    #[test]
    fn test_observe_same_size_is_noop() {
        let mut s = sizer(10, 10);
        assert!(s.observe(400.0, 300.0));
        let revision = s.layout_revision();
        assert!(!s.observe(400.0, 300.0));
        assert_eq!(s.layout_revision(), revision);
    }

    #[test]
    fn test_set_grid_bumps_layout() {
        let mut s = sizer(10, 10);
        s.observe(400.0, 400.0);
        let revision = s.layout_revision();
        assert!(s.set_grid(GridSize::new(20, 20).unwrap()));
        assert_eq!(s.state().cell_size, 20.0);
        assert_ne!(s.layout_revision(), revision);
        assert!(!s.set_grid(GridSize::new(20, 20).unwrap()));
    }

    #[test]
    fn test_padding_reduces_available_area() {
        let config = ViewportConfig {
            padding: 20.0,
            ..Default::default()
        };
        let mut s = ViewportSizer::new(GridSize::new(10, 10).unwrap(), config);
        s.observe(240.0, 540.0);
        assert_eq!(s.state().cell_size, 20.0);
        assert_eq!(s.state().origin, Vec2::new(20.0, 20.0));
    }

    #[test]
    fn test_zoom_steps_and_clamp() {
        let mut s = sizer(10, 10);
        assert!(s.zoom_in());
        assert!((s.state().zoom - 1.2).abs() < 1e-12);
        assert!(s.zoom_out());
        assert!((s.state().zoom - 1.0).abs() < 1e-12);

        s.set_zoom(1000.0);
        assert_eq!(s.state().zoom, 10.0);
        s.set_zoom(0.0001);
        assert_eq!(s.state().zoom, 0.1);
        assert!(s.reset_zoom());
        assert_eq!(s.state().zoom, 1.0);
        assert!(!s.set_zoom(f64::NAN));
    }

    #[test]
    fn test_zoom_does_not_touch_layout() {
        let mut s = sizer(10, 10);
        s.observe(400.0, 400.0);
        let revision = s.layout_revision();
        s.zoom_in();
        assert_eq!(s.layout_revision(), revision);
    }

    #[test]
    fn test_state_transform_roundtrip() {
        let mut s = sizer(10, 10);
        s.observe(500.0, 500.0);
        s.set_zoom(1.5);
        s.set_origin(Vec2::new(-30.0, 12.0));

        let grid = Point::new(3.25, 7.5);
        let screen = s.state().grid_to_screen(grid);
        let back = s.state().screen_to_grid(screen);
        assert!((back.x - grid.x).abs() < 1e-10);
        assert!((back.y - grid.y).abs() < 1e-10);
    }
}
