//! StitchGrid Core Library
//!
//! Grid model, viewport sizing, pointer interaction and project archives for
//! cross-stitch pattern design. Rendering lives in `stitchgrid-render`.

pub mod background;
pub mod color;
pub mod config;
pub mod document;
pub mod geometry;
pub mod input;
pub mod interaction;
pub mod palette;
pub mod session;
pub mod storage;
pub mod viewport;

pub use background::{BackgroundError, BackgroundImage, DecodeSlot, DecodeTicket, DecodedImage, ImageSource};
pub use color::{ColorParseError, HexColor};
pub use config::{ConfigError, EngineConfig, InteractionConfig, RenderConfig, ViewportConfig};
pub use document::{
    CellKey, ColoredCells, DocumentError, GridSize, GuideLine, Layer, LayerOpacities, ProjectDocument, Revisions,
};
pub use hit_test::find_line_at;
pub use input::{Modifiers, MouseButton, PointerEvent};
pub use interaction::{InteractionController, InteractionState, LinePreview, Notice, Outcome, PointerResponse};
pub use palette::Palette;
pub use session::Session;
pub use storage::{FilePicker, StorageError, StorageResult};
pub use viewport::{ViewportSizer, ViewportState};
