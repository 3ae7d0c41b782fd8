//! Pointer state machine turning raw input into document edits.
//!
//! | Input                          | Effect                               |
//! |--------------------------------|--------------------------------------|
//! | Ctrl + left drag               | draw a snapped guide line            |
//! | Ctrl + right click             | delete the nearest guide line        |
//! | Left click                     | fill the cell with the selected color|
//! | Right click                    | unfill the cell                      |

use crate::color::HexColor;
use crate::config::InteractionConfig;
use crate::document::{GuideLine, ProjectDocument};
use crate::geometry::{cell_at, snap};
use crate::hit_test::find_line_at;
use crate::input::{Modifiers, MouseButton, PointerEvent};
use crate::viewport::ViewportState;
use kurbo::Point;

/// State of the pointer interaction.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum InteractionState {
    /// Waiting for input.
    #[default]
    Idle,
    /// A guide line is being dragged out. Points are snapped grid units.
    DraggingLine { start: Point, end: Point },
}

/// User-facing notices for rejected actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    /// Drawing or filling needs a selected palette color.
    NoColorSelected,
}

impl Notice {
    pub fn message(self) -> &'static str {
        match self {
            Notice::NoColorSelected => "Select a color from the palette first.",
        }
    }
}

/// What a pointer event did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Outcome {
    Nothing,
    /// The transient line preview moved; only the overlay needs redrawing.
    PreviewChanged,
    LineAdded(usize),
    LineRemoved(usize),
    CellFilled { row: u32, col: u32 },
    CellCleared { row: u32, col: u32 },
    Rejected(Notice),
}

/// Result of handling one pointer event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerResponse {
    pub outcome: Outcome,
    /// The host should suppress the native context menu.
    pub suppress_context_menu: bool,
}

impl PointerResponse {
    fn new(outcome: Outcome) -> Self {
        Self {
            outcome,
            suppress_context_menu: false,
        }
    }
}

/// In-progress line to draw over the composite.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinePreview {
    pub start: Point,
    pub end: Point,
    /// Selected palette color, if any.
    pub color: Option<HexColor>,
}

/// A primary press without modifier, resolved on release.
#[derive(Debug, Clone, Copy)]
struct PendingClick {
    position: Point,
    modifiers: Modifiers,
}

/// Interprets pointer events against a document and viewport.
#[derive(Debug, Clone, Default)]
pub struct InteractionController {
    state: InteractionState,
    pending_click: Option<PendingClick>,
    config: InteractionConfig,
}

impl InteractionController {
    pub fn new(config: InteractionConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn state(&self) -> InteractionState {
        self.state
    }

    pub fn config(&self) -> &InteractionConfig {
        &self.config
    }

    /// Drop any drag or pending click without touching the document.
    pub fn cancel(&mut self) {
        self.state = InteractionState::Idle;
        self.pending_click = None;
    }

    /// The line being dragged, if any.
    pub fn preview(&self, document: &ProjectDocument) -> Option<LinePreview> {
        match self.state {
            InteractionState::DraggingLine { start, end } => Some(LinePreview {
                start,
                end,
                color: document.selected_color(),
            }),
            InteractionState::Idle => None,
        }
    }

    /// Handle one pointer event.
    pub fn handle(
        &mut self,
        event: PointerEvent,
        document: &mut ProjectDocument,
        view: &ViewportState,
    ) -> PointerResponse {
        if let PointerEvent::ContextMenu { position, modifiers } = event {
            let outcome = if view.is_renderable() {
                self.context_menu(position, modifiers, document, view)
            } else {
                Outcome::Nothing
            };
            return PointerResponse {
                outcome,
                suppress_context_menu: true,
            };
        }

        if !view.is_renderable() {
            return PointerResponse::new(Outcome::Nothing);
        }

        let outcome = match event {
            PointerEvent::Down {
                position,
                button: MouseButton::Left,
                modifiers,
            } => self.pointer_down(position, modifiers, document, view),
            PointerEvent::Move { position } => self.pointer_move(position, view),
            PointerEvent::Up {
                position,
                button: MouseButton::Left,
                modifiers,
            } => self.pointer_up(position, modifiers, document, view),
            _ => Outcome::Nothing,
        };
        PointerResponse::new(outcome)
    }

    fn snapped(&self, screen: Point, view: &ViewportState) -> Point {
        snap(view.screen_to_grid(screen), self.config.snap_unit())
    }

    fn pointer_down(
        &mut self,
        position: Point,
        modifiers: Modifiers,
        document: &ProjectDocument,
        view: &ViewportState,
    ) -> Outcome {
        if matches!(self.state, InteractionState::DraggingLine { .. }) {
            return Outcome::Nothing;
        }

        if !modifiers.command() {
            self.pending_click = Some(PendingClick { position, modifiers });
            return Outcome::Nothing;
        }

        self.pending_click = None;
        if document.selected_color().is_none() {
            log::warn!("Line drawing rejected: no palette color selected");
            return Outcome::Rejected(Notice::NoColorSelected);
        }

        let point = self.snapped(position, view);
        self.state = InteractionState::DraggingLine {
            start: point,
            end: point,
        };
        Outcome::PreviewChanged
    }

    fn pointer_move(&mut self, position: Point, view: &ViewportState) -> Outcome {
        let snapped = self.snapped(position, view);
        match &mut self.state {
            InteractionState::DraggingLine { end, .. } if *end != snapped => {
                *end = snapped;
                Outcome::PreviewChanged
            }
            _ => Outcome::Nothing,
        }
    }

    fn pointer_up(
        &mut self,
        position: Point,
        modifiers: Modifiers,
        document: &mut ProjectDocument,
        view: &ViewportState,
    ) -> Outcome {
        let pending = self.pending_click.take();

        // Commit what the preview last showed
        if let InteractionState::DraggingLine { start, end } = self.state {
            self.state = InteractionState::Idle;
            if start == end {
                return Outcome::Nothing;
            }
            let Some(color) = document.selected_color() else {
                log::warn!("Line discarded: palette selection was removed during the drag");
                return Outcome::Rejected(Notice::NoColorSelected);
            };
            document.add_line(GuideLine::new(start, end, color));
            let index = document.lines().len() - 1;
            log::debug!("Added line {} from {:?} to {:?}", index, start, end);
            return Outcome::LineAdded(index);
        }

        let Some(pending) = pending else {
            return Outcome::Nothing;
        };
        let travel = (position - pending.position).hypot();
        if travel >= self.config.click_threshold
            || pending.modifiers.command()
            || modifiers.command()
        {
            return Outcome::Nothing;
        }

        let Some((row, col)) = self.cell_under(position, document, view) else {
            return Outcome::Nothing;
        };
        let Some(color) = document.selected_color() else {
            log::warn!("Cell fill rejected: no palette color selected");
            return Outcome::Rejected(Notice::NoColorSelected);
        };
        if document.fill_cell(row, col, color) {
            Outcome::CellFilled { row, col }
        } else {
            Outcome::Nothing
        }
    }

    fn context_menu(
        &mut self,
        position: Point,
        modifiers: Modifiers,
        document: &mut ProjectDocument,
        view: &ViewportState,
    ) -> Outcome {
        if modifiers.command() {
            let point = view.screen_to_grid(position);
            let Some(index) =
                find_line_at(document.lines(), point, self.config.hit_tolerance, view.scale())
            else {
                return Outcome::Nothing;
            };
            document.remove_line(index);
            log::debug!("Removed line {}", index);
            return Outcome::LineRemoved(index);
        }

        match self.cell_under(position, document, view) {
            Some((row, col)) if document.clear_cell(row, col) => Outcome::CellCleared { row, col },
            _ => Outcome::Nothing,
        }
    }

    fn cell_under(
        &self,
        position: Point,
        document: &ProjectDocument,
        view: &ViewportState,
    ) -> Option<(u32, u32)> {
        cell_at(view.screen_to_grid(position)).filter(|&(row, col)| document.grid().contains(row, col))
    }
}
