use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, MouseButton, MouseEvent, MouseEventKind};
use std::collections::VecDeque;

/// Pointer travel, in Braille dots, below which a press/release pair counts as a click.
pub const CLICK_SLOP_PX: f64 = 2.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OrbitDirection {
    Left,
    Right,
    Up,
    Down,
}

/// Keyboard commands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    Quit,
    CloseOverlay,
    /// Fly to the n-th location (0-based)
    FlyTo(usize),
    NextLocation,
    CycleCategory,
    CycleYear,
    CycleLightMode,
    IntensityDown,
    IntensityUp,
    TimelineBack,
    TimelineForward,
    TogglePlay,
    ZoomIn,
    ZoomOut,
    Orbit(OrbitDirection),
    ToggleLabels,
    Retry,
}

/// Host input normalised for the frame loop. Pointer coordinates are Braille
/// pixels relative to the globe viewport.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum InputEvent {
    PointerDown { x: f64, y: f64 },
    PointerMove { x: f64, y: f64 },
    PointerUp { x: f64, y: f64 },
    Click { x: f64, y: f64 },
    /// Positive steps zoom in
    Zoom(i32),
    Key(Action),
    Resize { cols: u16, rows: u16 },
}

pub fn key_action(code: KeyCode) -> Option<Action> {
    let action = match code {
        KeyCode::Esc => Action::CloseOverlay,
        KeyCode::Char('q') | KeyCode::Char('Q') => Action::Quit,
        KeyCode::Char(c @ '1'..='9') => Action::FlyTo(c as usize - '1' as usize),
        KeyCode::Tab => Action::NextLocation,
        KeyCode::Char('c') | KeyCode::Char('C') => Action::CycleCategory,
        KeyCode::Char('y') | KeyCode::Char('Y') => Action::CycleYear,
        KeyCode::Char('m') | KeyCode::Char('M') => Action::CycleLightMode,
        KeyCode::Char('[') => Action::IntensityDown,
        KeyCode::Char(']') => Action::IntensityUp,
        KeyCode::Char(',') | KeyCode::Char('<') => Action::TimelineBack,
        KeyCode::Char('.') | KeyCode::Char('>') => Action::TimelineForward,
        KeyCode::Char('p') | KeyCode::Char('P') => Action::TogglePlay,
        KeyCode::Char('+') | KeyCode::Char('=') => Action::ZoomIn,
        KeyCode::Char('-') | KeyCode::Char('_') => Action::ZoomOut,
        KeyCode::Left | KeyCode::Char('h') => Action::Orbit(OrbitDirection::Left),
        KeyCode::Right | KeyCode::Char('l') => Action::Orbit(OrbitDirection::Right),
        KeyCode::Up | KeyCode::Char('k') => Action::Orbit(OrbitDirection::Up),
        KeyCode::Down | KeyCode::Char('j') => Action::Orbit(OrbitDirection::Down),
        KeyCode::Char('L') => Action::ToggleLabels,
        KeyCode::Char('r') | KeyCode::Char('R') => Action::Retry,
        _ => return None,
    };
    Some(action)
}

/// Centre of a terminal cell in Braille pixels, relative to `origin` (the
/// top-left cell of the globe viewport).
pub fn cell_to_pixel(col: u16, row: u16, origin: (u16, u16)) -> (f64, f64) {
    let dx = col as f64 - origin.0 as f64;
    let dy = row as f64 - origin.1 as f64;
    (dx * 2.0 + 1.0, dy * 4.0 + 2.0)
}

/// FIFO of input events, drained once per frame. Clicks are synthesised from
/// press/release pairs that stay within `CLICK_SLOP_PX`.
#[derive(Default)]
pub struct InputQueue {
    events: VecDeque<InputEvent>,
    press: Option<(f64, f64)>,
    dragged: bool,
}

impl InputQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: InputEvent) {
        match event {
            InputEvent::PointerDown { x, y } => {
                self.press = Some((x, y));
                self.dragged = false;
                self.events.push_back(event);
            }
            InputEvent::PointerMove { x, y } => {
                if let Some((px, py)) = self.press {
                    if (x - px).hypot(y - py) > CLICK_SLOP_PX {
                        self.dragged = true;
                    }
                }
                self.events.push_back(event);
            }
            InputEvent::PointerUp { x, y } => {
                self.events.push_back(event);
                if let Some((px, py)) = self.press.take() {
                    if !self.dragged && (x - px).hypot(y - py) <= CLICK_SLOP_PX {
                        self.events.push_back(InputEvent::Click { x, y });
                    }
                }
                self.dragged = false;
            }
            _ => self.events.push_back(event),
        }
    }

    /// Translate a crossterm event. `origin` is the terminal cell at the
    /// top-left of the globe viewport.
    pub fn push_host_event(&mut self, event: &Event, origin: (u16, u16)) {
        match event {
            Event::Key(KeyEvent { code, kind: KeyEventKind::Press, .. }) => {
                if let Some(action) = key_action(*code) {
                    self.push(InputEvent::Key(action));
                }
            }
            Event::Mouse(mouse) => self.push_mouse(mouse, origin),
            Event::Resize(cols, rows) => self.push(InputEvent::Resize { cols: *cols, rows: *rows }),
            _ => {}
        }
    }

    fn push_mouse(&mut self, mouse: &MouseEvent, origin: (u16, u16)) {
        let (x, y) = cell_to_pixel(mouse.column, mouse.row, origin);
        let event = match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => InputEvent::PointerDown { x, y },
            MouseEventKind::Drag(MouseButton::Left) | MouseEventKind::Moved => InputEvent::PointerMove { x, y },
            MouseEventKind::Up(MouseButton::Left) => InputEvent::PointerUp { x, y },
            MouseEventKind::ScrollUp => InputEvent::Zoom(1),
            MouseEventKind::ScrollDown => InputEvent::Zoom(-1),
            _ => return,
        };
        self.push(event);
    }

    pub fn drain(&mut self) -> impl Iterator<Item = InputEvent> + '_ {
        self.events.drain(..)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
