//! Input events forwarded from the shell into a window's UI context.

use bitflags::bitflags;

bitflags! {
    /// Modifier keys held during an input event.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct Modifiers: u8 {
        const SHIFT = 1 << 0;
        const CTRL = 1 << 1;
        const ALT = 1 << 2;
        const LOGO = 1 << 3;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    Other(u16),
}

/// Logical keys a widget layer reacts to. Printable input arrives separately
/// as `UiEvent::Char`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Key {
    Escape,
    Enter,
    Tab,
    Backspace,
    Insert,
    Delete,
    Left,
    Right,
    Up,
    Down,
    PageUp,
    PageDown,
    Home,
    End,
    Space,
    /// Letter, digit or punctuation key, identified by its lowercase
    /// character.
    Char(char),
    /// Function key F1..=F24.
    F(u8),
    Shift,
    Ctrl,
    Alt,
    Logo,
    Unknown,
}

/// One input event targeted at a window, in arrival order.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum UiEvent {
    WindowFocus(bool),
    CursorEnter(bool),
    /// Cursor position in points, window-relative.
    CursorPos { x: f64, y: f64 },
    MouseButton {
        button: MouseButton,
        pressed: bool,
        mods: Modifiers,
    },
    /// Scroll deltas: lines for wheel input, points for touchpads.
    Scroll { dx: f32, dy: f32 },
    Key {
        key: Key,
        pressed: bool,
        mods: Modifiers,
    },
    /// Printable character input.
    Char(char),
    /// The monitor configuration changed (hot plug, resolution change).
    MonitorUpdate,
}
