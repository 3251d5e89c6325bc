//! GUI-library boundary for Glint.
//! Defines the draw-data transport, the per-window UI context with
//! current-context nesting, input events and the theme palette, so the shell
//! can host any widget layer through one narrow interface.

mod context;
mod draw;
mod input;
mod theme;

pub use context::{ContextGuard, InputState, UiContext};
pub use draw::{
    DrawBackend, DrawCommand, DrawData, DrawList, DrawVert, NullDrawBackend, TextureId,
};
pub use input::{Key, Modifiers, MouseButton, UiEvent};
pub use theme::{colors, Color, Style};
