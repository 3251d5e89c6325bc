//! Per-window UI context: frame lifecycle, the input mirror, and the
//! current-context stack widget libraries expect.

use crate::draw::{DrawData, DrawList};
use crate::input::{Modifiers, MouseButton, UiEvent};
use crate::theme::Style;
use std::cell::RefCell;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    /// Ids made current on this thread; the top is active. Guards push on
    /// creation and pop on drop, so switching contexts across windows nests
    /// and restores correctly.
    static CURRENT: RefCell<Vec<u64>> = const { RefCell::new(Vec::new()) };
}

/// Mouse and keyboard state folded from arriving events so widget code can
/// poll it mid-frame.
#[derive(Clone, Copy, Debug, Default)]
pub struct InputState {
    pub cursor_pos: (f64, f64),
    pub cursor_inside: bool,
    pub focused: bool,
    /// Left, right, middle.
    pub buttons: [bool; 3],
    pub mods: Modifiers,
}

/// One window's UI state. A context is only ever touched from the thread
/// that owns its window.
pub struct UiContext {
    id: u64,
    style: Style,
    input: InputState,
    events: Vec<UiEvent>,
    lists: Vec<DrawList>,
    display_size: [f32; 2],
    framebuffer_scale: f32,
    dt: f32,
    frame_count: u64,
}

impl UiContext {
    pub fn new(style: Style) -> Self {
        Self {
            id: NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed),
            style,
            input: InputState::default(),
            events: Vec::new(),
            lists: Vec::new(),
            display_size: [0.0, 0.0],
            framebuffer_scale: 1.0,
            dt: 0.0,
            frame_count: 0,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn style(&self) -> &Style {
        &self.style
    }

    pub fn set_style(&mut self, style: Style) {
        self.style = style;
    }

    /// Start a frame: record timing and geometry, drop the previous frame's
    /// draw lists.
    pub fn begin_frame(&mut self, dt: f32, display_size: [f32; 2], framebuffer_scale: f32) {
        self.dt = dt;
        self.display_size = display_size;
        self.framebuffer_scale = framebuffer_scale;
        self.lists.clear();
        self.frame_count += 1;
    }

    pub fn submit_list(&mut self, list: DrawList) {
        self.lists.push(list);
    }

    /// Finish the frame and hand back everything submitted since
    /// `begin_frame`.
    pub fn end_frame(&mut self) -> DrawData {
        DrawData {
            display_size: self.display_size,
            framebuffer_scale: self.framebuffer_scale,
            lists: std::mem::take(&mut self.lists),
        }
    }

    /// Queue an event and fold it into the polled input state.
    pub fn push_event(&mut self, event: UiEvent) {
        match event {
            UiEvent::WindowFocus(focused) => self.input.focused = focused,
            UiEvent::CursorEnter(inside) => self.input.cursor_inside = inside,
            UiEvent::CursorPos { x, y } => self.input.cursor_pos = (x, y),
            UiEvent::MouseButton {
                button,
                pressed,
                mods,
            } => {
                self.input.mods = mods;
                let index = match button {
                    MouseButton::Left => Some(0),
                    MouseButton::Right => Some(1),
                    MouseButton::Middle => Some(2),
                    MouseButton::Other(_) => None,
                };
                if let Some(index) = index {
                    self.input.buttons[index] = pressed;
                }
            }
            UiEvent::Key { mods, .. } => self.input.mods = mods,
            _ => {}
        }
        self.events.push(event);
    }

    /// Drain queued events in arrival order.
    pub fn take_events(&mut self) -> Vec<UiEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn input(&self) -> &InputState {
        &self.input
    }

    pub fn dt(&self) -> f32 {
        self.dt
    }

    pub fn display_size(&self) -> [f32; 2] {
        self.display_size
    }

    pub fn framebuffer_scale(&self) -> f32 {
        self.framebuffer_scale
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Make this context the thread's current one until the guard drops.
    pub fn make_current(&self) -> ContextGuard {
        CURRENT.with(|stack| stack.borrow_mut().push(self.id));
        ContextGuard { id: self.id }
    }

    pub fn is_current(&self) -> bool {
        CURRENT.with(|stack| stack.borrow().last() == Some(&self.id))
    }
}

impl std::fmt::Debug for UiContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UiContext")
            .field("id", &self.id)
            .field("frame_count", &self.frame_count)
            .field("queued_events", &self.events.len())
            .finish_non_exhaustive()
    }
}

/// Restores the previously current context when dropped.
#[must_use = "the context stays current only while the guard lives"]
#[derive(Debug)]
pub struct ContextGuard {
    id: u64,
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        CURRENT.with(|stack| {
            let mut stack = stack.borrow_mut();
            // Guards drop in reverse creation order on one thread, so the
            // top entry is ours; the fallback tolerates leaked guards.
            if stack.last() == Some(&self.id) {
                stack.pop();
            } else if let Some(pos) = stack.iter().rposition(|&id| id == self.id) {
                stack.remove(pos);
            }
        });
    }
}
