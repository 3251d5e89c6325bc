//! One shell window: the native window, its presentation surface and UI
//! context, and the drawable that fills it.

use std::sync::Arc;

use glint_gpu::vulkan::SurfaceConfig;
use glint_gpu::{CommandBuffer, GpuContext, PresentationSurface, Queue};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use ui_api::{DrawBackend, Key, Modifiers, MouseButton, Style, UiContext, UiEvent};
use winit::dpi::{LogicalSize, PhysicalPosition};
use winit::event::{MouseButton as WinitMouseButton, MouseScrollDelta, WindowEvent};
use winit::event_loop::ActiveEventLoop;
use winit::keyboard::{Key as WinitKey, ModifiersState, NamedKey};
use winit::monitor::MonitorHandle;
use winit::window::{Fullscreen, Window as WinitWindow, WindowAttributes};

use crate::chrome::{platform_chrome, PlatformChrome};
use crate::drawable::Drawable;
use crate::error::ShellError;
use crate::registry::WindowId;

/// Creation options for one window.
#[derive(Debug, Clone)]
pub struct WindowSettings {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub resizable: bool,
    pub fullscreen: bool,
    /// Strip the native titlebar so the drawable can render its own. Falls
    /// back to native decorations on platforms without chrome support.
    pub custom_titlebar: bool,
    pub show_on_create: bool,
    /// Window whose monitor this one is centered on. Defaults to the
    /// primary monitor.
    pub parent: Option<WindowId>,
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            title: "glint".to_string(),
            width: 800,
            height: 600,
            resizable: false,
            fullscreen: false,
            custom_titlebar: false,
            show_on_create: true,
            parent: None,
        }
    }
}

/// A realized window. The presentation surface is declared before the
/// native window so swapchain teardown (which waits the device idle) runs
/// while the window is still alive; the `Arc<GpuContext>` keeps the device
/// alive until the last window is gone.
pub struct Window {
    id: WindowId,
    surface: Option<PresentationSurface>,
    ui: UiContext,
    drawable: Box<dyn Drawable>,
    backend: Box<dyn DrawBackend>,
    #[allow(dead_code)]
    chrome: Option<Box<dyn PlatformChrome>>,
    mods: Modifiers,
    close_requested: bool,
    visible: bool,
    parent: Option<WindowId>,
    gpu: Option<Arc<GpuContext>>,
    window: WinitWindow,
}

impl Window {
    /// Realize a window from its settings. `gpu` is `None` when the GPU
    /// context failed to start; the window then opens without a surface and
    /// never draws.
    pub(crate) fn create(
        id: WindowId,
        settings: WindowSettings,
        drawable: Box<dyn Drawable>,
        backend: Box<dyn DrawBackend>,
        gpu: Option<&Arc<GpuContext>>,
        surface_config: &SurfaceConfig,
        style: Style,
        event_loop: &ActiveEventLoop,
        parent_monitor: Option<MonitorHandle>,
    ) -> Result<Self, ShellError> {
        let attrs = WindowAttributes::default()
            .with_title(settings.title.clone())
            .with_inner_size(LogicalSize::new(settings.width as f64, settings.height as f64))
            .with_resizable(settings.resizable)
            .with_visible(false)
            .with_fullscreen(settings.fullscreen.then(|| Fullscreen::Borderless(None)));
        let window = event_loop
            .create_window(attrs)
            .map_err(|e| ShellError::WindowCreation(e.to_string()))?;

        if let Some(monitor) = parent_monitor.or_else(|| window.primary_monitor()) {
            center_on(&window, &monitor);
        }

        let mut chrome = None;
        if settings.custom_titlebar {
            let mut installer = platform_chrome();
            if installer.install(&window)? {
                chrome = Some(installer);
            }
        }

        let surface = match gpu {
            Some(gpu) => Some(create_presentation(
                gpu,
                &window,
                surface_config,
                style.clear_color.to_f32_array(),
            )?),
            None => None,
        };

        if settings.show_on_create {
            window.set_visible(true);
        }
        log::debug!("created {id} \"{}\"", settings.title);

        Ok(Self {
            id,
            surface,
            ui: UiContext::new(style),
            drawable,
            backend,
            chrome,
            mods: Modifiers::empty(),
            close_requested: false,
            visible: settings.show_on_create,
            parent: settings.parent,
            gpu: gpu.cloned(),
            window,
        })
    }

    /// Advance this window one tick: rebuild a stale surface, run the
    /// drawable while the UI context is current, then render and present
    /// the produced draw data. Driver failures in the frame path are
    /// terminal.
    pub(crate) fn render(&mut self, queue: Option<&dyn Queue>, dt: f32) {
        if let (Some(gpu), Some(surface)) = (self.gpu.as_ref(), self.surface.as_mut()) {
            if surface.needs_rebuild() {
                let size = self.window.inner_size();
                // A zero-sized window cannot host a swapchain; leave the
                // flag set and let the degenerate guard idle below.
                if size.width > 0 && size.height > 0 {
                    if let Err(e) = surface.rebuild(gpu.as_ref(), (size.width, size.height)) {
                        log::error!("{}: swapchain rebuild failed: {e}", self.id);
                        std::process::abort();
                    }
                }
            }
        }

        let size = self.window.inner_size();
        let scale = self.window.scale_factor();
        let logical = size.to_logical::<f32>(scale);

        let guard = self.ui.make_current();
        self.ui
            .begin_frame(dt, [logical.width, logical.height], scale as f32);
        self.drawable.on_update(&mut self.ui, dt);
        self.drawable.on_render(&mut self.ui);
        let draw = self.ui.end_frame();
        drop(guard);

        let Some(surface) = self.surface.as_mut() else {
            return;
        };
        let Some(queue) = queue else {
            return;
        };
        let backend = self.backend.as_mut();
        let mut record = |cmd: &dyn CommandBuffer| backend.record_draw_data(&draw, cmd.as_any());
        if let Err(e) = surface.render_frame(queue, (size.width, size.height), &mut record) {
            log::error!("{}: render failed: {e}", self.id);
            std::process::abort();
        }
        if let Err(e) = surface.present_frame(queue) {
            log::error!("{}: present failed: {e}", self.id);
            std::process::abort();
        }
    }

    /// Translate a winit event into UI context input. Resizes flag the
    /// surface for a start-of-tick rebuild instead of recreating anything
    /// mid-frame.
    pub(crate) fn handle_event(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::CloseRequested => self.close_requested = true,
            WindowEvent::Resized(_) => {
                if let Some(surface) = self.surface.as_mut() {
                    surface.request_rebuild();
                }
            }
            WindowEvent::Focused(focused) => {
                self.ui.push_event(UiEvent::WindowFocus(*focused));
            }
            WindowEvent::CursorEntered { .. } => {
                self.ui.push_event(UiEvent::CursorEnter(true));
            }
            WindowEvent::CursorLeft { .. } => {
                self.ui.push_event(UiEvent::CursorEnter(false));
            }
            WindowEvent::CursorMoved { position, .. } => {
                let logical = position.to_logical::<f64>(self.window.scale_factor());
                self.ui.push_event(UiEvent::CursorPos {
                    x: logical.x,
                    y: logical.y,
                });
            }
            WindowEvent::ModifiersChanged(modifiers) => {
                self.mods = translate_modifiers(modifiers.state());
            }
            WindowEvent::MouseInput { state, button, .. } => {
                self.ui.push_event(UiEvent::MouseButton {
                    button: translate_mouse_button(*button),
                    pressed: state.is_pressed(),
                    mods: self.mods,
                });
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let (dx, dy) = match delta {
                    MouseScrollDelta::LineDelta(x, y) => (*x, *y),
                    MouseScrollDelta::PixelDelta(pos) => {
                        let logical = pos.to_logical::<f64>(self.window.scale_factor());
                        (logical.x as f32, logical.y as f32)
                    }
                };
                self.ui.push_event(UiEvent::Scroll { dx, dy });
            }
            WindowEvent::KeyboardInput { event, .. } => {
                let pressed = event.state.is_pressed();
                self.ui.push_event(UiEvent::Key {
                    key: translate_key(&event.logical_key),
                    pressed,
                    mods: self.mods,
                });
                if pressed {
                    if let Some(text) = event.text.as_ref() {
                        for ch in text.chars().filter(|ch| !ch.is_control()) {
                            self.ui.push_event(UiEvent::Char(ch));
                        }
                    }
                }
            }
            _ => {}
        }
    }

    /// The monitor configuration changed somewhere; let the drawable react.
    pub(crate) fn notify_monitor_update(&mut self) {
        self.ui.push_event(UiEvent::MonitorUpdate);
    }

    pub fn id(&self) -> WindowId {
        self.id
    }

    pub(crate) fn native_id(&self) -> winit::window::WindowId {
        self.window.id()
    }

    pub(crate) fn current_monitor(&self) -> Option<MonitorHandle> {
        self.window.current_monitor()
    }

    pub fn close_requested(&self) -> bool {
        self.close_requested
    }

    pub fn request_close(&mut self) {
        self.close_requested = true;
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.window.set_visible(visible);
        self.visible = visible;
    }

    pub fn is_visible(&self) -> bool {
        self.window.is_visible().unwrap_or(self.visible)
    }

    pub fn focus(&self) {
        self.window.focus_window();
    }

    pub fn is_focused(&self) -> bool {
        self.window.has_focus()
    }

    pub fn set_minimized(&self, minimized: bool) {
        self.window.set_minimized(minimized);
    }

    pub fn set_maximized(&self, maximized: bool) {
        self.window.set_maximized(maximized);
    }

    pub fn set_title(&self, title: &str) {
        self.window.set_title(title);
    }

    pub fn inner_size(&self) -> (u32, u32) {
        let size = self.window.inner_size();
        (size.width, size.height)
    }

    pub fn scale_factor(&self) -> f64 {
        self.window.scale_factor()
    }

    pub fn parent(&self) -> Option<WindowId> {
        self.parent
    }
}

impl std::fmt::Debug for Window {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Window")
            .field("id", &self.id)
            .field("has_surface", &self.surface.is_some())
            .field("close_requested", &self.close_requested)
            .finish_non_exhaustive()
    }
}

fn create_presentation(
    gpu: &Arc<GpuContext>,
    window: &WinitWindow,
    config: &SurfaceConfig,
    clear: [f32; 4],
) -> Result<PresentationSurface, ShellError> {
    let display = window
        .display_handle()
        .map_err(|e| ShellError::Surface(format!("display handle: {e}")))?;
    let handle = window
        .window_handle()
        .map_err(|e| ShellError::Surface(format!("window handle: {e}")))?;
    let size = window.inner_size();
    let vulkan = gpu.create_surface(
        display.as_raw(),
        handle.as_raw(),
        (size.width, size.height),
        config,
    )?;
    let mut surface =
        PresentationSurface::new(gpu.as_ref(), Box::new(vulkan)).map_err(ShellError::Surface)?;
    surface.set_clear_color(clear);
    Ok(surface)
}

fn center_on(window: &WinitWindow, monitor: &MonitorHandle) {
    let size = monitor.size();
    let position = monitor.position();
    let outer = window.outer_size();
    let x = position.x + (size.width.saturating_sub(outer.width) / 2) as i32;
    let y = position.y + (size.height.saturating_sub(outer.height) / 2) as i32;
    window.set_outer_position(PhysicalPosition::new(x, y));
}

fn translate_modifiers(state: ModifiersState) -> Modifiers {
    let mut mods = Modifiers::empty();
    mods.set(Modifiers::SHIFT, state.shift_key());
    mods.set(Modifiers::CTRL, state.control_key());
    mods.set(Modifiers::ALT, state.alt_key());
    mods.set(Modifiers::LOGO, state.super_key());
    mods
}

fn translate_mouse_button(button: WinitMouseButton) -> MouseButton {
    match button {
        WinitMouseButton::Left => MouseButton::Left,
        WinitMouseButton::Right => MouseButton::Right,
        WinitMouseButton::Middle => MouseButton::Middle,
        WinitMouseButton::Back => MouseButton::Other(3),
        WinitMouseButton::Forward => MouseButton::Other(4),
        WinitMouseButton::Other(n) => MouseButton::Other(n),
    }
}

fn translate_key(key: &WinitKey) -> Key {
    match key {
        WinitKey::Named(named) => match named {
            NamedKey::Escape => Key::Escape,
            NamedKey::Enter => Key::Enter,
            NamedKey::Tab => Key::Tab,
            NamedKey::Backspace => Key::Backspace,
            NamedKey::Insert => Key::Insert,
            NamedKey::Delete => Key::Delete,
            NamedKey::ArrowLeft => Key::Left,
            NamedKey::ArrowRight => Key::Right,
            NamedKey::ArrowUp => Key::Up,
            NamedKey::ArrowDown => Key::Down,
            NamedKey::PageUp => Key::PageUp,
            NamedKey::PageDown => Key::PageDown,
            NamedKey::Home => Key::Home,
            NamedKey::End => Key::End,
            NamedKey::Space => Key::Space,
            NamedKey::Shift => Key::Shift,
            NamedKey::Control => Key::Ctrl,
            NamedKey::Alt => Key::Alt,
            NamedKey::Super => Key::Logo,
            NamedKey::F1 => Key::F(1),
            NamedKey::F2 => Key::F(2),
            NamedKey::F3 => Key::F(3),
            NamedKey::F4 => Key::F(4),
            NamedKey::F5 => Key::F(5),
            NamedKey::F6 => Key::F(6),
            NamedKey::F7 => Key::F(7),
            NamedKey::F8 => Key::F(8),
            NamedKey::F9 => Key::F(9),
            NamedKey::F10 => Key::F(10),
            NamedKey::F11 => Key::F(11),
            NamedKey::F12 => Key::F(12),
            _ => Key::Unknown,
        },
        WinitKey::Character(text) => {
            let mut chars = text.chars();
            match (chars.next(), chars.next()) {
                (Some(ch), None) => Key::Char(ch.to_ascii_lowercase()),
                _ => Key::Unknown,
            }
        }
        _ => Key::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use winit::keyboard::SmolStr;

    #[test]
    fn named_keys_translate_to_logical_keys() {
        assert_eq!(translate_key(&WinitKey::Named(NamedKey::Escape)), Key::Escape);
        assert_eq!(translate_key(&WinitKey::Named(NamedKey::ArrowLeft)), Key::Left);
        assert_eq!(translate_key(&WinitKey::Named(NamedKey::F5)), Key::F(5));
        assert_eq!(translate_key(&WinitKey::Named(NamedKey::Space)), Key::Space);
        assert_eq!(
            translate_key(&WinitKey::Named(NamedKey::MediaPlayPause)),
            Key::Unknown
        );
    }

    #[test]
    fn character_keys_fold_to_lowercase() {
        assert_eq!(
            translate_key(&WinitKey::Character(SmolStr::new("A"))),
            Key::Char('a')
        );
        assert_eq!(
            translate_key(&WinitKey::Character(SmolStr::new("/"))),
            Key::Char('/')
        );
        assert_eq!(
            translate_key(&WinitKey::Character(SmolStr::new("ab"))),
            Key::Unknown
        );
    }

    #[test]
    fn modifier_state_maps_bit_for_bit() {
        let mods = translate_modifiers(ModifiersState::SHIFT | ModifiersState::CONTROL);
        assert!(mods.contains(Modifiers::SHIFT));
        assert!(mods.contains(Modifiers::CTRL));
        assert!(!mods.contains(Modifiers::ALT));
        assert_eq!(translate_modifiers(ModifiersState::empty()), Modifiers::empty());
    }

    #[test]
    fn extra_mouse_buttons_map_to_other() {
        assert_eq!(translate_mouse_button(WinitMouseButton::Left), MouseButton::Left);
        assert_eq!(
            translate_mouse_button(WinitMouseButton::Forward),
            MouseButton::Other(4)
        );
        assert_eq!(
            translate_mouse_button(WinitMouseButton::Other(9)),
            MouseButton::Other(9)
        );
    }
}
