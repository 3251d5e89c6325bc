//! The application loop: owns the GPU context, realizes spawned windows and
//! drives every window once per tick in registry order.

use std::sync::Arc;

use glint_gpu::vulkan::{GpuConfig, SurfaceConfig};
use glint_gpu::{Device, GpuContext, Queue};
use raw_window_handle::HasDisplayHandle;
use ui_api::{Color, DrawBackend, Style};
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};

use crate::clock::FrameClock;
use crate::drawable::Drawable;
use crate::error::ShellError;
use crate::registry::{CullOutcome, WindowId, WindowRegistry};
use crate::window::{Window, WindowSettings};

/// Application lifecycle. `Stopped` is terminal; a stopped application
/// never runs again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Idle,
    Running,
    Stopped,
}

/// Application-wide options applied when the loop starts.
#[derive(Debug, Clone)]
pub struct ApplicationConfig {
    /// Name reported to the GPU driver.
    pub name: String,
    /// Enable GPU validation layers.
    pub validation: bool,
    /// Present as fast as the driver allows instead of waiting for vsync.
    pub uncapped_fps: bool,
    /// Clear color applied to every window surface.
    pub clear_color: Color,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: "glint".to_string(),
            validation: false,
            uncapped_fps: false,
            clear_color: Style::default().clear_color,
        }
    }
}

struct PendingWindow {
    id: WindowId,
    settings: WindowSettings,
    drawable: Box<dyn Drawable>,
    backend: Box<dyn DrawBackend>,
}

/// The top-level loop. Windows spawned before or during `run` are realized
/// inside the event loop where the platform allows window creation. The
/// registry is declared before the GPU fields so windows (and with them
/// every swapchain and frame slot) drop before the device.
pub struct Application {
    config: ApplicationConfig,
    state: AppState,
    clock: FrameClock,
    windows: WindowRegistry<Window>,
    pending: Vec<PendingWindow>,
    queue: Option<Box<dyn Queue>>,
    gpu: Option<Arc<GpuContext>>,
}

impl Application {
    pub fn new(config: ApplicationConfig) -> Self {
        Self {
            config,
            state: AppState::Idle,
            clock: FrameClock::new(),
            windows: WindowRegistry::new(),
            pending: Vec::new(),
            queue: None,
            gpu: None,
        }
    }

    pub fn state(&self) -> AppState {
        self.state
    }

    /// Queue a window for realization. The id is live immediately: it can
    /// parent other windows and is the handle the registry will use. The
    /// first spawned window becomes the primary; closing it ends the
    /// application.
    pub fn spawn_window(
        &mut self,
        settings: WindowSettings,
        drawable: Box<dyn Drawable>,
        backend: Box<dyn DrawBackend>,
    ) -> WindowId {
        let id = self.windows.allocate_id();
        self.pending.push(PendingWindow {
            id,
            settings,
            drawable,
            backend,
        });
        id
    }

    /// Run until the primary window closes or `stop` is called. A GPU
    /// context that fails to start is logged and skipped: windows open and
    /// process input, nothing draws. No-op when already stopped.
    pub fn run(&mut self) -> Result<(), ShellError> {
        if self.state == AppState::Stopped {
            return Ok(());
        }
        self.state = AppState::Running;
        let event_loop = EventLoop::new().map_err(|e| ShellError::EventLoop(e.to_string()))?;

        match event_loop.display_handle() {
            Ok(display) => {
                let gpu_config = GpuConfig {
                    app_name: self.config.name.clone(),
                    validation: self.config.validation,
                };
                match GpuContext::new(&gpu_config, display.as_raw()) {
                    Ok(gpu) => {
                        match gpu.queue() {
                            Ok(queue) => self.queue = Some(queue),
                            Err(e) => log::error!("graphics queue unavailable: {e}"),
                        }
                        self.gpu = Some(gpu);
                    }
                    Err(e) => {
                        log::error!("GPU context creation failed: {e}; windows will not draw");
                    }
                }
            }
            Err(e) => log::error!("no display handle: {e}; windows will not draw"),
        }

        let result = event_loop.run_app(self);
        self.shutdown();
        result.map_err(|e| ShellError::EventLoop(e.to_string()))
    }

    pub fn stop(&mut self) {
        self.state = AppState::Stopped;
    }

    /// Teardown order is load-bearing: every window must be gone before the
    /// GPU context is dropped.
    fn shutdown(&mut self) {
        self.pending.clear();
        self.windows.clear();
        self.queue = None;
        self.gpu = None;
        self.state = AppState::Stopped;
    }

    fn realize_pending(&mut self, event_loop: &ActiveEventLoop) {
        if self.pending.is_empty() {
            return;
        }
        let surface_config = SurfaceConfig {
            uncapped_fps: self.config.uncapped_fps,
        };
        let style = Style {
            clear_color: self.config.clear_color,
            ..Style::default()
        };
        for spawn in std::mem::take(&mut self.pending) {
            let parent_monitor = spawn
                .settings
                .parent
                .and_then(|pid| self.windows.get(pid))
                .and_then(|w| w.current_monitor());
            match Window::create(
                spawn.id,
                spawn.settings,
                spawn.drawable,
                spawn.backend,
                self.gpu.as_ref(),
                &surface_config,
                style,
                event_loop,
                parent_monitor,
            ) {
                Ok(window) => self.windows.insert(spawn.id, window),
                Err(e) => log::error!("failed to realize {}: {e}", spawn.id),
            }
        }
    }

    fn find_window(&self, native: winit::window::WindowId) -> Option<WindowId> {
        self.windows
            .iter()
            .find(|(_, w)| w.native_id() == native)
            .map(|(id, _)| id)
    }
}

impl std::fmt::Debug for Application {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Application")
            .field("state", &self.state)
            .field("windows", &self.windows.len())
            .field("pending", &self.pending.len())
            .field("has_gpu", &self.gpu.is_some())
            .finish_non_exhaustive()
    }
}

impl ApplicationHandler for Application {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        self.realize_pending(event_loop);
    }

    fn window_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        if let WindowEvent::ScaleFactorChanged { .. } = event {
            // The closest signal winit gives for a monitor-configuration
            // change; every window gets to react.
            for (_, window) in self.windows.iter_mut() {
                window.notify_monitor_update();
            }
        }
        let Some(id) = self.find_window(window_id) else {
            return;
        };
        if let Some(window) = self.windows.get_mut(id) {
            window.handle_event(&event);
        }
    }

    /// The tick body. winit has dispatched this iteration's platform events
    /// through `window_event` by the time this runs.
    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.state != AppState::Running {
            event_loop.exit();
            return;
        }
        event_loop.set_control_flow(ControlFlow::Poll);
        self.realize_pending(event_loop);
        if self.windows.is_empty() {
            self.state = AppState::Stopped;
            event_loop.exit();
            return;
        }

        let frame = self.clock.tick();
        let queue = self.queue.as_deref();
        let outcome = drive_tick(
            &mut self.state,
            &mut self.windows,
            |w| w.close_requested(),
            |w| w.render(queue, frame.dt),
        );
        if let CullOutcome::Removed(count) = outcome {
            if count > 0 {
                log::debug!("removed {count} closed window(s)");
            }
        }
        if self.state != AppState::Running {
            event_loop.exit();
        }
    }
}

/// One lifecycle step: sweep close requests, then (if still running) render
/// every window once in registry order over an id snapshot, so mid-tick
/// spawns and closes never invalidate the iteration. Split from the event
/// loop callback so the lifecycle scenarios run under test without a
/// windowing system.
fn drive_tick<W>(
    state: &mut AppState,
    windows: &mut WindowRegistry<W>,
    mut is_closed: impl FnMut(&W) -> bool,
    mut render: impl FnMut(&mut W),
) -> CullOutcome {
    let outcome = windows.cull_closed(&mut is_closed);
    if outcome == CullOutcome::PrimaryClosed {
        *state = AppState::Stopped;
        return outcome;
    }
    for id in windows.ids() {
        if let Some(window) = windows.get_mut(id) {
            render(window);
        }
    }
    outcome
}
