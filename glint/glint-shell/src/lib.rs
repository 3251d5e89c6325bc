//! Glint shell: window lifecycle, the application loop and platform chrome.
//!
//! The shell opens winit windows, feeds their input into [`ui_api::UiContext`]
//! instances and drives one render per window per tick through the GPU layer.
//! Tools implement [`Drawable`] and spawn windows on an [`Application`]; the
//! first window is the primary and closing it ends the run.

pub mod app;
pub mod chrome;
pub mod clock;
pub mod drawable;
pub mod error;
pub mod logging;
pub mod registry;
pub mod window;

pub use app::{AppState, Application, ApplicationConfig};
pub use chrome::{hit_test, platform_chrome, FrameRegion, NoChrome, PlatformChrome, RESIZE_BORDER};
pub use clock::{FrameClock, FrameTime};
pub use drawable::Drawable;
pub use error::ShellError;
pub use logging::init_logging;
pub use registry::{CullOutcome, WindowId, WindowRegistry};
pub use window::{Window, WindowSettings};
