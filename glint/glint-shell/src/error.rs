use glint_gpu::GpuError;
use thiserror::Error;

/// Errors from the shell layer: event loop and window setup. Frame-path
/// driver failures never appear here; those are terminal (see the GPU
/// layer's status policy).
#[derive(Error, Debug)]
pub enum ShellError {
    #[error("Event loop error: {0}")]
    EventLoop(String),
    #[error("Window creation failed: {0}")]
    WindowCreation(String),
    #[error("Window chrome installation failed: {0}")]
    Chrome(String),
    #[error(transparent)]
    Gpu(#[from] GpuError),
    #[error("Surface setup failed: {0}")]
    Surface(String),
}
