//! Glint GPU layer: backend-agnostic device/presentation traits and the
//! per-window frame orchestration protocol. The Vulkan backend lives behind
//! the "vulkan" feature; tests drive the same traits with instrumented fakes.

use std::any::Any;
use std::fmt::Debug;

pub mod frame;

pub use frame::{
    DeferredFree, FrameOutcome, FrameSlot, PresentationSurface, DEGENERATE_FRAME_SLEEP,
};

#[cfg(feature = "vulkan")]
pub mod vulkan;

#[cfg(feature = "vulkan")]
pub use vulkan::{GpuConfig, GpuContext};

use thiserror::Error;

/// Errors from GPU context and surface construction. Driver-level failures
/// inside the frame loop never surface here; they are terminal (see
/// `vulkan::check`).
#[derive(Error, Debug)]
pub enum GpuError {
    #[error("Failed to load the Vulkan library: {0}")]
    LibraryLoad(String),
    #[error("No Vulkan physical device found")]
    NoDevice,
    #[error("No queue family with graphics support")]
    NoGraphicsQueue,
    #[error("Selected physical device cannot present to this surface")]
    NoSurfaceSupport,
    #[error("{call} failed with Vulkan status {code}")]
    Driver { call: &'static str, code: i32 },
    #[error("Window system error: {0}")]
    WindowSystem(String),
}

/// The device subset windows consume to build their per-frame resources.
/// The process-wide context implements this; fakes implement it in tests.
pub trait Device: Send + Sync + Debug {
    /// Create a fence for CPU-GPU synchronization.
    fn create_fence(&self, signaled: bool) -> Result<Box<dyn Fence>, String>;
    /// Create a semaphore for GPU-GPU synchronization.
    fn create_semaphore(&self) -> Result<Box<dyn Semaphore>, String>;
    /// Create a command pool owned by a single frame slot.
    fn create_command_pool(&self) -> Result<Box<dyn CommandPool>, String>;
    /// Get the graphics queue used for submissions and presents.
    fn queue(&self) -> Result<Box<dyn Queue>, String>;
    /// Wait for the device to become idle (all submitted work finished).
    fn wait_idle(&self) -> Result<(), String>;
    fn as_any(&self) -> &dyn Any;
}

/// Fence: CPU can wait for GPU to complete submitted work.
pub trait Fence: Send + Sync + Debug {
    fn wait(&self, timeout_ns: u64) -> Result<(), String>;
    fn reset(&self) -> Result<(), String>;
    fn as_any(&self) -> &dyn Any;
}

/// Semaphore: GPU-GPU synchronization between acquire, submit and present.
pub trait Semaphore: Send + Sync + Debug {
    fn as_any(&self) -> &dyn Any;
}

/// Command pool owned by one frame slot. Reset only after the slot's fence
/// has been observed signaled.
pub trait CommandPool: Send + Sync + Debug {
    fn reset(&self) -> Result<(), String>;
    /// Allocate a primary command buffer from this pool.
    fn allocate(&self) -> Result<Box<dyn CommandBuffer>, String>;
    fn as_any(&self) -> &dyn Any;
}

pub trait CommandBuffer: Send + Sync + Debug {
    fn as_any(&self) -> &dyn Any;
}

/// Queue for submitting recorded frames. The caller must keep the command
/// buffers alive until the signal fence has been waited on.
pub trait Queue: Send + Sync + Debug {
    fn submit(
        &self,
        command_buffers: &[&dyn CommandBuffer],
        wait_semaphores: &[&dyn Semaphore],
        signal_semaphores: &[&dyn Semaphore],
        signal_fence: Option<&dyn Fence>,
    ) -> Result<(), String>;
    fn as_any(&self) -> &dyn Any;
}

/// One presentable image acquired for this frame, or the signal that the
/// swapchain no longer matches the surface and must be rebuilt first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquiredImage {
    /// Image `index` is usable. `suboptimal` means presentation would still
    /// succeed but the swapchain no longer matches the window exactly.
    Ready { index: u32, suboptimal: bool },
    OutOfDate,
}

/// Result of a present call that did not fail at the driver level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    Presented,
    Suboptimal,
    OutOfDate,
}

/// Recording callback handed the active command buffer between render pass
/// begin and end.
pub type RecordFn<'a> = dyn FnMut(&dyn CommandBuffer) -> Result<(), String> + 'a;

/// Swapchain-equivalent for one window: the rotating presentable images plus
/// the render pass scoped to them. Out-of-date and suboptimal are carried as
/// values, never as `Err`; `Err` always means a driver failure.
pub trait Swapchain: Send + Sync + Debug {
    fn as_any(&self) -> &dyn Any;
    /// Acquire the next presentable image. `signal` is signaled once the
    /// image is actually available for rendering.
    fn acquire_next_image(&mut self, signal: &dyn Semaphore) -> Result<AcquiredImage, String>;
    /// Record one frame into `cmd`: begin the buffer one-time-submit, begin
    /// the render pass for `image_index` at the current extent with `clear`
    /// as the single clear value, run `record`, then end both.
    fn record_frame(
        &self,
        cmd: &dyn CommandBuffer,
        image_index: u32,
        clear: [f32; 4],
        record: &mut RecordFn<'_>,
    ) -> Result<(), String>;
    /// Present `image_index`, waiting on `wait` (signaled at render
    /// completion).
    fn present(
        &self,
        queue: &dyn Queue,
        image_index: u32,
        wait: &dyn Semaphore,
    ) -> Result<PresentOutcome, String>;
    /// Recreate the swapchain at `extent`, reusing the old one where the
    /// backend supports it. The caller has already waited the device idle.
    /// Returns the new image count.
    fn rebuild(&mut self, device: &dyn Device, extent: (u32, u32)) -> Result<u32, String>;
    /// Current extent (width, height). May change on rebuild.
    fn extent(&self) -> (u32, u32);
    /// Number of presentable images.
    fn image_count(&self) -> u32;
}
