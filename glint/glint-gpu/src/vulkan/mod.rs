//! Vulkan backend: the process-wide GPU context plus the primitive wrappers
//! behind the device traits. One `GpuContext` serves every window; it is
//! created before the first window and dropped after the last one.

mod queue;

#[cfg(feature = "window")]
mod surface;

pub use queue::VulkanQueue;

#[cfg(feature = "window")]
pub use surface::{SurfaceConfig, VulkanSurface};

use crate::{CommandBuffer, CommandPool, Device, Fence, GpuError, Queue, Semaphore};
use ash::vk;
use std::ffi::{c_char, CStr, CString};
use std::sync::Arc;

const VALIDATION_LAYER: &CStr =
    unsafe { CStr::from_bytes_with_nul_unchecked(b"VK_LAYER_KHRONOS_validation\0") };

/// Descriptors reserved per type in the shared pool.
const POOL_DESCRIPTORS_PER_TYPE: u32 = 1000;

/// GPU context construction options.
#[derive(Debug, Clone)]
pub struct GpuConfig {
    /// Application name reported to the driver.
    pub app_name: String,
    /// Enable the Khronos validation layer and the debug messenger. Also
    /// switched on at run time by `GLINT_VALIDATION=1`.
    pub validation: bool,
}

impl Default for GpuConfig {
    fn default() -> Self {
        Self {
            app_name: "glint".to_string(),
            validation: cfg!(feature = "validation"),
        }
    }
}

/// Vulkan status policy for the frame path: success is silent, positive
/// diagnostic codes are logged and execution continues, negative codes are
/// fatal.
pub(crate) fn check(call: &'static str, code: vk::Result) {
    if code == vk::Result::SUCCESS {
        return;
    }
    if code.as_raw() < 0 {
        log::error!("[vulkan] {call} failed: {code:?}");
        std::process::abort();
    }
    log::warn!("[vulkan] {call} returned {code:?}");
}

fn created<T>(call: &'static str, result: Result<T, vk::Result>) -> Result<T, GpuError> {
    result.map_err(|code| GpuError::Driver {
        call,
        code: code.as_raw(),
    })
}

unsafe extern "system" fn debug_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    _types: vk::DebugUtilsMessageTypeFlagsEXT,
    data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    let message = if data.is_null() || (*data).p_message.is_null() {
        std::borrow::Cow::Borrowed("<no message>")
    } else {
        CStr::from_ptr((*data).p_message).to_string_lossy()
    };
    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        log::error!("[vulkan] {message}");
    } else {
        log::warn!("[vulkan] {message}");
    }
    vk::FALSE
}

struct DebugState {
    loader: ash::ext::debug_utils::Instance,
    messenger: vk::DebugUtilsMessengerEXT,
}

/// Process-wide Vulkan state: instance, selected adapter, logical device and
/// graphics queue, plus the shared descriptor pool and pipeline cache that
/// widget renderers allocate from.
pub struct GpuContext {
    #[allow(dead_code)]
    entry: ash::Entry,
    instance: ash::Instance,
    debug: Option<DebugState>,
    physical_device: vk::PhysicalDevice,
    device: Arc<ash::Device>,
    queue: vk::Queue,
    queue_family_index: u32,
    descriptor_pool: vk::DescriptorPool,
    pipeline_cache: vk::PipelineCache,
    adapter_name: String,
}

impl GpuContext {
    /// Create a context able to present to the windowing system behind
    /// `display_handle`.
    #[cfg(feature = "window")]
    pub fn new(
        config: &GpuConfig,
        display_handle: raw_window_handle::RawDisplayHandle,
    ) -> Result<Arc<Self>, GpuError> {
        let wsi_extensions = ash_window::enumerate_required_extensions(display_handle)
            .map_err(|e| GpuError::WindowSystem(format!("enumerate_required_extensions: {e:?}")))?;
        Self::build(config, wsi_extensions)
    }

    /// Create a context with no presentation support. Useful for smoke
    /// checks on machines without a display.
    pub fn new_headless(config: &GpuConfig) -> Result<Arc<Self>, GpuError> {
        Self::build(config, &[])
    }

    fn build(config: &GpuConfig, wsi_extensions: &[*const c_char]) -> Result<Arc<Self>, GpuError> {
        let entry = unsafe { ash::Entry::load() }
            .map_err(|e| GpuError::LibraryLoad(e.to_string()))?;

        let mut validation = config.validation
            || std::env::var("GLINT_VALIDATION").map(|v| v == "1").unwrap_or(false);
        if validation && !layer_available(&entry, VALIDATION_LAYER) {
            log::warn!(
                "validation requested but {} is not installed",
                VALIDATION_LAYER.to_string_lossy()
            );
            validation = false;
        }

        let app_name = CString::new(config.app_name.as_str()).unwrap_or_default();
        let engine_name = unsafe { CStr::from_bytes_with_nul_unchecked(b"Glint\0") };
        let app_info = vk::ApplicationInfo::default()
            .api_version(vk::API_VERSION_1_0)
            .application_name(app_name.as_c_str())
            .engine_name(engine_name);

        let mut extensions: Vec<*const c_char> = wsi_extensions.to_vec();
        let mut layers: Vec<*const c_char> = Vec::new();
        if validation {
            extensions.push(ash::ext::debug_utils::NAME.as_ptr());
            layers.push(VALIDATION_LAYER.as_ptr());
        }
        let instance_create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_layer_names(&layers)
            .enabled_extension_names(&extensions);
        let instance = created("create_instance", unsafe {
            entry.create_instance(&instance_create_info, None)
        })?;

        let debug = if validation {
            let debug_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
                .message_severity(
                    vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                        | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
                )
                .message_type(
                    vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                        | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                        | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
                )
                .pfn_user_callback(Some(debug_callback));
            let loader = ash::ext::debug_utils::Instance::new(&entry, &instance);
            let messenger = created("create_debug_utils_messenger", unsafe {
                loader.create_debug_utils_messenger(&debug_info, None)
            })?;
            Some(DebugState { loader, messenger })
        } else {
            None
        };

        let physical_devices = created("enumerate_physical_devices", unsafe {
            instance.enumerate_physical_devices()
        })?;
        // Prefer a discrete GPU, fall back to whatever enumerates first.
        let physical_device = physical_devices
            .iter()
            .copied()
            .find(|pd| {
                let props = unsafe { instance.get_physical_device_properties(*pd) };
                props.device_type == vk::PhysicalDeviceType::DISCRETE_GPU
            })
            .or_else(|| physical_devices.first().copied())
            .ok_or(GpuError::NoDevice)?;
        let props = unsafe { instance.get_physical_device_properties(physical_device) };
        let adapter_name = unsafe { CStr::from_ptr(props.device_name.as_ptr()) }
            .to_string_lossy()
            .into_owned();
        log::info!("using adapter {adapter_name}");

        let queue_family_index = unsafe {
            instance.get_physical_device_queue_family_properties(physical_device)
        }
        .iter()
        .position(|p| p.queue_flags.contains(vk::QueueFlags::GRAPHICS))
        .ok_or(GpuError::NoGraphicsQueue)? as u32;

        let queue_priorities = [1.0f32];
        let queue_create_info = vk::DeviceQueueCreateInfo::default()
            .queue_family_index(queue_family_index)
            .queue_priorities(&queue_priorities);
        let mut device_extensions: Vec<*const c_char> = Vec::new();
        if !wsi_extensions.is_empty() {
            device_extensions.push(ash::khr::swapchain::NAME.as_ptr());
        }
        let device_create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(std::slice::from_ref(&queue_create_info))
            .enabled_extension_names(&device_extensions);
        let device_raw = created("create_device", unsafe {
            instance.create_device(physical_device, &device_create_info, None)
        })?;
        let queue = unsafe { device_raw.get_device_queue(queue_family_index, 0) };

        let pool_sizes = descriptor_pool_sizes();
        let pool_info = vk::DescriptorPoolCreateInfo::default()
            .flags(vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET)
            .max_sets(POOL_DESCRIPTORS_PER_TYPE * pool_sizes.len() as u32)
            .pool_sizes(&pool_sizes);
        let descriptor_pool = created("create_descriptor_pool", unsafe {
            device_raw.create_descriptor_pool(&pool_info, None)
        })?;

        let cache_info = vk::PipelineCacheCreateInfo::default();
        let pipeline_cache = created("create_pipeline_cache", unsafe {
            device_raw.create_pipeline_cache(&cache_info, None)
        })?;

        Ok(Arc::new(Self {
            entry,
            instance,
            debug,
            physical_device,
            device: Arc::new(device_raw),
            queue,
            queue_family_index,
            descriptor_pool,
            pipeline_cache,
            adapter_name,
        }))
    }

    /// Build the Vulkan presentation surface for one window.
    #[cfg(feature = "window")]
    pub fn create_surface(
        &self,
        display_handle: raw_window_handle::RawDisplayHandle,
        window_handle: raw_window_handle::RawWindowHandle,
        extent: (u32, u32),
        config: &SurfaceConfig,
    ) -> Result<VulkanSurface, GpuError> {
        VulkanSurface::create(self, display_handle, window_handle, extent, config)
    }

    pub fn device(&self) -> &Arc<ash::Device> {
        &self.device
    }

    pub fn instance(&self) -> &ash::Instance {
        &self.instance
    }

    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    pub fn queue_family_index(&self) -> u32 {
        self.queue_family_index
    }

    /// Shared descriptor pool sized for GUI workloads; allocations come back
    /// through free-descriptor-set.
    pub fn descriptor_pool(&self) -> vk::DescriptorPool {
        self.descriptor_pool
    }

    pub fn pipeline_cache(&self) -> vk::PipelineCache {
        self.pipeline_cache
    }

    pub fn adapter_name(&self) -> &str {
        &self.adapter_name
    }

    pub fn raw_queue(&self) -> vk::Queue {
        self.queue
    }
}

fn layer_available(entry: &ash::Entry, name: &CStr) -> bool {
    let layers = unsafe { entry.enumerate_instance_layer_properties() }.unwrap_or_default();
    layers.iter().any(|layer| {
        let layer_name = unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) };
        layer_name == name
    })
}

/// One thousand descriptors of every type the GUI layer allocates.
fn descriptor_pool_sizes() -> [vk::DescriptorPoolSize; 11] {
    let types = [
        vk::DescriptorType::SAMPLER,
        vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
        vk::DescriptorType::SAMPLED_IMAGE,
        vk::DescriptorType::STORAGE_IMAGE,
        vk::DescriptorType::UNIFORM_TEXEL_BUFFER,
        vk::DescriptorType::STORAGE_TEXEL_BUFFER,
        vk::DescriptorType::UNIFORM_BUFFER,
        vk::DescriptorType::STORAGE_BUFFER,
        vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
        vk::DescriptorType::STORAGE_BUFFER_DYNAMIC,
        vk::DescriptorType::INPUT_ATTACHMENT,
    ];
    types.map(|ty| vk::DescriptorPoolSize {
        ty,
        descriptor_count: POOL_DESCRIPTORS_PER_TYPE,
    })
}

impl Drop for GpuContext {
    fn drop(&mut self) {
        // Shutdown mirrors creation in reverse. Every window (and with it
        // every surface and frame slot) is gone by the time this runs.
        unsafe {
            let _ = self.device.device_wait_idle();
            self.device.destroy_descriptor_pool(self.descriptor_pool, None);
            self.device.destroy_pipeline_cache(self.pipeline_cache, None);
            self.device.destroy_device(None);
            if let Some(debug) = self.debug.take() {
                debug.loader.destroy_debug_utils_messenger(debug.messenger, None);
            }
            self.instance.destroy_instance(None);
        }
    }
}

impl std::fmt::Debug for GpuContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuContext")
            .field("adapter_name", &self.adapter_name)
            .field("queue_family_index", &self.queue_family_index)
            .finish_non_exhaustive()
    }
}

impl Device for GpuContext {
    fn create_fence(&self, signaled: bool) -> Result<Box<dyn Fence>, String> {
        let create_info = vk::FenceCreateInfo::default().flags(if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        });
        let fence = unsafe { self.device.create_fence(&create_info, None) }
            .map_err(|e| format!("create_fence: {e:?}"))?;
        Ok(Box::new(VulkanFence {
            device: Arc::clone(&self.device),
            fence,
        }))
    }

    fn create_semaphore(&self) -> Result<Box<dyn Semaphore>, String> {
        let create_info = vk::SemaphoreCreateInfo::default();
        let semaphore = unsafe { self.device.create_semaphore(&create_info, None) }
            .map_err(|e| format!("create_semaphore: {e:?}"))?;
        Ok(Box::new(VulkanSemaphore {
            device: Arc::clone(&self.device),
            semaphore,
        }))
    }

    fn create_command_pool(&self) -> Result<Box<dyn CommandPool>, String> {
        let create_info =
            vk::CommandPoolCreateInfo::default().queue_family_index(self.queue_family_index);
        let pool = unsafe { self.device.create_command_pool(&create_info, None) }
            .map_err(|e| format!("create_command_pool: {e:?}"))?;
        Ok(Box::new(VulkanCommandPool {
            device: Arc::clone(&self.device),
            pool,
        }))
    }

    fn queue(&self) -> Result<Box<dyn Queue>, String> {
        Ok(Box::new(VulkanQueue::new(
            Arc::clone(&self.device),
            self.queue,
        )))
    }

    fn wait_idle(&self) -> Result<(), String> {
        unsafe { self.device.device_wait_idle().map_err(|e| e.to_string()) }
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

pub(crate) struct VulkanFence {
    device: Arc<ash::Device>,
    pub(crate) fence: vk::Fence,
}

impl Drop for VulkanFence {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_fence(self.fence, None);
        }
    }
}

impl std::fmt::Debug for VulkanFence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VulkanFence").finish()
    }
}

impl Fence for VulkanFence {
    fn wait(&self, timeout_ns: u64) -> Result<(), String> {
        if let Err(code) = unsafe {
            self.device.wait_for_fences(&[self.fence], true, timeout_ns)
        } {
            check("wait_for_fences", code);
        }
        Ok(())
    }

    fn reset(&self) -> Result<(), String> {
        if let Err(code) = unsafe { self.device.reset_fences(&[self.fence]) } {
            check("reset_fences", code);
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

pub(crate) struct VulkanSemaphore {
    device: Arc<ash::Device>,
    pub(crate) semaphore: vk::Semaphore,
}

impl Drop for VulkanSemaphore {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_semaphore(self.semaphore, None);
        }
    }
}

impl std::fmt::Debug for VulkanSemaphore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VulkanSemaphore").finish()
    }
}

impl Semaphore for VulkanSemaphore {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

pub(crate) struct VulkanCommandPool {
    device: Arc<ash::Device>,
    pool: vk::CommandPool,
}

impl Drop for VulkanCommandPool {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_command_pool(self.pool, None);
        }
    }
}

impl std::fmt::Debug for VulkanCommandPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VulkanCommandPool").finish()
    }
}

impl CommandPool for VulkanCommandPool {
    fn reset(&self) -> Result<(), String> {
        if let Err(code) = unsafe {
            self.device
                .reset_command_pool(self.pool, vk::CommandPoolResetFlags::empty())
        } {
            check("reset_command_pool", code);
        }
        Ok(())
    }

    fn allocate(&self) -> Result<Box<dyn CommandBuffer>, String> {
        let allocate_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(self.pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        let buffers = unsafe { self.device.allocate_command_buffers(&allocate_info) }
            .map_err(|e| format!("allocate_command_buffers: {e:?}"))?;
        Ok(Box::new(VulkanCommandBuffer {
            device: Arc::clone(&self.device),
            pool: self.pool,
            buffer: buffers[0],
        }))
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

pub(crate) struct VulkanCommandBuffer {
    device: Arc<ash::Device>,
    pool: vk::CommandPool,
    pub(crate) buffer: vk::CommandBuffer,
}

impl Drop for VulkanCommandBuffer {
    fn drop(&mut self) {
        unsafe {
            self.device.free_command_buffers(self.pool, &[self.buffer]);
        }
    }
}

impl std::fmt::Debug for VulkanCommandBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VulkanCommandBuffer").finish()
    }
}

impl CommandBuffer for VulkanCommandBuffer {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_pool_reserves_every_type() {
        let sizes = descriptor_pool_sizes();
        assert_eq!(sizes.len(), 11);
        for size in &sizes {
            assert_eq!(size.descriptor_count, 1000);
        }
        let mut types: Vec<_> = sizes.iter().map(|s| s.ty).collect();
        types.sort();
        types.dedup();
        assert_eq!(types.len(), 11, "descriptor types must be distinct");
        let max_sets = POOL_DESCRIPTORS_PER_TYPE * sizes.len() as u32;
        assert_eq!(max_sets, 11_000);
    }
}
