//! Vulkan presentation surface (feature "window"): per-window surface,
//! swapchain, render pass and framebuffers, with format and present-mode
//! negotiation.

use super::{check, created, GpuContext, VulkanCommandBuffer, VulkanQueue, VulkanSemaphore};
use crate::{
    AcquiredImage, CommandBuffer, Device, GpuError, PresentOutcome, Queue, RecordFn, Semaphore,
    Swapchain,
};
use ash::vk;
use std::sync::Arc;

/// Formats tried in order; all are 8-bit UNORM so GUI vertex colors land
/// untranslated.
const PREFERRED_FORMATS: [vk::Format; 4] = [
    vk::Format::B8G8R8A8_UNORM,
    vk::Format::R8G8B8A8_UNORM,
    vk::Format::B8G8R8_UNORM,
    vk::Format::R8G8B8_UNORM,
];

const PREFERRED_COLOR_SPACE: vk::ColorSpaceKHR = vk::ColorSpaceKHR::SRGB_NONLINEAR;

/// Per-surface presentation options.
#[derive(Debug, Clone, Default)]
pub struct SurfaceConfig {
    /// Present without vsync where the surface supports it (mailbox, then
    /// immediate). Off means FIFO.
    pub uncapped_fps: bool,
}

/// Pick the surface format: the first ranked preference the surface
/// advertises with sRGB nonlinear color space. A single `UNDEFINED` entry
/// means any format is accepted, so the first preference wins outright.
/// Falls back to the first advertised format.
fn choose_surface_format(available: &[vk::SurfaceFormatKHR]) -> vk::SurfaceFormatKHR {
    let first_choice = vk::SurfaceFormatKHR {
        format: PREFERRED_FORMATS[0],
        color_space: PREFERRED_COLOR_SPACE,
    };
    if available.len() == 1 && available[0].format == vk::Format::UNDEFINED {
        return first_choice;
    }
    for preferred in PREFERRED_FORMATS {
        if let Some(found) = available
            .iter()
            .copied()
            .find(|f| f.format == preferred && f.color_space == PREFERRED_COLOR_SPACE)
        {
            return found;
        }
    }
    available.first().copied().unwrap_or(first_choice)
}

/// FIFO is the only mode Vulkan guarantees. Uncapped presentation prefers
/// mailbox, then immediate.
fn choose_present_mode(available: &[vk::PresentModeKHR], uncapped: bool) -> vk::PresentModeKHR {
    if uncapped {
        for mode in [vk::PresentModeKHR::MAILBOX, vk::PresentModeKHR::IMMEDIATE] {
            if available.contains(&mode) {
                return mode;
            }
        }
    }
    vk::PresentModeKHR::FIFO
}

/// Double buffering normally, triple when presentation is uncapped, clamped
/// to what the surface allows (a max of zero means unbounded).
fn min_image_count(uncapped: bool, caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let desired: u32 = if uncapped { 3 } else { 2 };
    let mut count = desired.max(caps.min_image_count);
    if caps.max_image_count > 0 {
        count = count.min(caps.max_image_count);
    }
    count
}

fn surface_extent(caps: &vk::SurfaceCapabilitiesKHR, requested: (u32, u32)) -> vk::Extent2D {
    // A fixed current extent must be used as-is; the sentinel value means
    // the surface follows the swapchain.
    if caps.current_extent.width != u32::MAX {
        return caps.current_extent;
    }
    vk::Extent2D {
        width: requested
            .0
            .clamp(caps.min_image_extent.width, caps.max_image_extent.width),
        height: requested
            .1
            .clamp(caps.min_image_extent.height, caps.max_image_extent.height),
    }
}

fn create_render_pass(device: &ash::Device, format: vk::Format) -> Result<vk::RenderPass, GpuError> {
    let attachment = vk::AttachmentDescription::default()
        .format(format)
        .samples(vk::SampleCountFlags::TYPE_1)
        .load_op(vk::AttachmentLoadOp::CLEAR)
        .store_op(vk::AttachmentStoreOp::STORE)
        .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
        .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .final_layout(vk::ImageLayout::PRESENT_SRC_KHR);
    let color_ref = vk::AttachmentReference::default()
        .attachment(0)
        .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);
    let subpass = vk::SubpassDescription::default()
        .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
        .color_attachments(std::slice::from_ref(&color_ref));
    // Gate the clear on the acquire semaphore's wait stage.
    let dependency = vk::SubpassDependency::default()
        .src_subpass(vk::SUBPASS_EXTERNAL)
        .dst_subpass(0)
        .src_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
        .dst_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
        .src_access_mask(vk::AccessFlags::empty())
        .dst_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE);
    let create_info = vk::RenderPassCreateInfo::default()
        .attachments(std::slice::from_ref(&attachment))
        .subpasses(std::slice::from_ref(&subpass))
        .dependencies(std::slice::from_ref(&dependency));
    created("create_render_pass", unsafe {
        device.create_render_pass(&create_info, None)
    })
}

/// One window's presentable images and the render pass scoped to them.
pub struct VulkanSurface {
    device: Arc<ash::Device>,
    surface_loader: ash::khr::surface::Instance,
    swapchain_loader: ash::khr::swapchain::Device,
    physical_device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    swapchain: vk::SwapchainKHR,
    format: vk::SurfaceFormatKHR,
    uncapped: bool,
    extent: vk::Extent2D,
    render_pass: vk::RenderPass,
    views: Vec<vk::ImageView>,
    framebuffers: Vec<vk::Framebuffer>,
}

impl VulkanSurface {
    pub(crate) fn create(
        context: &GpuContext,
        display_handle: raw_window_handle::RawDisplayHandle,
        window_handle: raw_window_handle::RawWindowHandle,
        extent: (u32, u32),
        config: &SurfaceConfig,
    ) -> Result<Self, GpuError> {
        let surface = created("create_surface", unsafe {
            ash_window::create_surface(
                &context.entry,
                &context.instance,
                display_handle,
                window_handle,
                None,
            )
        })?;
        let surface_loader = ash::khr::surface::Instance::new(&context.entry, &context.instance);

        let supported = match created("get_physical_device_surface_support", unsafe {
            surface_loader.get_physical_device_surface_support(
                context.physical_device,
                context.queue_family_index,
                surface,
            )
        }) {
            Ok(supported) => supported,
            Err(e) => {
                unsafe { surface_loader.destroy_surface(surface, None) };
                return Err(e);
            }
        };
        if !supported {
            unsafe { surface_loader.destroy_surface(surface, None) };
            return Err(GpuError::NoSurfaceSupport);
        }

        let formats = created("get_physical_device_surface_formats", unsafe {
            surface_loader.get_physical_device_surface_formats(context.physical_device, surface)
        })?;
        let format = choose_surface_format(&formats);
        let swapchain_loader =
            ash::khr::swapchain::Device::new(&context.instance, &context.device);
        let render_pass = create_render_pass(&context.device, format.format)?;

        let mut this = Self {
            device: Arc::clone(&context.device),
            surface_loader,
            swapchain_loader,
            physical_device: context.physical_device,
            surface,
            swapchain: vk::SwapchainKHR::null(),
            format,
            uncapped: config.uncapped_fps,
            extent: vk::Extent2D {
                width: extent.0,
                height: extent.1,
            },
            render_pass,
            views: Vec::new(),
            framebuffers: Vec::new(),
        };
        this.create_swapchain(extent)?;
        log::debug!(
            "surface created: {}x{}, {:?}, {} images",
            this.extent.width,
            this.extent.height,
            this.format.format,
            this.framebuffers.len()
        );
        Ok(this)
    }

    /// (Re)create the swapchain at `extent`, handing the old swapchain to
    /// the driver so its pending presents can drain. Returns the image
    /// count.
    fn create_swapchain(&mut self, extent: (u32, u32)) -> Result<u32, GpuError> {
        let caps = created("get_physical_device_surface_capabilities", unsafe {
            self.surface_loader
                .get_physical_device_surface_capabilities(self.physical_device, self.surface)
        })?;
        let present_modes = created("get_physical_device_surface_present_modes", unsafe {
            self.surface_loader
                .get_physical_device_surface_present_modes(self.physical_device, self.surface)
        })?;
        let present_mode = choose_present_mode(&present_modes, self.uncapped);
        let extent = surface_extent(&caps, extent);
        let old_swapchain = self.swapchain;

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(self.surface)
            .min_image_count(min_image_count(self.uncapped, &caps))
            .image_format(self.format.format)
            .image_color_space(self.format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(caps.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(old_swapchain);
        let swapchain = created("create_swapchain", unsafe {
            self.swapchain_loader.create_swapchain(&create_info, None)
        })?;

        self.destroy_framebuffer_objects();
        if old_swapchain != vk::SwapchainKHR::null() {
            unsafe { self.swapchain_loader.destroy_swapchain(old_swapchain, None) };
        }
        self.swapchain = swapchain;
        self.extent = extent;

        let images = created("get_swapchain_images", unsafe {
            self.swapchain_loader.get_swapchain_images(swapchain)
        })?;
        for image in &images {
            let view_create_info = vk::ImageViewCreateInfo::default()
                .image(*image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(self.format.format)
                .subresource_range(
                    vk::ImageSubresourceRange::default()
                        .aspect_mask(vk::ImageAspectFlags::COLOR)
                        .base_mip_level(0)
                        .level_count(1)
                        .base_array_layer(0)
                        .layer_count(1),
                );
            let view = created("create_image_view", unsafe {
                self.device.create_image_view(&view_create_info, None)
            })?;
            self.views.push(view);
            let framebuffer_create_info = vk::FramebufferCreateInfo::default()
                .render_pass(self.render_pass)
                .attachments(std::slice::from_ref(&view))
                .width(extent.width)
                .height(extent.height)
                .layers(1);
            let framebuffer = created("create_framebuffer", unsafe {
                self.device.create_framebuffer(&framebuffer_create_info, None)
            })?;
            self.framebuffers.push(framebuffer);
        }
        Ok(images.len() as u32)
    }

    fn destroy_framebuffer_objects(&mut self) {
        unsafe {
            for framebuffer in self.framebuffers.drain(..) {
                self.device.destroy_framebuffer(framebuffer, None);
            }
            for view in self.views.drain(..) {
                self.device.destroy_image_view(view, None);
            }
        }
    }

    pub fn format(&self) -> vk::Format {
        self.format.format
    }

    pub fn render_pass(&self) -> vk::RenderPass {
        self.render_pass
    }
}

impl Drop for VulkanSurface {
    fn drop(&mut self) {
        // The device may still be consuming these images; settle it first.
        unsafe {
            let _ = self.device.device_wait_idle();
        }
        self.destroy_framebuffer_objects();
        unsafe {
            self.device.destroy_render_pass(self.render_pass, None);
            self.swapchain_loader.destroy_swapchain(self.swapchain, None);
            self.surface_loader.destroy_surface(self.surface, None);
        }
    }
}

impl std::fmt::Debug for VulkanSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VulkanSurface")
            .field("extent", &(self.extent.width, self.extent.height))
            .field("format", &self.format.format)
            .field("image_count", &self.framebuffers.len())
            .finish_non_exhaustive()
    }
}

impl Swapchain for VulkanSurface {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn acquire_next_image(&mut self, signal: &dyn Semaphore) -> Result<AcquiredImage, String> {
        let sem = signal
            .as_any()
            .downcast_ref::<VulkanSemaphore>()
            .map(|vs| vs.semaphore)
            .unwrap_or(vk::Semaphore::null());
        match unsafe {
            self.swapchain_loader
                .acquire_next_image(self.swapchain, u64::MAX, sem, vk::Fence::null())
        } {
            Ok((index, suboptimal)) => Ok(AcquiredImage::Ready { index, suboptimal }),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquiredImage::OutOfDate),
            Err(code) => {
                check("acquire_next_image", code);
                Err(format!("acquire_next_image: {code:?}"))
            }
        }
    }

    fn record_frame(
        &self,
        cmd: &dyn CommandBuffer,
        image_index: u32,
        clear: [f32; 4],
        record: &mut RecordFn<'_>,
    ) -> Result<(), String> {
        let Some(vk_cmd) = cmd.as_any().downcast_ref::<VulkanCommandBuffer>() else {
            return Err("command buffer is not a Vulkan command buffer".to_string());
        };
        let framebuffer = self
            .framebuffers
            .get(image_index as usize)
            .copied()
            .ok_or_else(|| format!("image index {image_index} out of range"))?;

        let begin_info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        if let Err(code) = unsafe { self.device.begin_command_buffer(vk_cmd.buffer, &begin_info) } {
            check("begin_command_buffer", code);
        }
        let clear_values = [vk::ClearValue {
            color: vk::ClearColorValue { float32: clear },
        }];
        let render_pass_begin = vk::RenderPassBeginInfo::default()
            .render_pass(self.render_pass)
            .framebuffer(framebuffer)
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: self.extent,
            })
            .clear_values(&clear_values);
        unsafe {
            self.device.cmd_begin_render_pass(
                vk_cmd.buffer,
                &render_pass_begin,
                vk::SubpassContents::INLINE,
            );
        }
        record(cmd)?;
        unsafe {
            self.device.cmd_end_render_pass(vk_cmd.buffer);
        }
        if let Err(code) = unsafe { self.device.end_command_buffer(vk_cmd.buffer) } {
            check("end_command_buffer", code);
        }
        Ok(())
    }

    fn present(
        &self,
        queue: &dyn Queue,
        image_index: u32,
        wait: &dyn Semaphore,
    ) -> Result<PresentOutcome, String> {
        let Some(vk_queue) = queue.as_any().downcast_ref::<VulkanQueue>() else {
            return Err("queue is not a Vulkan queue".to_string());
        };
        let wait_semas: Vec<vk::Semaphore> = wait
            .as_any()
            .downcast_ref::<VulkanSemaphore>()
            .map(|vs| vs.semaphore)
            .into_iter()
            .collect();
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semas)
            .swapchains(std::slice::from_ref(&self.swapchain))
            .image_indices(&image_indices);
        match unsafe {
            self.swapchain_loader
                .queue_present(vk_queue.raw(), &present_info)
        } {
            Ok(false) => Ok(PresentOutcome::Presented),
            Ok(true) => Ok(PresentOutcome::Suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentOutcome::OutOfDate),
            Err(code) => {
                check("queue_present", code);
                Err(format!("queue_present: {code:?}"))
            }
        }
    }

    fn rebuild(&mut self, _device: &dyn Device, extent: (u32, u32)) -> Result<u32, String> {
        // The orchestrator has already waited the device idle.
        self.create_swapchain(extent).map_err(|e| e.to_string())
    }

    fn extent(&self) -> (u32, u32) {
        (self.extent.width, self.extent.height)
    }

    fn image_count(&self) -> u32 {
        self.framebuffers.len() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fmt(format: vk::Format, color_space: vk::ColorSpaceKHR) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format,
            color_space,
        }
    }

    #[test]
    fn undefined_format_means_free_choice() {
        let available = [fmt(vk::Format::UNDEFINED, PREFERRED_COLOR_SPACE)];
        let chosen = choose_surface_format(&available);
        assert_eq!(chosen.format, vk::Format::B8G8R8A8_UNORM);
        assert_eq!(chosen.color_space, PREFERRED_COLOR_SPACE);
    }

    #[test]
    fn format_preference_is_ranked() {
        let available = [
            fmt(vk::Format::R8G8B8A8_UNORM, PREFERRED_COLOR_SPACE),
            fmt(vk::Format::B8G8R8A8_UNORM, PREFERRED_COLOR_SPACE),
        ];
        assert_eq!(
            choose_surface_format(&available).format,
            vk::Format::B8G8R8A8_UNORM
        );
    }

    #[test]
    fn wrong_color_space_is_skipped() {
        let available = [
            fmt(vk::Format::B8G8R8A8_UNORM, vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT),
            fmt(vk::Format::R8G8B8A8_UNORM, PREFERRED_COLOR_SPACE),
        ];
        assert_eq!(
            choose_surface_format(&available).format,
            vk::Format::R8G8B8A8_UNORM
        );
    }

    #[test]
    fn unmatched_formats_fall_back_to_first_advertised() {
        let available = [fmt(
            vk::Format::A2B10G10R10_UNORM_PACK32,
            PREFERRED_COLOR_SPACE,
        )];
        assert_eq!(
            choose_surface_format(&available).format,
            vk::Format::A2B10G10R10_UNORM_PACK32
        );
    }

    #[test]
    fn capped_presentation_always_picks_fifo() {
        let available = [
            vk::PresentModeKHR::MAILBOX,
            vk::PresentModeKHR::IMMEDIATE,
            vk::PresentModeKHR::FIFO,
        ];
        assert_eq!(
            choose_present_mode(&available, false),
            vk::PresentModeKHR::FIFO
        );
    }

    #[test]
    fn uncapped_presentation_prefers_mailbox_then_immediate() {
        let all = [
            vk::PresentModeKHR::IMMEDIATE,
            vk::PresentModeKHR::MAILBOX,
            vk::PresentModeKHR::FIFO,
        ];
        assert_eq!(choose_present_mode(&all, true), vk::PresentModeKHR::MAILBOX);
        let no_mailbox = [vk::PresentModeKHR::IMMEDIATE, vk::PresentModeKHR::FIFO];
        assert_eq!(
            choose_present_mode(&no_mailbox, true),
            vk::PresentModeKHR::IMMEDIATE
        );
        let fifo_only = [vk::PresentModeKHR::FIFO];
        assert_eq!(
            choose_present_mode(&fifo_only, true),
            vk::PresentModeKHR::FIFO
        );
    }

    #[test]
    fn image_count_respects_surface_capabilities() {
        let caps = vk::SurfaceCapabilitiesKHR {
            min_image_count: 1,
            max_image_count: 0,
            ..Default::default()
        };
        assert_eq!(min_image_count(false, &caps), 2);
        assert_eq!(min_image_count(true, &caps), 3);

        let tight = vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 2,
            ..Default::default()
        };
        assert_eq!(min_image_count(true, &tight), 2);

        let generous = vk::SurfaceCapabilitiesKHR {
            min_image_count: 4,
            max_image_count: 8,
            ..Default::default()
        };
        assert_eq!(min_image_count(false, &generous), 4);
    }

    #[test]
    fn extent_follows_fixed_surface_size() {
        let caps = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: 1024,
                height: 768,
            },
            ..Default::default()
        };
        let extent = surface_extent(&caps, (1, 1));
        assert_eq!((extent.width, extent.height), (1024, 768));
    }

    #[test]
    fn extent_clamps_when_surface_leaves_it_open() {
        let caps = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
            min_image_extent: vk::Extent2D {
                width: 100,
                height: 100,
            },
            max_image_extent: vk::Extent2D {
                width: 2000,
                height: 2000,
            },
            ..Default::default()
        };
        let extent = surface_extent(&caps, (5000, 50));
        assert_eq!((extent.width, extent.height), (2000, 100));
    }
}
