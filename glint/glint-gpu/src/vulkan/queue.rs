use super::{check, VulkanCommandBuffer, VulkanFence, VulkanSemaphore};
use crate::{CommandBuffer, Fence, Queue, Semaphore};
use ash::vk;
use std::sync::Arc;

/// Graphics queue wrapper used for frame submissions.
pub struct VulkanQueue {
    device: Arc<ash::Device>,
    queue: vk::Queue,
}

impl VulkanQueue {
    pub(crate) fn new(device: Arc<ash::Device>, queue: vk::Queue) -> Self {
        Self { device, queue }
    }

    pub fn raw(&self) -> vk::Queue {
        self.queue
    }
}

impl std::fmt::Debug for VulkanQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VulkanQueue").finish()
    }
}

impl Queue for VulkanQueue {
    fn submit(
        &self,
        command_buffers: &[&dyn CommandBuffer],
        wait_semaphores: &[&dyn Semaphore],
        signal_semaphores: &[&dyn Semaphore],
        signal_fence: Option<&dyn Fence>,
    ) -> Result<(), String> {
        let vk_buffers: Vec<vk::CommandBuffer> = command_buffers
            .iter()
            .filter_map(|b| {
                b.as_any()
                    .downcast_ref::<VulkanCommandBuffer>()
                    .map(|vb| vb.buffer)
            })
            .collect();
        let wait_semas: Vec<vk::Semaphore> = wait_semaphores
            .iter()
            .filter_map(|s| {
                s.as_any()
                    .downcast_ref::<VulkanSemaphore>()
                    .map(|vs| vs.semaphore)
            })
            .collect();
        let signal_semas: Vec<vk::Semaphore> = signal_semaphores
            .iter()
            .filter_map(|s| {
                s.as_any()
                    .downcast_ref::<VulkanSemaphore>()
                    .map(|vs| vs.semaphore)
            })
            .collect();
        // Wait at color attachment output so the swapchain image is ready
        // before we write to it.
        let wait_stages =
            vec![vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT; wait_semas.len()];
        let submit_info = vk::SubmitInfo::default()
            .command_buffers(&vk_buffers)
            .wait_semaphores(&wait_semas)
            .wait_dst_stage_mask(&wait_stages)
            .signal_semaphores(&signal_semas);
        let vk_fence = signal_fence
            .and_then(|f| f.as_any().downcast_ref::<VulkanFence>())
            .map(|f| f.fence)
            .unwrap_or(vk::Fence::null());
        if let Err(code) = unsafe {
            self.device.queue_submit(self.queue, &[submit_info], vk_fence)
        } {
            check("queue_submit", code);
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
