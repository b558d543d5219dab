//! The GPU side of one frame, behind a trait.
//!
//! [`FrameTarget`] is the narrow set of operations the frame loop needs:
//! acquire, wait, record, submit, present and rebuild. [`VulkanTarget`] drives
//! a real device; the frame loop itself never touches Vulkan handles.

use crate::config::RendererConfig;
use crate::device::GraphicsDevice;
use crate::error::{GpuError, Result, SurfaceStatus};
use crate::swapchain::SwapchainManager;
use crate::sync::FrameSlotRing;
use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

/// Outcome of asking the swapchain for an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquire {
    /// An image was acquired; `slot` indexes both the image and its frame slot.
    Image {
        /// Image index handed out by the swapchain.
        slot: u32,
        /// `Suboptimal` still yields a usable image.
        status: SurfaceStatus,
    },
    /// No image was acquired; the swapchain must be rebuilt first.
    OutOfDate,
}

/// Presentable render target driven once per frame.
///
/// Slots are swapchain image indices; semaphore indices walk an independent
/// ring of the same length. Implementations must keep [`FrameTarget::slot_count`]
/// equal to the number of images after every rebuild.
pub trait FrameTarget {
    /// Current swapchain extent.
    fn extent(&self) -> vk::Extent2D;

    /// Number of frame slots, equal to the swapchain image count.
    fn slot_count(&self) -> usize;

    /// Clear value the render pass starts from.
    fn clear_value(&self) -> vk::ClearValue;

    /// Wait for the device to go idle, then replace the swapchain and its slots.
    fn rebuild(&mut self, width: u32, height: u32) -> Result<()>;

    /// Acquire the next image, signalling the semaphore at `semaphore_index`.
    fn acquire(&mut self, semaphore_index: usize) -> Result<Acquire>;

    /// Block until `slot`'s previous submission is done, then reset its fence and command pool.
    fn wait_and_reset(&mut self, slot: u32) -> Result<()>;

    /// Begin `slot`'s command buffer and its render pass, returning the buffer to record into.
    fn begin_commands(&mut self, slot: u32, clear: vk::ClearValue) -> Result<vk::CommandBuffer>;

    /// End the render pass and the command buffer.
    fn end_commands(&mut self, slot: u32) -> Result<()>;

    /// Submit `slot`'s commands, waiting on image-acquired and signalling
    /// render-complete and the slot's fence.
    fn submit(&mut self, slot: u32, semaphore_index: usize) -> Result<()>;

    /// Present `slot` once render-complete at `semaphore_index` is signaled.
    fn present(&mut self, slot: u32, semaphore_index: usize) -> Result<SurfaceStatus>;

    /// Block until all submitted work has finished.
    fn wait_idle(&mut self) -> Result<()>;
}

/// Everything a UI rendering backend needs to initialize against the target.
#[derive(Clone)]
pub struct RenderTargetInfo {
    /// Vulkan instance.
    pub instance: ash::Instance,
    /// Selected physical device.
    pub physical_device: vk::PhysicalDevice,
    /// Logical device.
    pub device: ash::Device,
    /// Queue family of `queue`.
    pub queue_family: u32,
    /// Graphics and present queue.
    pub queue: vk::Queue,
    /// Pool reserved for the backend's descriptor sets.
    pub descriptor_pool: vk::DescriptorPool,
    /// Render pass the backend's pipeline must be compatible with.
    pub render_pass: vk::RenderPass,
    /// Configured minimum image count.
    pub min_image_count: u32,
    /// Actual swapchain image count.
    pub image_count: usize,
}

/// [`FrameTarget`] backed by a window surface on a real device.
///
/// Dropping it waits for the device to go idle and tears everything down in
/// reverse creation order: frame slots, swapchain and surface, then the device.
pub struct VulkanTarget {
    ring: FrameSlotRing,
    swapchain: SwapchainManager,
    device: GraphicsDevice,
}

impl VulkanTarget {
    /// Bring up a device, swapchain and frame slots for `window` at `width` x `height`.
    pub fn new<W>(config: &RendererConfig, window: &W, width: u32, height: u32) -> Result<Self>
    where
        W: HasDisplayHandle + HasWindowHandle + ?Sized,
    {
        let (device, surface) = GraphicsDevice::new(config, window)?;
        let swapchain = SwapchainManager::create(&device, surface, config, width, height)?;

        let ring = match unsafe {
            FrameSlotRing::new(device.device(), device.queue_family(), swapchain.image_count())
        } {
            Ok(ring) => ring,
            Err(e) => {
                unsafe { swapchain.destroy(device.device()) };
                return Err(e);
            }
        };

        Ok(Self {
            ring,
            swapchain,
            device,
        })
    }

    /// The device this target renders with.
    pub fn device(&self) -> &GraphicsDevice {
        &self.device
    }

    /// The swapchain this target presents to.
    pub fn swapchain(&self) -> &SwapchainManager {
        &self.swapchain
    }

    /// Handles for initializing a UI rendering backend.
    pub fn render_target_info(&self) -> RenderTargetInfo {
        RenderTargetInfo {
            instance: self.device.instance().clone(),
            physical_device: self.device.physical_device(),
            device: self.device.device().clone(),
            queue_family: self.device.queue_family(),
            queue: self.device.queue(),
            descriptor_pool: self.device.descriptor_pool().handle(),
            render_pass: self.swapchain.render_pass(),
            min_image_count: self.swapchain.min_image_count(),
            image_count: self.swapchain.image_count(),
        }
    }

    fn slot(&self, slot: u32) -> Result<&crate::sync::FrameSlot> {
        self.ring
            .slot(slot)
            .ok_or_else(|| GpuError::Other(format!("frame slot {slot} out of range")))
    }

    fn semaphores(&self, index: usize) -> Result<&crate::sync::FrameSemaphores> {
        self.ring
            .semaphores(index)
            .ok_or_else(|| GpuError::Other(format!("semaphore index {index} out of range")))
    }
}

impl FrameTarget for VulkanTarget {
    fn extent(&self) -> vk::Extent2D {
        self.swapchain.extent()
    }

    fn slot_count(&self) -> usize {
        self.ring.len()
    }

    fn clear_value(&self) -> vk::ClearValue {
        self.swapchain.clear_value()
    }

    fn rebuild(&mut self, width: u32, height: u32) -> Result<()> {
        self.device.wait_idle()?;
        let device = self.device.device();

        let old_ring = std::mem::take(&mut self.ring);
        unsafe { old_ring.destroy(device) };

        self.swapchain.rebuild(device, width, height)?;
        self.ring = unsafe {
            FrameSlotRing::new(device, self.device.queue_family(), self.swapchain.image_count())?
        };
        Ok(())
    }

    fn acquire(&mut self, semaphore_index: usize) -> Result<Acquire> {
        self.semaphores(semaphore_index)?;
        unsafe { self.ring.acquire(&self.swapchain, semaphore_index) }
    }

    fn wait_and_reset(&mut self, slot: u32) -> Result<()> {
        self.slot(slot)?;
        unsafe { self.ring.wait_and_reset(self.device.device(), slot) }
    }

    fn begin_commands(&mut self, slot: u32, clear: vk::ClearValue) -> Result<vk::CommandBuffer> {
        let command_buffer = self.slot(slot)?.command_buffer;
        let framebuffer = self
            .swapchain
            .framebuffer(slot as usize)
            .ok_or_else(|| GpuError::Other(format!("no framebuffer for image {slot}")))?;
        let device = self.device.device();

        let begin_info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        let clear_values = [clear];
        let render_pass_info = vk::RenderPassBeginInfo::default()
            .render_pass(self.swapchain.render_pass())
            .framebuffer(framebuffer)
            .render_area(vk::Rect2D {
                offset: vk::Offset2D::default(),
                extent: self.swapchain.extent(),
            })
            .clear_values(&clear_values);

        unsafe {
            device.begin_command_buffer(command_buffer, &begin_info)?;
            device.cmd_begin_render_pass(
                command_buffer,
                &render_pass_info,
                vk::SubpassContents::INLINE,
            );
        }
        Ok(command_buffer)
    }

    fn end_commands(&mut self, slot: u32) -> Result<()> {
        let command_buffer = self.slot(slot)?.command_buffer;
        let device = self.device.device();
        unsafe {
            device.cmd_end_render_pass(command_buffer);
            device.end_command_buffer(command_buffer)?;
        }
        Ok(())
    }

    #[cfg_attr(
        feature = "profiling-tracy",
        tracing::instrument(level = "trace", skip_all)
    )]
    fn submit(&mut self, slot: u32, semaphore_index: usize) -> Result<()> {
        let frame = self.slot(slot)?;
        let semaphores = self.semaphores(semaphore_index)?;

        let wait_semaphores = [semaphores.image_acquired];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [frame.command_buffer];
        let signal_semaphores = [semaphores.render_complete];

        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        unsafe {
            self.device
                .device()
                .queue_submit(self.device.queue(), &[submit_info], frame.fence)?;
        }
        Ok(())
    }

    fn present(&mut self, slot: u32, semaphore_index: usize) -> Result<SurfaceStatus> {
        let wait = self.semaphores(semaphore_index)?.render_complete;
        let result = unsafe { self.swapchain.queue_present(self.device.queue(), slot, wait) };
        SurfaceStatus::classify(result)
    }

    fn wait_idle(&mut self) -> Result<()> {
        self.device.wait_idle()
    }
}

impl Drop for VulkanTarget {
    fn drop(&mut self) {
        if let Err(e) = self.device.wait_idle() {
            tracing::error!("device_wait_idle failed before teardown: {e}");
        }
        let device = self.device.device();
        unsafe {
            self.ring.destroy(device);
            self.swapchain.destroy(device);
        }
        tracing::info!("Render target destroyed");
    }
}
