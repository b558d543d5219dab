//! Per-frame synchronization objects.

use crate::error::{Result, SurfaceStatus};
use crate::swapchain::SwapchainManager;
use crate::target::Acquire;
use ash::vk;

/// Create a semaphore.
///
/// # Safety
/// The device must be valid.
pub unsafe fn create_semaphore(device: &ash::Device) -> Result<vk::Semaphore> {
    let create_info = vk::SemaphoreCreateInfo::default();
    Ok(unsafe { device.create_semaphore(&create_info, None)? })
}

/// Create a fence.
///
/// # Safety
/// The device must be valid.
pub unsafe fn create_fence(device: &ash::Device, signaled: bool) -> Result<vk::Fence> {
    let flags = if signaled {
        vk::FenceCreateFlags::SIGNALED
    } else {
        vk::FenceCreateFlags::empty()
    };

    let create_info = vk::FenceCreateInfo::default().flags(flags);
    Ok(unsafe { device.create_fence(&create_info, None)? })
}

/// Command recording state of one swapchain image.
pub struct FrameSlot {
    /// Signaled when the GPU has finished this slot's last submission.
    pub fence: vk::Fence,
    /// Pool owning `command_buffer`; reset as a whole every frame.
    pub command_pool: vk::CommandPool,
    /// Primary command buffer the frame is recorded into.
    pub command_buffer: vk::CommandBuffer,
}

impl FrameSlot {
    /// Create a slot. The fence starts signaled so the first wait returns at once.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn new(device: &ash::Device, queue_family: u32) -> Result<Self> {
        let pool_info = vk::CommandPoolCreateInfo::default().queue_family_index(queue_family);
        let command_pool = unsafe { device.create_command_pool(&pool_info, None)? };

        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        let command_buffer = match unsafe { device.allocate_command_buffers(&alloc_info) } {
            Ok(buffers) => buffers[0],
            Err(e) => {
                unsafe { device.destroy_command_pool(command_pool, None) };
                return Err(e.into());
            }
        };

        let fence = match unsafe { create_fence(device, true) } {
            Ok(fence) => fence,
            Err(e) => {
                unsafe { device.destroy_command_pool(command_pool, None) };
                return Err(e);
            }
        };

        Ok(Self {
            fence,
            command_pool,
            command_buffer,
        })
    }

    /// Destroy the slot.
    ///
    /// # Safety
    /// The fence must be signaled or never submitted.
    pub unsafe fn destroy(&self, device: &ash::Device) {
        unsafe {
            device.destroy_fence(self.fence, None);
            device.destroy_command_pool(self.command_pool, None);
        }
    }
}

/// Semaphore pair used by one trip around the semaphore ring.
pub struct FrameSemaphores {
    /// Signaled by the presentation engine when the acquired image is ready.
    pub image_acquired: vk::Semaphore,
    /// Signaled by the queue when rendering finishes; present waits on it.
    pub render_complete: vk::Semaphore,
}

impl FrameSemaphores {
    /// Create both semaphores.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn new(device: &ash::Device) -> Result<Self> {
        let image_acquired = unsafe { create_semaphore(device)? };
        let render_complete = match unsafe { create_semaphore(device) } {
            Ok(semaphore) => semaphore,
            Err(e) => {
                unsafe { device.destroy_semaphore(image_acquired, None) };
                return Err(e);
            }
        };
        Ok(Self {
            image_acquired,
            render_complete,
        })
    }

    /// Destroy both semaphores.
    ///
    /// # Safety
    /// Neither semaphore may have a pending wait or signal.
    pub unsafe fn destroy(&self, device: &ash::Device) {
        unsafe {
            device.destroy_semaphore(self.image_acquired, None);
            device.destroy_semaphore(self.render_complete, None);
        }
    }
}

/// One [`FrameSlot`] per swapchain image plus an equally sized semaphore ring.
///
/// Slots are indexed by the image index the swapchain hands out; semaphores by
/// a cursor that advances once per frame. The two need not agree.
#[derive(Default)]
pub struct FrameSlotRing {
    frames: Vec<FrameSlot>,
    semaphores: Vec<FrameSemaphores>,
}

impl FrameSlotRing {
    /// Create `count` slots and semaphore pairs.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn new(device: &ash::Device, queue_family: u32, count: usize) -> Result<Self> {
        let mut ring = Self {
            frames: Vec::with_capacity(count),
            semaphores: Vec::with_capacity(count),
        };

        for _ in 0..count {
            let created = unsafe { FrameSlot::new(device, queue_family) }.and_then(|slot| {
                match unsafe { FrameSemaphores::new(device) } {
                    Ok(semaphores) => Ok((slot, semaphores)),
                    Err(e) => {
                        unsafe { slot.destroy(device) };
                        Err(e)
                    }
                }
            });
            match created {
                Ok((slot, semaphores)) => {
                    ring.frames.push(slot);
                    ring.semaphores.push(semaphores);
                }
                Err(e) => {
                    unsafe { ring.destroy(device) };
                    return Err(e);
                }
            }
        }

        tracing::debug!(slots = count, "Frame slot ring created");
        Ok(ring)
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Whether the ring has no slots.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Slot for image `index`.
    pub fn slot(&self, index: u32) -> Option<&FrameSlot> {
        self.frames.get(index as usize)
    }

    /// Semaphore pair at ring position `index`.
    pub fn semaphores(&self, index: usize) -> Option<&FrameSemaphores> {
        self.semaphores.get(index)
    }

    /// Acquire the next swapchain image, signalling the image-acquired semaphore
    /// at `semaphore_index`. Blocks until an image is available.
    ///
    /// # Safety
    /// The swapchain must be the one this ring was sized for.
    #[cfg_attr(
        feature = "profiling-tracy",
        tracing::instrument(level = "trace", skip_all)
    )]
    pub unsafe fn acquire(
        &self,
        swapchain: &SwapchainManager,
        semaphore_index: usize,
    ) -> Result<Acquire> {
        let semaphore = self.semaphores[semaphore_index].image_acquired;
        let result = unsafe { swapchain.acquire_next_image(semaphore) };
        let slot = result.map(|(index, _)| index).unwrap_or_default();

        Ok(match SurfaceStatus::classify(result.map(|(_, suboptimal)| suboptimal))? {
            SurfaceStatus::OutOfDate => Acquire::OutOfDate,
            status => Acquire::Image { slot, status },
        })
    }

    /// Block until slot `index` is done on the GPU, then make it recordable again.
    ///
    /// # Safety
    /// The device must be the one the ring was created on.
    #[cfg_attr(
        feature = "profiling-tracy",
        tracing::instrument(level = "trace", skip_all)
    )]
    pub unsafe fn wait_and_reset(&self, device: &ash::Device, index: u32) -> Result<()> {
        let slot = &self.frames[index as usize];
        unsafe {
            device.wait_for_fences(&[slot.fence], true, u64::MAX)?;
            device.reset_fences(&[slot.fence])?;
            device.reset_command_pool(slot.command_pool, vk::CommandPoolResetFlags::empty())?;
        }
        Ok(())
    }

    /// Destroy every slot and semaphore.
    ///
    /// # Safety
    /// The device must be idle.
    pub unsafe fn destroy(&self, device: &ash::Device) {
        unsafe {
            for slot in &self.frames {
                slot.destroy(device);
            }
            for semaphores in &self.semaphores {
                semaphores.destroy(device);
            }
        }
    }
}
