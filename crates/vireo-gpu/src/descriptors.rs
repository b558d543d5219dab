//! Descriptor pool shared with the UI backend.

use crate::error::Result;
use ash::vk;

/// Fixed-size descriptor pool the UI backend allocates its texture sets from.
pub struct DescriptorPool {
    pool: vk::DescriptorPool,
    max_sets: u32,
}

impl DescriptorPool {
    /// Create a pool of `image_samplers` combined image sampler descriptors,
    /// one set each.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn for_image_samplers(device: &ash::Device, image_samplers: u32) -> Result<Self> {
        let pool_sizes = [vk::DescriptorPoolSize::default()
            .ty(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            .descriptor_count(image_samplers)];
        let max_sets = pool_sizes.iter().map(|size| size.descriptor_count).sum();

        let create_info = vk::DescriptorPoolCreateInfo::default()
            .max_sets(max_sets)
            .pool_sizes(&pool_sizes)
            .flags(vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET);

        let pool = unsafe { device.create_descriptor_pool(&create_info, None)? };
        Ok(Self { pool, max_sets })
    }

    /// Get the raw pool handle.
    pub fn handle(&self) -> vk::DescriptorPool {
        self.pool
    }

    /// Number of sets the pool was sized for.
    pub fn max_sets(&self) -> u32 {
        self.max_sets
    }

    /// Destroy the pool.
    ///
    /// # Safety
    /// The device must be valid and no set from the pool may be in use.
    pub unsafe fn destroy(&self, device: &ash::Device) {
        unsafe { device.destroy_descriptor_pool(self.pool, None) };
    }
}
