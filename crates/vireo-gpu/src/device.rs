//! Graphics device: instance, physical device, queue and descriptor pool.

use crate::config::RendererConfig;
use crate::descriptors::DescriptorPool;
use crate::error::{GpuError, Result};
use crate::instance::InstanceContext;
use crate::surface::Surface;
use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::ffi::{c_char, CString};

/// The one Vulkan device of the process.
///
/// Every other GPU object is created from this device and must be destroyed
/// before it. Dropping it waits for the device to go idle, then destroys the
/// descriptor pool, the logical device and the instance, in that order.
pub struct GraphicsDevice {
    device: ash::Device,
    physical_device: vk::PhysicalDevice,
    device_name: String,
    queue_family: u32,
    queue: vk::Queue,
    descriptor_pool: DescriptorPool,
    // Declared last so the instance outlives the device during drop.
    ctx: InstanceContext,
}

impl GraphicsDevice {
    /// Create the instance, the window surface, and a device that can present to it.
    ///
    /// The surface is handed back to the caller, who passes it on to the swapchain.
    /// On failure nothing created here survives.
    pub fn new<W>(config: &RendererConfig, window: &W) -> Result<(Self, Surface)>
    where
        W: HasDisplayHandle + HasWindowHandle + ?Sized,
    {
        let display = window
            .display_handle()
            .map_err(|e| GpuError::SurfaceCreation(format!("Failed to get display handle: {e}")))?
            .as_raw();

        let ctx = InstanceContext::new(config, display)?;
        let surface = Surface::from_window(&ctx, window)?;

        match unsafe { open_device(&ctx, &surface, config) } {
            Ok(opened) => {
                tracing::info!(
                    "Selected GPU: {} (queue family {})",
                    opened.device_name,
                    opened.queue_family
                );
                Ok((
                    Self {
                        device: opened.device,
                        physical_device: opened.physical_device,
                        device_name: opened.device_name,
                        queue_family: opened.queue_family,
                        queue: opened.queue,
                        descriptor_pool: opened.descriptor_pool,
                        ctx,
                    },
                    surface,
                ))
            }
            Err(e) => {
                // SAFETY: nothing was created from the surface yet.
                unsafe { surface.destroy() };
                Err(e)
            }
        }
    }

    /// Get the Vulkan instance handle.
    pub fn instance(&self) -> &ash::Instance {
        self.ctx.instance()
    }

    /// Get the loader entry.
    pub fn entry(&self) -> &ash::Entry {
        self.ctx.entry()
    }

    /// Get the Vulkan device handle.
    pub fn device(&self) -> &ash::Device {
        &self.device
    }

    /// Get the physical device handle.
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    /// Human-readable name of the selected GPU.
    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// Get the graphics/present queue family index.
    pub fn queue_family(&self) -> u32 {
        self.queue_family
    }

    /// Get the graphics/present queue.
    pub fn queue(&self) -> vk::Queue {
        self.queue
    }

    /// Descriptor pool reserved for the UI backend.
    pub fn descriptor_pool(&self) -> &DescriptorPool {
        &self.descriptor_pool
    }

    /// Whether validation messages are being routed to the log.
    pub fn has_validation(&self) -> bool {
        self.ctx.has_validation()
    }

    /// Wait for device to be idle.
    #[cfg_attr(
        feature = "profiling-tracy",
        tracing::instrument(level = "trace", skip_all)
    )]
    pub fn wait_idle(&self) -> Result<()> {
        unsafe {
            self.device.device_wait_idle()?;
        }
        Ok(())
    }
}

impl Drop for GraphicsDevice {
    fn drop(&mut self) {
        unsafe {
            if let Err(e) = self.device.device_wait_idle() {
                tracing::error!("device_wait_idle failed during shutdown: {e}");
            }
            self.descriptor_pool.destroy(&self.device);
            self.device.destroy_device(None);
        }
        tracing::info!("Graphics device destroyed");
    }
}

struct OpenedDevice {
    physical_device: vk::PhysicalDevice,
    device_name: String,
    queue_family: u32,
    device: ash::Device,
    queue: vk::Queue,
    descriptor_pool: DescriptorPool,
}

/// Pick a physical device, create the logical device with one queue, and the descriptor pool.
unsafe fn open_device(
    ctx: &InstanceContext,
    surface: &Surface,
    config: &RendererConfig,
) -> Result<OpenedDevice> {
    let instance = ctx.instance();
    let candidate = unsafe { select_physical_device(instance, surface, config)? };

    let mut extensions: Vec<CString> = config
        .required_extensions()
        .iter()
        .map(|name| {
            CString::new(name.as_str())
                .map_err(|_| GpuError::InvalidConfig(format!("bad extension name {name:?}")))
        })
        .collect::<Result<_>>()?;
    if candidate.has_portability_subset {
        extensions.push(ash::khr::portability_subset::NAME.to_owned());
    }
    let extension_names: Vec<*const c_char> = extensions.iter().map(|e| e.as_ptr()).collect();

    let queue_priority = [1.0_f32];
    let queue_create_infos = [vk::DeviceQueueCreateInfo::default()
        .queue_family_index(candidate.queue_family)
        .queue_priorities(&queue_priority)];

    let device_create_info = vk::DeviceCreateInfo::default()
        .queue_create_infos(&queue_create_infos)
        .enabled_extension_names(&extension_names);

    let device = unsafe {
        instance.create_device(candidate.physical_device, &device_create_info, None)?
    };
    let queue = unsafe { device.get_device_queue(candidate.queue_family, 0) };

    let descriptor_pool =
        match unsafe { DescriptorPool::for_image_samplers(&device, config.image_sampler_pool_size()) } {
            Ok(pool) => pool,
            Err(e) => {
                unsafe { device.destroy_device(None) };
                return Err(e);
            }
        };

    Ok(OpenedDevice {
        physical_device: candidate.physical_device,
        device_name: candidate.device_name,
        queue_family: candidate.queue_family,
        device,
        queue,
        descriptor_pool,
    })
}

struct Candidate {
    physical_device: vk::PhysicalDevice,
    device_name: String,
    queue_family: u32,
    score: u32,
    has_portability_subset: bool,
}

/// Select the best physical device that can present to `surface`.
unsafe fn select_physical_device(
    instance: &ash::Instance,
    surface: &Surface,
    config: &RendererConfig,
) -> Result<Candidate> {
    let devices = unsafe { instance.enumerate_physical_devices()? };

    if devices.is_empty() {
        tracing::error!("No Vulkan physical devices found");
        return Err(GpuError::NoSuitableDevice);
    }

    let mut best: Option<Candidate> = None;
    let mut rejection = GpuError::NoSuitableDevice;

    for physical_device in devices {
        let properties = unsafe { instance.get_physical_device_properties(physical_device) };
        let device_name = properties
            .device_name_as_c_str()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "<unnamed>".to_string());

        let available = unsafe {
            instance
                .enumerate_device_extension_properties(physical_device)
                .unwrap_or_default()
        };
        let has_extension = |name: &[u8]| {
            available.iter().any(|props| {
                props
                    .extension_name_as_c_str()
                    .is_ok_and(|n| n.to_bytes() == name)
            })
        };

        if let Some(missing) = config
            .required_extensions()
            .iter()
            .find(|name| !has_extension(name.as_bytes()))
        {
            tracing::debug!("Skipping {device_name}: missing {missing}");
            rejection = GpuError::ExtensionNotSupported(missing.clone());
            continue;
        }

        let families =
            unsafe { instance.get_physical_device_queue_family_properties(physical_device) };
        let queue_family = match select_queue_family(&families, |index| {
            surface.supports_present(physical_device, index)
        }) {
            Ok(index) => index,
            Err(e) => {
                tracing::debug!("Skipping {device_name}: {e}");
                rejection = e;
                continue;
            }
        };

        let score = device_type_score(properties.device_type);
        if best.as_ref().map_or(true, |b| score > b.score) {
            best = Some(Candidate {
                physical_device,
                device_name,
                queue_family,
                score,
                has_portability_subset: has_extension(ash::khr::portability_subset::NAME.to_bytes()),
            });
        }
    }

    best.ok_or_else(|| {
        tracing::error!("No usable GPU: {rejection}");
        rejection
    })
}

/// Preference weight of a device type; discrete beats integrated beats virtual.
pub fn device_type_score(device_type: vk::PhysicalDeviceType) -> u32 {
    match device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => 1000,
        vk::PhysicalDeviceType::INTEGRATED_GPU => 100,
        vk::PhysicalDeviceType::VIRTUAL_GPU => 50,
        vk::PhysicalDeviceType::CPU => 10,
        _ => 1,
    }
}

/// First queue family supporting both graphics and presentation.
///
/// Returns [`GpuError::PresentationUnsupported`] when no family can present at
/// all, and [`GpuError::NoQueueFamily`] when presentation and graphics only
/// exist on different families.
pub fn select_queue_family(
    families: &[vk::QueueFamilyProperties],
    can_present: impl Fn(u32) -> bool,
) -> Result<u32> {
    let mut any_present = false;
    for (index, family) in families.iter().enumerate() {
        let index = index as u32;
        if family.queue_count == 0 || !can_present(index) {
            continue;
        }
        any_present = true;
        if family.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
            return Ok(index);
        }
    }

    if any_present {
        Err(GpuError::NoQueueFamily)
    } else {
        Err(GpuError::PresentationUnsupported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(flags: vk::QueueFlags) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: 1,
            ..Default::default()
        }
    }

    #[test]
    fn picks_first_graphics_family_that_presents() {
        let families = [
            family(vk::QueueFlags::TRANSFER),
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE),
            family(vk::QueueFlags::GRAPHICS),
        ];
        assert_eq!(select_queue_family(&families, |_| true).unwrap(), 1);
        assert_eq!(select_queue_family(&families, |i| i == 2).unwrap(), 2);
    }

    #[test]
    fn reports_missing_presentation() {
        let families = [family(vk::QueueFlags::GRAPHICS)];
        let err = select_queue_family(&families, |_| false).unwrap_err();
        assert!(matches!(err, GpuError::PresentationUnsupported));
    }

    #[test]
    fn reports_split_graphics_and_present() {
        let families = [
            family(vk::QueueFlags::GRAPHICS),
            family(vk::QueueFlags::COMPUTE),
        ];
        let err = select_queue_family(&families, |i| i == 1).unwrap_err();
        assert!(matches!(err, GpuError::NoQueueFamily));
    }

    #[test]
    fn empty_families_are_skipped() {
        let mut empty = family(vk::QueueFlags::GRAPHICS);
        empty.queue_count = 0;
        let families = [empty, family(vk::QueueFlags::GRAPHICS)];
        assert_eq!(select_queue_family(&families, |_| true).unwrap(), 1);
    }

    #[test]
    fn discrete_gpus_score_highest() {
        let discrete = device_type_score(vk::PhysicalDeviceType::DISCRETE_GPU);
        let integrated = device_type_score(vk::PhysicalDeviceType::INTEGRATED_GPU);
        let virtual_gpu = device_type_score(vk::PhysicalDeviceType::VIRTUAL_GPU);
        assert!(discrete > integrated);
        assert!(integrated > virtual_gpu);
    }
}
