//! Swapchain management.
//!
//! [`SwapchainManager`] owns the surface, the swapchain, its image views and
//! framebuffers, and the render pass the UI is drawn with. Rebuilding replaces
//! the swapchain in place, handing the old one to the driver as
//! `old_swapchain` before destroying it.

use crate::config::RendererConfig;
use crate::device::GraphicsDevice;
use crate::error::{GpuError, Result};
use crate::surface::Surface;
use ash::vk;

/// Surface, swapchain and render-target description.
pub struct SwapchainManager {
    surface: Surface,
    loader: ash::khr::swapchain::Device,
    physical_device: vk::PhysicalDevice,
    swapchain: vk::SwapchainKHR,
    surface_format: vk::SurfaceFormatKHR,
    present_mode: vk::PresentModeKHR,
    min_image_count: u32,
    extent: vk::Extent2D,
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
    framebuffers: Vec<vk::Framebuffer>,
    render_pass: vk::RenderPass,
    clear_value: vk::ClearValue,
}

impl SwapchainManager {
    /// Create the swapchain for `surface` at `width` x `height`.
    ///
    /// Takes ownership of the surface. Fails with
    /// [`GpuError::PresentationUnsupported`] if the device's queue cannot present
    /// to it; the surface is destroyed on every failure path.
    pub fn create(
        device: &GraphicsDevice,
        surface: Surface,
        config: &RendererConfig,
        width: u32,
        height: u32,
    ) -> Result<Self> {
        if !surface.supports_present(device.physical_device(), device.queue_family()) {
            tracing::error!(
                "Queue family {} cannot present to the window surface",
                device.queue_family()
            );
            // SAFETY: no swapchain references the surface yet.
            unsafe { surface.destroy() };
            return Err(GpuError::PresentationUnsupported);
        }

        match unsafe { Self::build(device, &surface, config, width, height) } {
            Ok(parts) => Ok(Self {
                surface,
                loader: parts.loader,
                physical_device: device.physical_device(),
                swapchain: parts.swapchain,
                surface_format: parts.surface_format,
                present_mode: parts.present_mode,
                min_image_count: config.min_image_count(),
                extent: parts.extent,
                images: parts.images,
                image_views: parts.image_views,
                framebuffers: parts.framebuffers,
                render_pass: parts.render_pass,
                clear_value: clear_value(config.clear_color()),
            }),
            Err(e) => {
                unsafe { surface.destroy() };
                Err(e)
            }
        }
    }

    unsafe fn build(
        device: &GraphicsDevice,
        surface: &Surface,
        config: &RendererConfig,
        width: u32,
        height: u32,
    ) -> Result<Parts> {
        let caps = surface.capabilities(device.physical_device())?;

        let surface_format = select_surface_format(
            &caps.formats,
            config.preferred_formats(),
            config.preferred_color_space(),
        )
        .ok_or_else(|| GpuError::SwapchainCreation("surface reports no formats".to_string()))?;
        let present_mode = select_present_mode(&caps.present_modes, config.preferred_present_modes());
        tracing::debug!(
            format = ?surface_format.format,
            color_space = ?surface_format.color_space,
            ?present_mode,
            "Surface format selected"
        );

        let render_pass = unsafe { create_render_pass(device.device(), surface_format.format)? };
        let loader = ash::khr::swapchain::Device::new(device.instance(), device.device());

        let mut parts = Parts {
            loader,
            swapchain: vk::SwapchainKHR::null(),
            surface_format,
            present_mode,
            extent: vk::Extent2D::default(),
            images: Vec::new(),
            image_views: Vec::new(),
            framebuffers: Vec::new(),
            render_pass,
        };

        let chain = Chain {
            surface: surface.handle(),
            surface_format,
            present_mode,
            min_image_count: config.min_image_count(),
            render_pass,
        };
        if let Err(e) = unsafe {
            chain.replace(device.device(), &mut parts, &caps.capabilities, width, height)
        } {
            unsafe { device.device().destroy_render_pass(render_pass, None) };
            return Err(e);
        }

        tracing::info!(
            "Swapchain created: {}x{}, {} images",
            parts.extent.width,
            parts.extent.height,
            parts.images.len()
        );
        Ok(parts)
    }

    /// Replace the swapchain with one sized for `width` x `height`.
    ///
    /// Safe to call repeatedly with the same size. The caller must have waited
    /// for the device to go idle; every framebuffer and image view of the old
    /// swapchain is destroyed here.
    #[cfg_attr(
        feature = "profiling-tracy",
        tracing::instrument(level = "trace", skip_all)
    )]
    pub fn rebuild(&mut self, device: &ash::Device, width: u32, height: u32) -> Result<()> {
        let limits = self.surface.limits(self.physical_device)?;

        let chain = Chain {
            surface: self.surface.handle(),
            surface_format: self.surface_format,
            present_mode: self.present_mode,
            min_image_count: self.min_image_count,
            render_pass: self.render_pass,
        };
        let mut parts = Parts {
            loader: self.loader.clone(),
            swapchain: self.swapchain,
            surface_format: self.surface_format,
            present_mode: self.present_mode,
            extent: self.extent,
            images: std::mem::take(&mut self.images),
            image_views: std::mem::take(&mut self.image_views),
            framebuffers: std::mem::take(&mut self.framebuffers),
            render_pass: self.render_pass,
        };

        let result = unsafe { chain.replace(device, &mut parts, &limits, width, height) };

        self.swapchain = parts.swapchain;
        self.extent = parts.extent;
        self.images = parts.images;
        self.image_views = parts.image_views;
        self.framebuffers = parts.framebuffers;
        result?;

        tracing::info!(
            "Swapchain rebuilt: {}x{}, {} images",
            self.extent.width,
            self.extent.height,
            self.images.len()
        );
        Ok(())
    }

    /// Acquire the next presentable image, signalling `semaphore` when it is ready.
    ///
    /// # Safety
    /// The semaphore must be unsignaled with no pending wait.
    #[cfg_attr(
        feature = "profiling-tracy",
        tracing::instrument(level = "trace", skip_all)
    )]
    pub unsafe fn acquire_next_image(
        &self,
        semaphore: vk::Semaphore,
    ) -> std::result::Result<(u32, bool), vk::Result> {
        unsafe {
            self.loader
                .acquire_next_image(self.swapchain, u64::MAX, semaphore, vk::Fence::null())
        }
    }

    /// Queue `image_index` for presentation once `wait` is signaled.
    ///
    /// # Safety
    /// `queue` must belong to the device the swapchain was created on.
    #[cfg_attr(
        feature = "profiling-tracy",
        tracing::instrument(level = "trace", skip_all)
    )]
    pub unsafe fn queue_present(
        &self,
        queue: vk::Queue,
        image_index: u32,
        wait: vk::Semaphore,
    ) -> std::result::Result<bool, vk::Result> {
        let wait_semaphores = [wait];
        let swapchains = [self.swapchain];
        let image_indices = [image_index];

        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        unsafe { self.loader.queue_present(queue, &present_info) }
    }

    /// Current swapchain extent.
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Number of images in the swapchain.
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// Configured minimum image count.
    pub fn min_image_count(&self) -> u32 {
        self.min_image_count
    }

    /// Framebuffer wrapping image `index`.
    pub fn framebuffer(&self, index: usize) -> Option<vk::Framebuffer> {
        self.framebuffers.get(index).copied()
    }

    /// Render pass the UI is recorded into.
    pub fn render_pass(&self) -> vk::RenderPass {
        self.render_pass
    }

    /// Clear value applied at the start of the render pass.
    pub fn clear_value(&self) -> vk::ClearValue {
        self.clear_value
    }

    /// Chosen surface format.
    pub fn surface_format(&self) -> vk::SurfaceFormatKHR {
        self.surface_format
    }

    /// Chosen present mode.
    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.present_mode
    }

    /// Raw swapchain handle.
    pub fn handle(&self) -> vk::SwapchainKHR {
        self.swapchain
    }

    /// Destroy the swapchain, the render pass and the surface.
    ///
    /// # Safety
    /// The device must be idle and must be the one the swapchain was created on.
    pub unsafe fn destroy(&self, device: &ash::Device) {
        unsafe {
            destroy_targets(device, &self.framebuffers, &self.image_views);
            self.loader.destroy_swapchain(self.swapchain, None);
            device.destroy_render_pass(self.render_pass, None);
            self.surface.destroy();
        }
        tracing::debug!("Swapchain destroyed");
    }
}

struct Parts {
    loader: ash::khr::swapchain::Device,
    swapchain: vk::SwapchainKHR,
    surface_format: vk::SurfaceFormatKHR,
    present_mode: vk::PresentModeKHR,
    extent: vk::Extent2D,
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
    framebuffers: Vec<vk::Framebuffer>,
    render_pass: vk::RenderPass,
}

/// Settings that stay fixed across rebuilds.
struct Chain {
    surface: vk::SurfaceKHR,
    surface_format: vk::SurfaceFormatKHR,
    present_mode: vk::PresentModeKHR,
    min_image_count: u32,
    render_pass: vk::RenderPass,
}

impl Chain {
    /// Create a new swapchain, retire the one in `parts`, and rebuild views and framebuffers.
    unsafe fn replace(
        &self,
        device: &ash::Device,
        parts: &mut Parts,
        limits: &vk::SurfaceCapabilitiesKHR,
        width: u32,
        height: u32,
    ) -> Result<()> {
        let extent = calculate_extent(limits, width, height);
        let image_count = clamp_image_count(self.min_image_count, limits);
        let old_swapchain = parts.swapchain;

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(self.surface)
            .min_image_count(image_count)
            .image_format(self.surface_format.format)
            .image_color_space(self.surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(limits.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(self.present_mode)
            .clipped(true)
            .old_swapchain(old_swapchain);

        let swapchain = unsafe { parts.loader.create_swapchain(&create_info, None) }
            .map_err(|e| GpuError::SwapchainCreation(e.to_string()))?;

        unsafe {
            destroy_targets(device, &parts.framebuffers, &parts.image_views);
            if old_swapchain != vk::SwapchainKHR::null() {
                parts.loader.destroy_swapchain(old_swapchain, None);
            }
        }
        parts.framebuffers.clear();
        parts.image_views.clear();
        parts.swapchain = swapchain;
        parts.extent = extent;

        parts.images = unsafe { parts.loader.get_swapchain_images(swapchain)? };

        for &image in &parts.images {
            let view_info = vk::ImageViewCreateInfo::default()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(self.surface_format.format)
                .components(vk::ComponentMapping::default())
                .subresource_range(
                    vk::ImageSubresourceRange::default()
                        .aspect_mask(vk::ImageAspectFlags::COLOR)
                        .level_count(1)
                        .layer_count(1),
                );
            let view = unsafe { device.create_image_view(&view_info, None)? };
            parts.image_views.push(view);

            let attachments = [view];
            let framebuffer_info = vk::FramebufferCreateInfo::default()
                .render_pass(self.render_pass)
                .attachments(&attachments)
                .width(extent.width)
                .height(extent.height)
                .layers(1);
            let framebuffer = unsafe { device.create_framebuffer(&framebuffer_info, None)? };
            parts.framebuffers.push(framebuffer);
        }

        Ok(())
    }
}

unsafe fn destroy_targets(
    device: &ash::Device,
    framebuffers: &[vk::Framebuffer],
    image_views: &[vk::ImageView],
) {
    unsafe {
        for &framebuffer in framebuffers {
            device.destroy_framebuffer(framebuffer, None);
        }
        for &view in image_views {
            device.destroy_image_view(view, None);
        }
    }
}

/// Single-subpass color pass: clear on load, leave the image ready to present.
unsafe fn create_render_pass(device: &ash::Device, format: vk::Format) -> Result<vk::RenderPass> {
    let attachments = [vk::AttachmentDescription::default()
        .format(format)
        .samples(vk::SampleCountFlags::TYPE_1)
        .load_op(vk::AttachmentLoadOp::CLEAR)
        .store_op(vk::AttachmentStoreOp::STORE)
        .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
        .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .final_layout(vk::ImageLayout::PRESENT_SRC_KHR)];

    let color_refs = [vk::AttachmentReference::default()
        .attachment(0)
        .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)];

    let subpasses = [vk::SubpassDescription::default()
        .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
        .color_attachments(&color_refs)];

    let dependencies = [vk::SubpassDependency::default()
        .src_subpass(vk::SUBPASS_EXTERNAL)
        .dst_subpass(0)
        .src_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
        .dst_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
        .src_access_mask(vk::AccessFlags::empty())
        .dst_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE)];

    let create_info = vk::RenderPassCreateInfo::default()
        .attachments(&attachments)
        .subpasses(&subpasses)
        .dependencies(&dependencies);

    Ok(unsafe { device.create_render_pass(&create_info, None)? })
}

fn clear_value(color: [f32; 4]) -> vk::ClearValue {
    vk::ClearValue {
        color: vk::ClearColorValue { float32: color },
    }
}

/// Select the surface format.
///
/// A lone `UNDEFINED` entry means the surface accepts anything, so the first
/// preferred format is used. Otherwise the first preferred format available in
/// `color_space` wins, falling back to the first available format. Returns
/// `None` only when `available` is empty.
pub fn select_surface_format(
    available: &[vk::SurfaceFormatKHR],
    preferred: &[vk::Format],
    color_space: vk::ColorSpaceKHR,
) -> Option<vk::SurfaceFormatKHR> {
    if let [only] = available {
        if only.format == vk::Format::UNDEFINED {
            return Some(vk::SurfaceFormatKHR {
                format: preferred.first().copied().unwrap_or(vk::Format::B8G8R8A8_UNORM),
                color_space,
            });
        }
    }

    preferred
        .iter()
        .find_map(|&format| {
            available
                .iter()
                .find(|f| f.format == format && f.color_space == color_space)
                .copied()
        })
        .or_else(|| available.first().copied())
}

/// Select the first preferred present mode the surface supports, else FIFO.
pub fn select_present_mode(
    available: &[vk::PresentModeKHR],
    preferred: &[vk::PresentModeKHR],
) -> vk::PresentModeKHR {
    preferred
        .iter()
        .copied()
        .find(|mode| available.contains(mode))
        .unwrap_or(vk::PresentModeKHR::FIFO)
}

/// Clamp the requested image count to the surface limits; a maximum of 0 means unbounded.
pub fn clamp_image_count(requested: u32, capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    if requested < capabilities.min_image_count {
        capabilities.min_image_count
    } else if capabilities.max_image_count != 0 && requested > capabilities.max_image_count {
        capabilities.max_image_count
    } else {
        requested
    }
}

/// Calculate swapchain extent.
pub fn calculate_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    desired_width: u32,
    desired_height: u32,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        capabilities.current_extent
    } else {
        vk::Extent2D {
            width: desired_width.clamp(
                capabilities.min_image_extent.width,
                capabilities.max_image_extent.width,
            ),
            height: desired_height.clamp(
                capabilities.min_image_extent.height,
                capabilities.max_image_extent.height,
            ),
        }
    }
}
