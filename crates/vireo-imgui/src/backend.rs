//! Dear ImGui context and Vulkan renderer driven by the layer.

use std::path::PathBuf;
use std::time::Instant;

use ash::vk;
use imgui::{ConfigFlags, Context, FontSource, OwnedDrawData};
use imgui_rs_vulkan_renderer::{Options, Renderer};
use vireo_gpu::{GpuError, RenderTargetInfo, Result};
use vireo_ui::{DrawPayload, ImmediateUi};

/// One frame of ImGui draw lists, copied out of the context.
pub struct ImguiPayload {
    draw_data: OwnedDrawData,
}

impl DrawPayload for ImguiPayload {
    fn display_size(&self) -> [f32; 2] {
        self.draw_data
            .draw_data()
            .map_or([0.0, 0.0], |data| data.display_size)
    }
}

/// Dear ImGui with the ash renderer, set up on a layer's render target.
///
/// Styled dark with keyboard navigation on. Per-frame vertex buffers are
/// sized to the swapchain image count and reallocated when a rebuild changes it.
pub struct ImguiUi {
    renderer: Renderer,
    context: Context,
    target: RenderTargetInfo,
    // Used for font uploads whenever the renderer is created.
    command_pool: vk::CommandPool,
    image_count: usize,
    last_frame: Instant,
    frame_open: bool,
}

impl ImguiUi {
    /// Create the context and the renderer for `target`.
    pub fn new(target: &RenderTargetInfo) -> Result<Self> {
        let mut context = Context::create();
        context.set_ini_filename(None::<PathBuf>);
        context.io_mut().config_flags |= ConfigFlags::NAV_ENABLE_KEYBOARD;
        context.style_mut().use_dark_colors();
        context
            .fonts()
            .add_font(&[FontSource::DefaultFontData { config: None }]);

        let pool_info = vk::CommandPoolCreateInfo::default()
            .flags(vk::CommandPoolCreateFlags::TRANSIENT)
            .queue_family_index(target.queue_family);
        // SAFETY: the device outlives the backend and the pool is destroyed in `Drop`.
        let command_pool = unsafe { target.device.create_command_pool(&pool_info, None)? };

        let renderer = match create_renderer(target, command_pool, &mut context, target.image_count)
        {
            Ok(renderer) => renderer,
            Err(e) => {
                // SAFETY: the pool was created above and nothing was allocated from it.
                unsafe { target.device.destroy_command_pool(command_pool, None) };
                return Err(e);
            }
        };

        tracing::info!(
            "ImGui backend ready: {} frames in flight (min {} images)",
            target.image_count,
            target.min_image_count
        );

        Ok(Self {
            renderer,
            context,
            target: target.clone(),
            command_pool,
            image_count: target.image_count,
            last_frame: Instant::now(),
            frame_open: false,
        })
    }

    /// Build this frame's windows.
    ///
    /// Call once per frame, between the layer's `begin_frame` and
    /// `end_frame`. A second call in the same frame is ignored.
    pub fn build<R>(&mut self, f: impl FnOnce(&imgui::Ui) -> R) -> Option<R> {
        if self.frame_open {
            tracing::warn!("ImGui frame already built this frame, extra build ignored");
            return None;
        }
        self.frame_open = true;
        Some(f(self.context.new_frame()))
    }

    /// The ImGui context, for settings not covered here.
    pub fn context_mut(&mut self) -> &mut Context {
        &mut self.context
    }

    /// Number of frames the renderer keeps vertex buffers for.
    pub fn image_count(&self) -> usize {
        self.image_count
    }

    pub(crate) fn io_mut(&mut self) -> &mut imgui::Io {
        self.context.io_mut()
    }
}

impl ImmediateUi for ImguiUi {
    type Payload = ImguiPayload;

    fn new_frame(&mut self, display_size: [f32; 2]) {
        let now = Instant::now();
        let io = self.context.io_mut();
        io.update_delta_time(now - self.last_frame);
        io.display_size = display_size;
        self.last_frame = now;
    }

    fn render(&mut self) -> ImguiPayload {
        if !self.frame_open {
            self.context.new_frame();
        }
        self.frame_open = false;
        ImguiPayload {
            draw_data: OwnedDrawData::from(self.context.render()),
        }
    }

    fn record(&mut self, payload: &ImguiPayload, command_buffer: vk::CommandBuffer) -> Result<()> {
        let Some(draw_data) = payload.draw_data.draw_data() else {
            return Ok(());
        };
        self.renderer
            .cmd_draw(command_buffer, draw_data)
            .map_err(|e| GpuError::Other(format!("ImGui draw: {e}")))
    }

    fn wants_capture_mouse(&self) -> bool {
        self.context.io().want_capture_mouse
    }

    fn wants_capture_keyboard(&self) -> bool {
        self.context.io().want_capture_keyboard
    }

    fn on_rebuild(&mut self, image_count: usize) {
        if image_count == self.image_count {
            return;
        }
        // The layer rebuilds with the device idle, so the old buffers are free.
        match create_renderer(&self.target, self.command_pool, &mut self.context, image_count) {
            Ok(renderer) => {
                self.renderer = renderer;
                self.image_count = image_count;
                tracing::debug!("ImGui renderer recreated for {image_count} images");
            }
            Err(e) => {
                tracing::error!("Keeping ImGui renderer for {} images: {e}", self.image_count);
            }
        }
    }
}

impl Drop for ImguiUi {
    fn drop(&mut self) {
        // SAFETY: the layer waits for the device before dropping its UI, and the
        // renderer only used the pool during creation.
        unsafe {
            self.target
                .device
                .destroy_command_pool(self.command_pool, None);
        }
    }
}

fn create_renderer(
    target: &RenderTargetInfo,
    command_pool: vk::CommandPool,
    context: &mut Context,
    in_flight_frames: usize,
) -> Result<Renderer> {
    Renderer::with_default_allocator(
        &target.instance,
        target.physical_device,
        target.device.clone(),
        target.queue,
        command_pool,
        target.render_pass,
        context,
        Some(Options {
            in_flight_frames: in_flight_frames.max(1),
            ..Default::default()
        }),
    )
    .map_err(|e| GpuError::Other(format!("ImGui renderer: {e}")))
}
