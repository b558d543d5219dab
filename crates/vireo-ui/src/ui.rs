//! Contract with the immediate-mode UI library.

use vireo_gpu::vk;

/// Draw commands for one frame.
///
/// Produced by [`ImmediateUi::render`] and consumed by the same frame's
/// recording; never kept across frames.
pub trait DrawPayload {
    /// Logical size the payload was laid out for. A non-positive dimension
    /// means nothing is visible.
    fn display_size(&self) -> [f32; 2];
}

/// An immediate-mode UI library with a GPU backend.
pub trait ImmediateUi {
    /// Finalized draw data of one frame.
    type Payload: DrawPayload;

    /// Start a frame for a drawable of `display_size` pixels.
    fn new_frame(&mut self, display_size: [f32; 2]);

    /// Finish the frame and hand out its draw data.
    fn render(&mut self) -> Self::Payload;

    /// Translate `payload` into commands inside the open render pass of `command_buffer`.
    fn record(
        &mut self,
        payload: &Self::Payload,
        command_buffer: vk::CommandBuffer,
    ) -> vireo_gpu::Result<()>;

    /// Whether pointer input is currently over UI.
    fn wants_capture_mouse(&self) -> bool;

    /// Whether a UI widget has keyboard focus.
    fn wants_capture_keyboard(&self) -> bool;

    /// Called after every swapchain rebuild with the new image count.
    fn on_rebuild(&mut self, image_count: usize) {
        let _ = image_count;
    }
}
