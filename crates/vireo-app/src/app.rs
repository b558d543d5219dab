//! `UiApp` trait definition.

use vireo_gpu::VulkanTarget;
use vireo_platform::WindowInput;
use vireo_ui::ImmediateUi;
use winit::event::WindowEvent;

/// An application whose content is an immediate-mode UI.
///
/// The runner owns the window, the GPU target and the UI layer; the
/// application only builds its UI backend and fills each frame.
pub trait UiApp: Sized {
    /// UI library the application draws with. It receives every window event
    /// before capture is decided.
    type Ui: ImmediateUi + WindowInput;

    /// Create the application and its UI backend.
    ///
    /// Called once, after the GPU target exists. Use
    /// [`VulkanTarget::render_target_info`] to initialize the backend.
    fn init(target: &VulkanTarget) -> anyhow::Result<(Self, Self::Ui)>;

    /// Produce this frame's UI. Only called for frames that will be drawn.
    fn draw(&mut self, ui: &mut Self::Ui);

    /// Handle a window event the UI did not capture.
    ///
    /// Return `true` if the event was handled. Default implementation does
    /// nothing and returns `false`.
    #[allow(unused_variables)]
    fn on_event(&mut self, event: &WindowEvent) -> bool {
        false
    }

    /// Called once before the UI layer is detached.
    fn cleanup(&mut self) {}
}
