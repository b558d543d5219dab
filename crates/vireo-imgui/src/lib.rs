//! Dear ImGui backend for the Vireo UI layer.
//!
//! [`ImguiUi`] implements [`vireo_ui::ImmediateUi`] on top of `imgui` and
//! `imgui-rs-vulkan-renderer`, initialized from a
//! [`vireo_gpu::RenderTargetInfo`], and takes winit input through
//! [`vireo_platform::WindowInput`].

mod backend;
pub mod input;

pub use backend::{ImguiPayload, ImguiUi};

/// Re-exported so applications build windows against the same version.
pub use imgui;
