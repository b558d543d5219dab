//! Application framework for the Vireo UI layer.
//!
//! This crate handles the boilerplate around a [`vireo_ui::UiLayer`]:
//! - Logging setup
//! - Window creation
//! - GPU target and UI backend bring-up
//! - Per-frame begin/draw/end
//! - Event capture arbitration and shutdown

mod app;
mod runner;

pub use app::UiApp;
pub use runner::{run_app, AppConfig};

// Re-export commonly used types for convenience
pub use vireo_gpu::{RenderTargetInfo, RendererConfig, VulkanTarget};
pub use vireo_platform::WindowInput;
pub use vireo_ui::{FatalPolicy, ImmediateUi, LayerConfig};
pub use winit::event::WindowEvent;
