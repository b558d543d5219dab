//! Vulkan presentation core for the Vireo UI layer.
//!
//! This crate provides:
//! - Instance, physical device and queue selection ([`GraphicsDevice`])
//! - Surface and swapchain management with in-place rebuilds ([`SwapchainManager`])
//! - Per-frame synchronization objects ([`FrameSlotRing`])
//! - Command recording and submission ([`FrameRenderer`])
//! - Presentation and swapchain invalidation tracking ([`PresentScheduler`])
//!
//! The frame loop talks to the GPU through the [`FrameTarget`] trait. [`VulkanTarget`]
//! is the real implementation; tests substitute a scripted one.

pub mod config;
pub mod descriptors;
pub mod device;
pub mod error;
pub mod instance;
pub mod present;
pub mod renderer;
pub mod surface;
pub mod swapchain;
pub mod sync;
pub mod target;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{RendererConfig, RendererConfigBuilder};
pub use descriptors::DescriptorPool;
pub use device::GraphicsDevice;
pub use error::{GpuError, Result, SurfaceStatus};
pub use present::{PresentOutcome, PresentScheduler};
pub use renderer::{FrameRenderer, RenderOutcome};
pub use surface::{Surface, SurfaceCapabilities};
pub use swapchain::SwapchainManager;
pub use sync::{FrameSemaphores, FrameSlot, FrameSlotRing};
pub use target::{Acquire, FrameTarget, RenderTargetInfo, VulkanTarget};

/// Re-exported so dependents name the same `vk` types.
pub use ash::vk;
