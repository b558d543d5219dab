//! Immediate-mode UI layer for Vireo.
//!
//! [`UiLayer`] sits between a host application and the GPU: it polls the
//! window, keeps the swapchain in step with the drawable size, brackets the UI
//! library's frame, and runs acquire, record, submit and present for the
//! payload the UI produces. It also arbitrates input capture.
//!
//! Collaborators are traits so the layer can be driven without a GPU:
//! [`WindowSource`], [`ImmediateUi`] and [`vireo_gpu::FrameTarget`].

pub mod config;
pub mod error;
pub mod event;
pub mod layer;
pub mod ui;
pub mod window;

pub use config::{FatalPolicy, LayerConfig, LayerConfigBuilder};
pub use error::{LayerError, Result};
pub use event::{EventCategory, LayerEvent};
pub use layer::{FrameReport, FrameStart, LayerState, UiLayer};
pub use ui::{DrawPayload, ImmediateUi};
pub use window::WindowSource;
