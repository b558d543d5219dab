//! GPU error types.

use ash::vk;
use thiserror::Error;

/// GPU-related errors.
#[derive(Error, Debug)]
pub enum GpuError {
    /// Vulkan error.
    #[error("Vulkan error: {0} (VkResult = {code})", code = .0.as_raw())]
    Vulkan(#[from] vk::Result),

    /// The Vulkan loader could not be found or initialized.
    #[error("Failed to load Vulkan: {0}")]
    Loading(String),

    /// Required extension not supported.
    #[error("Required extension not supported: {0}")]
    ExtensionNotSupported(String),

    /// No suitable GPU found.
    #[error("No suitable GPU found")]
    NoSuitableDevice,

    /// No queue family supports both graphics and presentation.
    #[error("No queue family supports graphics and presentation")]
    NoQueueFamily,

    /// The selected device cannot present to the surface.
    #[error("Device cannot present to the window surface")]
    PresentationUnsupported,

    /// Surface creation failed.
    #[error("Surface creation failed: {0}")]
    SurfaceCreation(String),

    /// Swapchain creation failed.
    #[error("Swapchain creation failed: {0}")]
    SwapchainCreation(String),

    /// Configuration rejected at construction.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

impl GpuError {
    /// Returns `true` when the error only means the swapchain no longer matches
    /// the surface and must be rebuilt.
    pub fn is_surface_invalidated(&self) -> bool {
        matches!(
            self,
            Self::Vulkan(
                vk::Result::ERROR_OUT_OF_DATE_KHR
                    | vk::Result::ERROR_FULL_SCREEN_EXCLUSIVE_MODE_LOST_EXT
            )
        )
    }

    /// Returns `true` for errors raised while probing what the machine supports.
    pub fn is_unsupported_capability(&self) -> bool {
        matches!(
            self,
            Self::ExtensionNotSupported(_)
                | Self::NoSuitableDevice
                | Self::NoQueueFamily
                | Self::PresentationUnsupported
        )
    }

    /// Numeric `VkResult` code, if this error came from a Vulkan call.
    pub fn result_code(&self) -> Option<i32> {
        match self {
            Self::Vulkan(result) => Some(result.as_raw()),
            _ => None,
        }
    }
}

/// State of the surface as reported by acquire or present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceStatus {
    /// The swapchain matches the surface.
    Optimal,
    /// Usable, but the swapchain should be rebuilt.
    Suboptimal,
    /// Unusable until the swapchain is rebuilt.
    OutOfDate,
}

impl SurfaceStatus {
    /// Map a raw Vulkan call outcome onto a surface status.
    ///
    /// `Ok(true)` is ash's encoding of `VK_SUBOPTIMAL_KHR`. Errors that do not
    /// describe the surface are handed back unchanged.
    pub fn classify(result: std::result::Result<bool, vk::Result>) -> Result<Self> {
        match result {
            Ok(false) => Ok(Self::Optimal),
            Ok(true) => Ok(Self::Suboptimal),
            Err(e) => {
                let err = GpuError::from(e);
                if err.is_surface_invalidated() {
                    Ok(Self::OutOfDate)
                } else {
                    Err(err)
                }
            }
        }
    }

    /// Whether this status should schedule a swapchain rebuild.
    pub fn needs_rebuild(self) -> bool {
        !matches!(self, Self::Optimal)
    }
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, GpuError>;
