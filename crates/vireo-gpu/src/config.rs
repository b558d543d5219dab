//! Renderer configuration.

use crate::error::{GpuError, Result};
use ash::vk;

/// Smallest descriptor pool the UI backend accepts for its font and user textures.
pub const MIN_IMAGE_SAMPLER_POOL_SIZE: u32 = 8;

/// Immutable renderer configuration.
///
/// Built once through [`RendererConfig::builder`] and validated at construction.
#[derive(Debug, Clone)]
pub struct RendererConfig {
    app_name: String,
    validation: bool,
    instance_extensions: Vec<String>,
    required_extensions: Vec<String>,
    preferred_formats: Vec<vk::Format>,
    preferred_color_space: vk::ColorSpaceKHR,
    preferred_present_modes: Vec<vk::PresentModeKHR>,
    min_image_count: u32,
    clear_color: [f32; 4],
    image_sampler_pool_size: u32,
}

impl RendererConfig {
    /// Start building a configuration from the defaults.
    pub fn builder() -> RendererConfigBuilder {
        RendererConfigBuilder::default()
    }

    /// Application name reported to the driver.
    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    /// Whether the validation layer and messenger are installed.
    pub fn validation(&self) -> bool {
        self.validation
    }

    /// Instance extensions requested on top of the window system's own.
    pub fn instance_extensions(&self) -> &[String] {
        &self.instance_extensions
    }

    /// Device extensions that must be present on the selected GPU.
    pub fn required_extensions(&self) -> &[String] {
        &self.required_extensions
    }

    /// Surface formats in order of preference.
    pub fn preferred_formats(&self) -> &[vk::Format] {
        &self.preferred_formats
    }

    /// Color space paired with every preferred format.
    pub fn preferred_color_space(&self) -> vk::ColorSpaceKHR {
        self.preferred_color_space
    }

    /// Present modes in order of preference.
    pub fn preferred_present_modes(&self) -> &[vk::PresentModeKHR] {
        &self.preferred_present_modes
    }

    /// Minimum number of swapchain images requested.
    pub fn min_image_count(&self) -> u32 {
        self.min_image_count
    }

    /// Clear color for the UI render pass.
    pub fn clear_color(&self) -> [f32; 4] {
        self.clear_color
    }

    /// Combined image sampler capacity of the UI descriptor pool.
    pub fn image_sampler_pool_size(&self) -> u32 {
        self.image_sampler_pool_size
    }
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            app_name: "Vireo".to_string(),
            validation: cfg!(debug_assertions),
            instance_extensions: Vec::new(),
            required_extensions: vec![ash::khr::swapchain::NAME.to_string_lossy().into_owned()],
            preferred_formats: vec![
                vk::Format::B8G8R8A8_UNORM,
                vk::Format::R8G8B8A8_UNORM,
                vk::Format::B8G8R8_UNORM,
                vk::Format::R8G8B8_UNORM,
            ],
            preferred_color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            preferred_present_modes: vec![vk::PresentModeKHR::FIFO],
            min_image_count: 2,
            clear_color: [0.1, 0.1, 0.1, 1.0],
            image_sampler_pool_size: MIN_IMAGE_SAMPLER_POOL_SIZE,
        }
    }
}

/// Builder for [`RendererConfig`].
#[derive(Debug, Clone, Default)]
pub struct RendererConfigBuilder {
    config: RendererConfig,
}

impl RendererConfigBuilder {
    /// Set the application name.
    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.config.app_name = name.into();
        self
    }

    /// Enable or disable validation layers.
    pub fn validation(mut self, enable: bool) -> Self {
        self.config.validation = enable;
        self
    }

    /// Request an additional instance extension.
    pub fn instance_extension(mut self, name: impl Into<String>) -> Self {
        self.config.instance_extensions.push(name.into());
        self
    }

    /// Require an additional device extension.
    pub fn required_extension(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !self.config.required_extensions.contains(&name) {
            self.config.required_extensions.push(name);
        }
        self
    }

    /// Replace the surface format preference list.
    pub fn preferred_formats(mut self, formats: impl IntoIterator<Item = vk::Format>) -> Self {
        self.config.preferred_formats = formats.into_iter().collect();
        self
    }

    /// Set the color space requested with the preferred formats.
    pub fn preferred_color_space(mut self, color_space: vk::ColorSpaceKHR) -> Self {
        self.config.preferred_color_space = color_space;
        self
    }

    /// Replace the present mode preference list.
    pub fn preferred_present_modes(
        mut self,
        modes: impl IntoIterator<Item = vk::PresentModeKHR>,
    ) -> Self {
        self.config.preferred_present_modes = modes.into_iter().collect();
        self
    }

    /// Set the minimum swapchain image count.
    pub fn min_image_count(mut self, count: u32) -> Self {
        self.config.min_image_count = count;
        self
    }

    /// Set the clear color.
    pub fn clear_color(mut self, rgba: [f32; 4]) -> Self {
        self.config.clear_color = rgba;
        self
    }

    /// Set the descriptor pool capacity.
    pub fn image_sampler_pool_size(mut self, size: u32) -> Self {
        self.config.image_sampler_pool_size = size;
        self
    }

    /// Validate and freeze the configuration.
    pub fn build(self) -> Result<RendererConfig> {
        let config = self.config;
        if config.min_image_count < 2 {
            return Err(GpuError::InvalidConfig(format!(
                "min_image_count must be at least 2, got {}",
                config.min_image_count
            )));
        }
        if config.preferred_formats.is_empty() {
            return Err(GpuError::InvalidConfig(
                "preferred_formats must not be empty".to_string(),
            ));
        }
        if config.preferred_present_modes.is_empty() {
            return Err(GpuError::InvalidConfig(
                "preferred_present_modes must not be empty".to_string(),
            ));
        }
        if config.image_sampler_pool_size == 0 {
            return Err(GpuError::InvalidConfig(
                "image_sampler_pool_size must be non-zero".to_string(),
            ));
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = RendererConfig::builder().build().unwrap();
        assert_eq!(config.min_image_count(), 2);
        assert_eq!(config.preferred_formats()[0], vk::Format::B8G8R8A8_UNORM);
        assert_eq!(config.preferred_present_modes(), &[vk::PresentModeKHR::FIFO]);
        assert_eq!(config.required_extensions(), &["VK_KHR_swapchain".to_string()]);
        assert_eq!(config.clear_color(), [0.1, 0.1, 0.1, 1.0]);
    }

    #[test]
    fn rejects_single_buffering() {
        let err = RendererConfig::builder().min_image_count(1).build().unwrap_err();
        assert!(matches!(err, GpuError::InvalidConfig(_)));
    }

    #[test]
    fn rejects_empty_preferences() {
        assert!(RendererConfig::builder()
            .preferred_formats([])
            .build()
            .is_err());
        assert!(RendererConfig::builder()
            .preferred_present_modes([])
            .build()
            .is_err());
        assert!(RendererConfig::builder()
            .image_sampler_pool_size(0)
            .build()
            .is_err());
    }

    #[test]
    fn required_extensions_are_deduplicated() {
        let config = RendererConfig::builder()
            .required_extension("VK_KHR_swapchain")
            .required_extension("VK_KHR_maintenance1")
            .build()
            .unwrap();
        assert_eq!(config.required_extensions().len(), 2);
    }
}
