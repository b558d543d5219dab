//! Vulkan instance creation and the validation messenger.

use crate::config::RendererConfig;
use crate::error::{GpuError, Result};
use ash::ext::debug_utils;
use ash::vk;
use raw_window_handle::RawDisplayHandle;
use std::ffi::{c_char, c_void, CStr, CString};

/// Validation layer enabled when [`RendererConfig::validation`] is set.
pub const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Owns the loader entry, the instance and, in validated builds, the debug messenger.
///
/// Dropping it destroys the messenger and then the instance; every object
/// created from the instance must be gone by then.
pub struct InstanceContext {
    entry: ash::Entry,
    instance: ash::Instance,
    debug: Option<(debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,
}

impl InstanceContext {
    /// Load Vulkan and create an instance able to present to `display`.
    ///
    /// Fails with [`GpuError::ExtensionNotSupported`] if any extension the window
    /// system or the configuration requires is missing.
    pub fn new(config: &RendererConfig, display: RawDisplayHandle) -> Result<Self> {
        // SAFETY: loading the system Vulkan library has no preconditions beyond
        // the library itself being well-formed.
        let entry = unsafe { ash::Entry::load() }.map_err(|e| GpuError::Loading(e.to_string()))?;

        let available = unsafe { entry.enumerate_instance_extension_properties(None)? };
        let is_available = |name: &CStr| {
            available
                .iter()
                .any(|props| props.extension_name_as_c_str().is_ok_and(|n| n == name))
        };

        let mut extensions: Vec<&CStr> = ash_window::enumerate_required_extensions(display)?
            .iter()
            // SAFETY: ash-window hands out static, nul-terminated extension names.
            .map(|&ptr| unsafe { CStr::from_ptr(ptr) })
            .collect();

        let extra: Vec<CString> = config
            .instance_extensions()
            .iter()
            .map(|name| {
                CString::new(name.as_str())
                    .map_err(|_| GpuError::InvalidConfig(format!("bad extension name {name:?}")))
            })
            .collect::<Result<_>>()?;
        extensions.extend(extra.iter().map(CString::as_c_str));

        for name in &extensions {
            if !is_available(name) {
                let name = name.to_string_lossy().into_owned();
                tracing::error!("Instance extension {name} is not supported");
                return Err(GpuError::ExtensionNotSupported(name));
            }
        }

        let mut create_flags = vk::InstanceCreateFlags::empty();
        if is_available(ash::khr::get_physical_device_properties2::NAME) {
            extensions.push(ash::khr::get_physical_device_properties2::NAME);
        }
        if is_available(ash::khr::portability_enumeration::NAME) {
            extensions.push(ash::khr::portability_enumeration::NAME);
            create_flags |= vk::InstanceCreateFlags::ENUMERATE_PORTABILITY_KHR;
        }

        let mut layers: Vec<&CStr> = Vec::new();
        let mut validation = config.validation();
        if validation {
            let available_layers = unsafe { entry.enumerate_instance_layer_properties()? };
            let found = available_layers
                .iter()
                .any(|props| props.layer_name_as_c_str().is_ok_and(|n| n == VALIDATION_LAYER));
            if found && is_available(debug_utils::NAME) {
                layers.push(VALIDATION_LAYER);
                extensions.push(debug_utils::NAME);
            } else {
                tracing::warn!(
                    "Validation layer {} not available",
                    VALIDATION_LAYER.to_string_lossy()
                );
                validation = false;
            }
        }

        let app_name = CString::new(config.app_name())
            .map_err(|_| GpuError::InvalidConfig("app_name contains a nul byte".to_string()))?;
        let app_info = vk::ApplicationInfo::default()
            .application_name(&app_name)
            .application_version(vk::make_api_version(0, 0, 1, 0))
            .engine_name(c"Vireo")
            .engine_version(vk::make_api_version(0, 0, 1, 0))
            .api_version(vk::API_VERSION_1_0);

        let extension_names: Vec<*const c_char> = extensions.iter().map(|e| e.as_ptr()).collect();
        let layer_names: Vec<*const c_char> = layers.iter().map(|l| l.as_ptr()).collect();

        let create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_extension_names(&extension_names)
            .enabled_layer_names(&layer_names)
            .flags(create_flags);

        let instance = unsafe { entry.create_instance(&create_info, None)? };

        let debug = if validation {
            let loader = debug_utils::Instance::new(&entry, &instance);
            match unsafe { create_debug_messenger(&loader) } {
                Ok(messenger) => Some((loader, messenger)),
                Err(e) => {
                    unsafe { instance.destroy_instance(None) };
                    return Err(e);
                }
            }
        } else {
            None
        };

        tracing::debug!(
            extensions = extensions.len(),
            validation,
            "Vulkan instance created"
        );

        Ok(Self {
            entry,
            instance,
            debug,
        })
    }

    /// Get the loader entry.
    pub fn entry(&self) -> &ash::Entry {
        &self.entry
    }

    /// Get the Vulkan instance handle.
    pub fn instance(&self) -> &ash::Instance {
        &self.instance
    }

    /// Whether the validation messenger is installed.
    pub fn has_validation(&self) -> bool {
        self.debug.is_some()
    }
}

impl Drop for InstanceContext {
    fn drop(&mut self) {
        unsafe {
            if let Some((loader, messenger)) = self.debug.take() {
                loader.destroy_debug_utils_messenger(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
    }
}

unsafe fn create_debug_messenger(
    loader: &debug_utils::Instance,
) -> Result<vk::DebugUtilsMessengerEXT> {
    let create_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
        .message_severity(
            vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
                | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        )
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(debug_callback));

    Ok(unsafe { loader.create_debug_utils_messenger(&create_info, None)? })
}

/// Logs every validation message; error severity aborts the process, since the
/// API's behavior is undefined past that point.
unsafe extern "system" fn debug_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    types: vk::DebugUtilsMessageTypeFlagsEXT,
    data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user: *mut c_void,
) -> vk::Bool32 {
    let message = if data.is_null() || unsafe { (*data).p_message.is_null() } {
        std::borrow::Cow::Borrowed("<no message>")
    } else {
        unsafe { CStr::from_ptr((*data).p_message) }.to_string_lossy()
    };

    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        tracing::error!(target: "vulkan", ?types, "{message}");
        std::process::abort();
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        tracing::warn!(target: "vulkan", ?types, "{message}");
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
        tracing::debug!(target: "vulkan", ?types, "{message}");
    } else {
        tracing::trace!(target: "vulkan", ?types, "{message}");
    }

    vk::FALSE
}
