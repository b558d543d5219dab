//! Platform integration for the Vireo UI layer.
//!
//! Provides window creation and event categorization via winit.

use raw_window_handle::{
    DisplayHandle, HandleError, HasDisplayHandle, HasWindowHandle, WindowHandle,
};
use std::sync::Arc;
use thiserror::Error;
use vireo_ui::{EventCategory, LayerEvent, WindowSource};
use winit::event::WindowEvent;
use winit::event_loop::ActiveEventLoop;
use winit::window::Window;

#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("Window creation failed: {0}")]
    WindowCreation(String),
    #[error("Event loop error: {0}")]
    EventLoop(String),
}

pub type Result<T> = std::result::Result<T, PlatformError>;

/// Window configuration.
#[derive(Debug, Clone)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub resizable: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Vireo".to_string(),
            width: 1280,
            height: 720,
            resizable: true,
        }
    }
}

/// Shared handle to a winit window, usable as the layer's [`WindowSource`]
/// and as a Vulkan surface source.
#[derive(Debug, Clone)]
pub struct PlatformWindow(Arc<Window>);

impl PlatformWindow {
    /// Create a window on the running event loop.
    pub fn create(event_loop: &ActiveEventLoop, config: &WindowConfig) -> Result<Self> {
        let attributes = Window::default_attributes()
            .with_title(config.title.clone())
            .with_inner_size(winit::dpi::PhysicalSize::new(config.width, config.height))
            .with_resizable(config.resizable);

        let window = event_loop
            .create_window(attributes)
            .map_err(|e| PlatformError::WindowCreation(e.to_string()))?;

        tracing::info!(
            "Window created: {} ({}x{})",
            config.title,
            config.width,
            config.height
        );
        Ok(Self(Arc::new(window)))
    }

    /// The underlying winit window.
    pub fn window(&self) -> &Window {
        &self.0
    }
}

impl From<Arc<Window>> for PlatformWindow {
    fn from(window: Arc<Window>) -> Self {
        Self(window)
    }
}

impl WindowSource for PlatformWindow {
    fn drawable_size(&self) -> (u32, u32) {
        let size = self.0.inner_size();
        (size.width, size.height)
    }

    fn is_minimized(&self) -> bool {
        self.0.is_minimized().unwrap_or(false)
    }
}

impl HasDisplayHandle for PlatformWindow {
    fn display_handle(&self) -> std::result::Result<DisplayHandle<'_>, HandleError> {
        self.0.display_handle()
    }
}

impl HasWindowHandle for PlatformWindow {
    fn window_handle(&self) -> std::result::Result<WindowHandle<'_>, HandleError> {
        self.0.window_handle()
    }
}

/// A UI backend that consumes raw window input.
///
/// The runner hands every window event to the backend before asking the layer
/// whether the UI captured it, so capture flags reflect the latest input.
pub trait WindowInput {
    /// Feed one window event.
    fn handle_window_event(&mut self, event: &WindowEvent);
}

/// Categories of a winit window event.
pub fn categorize(event: &WindowEvent) -> EventCategory {
    match event {
        WindowEvent::KeyboardInput { .. } | WindowEvent::ModifiersChanged(_) | WindowEvent::Ime(_) => {
            EventCategory::INPUT | EventCategory::KEYBOARD
        }
        WindowEvent::CursorMoved { .. }
        | WindowEvent::CursorEntered { .. }
        | WindowEvent::CursorLeft { .. }
        | WindowEvent::MouseWheel { .. } => EventCategory::INPUT | EventCategory::MOUSE,
        WindowEvent::MouseInput { .. } => {
            EventCategory::INPUT | EventCategory::MOUSE | EventCategory::MOUSE_BUTTON
        }
        WindowEvent::Touch(_) => EventCategory::INPUT,
        _ => EventCategory::APPLICATION,
    }
}

/// Wrap a winit window event for the layer stack.
pub fn layer_event(event: &WindowEvent) -> LayerEvent {
    LayerEvent::new(categorize(event))
}

#[cfg(test)]
mod tests {
    use super::*;
    use winit::dpi::{PhysicalPosition, PhysicalSize};
    use winit::event::{DeviceId, ElementState, Modifiers, MouseButton, MouseScrollDelta, TouchPhase};

    fn device() -> DeviceId {
        // SAFETY: only used as an opaque value in event construction.
        unsafe { DeviceId::dummy() }
    }

    #[test]
    fn mouse_button_is_mouse_input() {
        let event = WindowEvent::MouseInput {
            device_id: device(),
            state: ElementState::Pressed,
            button: MouseButton::Left,
        };
        let category = categorize(&event);
        assert!(category.contains(EventCategory::MOUSE | EventCategory::MOUSE_BUTTON));
        assert!(category.contains(EventCategory::INPUT));
    }

    #[test]
    fn pointer_motion_and_wheel_are_mouse() {
        let moved = WindowEvent::CursorMoved {
            device_id: device(),
            position: PhysicalPosition::new(10.0, 20.0),
        };
        let wheel = WindowEvent::MouseWheel {
            device_id: device(),
            delta: MouseScrollDelta::LineDelta(0.0, 1.0),
            phase: TouchPhase::Moved,
        };
        assert_eq!(categorize(&moved), EventCategory::INPUT | EventCategory::MOUSE);
        assert_eq!(categorize(&wheel), EventCategory::INPUT | EventCategory::MOUSE);
    }

    #[test]
    fn modifiers_are_keyboard() {
        let event = WindowEvent::ModifiersChanged(Modifiers::default());
        assert_eq!(categorize(&event), EventCategory::INPUT | EventCategory::KEYBOARD);
    }

    #[test]
    fn window_events_are_application() {
        for event in [
            WindowEvent::Resized(PhysicalSize::new(800, 600)),
            WindowEvent::CloseRequested,
            WindowEvent::Focused(true),
        ] {
            let wrapped = layer_event(&event);
            assert_eq!(wrapped.category, EventCategory::APPLICATION);
            assert!(!wrapped.handled);
        }
    }
}
