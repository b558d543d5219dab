//! winit input forwarded to ImGui.

use imgui::{Io, Key};
use vireo_platform::WindowInput;
use winit::event::{ElementState, KeyEvent, MouseButton, MouseScrollDelta, WindowEvent};
use winit::keyboard::{KeyCode, ModifiersState, PhysicalKey};

use crate::backend::ImguiUi;

/// Pixels of smooth scrolling counted as one wheel line.
const PIXELS_PER_LINE: f32 = 100.0;

impl WindowInput for ImguiUi {
    fn handle_window_event(&mut self, event: &WindowEvent) {
        apply(self.io_mut(), event);
    }
}

/// Queue `event` on `io`. Positions are in physical pixels, matching the
/// display size the layer forwards.
#[allow(clippy::cast_possible_truncation)]
pub fn apply(io: &mut Io, event: &WindowEvent) {
    match event {
        WindowEvent::CursorMoved { position, .. } => {
            io.add_mouse_pos_event([position.x as f32, position.y as f32]);
        }
        WindowEvent::CursorLeft { .. } => io.add_mouse_pos_event([-f32::MAX, -f32::MAX]),
        WindowEvent::MouseInput { state, button, .. } => {
            if let Some(button) = mouse_button(*button) {
                io.add_mouse_button_event(button, *state == ElementState::Pressed);
            }
        }
        WindowEvent::MouseWheel { delta, .. } => io.add_mouse_wheel_event(wheel_lines(*delta)),
        WindowEvent::ModifiersChanged(modifiers) => apply_modifiers(io, modifiers.state()),
        WindowEvent::KeyboardInput { event, .. } => apply_key(io, event),
        _ => {}
    }
}

fn apply_modifiers(io: &mut Io, state: ModifiersState) {
    io.add_key_event(Key::ModShift, state.shift_key());
    io.add_key_event(Key::ModCtrl, state.control_key());
    io.add_key_event(Key::ModAlt, state.alt_key());
    io.add_key_event(Key::ModSuper, state.super_key());
}

fn apply_key(io: &mut Io, event: &KeyEvent) {
    let pressed = event.state == ElementState::Pressed;
    if let PhysicalKey::Code(code) = event.physical_key {
        if let Some(key) = key(code) {
            io.add_key_event(key, pressed);
        }
    }
    if pressed {
        if let Some(text) = &event.text {
            for c in text.chars().filter(|c| !c.is_control()) {
                io.add_input_character(c);
            }
        }
    }
}

/// ImGui button for a winit mouse button.
pub const fn mouse_button(button: MouseButton) -> Option<imgui::MouseButton> {
    match button {
        MouseButton::Left => Some(imgui::MouseButton::Left),
        MouseButton::Right => Some(imgui::MouseButton::Right),
        MouseButton::Middle => Some(imgui::MouseButton::Middle),
        MouseButton::Back => Some(imgui::MouseButton::Extra1),
        MouseButton::Forward => Some(imgui::MouseButton::Extra2),
        MouseButton::Other(_) => None,
    }
}

/// Wheel movement in lines.
#[allow(clippy::cast_possible_truncation)]
pub fn wheel_lines(delta: MouseScrollDelta) -> [f32; 2] {
    match delta {
        MouseScrollDelta::LineDelta(x, y) => [x, y],
        MouseScrollDelta::PixelDelta(pos) => [
            pos.x as f32 / PIXELS_PER_LINE,
            pos.y as f32 / PIXELS_PER_LINE,
        ],
    }
}

/// ImGui key for the keys widgets and navigation react to.
pub const fn key(code: KeyCode) -> Option<Key> {
    Some(match code {
        KeyCode::Tab => Key::Tab,
        KeyCode::ArrowLeft => Key::LeftArrow,
        KeyCode::ArrowRight => Key::RightArrow,
        KeyCode::ArrowUp => Key::UpArrow,
        KeyCode::ArrowDown => Key::DownArrow,
        KeyCode::PageUp => Key::PageUp,
        KeyCode::PageDown => Key::PageDown,
        KeyCode::Home => Key::Home,
        KeyCode::End => Key::End,
        KeyCode::Insert => Key::Insert,
        KeyCode::Delete => Key::Delete,
        KeyCode::Backspace => Key::Backspace,
        KeyCode::Space => Key::Space,
        KeyCode::Enter => Key::Enter,
        KeyCode::NumpadEnter => Key::KeypadEnter,
        KeyCode::Escape => Key::Escape,
        KeyCode::ControlLeft => Key::LeftCtrl,
        KeyCode::ControlRight => Key::RightCtrl,
        KeyCode::ShiftLeft => Key::LeftShift,
        KeyCode::ShiftRight => Key::RightShift,
        KeyCode::AltLeft => Key::LeftAlt,
        KeyCode::AltRight => Key::RightAlt,
        KeyCode::SuperLeft => Key::LeftSuper,
        KeyCode::SuperRight => Key::RightSuper,
        KeyCode::KeyA => Key::A,
        KeyCode::KeyC => Key::C,
        KeyCode::KeyV => Key::V,
        KeyCode::KeyX => Key::X,
        KeyCode::KeyY => Key::Y,
        KeyCode::KeyZ => Key::Z,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use winit::dpi::PhysicalPosition;
    use winit::event::{DeviceId, TouchPhase};

    fn device() -> DeviceId {
        // SAFETY: only used as an opaque value in event construction.
        unsafe { DeviceId::dummy() }
    }

    #[test]
    fn mouse_buttons() {
        assert_eq!(mouse_button(MouseButton::Left), Some(imgui::MouseButton::Left));
        assert_eq!(mouse_button(MouseButton::Back), Some(imgui::MouseButton::Extra1));
        assert_eq!(mouse_button(MouseButton::Other(7)), None);
    }

    #[test]
    fn pixel_scroll_becomes_lines() {
        assert_eq!(wheel_lines(MouseScrollDelta::LineDelta(0.0, -2.0)), [0.0, -2.0]);
        assert_eq!(
            wheel_lines(MouseScrollDelta::PixelDelta(PhysicalPosition::new(50.0, 200.0))),
            [0.5, 2.0]
        );
    }

    #[test]
    fn navigation_and_clipboard_keys_are_mapped() {
        assert_eq!(key(KeyCode::Tab), Some(Key::Tab));
        assert_eq!(key(KeyCode::ArrowDown), Some(Key::DownArrow));
        assert_eq!(key(KeyCode::KeyC), Some(Key::C));
        assert_eq!(key(KeyCode::F13), None);
    }

    #[test]
    fn pointer_events_reach_the_context() {
        let mut context = imgui::Context::create();
        context.set_ini_filename(None::<std::path::PathBuf>);
        context.io_mut().display_size = [800.0, 600.0];
        context.fonts().build_rgba32_texture();

        let io = context.io_mut();
        apply(
            io,
            &WindowEvent::CursorMoved {
                device_id: device(),
                position: PhysicalPosition::new(120.0, 48.0),
            },
        );
        apply(
            io,
            &WindowEvent::MouseInput {
                device_id: device(),
                state: ElementState::Pressed,
                button: MouseButton::Left,
            },
        );
        apply(
            io,
            &WindowEvent::MouseWheel {
                device_id: device(),
                delta: MouseScrollDelta::LineDelta(0.0, 1.0),
                phase: TouchPhase::Moved,
            },
        );

        context.new_frame();
        assert_eq!(context.io().mouse_pos, [120.0, 48.0]);
        assert!(context.io().mouse_down[0]);
        context.render();
    }
}
