//! GLFW input and window state fed into `imgui::Io`

use std::time::Duration;

use glfw::{Action, Modifiers, WindowEvent};
use imgui::{Io, Key, MouseButton};

use crate::window::Window;

/// Imgui key for a GLFW key, if imgui tracks it
pub fn map_key(key: glfw::Key) -> Option<Key> {
    use glfw::Key as G;

    macro_rules! same_name {
        ($key:expr, $($name:ident),+ $(,)?) => {
            match $key {
                $(G::$name => return Some(Key::$name),)+
                _ => {}
            }
        };
    }
    same_name!(
        key, A, B, C, D, E, F, G, H, I, J, K, L, M, N, O, P, Q, R, S, T, U, V, W, X, Y, Z, F1, F2, F3, F4, F5,
        F6, F7, F8, F9, F10, F11, F12, Tab, PageUp, PageDown, Home, End, Insert, Delete, Backspace, Space,
        Enter, Escape, LeftShift, LeftAlt, LeftSuper, RightShift, RightAlt, RightSuper, Menu, Apostrophe,
        Comma, Minus, Period, Slash, Semicolon, Equal, LeftBracket, Backslash, RightBracket, GraveAccent,
        CapsLock, ScrollLock, NumLock, PrintScreen, Pause,
    );

    let mapped = match key {
        G::Left => Key::LeftArrow,
        G::Right => Key::RightArrow,
        G::Up => Key::UpArrow,
        G::Down => Key::DownArrow,
        G::LeftControl => Key::LeftCtrl,
        G::RightControl => Key::RightCtrl,
        G::KpEnter => Key::KeypadEnter,
        G::Num0 => Key::Alpha0,
        G::Num1 => Key::Alpha1,
        G::Num2 => Key::Alpha2,
        G::Num3 => Key::Alpha3,
        G::Num4 => Key::Alpha4,
        G::Num5 => Key::Alpha5,
        G::Num6 => Key::Alpha6,
        G::Num7 => Key::Alpha7,
        G::Num8 => Key::Alpha8,
        G::Num9 => Key::Alpha9,
        _ => return None,
    };
    Some(mapped)
}

/// Imgui mouse button for a GLFW button
pub fn map_mouse_button(button: glfw::MouseButton) -> Option<MouseButton> {
    match button {
        glfw::MouseButton::Button1 => Some(MouseButton::Left),
        glfw::MouseButton::Button2 => Some(MouseButton::Right),
        glfw::MouseButton::Button3 => Some(MouseButton::Middle),
        glfw::MouseButton::Button4 => Some(MouseButton::Extra1),
        glfw::MouseButton::Button5 => Some(MouseButton::Extra2),
        _ => None,
    }
}

fn add_modifiers(io: &mut Io, mods: Modifiers) {
    io.add_key_event(Key::ModCtrl, mods.contains(Modifiers::Control));
    io.add_key_event(Key::ModShift, mods.contains(Modifiers::Shift));
    io.add_key_event(Key::ModAlt, mods.contains(Modifiers::Alt));
    io.add_key_event(Key::ModSuper, mods.contains(Modifiers::Super));
}

/// Queue one window event into `io`
pub fn handle_event(io: &mut Io, event: &WindowEvent) {
    match *event {
        WindowEvent::CursorPos(x, y) => io.add_mouse_pos_event([x as f32, y as f32]),
        WindowEvent::CursorEnter(false) => io.add_mouse_pos_event([-f32::MAX, -f32::MAX]),
        WindowEvent::MouseButton(button, action, mods) => {
            add_modifiers(io, mods);
            if let Some(button) = map_mouse_button(button) {
                io.add_mouse_button_event(button, action != Action::Release);
            }
        }
        WindowEvent::Scroll(x, y) => io.add_mouse_wheel_event([x as f32, y as f32]),
        WindowEvent::Char(c) => io.add_input_character(c),
        WindowEvent::Key(key, _, action, mods) => {
            add_modifiers(io, mods);
            if let Some(key) = map_key(key) {
                io.add_key_event(key, action != Action::Release);
            }
        }
        WindowEvent::Focus(focused) => io.app_focus_lost = !focused,
        _ => {}
    }
}

/// Display size, framebuffer scale and frame time for the next imgui frame
pub fn update_frame(io: &mut Io, window: &Window, dt: Duration) {
    let [width, height] = window.size();
    let framebuffer = window.framebuffer_extent();
    io.display_size = [width as f32, height as f32];
    if width > 0 && height > 0 {
        io.display_framebuffer_scale = [
            framebuffer.width as f32 / width as f32,
            framebuffer.height as f32 / height as f32,
        ];
    }
    io.delta_time = dt.as_secs_f32().max(f32::EPSILON);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_key() {
        assert_eq!(map_key(glfw::Key::A), Some(Key::A));
        assert_eq!(map_key(glfw::Key::Left), Some(Key::LeftArrow));
        assert_eq!(map_key(glfw::Key::Num3), Some(Key::Alpha3));
        assert_eq!(map_key(glfw::Key::Escape), Some(Key::Escape));
        assert_eq!(map_key(glfw::Key::World1), None);
    }

    #[test]
    fn test_map_mouse_button() {
        assert_eq!(map_mouse_button(glfw::MouseButton::Button1), Some(MouseButton::Left));
        assert_eq!(map_mouse_button(glfw::MouseButton::Button3), Some(MouseButton::Middle));
        assert_eq!(map_mouse_button(glfw::MouseButton::Button8), None);
    }
}
