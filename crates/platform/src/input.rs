//! Keyboard and mouse state feeding the first-person camera.

use std::collections::HashSet;

use glam::{Vec2, Vec3};
use winit::event::{ElementState, WindowEvent};
use winit::keyboard::PhysicalKey;

pub use winit::keyboard::KeyCode;

/// Mouse button identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

impl MouseButton {
    fn from_winit(button: winit::event::MouseButton) -> Option<Self> {
        match button {
            winit::event::MouseButton::Left => Some(MouseButton::Left),
            winit::event::MouseButton::Right => Some(MouseButton::Right),
            winit::event::MouseButton::Middle => Some(MouseButton::Middle),
            _ => None,
        }
    }
}

/// Current key and button state plus per-frame deltas.
#[derive(Debug, Default)]
pub struct InputState {
    pressed_keys: HashSet<KeyCode>,
    just_pressed_keys: HashSet<KeyCode>,
    pressed_buttons: HashSet<MouseButton>,
    /// Last cursor position, `None` until the first move event
    cursor: Option<Vec2>,
    /// Cursor movement accumulated since `begin_frame`
    cursor_delta: Vec2,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear per-frame state. Call once per frame after consuming deltas.
    pub fn begin_frame(&mut self) {
        self.just_pressed_keys.clear();
        self.cursor_delta = Vec2::ZERO;
    }

    /// Feed a window event. Returns whether the event was an input event.
    pub fn handle_event(&mut self, event: &WindowEvent) -> bool {
        match event {
            WindowEvent::KeyboardInput { event, .. } => {
                if let PhysicalKey::Code(key) = event.physical_key {
                    match event.state {
                        ElementState::Pressed => self.on_key_pressed(key),
                        ElementState::Released => self.on_key_released(key),
                    }
                }
                true
            }
            WindowEvent::MouseInput { state, button, .. } => {
                if let Some(button) = MouseButton::from_winit(*button) {
                    match state {
                        ElementState::Pressed => self.pressed_buttons.insert(button),
                        ElementState::Released => self.pressed_buttons.remove(&button),
                    };
                }
                true
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.on_cursor_moved(Vec2::new(position.x as f32, position.y as f32));
                true
            }
            WindowEvent::Focused(false) => {
                self.pressed_keys.clear();
                self.pressed_buttons.clear();
                true
            }
            _ => false,
        }
    }

    pub fn on_key_pressed(&mut self, key: KeyCode) {
        if self.pressed_keys.insert(key) {
            self.just_pressed_keys.insert(key);
        }
    }

    pub fn on_key_released(&mut self, key: KeyCode) {
        self.pressed_keys.remove(&key);
    }

    pub fn on_cursor_moved(&mut self, position: Vec2) {
        if let Some(previous) = self.cursor {
            self.cursor_delta += position - previous;
        }
        self.cursor = Some(position);
    }

    pub fn is_key_pressed(&self, key: KeyCode) -> bool {
        self.pressed_keys.contains(&key)
    }

    pub fn is_key_just_pressed(&self, key: KeyCode) -> bool {
        self.just_pressed_keys.contains(&key)
    }

    pub fn is_mouse_pressed(&self, button: MouseButton) -> bool {
        self.pressed_buttons.contains(&button)
    }

    /// Camera-space movement intent: x = D/A, y = E/Q, z = W/S.
    pub fn movement_axis(&self) -> Vec3 {
        let axis = |positive: KeyCode, negative: KeyCode| {
            self.is_key_pressed(positive) as i8 as f32 - self.is_key_pressed(negative) as i8 as f32
        };
        Vec3::new(
            axis(KeyCode::KeyD, KeyCode::KeyA),
            axis(KeyCode::KeyE, KeyCode::KeyQ),
            axis(KeyCode::KeyW, KeyCode::KeyS),
        )
    }

    /// Look input for this frame: cursor movement while the right button is
    /// held, as (yaw, pitch). Screen-space y grows downwards, so it is negated.
    pub fn look_delta(&self) -> Vec2 {
        if self.is_mouse_pressed(MouseButton::Right) {
            Vec2::new(-self.cursor_delta.x, -self.cursor_delta.y)
        } else {
            Vec2::ZERO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_just_pressed_cleared_each_frame() {
        let mut input = InputState::new();
        input.on_key_pressed(KeyCode::KeyW);
        assert!(input.is_key_just_pressed(KeyCode::KeyW));

        input.begin_frame();
        assert!(!input.is_key_just_pressed(KeyCode::KeyW));
        assert!(input.is_key_pressed(KeyCode::KeyW));
    }

    #[test]
    fn test_movement_axis() {
        let mut input = InputState::new();
        assert_eq!(input.movement_axis(), Vec3::ZERO);

        input.on_key_pressed(KeyCode::KeyW);
        input.on_key_pressed(KeyCode::KeyA);
        assert_eq!(input.movement_axis(), Vec3::new(-1.0, 0.0, 1.0));

        input.on_key_pressed(KeyCode::KeyD);
        assert_eq!(input.movement_axis(), Vec3::new(0.0, 0.0, 1.0));
    }

    #[test]
    fn test_first_cursor_event_has_no_delta() {
        let mut input = InputState::new();
        input.pressed_buttons.insert(MouseButton::Right);

        input.on_cursor_moved(Vec2::new(100.0, 100.0));
        assert_eq!(input.look_delta(), Vec2::ZERO);

        input.on_cursor_moved(Vec2::new(110.0, 95.0));
        assert_eq!(input.look_delta(), Vec2::new(-10.0, 5.0));
    }

    #[test]
    fn test_look_requires_right_button() {
        let mut input = InputState::new();
        input.on_cursor_moved(Vec2::ZERO);
        input.on_cursor_moved(Vec2::new(5.0, 5.0));
        assert_eq!(input.look_delta(), Vec2::ZERO);
    }
}
