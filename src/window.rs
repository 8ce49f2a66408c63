//! Window management using winit
//!
//! The renderer itself never talks to the windowing system. [`Window`] is the
//! narrow surface the engine loop needs: size, close requests, key state and
//! mouse motion. [`WinitWindow`] implements it on top of winit.

use glam::Vec2;
use std::collections::HashSet;
use std::sync::Arc;
use winit::{
    dpi::PhysicalSize,
    error::OsError,
    event::{DeviceEvent, ElementState, KeyEvent, MouseButton, WindowEvent},
    event_loop::EventLoopWindowTarget,
    keyboard::{self, PhysicalKey},
    window::{Window as RawWindow, WindowBuilder},
};

/// Keys and buttons the engine reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Key {
    W,
    A,
    S,
    D,
    Q,
    E,
    Space,
    ShiftLeft,
    Escape,
    /// Right mouse button, held for mouse look
    MouseRight,
}

/// Kind of key event to query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    /// Went down since the last frame
    Press,
    /// Went up since the last frame
    Release,
    /// Currently down
    Held,
}

/// Map a winit key code to a [`Key`], if the engine uses it.
pub fn map_winit_key(key: keyboard::KeyCode) -> Option<Key> {
    Some(match key {
        keyboard::KeyCode::KeyW => Key::W,
        keyboard::KeyCode::KeyA => Key::A,
        keyboard::KeyCode::KeyS => Key::S,
        keyboard::KeyCode::KeyD => Key::D,
        keyboard::KeyCode::KeyQ => Key::Q,
        keyboard::KeyCode::KeyE => Key::E,
        keyboard::KeyCode::Space => Key::Space,
        keyboard::KeyCode::ShiftLeft => Key::ShiftLeft,
        keyboard::KeyCode::Escape => Key::Escape,
        _ => return None,
    })
}

/// Window collaborator used by the engine loop
pub trait Window {
    fn width(&self) -> u32;

    fn height(&self) -> u32;

    fn should_close(&self) -> bool;

    fn is_key_event(&self, key: Key, action: KeyAction) -> bool;

    /// Mouse motion accumulated since the last frame
    fn mouse_delta(&self) -> Vec2;

    /// New size if the window was resized since the last call
    fn take_resize(&mut self) -> Option<(u32, u32)>;
}

/// Keyboard and mouse state of one frame
#[derive(Debug, Clone, Default)]
pub struct InputState {
    held: HashSet<Key>,
    pressed: HashSet<Key>,
    released: HashSet<Key>,
    mouse_delta: Vec2,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_key(&mut self, key: Key, down: bool) {
        if down {
            // Repeats do not count as new presses
            if self.held.insert(key) {
                self.pressed.insert(key);
            }
        } else if self.held.remove(&key) {
            self.released.insert(key);
        }
    }

    pub fn add_mouse_motion(&mut self, delta: Vec2) {
        self.mouse_delta += delta;
    }

    pub fn is_key_event(&self, key: Key, action: KeyAction) -> bool {
        match action {
            KeyAction::Press => self.pressed.contains(&key),
            KeyAction::Release => self.released.contains(&key),
            KeyAction::Held => self.held.contains(&key),
        }
    }

    pub fn mouse_delta(&self) -> Vec2 {
        self.mouse_delta
    }

    /// Drop per-frame edges and motion, keep held keys
    pub fn end_frame(&mut self) {
        self.pressed.clear();
        self.released.clear();
        self.mouse_delta = Vec2::ZERO;
    }
}

/// Wrapper around a winit window with input and resize tracking
pub struct WinitWindow {
    window: Arc<RawWindow>,
    width: u32,
    height: u32,
    pending_resize: Option<(u32, u32)>,
    close_requested: bool,
    input: InputState,
}

impl WinitWindow {
    /// Create a new window with the given title and dimensions
    pub fn new(
        target: &EventLoopWindowTarget<()>,
        title: &str,
        width: u32,
        height: u32,
    ) -> Result<Self, OsError> {
        let window = Arc::new(
            WindowBuilder::new()
                .with_title(title)
                .with_inner_size(PhysicalSize::new(width, height))
                .build(target)?,
        );
        let size = window.inner_size();

        Ok(Self {
            window,
            width: size.width,
            height: size.height,
            pending_resize: None,
            close_requested: false,
            input: InputState::new(),
        })
    }

    /// Shared handle for surface creation
    pub fn window_arc(&self) -> Arc<RawWindow> {
        Arc::clone(&self.window)
    }

    pub fn input(&self) -> &InputState {
        &self.input
    }

    pub fn request_close(&mut self) {
        self.close_requested = true;
    }

    pub fn request_redraw(&self) {
        self.window.request_redraw();
    }

    /// Handle window events
    pub fn handle_event(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::Resized(size) => {
                self.width = size.width;
                self.height = size.height;
                self.pending_resize = Some((size.width, size.height));
            }
            WindowEvent::CloseRequested => {
                self.close_requested = true;
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state,
                        ..
                    },
                ..
            } => {
                if let Some(key) = map_winit_key(*code) {
                    self.input.set_key(key, *state == ElementState::Pressed);
                }
            }
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Right,
                ..
            } => {
                self.input
                    .set_key(Key::MouseRight, *state == ElementState::Pressed);
            }
            WindowEvent::Focused(false) => {
                for key in self.input.held.clone() {
                    self.input.set_key(key, false);
                }
            }
            _ => {}
        }
    }

    /// Handle raw device events (relative mouse motion)
    pub fn handle_device_event(&mut self, event: &DeviceEvent) {
        if let DeviceEvent::MouseMotion { delta: (x, y) } = event {
            self.input.add_mouse_motion(Vec2::new(*x as f32, *y as f32));
        }
    }

    /// Clear per-frame input, called after the application update
    pub fn end_frame(&mut self) {
        self.input.end_frame();
    }
}

impl Window for WinitWindow {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn should_close(&self) -> bool {
        self.close_requested
    }

    fn is_key_event(&self, key: Key, action: KeyAction) -> bool {
        self.input.is_key_event(key, action)
    }

    fn mouse_delta(&self) -> Vec2 {
        self.input.mouse_delta()
    }

    fn take_resize(&mut self) -> Option<(u32, u32)> {
        self.pending_resize.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn press_is_an_edge_held_is_a_level() {
        let mut input = InputState::new();
        input.set_key(Key::W, true);
        input.set_key(Key::W, true);
        assert!(input.is_key_event(Key::W, KeyAction::Press));
        assert!(input.is_key_event(Key::W, KeyAction::Held));

        input.end_frame();
        assert!(!input.is_key_event(Key::W, KeyAction::Press));
        assert!(input.is_key_event(Key::W, KeyAction::Held));

        input.set_key(Key::W, false);
        assert!(input.is_key_event(Key::W, KeyAction::Release));
        assert!(!input.is_key_event(Key::W, KeyAction::Held));
    }

    #[test]
    fn mouse_motion_accumulates_until_frame_end() {
        let mut input = InputState::new();
        input.add_mouse_motion(Vec2::new(1.0, 2.0));
        input.add_mouse_motion(Vec2::new(3.0, -1.0));
        assert_eq!(input.mouse_delta(), Vec2::new(4.0, 1.0));
        input.end_frame();
        assert_eq!(input.mouse_delta(), Vec2::ZERO);
    }

    #[test]
    fn unmapped_keys_are_ignored() {
        assert_eq!(map_winit_key(keyboard::KeyCode::KeyW), Some(Key::W));
        assert_eq!(map_winit_key(keyboard::KeyCode::F7), None);
    }
}
