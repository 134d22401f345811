//! Input handling.
//!
//! [`Input`] folds raw window events into per-frame state, tracking both
//! instantaneous events (key just pressed) and continuous state (button held
//! down). [`KeyBindings`] turns fresh key presses into [`Command`]s, and
//! [`Input::frame_input`] packages everything the orchestrator needs.

use glam::Vec2;
use std::collections::{HashMap, HashSet};
use winit::event::{ElementState, MouseButton as WinitMouseButton, MouseScrollDelta, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

use crate::orchestrator::{Command, FrameInput};

/// Mouse button identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

impl From<WinitMouseButton> for MouseButton {
    fn from(btn: WinitMouseButton) -> Self {
        match btn {
            WinitMouseButton::Left => MouseButton::Left,
            WinitMouseButton::Right => MouseButton::Right,
            WinitMouseButton::Middle => MouseButton::Middle,
            _ => MouseButton::Left, // Default for other buttons
        }
    }
}

/// Which keys issue which commands.
#[derive(Debug, Clone)]
pub struct KeyBindings {
    bindings: HashMap<KeyCode, Command>,
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self::new()
            .bind(KeyCode::F1, Command::ToggleUi)
            .bind(KeyCode::F2, Command::Reseed)
            .bind(KeyCode::F3, Command::ToggleDepthOfField)
            .bind(KeyCode::F4, Command::ToggleAutoRotate)
            .bind(KeyCode::Space, Command::TogglePause)
    }
}

impl KeyBindings {
    /// An empty table.
    pub fn new() -> Self {
        Self {
            bindings: HashMap::new(),
        }
    }

    /// Bind `key`, replacing any previous binding for it.
    pub fn bind(mut self, key: KeyCode, command: Command) -> Self {
        self.bindings.insert(key, command);
        self
    }

    pub fn command(&self, key: KeyCode) -> Option<Command> {
        self.bindings.get(&key).copied()
    }
}

/// Current input state.
#[derive(Debug, Default)]
pub struct Input {
    // Key state
    keys_held: HashSet<KeyCode>,
    keys_pressed: Vec<KeyCode>,

    // Mouse button state
    mouse_held: HashSet<MouseButton>,
    mouse_pressed: HashSet<MouseButton>,

    // Mouse position
    mouse_position: Option<Vec2>,
    mouse_delta: Vec2,

    // Scroll
    scroll_delta: f32,
}

impl Input {
    /// Create a new input tracker.
    pub fn new() -> Self {
        Self::default()
    }

    // ========== Key Queries ==========

    /// Check if a key was pressed this frame (just went down).
    pub fn key_pressed(&self, key: KeyCode) -> bool {
        self.keys_pressed.contains(&key)
    }

    /// Check if a key is currently held down.
    pub fn key_held(&self, key: KeyCode) -> bool {
        self.keys_held.contains(&key)
    }

    // ========== Mouse Queries ==========

    /// Check if a mouse button was pressed this frame.
    pub fn mouse_pressed(&self, button: MouseButton) -> bool {
        self.mouse_pressed.contains(&button)
    }

    /// Check if a mouse button is currently held down.
    pub fn mouse_held(&self, button: MouseButton) -> bool {
        self.mouse_held.contains(&button)
    }

    /// Pointer movement accumulated this frame, in pixels.
    pub fn mouse_delta(&self) -> Vec2 {
        self.mouse_delta
    }

    /// Scroll accumulated this frame, in lines. Positive is up/forward.
    pub fn scroll_delta(&self) -> f32 {
        self.scroll_delta
    }

    // ========== Frame Handling ==========

    /// Commands for this frame's key presses, camera drag and scroll.
    pub fn frame_input(&self, bindings: &KeyBindings, dt: f32) -> FrameInput {
        let commands = self
            .keys_pressed
            .iter()
            .filter_map(|&key| bindings.command(key))
            .collect();
        let drag = if self.mouse_held(MouseButton::Left) {
            self.mouse_delta
        } else {
            Vec2::ZERO
        };
        FrameInput {
            commands,
            drag,
            scroll: self.scroll_delta,
            dt,
        }
    }

    /// Clear per-frame state. Call after the frame has consumed it.
    pub fn end_frame(&mut self) {
        self.keys_pressed.clear();
        self.mouse_pressed.clear();
        self.mouse_delta = Vec2::ZERO;
        self.scroll_delta = 0.0;
    }

    fn press_key(&mut self, key: KeyCode) {
        // Only fire pressed event if not already held (no repeat)
        if self.keys_held.insert(key) {
            self.keys_pressed.push(key);
        }
    }

    fn release_key(&mut self, key: KeyCode) {
        self.keys_held.remove(&key);
    }

    fn move_cursor(&mut self, position: Vec2) {
        if let Some(last) = self.mouse_position {
            self.mouse_delta += position - last;
        }
        self.mouse_position = Some(position);
    }

    /// Process a winit window event.
    pub fn handle_event(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::KeyboardInput { event, .. } => {
                if let PhysicalKey::Code(key) = event.physical_key {
                    match event.state {
                        ElementState::Pressed => self.press_key(key),
                        ElementState::Released => self.release_key(key),
                    }
                }
            }

            WindowEvent::MouseInput { state, button, .. } => {
                let btn = MouseButton::from(*button);
                match state {
                    ElementState::Pressed => {
                        self.mouse_pressed.insert(btn);
                        self.mouse_held.insert(btn);
                    }
                    ElementState::Released => {
                        self.mouse_held.remove(&btn);
                    }
                }
            }

            WindowEvent::CursorMoved { position, .. } => {
                self.move_cursor(Vec2::new(position.x as f32, position.y as f32));
            }

            WindowEvent::CursorLeft { .. } => {
                self.mouse_position = None;
            }

            WindowEvent::MouseWheel { delta, .. } => {
                self.scroll_delta += match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / 100.0,
                };
            }

            _ => {}
        }
    }
}
