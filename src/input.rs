//! Viewer input state.
//!
//! Tracks held keys, per-frame key presses, the orbit drag and scroll from
//! raw winit window events. The viewer reads it once per frame and then
//! calls [`Input::begin_frame`].

use std::collections::HashSet;

use glam::Vec2;
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

/// Pixel scroll is divided by this to match one wheel line.
const PIXELS_PER_LINE: f32 = 100.0;

#[derive(Debug, Default)]
pub struct Input {
    keys_held: HashSet<KeyCode>,
    keys_pressed: HashSet<KeyCode>,
    dragging: bool,
    cursor: Option<Vec2>,
    drag_delta: Vec2,
    scroll: f32,
}

impl Input {
    pub fn new() -> Self {
        Self::default()
    }

    /// Key went down this frame. Auto-repeat does not count.
    pub fn key_pressed(&self, key: KeyCode) -> bool {
        self.keys_pressed.contains(&key)
    }

    pub fn key_held(&self, key: KeyCode) -> bool {
        self.keys_held.contains(&key)
    }

    /// Cursor movement in pixels while the left button was held this frame.
    pub fn drag_delta(&self) -> Vec2 {
        self.drag_delta
    }

    /// Wheel lines scrolled this frame; positive is away from the user.
    pub fn scroll(&self) -> f32 {
        self.scroll
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    /// Direction from the held arrow keys, in screen axes (`x` right, `y` up).
    pub fn arrow_axis(&self) -> Vec2 {
        let mut axis = Vec2::ZERO;
        if self.key_held(KeyCode::ArrowRight) {
            axis.x += 1.0;
        }
        if self.key_held(KeyCode::ArrowLeft) {
            axis.x -= 1.0;
        }
        if self.key_held(KeyCode::ArrowUp) {
            axis.y += 1.0;
        }
        if self.key_held(KeyCode::ArrowDown) {
            axis.y -= 1.0;
        }
        axis
    }

    /// Clear per-frame state. Held keys and the drag flag persist.
    pub fn begin_frame(&mut self) {
        self.keys_pressed.clear();
        self.drag_delta = Vec2::ZERO;
        self.scroll = 0.0;
    }

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
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => self.set_dragging(*state == ElementState::Pressed),
            WindowEvent::CursorMoved { position, .. } => {
                self.move_cursor(Vec2::new(position.x as f32, position.y as f32));
            }
            WindowEvent::CursorLeft { .. } => self.cursor = None,
            WindowEvent::MouseWheel { delta, .. } => {
                self.scroll += match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / PIXELS_PER_LINE,
                };
            }
            WindowEvent::Focused(false) => {
                self.keys_held.clear();
                self.dragging = false;
            }
            _ => {}
        }
    }

    fn press_key(&mut self, key: KeyCode) {
        if self.keys_held.insert(key) {
            self.keys_pressed.insert(key);
        }
    }

    fn release_key(&mut self, key: KeyCode) {
        self.keys_held.remove(&key);
    }

    fn set_dragging(&mut self, dragging: bool) {
        self.dragging = dragging;
    }

    fn move_cursor(&mut self, position: Vec2) {
        if let Some(previous) = self.cursor {
            if self.dragging {
                self.drag_delta += position - previous;
            }
        }
        self.cursor = Some(position);
    }
}
