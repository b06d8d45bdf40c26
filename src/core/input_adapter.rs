use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};

use super::pointer::{PointerButton, PointerEvent};

/// Pixels per wheel line, for mice that report line deltas
const LINE_HEIGHT: f32 = 100.0;

/// Adapter that bridges Winit window events to host-independent pointer events
#[derive(Debug, Clone)]
pub struct PointerAdapter {
    /// Last cursor position in logical pixels
    cursor: Option<(f32, f32)>,
    scale_factor: f64,
}

impl PointerAdapter {
    pub fn new(scale_factor: f64) -> Self {
        Self {
            cursor: None,
            scale_factor,
        }
    }

    pub fn set_scale_factor(&mut self, scale_factor: f64) {
        self.scale_factor = scale_factor;
    }

    pub fn cursor(&self) -> Option<(f32, f32)> {
        self.cursor
    }

    /// Translate one window event; returns `None` for events that are not pointer input
    pub fn translate(&mut self, event: &WindowEvent) -> Option<PointerEvent> {
        match event {
            WindowEvent::CursorMoved { position, .. } => {
                let logical = position.to_logical::<f32>(self.scale_factor);
                self.cursor = Some((logical.x, logical.y));
                Some(PointerEvent::Move {
                    x: logical.x,
                    y: logical.y,
                })
            }
            WindowEvent::CursorLeft { .. } => {
                self.cursor = None;
                Some(PointerEvent::Cancel)
            }
            WindowEvent::MouseInput { state, button, .. } => {
                let button = Self::map_button(*button)?;
                match state {
                    ElementState::Pressed => {
                        let (x, y) = self.cursor?;
                        Some(PointerEvent::Down { button, x, y })
                    }
                    ElementState::Released => Some(PointerEvent::Up { button }),
                }
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let delta_y = Self::wheel_delta(*delta, self.scale_factor);
                (delta_y != 0.0).then_some(PointerEvent::Wheel { delta_y })
            }
            WindowEvent::Focused(false) => Some(PointerEvent::Cancel),
            _ => None,
        }
    }

    /// Winit reports scroll toward the user as positive; pointer events use
    /// the opposite convention
    pub fn wheel_delta(delta: MouseScrollDelta, scale_factor: f64) -> f32 {
        match delta {
            MouseScrollDelta::LineDelta(_, y) => -y * LINE_HEIGHT,
            MouseScrollDelta::PixelDelta(position) => {
                -(position.to_logical::<f32>(scale_factor).y)
            }
        }
    }

    pub fn map_button(button: MouseButton) -> Option<PointerButton> {
        match button {
            MouseButton::Left => Some(PointerButton::Primary),
            MouseButton::Right => Some(PointerButton::Secondary),
            MouseButton::Middle => Some(PointerButton::Middle),
            _ => None,
        }
    }
}

impl Default for PointerAdapter {
    fn default() -> Self {
        Self::new(1.0)
    }
}
