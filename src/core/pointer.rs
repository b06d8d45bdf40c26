/// Pointer button identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointerButton {
    Primary,
    Secondary,
    Middle,
}

/// Host-independent pointer input, positions in logical pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    Down { button: PointerButton, x: f32, y: f32 },
    Move { x: f32, y: f32 },
    Up { button: PointerButton },
    /// Positive `delta_y` scrolls away from the user (zoom out)
    Wheel { delta_y: f32 },
    /// Pointer left the surface; ends any drag
    Cancel,
}
