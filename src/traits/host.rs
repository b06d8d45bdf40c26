use crate::frame::FrameSource;
use crate::types::Viewport;

/// Element the render surface is attached to; also the source of the viewport size
pub trait HostContainer {
    /// Current logical size and pixel ratio
    fn viewport(&self) -> Viewport;

    /// Make the render surface part of the host
    fn attach_surface(&self);

    /// Remove the render surface from the host
    fn detach_surface(&self);
}

/// Native per-frame callback mechanism
pub trait FrameDriver {
    /// Arm the next frame callback from the given source
    fn request_frame(&self, source: FrameSource);
}
