use crate::core::scene::SceneGraph;
use crate::types::{CameraState, Viewport};

/// Scene renderer bound to a render surface
pub trait SceneRenderer {
    /// Resize the drawing surface to the viewport's physical size
    fn resize(&mut self, viewport: &Viewport);

    /// Draw one frame of `scene` from `camera`
    fn render(&mut self, scene: &SceneGraph, camera: &CameraState) -> anyhow::Result<()>;

    /// Free GPU buffers and textures. Rendering after release is a no-op.
    fn release(&mut self);
}
