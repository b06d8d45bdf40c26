use futures::future::LocalBoxFuture;

use crate::core::session::ReferenceSpace;
use crate::error::CapabilityProbeError;
use crate::types::TrackedPose;

/// Host API for immersive sessions
pub trait XrRuntime {
    /// `None` when the host has no immersive API at all
    fn probe_support(&self)
        -> Option<LocalBoxFuture<'static, Result<bool, CapabilityProbeError>>>;

    fn request_session(&self) -> LocalBoxFuture<'static, anyhow::Result<Box<dyn XrSession>>>;
}

/// A granted immersive session
pub trait XrSession {
    /// Tracking space the session reports poses in
    fn reference_space(&self) -> ReferenceSpace;

    /// Latest head pose in tracking space, if tracking is available
    fn viewer_pose(&self) -> Option<TrackedPose>;

    /// True once the host has ended the session on its own
    fn is_ended(&self) -> bool;

    fn end(&self) -> LocalBoxFuture<'static, anyhow::Result<()>>;
}
