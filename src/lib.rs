pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod frame;
pub mod loaders;
pub mod math;
pub mod traits;
pub mod types;
pub mod xr;

pub use config::ViewerConfig;
pub use core::{Viewer, ViewerHost};
pub use error::{
    AssetKind, AssetLoadError, CapabilityProbeError, ConfigurationError, SessionTransitionError,
    ViewerError,
};
pub use frame::{FrameInfo, FrameSource};
pub use types::{CameraPose, CameraState, TrackedPose, Viewport};
