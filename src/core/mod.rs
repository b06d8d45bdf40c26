pub mod asset;
pub mod clock;
pub mod disposable;
pub mod gpu_context;
pub mod input_adapter;
pub mod lifecycle;
pub mod navigation;
pub mod overlay;
pub mod pipeline;
pub mod pointer;
pub mod scene;
pub mod scheduler;
pub mod session;
pub mod signal;
pub mod surface_renderer;

pub use asset::{AssetHandle, AssetSlot, LoadProgress};
pub use clock::Clock;
pub use disposable::{DisposableSet, DisposedFlag};
pub use gpu_context::GpuContext;
pub use input_adapter::PointerAdapter;
pub use lifecycle::{Viewer, ViewerHost};
pub use navigation::NavigationController;
pub use overlay::{ElementId, Overlay, OverlayAction, OverlayElement};
pub use pipeline::{eye_level_pose, AssetPipeline, AssetSources};
pub use pointer::{PointerButton, PointerEvent};
pub use scene::{EnvironmentMap, Lighting, LightingMode, MeshData, ModelGraph, SceneGraph};
pub use scheduler::RenderLoopScheduler;
pub use session::{ImmersiveSessionManager, ReferenceSpace, SessionState};
pub use signal::{Signal, Subscription};
pub use surface_renderer::WgpuRenderer;
