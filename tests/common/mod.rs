#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use futures::channel::oneshot;
use futures::executor::LocalPool;
use futures::future::{self, LocalBoxFuture};
use glam::{Quat, Vec3};
use immersive_viewer::config::{DecoderConfig, ViewerConfig};
use immersive_viewer::core::{
    EnvironmentMap, MeshData, ModelGraph, Overlay, OverlayElement, PointerEvent, ReferenceSpace,
    SceneGraph, Signal, Viewer, ViewerHost,
};
use immersive_viewer::error::CapabilityProbeError;
use immersive_viewer::frame::FrameSource;
use immersive_viewer::traits::{
    AssetFetcher, EnvironmentDecoder, FrameDriver, HostContainer, ModelDecoder, ProgressCallback,
    SceneRenderer, XrRuntime, XrSession,
};
use immersive_viewer::types::{CameraState, TrackedPose, Viewport};

/// Shared log of teardown calls, in order
pub type CallLog = Rc<RefCell<Vec<&'static str>>>;

// ============================================================================
// Renderer and host
// ============================================================================

pub struct MockRenderer {
    pub resizes: Vec<Viewport>,
    pub renders: usize,
    pub releases: usize,
    pub last_camera: Option<CameraState>,
    pub fail_renders: bool,
    log: CallLog,
}

impl MockRenderer {
    pub fn new(log: CallLog) -> Self {
        Self {
            resizes: Vec::new(),
            renders: 0,
            releases: 0,
            last_camera: None,
            fail_renders: false,
            log,
        }
    }
}

impl SceneRenderer for MockRenderer {
    fn resize(&mut self, viewport: &Viewport) {
        self.resizes.push(*viewport);
    }

    fn render(&mut self, _scene: &SceneGraph, camera: &CameraState) -> anyhow::Result<()> {
        self.renders += 1;
        self.last_camera = Some(*camera);
        if self.fail_renders {
            anyhow::bail!("device lost");
        }
        Ok(())
    }

    fn release(&mut self) {
        self.releases += 1;
        self.log.borrow_mut().push("renderer");
    }
}

pub struct MockHost {
    pub viewport: Cell<Viewport>,
    pub attached: Cell<bool>,
    pub frame_requests: RefCell<Vec<FrameSource>>,
    log: CallLog,
}

impl MockHost {
    pub fn new(viewport: Viewport, log: CallLog) -> Self {
        Self {
            viewport: Cell::new(viewport),
            attached: Cell::new(false),
            frame_requests: RefCell::new(Vec::new()),
            log,
        }
    }
}

impl HostContainer for MockHost {
    fn viewport(&self) -> Viewport {
        self.viewport.get()
    }

    fn attach_surface(&self) {
        self.attached.set(true);
    }

    fn detach_surface(&self) {
        self.attached.set(false);
        self.log.borrow_mut().push("surface");
    }
}

impl FrameDriver for MockHost {
    fn request_frame(&self, source: FrameSource) {
        self.frame_requests.borrow_mut().push(source);
    }
}

// ============================================================================
// Assets
// ============================================================================

/// Serves canned bytes; URLs marked as gated wait until released by the test
#[derive(Default)]
pub struct MockFetcher {
    responses: RefCell<HashMap<String, Vec<u8>>>,
    gated: RefCell<HashMap<String, Option<oneshot::Sender<()>>>>,
    pub requests: RefCell<Vec<String>>,
}

impl MockFetcher {
    pub fn serve(&self, url: &str, bytes: &[u8]) {
        self.responses
            .borrow_mut()
            .insert(url.to_string(), bytes.to_vec());
    }

    pub fn gate(&self, url: &str) {
        self.gated.borrow_mut().insert(url.to_string(), None);
    }

    /// Let a gated fetch complete; returns false if it was never requested
    pub fn release(&self, url: &str) -> bool {
        match self.gated.borrow_mut().get_mut(url).and_then(Option::take) {
            Some(sender) => sender.send(()).is_ok(),
            None => false,
        }
    }
}

impl AssetFetcher for MockFetcher {
    fn fetch(
        &self,
        url: &str,
        on_progress: ProgressCallback,
    ) -> LocalBoxFuture<'static, anyhow::Result<Vec<u8>>> {
        self.requests.borrow_mut().push(url.to_string());
        let response = self.responses.borrow().get(url).cloned();
        let url = url.to_string();

        let gate = match self.gated.borrow_mut().get_mut(&url) {
            Some(slot) => {
                let (sender, receiver) = oneshot::channel();
                *slot = Some(sender);
                Some(receiver)
            }
            None => None,
        };

        Box::pin(async move {
            if let Some(receiver) = gate {
                receiver
                    .await
                    .map_err(|_| anyhow::anyhow!("fetch of {} cancelled", url))?;
            }
            let bytes = response.ok_or_else(|| anyhow::anyhow!("404 Not Found: {}", url))?;
            on_progress(bytes.len() as u64 / 2, Some(bytes.len() as u64));
            on_progress(bytes.len() as u64, Some(bytes.len() as u64));
            Ok(bytes)
        })
    }
}

/// Axis-aligned box spanning `min`..`max`, two triangles per face
pub fn box_model(min: Vec3, max: Vec3) -> ModelGraph {
    let positions: Vec<Vec3> = (0..8)
        .map(|i| {
            Vec3::new(
                if i & 1 == 0 { min.x } else { max.x },
                if i & 2 == 0 { min.y } else { max.y },
                if i & 4 == 0 { min.z } else { max.z },
            )
        })
        .collect();
    let indices = vec![
        0, 1, 3, 0, 3, 2, 4, 6, 7, 4, 7, 5, 0, 4, 5, 0, 5, 1, 2, 3, 7, 2, 7, 6, 0, 2, 6, 0, 6,
        4, 1, 5, 7, 1, 7, 3,
    ];
    ModelGraph {
        name: "box".to_string(),
        meshes: vec![MeshData {
            normals: Vec::new(),
            positions,
            indices,
            base_color: [0.8, 0.8, 0.8, 1.0],
        }],
    }
}

/// Decodes any payload to a fixed model, except payloads starting with `corrupt`
pub struct MockModelDecoder {
    pub model: ModelGraph,
    pub decoded: Cell<usize>,
}

impl MockModelDecoder {
    pub fn new(model: ModelGraph) -> Self {
        Self {
            model,
            decoded: Cell::new(0),
        }
    }
}

impl ModelDecoder for MockModelDecoder {
    fn decode(&self, bytes: &[u8], _config: &DecoderConfig) -> anyhow::Result<ModelGraph> {
        if bytes.starts_with(b"corrupt") {
            anyhow::bail!("invalid glTF header");
        }
        self.decoded.set(self.decoded.get() + 1);
        Ok(self.model.clone())
    }
}

pub struct MockEnvironmentDecoder;

impl EnvironmentDecoder for MockEnvironmentDecoder {
    fn decode(&self, bytes: &[u8]) -> anyhow::Result<EnvironmentMap> {
        if bytes.starts_with(b"corrupt") {
            anyhow::bail!("invalid radiance header");
        }
        Ok(EnvironmentMap {
            width: 2,
            height: 1,
            texels: vec![Vec3::splat(0.5), Vec3::splat(1.5)],
        })
    }
}

// ============================================================================
// Immersive runtime
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    /// Host has no immersive API at all
    Absent,
    Supported,
    Unsupported,
    Fails,
    /// Resolves only when the test calls `resolve_probe`
    Deferred,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grant {
    Immediate,
    /// Resolves only when the test calls `grant`
    Deferred,
    Denied,
}

/// Observable state of one session handed out by [`MockXr`]
pub struct SessionProbe {
    pub ended: Cell<bool>,
    pub end_calls: Cell<usize>,
    /// When set, `end` is refused and the session stays live
    pub refuse_end: Cell<bool>,
    pub pose: Cell<Option<TrackedPose>>,
}

struct MockSession {
    probe: Rc<SessionProbe>,
}

impl XrSession for MockSession {
    fn reference_space(&self) -> ReferenceSpace {
        ReferenceSpace::default()
    }

    fn viewer_pose(&self) -> Option<TrackedPose> {
        self.probe.pose.get()
    }

    fn is_ended(&self) -> bool {
        self.probe.ended.get()
    }

    fn end(&self) -> LocalBoxFuture<'static, anyhow::Result<()>> {
        self.probe.end_calls.set(self.probe.end_calls.get() + 1);
        if self.probe.refuse_end.get() {
            return Box::pin(future::ready(Err(anyhow::anyhow!("runtime refused to end"))));
        }
        self.probe.ended.set(true);
        Box::pin(future::ready(Ok(())))
    }
}

pub struct MockXr {
    probe: Probe,
    grant: Grant,
    probe_sender: RefCell<Option<oneshot::Sender<bool>>>,
    grant_sender: RefCell<Option<oneshot::Sender<()>>>,
    pub session_requests: Cell<usize>,
    pub sessions: Rc<RefCell<Vec<Rc<SessionProbe>>>>,
}

impl MockXr {
    pub fn new(probe: Probe, grant: Grant) -> Self {
        Self {
            probe,
            grant,
            probe_sender: RefCell::new(None),
            grant_sender: RefCell::new(None),
            session_requests: Cell::new(0),
            sessions: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn supported() -> Self {
        Self::new(Probe::Supported, Grant::Immediate)
    }

    pub fn resolve_probe(&self, supported: bool) -> bool {
        match self.probe_sender.borrow_mut().take() {
            Some(sender) => sender.send(supported).is_ok(),
            None => false,
        }
    }

    pub fn grant(&self) -> bool {
        match self.grant_sender.borrow_mut().take() {
            Some(sender) => sender.send(()).is_ok(),
            None => false,
        }
    }

    pub fn last_session(&self) -> Option<Rc<SessionProbe>> {
        self.sessions.borrow().last().cloned()
    }
}

impl XrRuntime for MockXr {
    fn probe_support(
        &self,
    ) -> Option<LocalBoxFuture<'static, Result<bool, CapabilityProbeError>>> {
        let resolved = match self.probe {
            Probe::Absent => return None,
            Probe::Supported => Ok(true),
            Probe::Unsupported => Ok(false),
            Probe::Fails => Err(CapabilityProbeError("permission denied".to_string())),
            Probe::Deferred => {
                let (sender, receiver) = oneshot::channel();
                *self.probe_sender.borrow_mut() = Some(sender);
                return Some(Box::pin(async move {
                    receiver
                        .await
                        .map_err(|_| CapabilityProbeError("probe dropped".to_string()))
                }));
            }
        };
        Some(Box::pin(future::ready(resolved)))
    }

    fn request_session(&self) -> LocalBoxFuture<'static, anyhow::Result<Box<dyn XrSession>>> {
        self.session_requests.set(self.session_requests.get() + 1);
        let gate = match self.grant {
            Grant::Denied => {
                return Box::pin(future::ready(Err(anyhow::anyhow!(
                    "user denied the session request"
                ))))
            }
            Grant::Immediate => None,
            Grant::Deferred => {
                let (sender, receiver) = oneshot::channel();
                *self.grant_sender.borrow_mut() = Some(sender);
                Some(receiver)
            }
        };
        let sessions = self.sessions.clone();

        Box::pin(async move {
            if let Some(receiver) = gate {
                receiver
                    .await
                    .map_err(|_| anyhow::anyhow!("session request abandoned"))?;
            }
            let probe = Rc::new(SessionProbe {
                ended: Cell::new(false),
                end_calls: Cell::new(0),
                refuse_end: Cell::new(false),
                pose: Cell::new(Some(TrackedPose::new(
                    Vec3::new(0.0, 1.6, 0.0),
                    Quat::IDENTITY,
                ))),
            });
            sessions.borrow_mut().push(probe.clone());
            Ok(Box::new(MockSession { probe }) as Box<dyn XrSession>)
        })
    }
}

// ============================================================================
// Harness
// ============================================================================

pub const MODEL_URL: &str = "/models/house.glb";
pub const ENVIRONMENT_URL: &str = "/env/sky.hdr";

pub struct Harness {
    pub pool: LocalPool,
    pub viewer: Viewer,
    pub renderer: Rc<RefCell<MockRenderer>>,
    pub host: Rc<MockHost>,
    pub fetcher: Rc<MockFetcher>,
    pub xr: Rc<MockXr>,
    pub overlay: Overlay,
    pub pointer: Signal<PointerEvent>,
    pub resize: Signal<Viewport>,
    pub log: CallLog,
}

/// Config with no assets, so tests opt into the loads they need
pub fn bare_config() -> ViewerConfig {
    let mut config = ViewerConfig::default();
    config.assets.model_url = None;
    config.assets.environment_url = None;
    config
}

pub struct HarnessBuilder {
    config: ViewerConfig,
    xr: MockXr,
    fetcher: MockFetcher,
    model: ModelGraph,
    viewport: Viewport,
}

impl HarnessBuilder {
    pub fn new() -> Self {
        Self {
            config: bare_config(),
            xr: MockXr::new(Probe::Absent, Grant::Immediate),
            fetcher: MockFetcher::default(),
            model: box_model(Vec3::new(-5.0, 0.0, -5.0), Vec3::new(5.0, 3.0, 5.0)),
            viewport: Viewport::new(800, 600, 1.0),
        }
    }

    pub fn config(mut self, config: ViewerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn xr(mut self, xr: MockXr) -> Self {
        self.xr = xr;
        self
    }

    pub fn fetcher(mut self, fetcher: MockFetcher) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub fn model(mut self, model: ModelGraph) -> Self {
        self.model = model;
        self
    }

    pub fn viewport(mut self, viewport: Viewport) -> Self {
        self.viewport = viewport;
        self
    }

    pub fn build(self) -> Harness {
        let log: CallLog = Rc::new(RefCell::new(Vec::new()));
        let pool = LocalPool::new();
        let renderer = Rc::new(RefCell::new(MockRenderer::new(log.clone())));
        let host = Rc::new(MockHost::new(self.viewport, log.clone()));
        let fetcher = Rc::new(self.fetcher);
        let xr = Rc::new(self.xr);
        let overlay = Overlay::new();
        let pointer = Signal::new();
        let resize = Signal::new();

        let scene_renderer: Rc<RefCell<dyn SceneRenderer>> = renderer.clone();
        let viewer = Viewer::new(
            self.config,
            ViewerHost {
                container: host.clone(),
                renderer: scene_renderer,
                frame_driver: host.clone(),
                xr: xr.clone(),
                fetcher: fetcher.clone(),
                model_decoder: Rc::new(MockModelDecoder::new(self.model)),
                environment_decoder: Rc::new(MockEnvironmentDecoder),
                overlay: overlay.clone(),
                resize: resize.clone(),
                pointer: pointer.clone(),
            },
            pool.spawner(),
        )
        .expect("valid test config");

        Harness {
            pool,
            viewer,
            renderer,
            host,
            fetcher,
            xr,
            overlay,
            pointer,
            resize,
            log,
        }
    }
}

impl Harness {
    /// Drive spawned work until nothing more can progress
    pub fn run(&mut self) {
        self.pool.run_until_stalled();
    }

    /// Tick `n` frames of 1/60 s, running the executor between them
    pub fn frames(&mut self, n: usize) {
        for _ in 0..n {
            self.run();
            self.viewer.tick(1.0 / 60.0);
        }
        self.run();
    }

    pub fn activation_label(&self) -> Option<String> {
        self.overlay
            .elements()
            .into_iter()
            .find_map(|(_, element)| match element {
                OverlayElement::ActivationControl { label } => Some(label),
                _ => None,
            })
    }

    pub fn notice(&self) -> Option<String> {
        self.overlay
            .elements()
            .into_iter()
            .find_map(|(_, element)| match element {
                OverlayElement::FallbackNotice { text } => Some(text),
                _ => None,
            })
    }

    /// Click the activation control the way the overlay layer would
    pub fn click_activation(&mut self) {
        let id = self
            .overlay
            .elements()
            .into_iter()
            .find_map(|(id, element)| {
                matches!(element, OverlayElement::ActivationControl { .. }).then_some(id)
            })
            .expect("activation control present");
        self.overlay.activate(id);
    }

    pub fn drag(&self, from: (f32, f32), to: (f32, f32)) {
        use immersive_viewer::core::PointerButton;
        self.pointer.emit(&PointerEvent::Down {
            button: PointerButton::Primary,
            x: from.0,
            y: from.1,
        });
        self.pointer.emit(&PointerEvent::Move { x: to.0, y: to.1 });
        self.pointer.emit(&PointerEvent::Up {
            button: PointerButton::Primary,
        });
    }
}
