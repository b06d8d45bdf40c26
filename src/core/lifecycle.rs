use std::cell::{Cell, RefCell};
use std::rc::Rc;

use futures::executor::LocalSpawner;

use super::asset::{AssetHandle, AssetSlot, LoadProgress};
use super::disposable::{DisposableSet, DisposedFlag};
use super::navigation::NavigationController;
use super::overlay::{Overlay, OverlayAction};
use super::pipeline::{AssetPipeline, AssetSources};
use super::pointer::PointerEvent;
use super::scene::{EnvironmentMap, Lighting, ModelGraph, SceneGraph};
use super::scheduler::RenderLoopScheduler;
use super::session::{ImmersiveSessionManager, SessionState};
use super::signal::Signal;
use crate::config::ViewerConfig;
use crate::error::{AssetKind, AssetLoadError, ConfigurationError, SessionTransitionError};
use crate::frame::{FrameInfo, FrameSource};
use crate::traits::{
    AssetFetcher, EnvironmentDecoder, FrameDriver, HostContainer, ModelDecoder, SceneRenderer,
    XrRuntime,
};
use crate::types::{CameraState, Viewport};

/// Everything the viewer needs from its host
pub struct ViewerHost {
    pub container: Rc<dyn HostContainer>,
    pub renderer: Rc<RefCell<dyn SceneRenderer>>,
    pub frame_driver: Rc<dyn FrameDriver>,
    pub xr: Rc<dyn XrRuntime>,
    pub fetcher: Rc<dyn AssetFetcher>,
    pub model_decoder: Rc<dyn ModelDecoder>,
    pub environment_decoder: Rc<dyn EnvironmentDecoder>,
    /// Shared with the renderer, which draws it
    pub overlay: Overlay,
    pub resize: Signal<Viewport>,
    pub pointer: Signal<PointerEvent>,
}

/// Owns every viewer component from construction to teardown.
///
/// Construction order: render surface, container attachment, navigation,
/// session manager, asset loads, render loop, resize observer. Each step
/// registers its release; [`Viewer::dispose`] runs them in reverse.
pub struct Viewer {
    viewport: Rc<Cell<Viewport>>,
    scene: Rc<RefCell<SceneGraph>>,
    navigation: Rc<RefCell<NavigationController>>,
    session: Rc<RefCell<ImmersiveSessionManager>>,
    scheduler: Rc<RefCell<RenderLoopScheduler>>,
    pipeline: AssetPipeline,
    renderer: Rc<RefCell<dyn SceneRenderer>>,
    overlay: Overlay,
    model: Option<AssetSlot<ModelGraph>>,
    environment: Option<AssetSlot<EnvironmentMap>>,
    config: ViewerConfig,
    disposables: DisposableSet,
    disposed: DisposedFlag,
}

fn apply_resize(
    viewport: &Cell<Viewport>,
    navigation: &RefCell<NavigationController>,
    renderer: &RefCell<dyn SceneRenderer>,
    size: Viewport,
) {
    viewport.set(size);
    navigation.borrow_mut().set_viewport(&size);
    renderer.borrow_mut().resize(&size);
}

impl Viewer {
    pub fn new(
        config: ViewerConfig,
        host: ViewerHost,
        spawner: LocalSpawner,
    ) -> Result<Self, ConfigurationError> {
        config.validate()?;

        let disposed = DisposedFlag::new();
        let mut disposables = DisposableSet::new();

        let initial = host.container.viewport();
        host.renderer.borrow_mut().resize(&initial);
        let renderer = host.renderer.clone();
        disposables.push("renderer", move || renderer.borrow_mut().release());

        host.container.attach_surface();
        let container = host.container.clone();
        disposables.push("render surface", move || container.detach_surface());

        let camera = CameraState::new(
            config.camera.default_pose(),
            config.camera.fov_degrees,
            config.camera.near,
            config.camera.far,
            initial.aspect(),
        );
        let mut navigation = match NavigationController::new(camera, config.navigation.clone()) {
            Ok(navigation) => navigation,
            Err(e) => {
                disposables.dispose();
                return Err(e);
            }
        };
        navigation.set_viewport(&initial);
        let navigation = Rc::new(RefCell::new(navigation));
        disposables.push_subscription(
            "pointer listener",
            NavigationController::attach(&navigation, &host.pointer),
        );

        let session = ImmersiveSessionManager::new(
            host.xr.clone(),
            navigation.clone(),
            host.overlay.clone(),
            config.session.clone(),
            spawner.clone(),
            disposed.clone(),
        );
        let session_handle = session.clone();
        disposables.push("session manager", move || session_handle.borrow_mut().dispose());

        let scene = Rc::new(RefCell::new(SceneGraph::new(Lighting::from_config(
            &config.lighting,
        ))));
        let pipeline = AssetPipeline::new(
            AssetSources {
                fetcher: host.fetcher.clone(),
                model_decoder: host.model_decoder.clone(),
                environment_decoder: host.environment_decoder.clone(),
            },
            scene.clone(),
            navigation.clone(),
            spawner,
            disposed.clone(),
            config.camera.clone(),
            config.assets.bounds_padding,
        );
        let environment = config
            .assets
            .environment_url
            .as_deref()
            .map(|url| pipeline.load_environment(url));
        let model = config
            .assets
            .model_url
            .as_deref()
            .map(|url| pipeline.load_model(url, &config.assets.decoder));
        let slots = (environment.clone(), model.clone());
        disposables.push("asset loads", move || {
            let pending = slots.0.iter().filter(|slot| slot.is_pending()).count()
                + slots.1.iter().filter(|slot| slot.is_pending()).count();
            if pending > 0 {
                log::debug!("orphaning {} pending asset loads", pending);
            }
        });

        let scheduler = Rc::new(RefCell::new(RenderLoopScheduler::new(
            navigation.clone(),
            scene.clone(),
            host.renderer.clone(),
            session.clone(),
            host.frame_driver.clone(),
        )));
        scheduler.borrow_mut().start();
        let scheduler_handle = scheduler.clone();
        disposables.push("render loop", move || scheduler_handle.borrow_mut().stop());

        let viewport = Rc::new(Cell::new(initial));
        let resize_listener = {
            let viewport = viewport.clone();
            let navigation = navigation.clone();
            let renderer = host.renderer.clone();
            host.resize
                .subscribe(move |size| apply_resize(&viewport, &navigation, &renderer, *size))
        };
        disposables.push_subscription("resize listener", resize_listener);

        log::info!(
            "viewer ready ({}x{} @{}x)",
            initial.width,
            initial.height,
            initial.pixel_ratio
        );

        Ok(Self {
            viewport,
            scene,
            navigation,
            session,
            scheduler,
            pipeline,
            renderer: host.renderer,
            overlay: host.overlay,
            model,
            environment,
            config,
            disposables,
            disposed,
        })
    }

    /// Synchronously adopt a new viewport size
    pub fn handle_resize(&self, size: Viewport) {
        if self.disposed.is_set() {
            return;
        }
        apply_resize(&self.viewport, &self.navigation, &self.renderer, size);
    }

    /// Run one frame. `None` after dispose or while the loop is stopped.
    pub fn tick(&mut self, delta: f32) -> Option<FrameInfo> {
        if self.disposed.is_set() {
            return None;
        }
        ImmersiveSessionManager::check_host_ended(&self.session);
        self.process_overlay_actions();
        self.scheduler.borrow_mut().tick(delta)
    }

    /// Turn clicks on the activation control into session requests
    pub fn process_overlay_actions(&mut self) {
        for action in self.overlay.take_actions() {
            let OverlayAction::Activate(id) = action;
            if self.session.borrow().activation_control() != Some(id) {
                continue;
            }
            let state = self.session.borrow().state();
            let result = match state {
                Some(SessionState::Supported) => self.request_immersive_start(),
                Some(SessionState::Active) => self.request_immersive_end(),
                _ => Ok(()),
            };
            if let Err(e) = result {
                log::warn!("{}", e);
            }
        }
    }

    pub fn request_immersive_start(&self) -> Result<(), SessionTransitionError> {
        ImmersiveSessionManager::request_start(&self.session)
    }

    pub fn request_immersive_end(&self) -> Result<(), SessionTransitionError> {
        ImmersiveSessionManager::request_end(&self.session)
    }

    /// Start a fresh model load, replacing the tracked slot
    pub fn load_model(&mut self, url: &str) -> AssetSlot<ModelGraph> {
        if self.disposed.is_set() {
            return disposed_slot(AssetKind::Model, url);
        }
        let slot = self.pipeline.load_model(url, &self.config.assets.decoder);
        self.model = Some(slot.clone());
        slot
    }

    /// Start a fresh environment load, replacing the tracked slot
    pub fn load_environment(&mut self, url: &str) -> AssetSlot<EnvironmentMap> {
        if self.disposed.is_set() {
            return disposed_slot(AssetKind::Environment, url);
        }
        let slot = self.pipeline.load_environment(url);
        self.environment = Some(slot.clone());
        slot
    }

    /// Release everything in reverse acquisition order. Safe to call again.
    pub fn dispose(&mut self) {
        if self.disposed.is_set() {
            return;
        }
        self.disposed.set();
        let released = self.disposables.dispose();
        log::info!("viewer disposed ({} resources released)", released);
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.is_set()
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport.get()
    }

    pub fn camera(&self) -> CameraState {
        *self.navigation.borrow().camera()
    }

    pub fn navigation(&self) -> Rc<RefCell<NavigationController>> {
        self.navigation.clone()
    }

    pub fn scene(&self) -> Rc<RefCell<SceneGraph>> {
        self.scene.clone()
    }

    pub fn overlay(&self) -> &Overlay {
        &self.overlay
    }

    pub fn session_state(&self) -> Option<SessionState> {
        self.session.borrow().state()
    }

    pub fn session_state_changes(&self) -> Signal<SessionState> {
        self.session.borrow().state_changes()
    }

    pub fn load_progress(&self) -> Signal<LoadProgress> {
        self.pipeline.progress()
    }

    pub fn model(&self) -> Option<AssetHandle<ModelGraph>> {
        self.model.as_ref().map(AssetSlot::handle)
    }

    pub fn environment(&self) -> Option<AssetHandle<EnvironmentMap>> {
        self.environment.as_ref().map(AssetSlot::handle)
    }

    pub fn frame_source(&self) -> FrameSource {
        self.session.borrow().frame_source()
    }

    pub fn is_running(&self) -> bool {
        self.scheduler.borrow().is_running()
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }
}

impl Drop for Viewer {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn disposed_slot<T>(kind: AssetKind, url: &str) -> AssetSlot<T> {
    let slot = AssetSlot::pending(kind, url);
    slot.resolve(Err(AssetLoadError::new(kind, url, "viewer has been disposed")));
    slot
}
