mod common;

use std::cell::RefCell;
use std::rc::Rc;

use common::{
    CallLog, HarnessBuilder, MockEnvironmentDecoder, MockFetcher, MockHost, MockModelDecoder,
    MockRenderer, MockXr, ENVIRONMENT_URL, MODEL_URL,
};
use futures::executor::LocalPool;
use glam::Vec3;
use immersive_viewer::core::{LightingMode, Overlay, PointerEvent, Signal, Viewer, ViewerHost};
use immersive_viewer::error::AssetKind;
use immersive_viewer::frame::FrameSource;
use immersive_viewer::traits::SceneRenderer;
use immersive_viewer::types::Viewport;

// ============================================================================
// Construction
// ============================================================================

#[test]
fn test_construction_wires_host() {
    let h = HarnessBuilder::new()
        .viewport(Viewport::new(1024, 512, 2.0))
        .build();

    assert!(h.host.attached.get());
    assert_eq!(h.renderer.borrow().resizes, vec![Viewport::new(1024, 512, 2.0)]);
    assert_eq!(*h.host.frame_requests.borrow(), vec![FrameSource::Display]);
    assert!((h.viewer.camera().aspect - 2.0).abs() < 1e-6);
    assert!(h.viewer.is_running());
}

#[test]
fn test_invalid_config_touches_nothing() {
    let log: CallLog = Rc::new(RefCell::new(Vec::new()));
    let renderer = Rc::new(RefCell::new(MockRenderer::new(log.clone())));
    let host = Rc::new(MockHost::new(Viewport::default(), log));
    let pool = LocalPool::new();

    let mut config = common::bare_config();
    config.camera.near = 10.0;
    config.camera.far = 1.0;

    let scene_renderer: Rc<RefCell<dyn SceneRenderer>> = renderer.clone();
    let result = Viewer::new(
        config,
        ViewerHost {
            container: host.clone(),
            renderer: scene_renderer,
            frame_driver: host.clone(),
            xr: Rc::new(MockXr::supported()),
            fetcher: Rc::new(MockFetcher::default()),
            model_decoder: Rc::new(MockModelDecoder::new(Default::default())),
            environment_decoder: Rc::new(MockEnvironmentDecoder),
            overlay: Overlay::new(),
            resize: Signal::new(),
            pointer: Signal::new(),
        },
        pool.spawner(),
    );

    assert!(result.is_err());
    assert!(renderer.borrow().resizes.is_empty());
    assert!(!host.attached.get());
}

// ============================================================================
// Resize
// ============================================================================

#[test]
fn test_resize_updates_aspect() {
    let h = HarnessBuilder::new().build();
    assert!((h.viewer.camera().aspect - 800.0 / 600.0).abs() < 1e-3);

    h.resize.emit(&Viewport::new(1920, 1080, 1.0));

    assert!((h.viewer.camera().aspect - 1920.0 / 1080.0).abs() < 1e-3);
    assert_eq!(h.viewer.viewport(), Viewport::new(1920, 1080, 1.0));
    assert_eq!(
        h.renderer.borrow().resizes.last(),
        Some(&Viewport::new(1920, 1080, 1.0))
    );
}

#[test]
fn test_zero_height_resize_keeps_finite_aspect() {
    let h = HarnessBuilder::new().build();
    h.viewer.handle_resize(Viewport::new(640, 0, 1.0));
    assert!(h.viewer.camera().aspect.is_finite());
}

// ============================================================================
// Render loop
// ============================================================================

#[test]
fn test_each_tick_renders_once() {
    let mut h = HarnessBuilder::new().build();

    let first = h.viewer.tick(0.016).unwrap();
    let second = h.viewer.tick(0.020).unwrap();

    assert_eq!(first.number, 0);
    assert_eq!(second.number, 1);
    assert!((second.time - 0.016).abs() < 1e-6);
    assert_eq!(second.source, FrameSource::Display);
    assert_eq!(h.renderer.borrow().renders, 2);
    assert_eq!(h.host.frame_requests.borrow().len(), 3);
}

#[test]
fn test_render_errors_do_not_stop_loop() {
    let mut h = HarnessBuilder::new().build();
    h.renderer.borrow_mut().fail_renders = true;

    h.frames(3);

    assert_eq!(h.renderer.borrow().renders, 3);
    assert!(h.viewer.is_running());
}

#[test]
fn test_pointer_input_reaches_camera() {
    let mut h = HarnessBuilder::new().build();
    let before = h.viewer.camera();

    h.drag((400.0, 300.0), (300.0, 250.0));
    h.frames(10);

    assert_ne!(h.viewer.camera().position, before.position);
    assert_eq!(h.viewer.camera().look_target, before.look_target);
}

// ============================================================================
// Dispose
// ============================================================================

#[test]
fn test_dispose_releases_in_reverse_order() {
    let mut h = HarnessBuilder::new().xr(MockXr::supported()).build();
    h.run();

    h.viewer.dispose();

    assert!(h.viewer.is_disposed());
    assert_eq!(*h.log.borrow(), vec!["surface", "renderer"]);
    assert!(!h.host.attached.get());
    assert!(!h.viewer.is_running());
    assert!(h.overlay.elements().is_empty());
}

#[test]
fn test_dispose_is_idempotent() {
    let mut h = HarnessBuilder::new().build();
    h.viewer.dispose();
    h.viewer.dispose();

    assert_eq!(h.renderer.borrow().releases, 1);
    assert_eq!(h.log.borrow().len(), 2);
}

#[test]
fn test_nothing_runs_after_dispose() {
    let mut h = HarnessBuilder::new().build();
    h.viewer.dispose();
    let camera = h.viewer.camera();
    let resizes = h.renderer.borrow().resizes.len();

    assert!(h.viewer.tick(0.016).is_none());
    h.resize.emit(&Viewport::new(100, 100, 1.0));
    h.viewer.handle_resize(Viewport::new(100, 100, 1.0));
    h.pointer.emit(&PointerEvent::Wheel { delta_y: 500.0 });

    assert_eq!(h.renderer.borrow().renders, 0);
    assert_eq!(h.renderer.borrow().resizes.len(), resizes);
    assert_eq!(h.viewer.camera(), camera);
    assert_eq!(h.pointer.listener_count(), 0);
    assert_eq!(h.resize.listener_count(), 0);
}

#[test]
fn test_drop_disposes() {
    let h = HarnessBuilder::new().build();
    let common::Harness { viewer, log, .. } = h;

    drop(viewer);

    assert_eq!(*log.borrow(), vec!["surface", "renderer"]);
}

#[test]
fn test_late_asset_completion_is_discarded() {
    let fetcher = MockFetcher::default();
    fetcher.serve(MODEL_URL, b"glb");
    fetcher.gate(MODEL_URL);
    let mut h = HarnessBuilder::new().fetcher(fetcher).build();

    let slot = h.viewer.load_model(MODEL_URL);
    h.run();
    h.viewer.dispose();
    assert!(h.fetcher.release(MODEL_URL));
    h.run();

    assert!(slot.is_pending());
    assert!(h.viewer.scene().borrow().model().is_none());
}

#[test]
fn test_load_after_dispose_fails_fast() {
    let mut h = HarnessBuilder::new().build();
    h.viewer.dispose();

    let slot = h.viewer.load_environment(ENVIRONMENT_URL);
    let handle = slot.handle();
    assert_eq!(handle.error().map(|e| e.kind), Some(AssetKind::Environment));
    assert!(h.fetcher.requests.borrow().is_empty());
}

// ============================================================================
// Partial asset failure
// ============================================================================

#[test]
fn test_environment_failure_falls_back_to_ambient() {
    let fetcher = MockFetcher::default();
    fetcher.serve(MODEL_URL, b"glb");
    let mut config = common::bare_config();
    config.assets.model_url = Some(MODEL_URL.to_string());
    config.assets.environment_url = Some(ENVIRONMENT_URL.to_string());

    let mut h = HarnessBuilder::new().config(config).fetcher(fetcher).build();
    h.frames(2);

    let model = h.viewer.model().unwrap();
    let environment = h.viewer.environment().unwrap();
    assert!(model.is_ready());
    let err = environment.error().unwrap();
    assert_eq!(err.kind, AssetKind::Environment);
    assert!(err.message.contains("404"));

    let scene = h.viewer.scene();
    let scene = scene.borrow();
    assert!(scene.model().is_some());
    assert_eq!(scene.lighting_mode(), LightingMode::AmbientOnly);
    assert_eq!(scene.effective_ambient(), scene.lighting().ambient);
    assert!(h.viewer.is_running());
    assert!(h.renderer.borrow().renders >= 2);
}

#[test]
fn test_environment_brightens_ambient() {
    let fetcher = MockFetcher::default();
    fetcher.serve(ENVIRONMENT_URL, b"hdr");
    let mut h = HarnessBuilder::new().fetcher(fetcher).build();

    let slot = h.viewer.load_environment(ENVIRONMENT_URL);
    h.run();

    assert!(slot.handle().is_ready());
    let scene = h.viewer.scene();
    let scene = scene.borrow();
    assert_eq!(scene.lighting_mode(), LightingMode::Environment);
    let base = scene.lighting().ambient;
    assert!(scene.effective_ambient().cmpgt(base).all());
    assert!(scene.effective_ambient().cmpgt(Vec3::ZERO).all());
}
