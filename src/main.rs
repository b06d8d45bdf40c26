use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use clap::Parser;
use futures::executor::LocalPool;
use immersive_viewer::cli::Cli;
use immersive_viewer::config::ViewerConfig;
use immersive_viewer::core::{
    Clock, Overlay, PointerAdapter, PointerEvent, Signal, Subscription, Viewer, ViewerHost,
    WgpuRenderer,
};
use immersive_viewer::frame::FrameSource;
use immersive_viewer::loaders::{FileFetcher, GltfDecoder, HdrDecoder};
use immersive_viewer::traits::{FrameDriver, HostContainer, SceneRenderer, XrRuntime};
use immersive_viewer::types::Viewport;
use immersive_viewer::xr::{NoXrRuntime, SimulatedXr};
use winit::{
    application::ApplicationHandler,
    event::*,
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

const INITIAL_WINDOW_WIDTH: u32 = 1280;
const INITIAL_WINDOW_HEIGHT: u32 = 720;

/// The window is both the container and the frame clock
struct WinitHost {
    window: Arc<Window>,
}

fn window_viewport(window: &Window) -> Viewport {
    let scale = window.scale_factor();
    let logical = window.inner_size().to_logical::<f64>(scale);
    Viewport::new(
        logical.width.round() as u32,
        logical.height.round() as u32,
        scale as f32,
    )
}

impl HostContainer for WinitHost {
    fn viewport(&self) -> Viewport {
        window_viewport(&self.window)
    }

    fn attach_surface(&self) {
        self.window.set_visible(true);
    }

    fn detach_surface(&self) {
        self.window.set_visible(false);
    }
}

impl FrameDriver for WinitHost {
    fn request_frame(&self, source: FrameSource) {
        // The simulated headset mirrors into the window, so both sources redraw it
        log::trace!("next frame from {:?}", source);
        self.window.request_redraw();
    }
}

struct Running {
    window: Arc<Window>,
    renderer: Rc<RefCell<WgpuRenderer>>,
    viewer: Viewer,
    adapter: PointerAdapter,
    pointer: Signal<PointerEvent>,
    resize: Signal<Viewport>,
    clock: Clock,
    simulated: Option<SimulatedXr>,
    _progress: Subscription,
}

struct App {
    cli: Cli,
    config: ViewerConfig,
    pool: LocalPool,
    running: Option<Running>,
}

impl App {
    fn new(cli: Cli, config: ViewerConfig) -> Self {
        Self {
            cli,
            config,
            pool: LocalPool::new(),
            running: None,
        }
    }

    fn start(&mut self, event_loop: &ActiveEventLoop) -> anyhow::Result<Running> {
        let window = Arc::new(
            event_loop.create_window(
                Window::default_attributes()
                    .with_title("Immersive Viewer")
                    .with_visible(false)
                    .with_inner_size(winit::dpi::LogicalSize::new(
                        INITIAL_WINDOW_WIDTH,
                        INITIAL_WINDOW_HEIGHT,
                    )),
            )?,
        );

        let overlay = Overlay::new();
        let renderer = Rc::new(RefCell::new(pollster::block_on(WgpuRenderer::new(
            window.clone(),
            overlay.clone(),
            !self.cli.no_ui,
        ))?));

        let simulated = self
            .cli
            .simulate_xr
            .then(|| SimulatedXr::new(self.config.camera.eye_height));
        let xr: Rc<dyn XrRuntime> = match &simulated {
            Some(runtime) => Rc::new(runtime.clone()),
            None => Rc::new(NoXrRuntime),
        };

        let host = Rc::new(WinitHost {
            window: window.clone(),
        });
        let pointer = Signal::new();
        let resize = Signal::new();
        let scene_renderer: Rc<RefCell<dyn SceneRenderer>> = renderer.clone();
        let viewer = Viewer::new(
            self.config.clone(),
            ViewerHost {
                container: host.clone(),
                renderer: scene_renderer,
                frame_driver: host,
                xr,
                fetcher: Rc::new(FileFetcher::new(self.config.assets.asset_root.clone())),
                model_decoder: Rc::new(GltfDecoder),
                environment_decoder: Rc::new(HdrDecoder),
                overlay,
                resize: resize.clone(),
                pointer: pointer.clone(),
            },
            self.pool.spawner(),
        )?;
        let progress = renderer.borrow().track_progress(&viewer.load_progress());

        Ok(Running {
            adapter: PointerAdapter::new(window.scale_factor()),
            window,
            renderer,
            viewer,
            pointer,
            resize,
            clock: Clock::new(),
            simulated,
            _progress: progress,
        })
    }

    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(mut running) = self.running.take() {
            running.viewer.dispose();
        }
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.running.is_some() {
            return;
        }
        match self.start(event_loop) {
            Ok(running) => self.running = Some(running),
            Err(e) => {
                log::error!("failed to start viewer: {:#}", e);
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        let Some(running) = self.running.as_mut() else {
            return;
        };

        // Let egui handle the event first
        if running.renderer.borrow_mut().handle_window_event(&event) {
            return;
        }

        if let Some(pointer_event) = running.adapter.translate(&event) {
            running.pointer.emit(&pointer_event);
        }

        match event {
            WindowEvent::CloseRequested
            | WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        state: ElementState::Pressed,
                        physical_key: PhysicalKey::Code(KeyCode::Escape),
                        ..
                    },
                ..
            } => self.shutdown(event_loop),
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        state: ElementState::Pressed,
                        physical_key: PhysicalKey::Code(KeyCode::KeyX),
                        ..
                    },
                ..
            } => {
                if let Some(runtime) = &running.simulated {
                    if runtime.end_from_host() {
                        log::info!("headset removed");
                    }
                }
            }
            WindowEvent::Resized(_) => {
                running.resize.emit(&window_viewport(&running.window));
            }
            WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
                running.adapter.set_scale_factor(scale_factor);
                running.resize.emit(&window_viewport(&running.window));
            }
            WindowEvent::RedrawRequested => {
                let delta = running.clock.tick();
                running.viewer.tick(delta);
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        self.pool.run_until_stalled();
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let config = cli.resolve_config()?;

    let event_loop = EventLoop::new()?;
    let mut app = App::new(cli, config);

    log::info!("Controls: drag to orbit, right-drag to pan, wheel to zoom, Escape to quit");
    event_loop.run_app(&mut app)?;

    Ok(())
}
