use std::cell::RefCell;
use std::rc::Rc;

use super::navigation::NavigationController;
use super::scene::SceneGraph;
use super::session::ImmersiveSessionManager;
use crate::frame::{FrameInfo, FrameSource};
use crate::traits::{FrameDriver, SceneRenderer};

/// Drives update-then-render once per frame from whichever frame source is
/// current: display refresh normally, the session's loop while immersive.
pub struct RenderLoopScheduler {
    navigation: Rc<RefCell<NavigationController>>,
    scene: Rc<RefCell<SceneGraph>>,
    renderer: Rc<RefCell<dyn SceneRenderer>>,
    session: Rc<RefCell<ImmersiveSessionManager>>,
    driver: Rc<dyn FrameDriver>,
    running: bool,
    frame_number: u64,
    time: f32,
}

impl RenderLoopScheduler {
    pub fn new(
        navigation: Rc<RefCell<NavigationController>>,
        scene: Rc<RefCell<SceneGraph>>,
        renderer: Rc<RefCell<dyn SceneRenderer>>,
        session: Rc<RefCell<ImmersiveSessionManager>>,
        driver: Rc<dyn FrameDriver>,
    ) -> Self {
        Self {
            navigation,
            scene,
            renderer,
            session,
            driver,
            running: false,
            frame_number: 0,
            time: 0.0,
        }
    }

    pub fn start(&mut self) {
        if self.running {
            return;
        }
        self.running = true;
        let source = self.frame_source();
        log::debug!("render loop started ({:?})", source);
        self.driver.request_frame(source);
    }

    pub fn stop(&mut self) {
        if self.running {
            self.running = false;
            log::debug!("render loop stopped after {} frames", self.frame_number);
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_number
    }

    pub fn frame_source(&self) -> FrameSource {
        self.session.borrow().frame_source()
    }

    /// One frame: tracked pose (session frames only), navigation, render.
    /// Returns `None` once stopped.
    pub fn tick(&mut self, delta: f32) -> Option<FrameInfo> {
        if !self.running {
            return None;
        }

        let source = self.frame_source();
        if source == FrameSource::Session {
            let pose = self.session.borrow().viewer_pose();
            if let Some(pose) = pose {
                self.navigation.borrow_mut().apply_tracked_pose(pose.look_pose());
            }
        }

        let camera = {
            let mut navigation = self.navigation.borrow_mut();
            navigation.update();
            *navigation.camera()
        };

        if let Err(e) = self.renderer.borrow_mut().render(&self.scene.borrow(), &camera) {
            log::error!("render failed: {:#}", e);
        }

        let info = FrameInfo::new(self.frame_number, self.time, delta, source);
        self.frame_number += 1;
        self.time += delta;

        self.driver.request_frame(self.frame_source());
        Some(info)
    }
}
