//! Immersive runtimes shipped with the desktop binary.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Instant;

use futures::future::{self, LocalBoxFuture};
use glam::{Quat, Vec3};

use crate::core::session::ReferenceSpace;
use crate::error::CapabilityProbeError;
use crate::traits::{XrRuntime, XrSession};
use crate::types::TrackedPose;

/// Host without any immersive API
#[derive(Debug, Clone, Copy, Default)]
pub struct NoXrRuntime;

impl XrRuntime for NoXrRuntime {
    fn probe_support(
        &self,
    ) -> Option<LocalBoxFuture<'static, Result<bool, CapabilityProbeError>>> {
        None
    }

    fn request_session(&self) -> LocalBoxFuture<'static, anyhow::Result<Box<dyn XrSession>>> {
        Box::pin(future::ready(Err(anyhow::anyhow!(
            "no immersive runtime available"
        ))))
    }
}

/// Desktop stand-in for a headset: always supported, reports a standing head
/// pose that slowly looks left and right.
#[derive(Debug, Clone)]
pub struct SimulatedXr {
    eye_height: f32,
    active: Rc<RefCell<Option<Rc<Cell<bool>>>>>,
}

impl SimulatedXr {
    pub fn new(eye_height: f32) -> Self {
        Self {
            eye_height,
            active: Rc::new(RefCell::new(None)),
        }
    }

    /// End the running session as if the user took the headset off
    pub fn end_from_host(&self) -> bool {
        match self.active.borrow_mut().take() {
            Some(ended) => {
                ended.set(true);
                true
            }
            None => false,
        }
    }

    pub fn has_active_session(&self) -> bool {
        self.active
            .borrow()
            .as_ref()
            .is_some_and(|ended| !ended.get())
    }
}

impl XrRuntime for SimulatedXr {
    fn probe_support(
        &self,
    ) -> Option<LocalBoxFuture<'static, Result<bool, CapabilityProbeError>>> {
        Some(Box::pin(future::ready(Ok(true))))
    }

    fn request_session(&self) -> LocalBoxFuture<'static, anyhow::Result<Box<dyn XrSession>>> {
        let ended = Rc::new(Cell::new(false));
        *self.active.borrow_mut() = Some(ended.clone());
        let session = SimulatedSession {
            eye_height: self.eye_height,
            started: Instant::now(),
            ended,
        };
        log::info!("simulated immersive session granted");
        Box::pin(future::ready(Ok(Box::new(session) as Box<dyn XrSession>)))
    }
}

struct SimulatedSession {
    eye_height: f32,
    started: Instant,
    ended: Rc<Cell<bool>>,
}

impl SimulatedSession {
    fn pose_at(&self, seconds: f32) -> TrackedPose {
        let yaw = 0.6 * (seconds * 0.4).sin();
        TrackedPose::new(
            Vec3::new(0.0, self.eye_height, 0.0),
            Quat::from_rotation_y(yaw),
        )
    }
}

impl XrSession for SimulatedSession {
    fn reference_space(&self) -> ReferenceSpace {
        ReferenceSpace::default()
    }

    fn viewer_pose(&self) -> Option<TrackedPose> {
        (!self.ended.get()).then(|| self.pose_at(self.started.elapsed().as_secs_f32()))
    }

    fn is_ended(&self) -> bool {
        self.ended.get()
    }

    fn end(&self) -> LocalBoxFuture<'static, anyhow::Result<()>> {
        self.ended.set(true);
        log::info!("simulated immersive session ended");
        Box::pin(future::ready(Ok(())))
    }
}
