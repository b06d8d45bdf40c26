use std::cell::RefCell;
use std::rc::Rc;

use futures::executor::LocalSpawner;
use futures::task::LocalSpawnExt;
use glam::{Affine3A, Vec3};

use super::disposable::DisposedFlag;
use super::navigation::NavigationController;
use super::overlay::{ElementId, Overlay, OverlayElement};
use super::signal::Signal;
use crate::config::SessionConfig;
use crate::error::{CapabilityProbeError, SessionTransition, SessionTransitionError};
use crate::frame::FrameSource;
use crate::traits::{XrRuntime, XrSession};
use crate::types::TrackedPose;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unsupported,
    Supported,
    Active,
}

/// Tracking-space origin expressed in world space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReferenceSpace {
    origin: Affine3A,
}

impl ReferenceSpace {
    pub fn from_origin(origin: Affine3A) -> Self {
        Self { origin }
    }

    pub fn origin(&self) -> Affine3A {
        self.origin
    }

    /// Derived space whose origin sits at `transform` within this one
    pub fn offset(&self, transform: Affine3A) -> Self {
        Self {
            origin: self.origin * transform,
        }
    }

    pub fn to_world(&self, pose: &TrackedPose) -> TrackedPose {
        let (_, rotation, _) = self.origin.to_scale_rotation_translation();
        TrackedPose::new(
            self.origin.transform_point3(pose.position),
            (rotation * pose.orientation).normalize(),
        )
    }
}

impl Default for ReferenceSpace {
    fn default() -> Self {
        Self::from_origin(Affine3A::IDENTITY)
    }
}

enum ProbeOutcome {
    ApiAbsent,
    Resolved(Result<bool, CapabilityProbeError>),
}

/// Detects immersive support and moves the viewer in and out of sessions.
///
/// State is `None` until the capability probe resolves. Completions of the
/// probe and of start/end requests arrive on the local executor and check the
/// disposed flag before touching anything.
pub struct ImmersiveSessionManager {
    runtime: Rc<dyn XrRuntime>,
    navigation: Rc<RefCell<NavigationController>>,
    overlay: Overlay,
    config: SessionConfig,
    spawner: LocalSpawner,
    disposed: DisposedFlag,
    state: Option<SessionState>,
    pending: Option<SessionTransition>,
    session: Option<Box<dyn XrSession>>,
    reference_space: ReferenceSpace,
    saved_space: Option<ReferenceSpace>,
    activation_control: Option<ElementId>,
    fallback_notice: Option<ElementId>,
    state_changes: Signal<SessionState>,
    unannounced: Vec<SessionState>,
    released: bool,
}

impl ImmersiveSessionManager {
    /// Create the manager and spawn the capability probe
    pub fn new(
        runtime: Rc<dyn XrRuntime>,
        navigation: Rc<RefCell<NavigationController>>,
        overlay: Overlay,
        config: SessionConfig,
        spawner: LocalSpawner,
        disposed: DisposedFlag,
    ) -> Rc<RefCell<Self>> {
        let manager = Rc::new(RefCell::new(Self {
            runtime,
            navigation,
            overlay,
            config,
            spawner,
            disposed,
            state: None,
            pending: None,
            session: None,
            reference_space: ReferenceSpace::default(),
            saved_space: None,
            activation_control: None,
            fallback_notice: None,
            state_changes: Signal::new(),
            unannounced: Vec::new(),
            released: false,
        }));
        Self::start_probe(&manager);
        manager
    }

    fn start_probe(this: &Rc<RefCell<Self>>) {
        let probe = this.borrow().runtime.probe_support();
        let Some(probe) = probe else {
            Self::update(this, |manager| manager.finish_probe(ProbeOutcome::ApiAbsent));
            return;
        };

        let weak = Rc::downgrade(this);
        let disposed = this.borrow().disposed.clone();
        let spawned = this.borrow().spawner.spawn_local(async move {
            let result = probe.await;
            if disposed.is_set() {
                log::debug!("capability probe resolved after dispose, ignoring");
                return;
            }
            if let Some(manager) = weak.upgrade() {
                Self::update(&manager, |manager| {
                    manager.finish_probe(ProbeOutcome::Resolved(result))
                });
            }
        });

        if let Err(e) = spawned {
            let err = CapabilityProbeError(format!("cannot spawn probe: {}", e));
            Self::update(this, |manager| {
                manager.finish_probe(ProbeOutcome::Resolved(Err(err)))
            });
        }
    }

    /// Run `f` under a mutable borrow, then announce state changes once released
    fn update(this: &Rc<RefCell<Self>>, f: impl FnOnce(&mut Self)) {
        let (signal, changes) = {
            let mut manager = this.borrow_mut();
            f(&mut manager);
            (
                manager.state_changes.clone(),
                std::mem::take(&mut manager.unannounced),
            )
        };
        for state in changes {
            signal.emit(&state);
        }
    }

    fn set_state(&mut self, state: SessionState) {
        if self.state != Some(state) {
            log::info!("immersive session state: {:?} -> {:?}", self.state, state);
            self.state = Some(state);
            self.unannounced.push(state);
        }
    }

    fn finish_probe(&mut self, outcome: ProbeOutcome) {
        if self.released || self.state.is_some() {
            return;
        }

        let notice = match outcome {
            ProbeOutcome::Resolved(Ok(true)) => {
                let id = self.overlay.insert(OverlayElement::ActivationControl {
                    label: self.config.enter_label.clone(),
                });
                self.activation_control = Some(id);
                self.set_state(SessionState::Supported);
                return;
            }
            ProbeOutcome::Resolved(Ok(false)) => self.config.unsupported_notice.clone(),
            ProbeOutcome::Resolved(Err(err)) => {
                log::warn!("{}", err);
                self.config.unsupported_notice.clone()
            }
            ProbeOutcome::ApiAbsent => self.config.unavailable_notice.clone(),
        };

        self.fallback_notice = Some(self.overlay.insert(OverlayElement::FallbackNotice { text: notice }));
        self.set_state(SessionState::Unsupported);
    }

    /// Ask the runtime for a session. Only valid from `Supported` with no
    /// other transition in flight.
    pub fn request_start(this: &Rc<RefCell<Self>>) -> Result<(), SessionTransitionError> {
        let mut manager = this.borrow_mut();
        if manager.disposed.is_set() || manager.released {
            return Err(SessionTransitionError::new(
                SessionTransition::Start,
                "viewer has been disposed",
            ));
        }
        if manager.state != Some(SessionState::Supported) || manager.pending.is_some() {
            return Err(SessionTransitionError::new(
                SessionTransition::Start,
                format!(
                    "not allowed in state {:?} with pending {:?}",
                    manager.state, manager.pending
                ),
            ));
        }

        let request = manager.runtime.request_session();
        let weak = Rc::downgrade(this);
        let disposed = manager.disposed.clone();
        manager
            .spawner
            .spawn_local(async move {
                let result = request.await;
                let manager = weak.upgrade();
                if disposed.is_set() || manager.is_none() {
                    if let Ok(session) = result {
                        log::warn!("immersive session granted after dispose, ending it");
                        if let Err(e) = session.end().await {
                            log::warn!("failed to end orphaned session: {:#}", e);
                        }
                    }
                    return;
                }
                if let Some(manager) = manager {
                    Self::update(&manager, |manager| manager.finish_start(result));
                }
            })
            .map_err(|e| SessionTransitionError::new(SessionTransition::Start, e.to_string()))?;

        manager.pending = Some(SessionTransition::Start);
        Ok(())
    }

    fn finish_start(&mut self, result: anyhow::Result<Box<dyn XrSession>>) {
        self.pending = None;
        match result {
            Ok(session) => {
                let offset = Affine3A::from_translation(Vec3::from_array(self.config.reference_position));
                self.saved_space = Some(self.reference_space);
                self.reference_space = session.reference_space().offset(offset);
                self.session = Some(session);

                self.navigation
                    .borrow_mut()
                    .begin_external_control(self.config.keep_controls_enabled);
                if let Some(id) = self.activation_control {
                    self.overlay.set_label(id, &self.config.exit_label);
                }
                self.set_state(SessionState::Active);
            }
            Err(err) => {
                let err = SessionTransitionError::new(SessionTransition::Start, format!("{:#}", err));
                log::error!("{}", err);
            }
        }
    }

    /// Ask the runtime to end the active session
    pub fn request_end(this: &Rc<RefCell<Self>>) -> Result<(), SessionTransitionError> {
        let mut manager = this.borrow_mut();
        if manager.state != Some(SessionState::Active) || manager.pending.is_some() {
            return Err(SessionTransitionError::new(
                SessionTransition::End,
                format!(
                    "not allowed in state {:?} with pending {:?}",
                    manager.state, manager.pending
                ),
            ));
        }
        let Some(end) = manager.session.as_ref().map(|session| session.end()) else {
            return Err(SessionTransitionError::new(
                SessionTransition::End,
                "no session handle",
            ));
        };

        let weak = Rc::downgrade(this);
        let disposed = manager.disposed.clone();
        manager
            .spawner
            .spawn_local(async move {
                let result = end.await;
                if disposed.is_set() {
                    return;
                }
                if let Some(manager) = weak.upgrade() {
                    Self::update(&manager, |manager| manager.finish_end(result));
                }
            })
            .map_err(|e| SessionTransitionError::new(SessionTransition::End, e.to_string()))?;

        manager.pending = Some(SessionTransition::End);
        Ok(())
    }

    fn finish_end(&mut self, result: anyhow::Result<()>) {
        match result {
            Ok(()) => self.handle_session_ended(),
            Err(err) => {
                // Session, reference space and external control stay as they were
                self.pending = None;
                let err = SessionTransitionError::new(SessionTransition::End, format!("{:#}", err));
                log::error!("{}", err);
            }
        }
    }

    /// Return to desktop mode after the session ended, whoever ended it
    pub fn handle_session_ended(&mut self) {
        if self.state != Some(SessionState::Active) {
            return;
        }
        self.pending = None;
        self.session = None;
        self.reference_space = self.saved_space.take().unwrap_or_default();
        self.navigation.borrow_mut().end_external_control();
        if let Some(id) = self.activation_control {
            self.overlay.set_label(id, &self.config.enter_label);
        }
        self.set_state(SessionState::Supported);
    }

    /// Pick up sessions the host ended without being asked
    pub fn check_host_ended(this: &Rc<RefCell<Self>>) {
        let ended = {
            let manager = this.borrow();
            manager.pending.is_none()
                && manager.session.as_ref().is_some_and(|session| session.is_ended())
        };
        if ended {
            log::info!("immersive session ended by host");
            Self::update(this, |manager| manager.handle_session_ended());
        }
    }

    /// Head pose in world space while a session is active
    pub fn viewer_pose(&self) -> Option<TrackedPose> {
        if self.state != Some(SessionState::Active) {
            return None;
        }
        let pose = self.session.as_ref()?.viewer_pose()?;
        Some(self.reference_space.to_world(&pose))
    }

    pub fn frame_source(&self) -> FrameSource {
        if self.state == Some(SessionState::Active) {
            FrameSource::Session
        } else {
            FrameSource::Display
        }
    }

    pub fn state(&self) -> Option<SessionState> {
        self.state
    }

    pub fn pending_transition(&self) -> Option<SessionTransition> {
        self.pending
    }

    pub fn reference_space(&self) -> ReferenceSpace {
        self.reference_space
    }

    pub fn activation_control(&self) -> Option<ElementId> {
        self.activation_control
    }

    /// Listeners must not borrow the manager mutably
    pub fn state_changes(&self) -> Signal<SessionState> {
        self.state_changes.clone()
    }

    /// Remove overlay elements and end any live session. Idempotent.
    pub fn dispose(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        if let Some(id) = self.activation_control.take() {
            self.overlay.remove(id);
        }
        if let Some(id) = self.fallback_notice.take() {
            self.overlay.remove(id);
        }

        if let Some(session) = self.session.take() {
            self.navigation.borrow_mut().end_external_control();
            self.reference_space = self.saved_space.take().unwrap_or_default();
            let end = session.end();
            let spawned = self.spawner.spawn_local(async move {
                if let Err(e) = end.await {
                    log::warn!("failed to end session during dispose: {:#}", e);
                }
                drop(session);
            });
            if let Err(e) = spawned {
                log::warn!("cannot end session during dispose: {}", e);
            }
        }
        self.pending = None;
        log::debug!("session manager disposed");
    }
}
