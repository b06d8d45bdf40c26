use std::cell::RefCell;
use std::f32::consts::PI;
use std::rc::Rc;

use glam::Vec3;

use super::pointer::{PointerButton, PointerEvent};
use super::signal::{Signal, Subscription};
use crate::config::{ConstraintPolicy, ConstraintProfile, NavigationConfig};
use crate::error::ConfigurationError;
use crate::math::{wrap_angle, BoundingVolume, Spherical};
use crate::types::{CameraPose, CameraState, Viewport};

/// Velocities below this are treated as settled
pub const EPSILON: f32 = 1e-5;

/// Orbit radius never collapses to zero
const MIN_RADIUS: f32 = 1e-4;

/// Per wheel notch at zoom_speed 1.0
const DOLLY_STEP: f32 = 0.95;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Drag {
    Idle,
    Rotate { x: f32, y: f32 },
    Pan { x: f32, y: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Constraints {
    None,
    Spherical(ConstraintPolicy),
    BoxClamp {
        padding: f32,
        bounds: Option<BoundingVolume>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct ExternalControl {
    hybrid: bool,
}

/// Orbit/pan/zoom camera controller.
///
/// Owns the [`CameraState`]. Pointer input moves an orbit pose around the look
/// target; the orbit pose is written to the camera unless an immersive session
/// has taken over, in which case the tracked head pose is written instead.
pub struct NavigationController {
    camera: CameraState,
    orbit: CameraPose,
    config: NavigationConfig,
    constraints: Constraints,
    enabled: bool,
    delta_theta: f32,
    delta_phi: f32,
    scale: f32,
    pan_offset: Vec3,
    drag: Drag,
    viewport_height: f32,
    external: Option<ExternalControl>,
}

impl NavigationController {
    pub fn new(camera: CameraState, config: NavigationConfig) -> Result<Self, ConfigurationError> {
        config.validate()?;

        let constraints = match &config.constraints {
            ConstraintProfile::Unconstrained => Constraints::None,
            ConstraintProfile::Spherical(policy) => Constraints::Spherical(*policy),
            ConstraintProfile::BoxClamp { padding } => Constraints::BoxClamp {
                padding: *padding,
                bounds: None,
            },
        };

        let mut controller = Self {
            orbit: camera.pose(),
            camera,
            config,
            constraints,
            enabled: true,
            delta_theta: 0.0,
            delta_phi: 0.0,
            scale: 1.0,
            pan_offset: Vec3::ZERO,
            drag: Drag::Idle,
            viewport_height: 600.0,
            external: None,
        };
        controller.integrate(1.0);
        Ok(controller)
    }

    /// Forward pointer events from `source` to this controller
    pub fn attach(this: &Rc<RefCell<Self>>, source: &Signal<PointerEvent>) -> Subscription {
        let weak = Rc::downgrade(this);
        source.subscribe(move |event| {
            if let Some(controller) = weak.upgrade() {
                if let Ok(mut controller) = controller.try_borrow_mut() {
                    controller.handle_pointer(event);
                }
            }
        })
    }

    pub fn camera(&self) -> &CameraState {
        &self.camera
    }

    pub fn config(&self) -> &NavigationConfig {
        &self.config
    }

    /// Pose driven by pointer input, even while a tracked pose owns the camera
    pub fn orbit_pose(&self) -> CameraPose {
        self.orbit
    }

    pub fn distance(&self) -> f32 {
        self.orbit.distance()
    }

    pub fn polar_angle(&self) -> f32 {
        Spherical::from_offset(self.orbit.position - self.orbit.target).phi
    }

    pub fn azimuth(&self) -> f32 {
        Spherical::from_offset(self.orbit.position - self.orbit.target).theta
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.drag = Drag::Idle;
        }
    }

    pub fn is_externally_controlled(&self) -> bool {
        self.external.is_some()
    }

    /// True when no velocity or pending zoom remains
    pub fn is_settled(&self) -> bool {
        !self.has_pending()
    }

    pub fn set_viewport(&mut self, viewport: &Viewport) {
        self.camera.aspect = viewport.aspect();
        self.viewport_height = viewport.height.max(1) as f32;
    }

    /// Jump to a pose (asset camera hints). Clears any residual motion.
    pub fn set_pose(&mut self, pose: CameraPose) {
        self.orbit = pose;
        self.clear_motion();
        self.integrate(1.0);
    }

    /// Bounding volume for the box-clamp profile; ignored by other profiles
    pub fn set_bounds(&mut self, volume: &BoundingVolume) {
        if let Constraints::BoxClamp { padding, bounds } = &mut self.constraints {
            *bounds = Some(volume.expand(*padding));
            self.integrate(1.0);
        }
    }

    fn accepting_input(&self) -> bool {
        self.enabled && self.external.map_or(true, |ext| ext.hybrid)
    }

    /// Rotate about the look target by the given angle deltas (radians)
    pub fn orbit(&mut self, azimuth_delta: f32, polar_delta: f32) {
        if !self.config.enable_rotate || !self.accepting_input() {
            return;
        }
        self.delta_theta += azimuth_delta * self.config.rotate_speed;
        self.delta_phi += polar_delta * self.config.rotate_speed;
        self.after_input();
    }

    /// Translate target and position together by a screen-space drag in pixels
    pub fn pan(&mut self, dx: f32, dy: f32) {
        if !self.config.enable_pan || !self.accepting_input() {
            return;
        }

        let offset = self.orbit.position - self.orbit.target;
        let half_fov = (self.camera.fov_degrees * 0.5).to_radians();
        let target_distance = offset.length() * half_fov.tan();

        let forward = (-offset).try_normalize().unwrap_or(Vec3::NEG_Z);
        let right = forward.cross(Vec3::Y).try_normalize().unwrap_or(Vec3::X);
        let up = right.cross(forward);

        let scale = 2.0 * target_distance / self.viewport_height * self.config.pan_speed;
        self.pan_offset += -right * (dx * scale) + up * (dy * scale);
        self.after_input();
    }

    /// Multiply orbit distance by `factor` (> 1 moves away)
    pub fn zoom(&mut self, factor: f32) {
        if !self.config.enable_zoom || !self.accepting_input() {
            return;
        }
        if factor.is_finite() && factor > 0.0 {
            self.scale *= factor;
            self.after_input();
        }
    }

    /// Request an absolute orbit distance
    pub fn dolly_to(&mut self, distance: f32) {
        let current = self.distance().max(MIN_RADIUS);
        if distance.is_finite() && distance > 0.0 {
            self.zoom(distance / (current * self.scale));
        }
    }

    pub fn handle_pointer(&mut self, event: &PointerEvent) {
        if !self.accepting_input() {
            self.drag = Drag::Idle;
            return;
        }

        match *event {
            PointerEvent::Down { button, x, y } => {
                self.drag = match button {
                    PointerButton::Primary if self.config.enable_rotate => Drag::Rotate { x, y },
                    PointerButton::Secondary | PointerButton::Middle if self.config.enable_pan => {
                        Drag::Pan { x, y }
                    }
                    _ => Drag::Idle,
                };
            }
            PointerEvent::Move { x, y } => match self.drag {
                Drag::Rotate { x: last_x, y: last_y } => {
                    let height = self.viewport_height;
                    self.orbit(
                        -2.0 * PI * (x - last_x) / height,
                        -2.0 * PI * (y - last_y) / height,
                    );
                    self.drag = Drag::Rotate { x, y };
                }
                Drag::Pan { x: last_x, y: last_y } => {
                    self.pan(x - last_x, y - last_y);
                    self.drag = Drag::Pan { x, y };
                }
                Drag::Idle => {}
            },
            PointerEvent::Up { .. } | PointerEvent::Cancel => self.drag = Drag::Idle,
            PointerEvent::Wheel { delta_y } => {
                let step = DOLLY_STEP.powf(self.config.zoom_speed);
                if delta_y > 0.0 {
                    self.zoom(1.0 / step);
                } else if delta_y < 0.0 {
                    self.zoom(step);
                }
            }
        }
    }

    /// Integrate pending motion. Returns true if the orbit pose changed.
    pub fn update(&mut self) -> bool {
        if !self.has_pending() {
            return false;
        }
        let factor = if self.config.damping {
            self.config.damping_factor
        } else {
            1.0
        };
        self.integrate(factor)
    }

    /// Hand the camera to a tracked head pose. In hybrid mode pointer input
    /// keeps moving the orbit pose in the background.
    pub fn begin_external_control(&mut self, hybrid: bool) {
        self.external = Some(ExternalControl { hybrid });
        self.drag = Drag::Idle;
        if !hybrid {
            self.clear_motion();
        }
    }

    pub fn apply_tracked_pose(&mut self, pose: CameraPose) {
        if self.external.is_some() {
            self.camera.set_pose(pose);
        } else {
            log::debug!("ignoring tracked pose outside an immersive session");
        }
    }

    /// Return the camera to pointer navigation at the orbit pose
    pub fn end_external_control(&mut self) {
        if self.external.take().is_some() {
            self.drag = Drag::Idle;
            self.camera.set_pose(self.orbit);
        }
    }

    fn has_pending(&self) -> bool {
        self.delta_theta != 0.0
            || self.delta_phi != 0.0
            || self.scale != 1.0
            || self.pan_offset != Vec3::ZERO
    }

    fn clear_motion(&mut self) {
        self.delta_theta = 0.0;
        self.delta_phi = 0.0;
        self.scale = 1.0;
        self.pan_offset = Vec3::ZERO;
    }

    fn after_input(&mut self) {
        if !self.config.damping {
            self.integrate(1.0);
        }
    }

    fn integrate(&mut self, factor: f32) -> bool {
        let before = self.orbit;

        let mut spherical = Spherical::from_offset(self.orbit.position - self.orbit.target);
        spherical.theta += self.delta_theta * factor;
        spherical.phi += self.delta_phi * factor;
        spherical.radius *= self.scale;
        let spherical = self.clamp_spherical(spherical);

        let mut target = self.orbit.target + self.pan_offset * factor;
        let mut position = target + spherical.to_offset();

        if let Constraints::BoxClamp {
            bounds: Some(bounds),
            ..
        } = self.constraints
        {
            target = bounds.clamp_point(target);
            position = bounds.clamp_point(position);
        }

        self.orbit = CameraPose::new(position, target);
        self.scale = 1.0;

        if self.config.damping && factor < 1.0 {
            let decay = 1.0 - factor;
            self.delta_theta *= decay;
            self.delta_phi *= decay;
            self.pan_offset *= decay;
            if self.delta_theta.abs() < EPSILON && self.delta_phi.abs() < EPSILON {
                self.delta_theta = 0.0;
                self.delta_phi = 0.0;
            }
            if self.pan_offset.length() < EPSILON {
                self.pan_offset = Vec3::ZERO;
            }
        } else {
            self.clear_motion();
        }

        if self.external.is_none() {
            self.camera.set_pose(self.orbit);
        }
        self.orbit != before
    }

    fn clamp_spherical(&self, mut spherical: Spherical) -> Spherical {
        if let Constraints::Spherical(policy) = &self.constraints {
            spherical.theta = clamp_azimuth(spherical.theta, policy.min_azimuth, policy.max_azimuth);
            spherical.phi = spherical.phi.clamp(
                policy.min_polar_angle.unwrap_or(0.0),
                policy.max_polar_angle.unwrap_or(PI),
            );
            spherical = spherical.make_safe();
            spherical.radius = spherical.radius.max(MIN_RADIUS).clamp(
                policy.min_distance.unwrap_or(0.0),
                policy.max_distance.unwrap_or(f32::INFINITY),
            );
        } else {
            spherical = spherical.make_safe();
            spherical.radius = spherical.radius.max(MIN_RADIUS);
        }
        spherical
    }
}

/// Clamp an azimuth, handling ranges expressed across the +-PI seam
fn clamp_azimuth(theta: f32, min: Option<f32>, max: Option<f32>) -> f32 {
    let theta = wrap_angle(theta);
    let wrap = |angle: f32| {
        if angle < -PI {
            angle + 2.0 * PI
        } else if angle > PI {
            angle - 2.0 * PI
        } else {
            angle
        }
    };

    match (min, max) {
        (Some(lo), Some(hi)) => {
            let (lo, hi) = (wrap(lo), wrap(hi));
            if lo <= hi {
                theta.clamp(lo, hi)
            } else if theta > (lo + hi) / 2.0 {
                theta.max(lo)
            } else {
                theta.min(hi)
            }
        }
        (Some(lo), None) => theta.max(wrap(lo)),
        (None, Some(hi)) => theta.min(wrap(hi)),
        (None, None) => theta,
    }
}
