use std::f32::consts::PI;
use std::path::{Path, PathBuf};

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;
use crate::types::CameraPose;

/// Complete viewer configuration, loadable from JSON
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub assets: AssetConfig,
    pub camera: CameraConfig,
    pub navigation: NavigationConfig,
    pub session: SessionConfig,
    pub lighting: LightingConfig,
}

impl ViewerConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            ConfigurationError::new(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigurationError> {
        let config: ViewerConfig = serde_json::from_str(text)
            .map_err(|e| ConfigurationError::new(format!("malformed config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        self.camera.validate()?;
        self.navigation.validate()?;
        if !self.assets.bounds_padding.is_finite() {
            return Err(ConfigurationError::new("bounds_padding must be finite"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetConfig {
    /// Compressed model location (glTF binary)
    pub model_url: Option<String>,
    /// Equirectangular HDR environment map location
    pub environment_url: Option<String>,
    /// Directory that web-style absolute URLs ("/models/x.glb") resolve against
    pub asset_root: PathBuf,
    pub decoder: DecoderConfig,
    /// Margin added around the model's bounding volume
    pub bounds_padding: f32,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            model_url: Some("/models/kellyburn.glb".to_string()),
            environment_url: None,
            asset_root: PathBuf::from("public"),
            decoder: DecoderConfig::default(),
            bounds_padding: 0.0,
        }
    }
}

/// Geometry decoder settings passed with every model load
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// Location of the compressed-geometry decoder module
    pub decoder_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitialPoseStrategy {
    /// Keep the configured default pose
    #[default]
    Explicit,
    /// Stand at eye height inside the model once its bounds are known
    FromBounds,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub fov_degrees: f32,
    pub near: f32,
    pub far: f32,
    pub position: [f32; 3],
    pub target: [f32; 3],
    pub initial_pose: InitialPoseStrategy,
    pub eye_height: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_degrees: 50.0,
            near: 0.1,
            far: 1000.0,
            position: [0.0, 2.0, 5.0],
            target: [0.0, 0.0, 0.0],
            initial_pose: InitialPoseStrategy::Explicit,
            eye_height: 1.6,
        }
    }
}

impl CameraConfig {
    pub fn default_pose(&self) -> CameraPose {
        CameraPose::new(Vec3::from_array(self.position), Vec3::from_array(self.target))
    }

    fn validate(&self) -> Result<(), ConfigurationError> {
        if !(self.fov_degrees > 0.0 && self.fov_degrees < 180.0) {
            return Err(ConfigurationError::new(format!(
                "fov_degrees must be in (0, 180), got {}",
                self.fov_degrees
            )));
        }
        if !(self.near > 0.0 && self.far > self.near && self.far.is_finite()) {
            return Err(ConfigurationError::new(format!(
                "clip planes must satisfy 0 < near < far, got near={} far={}",
                self.near, self.far
            )));
        }
        if !self.eye_height.is_finite() {
            return Err(ConfigurationError::new("eye_height must be finite"));
        }
        let finite = self.position.iter().chain(self.target.iter()).all(|v| v.is_finite());
        if !finite {
            return Err(ConfigurationError::new("default pose must be finite"));
        }
        Ok(())
    }
}

/// Pointer navigation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationConfig {
    pub enable_rotate: bool,
    pub enable_pan: bool,
    pub enable_zoom: bool,
    pub damping: bool,
    pub damping_factor: f32,
    pub rotate_speed: f32,
    pub pan_speed: f32,
    pub zoom_speed: f32,
    pub constraints: ConstraintProfile,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            enable_rotate: true,
            enable_pan: true,
            enable_zoom: true,
            damping: true,
            damping_factor: 0.05,
            rotate_speed: 1.0,
            pan_speed: 1.0,
            zoom_speed: 1.0,
            constraints: ConstraintProfile::Unconstrained,
        }
    }
}

impl NavigationConfig {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.damping && !(self.damping_factor > 0.0 && self.damping_factor <= 1.0) {
            return Err(ConfigurationError::new(format!(
                "damping_factor must be in (0, 1], got {}",
                self.damping_factor
            )));
        }
        for (name, speed) in [
            ("rotate_speed", self.rotate_speed),
            ("pan_speed", self.pan_speed),
            ("zoom_speed", self.zoom_speed),
        ] {
            if !speed.is_finite() || speed < 0.0 {
                return Err(ConfigurationError::new(format!(
                    "{} must be a non-negative number, got {}",
                    name, speed
                )));
            }
        }
        self.constraints.validate()
    }
}

/// Mutually exclusive ways of restricting the camera
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "profile", rename_all = "snake_case")]
pub enum ConstraintProfile {
    #[default]
    Unconstrained,
    /// Independent limits on orbit distance, polar angle and azimuth
    Spherical(ConstraintPolicy),
    /// Keep camera and target inside the model's bounding volume
    BoxClamp { padding: f32 },
}

impl ConstraintProfile {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        match self {
            ConstraintProfile::Unconstrained => Ok(()),
            ConstraintProfile::Spherical(policy) => policy.validate(),
            ConstraintProfile::BoxClamp { padding } => {
                if padding.is_finite() {
                    Ok(())
                } else {
                    Err(ConfigurationError::new("box clamp padding must be finite"))
                }
            }
        }
    }
}

/// Optional per-axis limits; `None` leaves the axis unconstrained
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConstraintPolicy {
    pub min_distance: Option<f32>,
    pub max_distance: Option<f32>,
    pub min_polar_angle: Option<f32>,
    pub max_polar_angle: Option<f32>,
    pub min_azimuth: Option<f32>,
    pub max_azimuth: Option<f32>,
}

impl ConstraintPolicy {
    pub fn distance(min: f32, max: f32) -> Self {
        Self {
            min_distance: Some(min),
            max_distance: Some(max),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        check_range(
            "distance",
            self.min_distance,
            self.max_distance,
            0.0,
            f32::INFINITY,
        )?;
        check_range(
            "polar angle",
            self.min_polar_angle,
            self.max_polar_angle,
            0.0,
            PI,
        )?;
        check_range(
            "azimuth",
            self.min_azimuth,
            self.max_azimuth,
            -2.0 * PI,
            2.0 * PI,
        )
    }
}

fn check_range(
    name: &str,
    min: Option<f32>,
    max: Option<f32>,
    lower: f32,
    upper: f32,
) -> Result<(), ConfigurationError> {
    for (label, value) in [("min", min), ("max", max)] {
        if let Some(v) = value {
            if !v.is_finite() || v < lower || v > upper {
                return Err(ConfigurationError::new(format!(
                    "{} {} must be within [{}, {}], got {}",
                    label, name, lower, upper, v
                )));
            }
        }
    }
    if let (Some(lo), Some(hi)) = (min, max) {
        if lo > hi {
            return Err(ConfigurationError::new(format!(
                "min {} ({}) exceeds max {} ({})",
                name, lo, name, hi
            )));
        }
    }
    Ok(())
}

/// Immersive session settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// World-space point the tracking origin is moved to on session start
    pub reference_position: [f32; 3],
    /// Keep pointer navigation live during a session (hybrid interaction)
    pub keep_controls_enabled: bool,
    pub enter_label: String,
    pub exit_label: String,
    pub unsupported_notice: String,
    pub unavailable_notice: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            reference_position: [0.0, 0.0, 0.0],
            keep_controls_enabled: false,
            enter_label: "Enter VR".to_string(),
            exit_label: "Exit VR".to_string(),
            unsupported_notice: "Immersive mode not supported".to_string(),
            unavailable_notice: "Immersive API unavailable".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightingConfig {
    pub ambient_color: [f32; 3],
    pub ambient_intensity: f32,
    pub directional_color: [f32; 3],
    pub directional_intensity: f32,
    pub directional_position: [f32; 3],
    /// Scale applied to the environment map's radiance
    pub environment_intensity: f32,
    pub background: [f32; 3],
}

impl Default for LightingConfig {
    fn default() -> Self {
        Self {
            ambient_color: [1.0, 1.0, 1.0],
            ambient_intensity: 0.6,
            directional_color: [1.0, 1.0, 1.0],
            directional_intensity: 1.0,
            directional_position: [5.0, 10.0, 7.5],
            environment_intensity: 1.0,
            background: [0.0, 0.0, 0.0],
        }
    }
}
