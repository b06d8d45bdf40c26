use std::rc::Rc;

use glam::Vec3;

use crate::config::LightingConfig;
use crate::math::BoundingVolume;

/// One drawable primitive, already in world space
#[derive(Debug, Clone, PartialEq)]
pub struct MeshData {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub indices: Vec<u32>,
    pub base_color: [f32; 4],
}

impl MeshData {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Decoded model ready to be placed in the scene
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ModelGraph {
    pub name: String,
    pub meshes: Vec<MeshData>,
}

impl ModelGraph {
    pub fn bounds(&self) -> Option<BoundingVolume> {
        BoundingVolume::from_points(
            self.meshes
                .iter()
                .flat_map(|mesh| mesh.positions.iter().copied()),
        )
    }

    pub fn triangle_count(&self) -> usize {
        self.meshes.iter().map(MeshData::triangle_count).sum()
    }
}

/// Equirectangular environment radiance in linear RGB
#[derive(Debug, Clone, PartialEq)]
pub struct EnvironmentMap {
    pub width: u32,
    pub height: u32,
    pub texels: Vec<Vec3>,
}

impl EnvironmentMap {
    /// Solid-angle weighted mean radiance, used as image-based ambient term
    pub fn average_radiance(&self) -> Vec3 {
        if self.width == 0 || self.height == 0 || self.texels.is_empty() {
            return Vec3::ZERO;
        }

        let mut sum = Vec3::ZERO;
        let mut weight_sum = 0.0f32;
        for (row, texels) in self.texels.chunks(self.width as usize).enumerate() {
            // Rows near the poles cover less of the sphere
            let latitude = ((row as f32 + 0.5) / self.height as f32 - 0.5) * std::f32::consts::PI;
            let weight = latitude.cos();
            for texel in texels {
                sum += *texel * weight;
            }
            weight_sum += weight * texels.len() as f32;
        }

        if weight_sum > 0.0 {
            sum / weight_sum
        } else {
            Vec3::ZERO
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightingMode {
    /// Environment map loaded; its radiance adds to the ambient term
    Environment,
    AmbientOnly,
}

/// Fixed lights of the scene, derived from configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Lighting {
    pub ambient: Vec3,
    pub directional_color: Vec3,
    pub directional_position: Vec3,
    pub environment_intensity: f32,
    pub background: Vec3,
}

impl Lighting {
    pub fn from_config(config: &LightingConfig) -> Self {
        Self {
            ambient: Vec3::from_array(config.ambient_color) * config.ambient_intensity,
            directional_color: Vec3::from_array(config.directional_color)
                * config.directional_intensity,
            directional_position: Vec3::from_array(config.directional_position),
            environment_intensity: config.environment_intensity,
            background: Vec3::from_array(config.background),
        }
    }

    /// Direction the directional light travels toward the origin, normalized
    pub fn light_direction(&self) -> Vec3 {
        (-self.directional_position)
            .try_normalize()
            .unwrap_or(Vec3::NEG_Y)
    }
}

impl Default for Lighting {
    fn default() -> Self {
        Self::from_config(&LightingConfig::default())
    }
}

/// Everything the renderer draws
#[derive(Debug, Clone, Default)]
pub struct SceneGraph {
    model: Option<Rc<ModelGraph>>,
    environment: Option<Rc<EnvironmentMap>>,
    bounds: Option<BoundingVolume>,
    lighting: Lighting,
    revision: u64,
}

impl SceneGraph {
    pub fn new(lighting: Lighting) -> Self {
        Self {
            lighting,
            ..Default::default()
        }
    }

    pub fn model(&self) -> Option<&Rc<ModelGraph>> {
        self.model.as_ref()
    }

    pub fn environment(&self) -> Option<&Rc<EnvironmentMap>> {
        self.environment.as_ref()
    }

    pub fn bounds(&self) -> Option<BoundingVolume> {
        self.bounds
    }

    pub fn lighting(&self) -> &Lighting {
        &self.lighting
    }

    /// Bumped on every content change so renderers know when to re-upload
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn set_model(&mut self, model: Rc<ModelGraph>, bounds: Option<BoundingVolume>) {
        self.model = Some(model);
        self.bounds = bounds;
        self.revision += 1;
    }

    pub fn set_environment(&mut self, environment: Rc<EnvironmentMap>) {
        self.environment = Some(environment);
        self.revision += 1;
    }

    pub fn lighting_mode(&self) -> LightingMode {
        if self.environment.is_some() {
            LightingMode::Environment
        } else {
            LightingMode::AmbientOnly
        }
    }

    /// Ambient light including the environment contribution when present
    pub fn effective_ambient(&self) -> Vec3 {
        match &self.environment {
            Some(env) => {
                self.lighting.ambient
                    + env.average_radiance() * self.lighting.environment_intensity
            }
            None => self.lighting.ambient,
        }
    }
}
