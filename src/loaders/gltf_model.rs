use anyhow::{Context, Result};
use glam::{Mat3, Mat4, Vec3};

use crate::config::DecoderConfig;
use crate::core::scene::{MeshData, ModelGraph};
use crate::traits::ModelDecoder;

/// Geometry compression extensions that need an external decoder module
const COMPRESSION_EXTENSIONS: [&str; 2] = ["KHR_draco_mesh_compression", "EXT_meshopt_compression"];

const DEFAULT_COLOR: [f32; 4] = [0.8, 0.8, 0.8, 1.0];

/// Decodes binary glTF (GLB) or embedded glTF into world-space meshes
#[derive(Debug, Clone, Copy, Default)]
pub struct GltfDecoder;

impl ModelDecoder for GltfDecoder {
    fn decode(&self, bytes: &[u8], config: &DecoderConfig) -> Result<ModelGraph> {
        let gltf = gltf::Gltf::from_slice_without_validation(bytes)
            .context("not a glTF or GLB document")?;
        check_required_extensions(gltf.extensions_required(), config)?;

        let (document, buffers, _images) =
            gltf::import_slice(bytes).context("failed to import glTF document")?;

        log::debug!(
            "glTF: {} scenes, {} nodes, {} meshes",
            document.scenes().count(),
            document.nodes().count(),
            document.meshes().count()
        );

        let scene = document
            .default_scene()
            .or_else(|| document.scenes().next())
            .context("glTF document has no scenes")?;

        let mut meshes = Vec::new();
        for node in scene.nodes() {
            process_node(&node, &buffers, &Mat4::IDENTITY, &mut meshes)?;
        }

        if meshes.is_empty() {
            log::warn!("glTF scene contains no triangle geometry");
        }

        Ok(ModelGraph {
            name: scene.name().unwrap_or("model").to_string(),
            meshes,
        })
    }
}

fn check_required_extensions<'a>(
    required: impl Iterator<Item = &'a str>,
    config: &DecoderConfig,
) -> Result<()> {
    for extension in required {
        if COMPRESSION_EXTENSIONS.contains(&extension) {
            match &config.decoder_path {
                None => anyhow::bail!(
                    "model requires {} but no decoder_path is configured",
                    extension
                ),
                Some(path) => anyhow::bail!(
                    "model requires {}; the decoder at {} cannot be loaded by this build",
                    extension,
                    path.display()
                ),
            }
        }
    }
    Ok(())
}

/// Recursively processes glTF nodes
fn process_node(
    node: &gltf::Node,
    buffers: &[gltf::buffer::Data],
    parent_transform: &Mat4,
    meshes: &mut Vec<MeshData>,
) -> Result<()> {
    let local_transform = Mat4::from_cols_array_2d(&node.transform().matrix());
    let global_transform = *parent_transform * local_transform;

    if let Some(mesh) = node.mesh() {
        process_mesh(&mesh, buffers, &global_transform, meshes)?;
    }

    for child in node.children() {
        process_node(&child, buffers, &global_transform, meshes)?;
    }

    Ok(())
}

fn process_mesh(
    mesh: &gltf::Mesh,
    buffers: &[gltf::buffer::Data],
    transform: &Mat4,
    meshes: &mut Vec<MeshData>,
) -> Result<()> {
    let normal_matrix = Mat3::from_mat4(*transform).inverse().transpose();

    for primitive in mesh.primitives() {
        if primitive.mode() != gltf::mesh::Mode::Triangles {
            log::debug!(
                "skipping {:?} primitive in mesh {:?}",
                primitive.mode(),
                mesh.name()
            );
            continue;
        }

        let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|data| &data[..]));

        let positions: Vec<Vec3> = reader
            .read_positions()
            .with_context(|| format!("mesh {:?} primitive has no positions", mesh.name()))?
            .map(|p| transform.transform_point3(Vec3::from_array(p)))
            .collect();
        if positions.is_empty() {
            continue;
        }

        let indices: Vec<u32> = match reader.read_indices() {
            Some(indices) => indices.into_u32().collect(),
            None => (0..positions.len() as u32).collect(),
        };

        let normals: Vec<Vec3> = match reader.read_normals() {
            Some(normals) => normals
                .map(|n| {
                    (normal_matrix * Vec3::from_array(n))
                        .try_normalize()
                        .unwrap_or(Vec3::Y)
                })
                .collect(),
            None => compute_normals(&positions, &indices),
        };

        let base_color = primitive.material().pbr_metallic_roughness().base_color_factor();

        meshes.push(MeshData {
            positions,
            normals,
            indices,
            base_color,
        });
    }

    Ok(())
}

/// Area-weighted vertex normals for meshes that ship without them
pub fn compute_normals(positions: &[Vec3], indices: &[u32]) -> Vec<Vec3> {
    let mut normals = vec![Vec3::ZERO; positions.len()];
    for triangle in indices.chunks_exact(3) {
        let [a, b, c] = [triangle[0], triangle[1], triangle[2]].map(|i| i as usize);
        if a >= positions.len() || b >= positions.len() || c >= positions.len() {
            continue;
        }
        let face = (positions[b] - positions[a]).cross(positions[c] - positions[a]);
        normals[a] += face;
        normals[b] += face;
        normals[c] += face;
    }
    normals
        .into_iter()
        .map(|n| n.try_normalize().unwrap_or(Vec3::Y))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    /// Pack a JSON document and binary chunk into a GLB container
    fn glb(json: &str, bin: &[u8]) -> Vec<u8> {
        let mut json = json.as_bytes().to_vec();
        while json.len() % 4 != 0 {
            json.push(b' ');
        }
        let mut bin = bin.to_vec();
        while bin.len() % 4 != 0 {
            bin.push(0);
        }

        let total = 12 + 8 + json.len() + 8 + bin.len();
        let mut out = Vec::with_capacity(total);
        out.extend_from_slice(b"glTF");
        out.extend_from_slice(&2u32.to_le_bytes());
        out.extend_from_slice(&(total as u32).to_le_bytes());
        out.extend_from_slice(&(json.len() as u32).to_le_bytes());
        out.extend_from_slice(b"JSON");
        out.extend_from_slice(&json);
        out.extend_from_slice(&(bin.len() as u32).to_le_bytes());
        out.extend_from_slice(b"BIN\0");
        out.extend_from_slice(&bin);
        out
    }

    fn triangle_glb() -> Vec<u8> {
        let mut bin = Vec::new();
        for v in [[0.0f32, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]] {
            for c in v {
                bin.extend_from_slice(&c.to_le_bytes());
            }
        }
        for i in [0u16, 1, 2] {
            bin.extend_from_slice(&i.to_le_bytes());
        }

        let json = r#"{
            "asset": {"version": "2.0"},
            "scene": 0,
            "scenes": [{"name": "room", "nodes": [0]}],
            "nodes": [{"translation": [0.0, 1.0, 0.0], "children": [1]}, {"mesh": 0}],
            "meshes": [{"primitives": [{"attributes": {"POSITION": 0}, "indices": 1}]}],
            "buffers": [{"byteLength": 42}],
            "bufferViews": [
                {"buffer": 0, "byteOffset": 0, "byteLength": 36},
                {"buffer": 0, "byteOffset": 36, "byteLength": 6}
            ],
            "accessors": [
                {"bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
                 "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0]},
                {"bufferView": 1, "componentType": 5123, "count": 3, "type": "SCALAR"}
            ]
        }"#;
        glb(json, &bin)
    }

    #[test]
    fn test_decode_applies_node_transforms() {
        let model = GltfDecoder
            .decode(&triangle_glb(), &DecoderConfig::default())
            .unwrap();
        assert_eq!(model.name, "room");
        assert_eq!(model.meshes.len(), 1);

        let mesh = &model.meshes[0];
        assert_eq!(mesh.positions[0], Vec3::new(0.0, 1.0, 0.0));
        assert_eq!(mesh.positions[2], Vec3::new(0.0, 2.0, 0.0));
        assert_eq!(mesh.indices, vec![0, 1, 2]);
        assert_eq!(mesh.base_color, [1.0, 1.0, 1.0, 1.0]);
        // No normals in the file; computed from winding
        assert!((mesh.normals[0] - Vec3::Z).length() < 1e-5);

        let bounds = model.bounds().unwrap();
        assert_eq!(bounds.min, Vec3::new(0.0, 1.0, 0.0));
        assert_eq!(bounds.max, Vec3::new(1.0, 2.0, 0.0));
    }

    #[test]
    fn test_compressed_model_without_decoder_path() {
        let json = r#"{
            "asset": {"version": "2.0"},
            "extensionsUsed": ["KHR_draco_mesh_compression"],
            "extensionsRequired": ["KHR_draco_mesh_compression"]
        }"#;
        let err = GltfDecoder
            .decode(json.as_bytes(), &DecoderConfig::default())
            .unwrap_err();
        let message = format!("{:#}", err);
        assert!(message.contains("KHR_draco_mesh_compression"));
        assert!(message.contains("no decoder_path"));
    }

    #[test]
    fn test_compressed_model_names_configured_decoder() {
        let json = r#"{
            "asset": {"version": "2.0"},
            "extensionsUsed": ["EXT_meshopt_compression"],
            "extensionsRequired": ["EXT_meshopt_compression"]
        }"#;
        let config = DecoderConfig {
            decoder_path: Some(PathBuf::from("/draco/")),
        };
        let err = GltfDecoder.decode(json.as_bytes(), &config).unwrap_err();
        assert!(format!("{:#}", err).contains("/draco/"));
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(GltfDecoder
            .decode(b"definitely not gltf", &DecoderConfig::default())
            .is_err());
    }

    #[test]
    fn test_compute_normals_shared_vertices() {
        let positions = [Vec3::ZERO, Vec3::X, Vec3::Y, Vec3::new(1.0, 1.0, 0.0)];
        let normals = compute_normals(&positions, &[0, 1, 2, 1, 3, 2]);
        for n in normals {
            assert!((n - Vec3::Z).length() < 1e-5);
        }
    }
}
