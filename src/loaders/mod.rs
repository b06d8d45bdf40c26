pub mod environment;
pub mod fetch;
pub mod gltf_model;

pub use environment::HdrDecoder;
pub use fetch::FileFetcher;
pub use gltf_model::{compute_normals, GltfDecoder};
