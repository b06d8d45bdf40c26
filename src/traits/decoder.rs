use crate::config::DecoderConfig;
use crate::core::scene::{EnvironmentMap, ModelGraph};

/// Turns fetched model bytes into a scene-ready graph
pub trait ModelDecoder {
    fn decode(&self, bytes: &[u8], config: &DecoderConfig) -> anyhow::Result<ModelGraph>;
}

/// Turns fetched environment texture bytes into linear radiance
pub trait EnvironmentDecoder {
    fn decode(&self, bytes: &[u8]) -> anyhow::Result<EnvironmentMap>;
}
