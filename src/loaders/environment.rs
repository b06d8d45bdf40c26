use std::io::Cursor;

use anyhow::{Context, Result};
use glam::Vec3;
use image::codecs::hdr::HdrDecoder as RadianceDecoder;

use crate::core::scene::EnvironmentMap;
use crate::traits::EnvironmentDecoder;

/// Decodes equirectangular Radiance (.hdr) environment maps
#[derive(Debug, Clone, Copy, Default)]
pub struct HdrDecoder;

impl EnvironmentDecoder for HdrDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<EnvironmentMap> {
        let decoder = RadianceDecoder::new(Cursor::new(bytes)).context("not a Radiance HDR image")?;
        let meta = decoder.metadata();
        let pixels = decoder
            .read_image_hdr()
            .context("failed to read HDR pixel data")?;

        let texels: Vec<Vec3> = pixels.into_iter().map(|pixel| Vec3::from_array(pixel.0)).collect();
        if texels.len() != (meta.width as usize) * (meta.height as usize) {
            anyhow::bail!(
                "HDR image declares {}x{} but holds {} texels",
                meta.width,
                meta.height,
                texels.len()
            );
        }

        log::debug!("decoded HDR environment {}x{}", meta.width, meta.height);
        Ok(EnvironmentMap {
            width: meta.width,
            height: meta.height,
            texels,
        })
    }
}
