use std::path::{Path, PathBuf};

use clap::Parser;

use crate::config::ViewerConfig;
use crate::error::ConfigurationError;

#[derive(Parser, Debug, Clone, Default)]
#[command(name = "immersive-viewer")]
#[command(about = "Orbit and immersive viewer for glTF scenes", long_about = None)]
pub struct Cli {
    /// JSON configuration file; flags below override its values
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Model to load (URL, or a path on disk)
    #[arg(long, short)]
    pub model: Option<String>,

    /// Equirectangular HDR environment map
    #[arg(long, short)]
    pub environment: Option<String>,

    /// Directory holding compressed-mesh decoder binaries
    #[arg(long)]
    pub decoder_path: Option<PathBuf>,

    /// Directory that root-relative asset URLs resolve against
    #[arg(long)]
    pub asset_root: Option<PathBuf>,

    /// Apply orbit input immediately instead of easing it out
    #[arg(long = "no-damping", default_value = "false")]
    pub no_damping: bool,

    /// Report immersive support through a simulated headset
    #[arg(long = "simulate-xr", default_value = "false")]
    pub simulate_xr: bool,

    /// Disable UI elements
    #[arg(long = "no-ui", default_value = "false")]
    pub no_ui: bool,
}

impl Cli {
    /// Load the configured file (or defaults) and layer the flags on top
    pub fn resolve_config(&self) -> Result<ViewerConfig, ConfigurationError> {
        let mut config = match &self.config {
            Some(path) => ViewerConfig::load(path)?,
            None => ViewerConfig::default(),
        };
        self.apply(&mut config);
        config.validate()?;
        Ok(config)
    }

    pub fn apply(&self, config: &mut ViewerConfig) {
        if let Some(model) = &self.model {
            config.assets.model_url = Some(to_url(model));
        }
        if let Some(environment) = &self.environment {
            config.assets.environment_url = Some(to_url(environment));
        }
        if let Some(path) = &self.decoder_path {
            config.assets.decoder.decoder_path = Some(path.clone());
        }
        if let Some(root) = &self.asset_root {
            config.assets.asset_root = root.clone();
        }
        if self.no_damping {
            config.navigation.damping = false;
        }
    }
}

/// Files that exist on disk are addressed with `file://`, anything else is
/// passed through and resolved by the fetcher
fn to_url(location: &str) -> String {
    if location.contains("://") {
        return location.to_string();
    }
    let path = Path::new(location);
    if path.is_file() {
        let absolute = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        format!("file://{}", absolute.display())
    } else {
        location.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_defaults() {
        let cli = Cli::parse_from([
            "immersive-viewer",
            "--model",
            "/models/house.glb",
            "--decoder-path",
            "draco",
            "--no-damping",
        ]);
        let mut config = ViewerConfig::default();
        cli.apply(&mut config);

        assert_eq!(config.assets.model_url.as_deref(), Some("/models/house.glb"));
        assert_eq!(
            config.assets.decoder.decoder_path,
            Some(PathBuf::from("draco"))
        );
        assert!(!config.navigation.damping);
        assert!(!cli.simulate_xr);
    }

    #[test]
    fn test_absent_flags_keep_config() {
        let cli = Cli::parse_from(["immersive-viewer"]);
        let mut config = ViewerConfig::default();
        cli.apply(&mut config);
        assert_eq!(config, ViewerConfig::default());
    }

    #[test]
    fn test_existing_file_becomes_file_url() {
        let path = std::env::temp_dir().join("immersive_viewer_cli_model.glb");
        std::fs::write(&path, b"glTF").unwrap();

        let url = to_url(path.to_str().unwrap());
        assert!(url.starts_with("file://"));
        assert!(url.ends_with("immersive_viewer_cli_model.glb"));

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_urls_pass_through() {
        assert_eq!(to_url("https://host/a.glb"), "https://host/a.glb");
        assert_eq!(to_url("/models/missing.glb"), "/models/missing.glb");
    }

    #[test]
    fn test_missing_config_file_is_error() {
        let cli = Cli::parse_from(["immersive-viewer", "--config", "/no/such/viewer.json"]);
        assert!(cli.resolve_config().is_err());
    }
}
