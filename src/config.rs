use chunkhold_content::RetentionSettings;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::warn;

pub const DEFAULT_CONFIG_PATH: &str = "config/chunkhold.toml";

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct HostConfig {
    pub retention: RetentionSettings,
    pub host: HostSettings,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct HostSettings {
    /// Simulation ticks to run before saving and exiting.
    pub ticks: u64,
    pub save_dir: PathBuf,
    /// Reconcile the ticket registry against loaded machines on activation.
    pub validate_on_load: bool,
}

impl Default for HostSettings {
    fn default() -> Self {
        Self {
            ticks: 200,
            save_dir: PathBuf::from("saves/default"),
            validate_on_load: true,
        }
    }
}

impl HostConfig {
    /// Load configuration from the default path.
    pub fn load() -> Self {
        Self::load_from_path(Path::new(DEFAULT_CONFIG_PATH))
    }

    /// Load configuration from an explicit path, falling back to defaults on errors.
    pub fn load_from_path(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<HostConfig>(&contents) {
                Ok(cfg) => cfg,
                Err(err) => {
                    warn!("Failed to parse {}: {err}. Using defaults", path.display());
                    HostConfig::default()
                }
            },
            Err(err) => {
                if path != Path::new(DEFAULT_CONFIG_PATH)
                    || err.kind() != std::io::ErrorKind::NotFound
                {
                    warn!("Failed to read {}: {err}. Using defaults", path.display());
                } else {
                    warn!(
                        "Host config not found at {}. Using defaults",
                        path.display()
                    );
                }
                HostConfig::default()
            }
        }
    }
}
