// ABOUTME: Configuration types and parsing for berth.yml.
// ABOUTME: Every field has a default, so a missing file means the default config.

mod init;
mod timeouts;

pub use init::init_config;
pub use timeouts::TimeoutsConfig;

use crate::error::Result;
use crate::runtime::RuntimeConfig;
use crate::types::ImageRef;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const CONFIG_FILENAME: &str = "berth.yml";
pub const CONFIG_FILENAME_ALT: &str = "berth.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".berth/config.yml";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Explicit runtime and socket; auto-detected when absent.
    #[serde(default)]
    pub runtime: RuntimeConfig,

    /// Image for the echo, worker, and build scenarios.
    #[serde(default = "default_base_image")]
    pub base_image: ImageRef,

    /// Tag given to the image built by the build scenario.
    #[serde(default = "default_build_tag")]
    pub build_tag: ImageRef,

    /// Host used to reach published container ports.
    #[serde(default = "default_probe_host")]
    pub probe_host: String,

    #[serde(default)]
    pub timeouts: TimeoutsConfig,
}

fn default_base_image() -> ImageRef {
    ImageRef::library("alpine", "latest")
}

fn default_build_tag() -> ImageRef {
    ImageRef::library("berth-demo", "latest")
}

fn default_probe_host() -> String {
    "127.0.0.1".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Config {
            runtime: RuntimeConfig::default(),
            base_image: default_base_image(),
            build_tag: default_build_tag(),
            probe_host: default_probe_host(),
            timeouts: TimeoutsConfig::default(),
        }
    }
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        // An empty document is an empty mapping.
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// First config file present in `dir`, in lookup order.
    pub fn locate(dir: &Path) -> Option<PathBuf> {
        [CONFIG_FILENAME, CONFIG_FILENAME_ALT, CONFIG_FILENAME_DIR]
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.exists())
    }

    /// Load the config file in `dir`, or the defaults if there is none.
    pub fn discover(dir: &Path) -> Result<Self> {
        match Self::locate(dir) {
            Some(path) => {
                tracing::debug!(path = %path.display(), "loading config");
                Self::load(&path)
            }
            None => Ok(Self::default()),
        }
    }
}
