//! Configuration management for bundle-loader
//!
//! Handles configuration loading and validation.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::module::traits::HostContext;

/// Logging configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log filter (e.g. "info", "bundle_loader::module=debug"); `RUST_LOG` wins
    #[serde(default)]
    pub filter: Option<String>,

    /// Emit JSON logs (requires the `json-logging` feature)
    #[serde(default)]
    pub json_format: bool,
}

/// Loader configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// The host's own resource path (first entry of the merged path set)
    #[serde(default = "default_host_resource_path")]
    pub host_resource_path: PathBuf,

    /// Directory containing unpacked bundles, one subdirectory each
    #[serde(default = "default_bundles_dir")]
    pub bundles_dir: PathBuf,

    /// Directory for per-bundle data
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Registration order (empty = discovered bundles sorted by name)
    #[serde(default)]
    pub bundle_order: Vec<String>,

    /// Bundles forced lazy regardless of their manifest
    #[serde(default)]
    pub lazy_bundles: Vec<String>,

    /// Properties handed to every bundle's context
    #[serde(default)]
    pub properties: std::collections::HashMap<String, String>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_host_resource_path() -> PathBuf {
    PathBuf::from("host")
}

fn default_bundles_dir() -> PathBuf {
    PathBuf::from("bundles")
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data/bundles")
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            host_resource_path: default_host_resource_path(),
            bundles_dir: default_bundles_dir(),
            data_dir: default_data_dir(),
            bundle_order: Vec::new(),
            lazy_bundles: Vec::new(),
            properties: std::collections::HashMap::new(),
            logging: LoggingConfig::default(),
        }
    }
}

impl LoaderConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: LoaderConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file(&self, path: &Path) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.host_resource_path.as_os_str().is_empty() {
            return Err(anyhow::anyhow!("host_resource_path cannot be empty"));
        }

        let mut seen = std::collections::HashSet::new();
        for name in &self.bundle_order {
            if !seen.insert(name) {
                return Err(anyhow::anyhow!(
                    "bundle {} appears more than once in bundle_order",
                    name
                ));
            }
        }

        Ok(())
    }

    /// Whether `name` is forced lazy
    pub fn is_forced_lazy(&self, name: &str) -> bool {
        self.lazy_bundles.iter().any(|n| n == name)
    }

    /// Host context described by this configuration
    pub fn host_context(&self) -> HostContext {
        let mut context = HostContext::new(&self.host_resource_path, &self.data_dir);
        context.properties = self.properties.clone();
        context
    }
}
