//! Bundle manifest parsing and validation
//!
//! Handles parsing `bundle.toml` / `bundle.json` manifests and converting
//! them to module descriptors.

use crate::module::traits::{BundleError, ModuleDescriptor};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// TOML manifest file name
pub const MANIFEST_TOML: &str = "bundle.toml";
/// JSON manifest file name
pub const MANIFEST_JSON: &str = "bundle.json";

/// Bundle manifest (bundle.toml / bundle.json structure)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleManifest {
    /// Bundle name; also the symbol prefix the bundle owns
    pub name: String,
    /// Defer loading until first use
    #[serde(default)]
    pub lazy: bool,
    /// Entry point symbol, if the bundle has one
    #[serde(default)]
    pub entry_point: Option<String>,
    /// Whether the bundle ships resources
    #[serde(default = "default_true")]
    pub has_resources: bool,
    /// Native library directory, relative to the bundle directory
    #[serde(default)]
    pub library_dir: Option<String>,
    /// Packaged bundle file, relative to the bundle directory
    /// (defaults to the directory itself)
    #[serde(default)]
    pub source: Option<String>,
}

fn default_true() -> bool {
    true
}

impl BundleManifest {
    /// Load manifest from file; `.json` files are parsed as JSON, anything else as TOML
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, BundleError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            BundleError::InvalidManifest(format!("Failed to read manifest file {:?}: {}", path, e))
        })?;

        let is_json = path.extension().map(|ext| ext == "json").unwrap_or(false);
        let manifest: BundleManifest = if is_json {
            serde_json::from_str(&contents)?
        } else {
            toml::from_str(&contents)?
        };

        manifest.validate()?;
        Ok(manifest)
    }

    /// Check required fields
    pub fn validate(&self) -> Result<(), BundleError> {
        if self.name.is_empty() {
            return Err(BundleError::InvalidManifest(
                "Bundle name cannot be empty".to_string(),
            ));
        }
        if self.name.chars().any(char::is_whitespace) {
            return Err(BundleError::InvalidManifest(format!(
                "Bundle name contains whitespace: {:?}",
                self.name
            )));
        }
        if matches!(self.entry_point.as_deref(), Some("")) {
            return Err(BundleError::InvalidManifest(
                "Entry point cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Convert to a descriptor for a bundle unpacked at `bundle_dir`
    pub fn to_descriptor(&self, bundle_dir: &Path) -> ModuleDescriptor {
        ModuleDescriptor {
            name: self.name.clone(),
            source_path: self
                .source
                .as_ref()
                .map(|source| bundle_dir.join(source))
                .unwrap_or_else(|| bundle_dir.to_path_buf()),
            extracted_path: bundle_dir.to_path_buf(),
            has_resources: self.has_resources,
            entry_point: self.entry_point.clone(),
            native_library_path: self.library_dir.as_ref().map(|dir| bundle_dir.join(dir)),
            lazy: self.lazy,
        }
    }
}
