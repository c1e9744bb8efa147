//! Bundle discovery
//!
//! Scans a bundles directory and discovers unpacked bundles in the order
//! they should be registered.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::module::registry::manifest::{BundleManifest, MANIFEST_JSON, MANIFEST_TOML};
use crate::module::traits::{BundleError, ModuleDescriptor};

/// Discovered bundle information
#[derive(Debug, Clone)]
pub struct DiscoveredBundle {
    /// Bundle directory path
    pub directory: PathBuf,
    /// Bundle manifest
    pub manifest: BundleManifest,
}

impl DiscoveredBundle {
    /// Descriptor for registration; `force_lazy` overrides the manifest's flag
    pub fn descriptor(&self, force_lazy: bool) -> ModuleDescriptor {
        let mut descriptor = self.manifest.to_descriptor(&self.directory);
        descriptor.lazy |= force_lazy;
        descriptor
    }
}

/// Bundle discovery scanner
pub struct BundleDiscovery {
    /// Base directory to scan for bundles
    bundles_dir: PathBuf,
}

impl BundleDiscovery {
    /// Create a new bundle discovery scanner
    pub fn new<P: AsRef<Path>>(bundles_dir: P) -> Self {
        Self {
            bundles_dir: bundles_dir.as_ref().to_path_buf(),
        }
    }

    /// Discover all bundles
    ///
    /// Bundles named in `order` come first, in that order; the rest follow
    /// sorted by name. Directories without a parsable manifest are skipped.
    pub fn discover_bundles(&self, order: &[String]) -> Result<Vec<DiscoveredBundle>, BundleError> {
        info!("Discovering bundles in {:?}", self.bundles_dir);

        if !self.bundles_dir.exists() {
            debug!("Bundles directory does not exist: {:?}", self.bundles_dir);
            return Ok(Vec::new());
        }

        let mut bundles = Vec::new();
        for entry in fs::read_dir(&self.bundles_dir)? {
            let path = entry?.path();
            if !path.is_dir() {
                continue;
            }

            let Some(manifest_path) = Self::manifest_path(&path) else {
                debug!("No bundle manifest in {:?}, skipping", path);
                continue;
            };

            match BundleManifest::from_file(&manifest_path) {
                Ok(manifest) => bundles.push(DiscoveredBundle {
                    directory: path,
                    manifest,
                }),
                Err(e) => {
                    warn!("Failed to parse manifest in {:?}: {}", path, e);
                }
            }
        }

        let ordered = Self::order_bundles(bundles, order);
        info!("Discovered {} bundles", ordered.len());
        Ok(ordered)
    }

    /// Discover a specific bundle by directory name
    pub fn discover_bundle(&self, dir_name: &str) -> Result<DiscoveredBundle, BundleError> {
        let directory = self.bundles_dir.join(dir_name);
        let manifest_path = Self::manifest_path(&directory).ok_or_else(|| {
            BundleError::InvalidManifest(format!("No bundle manifest in {:?}", directory))
        })?;

        let manifest = BundleManifest::from_file(manifest_path)?;
        Ok(DiscoveredBundle {
            directory,
            manifest,
        })
    }

    fn manifest_path(dir: &Path) -> Option<PathBuf> {
        [MANIFEST_TOML, MANIFEST_JSON]
            .iter()
            .map(|name| dir.join(name))
            .find(|candidate| candidate.is_file())
    }

    fn order_bundles(mut bundles: Vec<DiscoveredBundle>, order: &[String]) -> Vec<DiscoveredBundle> {
        bundles.sort_by(|a, b| a.manifest.name.cmp(&b.manifest.name));

        let mut ordered = Vec::with_capacity(bundles.len());
        for name in order {
            match bundles.iter().position(|b| &b.manifest.name == name) {
                Some(index) => ordered.push(bundles.remove(index)),
                None => warn!("Bundle {} listed in order but not found", name),
            }
        }
        ordered.extend(bundles);
        ordered
    }
}
