//! Merged resource path set
//!
//! The host sees one ordered list of resource locations: its own path first,
//! then every bundle that carries resources. The list is never edited in
//! place; each change builds a new [`MergedPathSet`] and swaps it in, so a
//! consumer holding an older snapshot keeps a consistent view.

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use crate::module::record::ModuleRecord;
use crate::module::traits::HostEnvironment;

/// Immutable, ordered resource path list; index 0 is the host path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedPathSet {
    paths: Vec<PathBuf>,
}

impl MergedPathSet {
    /// Set containing only the host path
    pub fn host_only(host_path: impl Into<PathBuf>) -> Self {
        Self {
            paths: vec![host_path.into()],
        }
    }

    pub fn host_path(&self) -> &Path {
        &self.paths[0]
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Always false: the host path is always present
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.paths.iter().any(|p| p == path)
    }

    /// New set with `path` appended
    pub fn appended(&self, path: impl Into<PathBuf>) -> Self {
        let mut paths = Vec::with_capacity(self.paths.len() + 1);
        paths.extend(self.paths.iter().cloned());
        paths.push(path.into());
        Self { paths }
    }
}

/// Build the initial set: host path, then each bundle with resources in order
///
/// Bundles without resources are skipped; an empty entry in the host's
/// resource view breaks lookups.
pub fn merge_initial(host_path: &Path, modules: &[Arc<ModuleRecord>]) -> MergedPathSet {
    let mut set = MergedPathSet::host_only(host_path);
    set.paths.extend(
        modules
            .iter()
            .filter(|m| m.has_resources())
            .map(|m| m.source_path().to_path_buf()),
    );
    set
}

/// Owns the published [`MergedPathSet`] and republishes it on change
pub struct ResourcePathMerger {
    current: ArcSwap<MergedPathSet>,
    /// Serializes writers; readers go through `current` without locking
    write_lock: Mutex<()>,
    published: AtomicBool,
    host: Arc<dyn HostEnvironment>,
}

impl ResourcePathMerger {
    pub fn new(host_path: &Path, host: Arc<dyn HostEnvironment>) -> Self {
        Self {
            current: ArcSwap::from_pointee(MergedPathSet::host_only(host_path)),
            write_lock: Mutex::new(()),
            published: AtomicBool::new(false),
            host,
        }
    }

    /// Current snapshot
    pub fn current(&self) -> Arc<MergedPathSet> {
        self.current.load_full()
    }

    pub fn is_published(&self) -> bool {
        self.published.load(Ordering::SeqCst)
    }

    /// Build and publish the initial set from every registered bundle
    ///
    /// Every included bundle is marked merged before the set goes out.
    pub fn publish_initial(&self, host_path: &Path, modules: &[Arc<ModuleRecord>]) -> Arc<MergedPathSet> {
        let _guard = self.write_lock.lock();
        let set = Arc::new(merge_initial(host_path, modules));
        for module in modules.iter().filter(|m| m.has_resources()) {
            module.mark_resources_merged();
        }
        self.current.store(Arc::clone(&set));
        self.published.store(true, Ordering::SeqCst);
        info!("Merged {} resource paths", set.len());
        self.host.publish_resource_paths(&set, false);
        set
    }

    /// Append one late-loaded bundle's resources
    ///
    /// No-op when the bundle has no resources, was already merged, or the
    /// initial set has not been published yet (the initial merge picks it
    /// up). Returns true when the set changed.
    pub fn append_one(&self, module: &ModuleRecord) -> bool {
        if !module.has_resources() || module.is_resources_merged() {
            return false;
        }

        let set = {
            let _guard = self.write_lock.lock();
            if !self.is_published() {
                debug!(bundle = %module.name(), "Deferring resource merge until set-up");
                return false;
            }
            if !module.mark_resources_merged() {
                return false;
            }
            let set = Arc::new(self.current.load().appended(module.source_path()));
            self.current.store(Arc::clone(&set));
            self.host.publish_resource_paths(&set, true);
            set
        };

        info!(bundle = %module.name(), paths = set.len(), "Appended bundle resources");
        self.host.request_recreate();
        true
    }
}
