//! Per-bundle state record
//!
//! A [`ModuleRecord`] is created at registration and lives as long as the
//! registry. Only the artifact slot and the merged/activated flags change
//! after construction.

use parking_lot::Mutex;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::debug;

use crate::module::traits::{Artifact, ArtifactLoader, BundleError, ModuleDescriptor};

/// Outcome of a locked load
pub struct LoadOutcome {
    pub artifact: Arc<dyn Artifact>,
    /// True only for the caller that actually performed the load
    pub first_load: bool,
}

/// Registered bundle
pub struct ModuleRecord {
    name: String,
    source_path: PathBuf,
    extracted_path: PathBuf,
    has_resources: bool,
    entry_point: Option<String>,
    native_library_path: Option<PathBuf>,
    lazy: bool,
    /// Registered after set-up; its first load merges and activates it
    late: bool,
    /// Set at most once
    artifact: OnceLock<Arc<dyn Artifact>>,
    /// Mirrors `artifact.is_some()` with sequentially consistent ordering
    loaded: AtomicBool,
    load_guard: Mutex<()>,
    resources_merged: AtomicBool,
    activated: AtomicBool,
}

impl ModuleRecord {
    pub fn from_descriptor(descriptor: ModuleDescriptor) -> Self {
        Self {
            name: descriptor.name,
            source_path: descriptor.source_path,
            extracted_path: descriptor.extracted_path,
            has_resources: descriptor.has_resources,
            entry_point: descriptor.entry_point,
            native_library_path: descriptor.native_library_path,
            lazy: descriptor.lazy,
            late: false,
            artifact: OnceLock::new(),
            loaded: AtomicBool::new(false),
            load_guard: Mutex::new(()),
            resources_merged: AtomicBool::new(false),
            activated: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn extracted_path(&self) -> &Path {
        &self.extracted_path
    }

    pub fn has_resources(&self) -> bool {
        self.has_resources
    }

    pub fn entry_point(&self) -> Option<&str> {
        self.entry_point.as_deref()
    }

    pub fn native_library_path(&self) -> Option<&Path> {
        self.native_library_path.as_deref()
    }

    pub fn is_lazy(&self) -> bool {
        self.lazy
    }

    /// Mark as registered after set-up; only valid before the record is shared
    pub(crate) fn registered_late(mut self) -> Self {
        self.late = true;
        self
    }

    pub fn is_registered_late(&self) -> bool {
        self.late
    }

    /// Whether the first load must merge resources and activate the bundle
    ///
    /// Non-lazy bundles registered before set-up are handled by set-up itself.
    pub fn activates_on_first_load(&self) -> bool {
        self.lazy || self.late
    }

    /// Loaded artifact, if any
    pub fn artifact(&self) -> Option<&Arc<dyn Artifact>> {
        self.artifact.get()
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::SeqCst)
    }

    /// Whether the symbol name plausibly belongs to this bundle
    ///
    /// Plain prefix match on the bundle name. Bundles compiled from several
    /// packages, or whose names prefix one another, can be misattributed.
    pub fn claims(&self, symbol: &str) -> bool {
        symbol.starts_with(&self.name)
    }

    /// Load the artifact unless already loaded
    ///
    /// Double-checked: the unlocked fast path returns an existing artifact
    /// without touching the guard; the slow path re-checks under the guard so
    /// concurrent callers trigger exactly one `loader.load`.
    pub fn load_locked(&self, loader: &dyn ArtifactLoader) -> Result<LoadOutcome, BundleError> {
        if let Some(artifact) = self.artifact.get() {
            return Ok(LoadOutcome {
                artifact: Arc::clone(artifact),
                first_load: false,
            });
        }

        let _guard = self.load_guard.lock();
        if let Some(artifact) = self.artifact.get() {
            return Ok(LoadOutcome {
                artifact: Arc::clone(artifact),
                first_load: false,
            });
        }

        debug!(bundle = %self.name, path = ?self.extracted_path, "Loading artifact");
        let artifact = loader.load(&self.name, &self.extracted_path)?;
        let artifact = Arc::clone(self.artifact.get_or_init(|| artifact));
        self.loaded.store(true, Ordering::SeqCst);

        Ok(LoadOutcome {
            artifact,
            first_load: true,
        })
    }

    pub fn is_resources_merged(&self) -> bool {
        self.resources_merged.load(Ordering::SeqCst)
    }

    /// Mark resources merged; returns false when they already were
    pub(crate) fn mark_resources_merged(&self) -> bool {
        !self.resources_merged.swap(true, Ordering::SeqCst)
    }

    pub fn is_activated(&self) -> bool {
        self.activated.load(Ordering::SeqCst)
    }

    /// Claim the single activation attempt; returns false when already claimed
    pub(crate) fn begin_activation(&self) -> bool {
        !self.activated.swap(true, Ordering::SeqCst)
    }
}

impl fmt::Debug for ModuleRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleRecord")
            .field("name", &self.name)
            .field("source_path", &self.source_path)
            .field("lazy", &self.lazy)
            .field("late", &self.late)
            .field("has_resources", &self.has_resources)
            .field("loaded", &self.is_loaded())
            .field("resources_merged", &self.is_resources_merged())
            .finish()
    }
}
