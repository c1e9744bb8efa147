//! Module registry orchestrating every bundle
//!
//! Owns the bundle records, the merged resource path set and the lifecycle
//! dispatcher, and exposes the contract the host drives: register bundles,
//! set up once, then resolve symbols and native libraries on demand.

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::module::lifecycle::LifecycleDispatcher;
use crate::module::loader::find_native_library;
use crate::module::record::ModuleRecord;
use crate::module::resolver::SymbolResolver;
use crate::module::resources::{MergedPathSet, ResourcePathMerger};
use crate::module::traits::{
    ArtifactLoader, BundleError, HostContext, HostEnvironment, ModuleDescriptor, Scheduler, Symbol,
};

/// Background task name for the lazy bundle warm-up
const PRELOAD_TASK: &str = "bundle-preload";

/// Outcome of [`ModuleRegistry::set_up`]
#[derive(Debug, Default)]
pub struct SetUpReport {
    /// Bundles whose entry point was scheduled, in scheduling order
    pub scheduled: Vec<String>,
    /// Bundles whose entry point could not be resolved
    pub failed: Vec<(String, BundleError)>,
}

/// Registry of bundles
///
/// Cheap to share: clones refer to the same registry.
#[derive(Clone)]
pub struct ModuleRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    /// Registration order; append-only, republished whole on each add
    modules: ArcSwap<Vec<Arc<ModuleRecord>>>,
    /// Serializes registrations
    register_lock: Mutex<()>,
    resolver: SymbolResolver,
    merger: ResourcePathMerger,
    dispatcher: LifecycleDispatcher,
    scheduler: Arc<dyn Scheduler>,
    set_up: AtomicBool,
    /// Set once non-lazy bundles have been dispatched; lazy bundles loaded
    /// before then are activated by `set_up` afterwards
    lifecycle_open: AtomicBool,
}

impl ModuleRegistry {
    /// Create a registry for the host described by `context`
    pub fn new(
        context: HostContext,
        loader: Arc<dyn ArtifactLoader>,
        host: Arc<dyn HostEnvironment>,
        scheduler: Arc<dyn Scheduler>,
    ) -> Self {
        let merger = ResourcePathMerger::new(&context.resource_path, Arc::clone(&host));
        let dispatcher = LifecycleDispatcher::new(context, Arc::clone(&scheduler), host);

        Self {
            inner: Arc::new(RegistryInner {
                modules: ArcSwap::from_pointee(Vec::new()),
                register_lock: Mutex::new(()),
                resolver: SymbolResolver::new(loader),
                merger,
                dispatcher,
                scheduler,
                set_up: AtomicBool::new(false),
                lifecycle_open: AtomicBool::new(false),
            }),
        }
    }

    /// Register a bundle
    ///
    /// Non-lazy bundles are queued for loading on a background task right
    /// away. Registration is expected to happen from one thread before
    /// [`ModuleRegistry::set_up`]. A bundle registered after set-up is merged
    /// and activated by its first successful load, whichever path performs
    /// it.
    pub fn add_module(&self, descriptor: ModuleDescriptor) -> Result<(), BundleError> {
        let record = {
            let _guard = self.inner.register_lock.lock();
            let current = self.inner.modules.load();
            if current.iter().any(|m| m.name() == descriptor.name) {
                return Err(BundleError::DuplicateModule(descriptor.name));
            }

            let mut record = ModuleRecord::from_descriptor(descriptor);
            if self.is_set_up() {
                warn!(bundle = %record.name(), "Bundle registered after set-up");
                record = record.registered_late();
            }
            let record = Arc::new(record);

            let mut next = Vec::with_capacity(current.len() + 1);
            next.extend(current.iter().cloned());
            next.push(Arc::clone(&record));
            self.inner.modules.store(Arc::new(next));
            record
        };

        info!(bundle = %record.name(), lazy = record.is_lazy(), "Registered bundle");

        if record.is_lazy() {
            return Ok(());
        }

        let inner = Arc::clone(&self.inner);
        self.inner.scheduler.post_background(
            &format!("bundle-load:{}", record.name()),
            Box::new(move || inner.preload(&record)),
        );
        Ok(())
    }

    /// One-time finalization after the initial bundles are registered
    ///
    /// Publishes the merged resource path set, schedules entry points of
    /// non-lazy bundles in registration order, and queues lazy bundles for
    /// background loading. An entry point that fails to resolve is reported
    /// in the returned [`SetUpReport`] without affecting other bundles.
    pub fn set_up(&self) -> Result<SetUpReport, BundleError> {
        if self.inner.set_up.swap(true, Ordering::SeqCst) {
            return Err(BundleError::AlreadySetUp);
        }

        let modules = self.inner.snapshot();
        let host_path = self.inner.dispatcher.base_context().resource_path.clone();
        self.inner.merger.publish_initial(&host_path, &modules);

        let mut report = SetUpReport::default();
        for module in modules.iter().filter(|m| !m.is_lazy()) {
            self.inner.activate_into(module, &mut report);
        }

        self.inner.lifecycle_open.store(true, Ordering::SeqCst);
        for module in modules.iter().filter(|m| m.is_lazy() && m.is_loaded()) {
            self.inner.activate_into(module, &mut report);
        }

        let lazy: Vec<_> = modules.iter().filter(|m| m.is_lazy()).cloned().collect();
        if !lazy.is_empty() {
            debug!("Queueing {} lazy bundles for preload", lazy.len());
            let inner = Arc::clone(&self.inner);
            self.inner.scheduler.post_background(
                PRELOAD_TASK,
                Box::new(move || {
                    for module in &lazy {
                        inner.preload(module);
                    }
                }),
            );
        }

        info!(
            scheduled = report.scheduled.len(),
            failed = report.failed.len(),
            "Registry set up"
        );
        Ok(report)
    }

    /// Resolve a fully-qualified symbol, loading its bundle if needed
    ///
    /// May block while a bundle artifact is opened.
    pub fn resolve(&self, symbol: &str) -> Result<Symbol, BundleError> {
        self.inner.resolve(symbol)
    }

    /// Path of a native library provided by a bundle
    pub fn find_library(&self, library_name: &str) -> Option<PathBuf> {
        find_native_library(&self.inner.snapshot(), library_name)
    }

    pub fn is_empty(&self) -> bool {
        self.inner.modules.load().is_empty()
    }

    pub fn len(&self) -> usize {
        self.inner.modules.load().len()
    }

    pub fn has_module(&self, name: &str) -> bool {
        self.inner.modules.load().iter().any(|m| m.name() == name)
    }

    /// Bundle names in registration order
    pub fn module_names(&self) -> Vec<String> {
        self.inner
            .modules
            .load()
            .iter()
            .map(|m| m.name().to_string())
            .collect()
    }

    /// Whether the named bundle's artifact is loaded
    pub fn is_loaded(&self, name: &str) -> bool {
        self.inner
            .modules
            .load()
            .iter()
            .any(|m| m.name() == name && m.is_loaded())
    }

    /// Current merged resource path snapshot
    pub fn merged_paths(&self) -> Arc<MergedPathSet> {
        self.inner.merger.current()
    }

    pub fn is_set_up(&self) -> bool {
        self.inner.set_up.load(Ordering::SeqCst)
    }

    pub fn host_context(&self) -> &HostContext {
        self.inner.dispatcher.base_context()
    }
}

impl RegistryInner {
    /// Records as of now; later registrations do not affect it
    fn snapshot(&self) -> Arc<Vec<Arc<ModuleRecord>>> {
        self.modules.load_full()
    }

    fn resolve(&self, symbol: &str) -> Result<Symbol, BundleError> {
        let modules = self.snapshot();
        self.resolver
            .resolve(&modules, symbol, &|module| self.on_first_load(module))
    }

    fn preload(&self, module: &Arc<ModuleRecord>) {
        self.resolver
            .preload(module, &|loaded| self.on_first_load(loaded));
    }

    /// First load of a lazy or late-registered bundle: merge its
    /// resources, then activate it
    fn on_first_load(&self, module: &Arc<ModuleRecord>) {
        self.merger.append_one(module);
        if self.lifecycle_open.load(Ordering::SeqCst) {
            if let Err(e) = self.activate(module) {
                error!(bundle = %module.name(), "Activation failed: {}", e);
            }
        } else {
            debug!(bundle = %module.name(), "Activation deferred until set-up");
        }
    }

    fn activate(&self, module: &ModuleRecord) -> Result<bool, BundleError> {
        self.dispatcher.activate(module, &|name| self.resolve(name))
    }

    fn activate_into(&self, module: &ModuleRecord, report: &mut SetUpReport) {
        match self.activate(module) {
            Ok(true) => report.scheduled.push(module.name().to_string()),
            Ok(false) => {}
            Err(e) => {
                error!(bundle = %module.name(), "Activation failed: {}", e);
                report.failed.push((module.name().to_string(), e));
            }
        }
    }
}
