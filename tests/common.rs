//! Shared fixtures for bundle loader integration tests
//!
//! Builds on-disk bundle layouts in a temporary directory and wires a
//! registry to instrumented collaborators.

#![allow(dead_code)]

use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use bundle_loader::module::loader::{map_library_name, SYMBOL_TABLE_FILE};
use bundle_loader::module::registry::MANIFEST_TOML;
use bundle_loader::module::{
    Artifact, ArtifactLoader, BundleError, BundleManifest, EntryPoint, EntryPointCatalog,
    EntryPointFactory, HostContext, HostEnvironment, MergedPathSet, ModuleContext,
    ModuleDescriptor, ModuleRegistry, Scheduler, SymbolTableLoader, Task,
};

/// One bundle to lay out on disk
#[derive(Debug, Clone)]
pub struct BundleSpec {
    pub name: String,
    pub lazy: bool,
    pub has_resources: bool,
    pub entry_point: Option<String>,
    pub failing_entry_point: bool,
    pub symbols: Vec<String>,
    pub libraries: Vec<String>,
}

impl BundleSpec {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            lazy: false,
            has_resources: true,
            entry_point: None,
            failing_entry_point: false,
            symbols: Vec::new(),
            libraries: Vec::new(),
        }
    }

    pub fn lazy(mut self) -> Self {
        self.lazy = true;
        self
    }

    pub fn without_resources(mut self) -> Self {
        self.has_resources = false;
        self
    }

    /// Declare `<name>.<simple>` as entry point and export it
    pub fn with_entry_point(mut self, simple: &str) -> Self {
        let symbol = format!("{}.{}", self.name, simple);
        self.symbols.push(symbol.clone());
        self.entry_point = Some(symbol);
        self
    }

    /// Declare an entry point whose `on_create` fails
    pub fn with_failing_entry_point(mut self, simple: &str) -> Self {
        self.failing_entry_point = true;
        self.with_entry_point(simple)
    }

    /// Declare an entry point the bundle does not export
    pub fn with_missing_entry_point(mut self, simple: &str) -> Self {
        self.entry_point = Some(format!("{}.{}", self.name, simple));
        self
    }

    pub fn with_symbols(mut self, simple_names: &[&str]) -> Self {
        for simple in simple_names {
            self.symbols.push(format!("{}.{}", self.name, simple));
        }
        self
    }

    pub fn with_library(mut self, library: &str) -> Self {
        self.libraries.push(library.to_string());
        self
    }
}

/// Host recording every notification
#[derive(Default)]
pub struct RecordingHost {
    pub publishes: Mutex<Vec<(Vec<PathBuf>, bool)>>,
    pub recreates: AtomicUsize,
    pub adopted: Mutex<Vec<String>>,
}

impl HostEnvironment for RecordingHost {
    fn publish_resource_paths(&self, paths: &MergedPathSet, incremental: bool) {
        self.publishes.lock().push((paths.paths().to_vec(), incremental));
    }

    fn request_recreate(&self) {
        self.recreates.fetch_add(1, Ordering::SeqCst);
    }

    fn adopt_entry_point(&self, module: &str, _entry_point: Box<dyn EntryPoint>) {
        self.adopted.lock().push(module.to_string());
    }
}

impl RecordingHost {
    pub fn recreates(&self) -> usize {
        self.recreates.load(Ordering::SeqCst)
    }
}

/// Symbol table loader counting loads per bundle, optionally slowed down
pub struct CountingLoader {
    inner: SymbolTableLoader,
    delay: Duration,
    loads: Mutex<HashMap<String, usize>>,
    /// Remaining forced failures per bundle
    failures: Mutex<HashMap<String, usize>>,
}

impl CountingLoader {
    /// Make the next `count` loads of `module` fail
    pub fn fail_next_loads(&self, module: &str, count: usize) {
        self.failures.lock().insert(module.to_string(), count);
    }

    pub fn loads_of(&self, module: &str) -> usize {
        self.loads.lock().get(module).copied().unwrap_or(0)
    }

    pub fn total_loads(&self) -> usize {
        self.loads.lock().values().sum()
    }
}

impl ArtifactLoader for CountingLoader {
    fn load(&self, module: &str, extracted_path: &Path) -> Result<Arc<dyn Artifact>, BundleError> {
        *self.loads.lock().entry(module.to_string()).or_default() += 1;
        if let Some(remaining) = self.failures.lock().get_mut(module).filter(|n| **n > 0) {
            *remaining -= 1;
            return Err(BundleError::ArtifactLoad {
                module: module.to_string(),
                path: extracted_path.to_path_buf(),
                reason: "artifact unavailable".to_string(),
            });
        }
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        self.inner.load(module, extracted_path)
    }
}

/// Scheduler queuing primary work, with background work either inline or queued
pub struct TestScheduler {
    inline_background: bool,
    background: Mutex<VecDeque<(String, Task)>>,
    primary: Mutex<VecDeque<Task>>,
    background_names: Mutex<Vec<String>>,
}

impl TestScheduler {
    pub fn new(inline_background: bool) -> Self {
        Self {
            inline_background,
            background: Mutex::new(VecDeque::new()),
            primary: Mutex::new(VecDeque::new()),
            background_names: Mutex::new(Vec::new()),
        }
    }

    /// Run queued background tasks in order; returns how many ran
    pub fn run_background(&self) -> usize {
        let mut ran = 0;
        loop {
            let next = self.background.lock().pop_front();
            let Some((_, task)) = next else {
                return ran;
            };
            task();
            ran += 1;
        }
    }

    /// Run queued primary tasks in order; returns how many ran
    pub fn drain_primary(&self) -> usize {
        let mut ran = 0;
        loop {
            let next = self.primary.lock().pop_front();
            let Some(task) = next else {
                return ran;
            };
            task();
            ran += 1;
        }
    }

    pub fn pending_primary(&self) -> usize {
        self.primary.lock().len()
    }

    pub fn background_names(&self) -> Vec<String> {
        self.background_names.lock().clone()
    }
}

impl Scheduler for TestScheduler {
    fn post_primary(&self, task: Task) {
        self.primary.lock().push_back(task);
    }

    fn post_background(&self, name: &str, task: Task) {
        self.background_names.lock().push(name.to_string());
        if self.inline_background {
            task();
        } else {
            self.background.lock().push_back((name.to_string(), task));
        }
    }
}

/// Entry point logging its bundle name into a shared journal
struct JournalEntryPoint {
    journal: Arc<Mutex<Vec<String>>>,
    fail: bool,
}

impl EntryPoint for JournalEntryPoint {
    fn on_create(&mut self, context: &ModuleContext) -> Result<(), BundleError> {
        self.journal.lock().push(context.name.clone());
        if self.fail {
            return Err(BundleError::Callback {
                module: context.name.clone(),
                reason: "refusing to start".to_string(),
            });
        }
        Ok(())
    }
}

/// Registry wired to instrumented collaborators over an on-disk layout
pub struct BundleFixture {
    pub temp_dir: TempDir,
    pub host_path: PathBuf,
    pub descriptors: Vec<ModuleDescriptor>,
    pub host: Arc<RecordingHost>,
    pub loader: Arc<CountingLoader>,
    pub scheduler: Arc<TestScheduler>,
    pub registry: ModuleRegistry,
    /// Bundle names in the order their entry points ran
    pub journal: Arc<Mutex<Vec<String>>>,
}

impl BundleFixture {
    /// Background work runs inline
    pub fn new(specs: Vec<BundleSpec>) -> Self {
        Self::build(specs, true, Duration::ZERO)
    }

    /// Background work waits for [`TestScheduler::run_background`]; loads sleep `delay`
    pub fn deferred(specs: Vec<BundleSpec>, delay: Duration) -> Self {
        Self::build(specs, false, delay)
    }

    fn build(specs: Vec<BundleSpec>, inline_background: bool, delay: Duration) -> Self {
        let temp_dir = TempDir::new().expect("temp dir");
        let bundles_dir = temp_dir.path().join("bundles");
        let host_path = temp_dir.path().join("host.apk");
        let journal = Arc::new(Mutex::new(Vec::new()));

        let mut catalog = EntryPointCatalog::new();
        let mut descriptors = Vec::new();
        for spec in &specs {
            let dir = write_bundle(&bundles_dir, spec).expect("write bundle");
            let manifest = BundleManifest::from_file(dir.join(MANIFEST_TOML)).expect("manifest");
            descriptors.push(manifest.to_descriptor(&dir));

            if let Some(entry_point) = &spec.entry_point {
                catalog.register(entry_point.clone(), journal_factory(&journal, spec.failing_entry_point));
            }
        }

        let host = Arc::new(RecordingHost::default());
        let loader = Arc::new(CountingLoader {
            inner: SymbolTableLoader::new(catalog),
            delay,
            loads: Mutex::new(HashMap::new()),
            failures: Mutex::new(HashMap::new()),
        });
        let scheduler = Arc::new(TestScheduler::new(inline_background));
        let registry = ModuleRegistry::new(
            HostContext::new(&host_path, temp_dir.path().join("data")),
            loader.clone(),
            host.clone(),
            scheduler.clone(),
        );

        Self {
            temp_dir,
            host_path,
            descriptors,
            host,
            loader,
            scheduler,
            registry,
            journal,
        }
    }

    /// Register every bundle in spec order
    pub fn register_all(&self) {
        for descriptor in &self.descriptors {
            self.registry
                .add_module(descriptor.clone())
                .expect("register bundle");
        }
    }

    pub fn descriptor(&self, name: &str) -> &ModuleDescriptor {
        self.descriptors
            .iter()
            .find(|d| d.name == name)
            .expect("known bundle")
    }

    pub fn source_path(&self, name: &str) -> PathBuf {
        self.descriptor(name).source_path.clone()
    }

    pub fn bundles_dir(&self) -> PathBuf {
        self.temp_dir.path().join("bundles")
    }

    pub fn journal(&self) -> Vec<String> {
        self.journal.lock().clone()
    }
}

pub fn journal_factory(journal: &Arc<Mutex<Vec<String>>>, fail: bool) -> EntryPointFactory {
    let journal = Arc::clone(journal);
    Arc::new(move |_context: &ModuleContext| -> Result<Box<dyn EntryPoint>, BundleError> {
        Ok(Box::new(JournalEntryPoint {
            journal: Arc::clone(&journal),
            fail,
        }))
    })
}

/// Lay out `spec` under `bundles_dir`; returns the bundle directory
pub fn write_bundle(bundles_dir: &Path, spec: &BundleSpec) -> std::io::Result<PathBuf> {
    let dir = bundles_dir.join(&spec.name);
    std::fs::create_dir_all(&dir)?;

    let manifest = BundleManifest {
        name: spec.name.clone(),
        lazy: spec.lazy,
        entry_point: spec.entry_point.clone(),
        has_resources: spec.has_resources,
        library_dir: (!spec.libraries.is_empty()).then(|| "lib".to_string()),
        source: None,
    };
    let manifest = toml::to_string_pretty(&manifest).map_err(std::io::Error::other)?;
    std::fs::write(dir.join(MANIFEST_TOML), manifest)?;

    let symbols = spec
        .symbols
        .iter()
        .map(|s| format!("{:?}", s))
        .collect::<Vec<_>>()
        .join(", ");
    std::fs::write(dir.join(SYMBOL_TABLE_FILE), format!("symbols = [{}]\n", symbols))?;

    if !spec.libraries.is_empty() {
        let lib_dir = dir.join("lib");
        std::fs::create_dir_all(&lib_dir)?;
        for library in &spec.libraries {
            std::fs::write(lib_dir.join(map_library_name(library)), b"\x7fELF")?;
        }
    }

    Ok(dir)
}
