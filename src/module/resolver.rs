//! Symbol resolution chain
//!
//! Resolves a fully-qualified symbol name against registered bundles:
//!
//! 1. Every bundle whose artifact is already loaded, in registration order.
//!    Loaded bundles are authoritative and never cause I/O.
//! 2. Every bundle not yet loaded whose name prefixes the symbol. Such a
//!    bundle is loaded on the spot (blocking the caller) and, when lazy or
//!    registered after set-up, activated before the lookup continues.
//!
//! The ownership guess in step 2 is a plain prefix match. A bundle built
//! from several packages, or two bundles whose names prefix one another,
//! can be misattributed; callers relying on exact ownership should name
//! their bundles accordingly.

use std::sync::Arc;
use tracing::{debug, trace, warn};

use crate::module::record::ModuleRecord;
use crate::module::traits::{ArtifactLoader, BundleError, Symbol};

/// Resolution chain over an ordered set of bundle records
pub struct SymbolResolver {
    loader: Arc<dyn ArtifactLoader>,
}

impl SymbolResolver {
    pub fn new(loader: Arc<dyn ArtifactLoader>) -> Self {
        Self { loader }
    }

    /// Resolve `symbol` against `modules`
    ///
    /// `on_first_load` runs once for a bundle that
    /// [activates on first load](ModuleRecord::activates_on_first_load) when
    /// this call performed that load, after the load guard is released and
    /// before the new artifact is queried.
    pub fn resolve(
        &self,
        modules: &[Arc<ModuleRecord>],
        symbol: &str,
        on_first_load: &dyn Fn(&Arc<ModuleRecord>),
    ) -> Result<Symbol, BundleError> {
        for module in modules {
            let Some(artifact) = module.artifact() else {
                continue;
            };
            if let Some(found) = artifact.resolve_symbol(symbol) {
                trace!(symbol, bundle = %module.name(), "Resolved from loaded bundle");
                return Ok(found);
            }
        }

        let mut last_error = None;
        for module in modules {
            if module.is_loaded() || !module.claims(symbol) {
                continue;
            }

            debug!(symbol, bundle = %module.name(), "Loading bundle on demand");
            let outcome = match module.load_locked(self.loader.as_ref()) {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(bundle = %module.name(), "Bundle failed to load: {}", e);
                    last_error = Some(Box::new(e));
                    continue;
                }
            };

            if outcome.first_load && module.activates_on_first_load() {
                on_first_load(module);
            }

            if let Some(found) = outcome.artifact.resolve_symbol(symbol) {
                return Ok(found);
            }
        }

        Err(BundleError::SymbolNotFound {
            symbol: symbol.to_string(),
            source: last_error,
        })
    }

    /// Locked load outside of any lookup, as done by background loading
    ///
    /// Failures are logged and swallowed; a later on-demand resolution
    /// retries and reports them.
    pub fn preload(&self, module: &Arc<ModuleRecord>, on_first_load: &dyn Fn(&Arc<ModuleRecord>)) {
        match module.load_locked(self.loader.as_ref()) {
            Ok(outcome) => {
                if outcome.first_load && module.activates_on_first_load() {
                    on_first_load(module);
                }
            }
            Err(e) => warn!(bundle = %module.name(), "Background load failed: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::traits::{Artifact, ModuleDescriptor};
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct TableArtifact {
        module: String,
        symbols: Vec<String>,
    }

    impl Artifact for TableArtifact {
        fn resolve_symbol(&self, name: &str) -> Option<Symbol> {
            self.symbols
                .iter()
                .any(|s| s == name)
                .then(|| Symbol::new(name, self.module.as_str()))
        }
    }

    #[derive(Default)]
    struct TableLoader {
        tables: HashMap<String, Vec<String>>,
        loads: Mutex<HashMap<String, usize>>,
        total: AtomicUsize,
    }

    impl TableLoader {
        fn with(mut self, module: &str, symbols: &[&str]) -> Self {
            self.tables
                .insert(module.to_string(), symbols.iter().map(|s| s.to_string()).collect());
            self
        }

        fn loads_of(&self, module: &str) -> usize {
            self.loads.lock().get(module).copied().unwrap_or(0)
        }
    }

    impl ArtifactLoader for TableLoader {
        fn load(&self, module: &str, path: &Path) -> Result<Arc<dyn Artifact>, BundleError> {
            self.total.fetch_add(1, Ordering::SeqCst);
            *self.loads.lock().entry(module.to_string()).or_default() += 1;
            let symbols = self.tables.get(module).cloned().ok_or_else(|| BundleError::ArtifactLoad {
                module: module.to_string(),
                path: path.to_path_buf(),
                reason: "missing".to_string(),
            })?;
            Ok(Arc::new(TableArtifact {
                module: module.to_string(),
                symbols,
            }))
        }
    }

    fn record(name: &str, lazy: bool) -> Arc<ModuleRecord> {
        Arc::new(ModuleRecord::from_descriptor(
            ModuleDescriptor::new(name, format!("/{}.apk", name), format!("/ext/{}", name)).lazy(lazy),
        ))
    }

    fn noop(_: &Arc<ModuleRecord>) {}

    #[test]
    fn test_loaded_bundles_resolve_without_loading() {
        let loader = Arc::new(TableLoader::default().with("com.a", &["com.a.Foo"]));
        let resolver = SymbolResolver::new(loader.clone());
        let modules = vec![record("com.a", false)];

        for _ in 0..3 {
            let symbol = resolver.resolve(&modules, "com.a.Foo", &noop).unwrap();
            assert_eq!(symbol.module(), "com.a");
        }
        assert_eq!(loader.loads_of("com.a"), 1);
    }

    #[test]
    fn test_loaded_scan_precedes_trigger_scan() {
        // com.b is loaded and also exports a symbol under com.a's prefix
        let loader = Arc::new(
            TableLoader::default()
                .with("com.a", &["com.a.Foo"])
                .with("com.b", &["com.a.Foo"]),
        );
        let resolver = SymbolResolver::new(loader.clone());
        let modules = vec![record("com.a", true), record("com.b", false)];
        resolver.preload(&modules[1], &noop);

        let symbol = resolver.resolve(&modules, "com.a.Foo", &noop).unwrap();
        assert_eq!(symbol.module(), "com.b");
        assert_eq!(loader.loads_of("com.a"), 0);
    }

    #[test]
    fn test_lazy_callback_fires_once() {
        let loader = Arc::new(TableLoader::default().with("com.lazy", &["com.lazy.A", "com.lazy.B"]));
        let resolver = SymbolResolver::new(loader);
        let modules = vec![record("com.lazy", true)];
        let fired = AtomicUsize::new(0);
        let on_loaded = |_: &Arc<ModuleRecord>| {
            fired.fetch_add(1, Ordering::SeqCst);
        };

        resolver.resolve(&modules, "com.lazy.A", &on_loaded).unwrap();
        resolver.resolve(&modules, "com.lazy.B", &on_loaded).unwrap();

        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unowned_symbol_not_found() {
        let loader = Arc::new(TableLoader::default().with("com.a", &["com.a.Foo"]));
        let resolver = SymbolResolver::new(loader.clone());
        let modules = vec![record("com.a", true)];

        let err = resolver.resolve(&modules, "org.other.Thing", &noop).unwrap_err();
        assert!(matches!(err, BundleError::SymbolNotFound { source: None, .. }));
        assert_eq!(loader.total.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_load_failure_chained_and_scan_continues() {
        // "com.x" has no table so its load fails; "com.xy" also claims the symbol
        let loader = Arc::new(TableLoader::default().with("com.xy", &["com.xy.Z"]));
        let resolver = SymbolResolver::new(loader);
        let modules = vec![record("com.x", true), record("com.xy", true)];

        let symbol = resolver.resolve(&modules, "com.xy.Z", &noop).unwrap();
        assert_eq!(symbol.module(), "com.xy");

        let err = resolver.resolve(&modules, "com.x.Missing", &noop).unwrap_err();
        match err {
            BundleError::SymbolNotFound { source: Some(cause), .. } => {
                assert!(matches!(*cause, BundleError::ArtifactLoad { .. }));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
