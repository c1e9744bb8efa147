//! Bundle activation
//!
//! Activation resolves a bundle's entry point on the calling context and
//! schedules its creation and `on_create` on the primary context. The
//! caller only waits for the callback to be scheduled, never for it to run.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::module::record::ModuleRecord;
use crate::module::traits::{
    BundleError, EntryPointFactory, HostContext, HostEnvironment, ModuleContext, Scheduler, Symbol,
};

/// Dispatches entry-point callbacks onto the primary context
pub struct LifecycleDispatcher {
    base: HostContext,
    scheduler: Arc<dyn Scheduler>,
    host: Arc<dyn HostEnvironment>,
}

impl LifecycleDispatcher {
    pub fn new(base: HostContext, scheduler: Arc<dyn Scheduler>, host: Arc<dyn HostEnvironment>) -> Self {
        Self {
            base,
            scheduler,
            host,
        }
    }

    pub fn base_context(&self) -> &HostContext {
        &self.base
    }

    /// Activate `module`, resolving its entry point through `resolve`
    ///
    /// Returns `Ok(true)` when a callback was scheduled and `Ok(false)` when
    /// the bundle declares no entry point or was already activated. An entry
    /// point that fails to resolve consumes the bundle's single activation
    /// attempt.
    pub fn activate(
        &self,
        module: &ModuleRecord,
        resolve: &dyn Fn(&str) -> Result<Symbol, BundleError>,
    ) -> Result<bool, BundleError> {
        let Some(entry_point) = module.entry_point() else {
            return Ok(false);
        };
        if !module.begin_activation() {
            debug!(bundle = %module.name(), "Already activated");
            return Ok(false);
        }

        let resolution_error = |source: BundleError| BundleError::EntryPointResolution {
            module: module.name().to_string(),
            entry_point: entry_point.to_string(),
            source: Box::new(source),
        };
        let symbol = resolve(entry_point).map_err(resolution_error)?;
        let factory = symbol
            .entry_point()
            .cloned()
            .ok_or_else(|| resolution_error(BundleError::NotAnEntryPoint(entry_point.to_string())))?;

        let context = self.module_context(module);
        let host = Arc::clone(&self.host);
        let name = module.name().to_string();
        self.scheduler
            .post_primary(Box::new(move || run_entry_point(&name, factory, context, host)));

        debug!(bundle = %module.name(), entry_point, "Scheduled entry point");
        Ok(true)
    }

    /// Context for `module` derived from the host context
    pub fn module_context(&self, module: &ModuleRecord) -> ModuleContext {
        ModuleContext {
            module_id: format!("{}_{}", module.name(), uuid::Uuid::new_v4()),
            name: module.name().to_string(),
            source_path: module.source_path().to_path_buf(),
            extracted_path: module.extracted_path().to_path_buf(),
            data_dir: self.base.data_dir.join(module.name()),
            native_library_path: module.native_library_path().map(|p| p.to_path_buf()),
            properties: self.base.properties.clone(),
        }
    }
}

/// Runs on the primary context; failures stop here
fn run_entry_point(
    name: &str,
    factory: EntryPointFactory,
    context: ModuleContext,
    host: Arc<dyn HostEnvironment>,
) {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        let mut entry_point = factory(&context)?;
        entry_point.on_create(&context)?;
        Ok::<_, BundleError>(entry_point)
    }));

    match outcome {
        Ok(Ok(entry_point)) => {
            info!(bundle = %name, "Entry point created");
            host.adopt_entry_point(name, entry_point);
        }
        Ok(Err(e)) => {
            let e = BundleError::Callback {
                module: name.to_string(),
                reason: e.to_string(),
            };
            error!("{}", e);
        }
        Err(payload) => {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "panic".to_string());
            let e = BundleError::Callback {
                module: name.to_string(),
                reason,
            };
            error!("{}", e);
        }
    }
}
