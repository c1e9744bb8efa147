//! Inspect a bundle directory
//!
//! Discovers bundles, registers them, runs set-up, then resolves the
//! requested symbols and native libraries and prints the merged resource
//! path set.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use bundle_loader::module::{
    BundleDiscovery, EntryPoint, HostEnvironment, MergedPathSet, ModuleRegistry, SymbolTableLoader,
    TokioScheduler,
};
use bundle_loader::utils::init_logging_from_config;
use bundle_loader::LoaderConfig;

#[derive(Debug, Parser)]
#[command(name = "bundle-inspect", about = "Register bundles and resolve symbols against them")]
struct Args {
    /// Loader configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bundles directory (overrides the configuration)
    #[arg(short, long)]
    bundles_dir: Option<PathBuf>,

    /// Symbols to resolve after set-up
    #[arg(short, long = "resolve")]
    symbols: Vec<String>,

    /// Native libraries to look up after set-up
    #[arg(short, long = "library")]
    libraries: Vec<String>,
}

/// Host that reports notifications on stdout
struct ConsoleHost;

impl HostEnvironment for ConsoleHost {
    fn publish_resource_paths(&self, paths: &MergedPathSet, incremental: bool) {
        info!(incremental, "Resource paths published ({} entries)", paths.len());
    }

    fn request_recreate(&self) {
        info!("Host asked to recreate resource-dependent state");
    }

    fn adopt_entry_point(&self, module: &str, _entry_point: Box<dyn EntryPoint>) {
        println!("activated  {}", module);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => LoaderConfig::from_file(path)
            .with_context(|| format!("loading configuration from {:?}", path))?,
        None => LoaderConfig::default(),
    };
    if let Some(dir) = args.bundles_dir {
        config.bundles_dir = dir;
    }
    init_logging_from_config(Some(&config.logging));

    let (scheduler, primary) = TokioScheduler::current();
    let primary_task = tokio::spawn(primary.run());

    let registry = ModuleRegistry::new(
        config.host_context(),
        Arc::new(SymbolTableLoader::default()),
        Arc::new(ConsoleHost),
        Arc::new(scheduler),
    );

    let bundles = BundleDiscovery::new(&config.bundles_dir).discover_bundles(&config.bundle_order)?;
    for bundle in &bundles {
        let descriptor = bundle.descriptor(config.is_forced_lazy(&bundle.manifest.name));
        if let Err(e) = registry.add_module(descriptor) {
            warn!("Skipping bundle in {:?}: {}", bundle.directory, e);
        }
    }

    let report = registry.set_up()?;
    for (module, error) in &report.failed {
        println!("failed     {}: {}", module, error);
    }

    for symbol in &args.symbols {
        let lookup = registry.clone();
        let name = symbol.clone();
        // Resolution may block on artifact I/O
        match tokio::task::spawn_blocking(move || lookup.resolve(&name)).await? {
            Ok(found) => println!("symbol     {} -> {}", found.name(), found.module()),
            Err(e) => println!("symbol     {} -> {}", symbol, e),
        }
    }

    for library in &args.libraries {
        match registry.find_library(library) {
            Some(path) => println!("library    {} -> {}", library, path.display()),
            None => println!("library    {} -> not found", library),
        }
    }

    for (index, path) in registry.merged_paths().paths().iter().enumerate() {
        println!("resource   [{}] {}", index, path.display());
    }

    // Let already-scheduled entry points finish before exiting
    drop(registry);
    tokio::time::timeout(std::time::Duration::from_secs(1), primary_task)
        .await
        .ok();
    Ok(())
}
