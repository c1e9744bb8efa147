//! Bundle system
//!
//! Loads independently packaged bundles into the host, eagerly or on first
//! use.
//!
//! ## Architecture
//!
//! - **Records**: one [`ModuleRecord`] per registered bundle; its artifact
//!   is loaded at most once
//! - **Resolution chain**: loaded bundles first, then on-demand loading of
//!   bundles whose name prefixes the requested symbol
//! - **Resources**: the merged path set is republished by snapshot swap
//! - **Lifecycle**: entry points run on the primary context, exactly once
//! - **Scheduling**: background and primary work go through an injected
//!   [`Scheduler`]

pub mod traits;
pub mod record;
pub mod resources;
pub mod resolver;
pub mod lifecycle;
pub mod manager;
pub mod loader;
pub mod registry;
pub mod scheduler;

pub use traits::{
    Artifact, ArtifactLoader, BundleError, EntryPoint, EntryPointFactory, HostContext,
    HostEnvironment, ModuleContext, ModuleDescriptor, Scheduler, Symbol, Task,
};
pub use record::ModuleRecord;
pub use resources::{merge_initial, MergedPathSet, ResourcePathMerger};
pub use resolver::SymbolResolver;
pub use lifecycle::LifecycleDispatcher;
pub use manager::{ModuleRegistry, SetUpReport};
pub use loader::{EntryPointCatalog, SymbolTableLoader};
pub use registry::{BundleDiscovery, BundleManifest, DiscoveredBundle};
pub use scheduler::{InlineScheduler, PrimaryLoop, TokioScheduler};
