//! Bundle Loader - dynamic bundle loading core
//!
//! This crate manages a set of independently packaged bundles inside a host
//! process. Some bundles are active immediately; others are loaded the first
//! time one of their symbols is requested.
//!
//! ## Design Principles
//!
//! 1. **Loaded First**: symbol resolution never performs I/O for a bundle
//!    that is already loaded
//! 2. **Load Once**: a bundle's artifact is opened at most once, however
//!    many threads ask for it
//! 3. **Snapshot Publishing**: the merged resource path set is replaced, not
//!    mutated
//! 4. **Primary-Context Callbacks**: entry points run on the host's primary
//!    context, never on the loading thread
//! 5. **Explicit Collaborators**: host context, artifact loader, host
//!    notifications and scheduler are all injected

pub mod config;
pub mod module;
pub mod utils;

// Re-export config module
pub use config::*;

pub use module::{
    BundleError, HostContext, HostEnvironment, ModuleDescriptor, ModuleRegistry, Scheduler,
    SetUpReport, Symbol,
};

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, BundleError>;
