//! Bundle manifests and discovery
//!
//! Reads bundle manifests from disk and turns them into
//! [`ModuleDescriptor`](crate::module::traits::ModuleDescriptor)s in
//! registration order.

pub mod discovery;
pub mod manifest;

pub use discovery::{BundleDiscovery, DiscoveredBundle};
pub use manifest::{BundleManifest, MANIFEST_JSON, MANIFEST_TOML};
