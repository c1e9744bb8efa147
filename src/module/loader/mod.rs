//! Bundle artifact loading
//!
//! Default [`ArtifactLoader`](crate::module::traits::ArtifactLoader)
//! implementation and native library lookup.

pub mod loader;
pub mod native;

pub use loader::{EntryPointCatalog, SymbolTableArtifact, SymbolTableLoader, SYMBOL_TABLE_FILE};
pub use native::{find_native_library, map_library_name};
