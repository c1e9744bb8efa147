//! Symbol table artifact loader
//!
//! A bundle's extracted directory carries a `symbols.toml` listing every
//! symbol the bundle exports:
//!
//! ```toml
//! symbols = ["com.example.app.MainEntry", "com.example.app.Widget"]
//! ```
//!
//! Entry points cannot be expressed in a data file, so their factories are
//! registered with the host's [`EntryPointCatalog`] and bound to the symbol
//! when an artifact exporting it is loaded.

use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::module::traits::{Artifact, ArtifactLoader, BundleError, EntryPointFactory, Symbol};

/// Symbol table file name inside a bundle's extracted directory
pub const SYMBOL_TABLE_FILE: &str = "symbols.toml";

#[derive(Debug, Deserialize)]
struct SymbolTableFile {
    #[serde(default)]
    symbols: Vec<String>,
}

/// Entry-point factories known to the host, by symbol name
#[derive(Default, Clone)]
pub struct EntryPointCatalog {
    factories: HashMap<String, EntryPointFactory>,
}

impl EntryPointCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the factory for `symbol`, replacing any previous one
    pub fn register(&mut self, symbol: impl Into<String>, factory: EntryPointFactory) -> &mut Self {
        self.factories.insert(symbol.into(), factory);
        self
    }

    pub fn get(&self, symbol: &str) -> Option<&EntryPointFactory> {
        self.factories.get(symbol)
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

/// Artifact backed by a parsed symbol table
pub struct SymbolTableArtifact {
    module: String,
    symbols: HashSet<String>,
    catalog: Arc<EntryPointCatalog>,
}

impl SymbolTableArtifact {
    pub fn new(
        module: impl Into<String>,
        symbols: impl IntoIterator<Item = String>,
        catalog: Arc<EntryPointCatalog>,
    ) -> Self {
        Self {
            module: module.into(),
            symbols: symbols.into_iter().collect(),
            catalog,
        }
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

impl Artifact for SymbolTableArtifact {
    fn resolve_symbol(&self, name: &str) -> Option<Symbol> {
        if !self.symbols.contains(name) {
            return None;
        }
        let symbol = Symbol::new(name, self.module.as_str());
        Some(match self.catalog.get(name) {
            Some(factory) => symbol.with_entry_point(Arc::clone(factory)),
            None => symbol,
        })
    }
}

/// Loads [`SymbolTableArtifact`]s from extracted bundle directories
#[derive(Default, Clone)]
pub struct SymbolTableLoader {
    catalog: Arc<EntryPointCatalog>,
}

impl SymbolTableLoader {
    pub fn new(catalog: EntryPointCatalog) -> Self {
        Self {
            catalog: Arc::new(catalog),
        }
    }

    /// Parse a symbol table file's contents
    pub fn parse_symbols(contents: &str) -> Result<Vec<String>, BundleError> {
        let table: SymbolTableFile = toml::from_str(contents)?;
        Ok(table.symbols)
    }
}

impl ArtifactLoader for SymbolTableLoader {
    fn load(&self, module: &str, extracted_path: &Path) -> Result<Arc<dyn Artifact>, BundleError> {
        let path = extracted_path.join(SYMBOL_TABLE_FILE);
        let load_error = |reason: String| BundleError::ArtifactLoad {
            module: module.to_string(),
            path: path.clone(),
            reason,
        };

        let contents = std::fs::read_to_string(&path).map_err(|e| load_error(e.to_string()))?;
        let symbols = Self::parse_symbols(&contents).map_err(|e| load_error(e.to_string()))?;
        debug!(bundle = module, count = symbols.len(), "Parsed symbol table");

        let artifact = SymbolTableArtifact::new(module, symbols, Arc::clone(&self.catalog));
        info!(bundle = module, symbols = artifact.len(), "Loaded artifact");
        Ok(Arc::new(artifact))
    }
}
