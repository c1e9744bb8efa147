//! Bundle system traits and interfaces
//!
//! Defines the collaborator seams the loader core calls into (artifact
//! loading, scheduling, host notifications) and the error type shared by
//! every component.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use crate::module::resources::MergedPathSet;

/// A unit of work handed to a [`Scheduler`].
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Module descriptor produced by the packaging collaborator
///
/// Everything the core needs to know about a bundle before it is loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleDescriptor {
    /// Bundle name (unique identifier, also the symbol prefix it owns)
    pub name: String,
    /// Location of the packaged bundle
    pub source_path: PathBuf,
    /// Location the bundle's artifacts were unpacked to
    pub extracted_path: PathBuf,
    /// Whether the bundle contributes resources to the merged path set
    pub has_resources: bool,
    /// Symbol invoked once on activation
    pub entry_point: Option<String>,
    /// Directory holding the bundle's native libraries
    pub native_library_path: Option<PathBuf>,
    /// Defer loading until a symbol belonging to this bundle is requested
    pub lazy: bool,
}

impl ModuleDescriptor {
    /// Create a descriptor for a non-lazy bundle with resources and no entry point
    pub fn new(
        name: impl Into<String>,
        source_path: impl Into<PathBuf>,
        extracted_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            source_path: source_path.into(),
            extracted_path: extracted_path.into(),
            has_resources: true,
            entry_point: None,
            native_library_path: None,
            lazy: false,
        }
    }

    pub fn lazy(mut self, lazy: bool) -> Self {
        self.lazy = lazy;
        self
    }

    pub fn with_resources(mut self, has_resources: bool) -> Self {
        self.has_resources = has_resources;
        self
    }

    pub fn with_entry_point(mut self, entry_point: impl Into<String>) -> Self {
        self.entry_point = Some(entry_point.into());
        self
    }

    pub fn with_native_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.native_library_path = Some(path.into());
        self
    }
}

/// Context the host hands to the registry at construction
///
/// Replaces the ambient application singleton: everything module contexts
/// are derived from is passed in explicitly.
#[derive(Debug, Clone)]
pub struct HostContext {
    /// The host's own resource path (always first in the merged set)
    pub resource_path: PathBuf,
    /// Root directory for per-bundle data
    pub data_dir: PathBuf,
    /// Host-level properties visible to every bundle
    pub properties: HashMap<String, String>,
}

impl HostContext {
    /// Create a new host context
    pub fn new(resource_path: impl Into<PathBuf>, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            resource_path: resource_path.into(),
            data_dir: data_dir.into(),
            properties: HashMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

/// Execution context scoped to one bundle
///
/// Derived from the [`HostContext`] and the bundle's identity, handed to
/// the bundle's entry point when it is created.
#[derive(Debug, Clone)]
pub struct ModuleContext {
    /// Module ID (unique per activation)
    pub module_id: String,
    /// Bundle name
    pub name: String,
    /// Packaged bundle location
    pub source_path: PathBuf,
    /// Unpacked artifact location
    pub extracted_path: PathBuf,
    /// Bundle data directory (where the bundle can store its state)
    pub data_dir: PathBuf,
    /// Native library directory, if any
    pub native_library_path: Option<PathBuf>,
    /// Properties inherited from the host
    pub properties: HashMap<String, String>,
}

impl ModuleContext {
    /// Get a property value
    pub fn get_property(&self, key: &str) -> Option<&String> {
        self.properties.get(key)
    }

    /// Get a property value with default
    pub fn get_property_or(&self, key: &str, default: &str) -> String {
        self.properties
            .get(key)
            .map(|s| s.as_str())
            .unwrap_or(default)
            .to_string()
    }
}

/// A bundle's activation hook, created once and called on the primary context
pub trait EntryPoint: Send {
    /// Called once, on the primary execution context, after creation
    fn on_create(&mut self, context: &ModuleContext) -> Result<(), BundleError>;
}

/// Constructs an [`EntryPoint`] instance for a bundle
pub type EntryPointFactory =
    Arc<dyn Fn(&ModuleContext) -> Result<Box<dyn EntryPoint>, BundleError> + Send + Sync>;

/// A resolved symbol
///
/// Opaque apart from its identity; symbols that name an entry point carry
/// the factory used to instantiate it.
#[derive(Clone)]
pub struct Symbol {
    name: String,
    module: String,
    entry_point: Option<EntryPointFactory>,
}

impl Symbol {
    pub fn new(name: impl Into<String>, module: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            module: module.into(),
            entry_point: None,
        }
    }

    /// Attach an entry-point factory to this symbol
    pub fn with_entry_point(mut self, factory: EntryPointFactory) -> Self {
        self.entry_point = Some(factory);
        self
    }

    /// Fully-qualified symbol name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the bundle whose artifact resolved this symbol
    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn entry_point(&self) -> Option<&EntryPointFactory> {
        self.entry_point.as_ref()
    }

    pub fn is_entry_point(&self) -> bool {
        self.entry_point.is_some()
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Symbol")
            .field("name", &self.name)
            .field("module", &self.module)
            .field("entry_point", &self.entry_point.is_some())
            .finish()
    }
}

/// Loaded, queryable representation of a bundle's compiled code
pub trait Artifact: Send + Sync {
    /// Resolve a fully-qualified symbol name, `None` when this artifact doesn't define it
    fn resolve_symbol(&self, name: &str) -> Option<Symbol>;
}

/// Opens a bundle's compiled-code unit
///
/// Implementations may block on I/O; the core only calls this from a
/// locked load.
pub trait ArtifactLoader: Send + Sync {
    fn load(&self, module: &str, extracted_path: &Path) -> Result<Arc<dyn Artifact>, BundleError>;
}

/// Host-side notifications
pub trait HostEnvironment: Send + Sync {
    /// Replace the host's active merged resource view
    ///
    /// `incremental` is false for the initial publish from `set_up` and true
    /// for every later append.
    fn publish_resource_paths(&self, paths: &MergedPathSet, incremental: bool);

    /// State rendered from an older resource view must be recreated
    fn request_recreate(&self);

    /// Take ownership of a bundle's entry point after a successful `on_create`
    fn adopt_entry_point(&self, _module: &str, _entry_point: Box<dyn EntryPoint>) {}
}

/// Execution contexts the core schedules work onto
pub trait Scheduler: Send + Sync {
    /// Run `task` on the primary (UI-affinity) context, in scheduling order
    fn post_primary(&self, task: Task);

    /// Run `task` on a background context
    fn post_background(&self, name: &str, task: Task);
}

/// Bundle system errors
#[derive(Debug, Error)]
pub enum BundleError {
    #[error("Bundle already registered: {0}")]
    DuplicateModule(String),

    #[error("Symbol not found: {symbol}")]
    SymbolNotFound {
        symbol: String,
        #[source]
        source: Option<Box<BundleError>>,
    },

    #[error("Failed to resolve entry point {entry_point} of bundle {module}")]
    EntryPointResolution {
        module: String,
        entry_point: String,
        #[source]
        source: Box<BundleError>,
    },

    #[error("Symbol {0} is not an entry point")]
    NotAnEntryPoint(String),

    #[error("Entry point callback of bundle {module} failed: {reason}")]
    Callback { module: String, reason: String },

    #[error("Failed to load artifact of bundle {module} from {path:?}: {reason}")]
    ArtifactLoad {
        module: String,
        path: PathBuf,
        reason: String,
    },

    #[error("Registry already set up")]
    AlreadySetUp,

    #[error("Invalid bundle manifest: {0}")]
    InvalidManifest(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BundleError {
    /// Symbol lookup miss with no underlying load failure
    pub fn symbol_not_found(symbol: impl Into<String>) -> Self {
        BundleError::SymbolNotFound {
            symbol: symbol.into(),
            source: None,
        }
    }
}

impl From<toml::de::Error> for BundleError {
    fn from(e: toml::de::Error) -> Self {
        BundleError::InvalidManifest(e.to_string())
    }
}

impl From<serde_json::Error> for BundleError {
    fn from(e: serde_json::Error) -> Self {
        BundleError::InvalidManifest(e.to_string())
    }
}
