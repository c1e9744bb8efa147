//! Native library lookup across bundles

use std::env::consts::{DLL_PREFIX, DLL_SUFFIX};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::trace;

use crate::module::record::ModuleRecord;

/// Platform file name for a bare library name (`foo` -> `libfoo.so` on Linux)
pub fn map_library_name(library_name: &str) -> String {
    format!("{}{}{}", DLL_PREFIX, library_name, DLL_SUFFIX)
}

/// First bundle, in registration order, whose native library directory
/// holds a readable regular file for `library_name`
pub fn find_native_library(modules: &[Arc<ModuleRecord>], library_name: &str) -> Option<PathBuf> {
    let file_name = map_library_name(library_name);

    modules.iter().find_map(|module| {
        let dir = module.native_library_path()?;
        let candidate = dir.join(&file_name);
        if is_readable_file(&candidate) {
            trace!(bundle = %module.name(), path = ?candidate, "Found native library");
            Some(candidate)
        } else {
            None
        }
    })
}

fn is_readable_file(path: &Path) -> bool {
    path.is_file() && File::open(path).is_ok()
}
