//! Store path utilities.

use std::path::{Path, PathBuf};

/// The default store directory.
pub const DEFAULT_STORE_DIR: &str = "/rill/store";

/// File name extension of serialized derivations. Sources with this
/// extension may not be copied into the store by string coercion.
pub const DRV_EXTENSION: &str = ".drv";

/// Get the store directory from the environment or use the default.
pub fn store_dir() -> PathBuf {
    std::env::var("RILL_STORE")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_STORE_DIR))
}

/// Check if a path is inside the store.
pub fn is_in_store(path: &Path) -> bool {
    let store = store_dir();
    path.starts_with(&store)
}
