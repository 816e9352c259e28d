//! Content-addressed object store for rill.
//!
//! The evaluator copies build sources into the store while coercing paths
//! to strings; everything here is addressed by the blake3 hash of its
//! contents.

mod hash;
mod path;
mod store;

pub use hash::{Hash, Hasher};
pub use path::{is_in_store, store_dir, DEFAULT_STORE_DIR, DRV_EXTENSION};
pub use store::{LocalStore, Store, StoreError, StorePath};
