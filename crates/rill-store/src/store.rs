//! Store operations.

use crate::hash::{Hash, Hasher};
use log::debug;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Source path not found.
    #[error("path not found: {0}")]
    PathNotFound(String),

    /// Source path has no usable file name.
    #[error("invalid source path: {0}")]
    InvalidPath(String),
}

/// A path inside the store: a content hash plus a human-readable name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StorePath {
    hash: Hash,
    name: String,
}

impl StorePath {
    pub fn new(hash: Hash, name: String) -> Self {
        Self { hash, name }
    }

    pub fn hash(&self) -> Hash {
        self.hash
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The absolute filesystem path under the given store root.
    pub fn to_path(&self, root: &Path) -> PathBuf {
        root.join(self.to_string())
    }
}

impl fmt::Display for StorePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.hash.to_short_hex(), self.name)
    }
}

/// The downward interface the evaluator's coercion layer depends on.
pub trait Store {
    /// The root directory of the store.
    fn store_dir(&self) -> &Path;

    /// Copy a source file or directory into the store, returning the
    /// resulting absolute store path.
    fn add_to_store(&self, source: &Path) -> Result<PathBuf, StoreError>;

    /// Compute the store path a source would get, without copying anything.
    fn compute_store_path(&self, source: &Path) -> Result<(PathBuf, Hash), StoreError>;
}

/// A store rooted in a local directory.
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    /// Create a store handle for the given root. Nothing is created on
    /// disk until something is added.
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Create a store handle at the configured default location.
    pub fn default_location() -> Self {
        Self::new(crate::path::store_dir())
    }

    fn name_and_hash(&self, source: &Path) -> Result<(String, Hash), StoreError> {
        let name = source
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| StoreError::InvalidPath(source.display().to_string()))?
            .to_string();

        let meta = fs::metadata(source)
            .map_err(|_| StoreError::PathNotFound(source.display().to_string()))?;

        let hash = if meta.is_dir() {
            hash_dir(source)?
        } else {
            Hash::of(&fs::read(source)?)
        };

        Ok((name, hash))
    }
}

impl Store for LocalStore {
    fn store_dir(&self) -> &Path {
        &self.root
    }

    fn add_to_store(&self, source: &Path) -> Result<PathBuf, StoreError> {
        let (name, hash) = self.name_and_hash(source)?;
        let store_path = StorePath::new(hash, name);
        let dest = store_path.to_path(&self.root);

        if !dest.exists() {
            fs::create_dir_all(&self.root)?;
            if source.is_dir() {
                copy_dir_recursive(source, &dest)?;
            } else {
                fs::copy(source, &dest)?;
            }
            make_readonly_recursive(&dest)?;
            debug!("copied source `{}' -> `{}'", source.display(), dest.display());
        }

        Ok(dest)
    }

    fn compute_store_path(&self, source: &Path) -> Result<(PathBuf, Hash), StoreError> {
        let (name, hash) = self.name_and_hash(source)?;
        let store_path = StorePath::new(hash, name);
        Ok((store_path.to_path(&self.root), hash))
    }
}

/// Hash a directory: entry names and file contents, in sorted order, so
/// the hash is independent of readdir ordering.
fn hash_dir(dir: &Path) -> Result<Hash, StoreError> {
    let mut hasher = Hasher::new();
    hash_dir_into(dir, &mut hasher)?;
    Ok(hasher.finalize())
}

fn hash_dir_into(dir: &Path, hasher: &mut Hasher) -> Result<(), StoreError> {
    let mut entries: Vec<_> = fs::read_dir(dir)?.collect::<Result<_, _>>()?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        hasher.update_str(&entry.file_name().to_string_lossy());
        let path = entry.path();
        if path.is_dir() {
            hasher.update_str("/");
            hash_dir_into(&path, hasher)?;
        } else {
            hasher.update(&fs::read(&path)?);
        }
    }
    Ok(())
}

fn copy_dir_recursive(source: &Path, dest: &Path) -> Result<(), StoreError> {
    fs::create_dir_all(dest)?;
    for entry in fs::read_dir(source)? {
        let entry = entry?;
        let from = entry.path();
        let to = dest.join(entry.file_name());
        if from.is_dir() {
            copy_dir_recursive(&from, &to)?;
        } else {
            fs::copy(&from, &to)?;
        }
    }
    Ok(())
}

fn make_readonly_recursive(path: &Path) -> Result<(), StoreError> {
    let meta = fs::metadata(path)?;
    if meta.is_dir() {
        for entry in fs::read_dir(path)? {
            make_readonly_recursive(&entry?.path())?;
        }
    }
    let mut perms = meta.permissions();
    perms.set_readonly(true);
    fs::set_permissions(path, perms)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn add_file_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("store");

        let src = dir.path().join("hello.txt");
        let mut f = fs::File::create(&src).unwrap();
        f.write_all(b"hello store").unwrap();
        drop(f);

        let store = LocalStore::new(root.clone());
        let first = store.add_to_store(&src).unwrap();
        let second = store.add_to_store(&src).unwrap();
        assert_eq!(first, second);
        assert!(first.starts_with(&root));
        assert_eq!(fs::read(&first).unwrap(), b"hello store");
    }

    #[test]
    fn compute_matches_add() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("data");
        fs::write(&src, b"contents").unwrap();

        let store = LocalStore::new(dir.path().join("store"));
        let (computed, _) = store.compute_store_path(&src).unwrap();
        let added = store.add_to_store(&src).unwrap();
        assert_eq!(computed, added);
    }

    #[test]
    fn missing_source_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path().join("store"));
        let err = store.add_to_store(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, StoreError::PathNotFound(_)));
    }
}
