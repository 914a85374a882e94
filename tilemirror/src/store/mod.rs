//! Filesystem tile store.
//!
//! Tiles live at a deterministic path derived from the provider's tile path
//! template and the tile coordinates:
//!
//! ```text
//! <root>/Tile/<provider>/<z>/<x>/<y>.<ext>
//! ```
//!
//! A file's existence is the only cache-validity signal. There is no
//! checksum and no expiry; files are never rewritten once present.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::trace;

use crate::coord::TileCoord;
use crate::provider::TilePathTemplate;

/// Errors from tile store writes.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to create directory {path}: {source}")]
    CreateDir { path: PathBuf, source: io::Error },

    #[error("Failed to write tile {path}: {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error("Tile path {0} has no parent directory")]
    NoParent(PathBuf),
}

/// Disk-backed tile cache for a single provider.
#[derive(Debug, Clone)]
pub struct TileStore {
    root: PathBuf,
    template: TilePathTemplate,
}

impl TileStore {
    /// Creates a store rooted at `root` using the provider's path layout.
    ///
    /// Nothing is created on disk until the first write.
    pub fn new(root: impl Into<PathBuf>, template: TilePathTemplate) -> Self {
        Self {
            root: root.into(),
            template,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path where `tile` is (or will be) stored.
    pub fn path(&self, tile: &TileCoord) -> PathBuf {
        self.template.format(&self.root, tile)
    }

    /// Returns true if the tile is already cached.
    pub fn exists(&self, tile: &TileCoord) -> bool {
        self.path(tile).is_file()
    }

    /// Stores tile bytes, creating parent directories as needed.
    ///
    /// Data is written to a temporary file in the destination directory and
    /// renamed into place, so readers never see a partial tile.
    pub fn write(&self, tile: &TileCoord, bytes: &[u8]) -> Result<PathBuf, StoreError> {
        let path = self.path(tile);
        let parent = path
            .parent()
            .ok_or_else(|| StoreError::NoParent(path.clone()))?;

        fs::create_dir_all(parent).map_err(|source| StoreError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;

        let write_err = |source| StoreError::Write {
            path: path.clone(),
            source,
        };

        let mut file = NamedTempFile::new_in(parent).map_err(write_err)?;
        file.write_all(bytes).map_err(write_err)?;
        file.persist(&path).map_err(|e| write_err(e.error))?;

        trace!(z = tile.z, x = tile.x, y = tile.y, bytes = bytes.len(), "Tile stored");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_temp_store() -> (TileStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let template = TilePathTemplate::parse("Tile/test/{z}/{x}/{y}.png").unwrap();
        let store = TileStore::new(temp_dir.path(), template);
        (store, temp_dir)
    }

    #[test]
    fn test_path_layout() {
        let (store, temp) = create_temp_store();
        let path = store.path(&TileCoord::new(5, 10, 20));
        assert_eq!(path, temp.path().join("Tile/test/5/10/20.png"));
    }

    #[test]
    fn test_exists_before_and_after_write() {
        let (store, _temp) = create_temp_store();
        let tile = TileCoord::new(3, 1, 2);

        assert!(!store.exists(&tile));
        let path = store.write(&tile, b"tile-bytes").unwrap();
        assert!(store.exists(&tile));
        assert_eq!(fs::read(path).unwrap(), b"tile-bytes");
    }

    #[test]
    fn test_write_leaves_no_temporary_files() {
        let (store, _temp) = create_temp_store();
        let tile = TileCoord::new(3, 1, 2);
        let path = store.write(&tile, b"abc").unwrap();

        let entries: Vec<_> = fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("2.png")]);
    }

    #[test]
    fn test_empty_body_is_cached() {
        let (store, _temp) = create_temp_store();
        let tile = TileCoord::new(0, 0, 0);
        store.write(&tile, &[]).unwrap();
        assert!(store.exists(&tile));
    }

    #[test]
    fn test_directory_is_not_a_tile() {
        let (store, _temp) = create_temp_store();
        let tile = TileCoord::new(1, 0, 0);
        fs::create_dir_all(store.path(&tile)).unwrap();
        assert!(!store.exists(&tile));
    }
}
