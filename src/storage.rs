//! On-disk persistence of the live library
//!
//! The library lives in a single JSON file next to the user's data. Writes
//! go through a temporary file in the same directory that is renamed over
//! the target, so a crash mid-write leaves either the old or the new
//! library on disk, never a truncated one.
//!
//! ## File Layout
//!
//! ```text
//! {
//!   "version": 1,
//!   "config": { ... },
//!   "data": { "prompts": [...], "folders": [...], ... }
//! }
//! ```
//!
//! The `data` object has the same shape as an archive's `data`, but the
//! library file carries no checksum: it is the working copy, not a backup.

use crate::error::{Result, VaultError};
use crate::library::LibraryConfig;
use crate::types::DataSnapshot;

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Library file format version
pub const LIBRARY_FILE_VERSION: u32 = 1;

/// Serialized form of the library file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryFile {
    /// File format version
    pub version: u32,
    /// Settings saved with the library
    #[serde(default)]
    pub config: LibraryConfig,
    /// Library contents
    #[serde(default)]
    pub data: DataSnapshot,
}

impl LibraryFile {
    /// Wrap library contents for writing
    pub fn new(config: LibraryConfig, data: DataSnapshot) -> Self {
        Self {
            version: LIBRARY_FILE_VERSION,
            config,
            data,
        }
    }
}

/// JSON file backend for a library
#[derive(Debug, Clone)]
pub struct LibraryStorage {
    path: PathBuf,
}

impl LibraryStorage {
    /// Create a backend for the given file path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the library file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the library file exists
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Read the library file, `None` if it does not exist yet
    ///
    /// # Errors
    ///
    /// - [`VaultError::Io`] if the file cannot be read
    /// - [`VaultError::StorageCorrupted`] if it is not a library file of a
    ///   known version
    pub fn load(&self) -> Result<Option<LibraryFile>> {
        if !self.exists() {
            debug!("No library file at {:?}", self.path);
            return Ok(None);
        }

        let bytes = fs::read(&self.path)?;
        let file: LibraryFile = serde_json::from_slice(&bytes).map_err(|e| VaultError::StorageCorrupted {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;

        if file.version != LIBRARY_FILE_VERSION {
            return Err(VaultError::StorageCorrupted {
                path: self.path.clone(),
                reason: format!("unknown library file version {}", file.version),
            });
        }

        debug!(
            "Loaded library from {:?}: {} records",
            self.path,
            file.data.record_count()
        );
        Ok(Some(file))
    }

    /// Write the library file atomically
    pub fn save(&self, file: &LibraryFile) -> Result<()> {
        let content = serde_json::to_vec_pretty(file)?;
        atomic_write(&self.path, &content)?;
        trace!("Saved library to {:?}", self.path);
        Ok(())
    }
}

/// Atomic file write (write to temp file then rename)
///
/// The temporary file is created in the target's directory so the final
/// rename never crosses filesystems. Missing parent directories are
/// created. On failure the temporary file is removed and the target is
/// left as it was.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir)?;

    let mut temp = tempfile::NamedTempFile::new_in(&dir)?;
    temp.write_all(content)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| VaultError::Io(e.error))?;

    Ok(())
}
