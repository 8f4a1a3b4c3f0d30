//! Storage file persistence.
//!
//! The whole store lives in one JSON file mapping token to user data:
//!
//! ```text
//! <dir>/
//! ├─ storage.json        # canonical copy
//! ├─ storage.json.temp   # in-flight write, renamed over the canonical copy
//! └─ storage.json.lock   # advisory lock held by the serving process
//! ```
//!
//! Saves use the write-then-rename pattern so a crash mid-write leaves the
//! previous copy intact.

use crate::error::{StoreError, StoreResult};
use crate::store::{Store, StoreMap};
use fs2::FileExt;
use parking_lot::Mutex;
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Default storage file name.
pub const DEFAULT_STORAGE_FILE: &str = "storage.json";

/// Outcome of a soft load at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    /// The file was read; the store now holds this many tokens.
    Loaded(usize),
    /// No file yet (first run).
    Missing,
    /// The file could not be read or decoded; the store was left empty.
    Failed,
}

/// Saves and loads a [`Store`] to a single file.
#[derive(Debug)]
pub struct PersistenceManager {
    path: PathBuf,
    temp_path: PathBuf,
    /// Serializes writers of the temp file.
    write_lock: Mutex<()>,
    /// Advisory lock handle, held for the manager's lifetime.
    _lock_file: Option<File>,
}

impl PersistenceManager {
    /// Creates a manager for `path` without taking the advisory lock.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            temp_path: sibling(&path, ".temp"),
            path,
            write_lock: Mutex::new(()),
            _lock_file: None,
        }
    }

    /// Creates a manager and takes the advisory lock beside `path`.
    ///
    /// Creates the parent directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Locked`] if another process holds the lock.
    pub fn open_locked(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let mut manager = Self::new(path);
        if let Some(parent) = manager.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let lock_path = manager.lock_path();
        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;
        if lock_file.try_lock_exclusive().is_err() {
            return Err(StoreError::Locked { path: lock_path });
        }

        manager._lock_file = Some(lock_file);
        Ok(manager)
    }

    /// Returns the canonical storage file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the temporary file path.
    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    /// Returns the advisory lock file path.
    pub fn lock_path(&self) -> PathBuf {
        sibling(&self.path, ".lock")
    }

    /// Reads and decodes the storage file.
    ///
    /// Returns `None` if the file does not exist or is empty.
    pub fn load(&self) -> StoreResult<Option<StoreMap>> {
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if data.is_empty() {
            return Ok(None);
        }
        Ok(Some(Store::decode(&data)?))
    }

    /// Loads the storage file into `store`, treating every failure as an
    /// empty store. Errors are logged, never returned.
    pub fn load_into(&self, store: &Store) -> LoadStatus {
        match self.load() {
            Ok(Some(map)) => {
                let tokens = map.len();
                store.replace(map);
                info!(path = %self.path.display(), tokens, "loaded storage file");
                LoadStatus::Loaded(tokens)
            }
            Ok(None) => {
                info!(path = %self.path.display(), "no storage file, starting empty");
                LoadStatus::Missing
            }
            Err(e) => {
                error!(path = %self.path.display(), error = %e, "failed to load storage file, starting empty");
                LoadStatus::Failed
            }
        }
    }

    /// Serializes `store` and atomically replaces the storage file.
    ///
    /// Encoding holds the store's shared lock; all file I/O happens after it
    /// is released.
    pub fn save(&self, store: &Store) -> StoreResult<()> {
        let data = store.encode()?;
        self.write_atomic(&data)?;
        debug!(path = %self.path.display(), bytes = data.len(), "saved storage file");
        Ok(())
    }

    /// Like [`PersistenceManager::save`], but logs failures instead of
    /// returning them. Returns true on success.
    pub fn save_logged(&self, store: &Store) -> bool {
        match self.save(store) {
            Ok(()) => true,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to save storage file");
                false
            }
        }
    }

    /// Writes `data` to the temp file, syncs it, renames it over the storage
    /// file and syncs the directory.
    fn write_atomic(&self, data: &[u8]) -> StoreResult<()> {
        let _guard = self.write_lock.lock();

        let mut file = File::create(&self.temp_path)?;
        file.write_all(data)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&self.temp_path, &self.path)?;
        self.sync_directory()?;
        Ok(())
    }

    #[cfg(unix)]
    fn sync_directory(&self) -> StoreResult<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        File::open(dir)?.sync_all()?;
        Ok(())
    }

    #[cfg(not(unix))]
    fn sync_directory(&self) -> StoreResult<()> {
        // NTFS journals metadata; directory handles cannot be fsynced.
        Ok(())
    }
}

/// `storage.json` + `.temp` -> `storage.json.temp`.
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from(DEFAULT_STORAGE_FILE));
    name.push(suffix);
    path.with_file_name(name)
}
