//! Atomic JSON file operations.
//!
//! Readers never observe a half-written file: writes go to a sibling temp
//! file that is fsynced and renamed over the target. Read-modify-write
//! cycles hold an exclusive advisory lock on `<file>.lock`.

use saga_core::{Result, SagaError};
use serde::{Serialize, de::DeserializeOwned};
use std::fs::{self, File, OpenOptions};
use std::io::Write as IoWrite;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

/// A handle to one JSON document on disk.
pub struct AtomicJsonFile<T> {
    path: PathBuf,
    _phantom: PhantomData<T>,
}

impl<T> AtomicJsonFile<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            _phantom: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads and deserializes the file.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(T))`: Successfully loaded
    /// - `Ok(None)`: File doesn't exist or is empty
    /// - `Err`: `SagaError::Persistence` for unreadable or malformed content
    pub fn load(&self) -> Result<Option<T>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path).map_err(|e| self.failure("read", e))?;
        if content.trim().is_empty() {
            return Ok(None);
        }

        let data = serde_json::from_str(&content).map_err(|e| self.failure("parse", e))?;
        Ok(Some(data))
    }

    /// Writes `data` via temp file, fsync and rename.
    pub fn save(&self, data: &T) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| self.failure("create directory for", e))?;
        }

        let json = serde_json::to_string_pretty(data).map_err(|e| self.failure("serialize", e))?;

        let tmp_path = self.temp_path()?;
        let mut tmp_file = File::create(&tmp_path).map_err(|e| self.failure("create temp for", e))?;
        tmp_file
            .write_all(json.as_bytes())
            .and_then(|_| tmp_file.sync_all())
            .map_err(|e| self.failure("write", e))?;
        drop(tmp_file);

        fs::rename(&tmp_path, &self.path).map_err(|e| self.failure("replace", e))?;
        Ok(())
    }

    /// Loads, applies `f`, and saves while holding the lock.
    ///
    /// `f` receives `None` when the file does not exist. Returning `Ok(None)`
    /// leaves the file untouched.
    pub fn update<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(Option<T>) -> Result<Option<T>>,
    {
        let _lock = FileLock::acquire(&self.path)?;
        if let Some(next) = f(self.load()?)? {
            self.save(&next)?;
        }
        Ok(())
    }

    /// Removes the file. A missing file is not an error.
    pub fn remove(&self) -> Result<()> {
        let _lock = FileLock::acquire(&self.path)?;
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.failure("remove", e)),
        }
    }

    fn temp_path(&self) -> Result<PathBuf> {
        let parent = self
            .path
            .parent()
            .ok_or_else(|| SagaError::persistence("Path has no parent directory"))?;
        let file_name = self
            .path
            .file_name()
            .ok_or_else(|| SagaError::persistence("Path has no file name"))?;
        Ok(parent.join(format!(".{}.tmp", file_name.to_string_lossy())))
    }

    fn failure(&self, verb: &str, err: impl std::fmt::Display) -> SagaError {
        SagaError::persistence(format!("Failed to {} {}: {}", verb, self.path.display(), err))
    }
}

/// Exclusive lock released on drop.
///
/// The `.lock` file stays on disk so every holder locks the same inode.
struct FileLock {
    #[cfg_attr(not(unix), allow(dead_code))]
    file: File,
}

impl FileLock {
    fn acquire(path: &Path) -> Result<Self> {
        let lock_path = path.with_extension("lock");
        if let Some(parent) = lock_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| SagaError::persistence(format!("Failed to create lock directory: {}", e)))?;
        }

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| SagaError::persistence(format!("Failed to open lock file: {}", e)))?;

        #[cfg(unix)]
        {
            use fs2::FileExt;
            file.lock_exclusive()
                .map_err(|e| SagaError::persistence(format!("Failed to acquire lock: {}", e)))?;
        }

        Ok(FileLock { file })
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        #[cfg(unix)]
        {
            use fs2::FileExt;
            let _ = FileExt::unlock(&self.file);
        }
    }
}
