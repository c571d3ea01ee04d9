//! The persisted list of tracked calendars.
//!
//! The store file is only reachable through [`CalendarStore::lock`], so a
//! load-mutate-persist sequence always runs under one guard. Writers never
//! see each other's half-finished state: each persist writes a temporary file
//! next to the target and renames it into place.

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use shared_types::Store;
use tempfile::NamedTempFile;
use tokio::sync::{Mutex, MutexGuard};

use crate::error::StoreError;

pub struct CalendarStore {
    file: Mutex<StoreFile>,
}

/// Handle on the storage file, held while the store lock is taken.
#[derive(Debug)]
pub struct StoreFile {
    path: PathBuf,
}

impl CalendarStore {
    /// Open the store at `path`, writing an empty store if the file is absent.
    ///
    /// A file that exists but cannot be parsed is an error; callers treat it
    /// as fatal at startup.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let file = StoreFile { path: path.into() };

        match read_store(&file.path)? {
            Some(store) => {
                tracing::info!(
                    "Loaded {} tracked calendars from {}",
                    store.calendars.len(),
                    file.path.display()
                );
            }
            None => {
                tracing::info!("Initializing empty storage at {}", file.path.display());
                let json =
                    serde_json::to_vec_pretty(&Store::default()).map_err(StoreError::Serialize)?;
                write_atomic(&file.path, &json)?;
            }
        }

        Ok(Self {
            file: Mutex::new(file),
        })
    }

    /// Take exclusive access to the storage file.
    pub async fn lock(&self) -> MutexGuard<'_, StoreFile> {
        self.file.lock().await
    }

    /// Read the current state without modifying it.
    pub async fn snapshot(&self) -> Result<Store, StoreError> {
        self.lock().await.load().await
    }
}

impl StoreFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the store; a missing file reads as an empty store.
    pub async fn load(&self) -> Result<Store, StoreError> {
        let path = self.path.clone();
        run_blocking(&self.path, move || Ok(read_store(&path)?.unwrap_or_default())).await
    }

    /// Replace the file content with `store` in one rename.
    pub async fn persist(&self, store: &Store) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(store).map_err(StoreError::Serialize)?;
        let path = self.path.clone();
        run_blocking(&self.path, move || write_atomic(&path, &json)).await?;

        tracing::debug!(
            "Persisted {} calendars to {}",
            store.calendars.len(),
            self.path().display()
        );
        Ok(())
    }
}

/// Run file I/O on the blocking pool; callers may hold the store lock.
async fn run_blocking<T, F>(path: &Path, task: F) -> Result<T, StoreError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| StoreError::Io {
            path: path.to_path_buf(),
            source: std::io::Error::other(e),
        })?
}

fn read_store(path: &Path) -> Result<Option<Store>, StoreError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(StoreError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    serde_json::from_str(&content)
        .map(Some)
        .map_err(|source| StoreError::Corrupt {
            path: path.to_path_buf(),
            source,
        })
}

fn write_atomic(path: &Path, json: &[u8]) -> Result<(), StoreError> {
    let io_error = |source: std::io::Error| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(io_error)?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(io_error)?;
    tmp.write_all(json).map_err(io_error)?;
    tmp.as_file().sync_all().map_err(io_error)?;
    tmp.persist(path).map_err(|e| io_error(e.error))?;
    Ok(())
}
