//! Store persisting the namespace as a JSON object on disk.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use setthings_schema::FlatMap;
use tracing::debug;
use uuid::Uuid;

use crate::store::{SettingsStore, apply_write};
use crate::{StoreError, StoreResult};

/// Configuration for [`FileStore`].
#[derive(Debug, Clone)]
pub struct FileStoreConfig {
    path: PathBuf,
    pretty: bool,
}

impl FileStoreConfig {
    /// Creates a configuration for the file at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            pretty: false,
        }
    }

    /// Writes indented JSON instead of a single line.
    #[must_use]
    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    /// Returns the backing file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns `true` when output is indented.
    #[must_use]
    pub const fn pretty(&self) -> bool {
        self.pretty
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidConfig`] when the path is empty or does not
    /// name a file.
    pub fn validate(&self) -> StoreResult<()> {
        if self.path.as_os_str().is_empty() {
            return Err(StoreError::InvalidConfig("file store path cannot be empty"));
        }
        if self.path.file_name().is_none() {
            return Err(StoreError::InvalidConfig("file store path must name a file"));
        }
        Ok(())
    }
}

/// File-backed store.
///
/// Every read goes to disk, so writes made by other processes are observed.
/// Writes replace the file atomically through a temporary sibling and are
/// serialized within the process.
#[derive(Debug, Clone)]
pub struct FileStore {
    config: Arc<FileStoreConfig>,
    write_lock: Arc<Mutex<()>>,
}

impl FileStore {
    /// Creates a store for the configured file. The file is created on first
    /// write.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidConfig`] when the configuration is invalid.
    pub fn new(config: FileStoreConfig) -> StoreResult<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Returns the backing file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.config.path()
    }

    fn write_locked(&self, updates: &FlatMap, merge: bool) -> StoreResult<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| StoreError::backend("file store write lock poisoned"))?;

        let mut contents = if merge {
            read_file(self.path())?
        } else {
            FlatMap::new()
        };
        apply_write(&mut contents, updates, merge);

        let bytes = if self.config.pretty() {
            serde_json::to_vec_pretty(&contents)?
        } else {
            serde_json::to_vec(&contents)?
        };
        replace_file(self.path(), &bytes)?;

        debug!(
            path = %self.path().display(),
            keys = updates.len(),
            merge,
            "file store write"
        );
        Ok(())
    }
}

fn decode(bytes: &[u8]) -> StoreResult<FlatMap> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(FlatMap::new());
    }
    Ok(serde_json::from_slice(bytes)?)
}

fn read_file(path: &Path) -> StoreResult<FlatMap> {
    match fs::read(path) {
        Ok(bytes) => decode(&bytes),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(FlatMap::new()),
        Err(err) => Err(err.into()),
    }
}

fn replace_file(path: &Path, bytes: &[u8]) -> StoreResult<()> {
    let parent = path.parent().filter(|parent| !parent.as_os_str().is_empty());
    if let Some(parent) = parent {
        fs::create_dir_all(parent)?;
    }

    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp_name = format!(".{file_name}.{}.tmp", Uuid::new_v4().simple());
    let temp = match parent {
        Some(parent) => parent.join(temp_name),
        None => PathBuf::from(temp_name),
    };

    fs::write(&temp, bytes)?;
    if let Err(err) = fs::rename(&temp, path) {
        let _ = fs::remove_file(&temp);
        return Err(err.into());
    }
    Ok(())
}

#[async_trait]
impl SettingsStore for FileStore {
    fn read_all(&self) -> StoreResult<FlatMap> {
        read_file(self.path())
    }

    async fn read_all_async(&self) -> StoreResult<FlatMap> {
        match tokio::fs::read(self.path()).await {
            Ok(bytes) => decode(&bytes),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(FlatMap::new()),
            Err(err) => Err(err.into()),
        }
    }

    fn write_all(&self, updates: &FlatMap, merge: bool) -> StoreResult<()> {
        self.write_locked(updates, merge)
    }

    async fn write_all_async(&self, updates: &FlatMap, merge: bool) -> StoreResult<()> {
        let store = self.clone();
        let updates = updates.clone();
        tokio::task::spawn_blocking(move || store.write_locked(&updates, merge))
            .await
            .map_err(|err| StoreError::backend(format!("file store write task failed: {err}")))?
    }
}
