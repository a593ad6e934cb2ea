//! Storage for the `.storage/` directory
//!
//! Each stored document lives in its own JSON file wrapped in a versioned
//! envelope:
//!
//! ```json
//! {
//!   "version": 1,
//!   "minor_version": 1,
//!   "key": "core.config_entries",
//!   "data": { ... }
//! }
//! ```
//!
//! A [`Store`] is a typed handle onto one such file.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, warn};

/// Name of the storage directory inside the config dir
pub const STORAGE_DIR: &str = ".storage";

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported major version for {key}: expected {expected}, found {found}")]
    VersionMismatch {
        key: String,
        expected: u32,
        found: u32,
    },
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Types that are persisted under a fixed storage key
pub trait Storable: Serialize + DeserializeOwned + Send + Sync {
    /// File name under `.storage/`
    const KEY: &'static str;
    /// Major version; a different major version on disk is rejected
    const VERSION: u32;
    /// Minor version; older minor versions load with a warning
    const MINOR_VERSION: u32;
}

#[derive(Serialize)]
struct EnvelopeRef<'a, T> {
    version: u32,
    minor_version: u32,
    key: &'a str,
    data: &'a T,
}

#[derive(Deserialize)]
struct Envelope<T> {
    version: u32,
    minor_version: u32,
    data: T,
}

/// Typed handle onto a single `.storage/<KEY>` file
pub struct Store<T> {
    storage_dir: PathBuf,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Store<T> {
    fn clone(&self) -> Self {
        Self {
            storage_dir: self.storage_dir.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: Storable> Store<T> {
    /// Create a store rooted at `config_dir/.storage`
    pub fn new(config_dir: impl AsRef<Path>) -> Self {
        Self {
            storage_dir: config_dir.as_ref().join(STORAGE_DIR),
            _marker: PhantomData,
        }
    }

    /// Path of the backing file
    pub fn path(&self) -> PathBuf {
        self.storage_dir.join(T::KEY)
    }

    /// Load the stored document, `None` when nothing has been saved yet
    pub async fn load(&self) -> StorageResult<Option<T>> {
        let path = self.path();
        if !path.exists() {
            debug!("Storage file not found: {}", T::KEY);
            return Ok(None);
        }

        let content = fs::read_to_string(&path).await?;
        let envelope: Envelope<T> = serde_json::from_str(&content)?;

        if envelope.version != T::VERSION {
            return Err(StorageError::VersionMismatch {
                key: T::KEY.to_string(),
                expected: T::VERSION,
                found: envelope.version,
            });
        }
        if envelope.minor_version < T::MINOR_VERSION {
            warn!(
                "Storage {} has older minor version ({} < {})",
                T::KEY,
                envelope.minor_version,
                T::MINOR_VERSION
            );
        }

        debug!(
            "Loaded storage file: {} (v{}.{})",
            T::KEY,
            envelope.version,
            envelope.minor_version
        );
        Ok(Some(envelope.data))
    }

    /// Save the document, writing a temp file and renaming it over the old one
    pub async fn save(&self, data: &T) -> StorageResult<()> {
        if !self.storage_dir.exists() {
            fs::create_dir_all(&self.storage_dir).await?;
        }

        let envelope = EnvelopeRef {
            version: T::VERSION,
            minor_version: T::MINOR_VERSION,
            key: T::KEY,
            data,
        };
        let content = serde_json::to_string_pretty(&envelope)?;

        let path = self.path();
        let temp_path = self.storage_dir.join(format!("{}.tmp", T::KEY));
        fs::write(&temp_path, &content).await?;
        fs::rename(&temp_path, &path).await?;

        debug!("Saved storage file: {}", T::KEY);
        Ok(())
    }

    /// Delete the backing file if present
    pub async fn remove(&self) -> StorageResult<()> {
        let path = self.path();
        if path.exists() {
            fs::remove_file(&path).await?;
            debug!("Deleted storage file: {}", T::KEY);
        }
        Ok(())
    }
}
