//! Snapshot persistence.
//!
//! The whole clip set is written as one JSON document under a single key:
//!
//! ```text
//! {root}/
//! └── history.json    # { "version": 1, "clips": [...] }
//! ```
//!
//! Backends only move bytes; [`SnapshotKeeper`] owns the document format,
//! restore on start and backup throttling.

pub mod local;
#[cfg(feature = "s3")]
pub mod s3;
mod snapshot;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{Clip, StorageBackend, StorageConfig};

// Re-export for convenience
pub use local::LocalStorage;
#[cfg(feature = "s3")]
pub use s3::S3Storage;
pub use snapshot::SnapshotKeeper;

/// Key the snapshot document is stored under.
pub const SNAPSHOT_KEY: &str = "history.json";

/// Snapshot format version. Documents with any other version are ignored.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Persisted clip set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub clips: Vec<Clip>,
}

impl Snapshot {
    pub fn new(clips: Vec<Clip>) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            clips,
        }
    }
}

/// Byte-oriented load/save target for snapshots.
#[async_trait]
pub trait SnapshotStorage: Send + Sync {
    /// Read the stored snapshot, `None` if nothing has been saved yet.
    async fn load(&self) -> Result<Option<Vec<u8>>>;

    /// Replace the stored snapshot.
    async fn save(&self, bytes: &[u8]) -> Result<()>;

    /// Human-readable location, for logs.
    fn location(&self) -> String;
}

/// Build the backend selected in the configuration.
///
/// Returns `None` when snapshots are disabled.
pub async fn from_config(config: &StorageConfig) -> Result<Option<Arc<dyn SnapshotStorage>>> {
    let storage: Arc<dyn SnapshotStorage> = match config.backend {
        StorageBackend::None => return Ok(None),
        StorageBackend::Local => Arc::new(LocalStorage::new(&config.local_dir)),
        #[cfg(feature = "s3")]
        StorageBackend::S3 => Arc::new(S3Storage::from_config(config).await?),
        #[cfg(not(feature = "s3"))]
        StorageBackend::S3 => {
            return Err(crate::error::AppError::config(
                "S3 storage requires building with the `s3` feature",
            ));
        }
    };
    log::info!("Snapshot storage: {}", storage.location());
    Ok(Some(storage))
}
