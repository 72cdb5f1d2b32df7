//! Restore-on-start and throttled backups of the clip store.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;

use crate::error::Result;
use crate::storage::{SNAPSHOT_VERSION, Snapshot, SnapshotStorage};
use crate::store::ClipStore;

#[derive(Debug, Clone, Copy)]
struct LastBackup {
    instant: Instant,
    at: DateTime<Utc>,
}

/// Moves the clip set between the store and a [`SnapshotStorage`].
///
/// Persistence is best effort: failures are logged and never reach the
/// crawl loop.
pub struct SnapshotKeeper {
    storage: Arc<dyn SnapshotStorage>,
    interval: Duration,
    last_backup: Mutex<Option<LastBackup>>,
}

impl SnapshotKeeper {
    pub fn new(storage: Arc<dyn SnapshotStorage>, interval: Duration) -> Self {
        Self {
            storage,
            interval,
            last_backup: Mutex::new(None),
        }
    }

    /// Load the stored snapshot into `store`.
    ///
    /// Returns the number of clips in the store afterwards. A missing,
    /// unreadable or differently versioned snapshot leaves the store empty.
    pub async fn restore(&self, store: &ClipStore) -> usize {
        let snapshot = match self.read_snapshot().await {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => return 0,
            Err(e) => {
                log::info!(
                    "Ignoring unreadable snapshot at {}: {}",
                    self.storage.location(),
                    e
                );
                return 0;
            }
        };

        let restored = snapshot.clips.len();
        let summary = store.merge(snapshot.clips, Duration::ZERO).await;
        log::info!(
            "Restored {} clips from {} ({} expired on load)",
            summary.total,
            self.storage.location(),
            restored.saturating_sub(summary.total)
        );
        summary.total
    }

    /// Write a backup of `store` unless one was written within the interval.
    ///
    /// Returns whether a backup was written.
    pub async fn backup_if_due(&self, store: &ClipStore) -> bool {
        if !self.is_due() {
            return false;
        }

        let clips = store.snapshot_clips().await;
        let count = clips.len();
        match self.write_snapshot(Snapshot::new(clips)).await {
            Ok(()) => {
                if let Ok(mut last) = self.last_backup.lock() {
                    *last = Some(LastBackup {
                        instant: Instant::now(),
                        at: Utc::now(),
                    });
                }
                log::info!("Backed up {} clips to {}", count, self.storage.location());
                true
            }
            Err(e) => {
                log::error!("Failed to back up clips to {}: {}", self.storage.location(), e);
                false
            }
        }
    }

    /// Wall-clock time of the last successful backup.
    pub fn last_backup(&self) -> Option<DateTime<Utc>> {
        self.last_backup
            .lock()
            .ok()
            .and_then(|last| last.map(|l| l.at))
    }

    fn is_due(&self) -> bool {
        match self.last_backup.lock() {
            Ok(last) => last.is_none_or(|l| l.instant.elapsed() >= self.interval),
            Err(_) => true,
        }
    }

    async fn read_snapshot(&self) -> Result<Option<Snapshot>> {
        let Some(bytes) = self.storage.load().await? else {
            log::info!("No snapshot found at {}", self.storage.location());
            return Ok(None);
        };

        let snapshot: Snapshot = serde_json::from_slice(&bytes)?;
        if snapshot.version != SNAPSHOT_VERSION {
            log::info!(
                "Ignoring snapshot version {} (expected {})",
                snapshot.version,
                SNAPSHOT_VERSION
            );
            return Ok(None);
        }
        Ok(Some(snapshot))
    }

    async fn write_snapshot(&self, snapshot: Snapshot) -> Result<()> {
        let bytes = serde_json::to_vec(&snapshot)?;
        self.storage.save(&bytes).await
    }
}
