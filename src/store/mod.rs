// src/store/mod.rs

//! In-memory clip index.
//!
//! The store keeps every known clip keyed by content id and publishes
//! three sorted views of them (view count, rank, upload time). Writers
//! are serialized through one lock; readers query the published views
//! and never wait on a merge.

mod index;
mod status;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tokio::time::timeout;

use crate::models::{ChannelCount, Clip, ClipFilter, MAX_QUERY_LIMIT, SortType, StoreConfig};

pub use index::{Indices, MIN_RANK_AGE_SECS, compute_rank};
pub use status::StatusLine;

/// Outcome of one merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeSummary {
    pub added: usize,
    pub updated: usize,
    pub expired: usize,
    pub total: usize,
}

/// When the store last finished a merge and how long the cycle took.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateInfo {
    pub at: Option<DateTime<Utc>>,
    pub duration: Duration,
}

/// Shared clip store.
pub struct ClipStore {
    clips: RwLock<BTreeMap<String, Arc<Clip>>>,
    indices: Indices,
    status: StatusLine,
    last_update: ArcSwap<UpdateInfo>,
    housekeeping_timeout: Duration,
}

impl ClipStore {
    pub fn new(config: &StoreConfig) -> Self {
        Self {
            clips: RwLock::new(BTreeMap::new()),
            indices: Indices::new(),
            status: StatusLine::new(),
            last_update: ArcSwap::from_pointee(UpdateInfo::default()),
            housekeeping_timeout: config.housekeeping_timeout(),
        }
    }

    /// Fold a freshly fetched batch into the store.
    ///
    /// Every known channel is first marked offline; channels seen in the
    /// batch come back with their new snapshot. Expired clips are purged
    /// and cannot re-enter through the same batch. Ranks and all views are
    /// rebuilt before returning. `elapsed` is the time spent fetching the
    /// batch and is added to the recorded update duration.
    pub async fn merge(&self, batch: Vec<Clip>, elapsed: Duration) -> MergeSummary {
        let started = Instant::now();
        let now = Utc::now();
        let mut summary = MergeSummary::default();

        let mut clips = self.clips.write().await;

        for clip in clips.values_mut() {
            if clip.channel.online || clip.channel.viewers_current != 0 {
                let offline = clip.channel.offline();
                Arc::make_mut(clip).channel = offline;
            }
        }

        let expired: BTreeSet<String> = clips
            .iter()
            .filter(|(_, clip)| clip.is_expired(now))
            .map(|(id, _)| id.clone())
            .collect();
        for id in &expired {
            clips.remove(id);
        }
        summary.expired = expired.len();

        for incoming in batch {
            if incoming.is_expired(now) || expired.contains(&incoming.content_id) {
                continue;
            }
            match clips.get_mut(&incoming.content_id) {
                Some(existing) => {
                    let existing = Arc::make_mut(existing);
                    existing.view_count = incoming.view_count;
                    existing.channel = incoming.channel;
                    summary.updated += 1;
                }
                None => {
                    clips.insert(incoming.content_id.clone(), Arc::new(incoming));
                    summary.added += 1;
                }
            }
        }

        let clips = clips.downgrade();
        self.indices.rebuild(clips.values().map(|c| c.as_ref()), now);
        summary.total = clips.len();
        drop(clips);

        let duration = elapsed + started.elapsed();
        self.last_update.store(Arc::new(UpdateInfo {
            at: Some(now),
            duration,
        }));

        log::info!(
            "Merged clips: {} added, {} updated, {} expired, {} total ({}ms)",
            summary.added,
            summary.updated,
            summary.expired,
            summary.total,
            duration.as_millis()
        );
        summary
    }

    /// Walk one sorted view and return up to `limit` clips matching `filter`.
    ///
    /// `limit` is capped at [`MAX_QUERY_LIMIT`].
    pub fn query(&self, sort: SortType, limit: usize, filter: &ClipFilter) -> Vec<Arc<Clip>> {
        let limit = limit.min(MAX_QUERY_LIMIT);
        if limit == 0 {
            return Vec::new();
        }

        self.indices
            .load(sort)
            .iter()
            .filter(|clip| filter.matches(clip))
            .take(limit)
            .cloned()
            .collect()
    }

    /// Number of clips in the store, 0 if the store is busy.
    pub async fn clip_count(&self) -> usize {
        match timeout(self.housekeeping_timeout, self.clips.read()).await {
            Ok(clips) => clips.len(),
            Err(_) => 0,
        }
    }

    /// Distinct channels owning clips and how many of them are live.
    pub async fn channel_count(&self) -> ChannelCount {
        let Ok(clips) = timeout(self.housekeeping_timeout, self.clips.read()).await else {
            return ChannelCount::default();
        };

        let mut channels: BTreeMap<u64, bool> = BTreeMap::new();
        for clip in clips.values() {
            *channels.entry(clip.channel.id).or_default() |= clip.channel.online;
        }

        ChannelCount {
            total: channels.len(),
            online: channels.values().filter(|online| **online).count(),
        }
    }

    /// Clips uploaded within `window` of now.
    pub async fn clips_created_within(&self, window: chrono::Duration) -> usize {
        let Ok(clips) = timeout(self.housekeeping_timeout, self.clips.read()).await else {
            return 0;
        };
        let cutoff = Utc::now()
            .checked_sub_signed(window)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        clips.values().filter(|c| c.upload_date >= cutoff).count()
    }

    /// Copy of every stored clip, for backups.
    pub async fn snapshot_clips(&self) -> Vec<Clip> {
        let clips = self.clips.read().await;
        clips.values().map(|c| c.as_ref().clone()).collect()
    }

    /// Update the status line. See [`StatusLine::set`].
    pub fn set_status(&self, text: impl Into<String>, ttl: Option<Duration>) {
        self.status.set(text, ttl);
    }

    pub fn status(&self) -> String {
        self.status.get()
    }

    pub fn last_update(&self) -> UpdateInfo {
        **self.last_update.load()
    }
}
