// src/pipeline/crawl.rs

//! Clip crawl loop.

use std::fmt;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, Result};
use crate::models::{Clip, Config};
use crate::services::SourceClient;
use crate::storage::SnapshotKeeper;
use crate::store::{ClipStore, MergeSummary};
use crate::utils::time::format_duration;

/// How long a failed cycle stays on the status line.
pub const ERROR_STATUS_TTL: Duration = Duration::from_secs(30);

/// What the crawl loop is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CrawlState {
    #[default]
    Idle,
    Fetching,
    Merging,
    Sleeping,
}

impl fmt::Display for CrawlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CrawlState::Idle => "idle",
            CrawlState::Fetching => "fetching",
            CrawlState::Merging => "merging",
            CrawlState::Sleeping => "sleeping",
        };
        f.write_str(name)
    }
}

/// Polls the source and folds what it finds into the store.
pub struct Crawler {
    config: Config,
    source: Arc<SourceClient>,
    store: Arc<ClipStore>,
    keeper: Option<Arc<SnapshotKeeper>>,
    state: RwLock<CrawlState>,
}

impl Crawler {
    pub fn new(
        config: Config,
        source: Arc<SourceClient>,
        store: Arc<ClipStore>,
        keeper: Option<Arc<SnapshotKeeper>>,
    ) -> Self {
        Self {
            config,
            source,
            store,
            keeper,
            state: RwLock::new(CrawlState::Idle),
        }
    }

    pub fn state(&self) -> CrawlState {
        self.state.read().map(|s| *s).unwrap_or_default()
    }

    /// Restore the last snapshot, then crawl until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) {
        if let Some(keeper) = &self.keeper {
            self.store.set_status("Restoring clips", None);
            keeper.restore(&self.store).await;
        }

        while !cancel.is_cancelled() {
            match self.run_once_until(&cancel).await {
                Ok(_) => {}
                Err(AppError::Cancelled) => break,
                Err(e) => {
                    log::error!("Crawl cycle failed: {}", e);
                    self.store.set_status(
                        format!("Failed to update clips: {e}"),
                        Some(ERROR_STATUS_TTL),
                    );
                }
            }

            if cancel.is_cancelled() {
                break;
            }
            self.sleep_until_next_cycle(&cancel).await;
        }

        self.set_state(CrawlState::Idle);
        log::info!("Crawler stopped");
    }

    /// Run one fetch and merge cycle.
    pub async fn run_once(&self) -> Result<MergeSummary> {
        self.run_once_until(&CancellationToken::new()).await
    }

    /// Run one cycle, abandoning the fetch as soon as `cancel` fires.
    ///
    /// In-flight requests and rate limit backoffs are dropped. A cancelled
    /// cycle merges nothing and returns [`AppError::Cancelled`].
    pub async fn run_once_until(&self, cancel: &CancellationToken) -> Result<MergeSummary> {
        let started = Instant::now();

        self.set_state(CrawlState::Fetching);
        let batch = match self.fetch_batch(cancel).await {
            Ok(batch) => batch,
            Err(e) => {
                if matches!(e, AppError::Cancelled) {
                    log::info!("Crawl cycle cancelled during fetch");
                }
                self.set_state(CrawlState::Idle);
                return Err(e);
            }
        };

        self.set_state(CrawlState::Merging);
        self.store.set_status("Updating clips", None);
        let summary = self.store.merge(batch, started.elapsed()).await;

        if let Some(keeper) = &self.keeper {
            keeper.backup_if_due(&self.store).await;
        }

        self.set_state(CrawlState::Idle);
        Ok(summary)
    }

    /// Gather clips from every discovered channel.
    ///
    /// A channel whose clips cannot be fetched is skipped. Discovery and
    /// each channel fetch race against `cancel`.
    async fn fetch_batch(&self, cancel: &CancellationToken) -> Result<Vec<Clip>> {
        let min_viewers = self.config.crawler.effective_min_viewers();
        let summary_ttl = self.config.crawler.summary_status_ttl();
        self.store.set_status("Discovering live channels", None);

        let started = Instant::now();
        let discovery = self
            .source
            .discover_online_channels(min_viewers, self.config.source.language.as_deref());
        let discovered = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AppError::Cancelled),
            result = discovery => result,
        };
        let channels = discovered.map_err(|e| AppError::crawl("channel discovery", e))?;

        log::info!(
            "Found {} online channels with at least {} viewers",
            channels.len(),
            min_viewers
        );
        self.store.set_status(
            format!(
                "Found {} online channels in {}",
                channels.len(),
                format_duration(started.elapsed())
            ),
            summary_ttl,
        );

        let started = Instant::now();
        let progress_every = self.config.crawler.progress_every.max(1);
        let mut batch = Vec::new();
        for (i, channel) in channels.iter().enumerate() {
            if i % progress_every == 0 {
                self.store.set_status(
                    format!("Fetching clips {}/{} channels", i, channels.len()),
                    None,
                );
            }

            let fetched = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(AppError::Cancelled),
                result = self.source.fetch_clips(channel) => result,
            };
            match fetched {
                Ok(clips) => batch.extend(clips),
                Err(e) => log::warn!("Failed to fetch clips for channel {}: {}", channel.id, e),
            }
        }

        log::info!(
            "Fetched {} clips from {} channels",
            batch.len(),
            channels.len()
        );
        self.store.set_status(
            format!(
                "Found {} clips in {}",
                batch.len(),
                format_duration(started.elapsed())
            ),
            summary_ttl,
        );
        Ok(batch)
    }

    async fn sleep_until_next_cycle(&self, cancel: &CancellationToken) {
        self.set_state(CrawlState::Sleeping);
        let deadline = Instant::now() + self.config.crawler.cycle_interval();
        let refresh = self.config.crawler.status_refresh().max(Duration::from_millis(10));

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            self.store.set_status(
                format!("Next update in {}", format_duration(remaining)),
                None,
            );

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(remaining.min(refresh)) => {}
            }
        }
    }

    fn set_state(&self, state: CrawlState) {
        if let Ok(mut current) = self.state.write() {
            *current = state;
        }
    }
}
