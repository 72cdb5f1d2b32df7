// src/models/mod.rs

//! Domain models for the clip indexer.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod channel;
mod clip;
mod config;
mod query;

use serde::{Deserialize, Deserializer};

// Re-export all public types
pub use channel::{Channel, UNKNOWN_LANGUAGE};
pub use clip::{Clip, ContentLocator, HLS_LOCATOR, parse_hype_zone};
pub use config::{
    Config, CrawlerConfig, Environment, ServerConfig, SourceConfig, StorageBackend,
    StorageConfig, StoreConfig,
};
pub use query::{ClipFilter, DEFAULT_QUERY_LIMIT, MAX_QUERY_LIMIT, SortType};

/// Number of distinct channels in the store and how many are live.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct ChannelCount {
    pub total: usize,
    pub online: usize,
}

/// Deserialize a field the upstream may send as `null` into its default.
pub(crate) fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
