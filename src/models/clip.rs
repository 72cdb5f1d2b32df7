//! Clip data structure.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Channel, nullable};

/// Locator type of the stream-playable rendition.
pub const HLS_LOCATOR: &str = "HlsStreaming";

/// Tag prefix linking a clip to a hype zone channel.
const HYPE_ZONE_PREFIX: &str = "HZ-";

/// One rendition of a clip.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ContentLocator {
    pub locator_type: String,
    pub uri: String,
}

/// A clip recorded from a live channel.
///
/// Deserializes straight from the upstream clip listing; the derived
/// fields (`game_title`, `clip_url`, `shareable_url`,
/// `hype_zone_channel_id`, `channel`) are filled in by the source client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Clip {
    /// Unique key
    pub content_id: String,

    #[serde(default, deserialize_with = "nullable")]
    pub title: String,

    #[serde(default)]
    pub view_count: u64,

    /// Game/type id
    #[serde(default)]
    pub type_id: u64,

    #[serde(default)]
    pub game_title: String,

    pub upload_date: DateTime<Utc>,

    pub expiration_date: DateTime<Utc>,

    #[serde(default)]
    pub duration_in_seconds: u32,

    #[serde(default)]
    pub content_maturity: u32,

    #[serde(default, deserialize_with = "nullable")]
    pub content_locators: Vec<ContentLocator>,

    #[serde(default, deserialize_with = "nullable")]
    pub tags: Vec<String>,

    /// Playable HLS url
    #[serde(default)]
    pub clip_url: String,

    #[serde(default, deserialize_with = "nullable")]
    pub shareable_id: String,

    #[serde(default)]
    pub shareable_url: String,

    /// 0 when the clip carries no hype zone tag
    #[serde(default)]
    pub hype_zone_channel_id: u64,

    #[serde(default)]
    pub channel: Channel,

    /// Time-decayed rank, recomputed on every merge
    #[serde(default)]
    pub rank: f64,
}

impl Clip {
    /// Whether the clip has passed its expiration date at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expiration_date
    }

    /// Uri of the first HLS locator, if any.
    pub fn hls_locator(&self) -> Option<&str> {
        self.content_locators
            .iter()
            .find(|l| l.locator_type == HLS_LOCATOR)
            .map(|l| l.uri.as_str())
    }

    /// Copy of this clip carrying the given rank.
    pub fn with_rank(&self, rank: f64) -> Self {
        Self {
            rank,
            ..self.clone()
        }
    }
}

/// Extract the hype zone channel id from a clip's tags.
///
/// The last `HZ-<integer>` tag wins; anything unparsable leaves 0.
/// Channel ids are non-negative, so a tag like `HZ--5` counts as unparsable.
pub fn parse_hype_zone(tags: &[String]) -> u64 {
    tags.iter()
        .filter_map(|tag| tag.strip_prefix(HYPE_ZONE_PREFIX))
        .filter_map(|id| id.parse::<u64>().ok())
        .last()
        .unwrap_or(0)
}
