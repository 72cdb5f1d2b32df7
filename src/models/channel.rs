//! Channel data structure.

use serde::{Deserialize, Serialize};

use super::nullable;

/// Language tag used when the upstream reports none.
pub const UNKNOWN_LANGUAGE: &str = "unknown";

/// A live channel as last seen by the crawler.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    /// Stable upstream identifier
    pub id: u64,

    /// Display name (the upstream calls it `token`)
    #[serde(alias = "token", default)]
    pub name: String,

    /// Whether the channel is currently broadcasting
    #[serde(default)]
    pub online: bool,

    /// Current viewer count
    #[serde(default)]
    pub viewers_current: u64,

    /// Partner program membership
    #[serde(default)]
    pub partnered: bool,

    /// Language tag, `unknown` when missing upstream
    #[serde(alias = "languageId", default, deserialize_with = "nullable")]
    pub language: String,

    /// Owning user id
    #[serde(default)]
    pub user_id: u64,

    /// Avatar URL derived from the user id
    #[serde(default)]
    pub avatar_url: String,
}

impl Channel {
    /// Copy of this channel marked offline with no viewers.
    pub fn offline(&self) -> Self {
        Self {
            online: false,
            viewers_current: 0,
            ..self.clone()
        }
    }

    /// Replace a missing language tag with [`UNKNOWN_LANGUAGE`].
    pub fn normalize_language(&mut self) {
        if self.language.trim().is_empty() {
            self.language = UNKNOWN_LANGUAGE.to_string();
        }
    }
}
