//! Query types for the clip index.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

use super::Clip;

/// Largest result set a single query may return.
pub const MAX_QUERY_LIMIT: usize = 1000;

/// Result set size when the caller does not ask for one.
pub const DEFAULT_QUERY_LIMIT: usize = 100;

/// Ordering of a query result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortType {
    #[default]
    ViewCount,
    Rank,
    MostRecent,
}

impl SortType {
    pub const ALL: [SortType; 3] = [SortType::ViewCount, SortType::Rank, SortType::MostRecent];
}

impl FromStr for SortType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "0" | "views" | "viewcount" => Ok(SortType::ViewCount),
            "1" | "rank" => Ok(SortType::Rank),
            "2" | "recent" | "mostrecent" => Ok(SortType::MostRecent),
            other => Err(AppError::invalid_query(format!(
                "unknown sort type '{other}', expected viewCount=0, rank=1, mostRecent=2"
            ))),
        }
    }
}

impl fmt::Display for SortType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SortType::ViewCount => "viewCount",
            SortType::Rank => "rank",
            SortType::MostRecent => "mostRecent",
        };
        f.write_str(name)
    }
}

/// Filters applied while walking an index. All set fields must match.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClipFilter {
    pub channel_id: Option<u64>,
    /// Case-insensitive substring of the channel name
    pub channel_name: Option<String>,
    /// Case-insensitive substring of the game title
    pub game_title: Option<String>,
    pub game_id: Option<u64>,
    /// Inclusive lower bound on upload time
    pub from: Option<DateTime<Utc>>,
    /// Inclusive upper bound on upload time
    pub to: Option<DateTime<Utc>>,
    pub view_count_min: Option<u64>,
    pub partnered: Option<bool>,
    pub currently_live: Option<bool>,
    pub hype_zone_channel_id: Option<u64>,
    /// Case-insensitive exact language tag
    pub language: Option<String>,
}

impl ClipFilter {
    /// Check a clip against every set filter.
    pub fn matches(&self, clip: &Clip) -> bool {
        if let Some(id) = self.channel_id {
            if clip.channel.id != id {
                return false;
            }
        }
        if let Some(name) = non_blank(&self.channel_name) {
            if !contains_ignore_case(&clip.channel.name, name) {
                return false;
            }
        }
        if let Some(title) = non_blank(&self.game_title) {
            if !contains_ignore_case(&clip.game_title, title) {
                return false;
            }
        }
        if let Some(game_id) = self.game_id {
            if clip.type_id != game_id {
                return false;
            }
        }
        if let Some(from) = self.from {
            if clip.upload_date < from {
                return false;
            }
        }
        if let Some(to) = self.to {
            if clip.upload_date > to {
                return false;
            }
        }
        if let Some(min) = self.view_count_min {
            if clip.view_count < min {
                return false;
            }
        }
        if let Some(partnered) = self.partnered {
            if clip.channel.partnered != partnered {
                return false;
            }
        }
        if let Some(live) = self.currently_live {
            if clip.channel.online != live {
                return false;
            }
        }
        if let Some(hype_zone) = self.hype_zone_channel_id {
            if clip.hype_zone_channel_id != hype_zone {
                return false;
            }
        }
        if let Some(language) = non_blank(&self.language) {
            if !clip.channel.language.eq_ignore_ascii_case(language.trim()) {
                return false;
            }
        }
        true
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.trim().is_empty())
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Channel;

    fn sample_clip() -> Clip {
        Clip {
            content_id: "c1".into(),
            view_count: 1500,
            type_id: 3,
            game_title: "Space Racers".into(),
            upload_date: Utc::now(),
            channel: Channel {
                id: 10,
                name: "SpeedyGonzo".into(),
                online: true,
                partnered: true,
                language: "en".into(),
                ..Channel::default()
            },
            ..Clip::default()
        }
    }

    #[test]
    fn test_sort_type_from_str() {
        assert_eq!("0".parse::<SortType>().unwrap(), SortType::ViewCount);
        assert_eq!("rank".parse::<SortType>().unwrap(), SortType::Rank);
        assert_eq!("mostRecent".parse::<SortType>().unwrap(), SortType::MostRecent);
        assert!("7".parse::<SortType>().unwrap_err().is_client_error());
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        assert!(ClipFilter::default().matches(&sample_clip()));
    }

    #[test]
    fn test_substring_filters_ignore_case() {
        let clip = sample_clip();
        let filter = ClipFilter {
            channel_name: Some("gonzo".into()),
            game_title: Some("RACERS".into()),
            language: Some("EN".into()),
            ..ClipFilter::default()
        };
        assert!(filter.matches(&clip));

        let filter = ClipFilter {
            channel_name: Some("nobody".into()),
            ..ClipFilter::default()
        };
        assert!(!filter.matches(&clip));
    }

    #[test]
    fn test_blank_strings_are_ignored() {
        let filter = ClipFilter {
            channel_name: Some("   ".into()),
            language: Some(String::new()),
            ..ClipFilter::default()
        };
        assert!(filter.matches(&sample_clip()));
    }

    #[test]
    fn test_filters_combine_with_and() {
        let clip = sample_clip();
        let filter = ClipFilter {
            view_count_min: Some(1000),
            partnered: Some(true),
            ..ClipFilter::default()
        };
        assert!(filter.matches(&clip));

        let filter = ClipFilter {
            view_count_min: Some(1000),
            partnered: Some(false),
            ..ClipFilter::default()
        };
        assert!(!filter.matches(&clip));
    }

    #[test]
    fn test_time_bounds_are_inclusive() {
        let clip = sample_clip();
        let filter = ClipFilter {
            from: Some(clip.upload_date),
            to: Some(clip.upload_date),
            ..ClipFilter::default()
        };
        assert!(filter.matches(&clip));

        let filter = ClipFilter {
            to: Some(clip.upload_date - chrono::Duration::seconds(1)),
            ..ClipFilter::default()
        };
        assert!(!filter.matches(&clip));
    }
}
