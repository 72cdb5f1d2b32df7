use std::str::FromStr;
use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::server::{AppState, JsonResult};
use crate::error::{AppError, Result};
use crate::models::{Clip, ClipFilter, DEFAULT_QUERY_LIMIT, MAX_QUERY_LIMIT, SortType};
use crate::pipeline::CrawlState;
use crate::utils::time::parse_time_filter;

/// Raw query string of `GET /api/v1/clips`.
///
/// Everything arrives as text so malformed values surface as a JSON 400
/// rather than an extractor rejection.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClipQueryParams {
    pub sort: Option<String>,
    pub limit: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub view_count_min: Option<String>,
    pub channel_id: Option<String>,
    pub channel_name: Option<String>,
    pub currently_live: Option<String>,
    pub partnered: Option<String>,
    pub game_id: Option<String>,
    pub game_title: Option<String>,
    pub hype_zone_channel_id: Option<String>,
    pub language: Option<String>,
}

/// A validated clip query.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipQuery {
    pub sort: SortType,
    pub limit: usize,
    pub filter: ClipFilter,
}

impl ClipQueryParams {
    /// Validate the parameters, resolving relative times against `now`.
    pub fn into_query(self, now: DateTime<Utc>) -> Result<ClipQuery> {
        let sort = match present(&self.sort) {
            Some(sort) => sort.parse()?,
            None => SortType::default(),
        };

        let limit = match present(&self.limit) {
            Some(limit) => {
                let limit: i64 = parse_number("limit", limit)?;
                limit.clamp(0, MAX_QUERY_LIMIT as i64) as usize
            }
            None => DEFAULT_QUERY_LIMIT,
        };

        let time = |value: &Option<String>| -> Result<Option<DateTime<Utc>>> {
            present(value)
                .map(|v| parse_time_filter(v, now))
                .transpose()
        };

        let filter = ClipFilter {
            channel_id: parse_opt("channelId", &self.channel_id)?,
            channel_name: self.channel_name,
            game_title: self.game_title,
            game_id: parse_opt("gameId", &self.game_id)?,
            from: time(&self.from)?,
            to: time(&self.to)?,
            view_count_min: parse_opt("viewCountMin", &self.view_count_min)?,
            partnered: parse_flag("partnered", &self.partnered)?,
            currently_live: parse_flag("currentlyLive", &self.currently_live)?,
            hype_zone_channel_id: parse_opt("hypeZoneChannelId", &self.hype_zone_channel_id)?,
            language: self.language,
        };

        Ok(ClipQuery {
            sort,
            limit,
            filter,
        })
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn parse_number<T: FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| AppError::invalid_query(format!("invalid {name} '{value}'")))
}

fn parse_opt<T: FromStr>(name: &str, value: &Option<String>) -> Result<Option<T>> {
    present(value).map(|v| parse_number(name, v)).transpose()
}

fn parse_flag(name: &str, value: &Option<String>) -> Result<Option<bool>> {
    present(value)
        .map(|v| match v.to_lowercase().as_str() {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            _ => Err(AppError::invalid_query(format!(
                "invalid {name} '{v}', expected true or false"
            ))),
        })
        .transpose()
}

pub async fn query_clips(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ClipQueryParams>,
) -> JsonResult<Vec<Arc<Clip>>> {
    let query = params.into_query(Utc::now())?;
    Ok(Json(state.store.query(
        query.sort,
        query.limit,
        &query.filter,
    )))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub status: String,
    pub clips: usize,
    pub channels: usize,
    pub online_channels: usize,
    pub clips_last_hour: usize,
    pub last_update: Option<DateTime<Utc>>,
    pub last_update_duration_ms: u64,
    pub last_backup: Option<DateTime<Utc>>,
    pub crawler_state: Option<CrawlState>,
}

pub async fn status(State(state): State<Arc<AppState>>) -> JsonResult<StatusResponse> {
    let store = &state.store;
    let channels = store.channel_count().await;
    let update = store.last_update();

    Ok(Json(StatusResponse {
        status: store.status(),
        clips: store.clip_count().await,
        channels: channels.total,
        online_channels: channels.online,
        clips_last_hour: store.clips_created_within(chrono::Duration::hours(1)).await,
        last_update: update.at,
        last_update_duration_ms: update.duration.as_millis() as u64,
        last_backup: state.keeper.as_ref().and_then(|k| k.last_backup()),
        crawler_state: state.crawler.as_ref().map(|c| c.state()),
    }))
}
