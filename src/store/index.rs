//! Ranking and the sorted views published by the store.

use std::cmp::Ordering;
use std::sync::Arc;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};

use crate::models::{Clip, SortType};

/// Ages below this are treated as this old so fresh clips don't spike.
pub const MIN_RANK_AGE_SECS: i64 = 10 * 60;

const SECS_PER_DAY: f64 = 86_400.0;

/// Time-decayed popularity of a clip at `now`.
///
/// `view_count / age_days^1.5`, with the age floored at ten minutes.
pub fn compute_rank(view_count: u64, upload_date: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let age_secs = (now - upload_date).num_seconds().max(MIN_RANK_AGE_SECS);
    let age_days = age_secs as f64 / SECS_PER_DAY;
    view_count as f64 / age_days.powf(1.5)
}

type View = Vec<Arc<Clip>>;

/// The three published orderings of the clip set.
pub struct Indices {
    by_views: ArcSwap<View>,
    by_rank: ArcSwap<View>,
    by_recent: ArcSwap<View>,
}

impl Indices {
    pub fn new() -> Self {
        Self {
            by_views: ArcSwap::from_pointee(Vec::new()),
            by_rank: ArcSwap::from_pointee(Vec::new()),
            by_recent: ArcSwap::from_pointee(Vec::new()),
        }
    }

    /// Current snapshot of one ordering.
    pub fn load(&self, sort: SortType) -> Arc<View> {
        self.slot(sort).load_full()
    }

    /// Re-rank `clips` at `now` and publish every ordering.
    ///
    /// The input order is kept for ties.
    pub fn rebuild<'a, I>(&self, clips: I, now: DateTime<Utc>)
    where
        I: IntoIterator<Item = &'a Clip>,
    {
        let ranked: View = clips
            .into_iter()
            .map(|clip| {
                let rank = compute_rank(clip.view_count, clip.upload_date, now);
                Arc::new(clip.with_rank(rank))
            })
            .collect();

        for sort in SortType::ALL {
            let mut view = ranked.clone();
            view.sort_by(|a, b| compare(sort, a, b));
            self.slot(sort).store(Arc::new(view));
        }
    }

    fn slot(&self, sort: SortType) -> &ArcSwap<View> {
        match sort {
            SortType::ViewCount => &self.by_views,
            SortType::Rank => &self.by_rank,
            SortType::MostRecent => &self.by_recent,
        }
    }
}

impl Default for Indices {
    fn default() -> Self {
        Self::new()
    }
}

/// Descending order for the given sort key.
fn compare(sort: SortType, a: &Clip, b: &Clip) -> Ordering {
    match sort {
        SortType::ViewCount => b.view_count.cmp(&a.view_count),
        SortType::Rank => b.rank.total_cmp(&a.rank),
        SortType::MostRecent => b.upload_date.cmp(&a.upload_date),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn clip(id: &str, views: u64, age: Duration, now: DateTime<Utc>) -> Clip {
        Clip {
            content_id: id.into(),
            view_count: views,
            upload_date: now - age,
            ..Clip::default()
        }
    }

    #[test]
    fn test_rank_at_one_day() {
        let now = Utc::now();
        let rank = compute_rank(500, now - Duration::days(1), now);
        assert!((rank - 500.0).abs() < 1e-9);
    }

    #[test]
    fn test_rank_floor_for_fresh_clips() {
        let now = Utc::now();
        let fresh = compute_rank(100, now - Duration::minutes(1), now);
        let floor = compute_rank(100, now - Duration::minutes(10), now);
        let future = compute_rank(100, now + Duration::hours(1), now);
        assert_eq!(fresh, floor);
        assert_eq!(future, floor);
        assert!(fresh.is_finite());
    }

    #[test]
    fn test_rank_monotonicity() {
        let now = Utc::now();
        let upload = now - Duration::hours(5);
        assert!(compute_rank(11, upload, now) > compute_rank(10, upload, now));
        assert!(
            compute_rank(10, now - Duration::hours(1), now)
                > compute_rank(10, now - Duration::hours(2), now)
        );
        assert_eq!(compute_rank(0, upload, now), 0.0);
    }

    #[test]
    fn test_rebuild_orders_every_view() {
        let now = Utc::now();
        let clips = vec![
            clip("old-popular", 5000, Duration::days(20), now),
            clip("new-small", 50, Duration::hours(1), now),
            clip("mid", 800, Duration::days(1), now),
        ];
        let indices = Indices::new();
        indices.rebuild(&clips, now);

        let ids = |sort: SortType| -> Vec<String> {
            indices
                .load(sort)
                .iter()
                .map(|c| c.content_id.clone())
                .collect()
        };
        assert_eq!(ids(SortType::ViewCount), ["old-popular", "mid", "new-small"]);
        assert_eq!(ids(SortType::Rank), ["new-small", "mid", "old-popular"]);
        assert_eq!(ids(SortType::MostRecent), ["new-small", "mid", "old-popular"]);

        let rank = indices.load(SortType::Rank);
        assert!(rank.windows(2).all(|w| w[0].rank >= w[1].rank));
        assert!(rank.iter().all(|c| c.rank > 0.0));
    }

    #[test]
    fn test_ties_keep_input_order() {
        let now = Utc::now();
        let clips = vec![
            clip("a", 10, Duration::hours(1), now),
            clip("b", 10, Duration::hours(2), now),
            clip("c", 10, Duration::hours(3), now),
        ];
        let indices = Indices::new();
        indices.rebuild(&clips, now);
        let ids: Vec<_> = indices
            .load(SortType::ViewCount)
            .iter()
            .map(|c| c.content_id.clone())
            .collect();
        assert_eq!(ids, ["a", "b", "c"]);
    }

    #[test]
    fn test_old_snapshot_survives_rebuild() {
        let now = Utc::now();
        let indices = Indices::new();
        indices.rebuild(&[clip("a", 1, Duration::hours(1), now)], now);
        let held = indices.load(SortType::ViewCount);

        indices.rebuild(&Vec::<Clip>::new(), now);
        assert_eq!(held.len(), 1);
        assert!(indices.load(SortType::ViewCount).is_empty());
    }
}
