//! ============================================================================
//! Leaderboard Aggregator
//! ============================================================================
//! Read-only aggregation pipeline over the score feeds:
//! - Ranking by total score (stable on ties)
//! - Gap-free calendar range and cumulative per-user series
//! - Concurrent per-user item detail fetches, fault-isolated per user
//! - Deterministic display colors per user
//! ============================================================================

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::Result;
use chrono::NaiveDate;
use futures_util::future::join_all;
use tracing::{debug, warn};

use crate::api::ScoreApi;
use crate::basket::Basket;
use crate::catalog::Catalog;
use crate::types::{DailyScore, Item, ScoreMap, User};

/// One user's resolved submissions, keyed by ISO date.
pub type UserDailyItems = BTreeMap<String, Vec<Item>>;

/// One line of the cumulative chart.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartSeries {
    pub uid: String,
    pub name: String,
    /// CSS `hsl(...)` color, stable across reloads.
    pub color: String,
    /// Cumulative score per date in [`LeaderboardChart::dates`] order.
    pub points: Vec<i64>,
}

/// Chart-ready dataset built from the daily feed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LeaderboardChart {
    pub dates: Vec<String>,
    pub series: Vec<ChartSeries>,
}

/// Sort totals descending. Ties keep the server's fetch order (stable).
pub fn rank_users(mut users: Vec<User>) -> Vec<User> {
    users.sort_by(|a, b| b.total_score.cmp(&a.total_score));
    users
}

/// Distinct (uid, name) pairs from the daily feed, first occurrence wins.
pub fn user_entries(daily: &[DailyScore]) -> Vec<(String, String)> {
    let mut seen = HashSet::new();
    let mut entries = Vec::new();
    for score in daily {
        if seen.insert(score.uid.clone()) {
            entries.push((score.uid.clone(), score.name.clone()));
        }
    }
    entries
}

/// Every calendar day from the earliest to the latest observed date,
/// inclusive. Unparseable dates are dropped with a warning.
pub fn date_range(daily: &[DailyScore]) -> Vec<String> {
    let mut parsed: Vec<NaiveDate> = daily
        .iter()
        .filter_map(|score| match NaiveDate::parse_from_str(&score.date, "%Y-%m-%d") {
            Ok(date) => Some(date),
            Err(_) => {
                warn!("Skipping unparseable date {:?}", score.date);
                None
            }
        })
        .collect();
    parsed.sort();

    let (Some(&first), Some(&last)) = (parsed.first(), parsed.last()) else {
        return Vec::new();
    };

    let mut dates = Vec::new();
    let mut cursor = first;
    while cursor <= last {
        dates.push(cursor.format("%Y-%m-%d").to_string());
        match cursor.succ_opt() {
            Some(next) => cursor = next,
            None => break,
        }
    }
    dates
}

/// Running cumulative sum for one user across the full range, in
/// chronological order. Gap days carry the prior value forward.
pub fn cumulative_series(daily: &[DailyScore], uid: &str, dates: &[String]) -> Vec<i64> {
    let mut by_date: HashMap<&str, i64> = HashMap::new();
    for score in daily.iter().filter(|s| s.uid == uid) {
        by_date.insert(score.date.as_str(), score.daily_score);
    }

    let mut cumulative = 0;
    dates
        .iter()
        .map(|date| {
            cumulative += by_date.get(date.as_str()).copied().unwrap_or(0);
            cumulative
        })
        .collect()
}

/// Deterministic per-user color: a hash of the uid plus the dataset index,
/// so colors survive reloads but diverge for users with similar uids.
pub fn uid_color(uid: &str, index: usize) -> String {
    let hash: u32 = uid.chars().map(|c| c as u32).fold(0, u32::wrapping_add);
    let hue = (hash.wrapping_add(index as u32 * 137)) % 360;
    format!("hsl({}, 70%, 50%)", hue)
}

/// Build the cumulative line-chart dataset from the daily feed.
pub fn build_chart(daily: &[DailyScore]) -> LeaderboardChart {
    let dates = date_range(daily);
    let series = user_entries(daily)
        .into_iter()
        .enumerate()
        .map(|(index, (uid, name))| {
            let points = cumulative_series(daily, &uid, &dates);
            let color = uid_color(&uid, index);
            ChartSeries {
                uid,
                name,
                color,
                points,
            }
        })
        .collect();
    LeaderboardChart { dates, series }
}

// ============================================================================
// Per-User Item Details
// ============================================================================

/// Fetches each user's date -> items map for hover/detail views.
///
/// Loads run concurrently and settle independently: one user's failure
/// leaves that user without detail but never disturbs the others. A
/// generation counter supersedes in-flight loads; results of a stale load
/// are discarded instead of overwriting newer state.
pub struct ItemDetailLoader {
    api: Arc<ScoreApi>,
    generation: AtomicU64,
}

impl ItemDetailLoader {
    pub fn new(api: Arc<ScoreApi>) -> Self {
        Self {
            api,
            generation: AtomicU64::new(0),
        }
    }

    /// Start a new load generation, superseding any load still in flight.
    fn begin(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    /// Fetch details for every uid. `None` means this load was superseded
    /// by a newer one and its results must not be applied.
    pub async fn load(
        &self,
        uids: &[String],
        catalog: &Catalog,
    ) -> Option<HashMap<String, UserDailyItems>> {
        let generation = self.begin();

        let fetches = uids.iter().map(|uid| {
            let api = Arc::clone(&self.api);
            let uid = uid.clone();
            async move {
                let result = api.user_scores_by_date(&uid).await;
                (uid, result)
            }
        });
        let results = join_all(fetches).await;

        if !self.is_current(generation) {
            debug!("Discarding superseded item detail load {}", generation);
            return None;
        }

        Some(merge_user_items(results, catalog))
    }
}

/// Settle the per-user results: failures are logged and yield no entry for
/// that user, so the rest of the aggregation still renders.
fn merge_user_items(
    results: Vec<(String, Result<ScoreMap>)>,
    catalog: &Catalog,
) -> HashMap<String, UserDailyItems> {
    let mut merged = HashMap::new();
    for (uid, result) in results {
        match result {
            Ok(map) => {
                let daily = map
                    .iter()
                    .map(|(date, joined)| (date.clone(), resolve_day(joined, catalog)))
                    .collect();
                merged.insert(uid, daily);
            }
            Err(e) => {
                warn!("Item detail fetch failed for {}: {}", uid, e);
            }
        }
    }
    merged
}

fn resolve_day(joined: &str, catalog: &Catalog) -> Vec<Item> {
    Basket::from_joined(joined)
        .resolve(catalog)
        .into_iter()
        .cloned()
        .collect()
}

/// All items one user acquired on or before the cutoff date, deduplicated
/// by id in first-seen order. No cutoff means everything counts.
pub fn aggregate_items_through(daily: &UserDailyItems, cutoff: Option<&str>) -> Vec<Item> {
    let mut seen = HashSet::new();
    let mut items = Vec::new();
    for (date, day_items) in daily {
        if cutoff.is_some_and(|c| date.as_str() > c) {
            continue;
        }
        for item in day_items {
            if seen.insert(item.id.clone()) {
                items.push(item.clone());
            }
        }
    }
    items
}

/// Per-date history for one user, resolved through the catalog. The
/// history page shows only dates strictly before the cutoff (the
/// aggregate above is inclusive; both match the event's published views).
pub fn visible_history(
    scores: &ScoreMap,
    cutoff: Option<&str>,
    catalog: &Catalog,
) -> Vec<(String, Vec<Item>)> {
    scores
        .iter()
        .filter(|(date, _)| cutoff.map_or(true, |c| date.as_str() < c))
        .map(|(date, joined)| (date.clone(), resolve_day(joined, catalog)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ItemDetails;
    use anyhow::anyhow;

    fn daily(uid: &str, date: &str, score: i64) -> DailyScore {
        DailyScore {
            uid: uid.to_string(),
            name: format!("name-{}", uid),
            date: date.to_string(),
            daily_score: score,
        }
    }

    fn user(uid: &str, total: i64) -> User {
        User {
            uid: uid.to_string(),
            name: format!("name-{}", uid),
            total_score: total,
        }
    }

    fn item(id: &str) -> Item {
        Item {
            id: id.to_string(),
            name: format!("item {}", id),
            img: format!("https://cdn/{}.jpg", id),
            dtype: 0,
            details: ItemDetails::default(),
        }
    }

    #[test]
    fn test_rank_descending_stable_on_ties() {
        let ranked = rank_users(vec![user("a", 5), user("b", 9), user("c", 5), user("d", 7)]);
        let order: Vec<&str> = ranked.iter().map(|u| u.uid.as_str()).collect();
        assert_eq!(order, ["b", "d", "a", "c"]);
    }

    #[test]
    fn test_cumulative_carries_over_gap_days() {
        let feed = vec![daily("u1", "2024-05-01", 3), daily("u1", "2024-05-03", 2)];
        let dates = date_range(&feed);
        assert_eq!(dates, ["2024-05-01", "2024-05-02", "2024-05-03"]);
        assert_eq!(cumulative_series(&feed, "u1", &dates), [3, 3, 5]);
    }

    #[test]
    fn test_date_range_spans_month_boundary() {
        let feed = vec![daily("u1", "2024-04-29", 1), daily("u1", "2024-05-02", 1)];
        assert_eq!(
            date_range(&feed),
            ["2024-04-29", "2024-04-30", "2024-05-01", "2024-05-02"]
        );
    }

    #[test]
    fn test_date_range_empty_feed() {
        assert!(date_range(&[]).is_empty());
    }

    #[test]
    fn test_chart_one_point_per_user_per_day() {
        let feed = vec![
            daily("u1", "2024-05-01", 3),
            daily("u2", "2024-05-02", 4),
            daily("u1", "2024-05-03", 2),
        ];
        let chart = build_chart(&feed);
        assert_eq!(chart.dates.len(), 3);
        assert_eq!(chart.series.len(), 2);
        for series in &chart.series {
            assert_eq!(series.points.len(), chart.dates.len());
        }
        assert_eq!(chart.series[0].uid, "u1");
        assert_eq!(chart.series[0].points, [3, 3, 5]);
        assert_eq!(chart.series[1].points, [0, 4, 4]);
    }

    #[test]
    fn test_uid_color_stable_and_distinct_for_similar_uids() {
        assert_eq!(uid_color("u1", 0), uid_color("u1", 0));
        // Same dataset, adjacent indices: similar uids must not collide.
        assert_ne!(uid_color("user1", 0), uid_color("user2", 1));
    }

    #[test]
    fn test_merge_isolates_one_users_failure() {
        let catalog = Catalog::new(vec![item("a"), item("b")]);
        let ok_map: ScoreMap = [("2024-05-01".to_string(), "a,b".to_string())]
            .into_iter()
            .collect();
        let results = vec![
            ("u1".to_string(), Ok(ok_map)),
            ("u2".to_string(), Err(anyhow!("connection reset"))),
        ];

        let merged = merge_user_items(results, &catalog);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged["u1"]["2024-05-01"].len(), 2);
        assert!(!merged.contains_key("u2"));
    }

    #[test]
    fn test_aggregate_dedups_and_respects_inclusive_cutoff() {
        let catalog = Catalog::new(vec![item("a"), item("b"), item("c")]);
        let mut daily_items = UserDailyItems::new();
        daily_items.insert("2024-05-01".into(), resolve_day("a,b", &catalog));
        daily_items.insert("2024-05-02".into(), resolve_day("b,c", &catalog));
        daily_items.insert("2024-05-03".into(), resolve_day("a", &catalog));

        let through = aggregate_items_through(&daily_items, Some("2024-05-02"));
        let ids: Vec<&str> = through.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, ["a", "b", "c"]);

        let all = aggregate_items_through(&daily_items, None);
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn test_history_is_strictly_before_cutoff() {
        let catalog = Catalog::new(vec![item("a")]);
        let scores: ScoreMap = [
            ("2024-05-01".to_string(), "a".to_string()),
            ("2024-05-02".to_string(), "a".to_string()),
        ]
        .into_iter()
        .collect();

        let visible = visible_history(&scores, Some("2024-05-02"), &catalog);
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].0, "2024-05-01");
    }

    #[test]
    fn test_newer_generation_supersedes_older() {
        let api = Arc::new(ScoreApi::new("http://127.0.0.1:9").unwrap());
        let loader = ItemDetailLoader::new(api);

        let first = loader.begin();
        let second = loader.begin();
        assert!(!loader.is_current(first));
        assert!(loader.is_current(second));
    }

    #[tokio::test]
    async fn test_current_load_applies() {
        let api = Arc::new(ScoreApi::new("http://127.0.0.1:9").unwrap());
        let loader = ItemDetailLoader::new(api);
        let catalog = Catalog::new(Vec::new());

        // No uids means no network traffic; the load settles immediately
        // and, being the latest generation, its (empty) result applies.
        let result = loader.load(&[], &catalog).await;
        assert_eq!(result, Some(HashMap::new()));
    }
}
