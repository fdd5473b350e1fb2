pub mod store;
pub mod windows;

use sqlx::PgPool;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::db::errors::{DatabaseError, Result};
use crate::db::read_ops;
use crate::models::api::LeaderboardEntry;
use crate::models::records::ScoreAggregateRow;
use store::{CacheResult, MemberMeta, RankingStore};
use windows::{bucket_id, window_start, Window};

pub use store::{CacheError, MemoryRankingStore};
pub use windows::Window as LeaderboardWindow;

const MAX_FETCH_LIMIT: usize = 100;

/// Everything the leaderboard needs to know about one submitted play.
#[derive(Debug, Clone)]
pub struct PlayResultEvent {
    pub puzzle_id: i64,
    pub subject_key: String,
    pub author_key: String,
    pub mode: String,
    pub final_score: i64,
    pub time_ms: i64,
    pub combo: i32,
    pub perfect: bool,
}

/// One ranking-query interface over two interchangeable sources: the
/// sorted-set cache when it has data, raw score aggregation when it does
/// not. Callers never see which side answered.
#[derive(Clone)]
pub struct LeaderboardService {
    store: Arc<dyn RankingStore>,
    clock: Arc<dyn Clock>,
}

impl LeaderboardService {
    pub fn new(store: Arc<dyn RankingStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Fold a play result into every applicable window: increment the
    /// member's cumulative score (deliberately a running sum, not the
    /// best-of kept in `scores`) and overwrite the metadata snapshot.
    /// Cache failures are logged and absorbed; submission never fails
    /// because the cache is down.
    pub fn record_play_result(&self, event: &PlayResultEvent) {
        let now = self.clock.now();
        for window in [Window::Global, Window::Weekly, Window::Monthly, Window::Author] {
            let bucket = bucket_id(window, &event.mode, Some(&event.author_key), now);
            if let Err(e) = self.apply(&bucket, window, event) {
                warn!(bucket = %bucket, "Leaderboard cache update skipped: {}", e);
            }
        }
    }

    fn apply(&self, bucket: &str, window: Window, event: &PlayResultEvent) -> CacheResult<()> {
        self.store
            .increment_score(bucket, &event.subject_key, event.final_score)?;
        self.store.put_meta(
            bucket,
            &event.subject_key,
            MemberMeta {
                last_score: event.final_score,
                time_ms: event.time_ms,
                combo: event.combo,
                perfect: event.perfect,
                mode: event.mode.clone(),
                updated_at: self.clock.now(),
            },
        )?;
        if let Some(ttl) = window.ttl() {
            self.store.expire(bucket, ttl)?;
        }
        Ok(())
    }

    /// Top-N for a window. Falls back to raw aggregation when the cache is
    /// empty or unavailable; the degraded mode is invisible to the caller.
    pub async fn fetch(
        &self,
        pool: &PgPool,
        window: Window,
        mode: &str,
        author_key: Option<&str>,
        limit: usize,
    ) -> Result<Vec<LeaderboardEntry>> {
        if window == Window::Author && author_key.is_none() {
            return Err(DatabaseError::InvalidData(
                "Author window requires an author key".to_string(),
            ));
        }
        let limit = limit.clamp(1, MAX_FETCH_LIMIT);

        match self.fetch_cached(window, mode, author_key, limit) {
            Ok(entries) if !entries.is_empty() => return Ok(entries),
            Ok(_) => debug!("Leaderboard cache empty, using raw aggregation"),
            Err(e) => warn!("Leaderboard cache unavailable, using raw aggregation: {}", e),
        }

        let since = window_start(window, self.clock.now());
        let rows =
            read_ops::aggregate_leaderboard(pool, mode, since, author_key, limit as i64).await?;
        Ok(entries_from_aggregate(&rows, mode))
    }

    fn fetch_cached(
        &self,
        window: Window,
        mode: &str,
        author_key: Option<&str>,
        limit: usize,
    ) -> CacheResult<Vec<LeaderboardEntry>> {
        let bucket = bucket_id(window, mode, author_key, self.clock.now());
        let top = self.store.top_n(&bucket, limit)?;
        let members: Vec<String> = top.iter().map(|(m, _)| m.clone()).collect();
        let metas = self.store.get_meta(&bucket, &members)?;

        let now = self.clock.now();
        Ok(top
            .into_iter()
            .zip(metas)
            .enumerate()
            .map(|(i, ((subject_key, score), meta))| match meta {
                Some(meta) => LeaderboardEntry {
                    rank: i as i64 + 1,
                    subject_key,
                    score,
                    time_ms: meta.time_ms,
                    combo: meta.combo,
                    perfect: meta.perfect,
                    mode: meta.mode,
                    updated_at: meta.updated_at,
                },
                None => LeaderboardEntry {
                    rank: i as i64 + 1,
                    subject_key,
                    score,
                    time_ms: 0,
                    combo: 0,
                    perfect: false,
                    mode: mode.to_string(),
                    updated_at: now,
                },
            })
            .collect())
    }
}

/// Assemble ranked entries from fallback aggregation rows. The rows arrive
/// pre-sorted by the query; rank is positional.
pub fn entries_from_aggregate(rows: &[ScoreAggregateRow], mode: &str) -> Vec<LeaderboardEntry> {
    rows.iter()
        .enumerate()
        .map(|(i, row)| LeaderboardEntry {
            rank: i as i64 + 1,
            subject_key: row.subject_key.clone(),
            score: row.total_score,
            time_ms: row.best_time_ms,
            combo: 0,
            perfect: row.perfect_clear,
            mode: mode.to_string(),
            updated_at: row.updated_at,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use chrono::{TimeZone, Utc};

    fn service() -> (Arc<MemoryRankingStore>, LeaderboardService) {
        let clock = Arc::new(FixedClock(
            Utc.with_ymd_and_hms(2025, 6, 11, 12, 0, 0).unwrap(),
        ));
        let store = Arc::new(MemoryRankingStore::new(clock.clone()));
        let svc = LeaderboardService::new(store.clone(), clock);
        (store, svc)
    }

    fn event(subject: &str, score: i64) -> PlayResultEvent {
        PlayResultEvent {
            puzzle_id: 1,
            subject_key: subject.to_string(),
            author_key: "author-1".to_string(),
            mode: "standard".to_string(),
            final_score: score,
            time_ms: 90_000,
            combo: 4,
            perfect: true,
        }
    }

    #[test]
    fn cumulative_sum_across_submissions() {
        let (_, svc) = service();
        svc.record_play_result(&event("alice", 1000));
        svc.record_play_result(&event("alice", 800));
        svc.record_play_result(&event("bob", 1500));

        let entries = svc
            .fetch_cached(Window::Global, "standard", None, 10)
            .unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].subject_key, "alice");
        assert_eq!(entries[0].score, 1800, "aggregate equals the sum of recorded scores");
        assert_eq!(entries[0].rank, 1);
        assert_eq!(entries[1].subject_key, "bob");
        assert_eq!(entries[1].score, 1500);
    }

    #[test]
    fn meta_snapshot_reflects_latest_submission() {
        let (_, svc) = service();
        let mut second = event("alice", 700);
        second.combo = 9;
        second.perfect = false;
        svc.record_play_result(&event("alice", 1000));
        svc.record_play_result(&second);

        let entries = svc
            .fetch_cached(Window::Global, "standard", None, 10)
            .unwrap();
        assert_eq!(entries[0].combo, 9);
        assert!(!entries[0].perfect);
    }

    #[test]
    fn every_window_receives_the_result() {
        let (_, svc) = service();
        svc.record_play_result(&event("alice", 1000));

        for window in [Window::Global, Window::Weekly, Window::Monthly] {
            let entries = svc.fetch_cached(window, "standard", None, 10).unwrap();
            assert_eq!(entries.len(), 1, "window {:?}", window);
        }
        let entries = svc
            .fetch_cached(Window::Author, "standard", Some("author-1"), 10)
            .unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn record_survives_cache_outage() {
        let (store, svc) = service();
        store.set_available(false);
        // Must not panic or propagate.
        svc.record_play_result(&event("alice", 1000));
        store.set_available(true);
        let entries = svc
            .fetch_cached(Window::Global, "standard", None, 10)
            .unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn fallback_ordering_matches_cache_ordering() {
        // Fixed dataset, one submission per subject so cumulative-sum and
        // best-of agree; cache and fallback must rank identically.
        let (store, svc) = service();
        let dataset = [("alice", 2650_i64), ("bob", 1900_i64), ("carol", 3100_i64)];
        for (subject, score) in dataset {
            svc.record_play_result(&event(subject, score));
        }

        let cached = svc
            .fetch_cached(Window::Global, "standard", None, 10)
            .unwrap();

        store.set_available(false);
        let updated_at = Utc.with_ymd_and_hms(2025, 6, 11, 12, 0, 0).unwrap();
        let mut rows: Vec<ScoreAggregateRow> = dataset
            .iter()
            .map(|(subject, score)| ScoreAggregateRow {
                subject_key: subject.to_string(),
                total_score: *score,
                best_time_ms: 90_000,
                perfect_clear: true,
                updated_at,
            })
            .collect();
        // The fallback query sorts by total DESC before returning rows.
        rows.sort_by(|a, b| b.total_score.cmp(&a.total_score));
        let fallback = entries_from_aggregate(&rows, "standard");

        let cached_order: Vec<&str> = cached.iter().map(|e| e.subject_key.as_str()).collect();
        let fallback_order: Vec<&str> = fallback.iter().map(|e| e.subject_key.as_str()).collect();
        assert_eq!(cached_order, fallback_order);
        assert_eq!(cached_order, vec!["carol", "alice", "bob"]);
    }
}
