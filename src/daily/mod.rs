pub mod scheduler;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use sqlx::PgPool;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

use crate::clock::Clock;
use crate::db::errors::Result;
use crate::db::{read_ops, write_ops};
use crate::models::records::{DailyPickRecord, PuzzleRecord};
use crate::puzzle::analyze::{difficulty_tier, DifficultyTier};

/// Tuning knobs of the daily pick curator. Defaults model "enough data,
/// not trivial, not too hard".
#[derive(Debug, Clone)]
pub struct CuratorConfig {
    pub candidate_pool: i64,
    pub exclusion_days: i64,
    pub min_play_count: i64,
    pub min_rating: f64,
    pub min_average_time_ms: f64,
    pub max_average_time_ms: f64,
    pub min_clear_rate: f64,
    pub max_clear_rate: f64,
    pub target_clear_rate: f64,
    pub easy_target: usize,
    pub medium_target: usize,
    pub hard_target: usize,
    pub style_cap: usize,
    pub min_picks: usize,
    pub max_picks: usize,
}

impl Default for CuratorConfig {
    fn default() -> Self {
        Self {
            candidate_pool: 200,
            exclusion_days: 7,
            min_play_count: 10,
            min_rating: 2.5,
            min_average_time_ms: 30_000.0,
            max_average_time_ms: 3_600_000.0,
            min_clear_rate: 0.2,
            max_clear_rate: 0.9,
            target_clear_rate: 0.55,
            easy_target: 1,
            medium_target: 2,
            hard_target: 1,
            style_cap: 2,
            min_picks: 3,
            max_picks: 5,
        }
    }
}

/// Generate (or reuse) the lineup for a date.
///
/// Idempotent unless forced: a non-forced call returns an existing
/// non-empty entry untouched. The check-then-generate sequence is not
/// isolated from a concurrent forced run; last writer wins.
#[tracing::instrument(skip(pool, clock, config))]
pub async fn curate(
    pool: &PgPool,
    clock: &dyn Clock,
    config: &CuratorConfig,
    date: NaiveDate,
    force: bool,
) -> Result<DailyPickRecord> {
    if !force {
        if let Some(existing) = read_ops::load_daily_pick(pool, date).await? {
            if !existing.puzzle_ids.0.is_empty() {
                debug!(%date, "Reusing existing daily pick");
                return Ok(existing);
            }
        }
    }

    let since = date - Duration::days(config.exclusion_days);
    let recent = read_ops::load_daily_picks_between(pool, since, date).await?;
    let excluded: HashSet<i64> = recent
        .iter()
        .flat_map(|p| p.puzzle_ids.0.iter().copied())
        .collect();

    let candidates = read_ops::load_curation_candidates(pool, config.candidate_pool).await?;
    let now = clock.now();
    let picks = select_picks(&candidates, &excluded, now, config);

    info!(%date, picks = picks.len(), excluded = excluded.len(), "Curated daily lineup");

    let generated_at = clock.now();
    write_ops::upsert_daily_pick(pool, date, &picks, generated_at).await?;

    Ok(DailyPickRecord {
        pick_date: date,
        puzzle_ids: sqlx::types::Json(picks),
        generated_at,
    })
}

/// The deterministic selection core: filter, rank, then greedily fill tier
/// targets with up to two relaxation passes. No randomness; ties fall back
/// to the stable candidate order.
pub fn select_picks(
    candidates: &[PuzzleRecord],
    excluded: &HashSet<i64>,
    now: DateTime<Utc>,
    config: &CuratorConfig,
) -> Vec<i64> {
    let eligible: Vec<&PuzzleRecord> = candidates
        .iter()
        .filter(|p| passes_quality_filter(p, config))
        .collect();

    let mut ranked = eligible.clone();
    ranked.sort_by(|a, b| {
        rank_weight(b, now, config)
            .partial_cmp(&rank_weight(a, now, config))
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let distinct_styles: HashSet<&str> = eligible.iter().map(|p| p.content_style.as_str()).collect();
    // Escape valve: a near-monostyle pool cannot satisfy a style cap.
    let enforce_style_cap = distinct_styles.len() >= 2;

    let mut picks: Vec<&PuzzleRecord> = Vec::new();
    let mut style_usage: HashMap<&str, usize> = HashMap::new();

    // Pass 1: fill the per-tier allocation.
    let mut remaining: HashMap<DifficultyTier, usize> = HashMap::from([
        (DifficultyTier::Easy, config.easy_target),
        (DifficultyTier::Medium, config.medium_target),
        (DifficultyTier::Hard, config.hard_target),
    ]);
    for candidate in &ranked {
        let tier = match candidate.difficulty_score {
            Some(score) => difficulty_tier(score),
            None => continue,
        };
        if remaining.get(&tier).copied().unwrap_or(0) == 0 {
            continue;
        }
        if !accepts(candidate, &picks, excluded, &style_usage, enforce_style_cap, config) {
            continue;
        }
        accept(candidate, &mut picks, &mut style_usage);
        *remaining.entry(tier).or_insert(0) -= 1;
    }

    // Pass 2: ignore tier targets, keep dedup/streak/style rules.
    if picks.len() < config.min_picks {
        for candidate in &ranked {
            if picks.len() >= config.min_picks {
                break;
            }
            if picks.iter().any(|p| p.id == candidate.id) {
                continue;
            }
            if !accepts(candidate, &picks, excluded, &style_usage, enforce_style_cap, config) {
                continue;
            }
            accept(candidate, &mut picks, &mut style_usage);
        }
    }

    // Pass 3: keep only the no-repeated-author rule.
    if picks.len() < config.min_picks {
        for candidate in &ranked {
            if picks.len() >= config.min_picks {
                break;
            }
            if picks.iter().any(|p| p.id == candidate.id) {
                continue;
            }
            if let Some(last) = picks.last() {
                if last.author_key == candidate.author_key {
                    continue;
                }
            }
            accept(candidate, &mut picks, &mut style_usage);
        }
    }

    picks.truncate(config.max_picks);
    picks.iter().map(|p| p.id).collect()
}

fn passes_quality_filter(p: &PuzzleRecord, config: &CuratorConfig) -> bool {
    if p.difficulty_score.is_none() {
        return false;
    }
    if p.play_count < config.min_play_count || p.clear_count <= 0 {
        return false;
    }
    if p.average_time_ms < config.min_average_time_ms
        || p.average_time_ms > config.max_average_time_ms
    {
        return false;
    }
    if p.average_rating < config.min_rating {
        return false;
    }
    let clear_rate = p.clear_rate();
    clear_rate >= config.min_clear_rate && clear_rate <= config.max_clear_rate
}

/// Weighted rank: rating, closeness to the target clear rate, and a small
/// recency tie-break for otherwise equal candidates.
fn rank_weight(p: &PuzzleRecord, now: DateTime<Utc>, config: &CuratorConfig) -> f64 {
    let rating_weight = p.average_rating * 2.0;

    let distance = (p.clear_rate() - config.target_clear_rate).abs() / config.target_clear_rate;
    let closeness_weight = (1.0 - distance).max(0.0) * 3.0;

    let age_days = (now - p.created_at).num_days().max(0) as f64;
    let recency_weight = 0.1 / (1.0 + age_days);

    rating_weight + closeness_weight + recency_weight
}

fn accepts(
    candidate: &PuzzleRecord,
    picks: &[&PuzzleRecord],
    excluded: &HashSet<i64>,
    style_usage: &HashMap<&str, usize>,
    enforce_style_cap: bool,
    config: &CuratorConfig,
) -> bool {
    if excluded.contains(&candidate.id) {
        return false;
    }
    // One pick per author, which also rules out author streaks.
    if picks.iter().any(|p| p.author_key == candidate.author_key) {
        return false;
    }
    if enforce_style_cap {
        let used = style_usage
            .get(candidate.content_style.as_str())
            .copied()
            .unwrap_or(0);
        if used >= config.style_cap {
            return false;
        }
    }
    true
}

fn accept<'a>(
    candidate: &'a PuzzleRecord,
    picks: &mut Vec<&'a PuzzleRecord>,
    style_usage: &mut HashMap<&'a str, usize>,
) {
    *style_usage.entry(candidate.content_style.as_str()).or_insert(0) += 1;
    picks.push(candidate);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use sqlx::types::Json;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, day, 12, 0, 0).unwrap()
    }

    #[allow(clippy::too_many_arguments)]
    fn candidate(
        id: i64,
        author: &str,
        style: &str,
        difficulty: f64,
        rating: f64,
        play_count: i64,
        clear_count: i64,
        created_day: u32,
    ) -> PuzzleRecord {
        PuzzleRecord {
            id,
            title: format!("Puzzle {}", id),
            description: String::new(),
            width: 10,
            height: 10,
            status: "APPROVED".to_string(),
            difficulty_score: Some(difficulty),
            content_style: style.to_string(),
            tags: Json(vec![]),
            author_key: author.to_string(),
            play_count,
            clear_count,
            average_time_ms: 120_000.0,
            average_rating: rating,
            created_at: at(created_day),
            updated_at: at(created_day),
        }
    }

    fn good(id: i64, author: &str, style: &str, difficulty: f64) -> PuzzleRecord {
        // 55% clear rate, comfortably inside every filter band.
        candidate(id, author, style, difficulty, 4.0, 100, 55, 10)
    }

    #[test]
    fn fills_tier_targets_from_full_pool() {
        // 10 candidates across all tiers, all authors distinct.
        let pool: Vec<PuzzleRecord> = vec![
            good(1, "a1", "classic", 3.0),
            good(2, "a2", "classic", 4.0),
            good(3, "a3", "pixel", 9.0),
            good(4, "a4", "pixel", 10.0),
            good(5, "a5", "classic", 11.0),
            good(6, "a6", "pixel", 12.0),
            good(7, "a7", "classic", 16.0),
            good(8, "a8", "pixel", 18.0),
            good(9, "a9", "classic", 20.0),
            good(10, "a10", "pixel", 5.0),
        ];
        let picks = select_picks(&pool, &HashSet::new(), at(20), &CuratorConfig::default());

        assert_eq!(picks.len(), 4, "1 easy + 2 medium + 1 hard");
        let by_id: HashMap<i64, &PuzzleRecord> = pool.iter().map(|p| (p.id, p)).collect();
        let tiers: Vec<DifficultyTier> = picks
            .iter()
            .map(|id| difficulty_tier(by_id[id].difficulty_score.unwrap()))
            .collect();
        assert_eq!(
            tiers.iter().filter(|t| **t == DifficultyTier::Easy).count(),
            1
        );
        assert_eq!(
            tiers.iter().filter(|t| **t == DifficultyTier::Medium).count(),
            2
        );
        assert_eq!(
            tiers.iter().filter(|t| **t == DifficultyTier::Hard).count(),
            1
        );
    }

    #[test]
    fn never_repeats_an_author() {
        let pool: Vec<PuzzleRecord> = vec![
            good(1, "same", "classic", 3.0),
            good(2, "same", "pixel", 9.0),
            good(3, "same", "classic", 10.0),
            good(4, "other", "pixel", 16.0),
        ];
        let picks = select_picks(&pool, &HashSet::new(), at(20), &CuratorConfig::default());

        let by_id: HashMap<i64, &PuzzleRecord> = pool.iter().map(|p| (p.id, p)).collect();
        for pair in picks.windows(2) {
            assert_ne!(by_id[&pair[0]].author_key, by_id[&pair[1]].author_key);
        }
    }

    #[test]
    fn respects_exclusion_set() {
        let pool: Vec<PuzzleRecord> = vec![
            good(1, "a1", "classic", 3.0),
            good(2, "a2", "classic", 9.0),
            good(3, "a3", "pixel", 10.0),
            good(4, "a4", "pixel", 16.0),
            good(5, "a5", "classic", 4.0),
        ];
        let excluded: HashSet<i64> = [1, 3].into_iter().collect();
        let picks = select_picks(&pool, &excluded, at(20), &CuratorConfig::default());

        assert!(!picks.contains(&1));
        assert!(!picks.contains(&3));
    }

    #[test]
    fn relaxes_tier_targets_when_pool_is_thin() {
        // Only easy puzzles exist; tier pass alone yields one pick, the
        // relaxation passes top up to the minimum.
        let pool: Vec<PuzzleRecord> = vec![
            good(1, "a1", "classic", 3.0),
            good(2, "a2", "pixel", 4.0),
            good(3, "a3", "classic", 5.0),
            good(4, "a4", "pixel", 6.0),
        ];
        let picks = select_picks(&pool, &HashSet::new(), at(20), &CuratorConfig::default());
        assert!(picks.len() >= CuratorConfig::default().min_picks);
    }

    #[test]
    fn allows_author_repeats_when_nothing_else_reaches_minimum() {
        // One prolific author plus a single other: the author-unique passes
        // stall at two picks, so the last pass must reuse the prolific
        // author while keeping repeats non-consecutive.
        let pool: Vec<PuzzleRecord> = vec![
            good(1, "prolific", "classic", 3.0),
            good(2, "prolific", "pixel", 9.0),
            good(3, "other", "classic", 16.0),
            good(4, "prolific", "pixel", 10.0),
        ];
        let picks = select_picks(&pool, &HashSet::new(), at(20), &CuratorConfig::default());

        let config = CuratorConfig::default();
        assert_eq!(picks.len(), config.min_picks);

        let by_id: HashMap<i64, &PuzzleRecord> = pool.iter().map(|p| (p.id, p)).collect();
        let authors: Vec<&str> = picks
            .iter()
            .map(|id| by_id[id].author_key.as_str())
            .collect();
        assert!(
            authors.iter().filter(|a| **a == "prolific").count() > 1,
            "the thin pool forces an author repeat"
        );
        for pair in authors.windows(2) {
            assert_ne!(pair[0], pair[1], "repeats must not be consecutive");
        }
    }

    #[test]
    fn style_cap_is_dropped_for_monostyle_pools() {
        let pool: Vec<PuzzleRecord> = vec![
            good(1, "a1", "classic", 3.0),
            good(2, "a2", "classic", 9.0),
            good(3, "a3", "classic", 10.0),
            good(4, "a4", "classic", 16.0),
        ];
        let picks = select_picks(&pool, &HashSet::new(), at(20), &CuratorConfig::default());
        // Style cap of 2 would block the rest; the escape valve lifts it.
        assert_eq!(picks.len(), 4);
    }

    #[test]
    fn filters_out_unproven_and_degenerate_puzzles() {
        let config = CuratorConfig::default();
        let too_few_plays = candidate(1, "a1", "classic", 3.0, 4.0, 5, 3, 10);
        let never_cleared = candidate(2, "a2", "classic", 3.0, 4.0, 100, 0, 10);
        let too_easy = candidate(3, "a3", "classic", 3.0, 4.0, 100, 95, 10);
        let too_hard = candidate(4, "a4", "classic", 3.0, 4.0, 100, 10, 10);
        let poorly_rated = candidate(5, "a5", "classic", 3.0, 1.5, 100, 55, 10);

        for p in [&too_few_plays, &never_cleared, &too_easy, &too_hard, &poorly_rated] {
            assert!(!passes_quality_filter(p, &config), "puzzle {}", p.id);
        }
        assert!(passes_quality_filter(&good(6, "a6", "classic", 3.0), &config));
    }

    #[test]
    fn selection_is_deterministic() {
        let pool: Vec<PuzzleRecord> = (1..=10)
            .map(|i| good(i, &format!("a{}", i), "classic", 3.0 + i as f64))
            .collect();
        let a = select_picks(&pool, &HashSet::new(), at(20), &CuratorConfig::default());
        let b = select_picks(&pool, &HashSet::new(), at(20), &CuratorConfig::default());
        assert_eq!(a, b);
    }
}
