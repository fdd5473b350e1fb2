use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use tracing::debug;

use crate::db::errors::{DatabaseError, Result};
use crate::models::records::{
    DailyPickRecord, PlayRecord, PuzzleHintRecord, PuzzleRecord, ScoreAggregateRow, ScoreRecord,
};

/// Look up a puzzle id by solution checksum, for exact-duplicate detection.
#[tracing::instrument(skip(pool))]
pub async fn find_puzzle_by_checksum(pool: &PgPool, checksum: &str) -> Result<Option<i64>> {
    let row: Option<(i64,)> =
        sqlx::query_as("SELECT puzzle_id FROM puzzle_solutions WHERE checksum = $1")
            .bind(checksum)
            .fetch_optional(pool)
            .await
            .map_err(DatabaseError::QueryError)?;

    Ok(row.map(|(id,)| id))
}

#[tracing::instrument(skip(pool), fields(puzzle_id = puzzle_id))]
pub async fn load_puzzle(pool: &PgPool, puzzle_id: i64) -> Result<PuzzleRecord> {
    sqlx::query_as::<_, PuzzleRecord>("SELECT * FROM puzzles WHERE id = $1")
        .bind(puzzle_id)
        .fetch_optional(pool)
        .await
        .map_err(DatabaseError::QueryError)?
        .ok_or_else(|| DatabaseError::NotFound(format!("Puzzle {} not found", puzzle_id)))
}

#[tracing::instrument(skip(pool), fields(puzzle_id = puzzle_id))]
pub async fn load_hint(pool: &PgPool, puzzle_id: i64) -> Result<PuzzleHintRecord> {
    sqlx::query_as::<_, PuzzleHintRecord>(
        "SELECT puzzle_id, row_clues, col_clues, version FROM puzzle_hints WHERE puzzle_id = $1",
    )
    .bind(puzzle_id)
    .fetch_optional(pool)
    .await
    .map_err(DatabaseError::QueryError)?
    .ok_or_else(|| DatabaseError::NotFound(format!("Hints for puzzle {} not found", puzzle_id)))
}

/// Page through puzzles of one status, newest first. Fetches one extra row
/// so the caller can tell whether another page exists.
#[tracing::instrument(skip(pool))]
pub async fn list_puzzles_page(
    pool: &PgPool,
    status: &str,
    page: i64,
    page_size: i64,
) -> Result<Vec<PuzzleRecord>> {
    debug!("Listing puzzles with status {} page {}", status, page);

    let records = sqlx::query_as::<_, PuzzleRecord>(
        r#"
        SELECT * FROM puzzles
        WHERE status = $1
        ORDER BY created_at DESC, id DESC
        OFFSET $2 LIMIT $3
        "#,
    )
    .bind(status)
    .bind(page * page_size)
    .bind(page_size + 1)
    .fetch_all(pool)
    .await
    .map_err(DatabaseError::QueryError)?;

    Ok(records)
}

/// Load puzzles by id, in no particular order.
#[tracing::instrument(skip(pool, ids))]
pub async fn load_puzzles_by_ids(pool: &PgPool, ids: &[i64]) -> Result<Vec<PuzzleRecord>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let records = sqlx::query_as::<_, PuzzleRecord>("SELECT * FROM puzzles WHERE id = ANY($1)")
        .bind(ids)
        .fetch_all(pool)
        .await
        .map_err(DatabaseError::QueryError)?;

    Ok(records)
}

/// Most recent approved/official puzzles, the curator's candidate pool.
#[tracing::instrument(skip(pool))]
pub async fn load_curation_candidates(pool: &PgPool, limit: i64) -> Result<Vec<PuzzleRecord>> {
    let records = sqlx::query_as::<_, PuzzleRecord>(
        r#"
        SELECT * FROM puzzles
        WHERE status IN ('APPROVED', 'OFFICIAL')
        ORDER BY created_at DESC, id DESC
        LIMIT $1
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await
    .map_err(DatabaseError::QueryError)?;

    debug!("Loaded {} curation candidates", records.len());
    Ok(records)
}

#[tracing::instrument(skip(pool))]
pub async fn load_daily_pick(pool: &PgPool, date: NaiveDate) -> Result<Option<DailyPickRecord>> {
    let record = sqlx::query_as::<_, DailyPickRecord>(
        "SELECT pick_date, puzzle_ids, generated_at FROM daily_picks WHERE pick_date = $1",
    )
    .bind(date)
    .fetch_optional(pool)
    .await
    .map_err(DatabaseError::QueryError)?;

    Ok(record)
}

/// Daily picks in [since, until), for building the trailing exclusion set.
#[tracing::instrument(skip(pool))]
pub async fn load_daily_picks_between(
    pool: &PgPool,
    since: NaiveDate,
    until: NaiveDate,
) -> Result<Vec<DailyPickRecord>> {
    let records = sqlx::query_as::<_, DailyPickRecord>(
        r#"
        SELECT pick_date, puzzle_ids, generated_at
        FROM daily_picks
        WHERE pick_date >= $1 AND pick_date < $2
        "#,
    )
    .bind(since)
    .bind(until)
    .fetch_all(pool)
    .await
    .map_err(DatabaseError::QueryError)?;

    Ok(records)
}

#[tracing::instrument(skip(pool), fields(play_id = play_id))]
pub async fn load_play(pool: &PgPool, play_id: i64) -> Result<PlayRecord> {
    sqlx::query_as::<_, PlayRecord>("SELECT * FROM plays WHERE id = $1")
        .bind(play_id)
        .fetch_optional(pool)
        .await
        .map_err(DatabaseError::QueryError)?
        .ok_or_else(|| DatabaseError::NotFound(format!("Play {} not found", play_id)))
}

/// Top best-of scores for one puzzle and mode, for rank reporting.
#[tracing::instrument(skip(pool))]
pub async fn top_scores_for_puzzle(
    pool: &PgPool,
    puzzle_id: i64,
    mode: &str,
    limit: i64,
) -> Result<Vec<ScoreRecord>> {
    let records = sqlx::query_as::<_, ScoreRecord>(
        r#"
        SELECT * FROM scores
        WHERE puzzle_id = $1 AND mode = $2
        ORDER BY best_score DESC, best_time_ms ASC, subject_key ASC
        LIMIT $3
        "#,
    )
    .bind(puzzle_id)
    .bind(mode)
    .bind(limit)
    .fetch_all(pool)
    .await
    .map_err(DatabaseError::QueryError)?;

    Ok(records)
}

/// Raw-aggregation leaderboard fallback: sum best_score rows per subject,
/// optionally bounded to a window start and/or one author's puzzles.
/// O(all scores), acceptable at this call frequency.
#[tracing::instrument(skip(pool))]
pub async fn aggregate_leaderboard(
    pool: &PgPool,
    mode: &str,
    since: Option<DateTime<Utc>>,
    author_key: Option<&str>,
    limit: i64,
) -> Result<Vec<ScoreAggregateRow>> {
    let rows = sqlx::query_as::<_, ScoreAggregateRow>(
        r#"
        SELECT
            s.subject_key,
            COALESCE(SUM(s.best_score), 0)::BIGINT AS total_score,
            MIN(s.best_time_ms) AS best_time_ms,
            BOOL_OR(s.perfect_clear) AS perfect_clear,
            MAX(s.updated_at) AS updated_at
        FROM scores s
        JOIN puzzles p ON p.id = s.puzzle_id
        WHERE s.mode = $1
            AND ($2::timestamptz IS NULL OR s.updated_at >= $2)
            AND ($3::text IS NULL OR p.author_key = $3)
        GROUP BY s.subject_key
        ORDER BY total_score DESC, best_time_ms ASC, s.subject_key ASC
        LIMIT $4
        "#,
    )
    .bind(mode)
    .bind(since)
    .bind(author_key)
    .bind(limit)
    .fetch_all(pool)
    .await
    .map_err(DatabaseError::QueryError)?;

    debug!("Aggregated {} leaderboard rows from raw scores", rows.len());
    Ok(rows)
}
