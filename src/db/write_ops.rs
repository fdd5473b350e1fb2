use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{debug, info};

use crate::db::errors::{DatabaseError, Result};
use crate::models::records::ScoreRecord;

/// Insert the base puzzle row. Resolved metadata is written back in a
/// second step once analysis has run against the generated id.
pub async fn insert_puzzle(
    tx: &mut Transaction<'_, Postgres>,
    title: &str,
    description: &str,
    width: i32,
    height: i32,
    status: &str,
    content_style: &str,
    tags: &[String],
    author_key: &str,
) -> Result<i64> {
    debug!("Inserting puzzle '{}' ({}x{})", title, width, height);

    let row = sqlx::query(
        r#"
        INSERT INTO puzzles (
            title, description, width, height, status, content_style, tags,
            author_key, play_count, clear_count, average_time_ms, average_rating,
            created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 0, 0, 0, 0, NOW(), NOW())
        RETURNING id
        "#,
    )
    .bind(title)
    .bind(description)
    .bind(width)
    .bind(height)
    .bind(status)
    .bind(content_style)
    .bind(Json(tags.to_vec()))
    .bind(author_key)
    .fetch_one(&mut **tx)
    .await
    .map_err(DatabaseError::QueryError)?;

    let puzzle_id: i64 = row.get("id");
    info!(puzzle_id, "Inserted puzzle");
    Ok(puzzle_id)
}

pub async fn insert_hint(
    tx: &mut Transaction<'_, Postgres>,
    puzzle_id: i64,
    row_clues: &[Vec<i32>],
    col_clues: &[Vec<i32>],
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO puzzle_hints (puzzle_id, row_clues, col_clues, version)
        VALUES ($1, $2, $3, 1)
        "#,
    )
    .bind(puzzle_id)
    .bind(Json(row_clues.to_vec()))
    .bind(Json(col_clues.to_vec()))
    .execute(&mut **tx)
    .await
    .map_err(DatabaseError::QueryError)?;

    Ok(())
}

pub async fn insert_solution(
    tx: &mut Transaction<'_, Postgres>,
    puzzle_id: i64,
    solution: &[u8],
    checksum: &str,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO puzzle_solutions (puzzle_id, solution, checksum)
        VALUES ($1, $2, $3)
        "#,
    )
    .bind(puzzle_id)
    .bind(solution)
    .bind(checksum)
    .execute(&mut **tx)
    .await
    .map_err(|e| {
        // A concurrent create can slip past the pre-insert checksum lookup;
        // the unique index is the authoritative guard.
        let err = DatabaseError::QueryError(e);
        if err.is_integrity_error() {
            return DatabaseError::Conflict(
                "A puzzle with an identical solution already exists".to_string(),
            );
        }
        err
    })?;

    Ok(())
}

/// Write the resolved metadata back onto the puzzle row.
pub async fn update_puzzle_metadata(
    tx: &mut Transaction<'_, Postgres>,
    puzzle_id: i64,
    difficulty_score: f64,
    tags: &[String],
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE puzzles
        SET difficulty_score = $2, tags = $3, updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(puzzle_id)
    .bind(difficulty_score)
    .bind(Json(tags.to_vec()))
    .execute(&mut **tx)
    .await
    .map_err(DatabaseError::QueryError)?;

    Ok(())
}

/// Persist the ordered lineup for a date. Last writer wins on a concurrent
/// forced regeneration, accepted at once-per-day write frequency.
#[tracing::instrument(skip(pool, puzzle_ids))]
pub async fn upsert_daily_pick(
    pool: &PgPool,
    date: NaiveDate,
    puzzle_ids: &[i64],
    generated_at: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO daily_picks (pick_date, puzzle_ids, generated_at)
        VALUES ($1, $2, $3)
        ON CONFLICT (pick_date)
        DO UPDATE SET puzzle_ids = EXCLUDED.puzzle_ids, generated_at = EXCLUDED.generated_at
        "#,
    )
    .bind(date)
    .bind(Json(puzzle_ids.to_vec()))
    .bind(generated_at)
    .execute(pool)
    .await
    .map_err(DatabaseError::QueryError)?;

    info!(%date, picks = puzzle_ids.len(), "Persisted daily pick");
    Ok(())
}

#[tracing::instrument(skip(pool, state_token))]
pub async fn insert_play(
    pool: &PgPool,
    puzzle_id: i64,
    subject_key: &str,
    mode: &str,
    started_at: DateTime<Utc>,
    state_token: &str,
) -> Result<i64> {
    let row = sqlx::query(
        r#"
        INSERT INTO plays (
            puzzle_id, subject_key, mode, status, started_at,
            mistakes, used_hints, undo_count, combo_count, state_token
        )
        VALUES ($1, $2, $3, 'STARTED', $4, 0, 0, 0, 0, $5)
        RETURNING id
        "#,
    )
    .bind(puzzle_id)
    .bind(subject_key)
    .bind(mode)
    .bind(started_at)
    .bind(state_token)
    .fetch_one(pool)
    .await
    .map_err(DatabaseError::QueryError)?;

    let play_id: i64 = row.get("id");
    info!(play_id, puzzle_id, "Play started");
    Ok(play_id)
}

/// Overwrite the progress snapshot of a still-running play. Never touches
/// anything that feeds scoring.
pub async fn update_play_progress(pool: &PgPool, play_id: i64, progress: &Value) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE plays SET progress = $2 WHERE id = $1 AND status = 'STARTED'",
    )
    .bind(play_id)
    .bind(progress)
    .execute(pool)
    .await
    .map_err(DatabaseError::QueryError)?;

    Ok(result.rows_affected())
}

/// Stamp finish time and counters and mark the play terminal.
#[allow(clippy::too_many_arguments)]
pub async fn finalize_play(
    tx: &mut Transaction<'_, Postgres>,
    play_id: i64,
    finished_at: DateTime<Utc>,
    mistakes: i32,
    used_hints: i32,
    undo_count: i32,
    combo_count: i32,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE plays
        SET status = 'SUBMITTED', finished_at = $2,
            mistakes = $3, used_hints = $4, undo_count = $5, combo_count = $6
        WHERE id = $1
        "#,
    )
    .bind(play_id)
    .bind(finished_at)
    .bind(mistakes)
    .bind(used_hints)
    .bind(undo_count)
    .bind(combo_count)
    .execute(&mut **tx)
    .await
    .map_err(DatabaseError::QueryError)?;

    Ok(())
}

/// Best score on record before a merge. Read inside the submit transaction
/// so "improved" means strictly better than what stood before this upsert.
pub async fn load_best_score(
    tx: &mut Transaction<'_, Postgres>,
    puzzle_id: i64,
    subject_key: &str,
    mode: &str,
) -> Result<Option<i64>> {
    let row: Option<(i64,)> = sqlx::query_as(
        "SELECT best_score FROM scores WHERE puzzle_id = $1 AND subject_key = $2 AND mode = $3",
    )
    .bind(puzzle_id)
    .bind(subject_key)
    .bind(mode)
    .fetch_optional(&mut **tx)
    .await
    .map_err(DatabaseError::QueryError)?;

    Ok(row.map(|(score,)| score))
}

/// Best-of upsert. GREATEST/LEAST in the conflict clause makes the merge
/// atomic under concurrent submits for the same (puzzle, subject, mode),
/// replacing the racy read-compare-write sequence.
pub async fn upsert_score(
    tx: &mut Transaction<'_, Postgres>,
    puzzle_id: i64,
    subject_key: &str,
    mode: &str,
    score: i64,
    time_ms: i64,
    perfect_clear: bool,
) -> Result<ScoreRecord> {
    let record = sqlx::query_as::<_, ScoreRecord>(
        r#"
        INSERT INTO scores (
            puzzle_id, subject_key, mode, best_score, best_time_ms, perfect_clear, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, NOW())
        ON CONFLICT (puzzle_id, subject_key, mode)
        DO UPDATE SET
            best_score = GREATEST(scores.best_score, EXCLUDED.best_score),
            best_time_ms = LEAST(scores.best_time_ms, EXCLUDED.best_time_ms),
            perfect_clear = scores.perfect_clear OR EXCLUDED.perfect_clear,
            updated_at = NOW()
        RETURNING puzzle_id, subject_key, mode, best_score, best_time_ms, perfect_clear, updated_at
        "#,
    )
    .bind(puzzle_id)
    .bind(subject_key)
    .bind(mode)
    .bind(score)
    .bind(time_ms)
    .bind(perfect_clear)
    .fetch_one(&mut **tx)
    .await
    .map_err(DatabaseError::QueryError)?;

    info!(
        puzzle_id,
        subject_key,
        best_score = record.best_score,
        "Upserted best-of score"
    );
    Ok(record)
}

/// Attempt counter, bumped when a play starts.
pub async fn bump_play_started(pool: &PgPool, puzzle_id: i64) -> Result<()> {
    sqlx::query("UPDATE puzzles SET play_count = play_count + 1, updated_at = NOW() WHERE id = $1")
        .bind(puzzle_id)
        .execute(pool)
        .await
        .map_err(DatabaseError::QueryError)?;

    Ok(())
}

/// Clear counter and running average solve time, bumped on submit.
pub async fn bump_play_cleared(
    tx: &mut Transaction<'_, Postgres>,
    puzzle_id: i64,
    elapsed_ms: i64,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE puzzles
        SET clear_count = clear_count + 1,
            average_time_ms = (average_time_ms * clear_count + $2) / (clear_count + 1),
            updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(puzzle_id)
    .bind(elapsed_ms as f64)
    .execute(&mut **tx)
    .await
    .map_err(DatabaseError::QueryError)?;

    Ok(())
}
