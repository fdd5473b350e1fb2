use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use tracing::{error, info};

use crate::clock::Clock;
use crate::db::errors::{DatabaseError, Result};
use crate::db::{read_ops, write_ops};
use crate::leaderboard::{LeaderboardService, PlayResultEvent};
use crate::models::api::{
    AutosaveRequest, StartPlayRequest, StartPlayResponse, SubmitPlayRequest, SubmitPlayResponse,
};
use crate::models::records::play_status;
use crate::scoring::{calculate_score, ScoreInput, ScoringConfig};

/// How long a started play stays resumable.
const PLAY_TTL_HOURS: i64 = 24;
/// How many best-of rows to re-sort when reporting a player's rank.
const RANK_WINDOW: i64 = 100;

const MIN_DIFFICULTY_WEIGHT: f64 = 0.5;
const MAX_DIFFICULTY_WEIGHT: f64 = 3.0;

/// Create the play row and hand back an opaque state token.
#[tracing::instrument(skip(pool, clock), fields(puzzle_id = req.puzzle_id, subject = %req.subject_key))]
pub async fn start_play(
    pool: &PgPool,
    clock: &dyn Clock,
    req: &StartPlayRequest,
) -> Result<StartPlayResponse> {
    // Unknown puzzle ids fail before anything is written.
    let puzzle = read_ops::load_puzzle(pool, req.puzzle_id).await?;

    let started_at = clock.now();
    let state_token = make_state_token(puzzle.id, &req.subject_key, &req.mode, started_at);

    let play_id =
        write_ops::insert_play(pool, puzzle.id, &req.subject_key, &req.mode, started_at, &state_token)
            .await?;
    write_ops::bump_play_started(pool, puzzle.id).await?;

    Ok(StartPlayResponse {
        play_id,
        state_token,
        expires_at: started_at + Duration::hours(PLAY_TTL_HOURS),
    })
}

/// Overwrite the progress snapshot. Scoring inputs are untouched.
#[tracing::instrument(skip(pool, req), fields(play_id = play_id))]
pub async fn autosave(pool: &PgPool, play_id: i64, req: &AutosaveRequest) -> Result<()> {
    let play = read_ops::load_play(pool, play_id).await?;
    if play.status == play_status::SUBMITTED {
        return Err(DatabaseError::Conflict(format!(
            "Play {} is already submitted",
            play_id
        )));
    }

    write_ops::update_play_progress(pool, play_id, &req.progress).await?;
    Ok(())
}

/// Finalize an attempt: score it, merge the best-of record, feed the
/// leaderboard, and report the player's rank when their best improved.
#[tracing::instrument(
    skip(pool, leaderboard, scoring, clock, req),
    fields(play_id = play_id, subject = %req.subject_key)
)]
pub async fn submit_play(
    pool: &PgPool,
    leaderboard: &LeaderboardService,
    scoring: &ScoringConfig,
    clock: &dyn Clock,
    play_id: i64,
    req: &SubmitPlayRequest,
) -> Result<SubmitPlayResponse> {
    validate_submit_request(req)?;

    let play = read_ops::load_play(pool, play_id).await?;

    if play.subject_key != req.subject_key {
        return Err(DatabaseError::Ownership(format!(
            "Play {} does not belong to subject '{}'",
            play_id, req.subject_key
        )));
    }
    // Submitted plays are terminal; a resubmission is rejected rather than
    // recomputed so the first result stays authoritative.
    if play.status == play_status::SUBMITTED {
        return Err(DatabaseError::Conflict(format!(
            "Play {} is already submitted",
            play_id
        )));
    }

    let puzzle = read_ops::load_puzzle(pool, play.puzzle_id).await?;
    let difficulty_weight = difficulty_weight(puzzle.difficulty_score);

    let breakdown = calculate_score(
        &ScoreInput {
            width: puzzle.width,
            height: puzzle.height,
            elapsed_ms: req.elapsed_ms,
            mistakes: req.mistakes,
            used_hints: req.used_hints,
            combo_count: req.combo_count,
            difficulty_weight,
        },
        scoring,
    );

    let finished_at = clock.now();

    let mut tx = pool
        .begin()
        .await
        .map_err(|e| DatabaseError::TransactionError(format!("Failed to start transaction: {}", e)))?;

    let result = async {
        let prior_best =
            write_ops::load_best_score(&mut tx, play.puzzle_id, &req.subject_key, &play.mode)
                .await?;
        write_ops::finalize_play(
            &mut tx,
            play_id,
            finished_at,
            req.mistakes,
            req.used_hints,
            req.undo_count,
            req.combo_count,
        )
        .await?;
        let merged = write_ops::upsert_score(
            &mut tx,
            play.puzzle_id,
            &req.subject_key,
            &play.mode,
            breakdown.final_score,
            req.elapsed_ms,
            breakdown.perfect_clear,
        )
        .await?;
        write_ops::bump_play_cleared(&mut tx, play.puzzle_id, req.elapsed_ms).await?;
        Ok::<_, DatabaseError>((prior_best, merged))
    }
    .await;

    let (prior_best, merged) = match result {
        Ok(outcome) => {
            tx.commit().await.map_err(|e| {
                DatabaseError::TransactionError(format!("Failed to commit transaction: {}", e))
            })?;
            outcome
        }
        Err(e) => {
            error!("Play submission failed: {}", e);
            return Err(e);
        }
    };

    // Cache updates happen after commit; a cache outage never fails a submit.
    leaderboard.record_play_result(&PlayResultEvent {
        puzzle_id: play.puzzle_id,
        subject_key: req.subject_key.clone(),
        author_key: puzzle.author_key.clone(),
        mode: play.mode.clone(),
        final_score: breakdown.final_score,
        time_ms: req.elapsed_ms,
        combo: req.combo_count,
        perfect: breakdown.perfect_clear,
    });

    let improved = improves(prior_best, breakdown.final_score);
    let leaderboard_rank = if improved {
        puzzle_rank(pool, play.puzzle_id, &play.mode, &req.subject_key).await?
    } else {
        None
    };

    info!(
        final_score = breakdown.final_score,
        best_score = merged.best_score,
        improved,
        "Play submitted"
    );

    Ok(SubmitPlayResponse {
        score: breakdown.final_score,
        elapsed_ms: req.elapsed_ms,
        combo_bonus: breakdown.combo_bonus.round() as i64,
        perfect_clear: breakdown.perfect_clear,
        leaderboard_rank,
    })
}

/// Reject counter payloads before anything is computed or written. A
/// negative elapsed time reads as a time bonus and would stick permanently
/// through the LEAST merge on `best_time_ms`; negative mistake or hint
/// counts flip the penalty into a credit.
fn validate_submit_request(req: &SubmitPlayRequest) -> Result<()> {
    if req.elapsed_ms < 0 {
        return Err(DatabaseError::InvalidData(format!(
            "elapsed_ms must be non-negative, got {}",
            req.elapsed_ms
        )));
    }
    for (name, value) in [
        ("mistakes", req.mistakes),
        ("used_hints", req.used_hints),
        ("undo_count", req.undo_count),
        ("combo_count", req.combo_count),
    ] {
        if value < 0 {
            return Err(DatabaseError::InvalidData(format!(
                "{} must be non-negative, got {}",
                name, value
            )));
        }
    }
    Ok(())
}

/// Strictly better than the previous best; a tie keeps the old record and
/// does not count as an improvement.
fn improves(prior_best: Option<i64>, score: i64) -> bool {
    prior_best.map_or(true, |best| score > best)
}

/// Re-sort the top best-of rows for the puzzle and report the subject's
/// position, if they appear in that window.
async fn puzzle_rank(
    pool: &PgPool,
    puzzle_id: i64,
    mode: &str,
    subject_key: &str,
) -> Result<Option<i64>> {
    let top = read_ops::top_scores_for_puzzle(pool, puzzle_id, mode, RANK_WINDOW).await?;
    Ok(top
        .iter()
        .position(|s| s.subject_key == subject_key)
        .map(|i| i as i64 + 1))
}

/// Opaque resume token. Not a credential, just unguessable enough to not
/// collide across attempts.
fn make_state_token(
    puzzle_id: i64,
    subject_key: &str,
    mode: &str,
    started_at: DateTime<Utc>,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(puzzle_id.to_be_bytes());
    hasher.update(subject_key.as_bytes());
    hasher.update(mode.as_bytes());
    hasher.update(started_at.timestamp_micros().to_be_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..32].to_string()
}

/// Continuous difficulty score mapped onto a bounded score multiplier.
/// Unresolved difficulty falls back to a neutral weight.
fn difficulty_weight(difficulty_score: Option<f64>) -> f64 {
    let score = difficulty_score.unwrap_or(10.0);
    (score / 10.0).clamp(MIN_DIFFICULTY_WEIGHT, MAX_DIFFICULTY_WEIGHT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn state_token_is_stable_and_opaque() {
        let at = Utc.with_ymd_and_hms(2025, 6, 11, 9, 0, 0).unwrap();
        let a = make_state_token(7, "alice", "standard", at);
        let b = make_state_token(7, "alice", "standard", at);
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));

        let other = make_state_token(8, "alice", "standard", at);
        assert_ne!(a, other);
    }

    #[test]
    fn rejects_negative_submit_counters() {
        let base = SubmitPlayRequest {
            subject_key: "alice".to_string(),
            elapsed_ms: 60_000,
            mistakes: 0,
            used_hints: 0,
            undo_count: 0,
            combo_count: 0,
        };
        assert!(validate_submit_request(&base).is_ok());

        // A negative elapsed time would earn a bonus larger than the whole
        // time budget and then freeze into best_time_ms.
        let negative_time = SubmitPlayRequest { elapsed_ms: -3_600_000, ..base.clone() };
        assert!(matches!(
            validate_submit_request(&negative_time),
            Err(DatabaseError::InvalidData(_))
        ));

        // Negative counters would turn penalties into score credits.
        let negative_mistakes = SubmitPlayRequest { mistakes: -5, ..base.clone() };
        assert!(validate_submit_request(&negative_mistakes).is_err());
        let negative_hints = SubmitPlayRequest { used_hints: -5, ..base.clone() };
        assert!(validate_submit_request(&negative_hints).is_err());
        let negative_undo = SubmitPlayRequest { undo_count: -1, ..base.clone() };
        assert!(validate_submit_request(&negative_undo).is_err());
        let negative_combo = SubmitPlayRequest { combo_count: -1, ..base };
        assert!(validate_submit_request(&negative_combo).is_err());
    }

    #[test]
    fn ties_do_not_count_as_improvement() {
        assert!(improves(None, 500));
        assert!(improves(Some(400), 500));
        assert!(!improves(Some(500), 500));
        assert!(!improves(Some(600), 500));
    }

    #[test]
    fn difficulty_weight_is_bounded() {
        assert_eq!(difficulty_weight(Some(1.0)), 0.5);
        assert_eq!(difficulty_weight(Some(12.0)), 1.2);
        assert_eq!(difficulty_weight(Some(90.0)), 3.0);
        assert_eq!(difficulty_weight(None), 1.0);
    }
}
