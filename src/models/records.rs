use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use sqlx::types::Json;

/// Puzzle lifecycle statuses as stored in the `status` column.
pub mod status {
    pub const DRAFT: &str = "DRAFT";
    pub const APPROVED: &str = "APPROVED";
    pub const OFFICIAL: &str = "OFFICIAL";
    pub const REJECTED: &str = "REJECTED";

    pub fn is_known(s: &str) -> bool {
        matches!(s, DRAFT | APPROVED | OFFICIAL | REJECTED)
    }
}

/// One puzzle. The grid itself is immutable after creation; only the
/// running stats and resolved metadata columns ever change.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PuzzleRecord {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub width: i32,
    pub height: i32,
    pub status: String,
    pub difficulty_score: Option<f64>,
    pub content_style: String,
    pub tags: Json<Vec<String>>,
    /// Registered user id or anonymous device id; one opaque string either way.
    pub author_key: String,
    pub play_count: i64,
    pub clear_count: i64,
    pub average_time_ms: f64,
    pub average_rating: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PuzzleRecord {
    /// clearCount / playCount clamped to [0, 1]; 0 when the puzzle has no plays.
    pub fn clear_rate(&self) -> f64 {
        if self.play_count <= 0 {
            return 0.0;
        }
        (self.clear_count as f64 / self.play_count as f64).clamp(0.0, 1.0)
    }
}

/// Derived row/column clues, one-to-one with a puzzle.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PuzzleHintRecord {
    pub puzzle_id: i64,
    pub row_clues: Json<Vec<Vec<i32>>>,
    pub col_clues: Json<Vec<Vec<i32>>>,
    pub version: i32,
}

/// The curated lineup for one calendar date.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DailyPickRecord {
    pub pick_date: NaiveDate,
    pub puzzle_ids: Json<Vec<i64>>,
    pub generated_at: DateTime<Utc>,
}

/// Play attempt statuses as stored in the `status` column.
pub mod play_status {
    pub const STARTED: &str = "STARTED";
    pub const SUBMITTED: &str = "SUBMITTED";
}

/// One play attempt. Created once at start, finalized once at submit.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PlayRecord {
    pub id: i64,
    pub puzzle_id: i64,
    pub subject_key: String,
    pub mode: String,
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub mistakes: i32,
    pub used_hints: i32,
    pub undo_count: i32,
    pub combo_count: i32,
    pub progress: Option<Value>,
    pub state_token: String,
}

/// Best-of record per (puzzle, subject, mode) — not a history.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ScoreRecord {
    pub puzzle_id: i64,
    pub subject_key: String,
    pub mode: String,
    pub best_score: i64,
    pub best_time_ms: i64,
    pub perfect_clear: bool,
    pub updated_at: DateTime<Utc>,
}

/// One row of the raw-aggregation leaderboard fallback query.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ScoreAggregateRow {
    pub subject_key: String,
    pub total_score: i64,
    pub best_time_ms: i64,
    pub perfect_clear: bool,
    pub updated_at: DateTime<Utc>,
}
