use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Puzzle submission payload. The grid arrives as ordered row strings of
/// '1' (filled) and '0' (empty) characters.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePuzzleRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub width: i32,
    pub height: i32,
    pub grid: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "default_content_style")]
    pub content_style: String,
    #[serde(default = "default_author_key")]
    pub author_key: String,
}

fn default_content_style() -> String {
    "classic".to_string()
}

fn default_author_key() -> String {
    "anonymous".to_string()
}

/// Resolved metadata echoed back from puzzle creation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedMetadata {
    pub content_style: String,
    pub text_score: f64,
    pub tags: Vec<String>,
    pub uniqueness: bool,
    pub difficulty_score: f64,
    pub difficulty_category: String,
    pub estimated_time_ms: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePuzzleResponse {
    pub puzzle_id: i64,
    pub status: String,
    pub metadata: ResolvedMetadata,
}

/// Public puzzle summary used by listings and the daily lineup.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PuzzleSummary {
    pub id: i64,
    pub title: String,
    pub width: i32,
    pub height: i32,
    pub status: String,
    pub difficulty_score: Option<f64>,
    pub difficulty_category: Option<String>,
    pub content_style: String,
    pub tags: Vec<String>,
    pub author_key: String,
    pub play_count: i64,
    pub clear_count: i64,
    pub average_rating: f64,
    pub created_at: DateTime<Utc>,
}

/// Full public detail view. Carries the clue arrays; never the solution.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PuzzleDetail {
    #[serde(flatten)]
    pub summary: PuzzleSummary,
    pub description: String,
    pub average_time_ms: f64,
    pub row_clues: Vec<Vec<i32>>,
    pub col_clues: Vec<Vec<i32>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPuzzlesResponse {
    pub items: Vec<PuzzleSummary>,
    /// Opaque "status:page" continuation token; absent on the last page.
    pub next_token: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyPickResponse {
    pub date: NaiveDate,
    pub items: Vec<PuzzleSummary>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartPlayRequest {
    pub puzzle_id: i64,
    pub subject_key: String,
    #[serde(default = "default_mode")]
    pub mode: String,
}

pub fn default_mode() -> String {
    "standard".to_string()
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartPlayResponse {
    pub play_id: i64,
    pub state_token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutosaveRequest {
    pub progress: Value,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitPlayRequest {
    pub subject_key: String,
    pub elapsed_ms: i64,
    #[serde(default)]
    pub mistakes: i32,
    #[serde(default)]
    pub used_hints: i32,
    #[serde(default)]
    pub undo_count: i32,
    #[serde(default)]
    pub combo_count: i32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitPlayResponse {
    pub score: i64,
    pub elapsed_ms: i64,
    pub combo_bonus: i64,
    pub perfect_clear: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leaderboard_rank: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub rank: i64,
    pub subject_key: String,
    pub score: i64,
    pub time_ms: i64,
    pub combo: i32,
    pub perfect: bool,
    pub mode: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardResponse {
    pub window: String,
    pub mode: String,
    pub entries: Vec<LeaderboardEntry>,
}
