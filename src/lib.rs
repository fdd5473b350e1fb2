pub mod api;
pub mod clock;
pub mod daily;
pub mod db;
pub mod leaderboard;
pub mod models;
pub mod play;
pub mod puzzle;
pub mod scoring;

// Re-export commonly used types
pub use clock::{Clock, FixedClock, SystemClock};
pub use db::{get_pool, health_check, init_pool, DatabaseError};
pub use leaderboard::{LeaderboardService, MemoryRankingStore, PlayResultEvent};
pub use puzzle::{analyze_grid, validate_submission, GridAnalysis};
pub use scoring::{calculate_score, ScoreBreakdown, ScoreInput, ScoringConfig};
