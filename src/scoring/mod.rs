pub mod calculation;

pub use calculation::{calculate_score, ScoreBreakdown, ScoreInput, ScoringConfig};
