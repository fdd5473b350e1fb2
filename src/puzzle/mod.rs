pub mod analyze;
pub mod service;
pub mod validate;

pub use analyze::{analyze_grid, difficulty_tier, DifficultyTier, GridAnalysis};
pub use service::{create_puzzle, get_puzzle, list_puzzles};
pub use validate::validate_submission;
