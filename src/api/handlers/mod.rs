pub mod daily;
pub mod leaderboard;
pub mod plays;
pub mod puzzles;
