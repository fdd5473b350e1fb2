use sha2::{Digest, Sha256};

use crate::puzzle::validate::FILLED;

/// Milliseconds of solve budget per cell before the density factor.
const TIME_PER_CELL_MS: f64 = 1500.0;
const DENSE_THRESHOLD: f64 = 0.5;
const SMALL_MAX_CELLS: i32 = 100;
const MEDIUM_MAX_CELLS: i32 = 400;

pub const EASY_MAX_SCORE: f64 = 8.0;
pub const MEDIUM_MAX_SCORE: f64 = 15.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DifficultyTier {
    Easy,
    Medium,
    Hard,
}

impl DifficultyTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            DifficultyTier::Easy => "EASY",
            DifficultyTier::Medium => "MEDIUM",
            DifficultyTier::Hard => "HARD",
        }
    }
}

/// Coarse tier bucket for a continuous difficulty score.
pub fn difficulty_tier(score: f64) -> DifficultyTier {
    if score < EASY_MAX_SCORE {
        DifficultyTier::Easy
    } else if score < MEDIUM_MAX_SCORE {
        DifficultyTier::Medium
    } else {
        DifficultyTier::Hard
    }
}

/// Everything the metadata resolver derives from a validated grid.
#[derive(Debug, Clone)]
pub struct GridAnalysis {
    pub row_clues: Vec<Vec<i32>>,
    pub col_clues: Vec<Vec<i32>>,
    pub density: f64,
    pub difficulty_score: f64,
    pub estimated_time_ms: i64,
    pub checksum: String,
    pub tags: Vec<String>,
}

/// Derive clues, checksum, difficulty and tag buckets from a validated grid.
///
/// The difficulty formula (density*5 + cells/10) is an explicit product
/// heuristic, kept as-is rather than "fixed".
pub fn analyze_grid(grid: &[String]) -> GridAnalysis {
    let height = grid.len();
    let width = grid.first().map(|r| r.chars().count()).unwrap_or(0);
    let total_cells = (width * height) as i32;

    let cells: Vec<Vec<bool>> = grid
        .iter()
        .map(|row| row.chars().map(|c| c == FILLED).collect())
        .collect();

    let row_clues: Vec<Vec<i32>> = cells.iter().map(|row| line_clues(row.iter().copied())).collect();
    let col_clues: Vec<Vec<i32>> = (0..width)
        .map(|x| line_clues(cells.iter().map(|row| row[x])))
        .collect();

    let filled = cells.iter().flatten().filter(|&&c| c).count();
    let density = if total_cells > 0 {
        filled as f64 / total_cells as f64
    } else {
        0.0
    };

    let difficulty_score = density * 5.0 + total_cells as f64 / 10.0;
    let estimated_time_ms = (total_cells as f64 * (1.0 + density) * TIME_PER_CELL_MS) as i64;

    let mut hasher = Sha256::new();
    for row in grid {
        hasher.update(row.as_bytes());
    }
    let checksum = format!("{:x}", hasher.finalize());

    let size_tag = if total_cells <= SMALL_MAX_CELLS {
        "small"
    } else if total_cells <= MEDIUM_MAX_CELLS {
        "medium"
    } else {
        "large"
    };
    let density_tag = if density >= DENSE_THRESHOLD {
        "dense"
    } else {
        "sparse"
    };

    GridAnalysis {
        row_clues,
        col_clues,
        density,
        difficulty_score,
        estimated_time_ms,
        checksum,
        tags: vec![size_tag.to_string(), density_tag.to_string()],
    }
}

/// Run-length encode one row or column: split on empty runs, keep the
/// lengths of the filled runs. An all-empty line yields an empty clue list.
fn line_clues(cells: impl Iterator<Item = bool>) -> Vec<i32> {
    let mut clues = Vec::new();
    let mut run = 0;
    for filled in cells {
        if filled {
            run += 1;
        } else if run > 0 {
            clues.push(run);
            run = 0;
        }
    }
    if run > 0 {
        clues.push(run);
    }
    clues
}

/// Crude title/description quality signal in [0, 1], reported back to the
/// submitter alongside the grid-derived metadata.
pub fn text_score(title: &str, description: &str) -> f64 {
    let len = title.trim().chars().count() + description.trim().chars().count();
    (len as f64 / 80.0).min(1.0)
}

/// Serialize the grid to the solution byte blob the checksum covers.
pub fn solution_bytes(grid: &[String]) -> Vec<u8> {
    grid.iter().flat_map(|row| row.bytes()).collect()
}
