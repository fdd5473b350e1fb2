use sqlx::PgPool;
use tracing::{error, info};

use crate::db::errors::{DatabaseError, Result};
use crate::db::{read_ops, write_ops};
use crate::models::api::{
    CreatePuzzleRequest, CreatePuzzleResponse, ListPuzzlesResponse, PuzzleDetail, PuzzleSummary,
    ResolvedMetadata,
};
use crate::models::records::{status, PuzzleHintRecord, PuzzleRecord};
use crate::puzzle::analyze::{analyze_grid, difficulty_tier, solution_bytes, text_score};
use crate::puzzle::validate::validate_submission;

const PAGE_SIZE: i64 = 20;

/// Create a puzzle: validate, analyze, dedup by checksum, then persist
/// puzzle + hints + solution as one transaction. The puzzle row is written
/// first because the dependent rows need its generated id, and the resolved
/// metadata is written back in a second step within the same transaction.
#[tracing::instrument(skip(pool, req), fields(title = %req.title))]
pub async fn create_puzzle(pool: &PgPool, req: &CreatePuzzleRequest) -> Result<CreatePuzzleResponse> {
    validate_submission(req)?;

    let analysis = analyze_grid(&req.grid);

    if let Some(existing) = read_ops::find_puzzle_by_checksum(pool, &analysis.checksum).await? {
        info!(existing, "Rejecting duplicate solution checksum");
        return Err(DatabaseError::Conflict(format!(
            "An identical solution already exists (puzzle {})",
            existing
        )));
    }

    let tags = merge_tags(&req.tags, &analysis.tags);

    let mut tx = pool
        .begin()
        .await
        .map_err(|e| DatabaseError::TransactionError(format!("Failed to start transaction: {}", e)))?;

    let result = persist_puzzle(&mut tx, req, &analysis, &tags).await;

    let puzzle_id = match result {
        Ok(id) => {
            tx.commit().await.map_err(|e| {
                DatabaseError::TransactionError(format!("Failed to commit transaction: {}", e))
            })?;
            id
        }
        Err(e) => {
            // Transaction rolls back when dropped; nothing was persisted.
            error!("Puzzle creation failed: {}", e);
            return Err(e);
        }
    };

    Ok(CreatePuzzleResponse {
        puzzle_id,
        status: status::APPROVED.to_string(),
        metadata: ResolvedMetadata {
            content_style: req.content_style.clone(),
            text_score: text_score(&req.title, &req.description),
            tags,
            uniqueness: true,
            difficulty_score: analysis.difficulty_score,
            difficulty_category: difficulty_tier(analysis.difficulty_score).as_str().to_string(),
            estimated_time_ms: analysis.estimated_time_ms,
        },
    })
}

async fn persist_puzzle(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    req: &CreatePuzzleRequest,
    analysis: &crate::puzzle::analyze::GridAnalysis,
    tags: &[String],
) -> Result<i64> {
    let puzzle_id = write_ops::insert_puzzle(
        tx,
        &req.title,
        &req.description,
        req.width,
        req.height,
        status::APPROVED,
        &req.content_style,
        &req.tags,
        &req.author_key,
    )
    .await?;

    write_ops::insert_hint(tx, puzzle_id, &analysis.row_clues, &analysis.col_clues).await?;
    write_ops::insert_solution(tx, puzzle_id, &solution_bytes(&req.grid), &analysis.checksum)
        .await?;
    write_ops::update_puzzle_metadata(tx, puzzle_id, analysis.difficulty_score, tags).await?;

    Ok(puzzle_id)
}

/// List puzzles by status, newest first, with an opaque "status:page"
/// continuation token. Not a keyset cursor; concurrent inserts can shift
/// pages.
#[tracing::instrument(skip(pool))]
pub async fn list_puzzles(pool: &PgPool, token: Option<&str>) -> Result<ListPuzzlesResponse> {
    let (status_filter, page) = parse_page_token(token)?;

    let mut records = read_ops::list_puzzles_page(pool, &status_filter, page, PAGE_SIZE).await?;

    let next_token = if records.len() as i64 > PAGE_SIZE {
        records.truncate(PAGE_SIZE as usize);
        Some(format!("{}:{}", status_filter, page + 1))
    } else {
        None
    };

    Ok(ListPuzzlesResponse {
        items: records.iter().map(summarize).collect(),
        next_token,
    })
}

/// Public detail view: summary, stats and clue arrays. Never the solution.
#[tracing::instrument(skip(pool), fields(puzzle_id = puzzle_id))]
pub async fn get_puzzle(pool: &PgPool, puzzle_id: i64) -> Result<PuzzleDetail> {
    let puzzle = read_ops::load_puzzle(pool, puzzle_id).await?;
    let hints = read_ops::load_hint(pool, puzzle_id).await?;
    Ok(compose_detail(&puzzle, &hints))
}

pub fn compose_detail(puzzle: &PuzzleRecord, hints: &PuzzleHintRecord) -> PuzzleDetail {
    PuzzleDetail {
        summary: summarize(puzzle),
        description: puzzle.description.clone(),
        average_time_ms: puzzle.average_time_ms,
        row_clues: hints.row_clues.0.clone(),
        col_clues: hints.col_clues.0.clone(),
    }
}

pub fn summarize(puzzle: &PuzzleRecord) -> PuzzleSummary {
    PuzzleSummary {
        id: puzzle.id,
        title: puzzle.title.clone(),
        width: puzzle.width,
        height: puzzle.height,
        status: puzzle.status.clone(),
        difficulty_score: puzzle.difficulty_score,
        difficulty_category: puzzle
            .difficulty_score
            .map(|s| difficulty_tier(s).as_str().to_string()),
        content_style: puzzle.content_style.clone(),
        tags: puzzle.tags.0.clone(),
        author_key: puzzle.author_key.clone(),
        play_count: puzzle.play_count,
        clear_count: puzzle.clear_count,
        average_rating: puzzle.average_rating,
        created_at: puzzle.created_at,
    }
}

fn merge_tags(submitted: &[String], derived: &[String]) -> Vec<String> {
    let mut tags: Vec<String> = Vec::with_capacity(submitted.len() + derived.len());
    for tag in submitted.iter().chain(derived.iter()) {
        if !tags.iter().any(|t| t == tag) {
            tags.push(tag.clone());
        }
    }
    tags
}

fn parse_page_token(token: Option<&str>) -> Result<(String, i64)> {
    match token {
        None => Ok((status::APPROVED.to_string(), 0)),
        Some(raw) => {
            let (status_part, page_part) = raw.rsplit_once(':').ok_or_else(|| {
                DatabaseError::InvalidData(format!("Malformed page token '{}'", raw))
            })?;
            if !status::is_known(status_part) {
                return Err(DatabaseError::InvalidData(format!(
                    "Unknown status '{}' in page token",
                    status_part
                )));
            }
            let page: i64 = page_part.parse().map_err(|_| {
                DatabaseError::InvalidData(format!("Malformed page token '{}'", raw))
            })?;
            if page < 0 {
                return Err(DatabaseError::InvalidData(
                    "Page number must be non-negative".to_string(),
                ));
            }
            Ok((status_part.to_string(), page))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_tags_dedups_preserving_order() {
        let merged = merge_tags(
            &["animals".to_string(), "small".to_string()],
            &["small".to_string(), "dense".to_string()],
        );
        assert_eq!(merged, vec!["animals", "small", "dense"]);
    }

    #[test]
    fn page_token_round_trip() {
        assert_eq!(
            parse_page_token(Some("APPROVED:3")).unwrap(),
            ("APPROVED".to_string(), 3)
        );
        assert_eq!(
            parse_page_token(None).unwrap(),
            ("APPROVED".to_string(), 0)
        );
    }

    #[test]
    fn page_token_rejects_garbage() {
        assert!(parse_page_token(Some("nonsense")).is_err());
        assert!(parse_page_token(Some("APPROVED:x")).is_err());
        assert!(parse_page_token(Some("BOGUS:1")).is_err());
        assert!(parse_page_token(Some("APPROVED:-1")).is_err());
    }
}
