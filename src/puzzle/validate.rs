use crate::db::errors::{DatabaseError, Result};
use crate::models::api::CreatePuzzleRequest;

pub const MIN_DIMENSION: i32 = 5;
pub const MAX_DIMENSION: i32 = 50;
pub const MAX_TAGS: usize = 10;
pub const MAX_TAG_LENGTH: usize = 32;
pub const FILLED: char = '1';
pub const EMPTY: char = '0';

/// Reject malformed puzzle submissions before any analysis runs.
///
/// Fails fast with the first violated rule and never mutates state.
pub fn validate_submission(req: &CreatePuzzleRequest) -> Result<()> {
    if req.width < MIN_DIMENSION || req.width > MAX_DIMENSION {
        return Err(DatabaseError::InvalidData(format!(
            "width must be between {} and {}, got {}",
            MIN_DIMENSION, MAX_DIMENSION, req.width
        )));
    }
    if req.height < MIN_DIMENSION || req.height > MAX_DIMENSION {
        return Err(DatabaseError::InvalidData(format!(
            "height must be between {} and {}, got {}",
            MIN_DIMENSION, MAX_DIMENSION, req.height
        )));
    }
    if req.grid.len() != req.height as usize {
        return Err(DatabaseError::InvalidData(format!(
            "grid must have {} rows, got {}",
            req.height,
            req.grid.len()
        )));
    }
    for (i, row) in req.grid.iter().enumerate() {
        if row.chars().count() != req.width as usize {
            return Err(DatabaseError::InvalidData(format!(
                "row {} must have {} cells, got {}",
                i,
                req.width,
                row.chars().count()
            )));
        }
        if let Some(c) = row.chars().find(|&c| c != FILLED && c != EMPTY) {
            return Err(DatabaseError::InvalidData(format!(
                "row {} contains invalid cell '{}'; only '{}' and '{}' are allowed",
                i, c, FILLED, EMPTY
            )));
        }
    }
    if req.tags.len() > MAX_TAGS {
        return Err(DatabaseError::InvalidData(format!(
            "at most {} tags allowed, got {}",
            MAX_TAGS,
            req.tags.len()
        )));
    }
    if let Some(tag) = req.tags.iter().find(|t| t.chars().count() > MAX_TAG_LENGTH) {
        return Err(DatabaseError::InvalidData(format!(
            "tag '{}' exceeds {} characters",
            tag, MAX_TAG_LENGTH
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(width: i32, height: i32, grid: Vec<&str>) -> CreatePuzzleRequest {
        CreatePuzzleRequest {
            title: "Test".to_string(),
            description: String::new(),
            width,
            height,
            grid: grid.into_iter().map(String::from).collect(),
            tags: vec![],
            content_style: "classic".to_string(),
            author_key: "author-1".to_string(),
        }
    }

    #[test]
    fn accepts_minimal_valid_grid() {
        let req = request(5, 5, vec!["10101", "01010", "10101", "01010", "10101"]);
        assert!(validate_submission(&req).is_ok());
    }

    #[test]
    fn rejects_out_of_range_dimensions() {
        let req = request(4, 5, vec!["1010", "0101", "1010", "0101", "1010"]);
        assert!(matches!(
            validate_submission(&req),
            Err(DatabaseError::InvalidData(_))
        ));

        let mut req = request(5, 5, vec!["10101"; 5]);
        req.height = 51;
        assert!(validate_submission(&req).is_err());
    }

    #[test]
    fn rejects_row_length_mismatch() {
        let req = request(5, 5, vec!["10101", "0101", "10101", "01010", "10101"]);
        let err = validate_submission(&req).unwrap_err();
        assert!(err.to_string().contains("row 1"));
    }

    #[test]
    fn rejects_invalid_cell_characters() {
        let req = request(5, 5, vec!["10101", "01010", "10x01", "01010", "10101"]);
        let err = validate_submission(&req).unwrap_err();
        assert!(err.to_string().contains("invalid cell"));
    }

    #[test]
    fn rejects_too_many_tags() {
        let mut req = request(5, 5, vec!["10101"; 5]);
        req.tags = (0..11).map(|i| format!("tag{}", i)).collect();
        assert!(validate_submission(&req).is_err());
    }

    #[test]
    fn rejects_overlong_tag() {
        let mut req = request(5, 5, vec!["10101"; 5]);
        req.tags = vec!["x".repeat(33)];
        assert!(validate_submission(&req).is_err());
    }
}
