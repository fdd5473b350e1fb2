use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Database connection error: {0}")]
    ConnectionError(String),

    #[error("Query execution error: {0}")]
    QueryError(#[from] sqlx::Error),

    #[error("Transaction error: {0}")]
    TransactionError(String),

    #[error("Integrity constraint violation: {0}")]
    IntegrityError(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Ownership mismatch: {0}")]
    Ownership(String),
}

impl DatabaseError {
    /// Check if this is an integrity constraint violation (e.g. a concurrent
    /// insert hitting the solution checksum unique index).
    pub fn is_integrity_error(&self) -> bool {
        match self {
            Self::IntegrityError(_) => true,
            Self::QueryError(e) => {
                if let Some(db_error) = e.as_database_error() {
                    // PostgreSQL integrity constraint violation codes
                    matches!(
                        db_error.code().as_deref(),
                        Some("23505") | // unique_violation
                        Some("23503") | // foreign_key_violation
                        Some("23502") // not_null_violation
                    )
                } else {
                    false
                }
            }
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, DatabaseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integrity_detection_covers_the_explicit_variant_only() {
        assert!(DatabaseError::IntegrityError("duplicate".to_string()).is_integrity_error());
        assert!(!DatabaseError::InvalidData("bad".to_string()).is_integrity_error());
        assert!(!DatabaseError::Conflict("taken".to_string()).is_integrity_error());
        assert!(!DatabaseError::QueryError(sqlx::Error::RowNotFound).is_integrity_error());
    }
}
