use once_cell::sync::OnceCell;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::info;

use crate::db::errors::{DatabaseError, Result};

static DB_POOL: OnceCell<PgPool> = OnceCell::new();

/// Initialize the database connection pool.
/// This should be called once at application startup.
pub async fn init_pool() -> Result<()> {
    let database_url = std::env::var("DATABASE_URL").map_err(|_| {
        DatabaseError::ConnectionError("DATABASE_URL environment variable not set".to_string())
    })?;

    info!("Initializing database connection pool");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .min_connections(0)
        .acquire_timeout(Duration::from_secs(3))
        .idle_timeout(Duration::from_secs(10))
        .max_lifetime(Duration::from_secs(300))
        .test_before_acquire(true)
        .connect_lazy(&database_url)
        .map_err(|e| DatabaseError::ConnectionError(format!("Failed to create pool: {}", e)))?;

    sqlx::query("SELECT 1")
        .fetch_one(&pool)
        .await
        .map_err(|e| DatabaseError::ConnectionError(format!("Failed to test connection: {}", e)))?;

    DB_POOL
        .set(pool)
        .map_err(|_| DatabaseError::ConnectionError("Pool already initialized".to_string()))?;

    info!("Database connection pool initialized successfully");
    Ok(())
}

/// Get a reference to the database pool.
pub fn get_pool() -> Result<&'static PgPool> {
    DB_POOL.get().ok_or_else(|| {
        DatabaseError::ConnectionError(
            "Database pool not initialized. Call init_pool() first".to_string(),
        )
    })
}

/// Health check for the database connection.
pub async fn health_check() -> Result<()> {
    let pool = get_pool()?;

    sqlx::query("SELECT 1")
        .fetch_one(pool)
        .await
        .map_err(|e| DatabaseError::ConnectionError(format!("Health check failed: {}", e)))?;

    Ok(())
}
