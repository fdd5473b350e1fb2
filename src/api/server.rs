use axum::{
    routing::{get, post, put},
    Json, Router,
};
use sqlx::PgPool;
use std::env;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::api::error::{ApiError, ApiResult};
use crate::api::handlers::daily::{get_daily_handler, regenerate_daily_handler};
use crate::api::handlers::leaderboard::leaderboard_handler;
use crate::api::handlers::plays::{autosave_handler, start_play_handler, submit_play_handler};
use crate::api::handlers::puzzles::{
    create_puzzle_handler, get_puzzle_handler, list_puzzles_handler,
};
use crate::clock::{Clock, SystemClock};
use crate::daily::scheduler::spawn_daily_curation;
use crate::daily::CuratorConfig;
use crate::db::connection;
use crate::leaderboard::{LeaderboardService, MemoryRankingStore};
use crate::scoring::ScoringConfig;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub leaderboard: LeaderboardService,
    pub scoring: ScoringConfig,
    pub curator: CuratorConfig,
    pub clock: Arc<dyn Clock>,
}

pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn,hyper=warn,tower=warn")),
        )
        .init();
}

pub fn build_state(pool: PgPool) -> AppState {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store = Arc::new(MemoryRankingStore::new(clock.clone()));

    AppState {
        pool,
        leaderboard: LeaderboardService::new(store, clock.clone()),
        scoring: ScoringConfig::from_env(),
        curator: CuratorConfig::default(),
        clock,
    }
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/puzzles", post(create_puzzle_handler).get(list_puzzles_handler))
        .route("/puzzles/:id", get(get_puzzle_handler))
        .route("/daily", get(get_daily_handler))
        .route("/daily/regenerate", post(regenerate_daily_handler))
        .route("/plays", post(start_play_handler))
        .route("/plays/:id/progress", put(autosave_handler))
        .route("/plays/:id/submit", post(submit_play_handler))
        .route("/leaderboard", get(leaderboard_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_handler() -> ApiResult<Json<serde_json::Value>> {
    connection::health_check()
        .await
        .map_err(|e| ApiError::Database(e.to_string()))?;
    Ok(Json(serde_json::json!({ "status": "ok" })))
}

pub async fn run_server() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    connection::init_pool().await?;
    let pool = connection::get_pool()?.clone();

    let state = build_state(pool.clone());
    spawn_daily_curation(pool, state.clock.clone(), state.curator.clone());

    let app = create_app(state);

    let port: u16 = env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
