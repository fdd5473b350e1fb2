use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use crate::api::error::ApiResult;
use crate::api::server::AppState;
use crate::leaderboard::windows::Window;
use crate::models::api::{default_mode, LeaderboardResponse};

#[derive(Debug, Deserialize)]
pub struct LeaderboardQueryParams {
    #[serde(default = "default_window")]
    pub window: String,
    #[serde(default = "default_mode")]
    pub mode: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Required for the author window.
    pub author: Option<String>,
}

fn default_window() -> String {
    "global".to_string()
}

fn default_limit() -> usize {
    10
}

#[tracing::instrument(skip(state, params))]
pub async fn leaderboard_handler(
    State(state): State<AppState>,
    Query(params): Query<LeaderboardQueryParams>,
) -> ApiResult<Json<LeaderboardResponse>> {
    let window = Window::parse(&params.window)?;

    let entries = state
        .leaderboard
        .fetch(
            &state.pool,
            window,
            &params.mode,
            params.author.as_deref(),
            params.limit,
        )
        .await?;

    Ok(Json(LeaderboardResponse {
        window: window.as_str().to_string(),
        mode: params.mode,
        entries,
    }))
}
