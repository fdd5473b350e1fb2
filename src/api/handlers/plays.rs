use axum::{
    extract::{Path, State},
    Json,
};
use tracing::info;

use crate::api::error::ApiResult;
use crate::api::server::AppState;
use crate::models::api::{
    AutosaveRequest, StartPlayRequest, StartPlayResponse, SubmitPlayRequest, SubmitPlayResponse,
};
use crate::play;

#[tracing::instrument(skip(state, req), fields(puzzle_id = req.puzzle_id))]
pub async fn start_play_handler(
    State(state): State<AppState>,
    Json(req): Json<StartPlayRequest>,
) -> ApiResult<Json<StartPlayResponse>> {
    let response = play::start_play(&state.pool, state.clock.as_ref(), &req).await?;
    Ok(Json(response))
}

#[tracing::instrument(skip(state, req))]
pub async fn autosave_handler(
    State(state): State<AppState>,
    Path(play_id): Path<i64>,
    Json(req): Json<AutosaveRequest>,
) -> ApiResult<()> {
    play::autosave(&state.pool, play_id, &req).await?;
    Ok(())
}

#[tracing::instrument(skip(state, req), fields(play_id = play_id))]
pub async fn submit_play_handler(
    State(state): State<AppState>,
    Path(play_id): Path<i64>,
    Json(req): Json<SubmitPlayRequest>,
) -> ApiResult<Json<SubmitPlayResponse>> {
    info!("Processing play submission");
    let response = play::submit_play(
        &state.pool,
        &state.leaderboard,
        &state.scoring,
        state.clock.as_ref(),
        play_id,
        &req,
    )
    .await?;
    Ok(Json(response))
}
