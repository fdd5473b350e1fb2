use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use tracing::info;

use crate::api::error::ApiResult;
use crate::api::server::AppState;
use crate::models::api::{
    CreatePuzzleRequest, CreatePuzzleResponse, ListPuzzlesResponse, PuzzleDetail,
};
use crate::puzzle::service;

#[derive(Debug, Deserialize)]
pub struct ListQueryParams {
    /// Opaque "status:page" token from a previous page.
    pub token: Option<String>,
}

#[tracing::instrument(skip(state, req), fields(title = %req.title))]
pub async fn create_puzzle_handler(
    State(state): State<AppState>,
    Json(req): Json<CreatePuzzleRequest>,
) -> ApiResult<Json<CreatePuzzleResponse>> {
    info!("Processing puzzle creation");
    let response = service::create_puzzle(&state.pool, &req).await?;
    Ok(Json(response))
}

#[tracing::instrument(skip(state, params))]
pub async fn list_puzzles_handler(
    State(state): State<AppState>,
    Query(params): Query<ListQueryParams>,
) -> ApiResult<Json<ListPuzzlesResponse>> {
    let response = service::list_puzzles(&state.pool, params.token.as_deref()).await?;
    Ok(Json(response))
}

#[tracing::instrument(skip(state))]
pub async fn get_puzzle_handler(
    State(state): State<AppState>,
    Path(puzzle_id): Path<i64>,
) -> ApiResult<Json<PuzzleDetail>> {
    let response = service::get_puzzle(&state.pool, puzzle_id).await?;
    Ok(Json(response))
}
