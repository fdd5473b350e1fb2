use axum::{
    extract::{Query, State},
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::info;

use crate::api::error::ApiResult;
use crate::api::server::AppState;
use crate::daily;
use crate::db::read_ops;
use crate::models::api::{DailyPickResponse, PuzzleSummary};
use crate::puzzle::service::summarize;

#[derive(Debug, Deserialize)]
pub struct DailyQueryParams {
    /// Defaults to today (UTC).
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct RegenerateQueryParams {
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub force: bool,
}

/// The day's lineup, generating it on demand if the scheduler has not run.
#[tracing::instrument(skip(state, params))]
pub async fn get_daily_handler(
    State(state): State<AppState>,
    Query(params): Query<DailyQueryParams>,
) -> ApiResult<Json<DailyPickResponse>> {
    let date = params.date.unwrap_or_else(|| state.clock.today());

    let pick = daily::curate(&state.pool, state.clock.as_ref(), &state.curator, date, false).await?;
    let items = summaries_in_pick_order(&state, &pick.puzzle_ids.0).await?;

    Ok(Json(DailyPickResponse { date, items }))
}

/// Manual curation trigger. Unlike the scheduled run, failures here
/// propagate to the caller.
#[tracing::instrument(skip(state, params))]
pub async fn regenerate_daily_handler(
    State(state): State<AppState>,
    Query(params): Query<RegenerateQueryParams>,
) -> ApiResult<Json<DailyPickResponse>> {
    let date = params.date.unwrap_or_else(|| state.clock.today());
    info!(%date, force = params.force, "Manual daily curation requested");

    let pick = daily::curate(
        &state.pool,
        state.clock.as_ref(),
        &state.curator,
        date,
        params.force,
    )
    .await?;
    let items = summaries_in_pick_order(&state, &pick.puzzle_ids.0).await?;

    Ok(Json(DailyPickResponse { date, items }))
}

async fn summaries_in_pick_order(state: &AppState, ids: &[i64]) -> ApiResult<Vec<PuzzleSummary>> {
    let puzzles = read_ops::load_puzzles_by_ids(&state.pool, ids).await?;
    let by_id: HashMap<i64, _> = puzzles.iter().map(|p| (p.id, p)).collect();
    Ok(ids
        .iter()
        .filter_map(|id| by_id.get(id).map(|p| summarize(p)))
        .collect())
}
