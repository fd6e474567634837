use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use super::ApiError;
use crate::extractors::AppQuery;
use crate::models::{Completion, CompletionStats};
use crate::services::results_service::RowFormat;
use crate::services::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct LeaderboardQuery {
    pub limit: Option<u64>,
    pub difficulty: Option<i64>,
    #[serde(default)]
    pub format: RowFormat,
}

pub async fn get_leaderboard(
    State(state): State<Arc<AppState>>,
    AppQuery(query): AppQuery<LeaderboardQuery>,
) -> Result<Json<Vec<Completion>>, ApiError> {
    let rows = state
        .results()
        .leaderboard(query.limit, query.difficulty)
        .await?;
    Ok(Json(rows))
}

pub async fn get_joined_leaderboard(
    State(state): State<Arc<AppState>>,
    AppQuery(query): AppQuery<LeaderboardQuery>,
) -> Result<Json<Vec<Value>>, ApiError> {
    let rows = state
        .results()
        .joined_leaderboard(query.limit, query.difficulty, query.format)
        .await?;
    Ok(Json(rows))
}

pub async fn get_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<CompletionStats>, ApiError> {
    Ok(Json(state.results().stats().await?))
}
