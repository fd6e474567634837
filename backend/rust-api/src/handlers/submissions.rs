use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use std::sync::Arc;

use super::ApiError;
use crate::extractors::{AppJson, AppQuery};
use crate::models::{CompletionPayload, QuizPayload};
use crate::services::duplicate_service::{DuplicateQuizCheck, EmailCheck};
use crate::services::results_service::Created;
use crate::services::AppState;

#[derive(Debug, Deserialize)]
pub struct DuplicateQuizQuery {
    pub email: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EmailQuery {
    pub email: Option<String>,
}

pub async fn submit_completion(
    State(state): State<Arc<AppState>>,
    AppJson(payload): AppJson<CompletionPayload>,
) -> Result<(StatusCode, Json<Created>), ApiError> {
    let created = state.results().submit_completion(payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn submit_quiz_answers(
    State(state): State<Arc<AppState>>,
    AppJson(payload): AppJson<QuizPayload>,
) -> Result<(StatusCode, Json<Created>), ApiError> {
    let created = state.results().submit_quiz_answers(payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn check_duplicate_quiz(
    State(state): State<Arc<AppState>>,
    AppQuery(query): AppQuery<DuplicateQuizQuery>,
) -> Result<Json<DuplicateQuizCheck>, ApiError> {
    let check = state
        .results()
        .check_duplicate_quiz(query.email.as_deref(), query.name.as_deref())
        .await?;
    Ok(Json(check))
}

pub async fn check_email(
    State(state): State<Arc<AppState>>,
    AppQuery(query): AppQuery<EmailQuery>,
) -> Result<Json<EmailCheck>, ApiError> {
    let check = state
        .results()
        .check_duplicate_email(query.email.as_deref())
        .await?;
    Ok(Json(check))
}
