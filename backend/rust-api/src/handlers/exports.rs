use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use super::ApiError;
use crate::extractors::AppQuery;
use crate::services::export_service::{ExportFile, FileFormat, WebQueryKind};
use crate::services::results_service::{
    CombinedFormat, CombinedOutput, QuizExport, RowFormat, ScoresExport,
};
use crate::services::AppState;

const FORWARDED_PROTO: &str = "x-forwarded-proto";
const FORWARDED_HOST: &str = "x-forwarded-host";

#[derive(Debug, Default, Deserialize)]
pub struct QuizExportQuery {
    #[serde(default)]
    pub format: RowFormat,
}

#[derive(Debug, Default, Deserialize)]
pub struct CombinedExportQuery {
    #[serde(default)]
    pub format: CombinedFormat,
}

pub async fn export_scores(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ScoresExport>, ApiError> {
    Ok(Json(state.results().export_completions().await?))
}

pub async fn export_quiz_answers(
    State(state): State<Arc<AppState>>,
    AppQuery(query): AppQuery<QuizExportQuery>,
) -> Result<Json<QuizExport>, ApiError> {
    Ok(Json(state.results().export_quiz_answers(query.format).await?))
}

pub async fn export_quiz_csv(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let file = state.results().export_quiz_file(FileFormat::Csv).await?;
    attachment(file, false)
}

pub async fn export_quiz_xlsx(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let file = state.results().export_quiz_file(FileFormat::Xlsx).await?;
    attachment(file, false)
}

pub async fn export_combined(
    State(state): State<Arc<AppState>>,
    AppQuery(query): AppQuery<CombinedExportQuery>,
) -> Result<Response, ApiError> {
    match state.results().export_combined(query.format).await? {
        CombinedOutput::File(file) => attachment(file, false),
        CombinedOutput::Raw(export) => Ok(Json(export).into_response()),
    }
}

pub async fn web_query(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let kind = WebQueryKind::parse(&kind).ok_or_else(|| {
        ApiError::bad_request(format!(
            "Unknown web query kind '{}'; expected scores, quiz-answers or combined",
            kind
        ))
    })?;
    let base_url = base_url(state.config.public_base_url.as_deref(), &headers)?;

    let file = state.results().web_query_descriptor(kind, &base_url)?;
    attachment(file, true)
}

/// Scheme and host the client used to reach us, honouring reverse proxy
/// headers. A configured public base URL wins.
pub fn base_url(configured: Option<&str>, headers: &HeaderMap) -> Result<String, ApiError> {
    if let Some(base) = configured {
        return Ok(base.to_string());
    }

    let scheme = first_value(headers, FORWARDED_PROTO).unwrap_or("http");
    let host = first_value(headers, FORWARDED_HOST)
        .or_else(|| first_value(headers, header::HOST.as_str()))
        .ok_or_else(|| ApiError::bad_request("Cannot determine the request host"))?;

    Ok(format!("{}://{}", scheme, host))
}

/// First entry of a possibly comma-separated proxy header.
fn first_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn attachment(file: ExportFile, no_store: bool) -> Result<Response, ApiError> {
    let disposition = HeaderValue::from_str(&format!(
        "attachment; filename=\"{}\"",
        file.file_name
    ))
    .map_err(|e| ApiError::ExportGeneration(e.to_string()))?;

    let mut response = Response::new(file.bytes.into());
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(file.content_type),
    );
    headers.insert(header::CONTENT_DISPOSITION, disposition);
    if no_store {
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    }

    Ok(response)
}
