use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use crate::handlers::ApiError;
use crate::metrics::ACCESS_DENIED_TOTAL;
use crate::services::AppState;

pub const API_KEY_HEADER: &str = "x-api-key";
const TOKEN_QUERY_PARAM: &str = "token";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Carrier {
    Bearer,
    ApiKey,
    QueryToken,
}

impl Carrier {
    fn as_str(self) -> &'static str {
        match self {
            Carrier::Bearer => "bearer",
            Carrier::ApiKey => "api_key",
            Carrier::QueryToken => "query",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    Missing,
    Mismatch,
}

impl Denial {
    fn reason(self) -> &'static str {
        match self {
            Denial::Missing => "missing",
            Denial::Mismatch => "mismatch",
        }
    }
}

/// Returns the first credential present, checking the bearer header, then
/// `X-API-Key`, then the `token` query parameter.
pub fn extract_credential(headers: &HeaderMap, query: Option<&str>) -> Option<(Carrier, String)> {
    if let Some(token) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
    {
        return Some((Carrier::Bearer, token.to_string()));
    }

    if let Some(token) = headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok()) {
        return Some((Carrier::ApiKey, token.to_string()));
    }

    query.and_then(|query| {
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == TOKEN_QUERY_PARAM)
            .map(|(_, value)| (Carrier::QueryToken, value.into_owned()))
    })
}

/// Byte-for-byte comparison. An empty configured secret admits nobody.
pub fn verify(secret: &str, presented: Option<&str>) -> Result<(), Denial> {
    let presented = presented.ok_or(Denial::Missing)?;
    if secret.is_empty() || presented.as_bytes() != secret.as_bytes() {
        return Err(Denial::Mismatch);
    }
    Ok(())
}

/// Shared-secret guard for organizer endpoints
pub async fn access_guard_middleware(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let credential = extract_credential(&headers, request.uri().query());
    let carrier = credential.as_ref().map(|(carrier, _)| carrier.as_str());

    if let Err(denial) = verify(
        &state.config.admin_token,
        credential.as_ref().map(|(_, token)| token.as_str()),
    ) {
        ACCESS_DENIED_TOTAL.with_label_values(&[denial.reason()]).inc();
        tracing::warn!(
            path = %request.uri().path(),
            reason = denial.reason(),
            carrier = carrier.unwrap_or("none"),
            "Access denied"
        );
        return Err(ApiError::unauthorized(match denial {
            Denial::Missing => "Missing access token",
            Denial::Mismatch => "Invalid access token",
        }));
    }

    tracing::debug!(carrier = carrier.unwrap_or("none"), "Access granted");
    Ok(next.run(request).await)
}
