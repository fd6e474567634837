use axum::{
    extract::{FromRequest, FromRequestParts, Query, Request},
    http::request::Parts,
    Json,
};

use crate::handlers::ApiError;

/// JSON body extractor that rejects with a JSON error body instead of text
pub struct AppJson<T>(pub T);

impl<T, S> FromRequest<S> for AppJson<T>
where
    T: serde::de::DeserializeOwned + 'static,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(AppJson(value)),
            Err(rejection) => {
                let message = format!(
                    "Failed to parse JSON request body: {}",
                    rejection.body_text()
                );
                tracing::warn!("{}", message);
                Err(ApiError::bad_request(message))
            }
        }
    }
}

/// Query string extractor with the same JSON rejection shape as [`AppJson`]
pub struct AppQuery<T>(pub T);

impl<T, S> FromRequestParts<S> for AppQuery<T>
where
    T: serde::de::DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => Ok(AppQuery(value)),
            Err(rejection) => {
                let message = format!("Invalid query parameters: {}", rejection.body_text());
                tracing::warn!("{}", message);
                Err(ApiError::bad_request(message))
            }
        }
    }
}
