use axum::{
    extract::Request,
    http::{header, HeaderName, HeaderValue, Method},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

pub mod config;
pub mod extractors;
pub mod handlers;
pub mod metrics;
pub mod middlewares;
pub mod models;
pub mod services;
pub mod store;
pub mod utils;

pub use config::Config;
pub use services::AppState;

/// CSP middleware adds Content-Security-Policy header to all responses
async fn csp_middleware(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    response.headers_mut().insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static("default-src 'none'; frame-ancestors 'none'"),
    );
    response
}

pub fn create_router(app_state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static(middlewares::access_guard::API_KEY_HEADER),
        ])
        .allow_origin(tower_http::cors::Any);

    Router::new()
        .merge(public_routes())
        .merge(protected_routes(app_state.clone()))
        .with_state(app_state)
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(middleware::from_fn(csp_middleware))
        .layer(middleware::from_fn(
            middlewares::metrics::metrics_middleware,
        ))
        .layer(middleware::from_fn(
            middlewares::trace::trace_context_middleware,
        ))
        .layer(TraceLayer::new_for_http())
}

fn public_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/api/scores", post(handlers::submissions::submit_completion))
        .route(
            "/api/quiz-answers",
            post(handlers::submissions::submit_quiz_answers),
        )
        .route(
            "/api/quiz-answers/check-duplicate",
            get(handlers::submissions::check_duplicate_quiz),
        )
        .route("/api/check-email", get(handlers::submissions::check_email))
        .route("/api/export/scores", get(handlers::exports::export_scores))
        .route("/api/stats", get(handlers::leaderboard::get_stats))
}

/// Organizer endpoints behind the shared-secret guard
fn protected_routes(app_state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .route(
            "/api/leaderboard",
            get(handlers::leaderboard::get_leaderboard),
        )
        .route(
            "/api/leaderboard/combined",
            get(handlers::leaderboard::get_joined_leaderboard),
        )
        .route(
            "/api/export/quiz-answers",
            get(handlers::exports::export_quiz_answers),
        )
        .route(
            "/api/export/quiz-answers.csv",
            get(handlers::exports::export_quiz_csv),
        )
        .route(
            "/api/export/quiz-answers.xlsx",
            get(handlers::exports::export_quiz_xlsx),
        )
        .route(
            "/api/export/combined",
            get(handlers::exports::export_combined),
        )
        .route(
            "/api/export/{kind}/web-query",
            get(handlers::exports::web_query),
        )
        .route_layer(middleware::from_fn_with_state(
            app_state,
            middlewares::access_guard::access_guard_middleware,
        ))
}
