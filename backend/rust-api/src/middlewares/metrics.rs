use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;

use crate::metrics::{HTTP_REQUESTS_TOTAL, HTTP_REQUEST_DURATION_SECONDS};

/// Records request count and latency per method, route and status
pub async fn metrics_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    let path = normalize_path(req.uri().path());

    let response = next.run(req).await;

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    HTTP_REQUESTS_TOTAL
        .with_label_values(&[&method, &path, &status])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[&method, &path])
        .observe(duration);

    response
}

/// Collapses dynamic segments so label cardinality stays bounded. Web query
/// kinds outside the known set collapse to `{kind}`.
fn normalize_path(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').collect();
    let mut normalized = Vec::with_capacity(segments.len());

    for (index, segment) in segments.iter().copied().enumerate() {
        let next = segments.get(index + 1).copied();
        if is_numeric_id(segment) {
            normalized.push("{id}");
        } else if next == Some("web-query") && !is_known_export(segment) {
            normalized.push("{kind}");
        } else {
            normalized.push(segment);
        }
    }

    normalized.join("/")
}

fn is_known_export(segment: &str) -> bool {
    matches!(segment, "scores" | "quiz-answers" | "combined")
}

fn is_numeric_id(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}
