#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{HeaderMap, Request, StatusCode},
    Router,
};
use puzzle_results_api::{
    config::{Config, StoreBackend},
    create_router,
    services::{readiness::initialize_store, AppState},
    store::{MemoryRecordStore, RecordStore},
};
use regex::Regex;
use serde_json::{json, Value};
use std::io::{Cursor, Read};
use std::sync::Arc;
use tower::ServiceExt;

pub const ADMIN_TOKEN: &str = "test-admin-token";

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub store: Arc<MemoryRecordStore>,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap_or_else(|e| {
            panic!(
                "body is not JSON ({}): {}",
                e,
                String::from_utf8_lossy(&self.body)
            )
        })
    }

    pub fn text(&self) -> String {
        String::from_utf8(self.body.clone()).unwrap()
    }

    pub fn header(&self, name: &str) -> &str {
        self.headers
            .get(name)
            .unwrap_or_else(|| panic!("missing header {}", name))
            .to_str()
            .unwrap()
    }
}

pub fn test_config() -> Config {
    Config {
        store_backend: StoreBackend::Memory,
        admin_token: ADMIN_TOKEN.to_string(),
        ..Config::default()
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// App backed by an initialized in-memory store.
pub async fn create_test_app() -> TestApp {
    create_test_app_with(test_config()).await
}

pub async fn create_test_app_with(config: Config) -> TestApp {
    let app = create_uninitialized_app_with(config, MemoryRecordStore::new());
    initialize_store(app.state.store.as_ref(), &app.state.readiness)
        .await
        .expect("memory store initializes");
    app
}

/// App whose store has not been prepared yet.
pub fn create_uninitialized_app_with(config: Config, store: MemoryRecordStore) -> TestApp {
    init_tracing();
    let store = Arc::new(store);
    let dyn_store: Arc<dyn RecordStore> = store.clone();
    let state = Arc::new(AppState::with_store(config, dyn_store));
    TestApp {
        router: create_router(state.clone()),
        state,
        store,
    }
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec();
        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        self.send(
            Request::builder()
                .uri(uri)
                .header("host", "localhost:3000")
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    pub async fn get_authed(&self, uri: &str) -> TestResponse {
        self.send(
            Request::builder()
                .uri(uri)
                .header("host", "localhost:3000")
                .header("authorization", format!("Bearer {}", ADMIN_TOKEN))
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    pub async fn post_json(&self, uri: &str, body: &Value) -> TestResponse {
        self.send(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    pub async fn submit_completion(&self, session: &str, time: i64, difficulty: i64) -> i64 {
        let response = self
            .post_json("/api/scores", &completion_body(session, time, difficulty))
            .await;
        assert_eq!(
            response.status,
            StatusCode::CREATED,
            "body {}",
            response.text()
        );
        response.json()["id"].as_i64().unwrap()
    }

    pub async fn submit_quiz(&self, session: &str, email: &str, name: &str) -> i64 {
        let response = self
            .post_json("/api/quiz-answers", &quiz_body(session, email, name))
            .await;
        assert_eq!(
            response.status,
            StatusCode::CREATED,
            "body {}",
            response.text()
        );
        response.json()["id"].as_i64().unwrap()
    }
}

pub fn completion_body(session: &str, time: i64, difficulty: i64) -> Value {
    json!({
        "sessionId": session,
        "name": format!("Player {}", session),
        "email": format!("{}@example.com", session.to_lowercase()),
        "completionTime": time,
        "timeString": format!("{}s", time / 1000),
        "difficulty": difficulty,
        "moves": 42,
        "accuracy": 87,
        "completedAt": "2026-10-16T09:00:00.000Z",
        "resultsCode": format!("RC-{}", session)
    })
}

pub fn quiz_body(session: &str, email: &str, name: &str) -> Value {
    json!({
        "sessionId": session,
        "participantName": name,
        "participantEmail": email,
        "participantMobile": "+44 7700 900123",
        "submittedAt": "2026-10-16T09:05:00.000Z",
        "q1Answer": "Blue",
        "q2Part1": "",
        "recipientName": "Bob",
        "recipientMessage": "Well \"done\""
    })
}

/// Shared strings (in table order) and row count of the first sheet of an
/// xlsx payload.
pub struct XlsxContents {
    pub shared_strings: Vec<String>,
    pub row_count: usize,
}

pub fn read_xlsx(bytes: &[u8]) -> XlsxContents {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).expect("xlsx is a zip archive");
    let mut read_entry = |name: &str| {
        let mut text = String::new();
        archive
            .by_name(name)
            .unwrap_or_else(|e| panic!("missing {}: {}", name, e))
            .read_to_string(&mut text)
            .unwrap();
        text
    };

    let sheet = read_entry("xl/worksheets/sheet1.xml");
    let shared = read_entry("xl/sharedStrings.xml");

    let text_re = Regex::new(r"<t(?:\s[^>]*)?>([^<]*)</t>").unwrap();
    let row_re = Regex::new(r"<row\s").unwrap();
    XlsxContents {
        shared_strings: text_re
            .captures_iter(&shared)
            .map(|captures| captures[1].to_string())
            .collect(),
        row_count: row_re.find_iter(&sheet).count(),
    }
}
