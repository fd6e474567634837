use axum::http::StatusCode;
use puzzle_results_api::config::Config;
use puzzle_results_api::services::fields::{self, COMBINED_EXPORT_FIELDS, QUIZ_EXPORT_FIELDS};

mod common;

const XLSX_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

#[tokio::test]
async fn test_export_scores_envelope() {
    let app = common::create_test_app().await;
    app.submit_completion("S1", 30_000, 1).await;
    app.submit_completion("S2", 20_000, 1).await;

    let response = app.get("/api/export/scores").await;
    assert_eq!(response.status, StatusCode::OK);

    let json = response.json();
    assert_eq!(json["total"], 2);
    assert!(json["exported_at"].as_str().unwrap().ends_with('Z'));
    assert_eq!(json["scores"].as_array().unwrap().len(), 2);
    assert!(json["scores"][0]["results_code"].is_string());
}

#[tokio::test]
async fn test_export_quiz_answers_raw_and_formatted() {
    let app = common::create_test_app().await;
    app.submit_quiz("S1", "a@b.com", "Alice").await;

    let raw = app.get_authed("/api/export/quiz-answers").await.json();
    assert_eq!(raw["total"], 1);
    assert_eq!(raw["quiz_answers"][0]["participant_name"], "Alice");
    assert!(raw["quiz_answers"][0]["q3_answer"].is_null());

    let formatted = app
        .get_authed("/api/export/quiz-answers?format=formatted")
        .await
        .json();
    let entry = &formatted["quiz_answers"][0];
    assert_eq!(entry["participant_info"]["Name"], "Alice");
    assert_eq!(entry["participant_info"]["Email"], "a@b.com");
    assert_eq!(entry["quiz_responses"]["Recipient Message"], "Well \"done\"");
    assert!(entry["quiz_responses"].get("Q3 Answer").is_none());
}

#[tokio::test]
async fn test_quiz_csv_export() {
    let app = common::create_test_app().await;
    app.submit_quiz("S1", "a@b.com", "Alice").await;

    let response = app.get_authed("/api/export/quiz-answers.csv").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.header("content-type"), "text/csv; charset=utf-8");

    let disposition = response.header("content-disposition");
    assert!(disposition.starts_with("attachment; filename=\"quiz-answers-"));
    assert!(disposition.ends_with(".csv\""));

    let text = response.text();
    let lines: Vec<_> = text.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("ID,Session ID,Name,Email,Mobile,Q1 Answer,"));
    assert!(lines[1].starts_with("1,\"S1\",\"Alice\",\"a@b.com\""));
    assert!(lines[1].contains("\"Well \"\"done\"\"\""));
    // leading '+' is kept verbatim
    assert!(lines[1].contains(",\"+44 7700 900123\","));
}

#[tokio::test]
async fn test_quiz_xlsx_export_contents() {
    let app = common::create_test_app().await;
    app.submit_quiz("S1", "a@b.com", "Alice").await;
    app.submit_quiz("S2", "c@d.com", "Carol").await;

    let response = app.get_authed("/api/export/quiz-answers.xlsx").await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.header("content-disposition").ends_with(".xlsx\""));

    let sheet = common::read_xlsx(&response.body);
    assert_eq!(sheet.row_count, 3);

    let labels: Vec<_> = fields::labels(&QUIZ_EXPORT_FIELDS).collect();
    assert_eq!(&sheet.shared_strings[..labels.len()], labels.as_slice());
    for value in ["Alice", "Carol", "c@d.com", "+44 7700 900123"] {
        assert!(
            sheet.shared_strings.iter().any(|s| s == value),
            "{} missing from workbook",
            value
        );
    }
}

#[tokio::test]
async fn test_empty_exports_are_header_only() {
    let app = common::create_test_app().await;

    let csv = app.get_authed("/api/export/quiz-answers.csv").await;
    assert_eq!(csv.status, StatusCode::OK);
    assert_eq!(csv.text().lines().count(), 1);

    let xlsx = app.get_authed("/api/export/quiz-answers.xlsx").await;
    assert_eq!(xlsx.status, StatusCode::OK);
    assert_eq!(xlsx.header("content-type"), XLSX_CONTENT_TYPE);
    let sheet = common::read_xlsx(&xlsx.body);
    assert_eq!(sheet.row_count, 1);
    assert_eq!(
        sheet.shared_strings,
        fields::labels(&QUIZ_EXPORT_FIELDS).collect::<Vec<_>>()
    );

    let combined = app.get_authed("/api/export/combined").await;
    assert_eq!(combined.status, StatusCode::OK);
    assert_eq!(combined.text().lines().count(), 1);
}

#[tokio::test]
async fn test_combined_export_formats() {
    let app = common::create_test_app().await;
    app.submit_completion("S1", 30_000, 1).await;
    app.submit_completion("S2", 20_000, 1).await;
    app.submit_quiz("S2", "s2@example.com", "Player S2").await;

    let csv = app.get_authed("/api/export/combined").await;
    assert!(csv
        .header("content-disposition")
        .contains("combined-results-"));
    let text = csv.text();
    let lines: Vec<_> = text.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("Score ID,Session ID,Name,Email,Completion Time (ms)"));

    let xlsx = app.get_authed("/api/export/combined?format=xlsx").await;
    assert_eq!(xlsx.header("content-type"), XLSX_CONTENT_TYPE);
    assert!(xlsx.header("content-disposition").ends_with(".xlsx\""));
    let sheet = common::read_xlsx(&xlsx.body);
    assert_eq!(sheet.row_count, 3);
    let labels: Vec<_> = fields::labels(&COMBINED_EXPORT_FIELDS).collect();
    assert_eq!(&sheet.shared_strings[..labels.len()], labels.as_slice());

    let raw = app.get_authed("/api/export/combined?format=raw").await.json();
    assert_eq!(raw["total"], 2);
    let results = raw["results"].as_array().unwrap();
    let s2 = results.iter().find(|row| row["session_id"] == "S2").unwrap();
    assert_eq!(s2["participant_name"], "Player S2");
    let s1 = results.iter().find(|row| row["session_id"] == "S1").unwrap();
    assert!(s1["participant_name"].is_null());
}

#[tokio::test]
async fn test_web_query_descriptor() {
    let app = common::create_test_app().await;

    let response = app.get_authed("/api/export/combined/web-query").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.header("cache-control"), "no-store");
    assert!(response.header("content-disposition").contains("combined.iqy"));

    let text = response.text();
    let lines: Vec<_> = text.split("\r\n").collect();
    assert_eq!(lines[0], "WEB");
    assert_eq!(lines[1], "1");
    assert_eq!(
        lines[2],
        format!(
            "http://localhost:3000/api/export/combined?format=raw&token={}",
            common::ADMIN_TOKEN
        )
    );
}

#[tokio::test]
async fn test_web_query_uses_configured_base_url() {
    let config = Config {
        public_base_url: Some("https://results.example.com".to_string()),
        ..common::test_config()
    };
    let app = common::create_test_app_with(config).await;

    let text = app.get_authed("/api/export/scores/web-query").await.text();
    assert!(text.contains("https://results.example.com/api/export/scores?token="));
}

#[tokio::test]
async fn test_web_query_keeps_configured_path_prefix() {
    let config = Config {
        public_base_url: Some("https://results.example.com/puzzle".to_string()),
        ..common::test_config()
    };
    let app = common::create_test_app_with(config).await;

    let text = app
        .get_authed("/api/export/quiz-answers/web-query")
        .await
        .text();
    assert!(text.contains(
        "https://results.example.com/puzzle/api/export/quiz-answers?format=raw&token="
    ));
}

#[tokio::test]
async fn test_web_query_unknown_kind() {
    let app = common::create_test_app().await;
    let response = app.get_authed("/api/export/everything/web-query").await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_web_query_url_is_accepted_by_guard() {
    let app = common::create_test_app().await;
    app.submit_quiz("S1", "a@b.com", "Alice").await;

    let text = app.get_authed("/api/export/quiz-answers/web-query").await.text();
    let url = text.split("\r\n").nth(2).unwrap().to_string();
    let path = url.trim_start_matches("http://localhost:3000");

    let response = app.get(path).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["total"], 1);
}
