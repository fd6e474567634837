use chrono::{DateTime, Utc};
use rust_xlsxwriter::{Format, Workbook, XlsxError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;

use super::fields::{self, Field, FieldKind, Section};
use super::ServiceError;
use crate::utils::time::file_timestamp;

pub type Row = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    Xlsx,
}

impl FileFormat {
    pub fn extension(self) -> &'static str {
        match self {
            FileFormat::Csv => "csv",
            FileFormat::Xlsx => "xlsx",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            FileFormat::Csv => "text/csv; charset=utf-8",
            FileFormat::Xlsx => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        }
    }
}

/// A rendered export ready to be sent as an attachment.
#[derive(Debug, Clone)]
pub struct ExportFile {
    pub file_name: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

/// Raw exports an Excel web query can point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum WebQueryKind {
    Scores,
    QuizAnswers,
    Combined,
}

impl WebQueryKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "scores" => Some(WebQueryKind::Scores),
            "quiz-answers" => Some(WebQueryKind::QuizAnswers),
            "combined" => Some(WebQueryKind::Combined),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            WebQueryKind::Scores => "scores",
            WebQueryKind::QuizAnswers => "quiz-answers",
            WebQueryKind::Combined => "combined",
        }
    }

    /// Path segments of the raw export and its `format` parameter, if any.
    fn target(self) -> ([&'static str; 3], Option<&'static str>) {
        match self {
            WebQueryKind::Scores => (["api", "export", "scores"], None),
            WebQueryKind::QuizAnswers => (["api", "export", "quiz-answers"], Some("raw")),
            WebQueryKind::Combined => (["api", "export", "combined"], Some("raw")),
        }
    }
}

/// Serializes records into flat rows keyed by storage names.
pub fn to_rows<T: Serialize>(records: &[T]) -> Result<Vec<Row>, ServiceError> {
    records
        .iter()
        .map(|record| match serde_json::to_value(record) {
            Ok(Value::Object(row)) => Ok(row),
            Ok(other) => Err(ServiceError::ExportGeneration(format!(
                "expected an object row, got {}",
                other
            ))),
            Err(e) => Err(ServiceError::ExportGeneration(e.to_string())),
        })
        .collect()
}

/// Regroups a flat row into `{participant_info, quiz_responses}` keyed by
/// human labels. Null responses are dropped; empty strings stay.
pub fn format_row(row: &Row, fields: &[Field]) -> Value {
    let mut participant_info = Map::new();
    let mut quiz_responses = Map::new();

    for field in fields {
        let value = row.get(field.key).cloned().unwrap_or(Value::Null);
        match field.section {
            Section::Participant => {
                participant_info.insert(field.label.to_string(), value);
            }
            Section::Response if value.is_null() => {}
            Section::Response => {
                quiz_responses.insert(field.label.to_string(), value);
            }
        }
    }

    let mut formatted = Map::new();
    formatted.insert("participant_info".to_string(), Value::Object(participant_info));
    formatted.insert("quiz_responses".to_string(), Value::Object(quiz_responses));
    Value::Object(formatted)
}

pub fn format_rows(rows: &[Row], fields: &[Field]) -> Vec<Value> {
    rows.iter().map(|row| format_row(row, fields)).collect()
}

/// Quotes a text cell, doubling embedded quotes. The value itself is kept
/// as stored so CSV, XLSX and raw exports agree.
fn escape_csv_text(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

fn csv_cell(field: &Field, value: Option<&Value>) -> String {
    match (field.kind, value) {
        (_, None | Some(Value::Null)) => "\"\"".to_string(),
        (FieldKind::Integer, Some(Value::Number(number))) => number.to_string(),
        (_, Some(Value::String(text))) => escape_csv_text(text),
        (_, Some(other)) => escape_csv_text(&other.to_string()),
    }
}

pub fn to_csv(rows: &[Row], fields: &[Field]) -> String {
    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(fields::labels(fields).collect::<Vec<_>>().join(","));

    for row in rows {
        let cells: Vec<String> = fields
            .iter()
            .map(|field| csv_cell(field, row.get(field.key)))
            .collect();
        lines.push(cells.join(","));
    }

    lines.join("\n")
}

pub fn to_xlsx(rows: &[Row], fields: &[Field], sheet_name: &str) -> Result<Vec<u8>, ServiceError> {
    build_xlsx(rows, fields, sheet_name).map_err(|e| ServiceError::ExportGeneration(e.to_string()))
}

fn build_xlsx(rows: &[Row], fields: &[Field], sheet_name: &str) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(sheet_name)?;

    let header_format = Format::new().set_bold();
    for (column, field) in fields.iter().enumerate() {
        let column = column as u16;
        worksheet.write_string_with_format(0, column, field.label, &header_format)?;
        worksheet.set_column_width(column, (field.label.len() as f64).max(12.0) + 2.0)?;
    }

    for (index, row) in rows.iter().enumerate() {
        let excel_row = index as u32 + 1;
        for (column, field) in fields.iter().enumerate() {
            let column = column as u16;
            match row.get(field.key) {
                None | Some(Value::Null) => {}
                Some(Value::Number(number)) if field.kind == FieldKind::Integer => {
                    if let Some(number) = number.as_f64() {
                        worksheet.write_number(excel_row, column, number)?;
                    }
                }
                Some(Value::String(text)) => {
                    worksheet.write_string(excel_row, column, text)?;
                }
                Some(other) => {
                    worksheet.write_string(excel_row, column, other.to_string())?;
                }
            }
        }
    }

    let mut cursor = std::io::Cursor::new(Vec::new());
    workbook.save_to_writer(&mut cursor)?;
    Ok(cursor.into_inner())
}

/// Absolute callback URL for a web query. The token is embedded so Excel can
/// refresh the protected export without prompting.
pub fn web_query_url(
    kind: WebQueryKind,
    base_url: &str,
    token: &str,
) -> Result<Url, ServiceError> {
    let (segments, format) = kind.target();
    let mut url = Url::parse(base_url)
        .map_err(|e| ServiceError::BadRequest(format!("Invalid base URL {}: {}", base_url, e)))?;
    url.set_query(None);
    url.set_fragment(None);

    // Appended under any prefix the base URL already carries
    url.path_segments_mut()
        .map_err(|_| {
            ServiceError::BadRequest(format!("Base URL {} cannot carry a path", base_url))
        })?
        .pop_if_empty()
        .extend(segments);

    {
        let mut query = url.query_pairs_mut();
        if let Some(format) = format {
            query.append_pair("format", format);
        }
        query.append_pair("token", token);
    }

    Ok(url)
}

/// `.iqy` descriptor text (CRLF line endings) pointing at a raw export.
pub fn web_query_descriptor(
    kind: WebQueryKind,
    base_url: &str,
    token: &str,
) -> Result<String, ServiceError> {
    let url = web_query_url(kind, base_url, token)?;
    let lines = [
        "WEB",
        "1",
        url.as_str(),
        "",
        "Selection=AllTables",
        "Formatting=None",
        "PreFormattedTextToColumns=True",
        "ConsecutiveDelimitersAsOne=True",
        "SingleBlockTextImport=False",
        "DisableDateRecognition=False",
        "DisableRedirections=False",
    ];
    Ok(lines.join("\r\n") + "\r\n")
}

/// `{kind}-{YYYY-MM-DDTHH-MM-SS}.{ext}`
pub fn export_file_name(kind: &str, extension: &str, now: DateTime<Utc>) -> String {
    format!("{}-{}.{}", kind, file_timestamp(now), extension)
}

pub fn render_file(
    kind: &str,
    format: FileFormat,
    rows: &[Row],
    fields: &[Field],
    sheet_name: &str,
    now: DateTime<Utc>,
) -> Result<ExportFile, ServiceError> {
    let bytes = match format {
        FileFormat::Csv => to_csv(rows, fields).into_bytes(),
        FileFormat::Xlsx => to_xlsx(rows, fields, sheet_name)?,
    };
    Ok(ExportFile {
        file_name: export_file_name(kind, format.extension(), now),
        content_type: format.content_type(),
        bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::fields::{COMBINED_EXPORT_FIELDS, QUIZ_EXPORT_FIELDS};
    use chrono::TimeZone;
    use serde_json::json;

    fn quiz_row() -> Row {
        json!({
            "id": 3,
            "session_id": "S1",
            "participant_name": "Alice \"Al\" Smith",
            "participant_email": "a@b.com",
            "participant_mobile": "0123",
            "q1_answer": "blue",
            "q2_part1": "",
            "q2_part2": null,
            "submitted_at": "2026-10-16T09:05:00.000Z",
            "created_at": "2026-10-16T09:05:01Z"
        })
        .as_object()
        .cloned()
        .unwrap()
    }

    #[test]
    fn test_format_row_groups_by_section() {
        let formatted = format_row(&quiz_row(), &QUIZ_EXPORT_FIELDS);

        assert_eq!(formatted["participant_info"]["Name"], "Alice \"Al\" Smith");
        assert_eq!(formatted["participant_info"]["ID"], 3);
        assert_eq!(formatted["quiz_responses"]["Q1 Answer"], "blue");
        assert_eq!(formatted["quiz_responses"]["Q2 Part 1"], "");
        assert!(formatted["quiz_responses"].get("Q2 Part 2").is_none());
        assert!(formatted["quiz_responses"].get("Q10 Answer").is_none());
    }

    #[test]
    fn test_format_row_is_pure() {
        let row = quiz_row();
        let first = format_row(&row, &QUIZ_EXPORT_FIELDS);
        let second = format_row(&row, &QUIZ_EXPORT_FIELDS);
        assert_eq!(first, second);
    }

    #[test]
    fn test_csv_quotes_text_and_leaves_integers_bare() {
        let csv = to_csv(&[quiz_row()], &QUIZ_EXPORT_FIELDS);
        let mut lines = csv.lines();

        let header = lines.next().unwrap();
        assert!(header.starts_with("ID,Session ID,Name,Email,Mobile,Q1 Answer"));

        let row = lines.next().unwrap();
        assert!(row.starts_with(
            "3,\"S1\",\"Alice \"\"Al\"\" Smith\",\"a@b.com\",\"0123\",\"blue\",\"\",\"\""
        ));
        assert_eq!(row.split(',').count(), QUIZ_EXPORT_FIELDS.len());
        assert!(lines.next().is_none());
    }

    #[test]
    fn test_csv_keeps_leading_symbols_verbatim() {
        assert_eq!(escape_csv_text("+44 7700 900123"), "\"+44 7700 900123\"");
        assert_eq!(escape_csv_text("-2"), "\"-2\"");
        assert_eq!(escape_csv_text("=1+1"), "\"=1+1\"");
        assert_eq!(escape_csv_text("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_empty_sets_produce_header_only_outputs() {
        let csv = to_csv(&[], &COMBINED_EXPORT_FIELDS);
        assert_eq!(csv.lines().count(), 1);
        assert!(csv.starts_with("Score ID,Session ID,Name"));

        let xlsx = to_xlsx(&[], &COMBINED_EXPORT_FIELDS, "Combined Results").unwrap();
        // xlsx files are zip archives
        assert_eq!(&xlsx[..2], b"PK");
    }

    #[test]
    fn test_xlsx_renders_rows() {
        let xlsx = to_xlsx(&[quiz_row(), quiz_row()], &QUIZ_EXPORT_FIELDS, "Quiz Answers").unwrap();
        assert_eq!(&xlsx[..2], b"PK");
    }

    #[test]
    fn test_web_query_descriptor() {
        let text = web_query_descriptor(
            WebQueryKind::Combined,
            "https://results.example.com",
            "s3cret",
        )
        .unwrap();
        let lines: Vec<_> = text.split("\r\n").collect();

        assert_eq!(lines[0], "WEB");
        assert_eq!(lines[1], "1");
        assert_eq!(
            lines[2],
            "https://results.example.com/api/export/combined?format=raw&token=s3cret"
        );
        assert!(text.contains("Selection=AllTables"));
        assert!(!text.contains("Alice"));
    }

    #[test]
    fn test_web_query_url_encodes_token() {
        let url = web_query_url(WebQueryKind::Scores, "http://localhost:3000/", "a b&c").unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:3000/api/export/scores?token=a+b%26c"
        );
    }

    #[test]
    fn test_web_query_url_keeps_base_path_prefix() {
        let url = web_query_url(
            WebQueryKind::Combined,
            "https://host.example.com/puzzle",
            "t",
        )
        .unwrap();
        assert_eq!(
            url.as_str(),
            "https://host.example.com/puzzle/api/export/combined?format=raw&token=t"
        );

        let url = web_query_url(WebQueryKind::Scores, "https://host.example.com/puzzle/", "t")
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://host.example.com/puzzle/api/export/scores?token=t"
        );
    }

    #[test]
    fn test_web_query_rejects_bad_base_url() {
        assert!(matches!(
            web_query_url(WebQueryKind::Scores, "not a url", "t"),
            Err(ServiceError::BadRequest(_))
        ));
    }

    #[test]
    fn test_web_query_kind_parse() {
        assert_eq!(WebQueryKind::parse("quiz-answers"), Some(WebQueryKind::QuizAnswers));
        assert_eq!(WebQueryKind::parse("quiz_answers"), None);
        assert_eq!(WebQueryKind::Combined.as_str(), "combined");
    }

    #[test]
    fn test_export_file_name() {
        let now = Utc.with_ymd_and_hms(2026, 10, 16, 9, 30, 5).unwrap();
        assert_eq!(
            export_file_name("quiz-answers", "csv", now),
            "quiz-answers-2026-10-16T09-30-05.csv"
        );
    }
}
