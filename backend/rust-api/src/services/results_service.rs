use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::aggregation::{join_rows, session_ids, summarize};
use super::duplicate_service::{DuplicateDetector, DuplicateQuizCheck, EmailCheck};
use super::export_service::{
    self, format_rows, render_file, to_rows, ExportFile, FileFormat, WebQueryKind,
};
use super::fields::{COMBINED_EXPORT_FIELDS, QUIZ_EXPORT_FIELDS};
use super::readiness::{ReadinessState, ReadinessTracker};
use super::validation::{validate_completion, validate_quiz_submission, ValidationFailure};
use super::ServiceError;
use crate::config::Config;
use crate::metrics::{EXPORTS_GENERATED_TOTAL, SUBMISSIONS_TOTAL};
use crate::models::{
    Completion, CompletionPayload, CompletionStats, JoinedRow, QuizPayload, QuizSubmission,
};
use crate::store::{
    CompletionFilter, CompletionOrder, CompletionQuery, QuizFilter, QuizOrder, RecordStore,
};
use crate::utils::time::iso_millis;

const QUIZ_EXPORT_KIND: &str = "quiz-answers";
const COMBINED_EXPORT_KIND: &str = "combined-results";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowFormat {
    #[default]
    Raw,
    Formatted,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CombinedFormat {
    #[default]
    Csv,
    Xlsx,
    Raw,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Created {
    pub id: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoresExport {
    pub total: usize,
    pub exported_at: String,
    pub scores: Vec<Completion>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuizExport {
    pub total: usize,
    pub exported_at: String,
    pub quiz_answers: Vec<Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CombinedExport {
    pub total: usize,
    pub exported_at: String,
    pub results: Vec<JoinedRow>,
}

#[derive(Debug, Clone)]
pub enum CombinedOutput {
    File(ExportFile),
    Raw(CombinedExport),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Liveness {
    pub state: &'static str,
    pub store_ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scores_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Liveness {
    pub fn is_healthy(&self) -> bool {
        self.store_ready && self.scores_count.is_some()
    }
}

/// Every operation the HTTP layer exposes. Borrowed from [`super::AppState`]
/// per request.
pub struct ResultsService<'a> {
    store: &'a dyn RecordStore,
    readiness: &'a ReadinessTracker,
    config: &'a Config,
}

impl<'a> ResultsService<'a> {
    pub fn new(
        store: &'a dyn RecordStore,
        readiness: &'a ReadinessTracker,
        config: &'a Config,
    ) -> Self {
        Self {
            store,
            readiness,
            config,
        }
    }

    pub async fn submit_completion(
        &self,
        payload: CompletionPayload,
    ) -> Result<Created, ServiceError> {
        let result = async {
            let record = validate_completion(payload, (&self.config.validation).into())?;
            self.readiness.ensure_ready()?;
            let stored = self.store.insert_completion(record).await?;
            tracing::info!(id = stored.id, session_id = %stored.session_id, "Completion stored");
            Ok::<_, ServiceError>(Created { id: stored.id })
        }
        .await;

        count_submission("completion", &result);
        result
    }

    pub async fn submit_quiz_answers(&self, payload: QuizPayload) -> Result<Created, ServiceError> {
        let result = async {
            let record = validate_quiz_submission(payload)?;
            self.readiness.ensure_ready()?;
            let stored = self.store.insert_quiz_submission(record).await?;
            tracing::info!(id = stored.id, session_id = %stored.session_id, "Quiz answers stored");
            Ok::<_, ServiceError>(Created { id: stored.id })
        }
        .await;

        count_submission("quiz", &result);
        result
    }

    pub async fn check_duplicate_quiz(
        &self,
        email: Option<&str>,
        name: Option<&str>,
    ) -> Result<DuplicateQuizCheck, ServiceError> {
        let email = non_empty(email);
        let name = non_empty(name);
        let (Some(email), Some(name)) = (email, name) else {
            let missing = [("email", email), ("name", name)]
                .into_iter()
                .filter(|(_, value)| value.is_none())
                .map(|(field, _)| field)
                .collect();
            return Err(ValidationFailure::MissingFields(missing).into());
        };

        self.readiness.ensure_ready()?;
        Ok(DuplicateDetector::new(self.store).check_quiz(email, name).await?)
    }

    pub async fn check_duplicate_email(
        &self,
        email: Option<&str>,
    ) -> Result<EmailCheck, ServiceError> {
        let Some(email) = non_empty(email) else {
            return Err(ValidationFailure::MissingFields(vec!["email"]).into());
        };

        self.readiness.ensure_ready()?;
        Ok(DuplicateDetector::new(self.store).check_email(email).await?)
    }

    /// Fastest completions first.
    pub async fn leaderboard(
        &self,
        limit: Option<u64>,
        difficulty: Option<i64>,
    ) -> Result<Vec<Completion>, ServiceError> {
        self.readiness.ensure_ready()?;
        let query = CompletionQuery {
            filter: CompletionFilter {
                difficulty,
                email: None,
            },
            order: CompletionOrder::FastestFirst,
            limit: Some(self.clamp_limit(limit)),
        };
        Ok(self.store.list_completions(&query).await?)
    }

    pub async fn joined_leaderboard(
        &self,
        limit: Option<u64>,
        difficulty: Option<i64>,
        format: RowFormat,
    ) -> Result<Vec<Value>, ServiceError> {
        let completions = self.leaderboard(limit, difficulty).await?;
        let rows = self.join(completions).await?;
        let rows = to_rows(&rows)?;

        Ok(match format {
            RowFormat::Raw => rows.into_iter().map(Value::Object).collect(),
            RowFormat::Formatted => format_rows(&rows, &COMBINED_EXPORT_FIELDS),
        })
    }

    pub async fn export_completions(&self) -> Result<ScoresExport, ServiceError> {
        self.readiness.ensure_ready()?;
        let scores = self
            .store
            .list_completions(&CompletionQuery {
                order: CompletionOrder::NewestCompletedFirst,
                ..CompletionQuery::default()
            })
            .await?;

        count_export("scores", "json");
        Ok(ScoresExport {
            total: scores.len(),
            exported_at: iso_millis(Utc::now()),
            scores,
        })
    }

    pub async fn export_quiz_answers(&self, format: RowFormat) -> Result<QuizExport, ServiceError> {
        let quizzes = self.all_quiz_submissions().await?;
        let rows = to_rows(&quizzes)?;
        let quiz_answers = match format {
            RowFormat::Raw => rows.into_iter().map(Value::Object).collect(),
            RowFormat::Formatted => format_rows(&rows, &QUIZ_EXPORT_FIELDS),
        };

        count_export(QUIZ_EXPORT_KIND, format_label(format));
        Ok(QuizExport {
            total: quiz_answers.len(),
            exported_at: iso_millis(Utc::now()),
            quiz_answers,
        })
    }

    pub async fn export_quiz_file(&self, format: FileFormat) -> Result<ExportFile, ServiceError> {
        let quizzes = self.all_quiz_submissions().await?;
        let rows = to_rows(&quizzes)?;
        let file = render_file(
            QUIZ_EXPORT_KIND,
            format,
            &rows,
            &QUIZ_EXPORT_FIELDS,
            "Quiz Answers",
            Utc::now(),
        )?;

        count_export(QUIZ_EXPORT_KIND, format.extension());
        tracing::info!(file = %file.file_name, rows = rows.len(), "Quiz export generated");
        Ok(file)
    }

    pub async fn export_combined(
        &self,
        format: CombinedFormat,
    ) -> Result<CombinedOutput, ServiceError> {
        self.readiness.ensure_ready()?;
        let completions = self
            .store
            .list_completions(&CompletionQuery {
                order: CompletionOrder::NewestCompletedFirst,
                ..CompletionQuery::default()
            })
            .await?;
        let joined = self.join(completions).await?;

        let file_format = match format {
            CombinedFormat::Raw => {
                count_export(COMBINED_EXPORT_KIND, "json");
                return Ok(CombinedOutput::Raw(CombinedExport {
                    total: joined.len(),
                    exported_at: iso_millis(Utc::now()),
                    results: joined,
                }));
            }
            CombinedFormat::Csv => FileFormat::Csv,
            CombinedFormat::Xlsx => FileFormat::Xlsx,
        };

        let rows = to_rows(&joined)?;
        let file = render_file(
            COMBINED_EXPORT_KIND,
            file_format,
            &rows,
            &COMBINED_EXPORT_FIELDS,
            "Combined Results",
            Utc::now(),
        )?;

        count_export(COMBINED_EXPORT_KIND, file_format.extension());
        tracing::info!(file = %file.file_name, rows = rows.len(), "Combined export generated");
        Ok(CombinedOutput::File(file))
    }

    /// `.iqy` descriptor pointing at the raw export for `kind`.
    pub fn web_query_descriptor(
        &self,
        kind: WebQueryKind,
        base_url: &str,
    ) -> Result<ExportFile, ServiceError> {
        self.readiness.ensure_ready()?;
        let text = export_service::web_query_descriptor(kind, base_url, &self.config.admin_token)?;

        count_export(kind.as_str(), "iqy");
        Ok(ExportFile {
            file_name: format!("{}.iqy", kind.as_str()),
            content_type: "text/x-ms-iqy; charset=utf-8",
            bytes: text.into_bytes(),
        })
    }

    pub async fn stats(&self) -> Result<CompletionStats, ServiceError> {
        self.readiness.ensure_ready()?;
        let completions = self.store.list_completions(&CompletionQuery::default()).await?;
        Ok(summarize(&completions))
    }

    /// Never fails. The store round-trip is bounded by `health.timeout_ms`.
    pub async fn liveness(&self) -> Liveness {
        let state = self.readiness.state();
        if let ReadinessState::Failed(reason) = &state {
            return Liveness {
                state: state.label(),
                store_ready: false,
                scores_count: None,
                error: Some(reason.clone()),
            };
        }
        if !state.is_ready() {
            return Liveness {
                state: state.label(),
                store_ready: false,
                scores_count: None,
                error: None,
            };
        }

        let timeout = self.config.health_timeout();
        let filter = CompletionFilter::default();
        match tokio::time::timeout(timeout, self.store.count_completions(&filter)).await {
            Ok(Ok(count)) => Liveness {
                state: state.label(),
                store_ready: true,
                scores_count: Some(count),
                error: None,
            },
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Liveness count failed");
                Liveness {
                    state: "degraded",
                    store_ready: true,
                    scores_count: None,
                    error: Some(e.to_string()),
                }
            }
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.config.health_timeout_ms,
                    "Liveness count timed out"
                );
                Liveness {
                    state: "timeout",
                    store_ready: true,
                    scores_count: None,
                    error: Some(format!(
                        "Record store did not answer within {}ms",
                        self.config.health_timeout_ms
                    )),
                }
            }
        }
    }

    fn clamp_limit(&self, limit: Option<u64>) -> u64 {
        let settings = &self.config.leaderboard;
        limit
            .unwrap_or(settings.default_limit)
            .clamp(1, settings.max_limit.max(1))
    }

    async fn all_quiz_submissions(&self) -> Result<Vec<QuizSubmission>, ServiceError> {
        self.readiness.ensure_ready()?;
        Ok(self
            .store
            .list_quiz_submissions(&QuizFilter::All, QuizOrder::NewestFirst)
            .await?)
    }

    async fn join(&self, completions: Vec<Completion>) -> Result<Vec<JoinedRow>, ServiceError> {
        if completions.is_empty() {
            return Ok(Vec::new());
        }
        let quizzes = self
            .store
            .list_quiz_submissions(
                &QuizFilter::Sessions(session_ids(&completions)),
                QuizOrder::InsertionOrder,
            )
            .await?;
        Ok(join_rows(completions, &quizzes))
    }
}

/// Blank inputs count as absent; others are matched exactly as sent.
fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.trim().is_empty())
}

fn format_label(format: RowFormat) -> &'static str {
    match format {
        RowFormat::Raw => "json",
        RowFormat::Formatted => "formatted",
    }
}

fn count_submission<T>(kind: &str, result: &Result<T, ServiceError>) {
    let outcome = match result {
        Ok(_) => "accepted",
        Err(ServiceError::Validation(_)) => "invalid",
        Err(ServiceError::StoreUnavailable(_)) => "unavailable",
        Err(_) => "error",
    };
    SUBMISSIONS_TOTAL.with_label_values(&[kind, outcome]).inc();
}

fn count_export(kind: &str, format: &str) {
    EXPORTS_GENERATED_TOTAL.with_label_values(&[kind, format]).inc();
}
