use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use super::{
    CompletionFilter, CompletionOrder, CompletionQuery, QuizFilter, QuizOrder, RecordStore,
    StoreError,
};
use crate::models::{Completion, NewCompletion, NewQuizSubmission, QuizSubmission};

#[derive(Debug, Default)]
struct Tables {
    completions: Vec<Completion>,
    quizzes: Vec<QuizSubmission>,
    last_completion_id: i64,
    last_quiz_id: i64,
}

/// In-process store used for local development (`store.backend = "memory"`)
/// and by the test suite. Rows are kept in insertion order.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    tables: Mutex<Tables>,
    operations: AtomicU64,
    open_failure: Option<String>,
    count_delay: Option<Duration>,
    count_failure: Option<String>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store whose `open` always fails with the given reason.
    pub fn unreachable(reason: impl Into<String>) -> Self {
        Self {
            open_failure: Some(reason.into()),
            ..Self::default()
        }
    }

    /// Completion counts wait `delay` before answering.
    pub fn with_count_delay(mut self, delay: Duration) -> Self {
        self.count_delay = Some(delay);
        self
    }

    /// Completion counts fail with the given reason.
    pub fn with_count_failure(mut self, reason: impl Into<String>) -> Self {
        self.count_failure = Some(reason.into());
        self
    }

    /// Number of trait operations served so far.
    pub fn operation_count(&self) -> u64 {
        self.operations.load(Ordering::SeqCst)
    }

    fn touch(&self) {
        self.operations.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn open(&self) -> Result<(), StoreError> {
        self.touch();
        match &self.open_failure {
            Some(reason) => Err(StoreError::Connection(reason.clone())),
            None => Ok(()),
        }
    }

    async fn ensure_schema(&self) -> Result<(), StoreError> {
        self.touch();
        Ok(())
    }

    async fn insert_completion(&self, record: NewCompletion) -> Result<Completion, StoreError> {
        self.touch();
        let mut tables = self.tables.lock().await;
        tables.last_completion_id += 1;
        let completion = record.into_record(tables.last_completion_id, Utc::now());
        tables.completions.push(completion.clone());
        Ok(completion)
    }

    async fn delete_completion(&self, id: i64) -> Result<bool, StoreError> {
        self.touch();
        let mut tables = self.tables.lock().await;
        let before = tables.completions.len();
        tables.completions.retain(|completion| completion.id != id);
        Ok(tables.completions.len() != before)
    }

    async fn list_completions(
        &self,
        query: &CompletionQuery,
    ) -> Result<Vec<Completion>, StoreError> {
        self.touch();
        let tables = self.tables.lock().await;
        let mut rows: Vec<Completion> = tables
            .completions
            .iter()
            .filter(|completion| query.filter.matches(completion))
            .cloned()
            .collect();

        // Vec sorts are stable, so ties keep insertion order.
        match query.order {
            CompletionOrder::FastestFirst => rows.sort_by_key(|row| row.completion_time),
            CompletionOrder::NewestCompletedFirst => {
                rows.sort_by(|a, b| b.completed_at.cmp(&a.completed_at))
            }
        }

        if let Some(limit) = query.limit {
            rows.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        }

        Ok(rows)
    }

    async fn count_completions(&self, filter: &CompletionFilter) -> Result<u64, StoreError> {
        self.touch();
        if let Some(delay) = self.count_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(reason) = &self.count_failure {
            return Err(StoreError::operation("count completions", reason));
        }
        let tables = self.tables.lock().await;
        Ok(tables
            .completions
            .iter()
            .filter(|completion| filter.matches(completion))
            .count() as u64)
    }

    async fn insert_quiz_submission(
        &self,
        record: NewQuizSubmission,
    ) -> Result<QuizSubmission, StoreError> {
        self.touch();
        let mut tables = self.tables.lock().await;
        tables.last_quiz_id += 1;
        let quiz = record.into_record(tables.last_quiz_id, Utc::now());
        tables.quizzes.push(quiz.clone());
        Ok(quiz)
    }

    async fn list_quiz_submissions(
        &self,
        filter: &QuizFilter,
        order: QuizOrder,
    ) -> Result<Vec<QuizSubmission>, StoreError> {
        self.touch();
        let tables = self.tables.lock().await;
        let mut rows: Vec<QuizSubmission> = tables
            .quizzes
            .iter()
            .filter(|quiz| filter.matches(quiz))
            .cloned()
            .collect();
        if order == QuizOrder::NewestFirst {
            rows.reverse();
        }
        Ok(rows)
    }

    async fn count_quiz_submissions(&self, filter: &QuizFilter) -> Result<u64, StoreError> {
        self.touch();
        let tables = self.tables.lock().await;
        Ok(tables.quizzes.iter().filter(|quiz| filter.matches(quiz)).count() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::QuizAnswers;

    fn completion(session: &str, time: i64, completed_at: &str) -> NewCompletion {
        NewCompletion {
            session_id: session.into(),
            name: format!("player-{session}"),
            email: format!("{session}@example.com"),
            completion_time: time,
            time_string: format!("{}s", time / 1000),
            difficulty: 1,
            moves: 10,
            accuracy: 90,
            completed_at: completed_at.into(),
            results_code: "RC".into(),
        }
    }

    fn quiz(session: &str, email: &str, name: &str) -> NewQuizSubmission {
        NewQuizSubmission {
            session_id: session.into(),
            participant_name: name.into(),
            participant_email: email.into(),
            participant_mobile: "0123".into(),
            answers: QuizAnswers::default(),
            submitted_at: "2026-10-16T09:00:00.000Z".into(),
        }
    }

    #[tokio::test]
    async fn test_surrogate_ids_increase() {
        let store = MemoryRecordStore::new();
        let first = store
            .insert_completion(completion("S1", 5000, "2026-10-16T09:00:00Z"))
            .await
            .unwrap();
        let second = store
            .insert_completion(completion("S2", 4000, "2026-10-16T09:01:00Z"))
            .await
            .unwrap();
        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);

        assert!(store.delete_completion(first.id).await.unwrap());
        let third = store
            .insert_completion(completion("S3", 4000, "2026-10-16T09:02:00Z"))
            .await
            .unwrap();
        assert_eq!(third.id, 3);
        assert!(!store.delete_completion(first.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_fastest_first_keeps_insertion_order_on_ties() {
        let store = MemoryRecordStore::new();
        for (session, time) in [("A", 3000), ("B", 1000), ("C", 3000), ("D", 2000)] {
            store
                .insert_completion(completion(session, time, "2026-10-16T09:00:00Z"))
                .await
                .unwrap();
        }

        let rows = store
            .list_completions(&CompletionQuery {
                limit: Some(3),
                ..CompletionQuery::default()
            })
            .await
            .unwrap();
        let sessions: Vec<_> = rows.iter().map(|r| r.session_id.as_str()).collect();
        assert_eq!(sessions, vec!["B", "D", "A"]);
    }

    #[tokio::test]
    async fn test_newest_completed_first() {
        let store = MemoryRecordStore::new();
        for (session, at) in [
            ("A", "2026-10-16T09:00:00Z"),
            ("B", "2026-10-16T11:00:00Z"),
            ("C", "2026-10-16T10:00:00Z"),
        ] {
            store
                .insert_completion(completion(session, 1000, at))
                .await
                .unwrap();
        }

        let rows = store
            .list_completions(&CompletionQuery {
                order: CompletionOrder::NewestCompletedFirst,
                ..CompletionQuery::default()
            })
            .await
            .unwrap();
        let sessions: Vec<_> = rows.iter().map(|r| r.session_id.as_str()).collect();
        assert_eq!(sessions, vec!["B", "C", "A"]);
    }

    #[tokio::test]
    async fn test_quiz_filters() {
        let store = MemoryRecordStore::new();
        store
            .insert_quiz_submission(quiz("S1", "a@b.com", "Alice"))
            .await
            .unwrap();
        store
            .insert_quiz_submission(quiz("S2", "c@d.com", "Carol"))
            .await
            .unwrap();

        let either = QuizFilter::EmailOrName {
            email: "x@y.com".into(),
            name: "Carol".into(),
        };
        assert_eq!(store.count_quiz_submissions(&either).await.unwrap(), 1);
        assert_eq!(
            store
                .count_quiz_submissions(&QuizFilter::Email("a@b.com".into()))
                .await
                .unwrap(),
            1
        );

        let newest = store
            .list_quiz_submissions(&QuizFilter::All, QuizOrder::NewestFirst)
            .await
            .unwrap();
        assert_eq!(newest[0].session_id, "S2");
    }

    #[tokio::test]
    async fn test_unreachable_store_fails_open() {
        let store = MemoryRecordStore::unreachable("connection refused");
        let err = store.open().await.unwrap_err();
        assert!(err.to_string().contains("connection refused"));
        assert_eq!(store.operation_count(), 1);
    }
}
