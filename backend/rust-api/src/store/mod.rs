//! Durable storage for completions and quiz submissions.
//!
//! The service only talks to [`RecordStore`]; MongoDB backs production and
//! the in-process store backs local development and tests.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Completion, NewCompletion, NewQuizSubmission, QuizSubmission};

pub mod memory;
pub mod mongo;

pub use memory::MemoryRecordStore;
pub use mongo::MongoRecordStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("store is not connected")]
    NotConnected,
    #[error("schema check failed: {0}")]
    Schema(String),
    #[error("{operation} failed: {message}")]
    Operation {
        operation: &'static str,
        message: String,
    },
}

impl StoreError {
    pub fn operation(operation: &'static str, err: impl std::fmt::Display) -> Self {
        StoreError::Operation {
            operation,
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletionFilter {
    pub difficulty: Option<i64>,
    pub email: Option<String>,
}

impl CompletionFilter {
    pub fn by_email(email: impl Into<String>) -> Self {
        Self {
            email: Some(email.into()),
            ..Self::default()
        }
    }

    pub fn matches(&self, completion: &Completion) -> bool {
        self.difficulty
            .is_none_or(|difficulty| completion.difficulty == difficulty)
            && self
                .email
                .as_deref()
                .is_none_or(|email| completion.email == email)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CompletionOrder {
    /// Completion time ascending, insertion order on ties.
    #[default]
    FastestFirst,
    /// `completed_at` descending, insertion order on ties.
    NewestCompletedFirst,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletionQuery {
    pub filter: CompletionFilter,
    pub order: CompletionOrder,
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum QuizFilter {
    #[default]
    All,
    Sessions(Vec<String>),
    Email(String),
    EmailOrName {
        email: String,
        name: String,
    },
}

impl QuizFilter {
    pub fn matches(&self, quiz: &QuizSubmission) -> bool {
        match self {
            QuizFilter::All => true,
            QuizFilter::Sessions(ids) => ids.iter().any(|id| *id == quiz.session_id),
            QuizFilter::Email(email) => quiz.participant_email == *email,
            QuizFilter::EmailOrName { email, name } => {
                quiz.participant_email == *email || quiz.participant_name == *name
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum QuizOrder {
    #[default]
    InsertionOrder,
    NewestFirst,
}

/// Keyed storage for the two record kinds. Implementations serialize their
/// own operations; callers sequence dependent writes themselves.
#[async_trait]
pub trait RecordStore: Send + Sync {
    fn backend(&self) -> &'static str;

    /// Opens the underlying connection.
    async fn open(&self) -> Result<(), StoreError>;

    /// Creates missing collections/indexes and confirms both record kinds exist.
    async fn ensure_schema(&self) -> Result<(), StoreError>;

    async fn insert_completion(&self, record: NewCompletion) -> Result<Completion, StoreError>;

    async fn delete_completion(&self, id: i64) -> Result<bool, StoreError>;

    async fn list_completions(&self, query: &CompletionQuery)
        -> Result<Vec<Completion>, StoreError>;

    async fn count_completions(&self, filter: &CompletionFilter) -> Result<u64, StoreError>;

    async fn insert_quiz_submission(
        &self,
        record: NewQuizSubmission,
    ) -> Result<QuizSubmission, StoreError>;

    async fn list_quiz_submissions(
        &self,
        filter: &QuizFilter,
        order: QuizOrder,
    ) -> Result<Vec<QuizSubmission>, StoreError>;

    async fn count_quiz_submissions(&self, filter: &QuizFilter) -> Result<u64, StoreError>;
}
