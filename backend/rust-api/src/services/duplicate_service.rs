use serde::Serialize;

use crate::metrics::DUPLICATE_CHECKS_TOTAL;
use crate::store::{CompletionFilter, QuizFilter, RecordStore, StoreError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateQuizCheck {
    pub is_duplicate: bool,
    pub existing_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailCheck {
    pub is_duplicate: bool,
    pub scores_count: u64,
    pub quiz_count: u64,
    pub total_count: u64,
}

/// Advisory "already submitted?" predicates. Nothing here blocks an insert.
pub struct DuplicateDetector<'a> {
    store: &'a dyn RecordStore,
}

impl<'a> DuplicateDetector<'a> {
    pub fn new(store: &'a dyn RecordStore) -> Self {
        Self { store }
    }

    /// A quiz submission exists with this email or this name.
    pub async fn check_quiz(
        &self,
        email: &str,
        name: &str,
    ) -> Result<DuplicateQuizCheck, StoreError> {
        let existing_count = self
            .store
            .count_quiz_submissions(&QuizFilter::EmailOrName {
                email: email.to_string(),
                name: name.to_string(),
            })
            .await?;

        let check = DuplicateQuizCheck {
            is_duplicate: existing_count > 0,
            existing_count,
        };
        record("quiz", check.is_duplicate);
        Ok(check)
    }

    /// Counts the email across completions and quiz submissions.
    pub async fn check_email(&self, email: &str) -> Result<EmailCheck, StoreError> {
        let scores_count = self
            .store
            .count_completions(&CompletionFilter::by_email(email))
            .await?;
        let quiz_count = self
            .store
            .count_quiz_submissions(&QuizFilter::Email(email.to_string()))
            .await?;

        let total_count = scores_count + quiz_count;
        let check = EmailCheck {
            is_duplicate: total_count > 0,
            scores_count,
            quiz_count,
            total_count,
        };
        record("email", check.is_duplicate);
        Ok(check)
    }
}

fn record(check: &str, duplicate: bool) {
    DUPLICATE_CHECKS_TOTAL
        .with_label_values(&[check, if duplicate { "true" } else { "false" }])
        .inc();
}
