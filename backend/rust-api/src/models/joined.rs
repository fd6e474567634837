use serde::Serialize;

use super::{Completion, QuizAnswers, QuizSubmission};

/// One completion with the quiz submission of the same session attached.
/// Flattened so that the row keeps the storage key names.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JoinedRow {
    #[serde(flatten)]
    pub completion: Completion,
    #[serde(flatten)]
    pub quiz: QuizColumns,
}

/// Quiz side of a joined row. Every column is `null` when the session has no
/// quiz submission; columns are never dropped.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QuizColumns {
    pub quiz_id: Option<i64>,
    pub participant_name: Option<String>,
    pub participant_email: Option<String>,
    pub participant_mobile: Option<String>,
    #[serde(flatten)]
    pub answers: QuizAnswers,
    pub quiz_submitted_at: Option<String>,
}

impl QuizColumns {
    pub fn is_present(&self) -> bool {
        self.quiz_id.is_some()
    }
}

impl From<Option<&QuizSubmission>> for QuizColumns {
    fn from(quiz: Option<&QuizSubmission>) -> Self {
        match quiz {
            Some(quiz) => QuizColumns {
                quiz_id: Some(quiz.id),
                participant_name: Some(quiz.participant_name.clone()),
                participant_email: Some(quiz.participant_email.clone()),
                participant_mobile: Some(quiz.participant_mobile.clone()),
                answers: quiz.answers.clone(),
                quiz_submitted_at: Some(quiz.submitted_at.clone()),
            },
            None => QuizColumns::default(),
        }
    }
}
