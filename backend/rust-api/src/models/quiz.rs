use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::EMAIL_RE;

/// Free-text answers of the companion questionnaire. Stored snake_case; the
/// camelCase aliases accept the browser payload as-is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuizAnswers {
    #[serde(alias = "q1Answer")]
    pub q1_answer: Option<String>,
    #[serde(alias = "q2Part1")]
    pub q2_part1: Option<String>,
    #[serde(alias = "q2Part2")]
    pub q2_part2: Option<String>,
    #[serde(alias = "q3Answer")]
    pub q3_answer: Option<String>,
    #[serde(alias = "q4Part1")]
    pub q4_part1: Option<String>,
    #[serde(alias = "q4Part2")]
    pub q4_part2: Option<String>,
    #[serde(alias = "q5Answer")]
    pub q5_answer: Option<String>,
    #[serde(alias = "q6Answer")]
    pub q6_answer: Option<String>,
    #[serde(alias = "q7Part1")]
    pub q7_part1: Option<String>,
    #[serde(alias = "q7Part2")]
    pub q7_part2: Option<String>,
    #[serde(alias = "q8Answer")]
    pub q8_answer: Option<String>,
    #[serde(alias = "q9Answer")]
    pub q9_answer: Option<String>,
    #[serde(alias = "q10Answer")]
    pub q10_answer: Option<String>,
    #[serde(alias = "recipientName")]
    pub recipient_name: Option<String>,
    #[serde(alias = "recipientEmail")]
    pub recipient_email: Option<String>,
    #[serde(alias = "recipientMessage")]
    pub recipient_message: Option<String>,
}

/// Quiz row stored in the "quiz_answers" collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizSubmission {
    pub id: i64,
    pub session_id: String,
    pub participant_name: String,
    pub participant_email: String,
    pub participant_mobile: String,
    #[serde(flatten)]
    pub answers: QuizAnswers,
    pub submitted_at: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewQuizSubmission {
    pub session_id: String,
    pub participant_name: String,
    pub participant_email: String,
    pub participant_mobile: String,
    pub answers: QuizAnswers,
    pub submitted_at: String,
}

impl NewQuizSubmission {
    pub fn into_record(self, id: i64, created_at: DateTime<Utc>) -> QuizSubmission {
        QuizSubmission {
            id,
            session_id: self.session_id,
            participant_name: self.participant_name,
            participant_email: self.participant_email,
            participant_mobile: self.participant_mobile,
            answers: self.answers,
            submitted_at: self.submitted_at,
            created_at,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct QuizPayload {
    #[validate(required, length(min = 1))]
    pub session_id: Option<String>,

    #[validate(required, length(min = 1))]
    pub participant_name: Option<String>,

    #[validate(required, length(min = 1), regex(path = *EMAIL_RE))]
    pub participant_email: Option<String>,

    #[validate(required, length(min = 1))]
    pub participant_mobile: Option<String>,

    #[validate(required, length(min = 1))]
    pub submitted_at: Option<String>,

    #[serde(flatten)]
    pub answers: QuizAnswers,
}
