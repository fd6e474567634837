use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::EMAIL_RE;

/// Completion row stored in the "scores" collection, one per puzzle attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    pub id: i64,
    pub session_id: String,
    pub name: String,
    pub email: String,
    /// Milliseconds taken to solve the puzzle
    pub completion_time: i64,
    pub time_string: String,
    pub difficulty: i64,
    pub moves: i64,
    pub accuracy: i64,
    pub completed_at: String,
    pub results_code: String,
    pub created_at: DateTime<Utc>,
}

/// Validated completion waiting for a surrogate id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCompletion {
    pub session_id: String,
    pub name: String,
    pub email: String,
    pub completion_time: i64,
    pub time_string: String,
    pub difficulty: i64,
    pub moves: i64,
    pub accuracy: i64,
    pub completed_at: String,
    pub results_code: String,
}

impl NewCompletion {
    pub fn into_record(self, id: i64, created_at: DateTime<Utc>) -> Completion {
        Completion {
            id,
            session_id: self.session_id,
            name: self.name,
            email: self.email,
            completion_time: self.completion_time,
            time_string: self.time_string,
            difficulty: self.difficulty,
            moves: self.moves,
            accuracy: self.accuracy,
            completed_at: self.completed_at,
            results_code: self.results_code,
            created_at,
        }
    }
}

/// Inbound completion body. Every field is optional at the wire level so that
/// absence can be reported per field instead of failing deserialization.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CompletionPayload {
    #[validate(required, length(min = 1))]
    pub session_id: Option<String>,

    #[validate(required, length(min = 1))]
    pub name: Option<String>,

    #[validate(required, length(min = 1), regex(path = *EMAIL_RE))]
    pub email: Option<String>,

    #[validate(required)]
    pub completion_time: Option<i64>,

    #[validate(required, length(min = 1))]
    pub time_string: Option<String>,

    #[validate(required)]
    pub difficulty: Option<i64>,

    #[validate(required)]
    pub moves: Option<i64>,

    /// Zero is a legitimate accuracy; only absence is rejected.
    #[validate(required)]
    pub accuracy: Option<i64>,

    #[validate(required, length(min = 1))]
    pub completed_at: Option<String>,

    #[validate(required, length(min = 1))]
    pub results_code: Option<String>,
}
