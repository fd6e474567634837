//! Canonical column lists shared by every export format.
//!
//! Each [`Field`] names a storage key, the human label used by the formatted
//! JSON, CSV and XLSX outputs, the section it belongs to in the formatted
//! shape and how its value is rendered. Adding or removing a column is a
//! change to these lists only.

use lazy_static::lazy_static;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    /// `participant_info` in the formatted shape
    Participant,
    /// `quiz_responses` in the formatted shape; null values are omitted there
    Response,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Integer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub key: &'static str,
    pub label: &'static str,
    pub section: Section,
    pub kind: FieldKind,
}

const fn text(key: &'static str, label: &'static str) -> Field {
    Field {
        key,
        label,
        section: Section::Participant,
        kind: FieldKind::Text,
    }
}

const fn integer(key: &'static str, label: &'static str) -> Field {
    Field {
        key,
        label,
        section: Section::Participant,
        kind: FieldKind::Integer,
    }
}

const fn answer(key: &'static str, label: &'static str) -> Field {
    Field {
        key,
        label,
        section: Section::Response,
        kind: FieldKind::Text,
    }
}

pub const ANSWER_FIELDS: &[Field] = &[
    answer("q1_answer", "Q1 Answer"),
    answer("q2_part1", "Q2 Part 1"),
    answer("q2_part2", "Q2 Part 2"),
    answer("q3_answer", "Q3 Answer"),
    answer("q4_part1", "Q4 Part 1"),
    answer("q4_part2", "Q4 Part 2"),
    answer("q5_answer", "Q5 Answer"),
    answer("q6_answer", "Q6 Answer"),
    answer("q7_part1", "Q7 Part 1"),
    answer("q7_part2", "Q7 Part 2"),
    answer("q8_answer", "Q8 Answer"),
    answer("q9_answer", "Q9 Answer"),
    answer("q10_answer", "Q10 Answer"),
    answer("recipient_name", "Recipient Name"),
    answer("recipient_email", "Recipient Email"),
    answer("recipient_message", "Recipient Message"),
];

const QUIZ_PARTICIPANT_FIELDS: &[Field] = &[
    integer("id", "ID"),
    text("session_id", "Session ID"),
    text("participant_name", "Name"),
    text("participant_email", "Email"),
    text("participant_mobile", "Mobile"),
];

const QUIZ_TRAILING_FIELDS: &[Field] = &[
    text("submitted_at", "Submitted At"),
    text("created_at", "Created At"),
];

const COMPLETION_FIELDS: &[Field] = &[
    integer("id", "Score ID"),
    text("session_id", "Session ID"),
    text("name", "Name"),
    text("email", "Email"),
    integer("completion_time", "Completion Time (ms)"),
    text("time_string", "Time"),
    integer("difficulty", "Difficulty"),
    integer("moves", "Moves"),
    integer("accuracy", "Accuracy (%)"),
    text("completed_at", "Completed At"),
    text("results_code", "Results Code"),
];

const JOINED_QUIZ_FIELDS: &[Field] = &[
    integer("quiz_id", "Quiz ID"),
    text("participant_name", "Quiz Participant Name"),
    text("participant_email", "Quiz Participant Email"),
    text("participant_mobile", "Mobile"),
];

const JOINED_TRAILING_FIELDS: &[Field] = &[text("quiz_submitted_at", "Quiz Submitted At")];

lazy_static! {
    /// Columns of a stored quiz submission.
    pub static ref QUIZ_EXPORT_FIELDS: Vec<Field> =
        [QUIZ_PARTICIPANT_FIELDS, ANSWER_FIELDS, QUIZ_TRAILING_FIELDS].concat();

    /// Columns of a completion joined with its session's quiz submission.
    pub static ref COMBINED_EXPORT_FIELDS: Vec<Field> = [
        COMPLETION_FIELDS,
        JOINED_QUIZ_FIELDS,
        ANSWER_FIELDS,
        JOINED_TRAILING_FIELDS,
    ]
    .concat();
}

pub fn labels(fields: &[Field]) -> impl Iterator<Item = &'static str> + '_ {
    fields.iter().map(|field| field.label)
}
