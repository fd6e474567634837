use thiserror::Error;
use validator::{Validate, ValidationErrors};

use crate::config::ValidationSettings;
use crate::models::{CompletionPayload, NewCompletion, NewQuizSubmission, QuizPayload};

/// Rust field name paired with the name clients send.
type FieldName = (&'static str, &'static str);

const COMPLETION_FIELDS: &[FieldName] = &[
    ("session_id", "sessionId"),
    ("name", "name"),
    ("email", "email"),
    ("completion_time", "completionTime"),
    ("time_string", "timeString"),
    ("difficulty", "difficulty"),
    ("moves", "moves"),
    ("accuracy", "accuracy"),
    ("completed_at", "completedAt"),
    ("results_code", "resultsCode"),
];

const QUIZ_FIELDS: &[FieldName] = &[
    ("session_id", "sessionId"),
    ("participant_name", "participantName"),
    ("participant_email", "participantEmail"),
    ("participant_mobile", "participantMobile"),
    ("submitted_at", "submittedAt"),
];

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationFailure {
    #[error("Missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),
    #[error("Invalid email format in {0}")]
    InvalidEmail(&'static str),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationPolicy {
    /// Legacy behaviour: a `0` completion time, difficulty or move count
    /// counts as missing.
    pub reject_zero_metrics: bool,
}

impl From<&ValidationSettings> for ValidationPolicy {
    fn from(settings: &ValidationSettings) -> Self {
        Self {
            reject_zero_metrics: settings.reject_zero_metrics,
        }
    }
}

pub fn validate_completion(
    payload: CompletionPayload,
    policy: ValidationPolicy,
) -> Result<NewCompletion, ValidationFailure> {
    let mut missing = Vec::new();
    let mut invalid_email = None;
    if let Err(errors) = payload.validate() {
        classify(&errors, COMPLETION_FIELDS, &mut missing, &mut invalid_email);
    }

    if policy.reject_zero_metrics {
        for (value, field) in [
            (payload.completion_time, "completionTime"),
            (payload.difficulty, "difficulty"),
            (payload.moves, "moves"),
        ] {
            if value == Some(0) && !missing.contains(&field) {
                missing.push(field);
            }
        }
        sort_canonical(&mut missing, COMPLETION_FIELDS);
    }

    finish(missing, invalid_email)?;

    let CompletionPayload {
        session_id: Some(session_id),
        name: Some(name),
        email: Some(email),
        completion_time: Some(completion_time),
        time_string: Some(time_string),
        difficulty: Some(difficulty),
        moves: Some(moves),
        accuracy: Some(accuracy),
        completed_at: Some(completed_at),
        results_code: Some(results_code),
    } = payload
    else {
        return Err(ValidationFailure::MissingFields(absent_completion_fields()));
    };

    Ok(NewCompletion {
        session_id,
        name,
        email,
        completion_time,
        time_string,
        difficulty,
        moves,
        accuracy,
        completed_at,
        results_code,
    })
}

pub fn validate_quiz_submission(
    payload: QuizPayload,
) -> Result<NewQuizSubmission, ValidationFailure> {
    let mut missing = Vec::new();
    let mut invalid_email = None;
    if let Err(errors) = payload.validate() {
        classify(&errors, QUIZ_FIELDS, &mut missing, &mut invalid_email);
    }
    finish(missing, invalid_email)?;

    let QuizPayload {
        session_id: Some(session_id),
        participant_name: Some(participant_name),
        participant_email: Some(participant_email),
        participant_mobile: Some(participant_mobile),
        submitted_at: Some(submitted_at),
        answers,
    } = payload
    else {
        return Err(ValidationFailure::MissingFields(
            QUIZ_FIELDS.iter().map(|(_, public)| *public).collect(),
        ));
    };

    Ok(NewQuizSubmission {
        session_id,
        participant_name,
        participant_email,
        participant_mobile,
        answers,
        submitted_at,
    })
}

/// Splits validator errors into missing fields (in canonical order) and the
/// first malformed email field.
fn classify(
    errors: &ValidationErrors,
    fields: &[FieldName],
    missing: &mut Vec<&'static str>,
    invalid_email: &mut Option<&'static str>,
) {
    let field_errors = errors.field_errors();
    for (rust_name, public_name) in fields {
        let Some(errs) = field_errors
            .get(*rust_name)
            .or_else(|| field_errors.get(*public_name))
        else {
            continue;
        };

        if errs
            .iter()
            .any(|e| e.code == "required" || e.code == "length")
        {
            missing.push(*public_name);
        } else if errs.iter().any(|e| e.code == "regex") && invalid_email.is_none() {
            *invalid_email = Some(*public_name);
        }
    }
}

fn sort_canonical(missing: &mut [&'static str], fields: &[FieldName]) {
    missing.sort_by_key(|name| {
        fields
            .iter()
            .position(|(_, public)| public == name)
            .unwrap_or(usize::MAX)
    });
}

fn finish(
    missing: Vec<&'static str>,
    invalid_email: Option<&'static str>,
) -> Result<(), ValidationFailure> {
    if !missing.is_empty() {
        return Err(ValidationFailure::MissingFields(missing));
    }
    match invalid_email {
        Some(field) => Err(ValidationFailure::InvalidEmail(field)),
        None => Ok(()),
    }
}

fn absent_completion_fields() -> Vec<&'static str> {
    COMPLETION_FIELDS.iter().map(|(_, public)| *public).collect()
}
