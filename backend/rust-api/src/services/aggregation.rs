use std::collections::HashMap;

use crate::models::{Completion, CompletionStats, JoinedRow, QuizColumns, QuizSubmission};

/// Left-joins quiz submissions onto completions by session id, keeping the
/// completion order. When a session has several submissions the one with the
/// lowest id wins.
pub fn join_rows(completions: Vec<Completion>, quizzes: &[QuizSubmission]) -> Vec<JoinedRow> {
    let mut first_by_session: HashMap<&str, &QuizSubmission> = HashMap::new();
    for quiz in quizzes {
        first_by_session
            .entry(quiz.session_id.as_str())
            .and_modify(|current| {
                if quiz.id < current.id {
                    *current = quiz;
                }
            })
            .or_insert(quiz);
    }

    completions
        .into_iter()
        .map(|completion| {
            let quiz = first_by_session.get(completion.session_id.as_str()).copied();
            JoinedRow {
                quiz: QuizColumns::from(quiz),
                completion,
            }
        })
        .collect()
}

/// Distinct session ids in first-seen order.
pub fn session_ids(completions: &[Completion]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    completions
        .iter()
        .filter(|completion| seen.insert(completion.session_id.as_str()))
        .map(|completion| completion.session_id.clone())
        .collect()
}

pub fn summarize(completions: &[Completion]) -> CompletionStats {
    let total = completions.len();
    if total == 0 {
        return CompletionStats::default();
    }

    let count = total as f64;
    let sum = |metric: fn(&Completion) -> i64| -> f64 {
        completions.iter().map(|c| metric(c) as f64).sum::<f64>()
    };

    CompletionStats {
        total_completions: total as u64,
        avg_time: Some(sum(|c| c.completion_time) / count),
        fastest_time: completions.iter().map(|c| c.completion_time).min(),
        slowest_time: completions.iter().map(|c| c.completion_time).max(),
        avg_accuracy: Some(sum(|c| c.accuracy) / count),
        avg_moves: Some(sum(|c| c.moves) / count),
    }
}
