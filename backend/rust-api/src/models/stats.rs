use serde::Serialize;

/// Scalar statistics over every stored completion. Aggregates are `None`
/// while the table is empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CompletionStats {
    pub total_completions: u64,
    pub avg_time: Option<f64>,
    pub fastest_time: Option<i64>,
    pub slowest_time: Option<i64>,
    pub avg_accuracy: Option<f64>,
    pub avg_moves: Option<f64>,
}
