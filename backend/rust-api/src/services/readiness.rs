use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use thiserror::Error;

use super::ServiceError;
use crate::metrics::STORE_READY;
use crate::models::NewCompletion;
use crate::store::{RecordStore, StoreError};

const PROBE_SESSION_ID: &str = "__readiness_probe__";

/// Lifecycle of the record store as seen by request handling.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ReadinessState {
    #[default]
    Uninitialized,
    Initializing,
    Ready,
    /// Terminal. Carries the message of the step that failed.
    Failed(String),
}

impl ReadinessState {
    pub fn label(&self) -> &'static str {
        match self {
            ReadinessState::Uninitialized => "uninitialized",
            ReadinessState::Initializing => "initializing",
            ReadinessState::Ready => "ready",
            ReadinessState::Failed(_) => "failed",
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, ReadinessState::Ready)
    }
}

impl fmt::Display for ReadinessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("illegal readiness transition {from} -> {to}")]
pub struct IllegalTransition {
    pub from: &'static str,
    pub to: &'static str,
}

/// Shared handle over the readiness state. Cloning shares the state.
#[derive(Debug, Clone, Default)]
pub struct ReadinessTracker {
    state: Arc<RwLock<ReadinessState>>,
}

impl ReadinessTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ReadinessState {
        self.read().clone()
    }

    pub fn is_ready(&self) -> bool {
        self.read().is_ready()
    }

    /// `Uninitialized -> Initializing`
    pub fn begin(&self) -> Result<(), IllegalTransition> {
        self.transition("initializing", |current| {
            matches!(current, ReadinessState::Uninitialized).then_some(ReadinessState::Initializing)
        })
    }

    /// `Initializing -> Ready`
    pub fn mark_ready(&self) -> Result<(), IllegalTransition> {
        self.transition("ready", |current| {
            matches!(current, ReadinessState::Initializing).then_some(ReadinessState::Ready)
        })
    }

    /// `Initializing -> Failed(reason)`
    pub fn mark_failed(&self, reason: impl Into<String>) -> Result<(), IllegalTransition> {
        let reason = reason.into();
        self.transition("failed", move |current| {
            matches!(current, ReadinessState::Initializing).then(|| ReadinessState::Failed(reason))
        })
    }

    /// Refuses unless the state is exactly `Ready`.
    pub fn ensure_ready(&self) -> Result<(), ServiceError> {
        match &*self.read() {
            ReadinessState::Ready => Ok(()),
            ReadinessState::Uninitialized => Err(ServiceError::StoreUnavailable(
                "Record store has not been initialized".to_string(),
            )),
            ReadinessState::Initializing => Err(ServiceError::StoreUnavailable(
                "Record store is still initializing".to_string(),
            )),
            ReadinessState::Failed(reason) => Err(ServiceError::StoreUnavailable(format!(
                "Record store initialization failed: {}",
                reason
            ))),
        }
    }

    fn transition<F>(&self, to: &'static str, next: F) -> Result<(), IllegalTransition>
    where
        F: FnOnce(&ReadinessState) -> Option<ReadinessState>,
    {
        let mut state = self.write();
        match next(&state) {
            Some(new_state) => {
                tracing::info!(from = state.label(), to, "Readiness transition");
                *state = new_state;
                Ok(())
            }
            None => {
                let err = IllegalTransition {
                    from: state.label(),
                    to,
                };
                tracing::warn!("{}", err);
                Err(err)
            }
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, ReadinessState> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, ReadinessState> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Opens the store, confirms both record kinds exist and round-trips a probe
/// completion. Drives the tracker to `Ready` or `Failed`.
pub async fn initialize_store(
    store: &dyn RecordStore,
    tracker: &ReadinessTracker,
) -> Result<(), StoreError> {
    if let Err(err) = tracker.begin() {
        return Err(StoreError::Connection(err.to_string()));
    }

    match prepare(store).await {
        Ok(()) => {
            // Transitions from Initializing cannot be illegal here
            let _ = tracker.mark_ready();
            STORE_READY.set(1);
            tracing::info!(backend = store.backend(), "Record store ready");
            Ok(())
        }
        Err(err) => {
            let _ = tracker.mark_failed(err.to_string());
            STORE_READY.set(0);
            tracing::error!(
                backend = store.backend(),
                error = %err,
                "Record store initialization failed"
            );
            Err(err)
        }
    }
}

async fn prepare(store: &dyn RecordStore) -> Result<(), StoreError> {
    store.open().await?;
    store.ensure_schema().await?;

    let probe = store.insert_completion(probe_completion()).await?;
    if !store.delete_completion(probe.id).await? {
        return Err(StoreError::Schema(format!(
            "self-test row {} could not be removed",
            probe.id
        )));
    }
    tracing::debug!(probe_id = probe.id, "Store self-test passed");
    Ok(())
}

fn probe_completion() -> NewCompletion {
    NewCompletion {
        session_id: PROBE_SESSION_ID.to_string(),
        name: "readiness probe".to_string(),
        email: "probe@localhost.invalid".to_string(),
        completion_time: 1,
        time_string: "0:00".to_string(),
        difficulty: 1,
        moves: 1,
        accuracy: 0,
        completed_at: chrono::Utc::now().to_rfc3339(),
        results_code: "PROBE".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{CompletionFilter, MemoryRecordStore};

    #[test]
    fn test_happy_path_transitions() {
        let tracker = ReadinessTracker::new();
        assert_eq!(tracker.state(), ReadinessState::Uninitialized);

        tracker.begin().unwrap();
        assert_eq!(tracker.state(), ReadinessState::Initializing);

        tracker.mark_ready().unwrap();
        assert!(tracker.is_ready());
        assert!(tracker.ensure_ready().is_ok());
    }

    #[test]
    fn test_illegal_transitions_are_rejected() {
        let tracker = ReadinessTracker::new();
        assert!(tracker.mark_ready().is_err());

        tracker.begin().unwrap();
        tracker.mark_failed("boom").unwrap();

        let err = tracker.begin().unwrap_err();
        assert_eq!(err.from, "failed");
        assert!(tracker.mark_ready().is_err());
        assert_eq!(tracker.state(), ReadinessState::Failed("boom".into()));
    }

    #[test]
    fn test_ensure_ready_reports_failure_reason() {
        let tracker = ReadinessTracker::new();
        tracker.begin().unwrap();
        assert!(matches!(
            tracker.ensure_ready(),
            Err(ServiceError::StoreUnavailable(_))
        ));

        tracker.mark_failed("connection refused").unwrap();
        match tracker.ensure_ready() {
            Err(ServiceError::StoreUnavailable(message)) => {
                assert!(message.contains("connection refused"))
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_clones_share_state() {
        let tracker = ReadinessTracker::new();
        let observer = tracker.clone();
        tracker.begin().unwrap();
        assert_eq!(observer.state(), ReadinessState::Initializing);
    }

    #[tokio::test]
    async fn test_initialize_store_leaves_no_probe_rows() {
        let store = MemoryRecordStore::new();
        let tracker = ReadinessTracker::new();

        initialize_store(&store, &tracker).await.unwrap();

        assert!(tracker.is_ready());
        assert_eq!(
            store
                .count_completions(&CompletionFilter::default())
                .await
                .unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_initialize_store_failure_is_terminal() {
        let store = MemoryRecordStore::unreachable("connection refused");
        let tracker = ReadinessTracker::new();

        assert!(initialize_store(&store, &tracker).await.is_err());
        assert_eq!(tracker.state().label(), "failed");

        // A second attempt does not leave Failed
        assert!(initialize_store(&store, &tracker).await.is_err());
        assert_eq!(tracker.state().label(), "failed");
    }
}
