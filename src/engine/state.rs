//! Build loop states and cancellation.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// State of a build loop run.
///
/// Every state except `Running` is terminal. Only `Failed` is an error;
/// running out of budget, running out of work, and being interrupted are
/// ordinary outcomes.
///
/// # Example
///
/// ```
/// use foreman::engine::LoopStatus;
///
/// assert!(LoopStatus::DoneMaxIterations.is_terminal());
/// assert!(!LoopStatus::DoneMaxIterations.is_failure());
/// assert_eq!(LoopStatus::DoneNoWork.to_string(), "done_no_work");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopStatus {
    Running,
    /// Every component is complete.
    DoneAllComplete,
    /// Components remain incomplete but no task is left to run.
    DoneNoWork,
    /// The iteration budget ran out.
    DoneMaxIterations,
    /// A stop was requested between iterations.
    Interrupted,
    /// A collaborator or the progress store failed.
    Failed,
}

impl LoopStatus {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, LoopStatus::Running)
    }

    #[must_use]
    pub fn is_failure(self) -> bool {
        matches!(self, LoopStatus::Failed)
    }
}

impl std::fmt::Display for LoopStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoopStatus::Running => write!(f, "running"),
            LoopStatus::DoneAllComplete => write!(f, "done_all_complete"),
            LoopStatus::DoneNoWork => write!(f, "done_no_work"),
            LoopStatus::DoneMaxIterations => write!(f, "done_max_iterations"),
            LoopStatus::Interrupted => write!(f, "interrupted"),
            LoopStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Cloneable flag that asks a running loop to stop before its next dispatch.
///
/// A dispatch already in flight is not cancelled.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    stopped: Arc<AtomicBool>,
}

impl StopHandle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}
