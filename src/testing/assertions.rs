//! Assertions for build loop tests.

use crate::engine::{ArtifactMap, LoopStatus, RunReport};
use crate::tracker::CompletionTracker;

/// Assert that a run ended in `expected`.
///
/// # Panics
///
/// Panics with the run history if the status differs.
pub fn assert_terminal_status(report: &RunReport, expected: LoopStatus) {
    assert_eq!(
        report.status,
        expected,
        "Expected run to end in {}, but it ended in {} after {} iterations.\nTasks run: {:?}",
        expected,
        report.status,
        report.iterations_run,
        report
            .history
            .iter()
            .map(|s| s.task_id.as_str())
            .collect::<Vec<_>>()
    );
}

/// Assert that tasks were dispatched in exactly this order.
///
/// # Panics
///
/// Panics if the dispatch order differs.
pub fn assert_dispatch_order(report: &RunReport, expected: &[&str]) {
    let actual: Vec<&str> = report.history.iter().map(|s| s.task_id.as_str()).collect();
    assert_eq!(actual, expected, "Unexpected dispatch order");
}

/// Assert that a component is complete.
///
/// # Panics
///
/// Panics if the component is absent or incomplete.
pub fn assert_component_complete(tracker: &CompletionTracker, component_id: &str) {
    assert!(
        tracker.is_complete(component_id),
        "Expected component '{}' to be complete.\nTracker: {:?}",
        component_id,
        tracker.iter().collect::<Vec<_>>()
    );
}

/// Assert that a component is not complete.
///
/// # Panics
///
/// Panics if the component is complete.
pub fn assert_component_incomplete(tracker: &CompletionTracker, component_id: &str) {
    assert!(
        !tracker.is_complete(component_id),
        "Expected component '{}' to be incomplete",
        component_id
    );
}

/// Assert that an artifact exists with the given content.
///
/// # Panics
///
/// Panics if the path is missing or holds different content.
pub fn assert_artifact(artifacts: &ArtifactMap, path: &str, content: &str) {
    match artifacts.get(path) {
        Some(actual) => assert_eq!(
            actual, content,
            "Artifact '{}' has unexpected content",
            path
        ),
        None => panic!(
            "Expected artifact '{}', but only found: {:?}",
            path,
            artifacts.paths().collect::<Vec<_>>()
        ),
    }
}

/// Assert that no artifact exists at `path`.
///
/// # Panics
///
/// Panics if the path is present.
pub fn assert_no_artifact(artifacts: &ArtifactMap, path: &str) {
    assert!(
        !artifacts.contains(path),
        "Expected no artifact at '{}'",
        path
    );
}
