//! Completion tracking per component.
//!
//! The tracker only ever moves a component from incomplete to complete.
//! Nothing in this module can set an entry back to `false`, so a run's
//! completion set grows monotonically.

use crate::plan::TaskGraph;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Mapping from component id to completion flag.
///
/// # Example
///
/// ```
/// use foreman::tracker::CompletionTracker;
///
/// let mut tracker = CompletionTracker::default();
/// assert!(!tracker.is_complete("auth"));
/// assert!(tracker.mark_complete("auth"));
/// assert!(!tracker.mark_complete("auth")); // already complete
/// assert!(tracker.is_complete("auth"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompletionTracker {
    status: BTreeMap<String, bool>,
}

impl CompletionTracker {
    /// Create a tracker with every component of the plan marked incomplete.
    #[must_use]
    pub fn for_graph(graph: &TaskGraph) -> Self {
        Self {
            status: graph
                .components()
                .iter()
                .map(|c| (c.id.clone(), false))
                .collect(),
        }
    }

    /// Mark a component complete.
    ///
    /// Returns `true` if this call changed the tracker. Marking an already
    /// complete component is a no-op.
    pub fn mark_complete(&mut self, component_id: &str) -> bool {
        let entry = self.status.entry(component_id.to_string()).or_insert(false);
        if *entry {
            return false;
        }
        *entry = true;
        debug!(component = component_id, "component marked complete");
        true
    }

    /// Whether a component is complete. Unknown ids are incomplete.
    #[must_use]
    pub fn is_complete(&self, component_id: &str) -> bool {
        self.status.get(component_id).copied().unwrap_or(false)
    }

    /// Whether every component declared by the graph is complete.
    #[must_use]
    pub fn all_complete(&self, graph: &TaskGraph) -> bool {
        graph.components().iter().all(|c| self.is_complete(&c.id))
    }

    /// Number of components declared by the graph that are complete.
    #[must_use]
    pub fn declared_completed(&self, graph: &TaskGraph) -> usize {
        graph
            .components()
            .iter()
            .filter(|c| self.is_complete(&c.id))
            .count()
    }

    /// Copy of this tracker holding only the graph's declared components.
    ///
    /// Tasks naming an undeclared component still mark it complete in
    /// memory so the scheduler moves past them, but those entries never
    /// count toward reported progress.
    #[must_use]
    pub fn declared_only(&self, graph: &TaskGraph) -> Self {
        Self {
            status: graph
                .components()
                .iter()
                .map(|c| (c.id.clone(), self.is_complete(&c.id)))
                .collect(),
        }
    }

    /// Apply the completed entries of an earlier snapshot.
    ///
    /// Only components the graph declares are restored, and only `true`
    /// entries are applied. Returns how many components changed.
    pub fn restore_from(&mut self, snapshot: &CompletionTracker, graph: &TaskGraph) -> usize {
        snapshot
            .status
            .iter()
            .filter(|(id, done)| **done && graph.contains_component(id))
            .filter(|(id, _)| self.mark_complete(id))
            .count()
    }

    /// Number of components recorded as complete.
    #[must_use]
    pub fn completed_count(&self) -> usize {
        self.status.values().filter(|done| **done).count()
    }

    /// Number of components the tracker knows about.
    #[must_use]
    pub fn len(&self) -> usize {
        self.status.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.status.is_empty()
    }

    /// Iterate over `(component_id, complete)` pairs in id order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.status.iter().map(|(id, done)| (id.as_str(), *done))
    }

    /// Completion percentage over the tracked components.
    ///
    /// An empty tracker reports 0.
    #[must_use]
    pub fn completion_percentage(&self) -> f64 {
        if self.status.is_empty() {
            return 0.0;
        }
        self.completed_count() as f64 / self.status.len() as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{Component, Task};

    fn graph() -> TaskGraph {
        TaskGraph::new(
            vec![
                Component::new("a", "A"),
                Component::new("b", "B"),
                Component::new("c", "C"),
            ],
            vec![Task::new("t1", "a", "")],
        )
        .unwrap()
    }

    #[test]
    fn test_initialized_false_for_every_component() {
        let tracker = CompletionTracker::for_graph(&graph());
        assert_eq!(tracker.len(), 3);
        assert_eq!(tracker.completed_count(), 0);
        assert!(tracker.iter().all(|(_, done)| !done));
    }

    #[test]
    fn test_mark_complete_is_idempotent() {
        let mut once = CompletionTracker::for_graph(&graph());
        once.mark_complete("b");

        let mut twice = CompletionTracker::for_graph(&graph());
        assert!(twice.mark_complete("b"));
        assert!(!twice.mark_complete("b"));

        assert_eq!(once, twice);
    }

    #[test]
    fn test_absent_component_is_incomplete() {
        let tracker = CompletionTracker::for_graph(&graph());
        assert!(!tracker.is_complete("zzz"));
    }

    #[test]
    fn test_all_complete() {
        let g = graph();
        let mut tracker = CompletionTracker::for_graph(&g);
        tracker.mark_complete("a");
        tracker.mark_complete("b");
        assert!(!tracker.all_complete(&g));
        tracker.mark_complete("c");
        assert!(tracker.all_complete(&g));
    }

    #[test]
    fn test_all_complete_ignores_undeclared_entries() {
        let g = graph();
        let mut tracker = CompletionTracker::for_graph(&g);
        tracker.mark_complete("ghost");
        assert!(!tracker.all_complete(&g));
        assert!(tracker.is_complete("ghost"));
    }

    #[test]
    fn test_empty_graph_is_all_complete() {
        let g = TaskGraph::new(vec![], vec![]).unwrap();
        assert!(CompletionTracker::for_graph(&g).all_complete(&g));
    }

    #[test]
    fn test_restore_is_monotonic_and_scoped_to_graph() {
        let g = graph();
        let mut snapshot = CompletionTracker::default();
        snapshot.mark_complete("a");
        snapshot.mark_complete("removed-component");
        snapshot.status.insert("b".into(), false);

        let mut tracker = CompletionTracker::for_graph(&g);
        tracker.mark_complete("c");

        let restored = tracker.restore_from(&snapshot, &g);
        assert_eq!(restored, 1);
        assert!(tracker.is_complete("a"));
        assert!(!tracker.is_complete("b"));
        assert!(tracker.is_complete("c"));
        assert!(!tracker.is_complete("removed-component"));
    }

    #[test]
    fn test_completion_percentage() {
        let g = graph();
        let mut tracker = CompletionTracker::for_graph(&g);
        assert_eq!(tracker.completion_percentage(), 0.0);
        tracker.mark_complete("a");
        assert!((tracker.completion_percentage() - 100.0 / 3.0).abs() < 1e-9);
        assert_eq!(CompletionTracker::default().completion_percentage(), 0.0);
    }

    #[test]
    fn test_serializes_as_plain_map() {
        let mut tracker = CompletionTracker::for_graph(&graph());
        tracker.mark_complete("b");
        let json = serde_json::to_string(&tracker).unwrap();
        assert_eq!(json, r#"{"a":false,"b":true,"c":false}"#);
        let back: CompletionTracker = serde_json::from_str(&json).unwrap();
        assert_eq!(back, tracker);
    }

    #[test]
    fn test_declared_only_drops_undeclared_entries() {
        let g = graph();
        let mut tracker = CompletionTracker::for_graph(&g);
        tracker.mark_complete("ghost");
        tracker.mark_complete("a");

        assert_eq!(tracker.declared_completed(&g), 1);
        let declared = tracker.declared_only(&g);
        assert_eq!(declared.len(), 3);
        assert!(!declared.is_complete("ghost"));
        assert!(declared.is_complete("a"));
    }
}
