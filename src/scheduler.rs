//! Dependency-aware task selection.
//!
//! [`next_task`] is a pure function of the graph and the tracker. Given the
//! same two inputs it always returns the same task, which is what makes a
//! build reproducible for fixed collaborator outputs.
//!
//! Selection runs in two passes over the incomplete tasks, in planning order:
//!
//! 1. The first task whose prerequisites are all met.
//! 2. Otherwise, the task with the best [`Task::fallback_score`], earliest
//!    task winning ties. This pass may pick a task whose prerequisites are
//!    unmet, so cyclic or unsatisfiable plans never stall the loop.

use crate::plan::{Task, TaskGraph};
use crate::tracker::CompletionTracker;
use serde::Serialize;

/// Why the scheduler picked a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionReason {
    /// Every prerequisite was met.
    Ready,
    /// No incomplete task was ready; picked by priority and complexity.
    PriorityFallback,
}

impl std::fmt::Display for SelectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SelectionReason::Ready => write!(f, "ready"),
            SelectionReason::PriorityFallback => write!(f, "priority fallback"),
        }
    }
}

/// A scheduling decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection<'g> {
    pub task: &'g Task,
    pub reason: SelectionReason,
}

/// Select the next task to execute, or `None` when no incomplete task
/// remains.
///
/// # Example
///
/// ```
/// use foreman::plan::{Component, Task, TaskGraph};
/// use foreman::scheduler::next_task;
/// use foreman::tracker::CompletionTracker;
///
/// let graph = TaskGraph::new(
///     vec![Component::new("api", "API"), Component::new("db", "DB")],
///     vec![
///         Task::new("t1", "api", "routes").with_prerequisites(["t2"]),
///         Task::new("t2", "db", "schema"),
///     ],
/// )?;
/// let tracker = CompletionTracker::for_graph(&graph);
///
/// assert_eq!(next_task(&graph, &tracker).map(|t| t.id.as_str()), Some("t2"));
/// # Ok::<(), foreman::ForemanError>(())
/// ```
#[must_use]
pub fn next_task<'g>(graph: &'g TaskGraph, tracker: &CompletionTracker) -> Option<&'g Task> {
    select_next(graph, tracker).map(|s| s.task)
}

/// Like [`next_task`], but also reports which pass produced the task.
#[must_use]
pub fn select_next<'g>(graph: &'g TaskGraph, tracker: &CompletionTracker) -> Option<Selection<'g>> {
    let incomplete: Vec<&Task> = incomplete_tasks(graph, tracker).collect();

    if let Some(task) = incomplete
        .iter()
        .copied()
        .find(|task| prerequisites_met(graph, tracker, task))
    {
        return Some(Selection {
            task,
            reason: SelectionReason::Ready,
        });
    }

    // `max_by_key` keeps the last maximum, so compare in reverse to keep the
    // earliest task on ties.
    incomplete
        .iter()
        .rev()
        .copied()
        .max_by_key(|task| task.fallback_score())
        .map(|task| Selection {
            task,
            reason: SelectionReason::PriorityFallback,
        })
}

/// Tasks whose component is not yet complete, in planning order.
pub fn incomplete_tasks<'g, 't>(
    graph: &'g TaskGraph,
    tracker: &'t CompletionTracker,
) -> impl Iterator<Item = &'g Task> + 't
where
    'g: 't,
{
    graph
        .tasks()
        .iter()
        .filter(move |task| !tracker.is_complete(&task.component_id))
}

/// Whether every prerequisite of `task` is met.
///
/// A prerequisite naming a task is met once that task's component is
/// complete. Any other id is looked up as a component. Ids that resolve to
/// neither are never met.
#[must_use]
pub fn prerequisites_met(graph: &TaskGraph, tracker: &CompletionTracker, task: &Task) -> bool {
    task.prerequisites
        .iter()
        .all(|prereq| prerequisite_met(graph, tracker, prereq))
}

fn prerequisite_met(graph: &TaskGraph, tracker: &CompletionTracker, prereq: &str) -> bool {
    match graph.task(prereq) {
        Ok(task) => tracker.is_complete(&task.component_id),
        Err(_) => tracker.is_complete(prereq),
    }
}
