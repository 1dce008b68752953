//! Planning defect detection.
//!
//! Defects never stop a run. The scheduler treats whatever they point at
//! as permanently unmet; this module only makes them visible.

use super::TaskGraph;
use serde::Serialize;

/// A malformed reference inside an otherwise ingestible plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlanDefect {
    /// A prerequisite names neither a task nor a component.
    DanglingPrerequisite { task_id: String, prerequisite: String },
    /// A task belongs to a component the plan never declares.
    UndeclaredComponent { task_id: String, component_id: String },
    /// A component depends on a component the plan never declares.
    UnknownDependency {
        component_id: String,
        dependency: String,
    },
    /// A task lists itself as a prerequisite.
    SelfPrerequisite { task_id: String },
}

impl std::fmt::Display for PlanDefect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlanDefect::DanglingPrerequisite {
                task_id,
                prerequisite,
            } => write!(
                f,
                "task '{task_id}' requires '{prerequisite}', which is not a task or component"
            ),
            PlanDefect::UndeclaredComponent {
                task_id,
                component_id,
            } => write!(
                f,
                "task '{task_id}' belongs to undeclared component '{component_id}'"
            ),
            PlanDefect::UnknownDependency {
                component_id,
                dependency,
            } => write!(
                f,
                "component '{component_id}' depends on unknown component '{dependency}'"
            ),
            PlanDefect::SelfPrerequisite { task_id } => {
                write!(f, "task '{task_id}' lists itself as a prerequisite")
            }
        }
    }
}

pub(super) fn detect(graph: &TaskGraph) -> Vec<PlanDefect> {
    let mut defects = Vec::new();

    for task in graph.tasks() {
        if !graph.contains_component(&task.component_id) {
            defects.push(PlanDefect::UndeclaredComponent {
                task_id: task.id.clone(),
                component_id: task.component_id.clone(),
            });
        }
        for prereq in &task.prerequisites {
            if *prereq == task.id {
                defects.push(PlanDefect::SelfPrerequisite {
                    task_id: task.id.clone(),
                });
            } else if !graph.contains_task(prereq) && !graph.contains_component(prereq) {
                defects.push(PlanDefect::DanglingPrerequisite {
                    task_id: task.id.clone(),
                    prerequisite: prereq.clone(),
                });
            }
        }
    }

    for component in graph.components() {
        for dep in &component.dependencies {
            if !graph.contains_component(dep) {
                defects.push(PlanDefect::UnknownDependency {
                    component_id: component.id.clone(),
                    dependency: dep.clone(),
                });
            }
        }
    }

    defects
}
