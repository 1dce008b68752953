//! Task graph model.
//!
//! A [`TaskGraph`] is the read-only view of the plan that the build loop
//! consults every iteration. Required fields are validated once, when the
//! plan is ingested; after that the graph is immutable for the whole run.
//!
//! - [`types`] - Component, task, and plan document records
//! - [`defects`] - Non-fatal planning defect detection
//!
//! # Example
//!
//! ```
//! use foreman::plan::{Component, Task, TaskGraph};
//!
//! let graph = TaskGraph::new(
//!     vec![Component::new("core", "Core"), Component::new("api", "API")],
//!     vec![
//!         Task::new("t1", "core", "Scaffold crate"),
//!         Task::new("t2", "api", "Add routes").with_prerequisites(["t1"]),
//!     ],
//! )?;
//!
//! assert_eq!(graph.tasks().len(), 2);
//! assert_eq!(graph.task("t2")?.component_id, "api");
//! assert!(graph.component("missing").is_err());
//! # Ok::<(), foreman::ForemanError>(())
//! ```

pub mod defects;
pub mod types;

pub use defects::PlanDefect;
pub use types::{Component, PlanDocument, Priority, Task, TaskType};

use crate::error::{ForemanError, Result};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

/// Inclusive bounds for `estimated_complexity`.
pub const COMPLEXITY_RANGE: std::ops::RangeInclusive<u8> = 1..=10;

/// Immutable view of components, tasks, and their prerequisite edges.
#[derive(Debug, Clone)]
pub struct TaskGraph {
    name: Option<String>,
    components: Vec<Component>,
    tasks: Vec<Task>,
    component_index: HashMap<String, usize>,
    task_index: HashMap<String, usize>,
    fingerprint: String,
}

impl TaskGraph {
    /// Build a graph from components and tasks, in planning order.
    ///
    /// # Errors
    ///
    /// Returns [`ForemanError::InvalidPlan`] for empty or duplicate ids and
    /// for complexities outside 1..=10.
    pub fn new(components: Vec<Component>, tasks: Vec<Task>) -> Result<Self> {
        Self::from_document(PlanDocument {
            name: None,
            components,
            tasks,
        })
    }

    /// Ingest a plan document.
    ///
    /// # Errors
    ///
    /// Returns [`ForemanError::InvalidPlan`] when a required field is
    /// missing or malformed. Dangling references are not errors here; see
    /// [`TaskGraph::defects`].
    pub fn from_document(document: PlanDocument) -> Result<Self> {
        let fingerprint = fingerprint(&document)?;
        let PlanDocument {
            name,
            components,
            tasks,
        } = document;

        let mut component_index = HashMap::with_capacity(components.len());
        for (i, component) in components.iter().enumerate() {
            if component.id.trim().is_empty() {
                return Err(ForemanError::invalid_plan(format!(
                    "component #{} has an empty id",
                    i + 1
                )));
            }
            if component_index.insert(component.id.clone(), i).is_some() {
                return Err(ForemanError::invalid_plan(format!(
                    "duplicate component id '{}'",
                    component.id
                )));
            }
        }

        let mut task_index = HashMap::with_capacity(tasks.len());
        for (i, task) in tasks.iter().enumerate() {
            if task.id.trim().is_empty() {
                return Err(ForemanError::invalid_plan(format!(
                    "task #{} has an empty id",
                    i + 1
                )));
            }
            if task.component_id.trim().is_empty() {
                return Err(ForemanError::invalid_plan(format!(
                    "task '{}' has no component_id",
                    task.id
                )));
            }
            if !COMPLEXITY_RANGE.contains(&task.estimated_complexity) {
                return Err(ForemanError::invalid_plan(format!(
                    "task '{}' has estimated_complexity {} (expected 1..=10)",
                    task.id, task.estimated_complexity
                )));
            }
            if task_index.insert(task.id.clone(), i).is_some() {
                return Err(ForemanError::invalid_plan(format!(
                    "duplicate task id '{}'",
                    task.id
                )));
            }
        }

        debug!(
            components = components.len(),
            tasks = tasks.len(),
            "plan ingested"
        );

        Ok(Self {
            name,
            components,
            tasks,
            component_index,
            task_index,
            fingerprint,
        })
    }

    /// Parse a plan from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`ForemanError::InvalidPlan`] if the JSON does not describe a
    /// valid plan.
    pub fn parse(content: &str) -> Result<Self> {
        let document: PlanDocument = serde_json::from_str(content)
            .map_err(|e| ForemanError::invalid_plan(format!("failed to parse plan: {e}")))?;
        Self::from_document(document)
    }

    /// Load a plan from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid plan.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ForemanError::invalid_plan(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::parse(&content)
    }

    /// Tasks in planning order.
    #[must_use]
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Components in planning order.
    #[must_use]
    pub fn components(&self) -> &[Component] {
        &self.components
    }

    /// Look up a task by id.
    ///
    /// # Errors
    ///
    /// Returns [`ForemanError::NotFound`] if no task has this id.
    pub fn task(&self, id: &str) -> Result<&Task> {
        self.task_index
            .get(id)
            .map(|&i| &self.tasks[i])
            .ok_or_else(|| ForemanError::task_not_found(id))
    }

    /// Look up a component by id.
    ///
    /// # Errors
    ///
    /// Returns [`ForemanError::NotFound`] if no component has this id.
    pub fn component(&self, id: &str) -> Result<&Component> {
        self.component_index
            .get(id)
            .map(|&i| &self.components[i])
            .ok_or_else(|| ForemanError::component_not_found(id))
    }

    #[must_use]
    pub fn contains_task(&self, id: &str) -> bool {
        self.task_index.contains_key(id)
    }

    #[must_use]
    pub fn contains_component(&self, id: &str) -> bool {
        self.component_index.contains_key(id)
    }

    /// Plan name, if the planner supplied one.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// SHA-256 of the ingested plan document, hex-encoded.
    #[must_use]
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Tasks belonging to one component, in planning order.
    pub fn tasks_for<'a>(&'a self, component_id: &'a str) -> impl Iterator<Item = &'a Task> + 'a {
        self.tasks
            .iter()
            .filter(move |t| t.component_id == component_id)
    }

    /// Reassemble the plan document this graph was built from.
    #[must_use]
    pub fn to_document(&self) -> PlanDocument {
        PlanDocument {
            name: self.name.clone(),
            components: self.components.clone(),
            tasks: self.tasks.clone(),
        }
    }

    /// Report planning defects without rejecting the plan.
    #[must_use]
    pub fn defects(&self) -> Vec<PlanDefect> {
        defects::detect(self)
    }
}

fn fingerprint(document: &PlanDocument) -> Result<String> {
    let bytes = serde_json::to_vec(document)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}
