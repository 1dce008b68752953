//! Plan record types.
//!
//! These are the tagged records produced by the planning step. Optional
//! fields carry the same defaults the planner assumes when it omits them.

use serde::{Deserialize, Deserializer, Serialize};

/// Kind of work a task performs.
///
/// A missing `type` means implementation work. Labels the executor has no
/// dedicated handling for deserialize as [`TaskType::Generic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Setup,
    #[default]
    Implementation,
    Testing,
    Documentation,
    Generic,
}

impl TaskType {
    /// Map a planner label to a task type, falling back to `Generic`.
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        match label {
            "setup" => TaskType::Setup,
            "implementation" => TaskType::Implementation,
            "testing" => TaskType::Testing,
            "documentation" => TaskType::Documentation,
            _ => TaskType::Generic,
        }
    }
}

impl<'de> Deserialize<'de> for TaskType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Ok(TaskType::from_label(&label))
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskType::Setup => write!(f, "setup"),
            TaskType::Implementation => write!(f, "implementation"),
            TaskType::Testing => write!(f, "testing"),
            TaskType::Documentation => write!(f, "documentation"),
            TaskType::Generic => write!(f, "generic"),
        }
    }
}

/// Declared priority of a task. Unrecognised labels count as medium.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl<'de> Deserialize<'de> for Priority {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Ok(Priority::from_label(&label))
    }
}

impl Priority {
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        match label {
            "high" => Priority::High,
            "low" => Priority::Low,
            _ => Priority::Medium,
        }
    }

    /// Weight used by the scheduler's priority fallback.
    #[must_use]
    pub fn weight(self) -> i32 {
        match self {
            Priority::High => 3,
            Priority::Medium => 2,
            Priority::Low => 1,
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::High => write!(f, "high"),
            Priority::Medium => write!(f, "medium"),
            Priority::Low => write!(f, "low"),
        }
    }
}

/// A logical subsystem of the project under construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

impl Component {
    /// Create a component with no dependencies.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            dependencies: Vec::new(),
        }
    }

    /// Declare dependencies on other components.
    #[must_use]
    pub fn with_dependencies<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = deps.into_iter().map(Into::into).collect();
        self
    }
}

fn default_complexity() -> u8 {
    5
}

/// An atomic unit of work belonging to one component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub component_id: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type", default)]
    pub task_type: TaskType,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default = "default_complexity")]
    pub estimated_complexity: u8,
    #[serde(default)]
    pub prerequisites: Vec<String>,
}

impl Task {
    /// Create a medium-priority implementation task of complexity 5.
    ///
    /// # Example
    ///
    /// ```
    /// use foreman::plan::{Priority, Task};
    ///
    /// let task = Task::new("t1", "auth", "Create login handler")
    ///     .with_priority(Priority::High)
    ///     .with_complexity(3);
    /// assert_eq!(task.fallback_score(), 27);
    /// ```
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        component_id: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            component_id: component_id.into(),
            description: description.into(),
            task_type: TaskType::default(),
            priority: Priority::default(),
            estimated_complexity: default_complexity(),
            prerequisites: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_type(mut self, task_type: TaskType) -> Self {
        self.task_type = task_type;
        self
    }

    #[must_use]
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub fn with_complexity(mut self, complexity: u8) -> Self {
        self.estimated_complexity = complexity;
        self
    }

    #[must_use]
    pub fn with_prerequisites<I, S>(mut self, prereqs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.prerequisites = prereqs.into_iter().map(Into::into).collect();
        self
    }

    /// Score used when no task has its prerequisites met.
    ///
    /// High priority and low complexity win.
    #[must_use]
    pub fn fallback_score(&self) -> i32 {
        self.priority.weight() * 10 - i32::from(self.estimated_complexity)
    }
}

/// On-disk shape of a plan as produced by the planning step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub components: Vec<Component>,
    #[serde(default)]
    pub tasks: Vec<Task>,
}
