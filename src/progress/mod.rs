//! Durable progress records.
//!
//! One [`ProgressRecord`] per project is kept under `.foreman/`, separate
//! from the generated source tree. It is overwritten once per iteration and
//! is the only build loop state that crosses the process boundary.
//!
//! # Layout
//!
//! ```text
//! <project>/.foreman/
//!   ├── progress.json       current ProgressRecord (atomic overwrite)
//!   ├── progress.json.lock  advisory lock held while writing
//!   ├── plan.json           plan the last run was started with
//!   └── architecture.json   architecture document handed to the executor
//! ```
//!
//! # Forward Compatibility
//!
//! Records carry a schema version. A record written by an incompatible
//! version is ignored with a warning and treated as "never run".

pub mod store;

pub use store::ProgressStore;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::ArtifactMap;
use crate::tracker::CompletionTracker;

/// Current schema version for progress records.
pub const PROGRESS_RECORD_VERSION: u32 = 1;

/// Name of the project metadata directory.
pub const METADATA_DIR: &str = ".foreman";

fn default_version() -> u32 {
    PROGRESS_RECORD_VERSION
}

/// Snapshot of one iteration of the build loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressRecord {
    /// Schema version.
    #[serde(default = "default_version")]
    pub version: u32,
    /// Identifies the run that wrote this record. Resumed runs keep it.
    #[serde(default)]
    pub run_id: String,
    /// Fingerprint of the plan the run was started with.
    #[serde(default)]
    pub plan_fingerprint: String,
    /// Last iteration that finished.
    pub iteration: u32,
    pub completion_status: CompletionTracker,
    #[serde(default)]
    pub artifact_mapping: ArtifactMap,
    /// Set by [`ProgressStore::save`].
    pub last_updated: DateTime<Utc>,
}

impl ProgressRecord {
    /// Create a record stamped with the current time.
    #[must_use]
    pub fn new(
        run_id: impl Into<String>,
        plan_fingerprint: impl Into<String>,
        iteration: u32,
        completion_status: CompletionTracker,
        artifact_mapping: ArtifactMap,
    ) -> Self {
        Self {
            version: PROGRESS_RECORD_VERSION,
            run_id: run_id.into(),
            plan_fingerprint: plan_fingerprint.into(),
            iteration,
            completion_status,
            artifact_mapping,
            last_updated: Utc::now(),
        }
    }

    /// Whether this build can read the record.
    #[must_use]
    pub fn is_version_compatible(&self) -> bool {
        self.version == PROGRESS_RECORD_VERSION
    }

    /// Status derived from this record.
    #[must_use]
    pub fn summary(&self) -> StatusSummary {
        let total = self.completion_status.len();
        let completed = self.completion_status.completed_count();
        StatusSummary {
            status: if completed < total {
                ProjectStatus::InProgress
            } else {
                ProjectStatus::Completed
            },
            completion_percentage: Some(self.completion_status.completion_percentage()),
            completed_components: completed,
            total_components: total,
            iteration: Some(self.iteration),
            last_updated: Some(self.last_updated),
        }
    }
}

/// Coarse project state for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    NotStarted,
    InProgress,
    Completed,
}

impl std::fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProjectStatus::NotStarted => write!(f, "not_started"),
            ProjectStatus::InProgress => write!(f, "in_progress"),
            ProjectStatus::Completed => write!(f, "completed"),
        }
    }
}

/// Read-only status derived from the stored record. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusSummary {
    pub status: ProjectStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_percentage: Option<f64>,
    #[serde(skip)]
    pub completed_components: usize,
    #[serde(skip)]
    pub total_components: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iteration: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

impl StatusSummary {
    /// Summary for a project that has never run.
    #[must_use]
    pub fn not_started() -> Self {
        Self {
            status: ProjectStatus::NotStarted,
            completion_percentage: None,
            completed_components: 0,
            total_components: 0,
            iteration: None,
            last_updated: None,
        }
    }
}
