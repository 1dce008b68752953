//! Collaborator contracts called by the build loop.
//!
//! Implementations may block on network calls or subprocesses. The loop
//! awaits them one at a time and never has two calls outstanding.

use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;

use super::types::{CandidateError, ExecutionOutcome, RepairOutcome, TestReport};
use crate::engine::ArtifactMap;
use crate::plan::Task;

/// Produces files for a task.
///
/// # Example
///
/// ```rust,ignore
/// use foreman::collab::{ExecutionOutcome, TaskExecutor};
///
/// async fn scaffold(executor: &impl TaskExecutor, task: &Task) -> anyhow::Result<bool> {
///     let outcome = executor
///         .execute(task, Path::new("."), &ArtifactMap::new(), &serde_json::Value::Null)
///         .await?;
///     Ok(outcome.completed)
/// }
/// ```
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    /// Execute one task.
    ///
    /// # Errors
    ///
    /// Returns an error on unrecoverable failure. The build loop treats any
    /// error as fatal to the run.
    async fn execute(
        &self,
        task: &Task,
        project_dir: &Path,
        artifacts: &ArtifactMap,
        architecture: &serde_json::Value,
    ) -> Result<ExecutionOutcome>;
}

/// Runs the project's tests.
#[async_trait]
pub trait TestRunner: Send + Sync {
    /// Run tests, optionally scoped to the task just executed.
    ///
    /// Failing tests are reported through [`TestReport::passed`], not as an
    /// error.
    ///
    /// # Errors
    ///
    /// Returns an error if the tests could not be run at all.
    async fn run_tests(&self, project_dir: &Path, task: Option<&Task>) -> Result<TestReport>;
}

/// Proposes fixes for failing tests.
#[async_trait]
pub trait Repairer: Send + Sync {
    /// Analyse a failing report and propose file-level fixes.
    ///
    /// `errors` holds the candidate errors extracted from the report, and
    /// may be empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the attempt itself failed. The build loop logs it
    /// and carries on as if no fix was proposed.
    async fn debug_and_fix(
        &self,
        project_dir: &Path,
        report: &TestReport,
        errors: &[CandidateError],
        artifacts: &ArtifactMap,
    ) -> Result<RepairOutcome>;
}
