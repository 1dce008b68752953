//! Build loop orchestration.
//!
//! The [`BuildLoop`] owns the completion tracker and artifact mapping for
//! the duration of a run. Nothing else mutates them; callers read them back
//! through accessors or [`BuildLoop::snapshot`].
//!
//! Collaborators are injected through [`Collaborators`], which makes the
//! loop testable with the scripted doubles in [`crate::testing`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::artifacts::ArtifactMap;
use super::repair::{extract_candidate_errors, RepairVerdict};
use super::state::{LoopStatus, StopHandle};
use crate::collab::{
    CommandTestRunner, ProcessExecutor, ProcessRepairer, Repairer, TaskExecutor, TestReport,
    TestRunner,
};
use crate::config::{CollaboratorSettings, LoopSettings};
use crate::error::{ForemanError, Result};
use crate::plan::{Task, TaskGraph};
use crate::progress::{ProgressRecord, ProgressStore};
use crate::scheduler::{select_next, SelectionReason};
use crate::tracker::CompletionTracker;

/// Default iteration budget for one run.
pub const DEFAULT_MAX_ITERATIONS: u32 = 1000;

/// Collaborators the loop dispatches to.
///
/// # Example
///
/// ```rust,ignore
/// use foreman::engine::Collaborators;
/// use foreman::testing::{MockRepairer, MockTestRunner, ScriptedExecutor};
/// use std::sync::Arc;
///
/// let collaborators = Collaborators::new(
///     Arc::new(ScriptedExecutor::completing()),
///     Arc::new(MockTestRunner::passing()),
/// )
/// .with_repairer(Arc::new(MockRepairer::new()));
/// ```
#[derive(Clone)]
pub struct Collaborators {
    pub executor: Arc<dyn TaskExecutor>,
    pub tester: Arc<dyn TestRunner>,
    /// Without a repairer, failing tests are only logged.
    pub repairer: Option<Arc<dyn Repairer>>,
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators")
            .field("executor", &"<dyn TaskExecutor>")
            .field("tester", &"<dyn TestRunner>")
            .field(
                "repairer",
                &self.repairer.as_ref().map(|_| "<dyn Repairer>"),
            )
            .finish()
    }
}

impl Collaborators {
    #[must_use]
    pub fn new(executor: Arc<dyn TaskExecutor>, tester: Arc<dyn TestRunner>) -> Self {
        Self {
            executor,
            tester,
            repairer: None,
        }
    }

    #[must_use]
    pub fn with_repairer(mut self, repairer: Arc<dyn Repairer>) -> Self {
        self.repairer = Some(repairer);
        self
    }

    /// Build subprocess collaborators from configuration.
    ///
    /// The executor is required. Without a test command the runner detects
    /// one from the project on each run.
    ///
    /// # Errors
    ///
    /// Returns [`ForemanError::MissingCollaborator`] without an executor and
    /// [`ForemanError::InvalidConfig`] for an empty command.
    pub fn from_settings(settings: &CollaboratorSettings) -> Result<Self> {
        let Some(ref executor_argv) = settings.executor else {
            return Err(ForemanError::MissingCollaborator {
                role: "executor".to_string(),
                hint: "set collaborators.executor in .foreman/foreman.toml or pass --executor"
                    .to_string(),
            });
        };
        let executor = ProcessExecutor::new(executor_argv.clone())?
            .with_timeout(settings.collaborator_timeout());

        let tester = match settings.test_command {
            Some(ref argv) => CommandTestRunner::with_command(argv.clone())?,
            None => CommandTestRunner::auto_detect(),
        }
        .with_timeout(settings.test_timeout());

        let mut collaborators = Self::new(Arc::new(executor), Arc::new(tester));
        if let Some(ref argv) = settings.repairer {
            let repairer =
                ProcessRepairer::new(argv.clone())?.with_timeout(settings.collaborator_timeout());
            collaborators = collaborators.with_repairer(Arc::new(repairer));
        }
        Ok(collaborators)
    }
}

/// Configuration for one build loop run.
#[derive(Debug, Clone)]
pub struct BuildLoopConfig {
    /// Directory of the project under construction.
    pub project_dir: PathBuf,
    /// Iterations this run may execute.
    pub max_iterations: u32,
    /// Run the test collaborator after each execution.
    pub auto_test: bool,
    /// Ask the repairer for fixes when tests fail.
    pub auto_fix: bool,
    /// Architecture document handed to the executor.
    pub architecture: serde_json::Value,
}

impl BuildLoopConfig {
    #[must_use]
    pub fn new(project_dir: impl Into<PathBuf>) -> Self {
        Self {
            project_dir: project_dir.into(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            auto_test: true,
            auto_fix: true,
            architecture: serde_json::Value::Null,
        }
    }

    #[must_use]
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }

    #[must_use]
    pub fn with_auto_test(mut self, enabled: bool) -> Self {
        self.auto_test = enabled;
        self
    }

    #[must_use]
    pub fn with_auto_fix(mut self, enabled: bool) -> Self {
        self.auto_fix = enabled;
        self
    }

    #[must_use]
    pub fn with_architecture(mut self, architecture: serde_json::Value) -> Self {
        self.architecture = architecture;
        self
    }

    /// Apply the `[loop]` section of a configuration file.
    #[must_use]
    pub fn with_settings(self, settings: &LoopSettings) -> Self {
        self.with_max_iterations(settings.max_iterations)
            .with_auto_test(settings.auto_test)
            .with_auto_fix(settings.auto_fix)
    }
}

/// Outcome of the test step of an iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TestStatus {
    NotRun,
    Passed,
    Skipped,
    Failed,
}

impl From<&TestReport> for TestStatus {
    fn from(report: &TestReport) -> Self {
        match (report.passed, report.skipped) {
            (true, true) => TestStatus::Skipped,
            (true, false) => TestStatus::Passed,
            (false, _) => TestStatus::Failed,
        }
    }
}

/// What happened during one iteration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IterationSummary {
    pub iteration: u32,
    pub task_id: String,
    pub component_id: String,
    pub selection: SelectionReason,
    pub files_written: usize,
    pub tests: TestStatus,
    pub fixes_accepted: usize,
    pub fixes_rejected: usize,
    /// The executor reported the task complete.
    pub task_completed: bool,
    /// This iteration moved the task's component to complete.
    pub component_newly_completed: bool,
    pub completed_components: usize,
}

/// Final report of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub status: LoopStatus,
    pub run_id: String,
    /// Iterations executed by this run.
    pub iterations_run: u32,
    /// Number of the last persisted iteration, counting resumed ones.
    pub last_iteration: u32,
    pub completed_components: usize,
    pub total_components: usize,
    pub history: Vec<IterationSummary>,
}

type IterationObserver = Arc<dyn Fn(&IterationSummary) + Send + Sync>;

/// Drives one project through the build–test–repair loop.
///
/// # Example
///
/// ```rust,ignore
/// let config = BuildLoopConfig::new("./my-app").with_max_iterations(50);
/// let mut build = BuildLoop::new(graph, config, collaborators);
/// if let Some(record) = ProgressStore::new("./my-app").load()? {
///     build.resume_from(&record);
/// }
/// let report = build.run().await?;
/// println!("{} after {} iterations", report.status, report.iterations_run);
/// ```
pub struct BuildLoop {
    graph: TaskGraph,
    config: BuildLoopConfig,
    collaborators: Collaborators,
    store: ProgressStore,
    tracker: CompletionTracker,
    artifacts: ArtifactMap,
    /// Last iteration whose work is reflected in memory.
    iteration: u32,
    run_id: String,
    status: LoopStatus,
    stop: StopHandle,
    history: Vec<IterationSummary>,
    observer: Option<IterationObserver>,
}

impl std::fmt::Debug for BuildLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildLoop")
            .field("project_dir", &self.config.project_dir)
            .field("run_id", &self.run_id)
            .field("iteration", &self.iteration)
            .field("status", &self.status)
            .field("tracker", &self.tracker)
            .field("artifacts", &self.artifacts.len())
            .finish_non_exhaustive()
    }
}

impl BuildLoop {
    /// Create a loop persisting under `<project_dir>/.foreman`.
    #[must_use]
    pub fn new(graph: TaskGraph, config: BuildLoopConfig, collaborators: Collaborators) -> Self {
        let store = ProgressStore::new(&config.project_dir);
        let tracker = CompletionTracker::for_graph(&graph);
        Self {
            graph,
            config,
            collaborators,
            store,
            tracker,
            artifacts: ArtifactMap::new(),
            iteration: 0,
            run_id: Uuid::new_v4().to_string(),
            status: LoopStatus::Running,
            stop: StopHandle::new(),
            history: Vec::new(),
            observer: None,
        }
    }

    /// Persist through a different store.
    #[must_use]
    pub fn with_store(mut self, store: ProgressStore) -> Self {
        self.store = store;
        self
    }

    /// Share an existing stop handle.
    #[must_use]
    pub fn with_stop_handle(mut self, stop: StopHandle) -> Self {
        self.stop = stop;
        self
    }

    /// Call `observer` after every persisted iteration.
    #[must_use]
    pub fn with_observer<F>(mut self, observer: F) -> Self
    where
        F: Fn(&IterationSummary) + Send + Sync + 'static,
    {
        self.observer = Some(Arc::new(observer));
        self
    }

    /// Continue from an earlier run's record.
    ///
    /// Completed components of the current plan are restored, artifacts
    /// are merged back, and iteration numbering continues from the record.
    /// Returns how many components were restored as complete.
    pub fn resume_from(&mut self, record: &ProgressRecord) -> usize {
        if record.plan_fingerprint != self.graph.fingerprint() {
            warn!(
                "Plan changed since iteration {} was recorded; restoring completion for matching components only",
                record.iteration
            );
        }
        let restored = self
            .tracker
            .restore_from(&record.completion_status, &self.graph);
        self.artifacts.merge(record.artifact_mapping.iter());
        self.iteration = self.iteration.max(record.iteration);
        if !record.run_id.is_empty() {
            self.run_id.clone_from(&record.run_id);
        }
        info!(
            "Resuming run {} after iteration {} ({} components complete)",
            self.run_id,
            self.iteration,
            self.tracker.completed_count()
        );
        restored
    }

    #[must_use]
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    #[must_use]
    pub fn graph(&self) -> &TaskGraph {
        &self.graph
    }

    #[must_use]
    pub fn tracker(&self) -> &CompletionTracker {
        &self.tracker
    }

    #[must_use]
    pub fn artifacts(&self) -> &ArtifactMap {
        &self.artifacts
    }

    #[must_use]
    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    #[must_use]
    pub fn status(&self) -> LoopStatus {
        self.status
    }

    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    #[must_use]
    pub fn history(&self) -> &[IterationSummary] {
        &self.history
    }

    #[must_use]
    pub fn project_dir(&self) -> &Path {
        &self.config.project_dir
    }

    /// Current in-memory state as a progress record.
    ///
    /// After a persistence failure this holds the state that could not be
    /// written; pass it to [`ProgressStore::save`] to retry.
    #[must_use]
    pub fn snapshot(&self) -> ProgressRecord {
        ProgressRecord::new(
            self.run_id.clone(),
            self.graph.fingerprint(),
            self.iteration,
            self.tracker.declared_only(&self.graph),
            self.artifacts.clone(),
        )
    }

    /// Run until a terminal state.
    ///
    /// # Errors
    ///
    /// Returns [`ForemanError::Execution`] or [`ForemanError::TestRun`] when
    /// a collaborator fails, and [`ForemanError::Persistence`] when a
    /// progress record cannot be written. The loop is then `Failed`; the
    /// last persisted record is untouched and resumable.
    pub async fn run(&mut self) -> Result<RunReport> {
        self.status = LoopStatus::Running;
        let first_iteration = self.iteration;
        let last_allowed = first_iteration.saturating_add(self.config.max_iterations);

        info!(
            "Starting run {} ({} components, {} tasks, max {} iterations)",
            self.run_id,
            self.graph.components().len(),
            self.graph.tasks().len(),
            self.config.max_iterations
        );
        for defect in self.graph.defects() {
            warn!("Plan defect: {}", defect);
        }

        if let Err(e) = self.persist_inputs() {
            return Err(self.fail(e));
        }

        loop {
            if self.tracker.all_complete(&self.graph) {
                self.status = LoopStatus::DoneAllComplete;
                break;
            }
            if self.iteration >= last_allowed {
                self.status = LoopStatus::DoneMaxIterations;
                break;
            }
            if self.stop.is_stopped() {
                self.status = LoopStatus::Interrupted;
                break;
            }
            let Some(selection) = select_next(&self.graph, &self.tracker) else {
                self.status = LoopStatus::DoneNoWork;
                break;
            };
            let task = selection.task.clone();
            let reason = selection.reason;

            match self.run_iteration(self.iteration + 1, &task, reason).await {
                Ok(summary) => {
                    if let Some(ref observer) = self.observer {
                        observer(&summary);
                    }
                    self.history.push(summary);
                }
                Err(e) => return Err(self.fail(e)),
            }
        }

        info!(
            "Run {} finished: {} after {} iterations ({}/{} components complete)",
            self.run_id,
            self.status,
            self.iteration - first_iteration,
            self.tracker.declared_completed(&self.graph),
            self.graph.components().len()
        );

        Ok(RunReport {
            status: self.status,
            run_id: self.run_id.clone(),
            iterations_run: self.iteration - first_iteration,
            last_iteration: self.iteration,
            completed_components: self.tracker.declared_completed(&self.graph),
            total_components: self.graph.components().len(),
            history: self.history.clone(),
        })
    }

    fn fail(&mut self, err: ForemanError) -> ForemanError {
        self.status = LoopStatus::Failed;
        error!("Run {} failed at iteration {}: {}", self.run_id, self.iteration + 1, err);
        err
    }

    fn persist_inputs(&self) -> Result<()> {
        self.store.save_plan(&self.graph.to_document())?;
        if !self.config.architecture.is_null() {
            self.store.save_architecture(&self.config.architecture)?;
        }
        Ok(())
    }

    async fn run_iteration(
        &mut self,
        iteration: u32,
        task: &Task,
        reason: SelectionReason,
    ) -> Result<IterationSummary> {
        info!("Iteration {}: {} [{}] {}", iteration, task.id, task.component_id, task.description);
        if reason == SelectionReason::PriorityFallback {
            warn!(
                "No task has its prerequisites met; running {} as best effort",
                task.id
            );
        }

        let outcome = self
            .collaborators
            .executor
            .execute(
                task,
                &self.config.project_dir,
                &self.artifacts,
                &self.config.architecture,
            )
            .await
            .map_err(|source| ForemanError::Execution {
                task_id: task.id.clone(),
                source,
            })?;
        let files_written = self.artifacts.merge(outcome.files);
        debug!(files = files_written, completed = outcome.completed, "execution finished");

        let mut tests = TestStatus::NotRun;
        let mut verdict = RepairVerdict::default();
        if self.config.auto_test {
            let report = self
                .collaborators
                .tester
                .run_tests(&self.config.project_dir, Some(task))
                .await
                .map_err(|source| ForemanError::TestRun { source })?;
            tests = TestStatus::from(&report);
            debug!(status = ?tests, "tests finished");

            if tests == TestStatus::Failed {
                if self.config.auto_fix {
                    verdict = self.attempt_repair(&report).await;
                } else {
                    warn!("Tests failed for {}; repair disabled", task.id);
                }
            }
        }

        let component_newly_completed =
            outcome.completed && self.tracker.mark_complete(&task.component_id);
        if component_newly_completed {
            info!("Component {} complete", task.component_id);
        }

        self.iteration = iteration;
        self.store.save(&self.snapshot())?;

        Ok(IterationSummary {
            iteration,
            task_id: task.id.clone(),
            component_id: task.component_id.clone(),
            selection: reason,
            files_written,
            tests,
            fixes_accepted: verdict.accepted.len(),
            fixes_rejected: verdict.rejected.len(),
            task_completed: outcome.completed,
            component_newly_completed,
            completed_components: self.tracker.declared_completed(&self.graph),
        })
    }

    /// One repair attempt. Repairer errors are logged, never propagated.
    async fn attempt_repair(&mut self, report: &TestReport) -> RepairVerdict {
        let Some(repairer) = self.collaborators.repairer.clone() else {
            warn!("Tests failed but no repairer is configured");
            return RepairVerdict::default();
        };

        let errors = extract_candidate_errors(&report.output);
        debug!(candidates = errors.len(), "requesting repair");

        match repairer
            .debug_and_fix(&self.config.project_dir, report, &errors, &self.artifacts)
            .await
        {
            Ok(outcome) => {
                if !outcome.message.is_empty() {
                    debug!("Repairer: {}", outcome.message);
                }
                let verdict = RepairVerdict::judge(outcome);
                let merged = self.artifacts.merge(verdict.accepted_files());
                info!(
                    "Repair: {} fixes accepted, {} rejected, {} files updated",
                    verdict.accepted.len(),
                    verdict.rejected.len(),
                    merged
                );
                verdict
            }
            Err(source) => {
                let err = ForemanError::Repair { source };
                warn!("{}", err);
                RepairVerdict::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::{ExecutionOutcome, ProposedFix, RepairOutcome};
    use crate::plan::{Component, Priority};
    use crate::testing::{MockRepairer, MockTestRunner, ScriptedExecutor};
    use tempfile::TempDir;

    fn graph(components: &[&str]) -> TaskGraph {
        TaskGraph::new(
            components.iter().map(|c| Component::new(*c, *c)).collect(),
            components
                .iter()
                .map(|c| Task::new(format!("t-{c}"), *c, format!("build {c}")))
                .collect(),
        )
        .unwrap()
    }

    fn build(
        dir: &TempDir,
        graph: TaskGraph,
        executor: ScriptedExecutor,
        config: impl FnOnce(BuildLoopConfig) -> BuildLoopConfig,
    ) -> BuildLoop {
        let collaborators = Collaborators::new(
            Arc::new(executor),
            Arc::new(MockTestRunner::passing()),
        );
        BuildLoop::new(graph, config(BuildLoopConfig::new(dir.path())), collaborators)
    }

    #[tokio::test]
    async fn test_runs_until_all_complete() {
        let dir = TempDir::new().unwrap();
        let mut build = build(&dir, graph(&["a", "b"]), ScriptedExecutor::completing(), |c| c);

        let report = build.run().await.unwrap();
        assert_eq!(report.status, LoopStatus::DoneAllComplete);
        assert_eq!(report.iterations_run, 2);
        assert_eq!(report.completed_components, 2);
        assert_eq!(build.status(), LoopStatus::DoneAllComplete);
    }

    #[tokio::test]
    async fn test_already_complete_plan_runs_no_iterations() {
        let dir = TempDir::new().unwrap();
        let executor = ScriptedExecutor::completing();
        let mut build = build(&dir, graph(&[]), executor.clone(), |c| c);

        let report = build.run().await.unwrap();
        assert_eq!(report.status, LoopStatus::DoneAllComplete);
        assert_eq!(report.iterations_run, 0);
        assert_eq!(executor.call_count(), 0);
    }

    #[tokio::test]
    async fn test_zero_budget_stops_immediately() {
        let dir = TempDir::new().unwrap();
        let executor = ScriptedExecutor::completing();
        let mut build = build(&dir, graph(&["a"]), executor.clone(), |c| {
            c.with_max_iterations(0)
        });

        let report = build.run().await.unwrap();
        assert_eq!(report.status, LoopStatus::DoneMaxIterations);
        assert_eq!(executor.call_count(), 0);
    }

    #[tokio::test]
    async fn test_no_work_when_tasks_missing_for_component() {
        let dir = TempDir::new().unwrap();
        let graph = TaskGraph::new(
            vec![Component::new("a", "A"), Component::new("orphan", "Orphan")],
            vec![Task::new("t1", "a", "")],
        )
        .unwrap();
        let mut build = build(&dir, graph, ScriptedExecutor::completing(), |c| c);

        let report = build.run().await.unwrap();
        assert_eq!(report.status, LoopStatus::DoneNoWork);
        assert_eq!(report.iterations_run, 1);
        assert!(!build.tracker().is_complete("orphan"));
    }

    #[tokio::test]
    async fn test_undeclared_component_not_counted_in_progress() {
        let dir = TempDir::new().unwrap();
        let graph = TaskGraph::new(
            vec![Component::new("a", "A"), Component::new("b", "B")],
            vec![
                Task::new("t-ghost", "ghost", ""),
                Task::new("t-a", "a", ""),
                Task::new("t-b", "b", ""),
            ],
        )
        .unwrap();
        let mut build = build(&dir, graph, ScriptedExecutor::completing(), |c| {
            c.with_max_iterations(1)
        });

        let report = build.run().await.unwrap();
        assert_eq!(report.history[0].task_id, "t-ghost");
        assert_eq!(report.history[0].completed_components, 0);
        assert_eq!(report.completed_components, 0);

        let summary = build.snapshot().summary();
        assert_eq!(summary.completed_components, 0);
        assert_eq!(summary.total_components, 2);
        assert_eq!(summary.completion_percentage, Some(0.0));
    }

    #[tokio::test]
    async fn test_execution_failure_is_fatal_and_keeps_last_record() {
        let dir = TempDir::new().unwrap();
        let executor = ScriptedExecutor::completing().failing_on("t-b", "model unavailable");
        let mut build = build(&dir, graph(&["a", "b", "c"]), executor, |c| c);

        let err = build.run().await.unwrap_err();
        assert!(matches!(err, ForemanError::Execution { ref task_id, .. } if task_id == "t-b"));
        assert_eq!(build.status(), LoopStatus::Failed);

        let record = ProgressStore::new(dir.path()).load().unwrap().unwrap();
        assert_eq!(record.iteration, 1);
        assert!(record.completion_status.is_complete("a"));
        assert!(!record.completion_status.is_complete("b"));
    }

    #[tokio::test]
    async fn test_test_runner_error_is_fatal() {
        let dir = TempDir::new().unwrap();
        let collaborators = Collaborators::new(
            Arc::new(ScriptedExecutor::completing()),
            Arc::new(MockTestRunner::passing().with_error("pytest crashed")),
        );
        let mut build = BuildLoop::new(graph(&["a"]), BuildLoopConfig::new(dir.path()), collaborators);

        let err = build.run().await.unwrap_err();
        assert!(matches!(err, ForemanError::TestRun { .. }));
        assert!(ProgressStore::new(dir.path()).load().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_repairer_error_is_not_fatal() {
        let dir = TempDir::new().unwrap();
        let repairer = MockRepairer::new().with_error("llm timeout");
        let collaborators = Collaborators::new(
            Arc::new(ScriptedExecutor::completing()),
            Arc::new(MockTestRunner::failing("FAILED test_a")),
        )
        .with_repairer(Arc::new(repairer.clone()));
        let mut build = BuildLoop::new(graph(&["a"]), BuildLoopConfig::new(dir.path()), collaborators);

        let report = build.run().await.unwrap();
        assert_eq!(report.status, LoopStatus::DoneAllComplete);
        assert_eq!(repairer.call_count(), 1);
        assert_eq!(report.history[0].tests, TestStatus::Failed);
    }

    #[tokio::test]
    async fn test_repair_disabled_skips_repairer() {
        let dir = TempDir::new().unwrap();
        let repairer = MockRepairer::new()
            .with_outcome(RepairOutcome::no_fix("").with_fix(ProposedFix::new(0.9)));
        let collaborators = Collaborators::new(
            Arc::new(ScriptedExecutor::completing()),
            Arc::new(MockTestRunner::failing("ERROR")),
        )
        .with_repairer(Arc::new(repairer.clone()));
        let config = BuildLoopConfig::new(dir.path()).with_auto_fix(false);
        let mut build = BuildLoop::new(graph(&["a"]), config, collaborators);

        build.run().await.unwrap();
        assert_eq!(repairer.call_count(), 0);
    }

    #[tokio::test]
    async fn test_passing_tests_skip_repairer() {
        let dir = TempDir::new().unwrap();
        let repairer = MockRepairer::new();
        let collaborators = Collaborators::new(
            Arc::new(ScriptedExecutor::completing()),
            Arc::new(MockTestRunner::passing()),
        )
        .with_repairer(Arc::new(repairer.clone()));
        let mut build = BuildLoop::new(graph(&["a"]), BuildLoopConfig::new(dir.path()), collaborators);

        build.run().await.unwrap();
        assert_eq!(repairer.call_count(), 0);
    }

    #[tokio::test]
    async fn test_testing_disabled_skips_runner() {
        let dir = TempDir::new().unwrap();
        let tester = MockTestRunner::failing("FAILED");
        let collaborators = Collaborators::new(
            Arc::new(ScriptedExecutor::completing()),
            Arc::new(tester.clone()),
        );
        let config = BuildLoopConfig::new(dir.path()).with_auto_test(false);
        let mut build = BuildLoop::new(graph(&["a"]), config, collaborators);

        let report = build.run().await.unwrap();
        assert_eq!(tester.call_count(), 0);
        assert_eq!(report.history[0].tests, TestStatus::NotRun);
    }

    #[tokio::test]
    async fn test_incomplete_outcome_leaves_component_open() {
        let dir = TempDir::new().unwrap();
        let executor = ScriptedExecutor::completing()
            .with_outcome("t-a", ExecutionOutcome::incomplete().with_file("a.rs", "// wip"));
        let mut build = build(&dir, graph(&["a"]), executor, |c| c.with_max_iterations(3));

        let report = build.run().await.unwrap();
        assert_eq!(report.status, LoopStatus::DoneMaxIterations);
        assert_eq!(report.iterations_run, 3);
        assert!(!build.tracker().is_complete("a"));
        assert_eq!(build.artifacts().get("a.rs"), Some("// wip"));
    }

    #[tokio::test]
    async fn test_stop_handle_interrupts_before_dispatch() {
        let dir = TempDir::new().unwrap();
        let executor = ScriptedExecutor::completing();
        let base = build(&dir, graph(&["a", "b", "c"]), executor.clone(), |c| c);
        let stop = base.stop_handle();
        let mut build = base.with_observer(move |summary| {
            if summary.iteration == 1 {
                stop.stop();
            }
        });

        let report = build.run().await.unwrap();
        assert_eq!(report.status, LoopStatus::Interrupted);
        assert_eq!(executor.call_count(), 1);
        let record = ProgressStore::new(dir.path()).load().unwrap().unwrap();
        assert_eq!(record.iteration, 1);
    }

    #[tokio::test]
    async fn test_fallback_selection_is_recorded() {
        let dir = TempDir::new().unwrap();
        let graph = TaskGraph::new(
            vec![Component::new("a", "A"), Component::new("b", "B")],
            vec![
                Task::new("t1", "a", "").with_prerequisites(["t2"]),
                Task::new("t2", "b", "")
                    .with_prerequisites(["t1"])
                    .with_priority(Priority::High),
            ],
        )
        .unwrap();
        let mut build = build(&dir, graph, ScriptedExecutor::completing(), |c| c);

        let report = build.run().await.unwrap();
        assert_eq!(report.history[0].task_id, "t2");
        assert_eq!(report.history[0].selection, SelectionReason::PriorityFallback);
        assert_eq!(report.history[1].selection, SelectionReason::Ready);
    }

    #[tokio::test]
    async fn test_resume_continues_numbering_and_completion() {
        let dir = TempDir::new().unwrap();
        let executor = ScriptedExecutor::completing();
        let mut first = build(&dir, graph(&["a", "b", "c"]), executor.clone(), |c| {
            c.with_max_iterations(1)
        });
        let first_report = first.run().await.unwrap();
        assert_eq!(first_report.status, LoopStatus::DoneMaxIterations);

        let record = ProgressStore::new(dir.path()).load().unwrap().unwrap();
        let mut second = build(&dir, graph(&["a", "b", "c"]), executor.clone(), |c| c);
        assert_eq!(second.resume_from(&record), 1);
        assert_eq!(second.run_id(), first_report.run_id);

        let report = second.run().await.unwrap();
        assert_eq!(report.status, LoopStatus::DoneAllComplete);
        assert_eq!(report.iterations_run, 2);
        assert_eq!(report.last_iteration, 3);
        assert_eq!(executor.executed(), vec!["t-a", "t-b", "t-c"]);
    }

    #[tokio::test]
    async fn test_unwritable_store_fails_run() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();

        let mut build = build(&dir, graph(&["a", "b"]), ScriptedExecutor::completing(), |c| c)
            .with_store(ProgressStore::in_dir(blocker.join("meta")));

        let err = build.run().await.unwrap_err();
        assert!(matches!(err, ForemanError::Persistence { .. }));
        assert_eq!(build.status(), LoopStatus::Failed);
    }

    #[tokio::test]
    async fn test_plan_and_architecture_are_copied() {
        let dir = TempDir::new().unwrap();
        let arch = serde_json::json!({"style": "layered"});
        let mut build = build(&dir, graph(&["a"]), ScriptedExecutor::completing(), |c| {
            c.with_architecture(arch.clone())
        });
        build.run().await.unwrap();

        let store = ProgressStore::new(dir.path());
        assert_eq!(store.load_architecture().unwrap(), Some(arch));
        assert_eq!(store.load_plan().unwrap().unwrap().tasks.len(), 1);
    }

    #[test]
    fn test_collaborators_require_executor() {
        let err = Collaborators::from_settings(&CollaboratorSettings::default()).unwrap_err();
        assert!(matches!(err, ForemanError::MissingCollaborator { ref role, .. } if role == "executor"));
        assert_eq!(err.exit_code(), 7);
    }

    #[test]
    fn test_collaborators_from_settings() {
        let settings = CollaboratorSettings {
            executor: Some(vec!["gen".into()]),
            repairer: Some(vec!["fix".into()]),
            ..CollaboratorSettings::default()
        };
        let collaborators = Collaborators::from_settings(&settings).unwrap();
        assert!(collaborators.repairer.is_some());

        let empty_repairer = CollaboratorSettings {
            repairer: Some(vec![]),
            ..settings
        };
        assert!(matches!(
            Collaborators::from_settings(&empty_repairer).unwrap_err(),
            ForemanError::InvalidConfig { .. }
        ));
    }

    #[test]
    fn test_loop_settings_apply() {
        let settings = LoopSettings {
            max_iterations: 3,
            auto_test: false,
            auto_fix: false,
        };
        let config = BuildLoopConfig::new(".").with_settings(&settings);
        assert_eq!(config.max_iterations, 3);
        assert!(!config.auto_test);
        assert!(!config.auto_fix);
    }
}
