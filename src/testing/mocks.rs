//! Scripted collaborator doubles.
//!
//! Clones share their call log and counters, so a test can keep one handle
//! and give another to the build loop.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use crate::collab::{
    CandidateError, ExecutionOutcome, RepairOutcome, Repairer, TaskExecutor, TestReport,
    TestRunner,
};
use crate::engine::ArtifactMap;
use crate::plan::Task;

/// Executor that returns a scripted outcome per task id.
///
/// Tasks without a script get the default outcome.
///
/// # Example
///
/// ```rust,ignore
/// let executor = ScriptedExecutor::completing()
///     .with_outcome("t2", ExecutionOutcome::incomplete())
///     .failing_on("t3", "model unavailable");
/// ```
#[derive(Debug, Clone)]
pub struct ScriptedExecutor {
    default: ExecutionOutcome,
    outcomes: HashMap<String, ExecutionOutcome>,
    failures: HashMap<String, String>,
    executed: Arc<Mutex<Vec<String>>>,
    call_count: Arc<AtomicU32>,
}

impl ScriptedExecutor {
    /// Every task completes without producing files.
    #[must_use]
    pub fn completing() -> Self {
        Self::with_default(ExecutionOutcome::completed())
    }

    /// No task ever completes.
    #[must_use]
    pub fn never_completing() -> Self {
        Self::with_default(ExecutionOutcome::incomplete())
    }

    #[must_use]
    pub fn with_default(default: ExecutionOutcome) -> Self {
        Self {
            default,
            outcomes: HashMap::new(),
            failures: HashMap::new(),
            executed: Arc::new(Mutex::new(Vec::new())),
            call_count: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Script the outcome for one task.
    #[must_use]
    pub fn with_outcome(mut self, task_id: &str, outcome: ExecutionOutcome) -> Self {
        self.outcomes.insert(task_id.to_string(), outcome);
        self
    }

    /// Make execution of one task fail.
    #[must_use]
    pub fn failing_on(mut self, task_id: &str, error: &str) -> Self {
        self.failures.insert(task_id.to_string(), error.to_string());
        self
    }

    /// Number of `execute` calls.
    #[must_use]
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Task ids in dispatch order.
    #[must_use]
    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl TaskExecutor for ScriptedExecutor {
    async fn execute(
        &self,
        task: &Task,
        _project_dir: &Path,
        _artifacts: &ArtifactMap,
        _architecture: &serde_json::Value,
    ) -> Result<ExecutionOutcome> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut executed) = self.executed.lock() {
            executed.push(task.id.clone());
        }

        if let Some(error) = self.failures.get(&task.id) {
            bail!("{}", error);
        }
        Ok(self
            .outcomes
            .get(&task.id)
            .cloned()
            .unwrap_or_else(|| self.default.clone()))
    }
}

/// Test runner returning queued reports, then a fixed one.
#[derive(Debug, Clone)]
pub struct MockTestRunner {
    report: TestReport,
    queued: Arc<Mutex<VecDeque<TestReport>>>,
    error: Option<String>,
    call_count: Arc<AtomicU32>,
}

impl MockTestRunner {
    #[must_use]
    pub fn passing() -> Self {
        Self::with_report(TestReport::pass("all tests passed"))
    }

    #[must_use]
    pub fn failing(output: &str) -> Self {
        Self::with_report(TestReport::fail(output))
    }

    #[must_use]
    pub fn with_report(report: TestReport) -> Self {
        Self {
            report,
            queued: Arc::new(Mutex::new(VecDeque::new())),
            error: None,
            call_count: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Return `reports` in order before falling back to the fixed report.
    #[must_use]
    pub fn then_reports(self, reports: impl IntoIterator<Item = TestReport>) -> Self {
        if let Ok(mut queued) = self.queued.lock() {
            queued.extend(reports);
        }
        self
    }

    /// Make every run fail to complete.
    #[must_use]
    pub fn with_error(mut self, error: &str) -> Self {
        self.error = Some(error.to_string());
        self
    }

    #[must_use]
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TestRunner for MockTestRunner {
    async fn run_tests(&self, _project_dir: &Path, _task: Option<&Task>) -> Result<TestReport> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        if let Some(ref error) = self.error {
            bail!("{}", error);
        }
        let next = self.queued.lock().ok().and_then(|mut q| q.pop_front());
        Ok(next.unwrap_or_else(|| self.report.clone()))
    }
}

/// Repairer returning a fixed outcome and recording what it was shown.
#[derive(Debug, Clone)]
pub struct MockRepairer {
    outcome: RepairOutcome,
    error: Option<String>,
    seen_errors: Arc<Mutex<Vec<Vec<CandidateError>>>>,
    call_count: Arc<AtomicU32>,
}

impl Default for MockRepairer {
    fn default() -> Self {
        Self {
            outcome: RepairOutcome::no_fix("no fix"),
            error: None,
            seen_errors: Arc::new(Mutex::new(Vec::new())),
            call_count: Arc::new(AtomicU32::new(0)),
        }
    }
}

impl MockRepairer {
    /// A repairer that never proposes anything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_outcome(mut self, outcome: RepairOutcome) -> Self {
        self.outcome = outcome;
        self
    }

    #[must_use]
    pub fn with_error(mut self, error: &str) -> Self {
        self.error = Some(error.to_string());
        self
    }

    #[must_use]
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Candidate errors passed to each call.
    #[must_use]
    pub fn seen_errors(&self) -> Vec<Vec<CandidateError>> {
        self.seen_errors.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Repairer for MockRepairer {
    async fn debug_and_fix(
        &self,
        _project_dir: &Path,
        _report: &TestReport,
        errors: &[CandidateError],
        _artifacts: &ArtifactMap,
    ) -> Result<RepairOutcome> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut seen) = self.seen_errors.lock() {
            seen.push(errors.to_vec());
        }
        if let Some(ref error) = self.error {
            bail!("{}", error);
        }
        Ok(self.outcome.clone())
    }
}
