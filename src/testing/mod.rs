//! Testing infrastructure for Foreman.
//!
//! Scripted collaborators and assertions for driving the build loop
//! without subprocesses or models.
//!
//! - **Mocks**: [`ScriptedExecutor`], [`MockTestRunner`], [`MockRepairer`]
//! - **Assertions**: run status, dispatch order, tracker and artifact checks
//!
//! # Example
//!
//! ```rust,ignore
//! use foreman::testing::{MockRepairer, MockTestRunner, ScriptedExecutor};
//!
//! let executor = ScriptedExecutor::completing()
//!     .failing_on("t3", "model unavailable");
//! let tester = MockTestRunner::failing("FAILED test_login");
//! let repairer = MockRepairer::new();
//! ```

pub mod assertions;
pub mod mocks;

pub use assertions::*;
pub use mocks::*;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::{
        ExecutionOutcome, ProposedFix, RepairOutcome, Repairer, TaskExecutor, TestReport,
        TestRunner,
    };
    use crate::engine::ArtifactMap;
    use crate::plan::Task;
    use std::path::Path;

    async fn execute(executor: &ScriptedExecutor, id: &str) -> anyhow::Result<ExecutionOutcome> {
        executor
            .execute(
                &Task::new(id, "c", ""),
                Path::new("."),
                &ArtifactMap::new(),
                &serde_json::Value::Null,
            )
            .await
    }

    // =========================================================================
    // ScriptedExecutor
    // =========================================================================

    #[tokio::test]
    async fn test_scripted_executor_default_and_overrides() {
        let executor = ScriptedExecutor::completing()
            .with_outcome("t2", ExecutionOutcome::incomplete().with_file("x", "y"))
            .failing_on("t3", "boom");

        assert!(execute(&executor, "t1").await.unwrap().completed);
        let t2 = execute(&executor, "t2").await.unwrap();
        assert!(!t2.completed);
        assert_eq!(t2.files["x"], "y");
        assert!(execute(&executor, "t3").await.is_err());

        assert_eq!(executor.call_count(), 3);
        assert_eq!(executor.executed(), vec!["t1", "t2", "t3"]);
    }

    #[tokio::test]
    async fn test_clones_share_call_log() {
        let executor = ScriptedExecutor::never_completing();
        let clone = executor.clone();
        execute(&clone, "t1").await.unwrap();
        assert_eq!(executor.call_count(), 1);
    }

    // =========================================================================
    // MockTestRunner
    // =========================================================================

    #[tokio::test]
    async fn test_runner_queue_then_fixed() {
        let runner = MockTestRunner::passing().then_reports([TestReport::fail("FAILED a")]);
        let first = runner.run_tests(Path::new("."), None).await.unwrap();
        let second = runner.run_tests(Path::new("."), None).await.unwrap();
        assert!(!first.passed);
        assert!(second.passed);
        assert_eq!(runner.call_count(), 2);
    }

    #[tokio::test]
    async fn test_runner_error() {
        let runner = MockTestRunner::passing().with_error("no interpreter");
        assert!(runner.run_tests(Path::new("."), None).await.is_err());
    }

    // =========================================================================
    // MockRepairer
    // =========================================================================

    #[tokio::test]
    async fn test_repairer_records_candidates() {
        let repairer = MockRepairer::new()
            .with_outcome(RepairOutcome::no_fix("").with_fix(ProposedFix::new(0.7)));
        let errors = crate::engine::repair::extract_candidate_errors("FAILED one\nERROR two");

        let outcome = repairer
            .debug_and_fix(
                Path::new("."),
                &TestReport::fail(""),
                &errors,
                &ArtifactMap::new(),
            )
            .await
            .unwrap();

        assert_eq!(outcome.fixes.len(), 1);
        assert_eq!(repairer.seen_errors(), vec![errors]);
    }
}
