//! Collaborators the build loop dispatches work to.
//!
//! The loop never generates code or runs tests itself. It hands each task
//! to a [`TaskExecutor`], checks the result with a [`TestRunner`], and asks
//! a [`Repairer`] for fixes when tests fail. The subprocess implementations
//! in [`process`] let any program that speaks JSON fill those roles.

pub mod process;
pub mod traits;
pub mod types;

pub use process::{
    CommandTestRunner, ProcessExecutor, ProcessRepairer, TestFramework,
    DEFAULT_COLLABORATOR_TIMEOUT, DEFAULT_TEST_TIMEOUT,
};
pub use traits::{Repairer, TaskExecutor, TestRunner};
pub use types::{CandidateError, ExecutionOutcome, ProposedFix, RepairOutcome, TestReport};
