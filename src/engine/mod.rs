//! The build loop.
//!
//! One run advances a single project by repeatedly asking the scheduler for
//! a task, dispatching it to the collaborators, folding the results into
//! the completion tracker and artifact mapping, and persisting a progress
//! record before the next iteration.
//!
//! ```text
//! Running ──► all complete? ───────────────► DoneAllComplete
//!    │        budget spent? ───────────────► DoneMaxIterations
//!    │        stop requested? ─────────────► Interrupted
//!    │        no task? ────────────────────► DoneNoWork
//!    ▼
//! execute ─► merge files ─► test ─► repair (once) ─► mark complete ─► persist
//!    │                        │                                          │
//!    └──── error ─────────────┴──────────────► Failed ◄───── error ──────┘
//! ```

pub mod artifacts;
pub mod manager;
pub mod repair;
pub mod state;

pub use artifacts::ArtifactMap;
pub use manager::{
    BuildLoop, BuildLoopConfig, Collaborators, IterationSummary, RunReport, TestStatus,
};
pub use repair::{RepairVerdict, CONFIDENCE_THRESHOLD, MAX_CANDIDATE_ERRORS};
pub use state::{LoopStatus, StopHandle};
