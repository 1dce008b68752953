//! Foreman - dependency-aware build loop
//!
//! Foreman drives a project from a plan of components and tasks to a
//! finished codebase. Each iteration it picks the next task whose
//! prerequisites are met, hands it to an executor, runs the tests, asks a
//! repairer for fixes when they fail, and persists its progress so an
//! interrupted run can be resumed.
//!
//! # Architecture
//!
//! - [`plan`] - Task graph model and plan ingestion
//! - [`scheduler`] - Next-task selection with a priority fallback
//! - [`tracker`] - Per-component completion state
//! - [`engine`] - The build loop state machine and repair policy
//! - [`progress`] - Crash-safe progress records and status summaries
//! - [`collab`] - Executor, test runner and repairer contracts
//! - [`config`] - Layered `foreman.toml` configuration
//! - [`error`] - Custom error types and handling
//! - [`testing`] - Scripted collaborators and assertions
//!
//! # Example
//!
//! ```rust,ignore
//! use foreman::engine::{BuildLoop, BuildLoopConfig, Collaborators};
//! use foreman::plan::TaskGraph;
//! use foreman::ForemanConfig;
//!
//! let config = ForemanConfig::load(project)?;
//! let graph = TaskGraph::load(&project.join(".foreman/plan.json"))?;
//! let collaborators = Collaborators::from_settings(&config.collaborators)?;
//!
//! let mut build = BuildLoop::new(
//!     graph,
//!     BuildLoopConfig::new(project).with_settings(&config.loop_settings),
//!     collaborators,
//! );
//! let report = build.run().await?;
//! ```

pub mod collab;
pub mod config;
pub mod engine;
pub mod error;
pub mod plan;
pub mod progress;
pub mod scheduler;
pub mod testing;
pub mod tracker;

// Re-export commonly used types
pub use error::{ForemanError, Result};

pub use config::ForemanConfig;

pub use engine::{BuildLoop, BuildLoopConfig, Collaborators, LoopStatus, RunReport, StopHandle};

pub use plan::{Component, Priority, Task, TaskGraph, TaskType};

pub use progress::{ProgressRecord, ProgressStore, ProjectStatus, StatusSummary};

pub use scheduler::{select_next, Selection, SelectionReason};

pub use tracker::CompletionTracker;
