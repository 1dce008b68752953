//! Custom error types for Foreman.
//!
//! The taxonomy follows the failure classes of the build loop: planning
//! defects are rejected at ingestion (or tolerated by the scheduler),
//! collaborator failures are classified by which collaborator failed, and
//! persistence failures are always surfaced because resumability depends
//! on them.

use std::path::PathBuf;
use thiserror::Error;

/// Kind of entity looked up in a task graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Task,
    Component,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityKind::Task => write!(f, "task"),
            EntityKind::Component => write!(f, "component"),
        }
    }
}

/// Main error type for Foreman operations
#[derive(Error, Debug)]
pub enum ForemanError {
    // =========================================================================
    // Plan Errors
    // =========================================================================
    /// The plan could not be ingested.
    #[error("Invalid plan: {reason}")]
    InvalidPlan { reason: String },

    /// A task or component id is absent from the graph.
    #[error("Unknown {kind} '{id}'")]
    NotFound { kind: EntityKind, id: String },

    // =========================================================================
    // Collaborator Errors
    // =========================================================================
    /// The execution collaborator failed. Always fatal to the run.
    #[error("Execution of task '{task_id}' failed: {source}")]
    Execution {
        task_id: String,
        #[source]
        source: anyhow::Error,
    },

    /// The test collaborator raised instead of reporting a result.
    #[error("Test run failed to complete: {source}")]
    TestRun {
        #[source]
        source: anyhow::Error,
    },

    /// The repair collaborator raised. Logged by the loop, never fatal.
    #[error("Repair attempt failed: {source}")]
    Repair {
        #[source]
        source: anyhow::Error,
    },

    /// A collaborator process produced output that could not be understood.
    #[error("Collaborator '{name}' returned a malformed result: {reason}")]
    MalformedResult { name: String, reason: String },

    // =========================================================================
    // Persistence Errors
    // =========================================================================
    /// Writing or reading the progress record failed.
    #[error("Progress store error at {path}: {message}")]
    Persistence { path: PathBuf, message: String },

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Failed to load configuration
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        path: Option<PathBuf>,
    },

    /// Invalid configuration value
    #[error("Invalid configuration: {field} - {reason}")]
    InvalidConfig { field: String, reason: String },

    /// Missing required collaborator
    #[error("No {role} configured: {hint}")]
    MissingCollaborator { role: String, hint: String },

    // =========================================================================
    // Wrapped Errors
    // =========================================================================
    /// IO error wrapper
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON error wrapper
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Generic error wrapper
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ForemanError {
    // =========================================================================
    // Constructor helpers
    // =========================================================================

    /// Create a plan ingestion error
    pub fn invalid_plan(reason: impl Into<String>) -> Self {
        Self::InvalidPlan {
            reason: reason.into(),
        }
    }

    /// Create a lookup failure for a task id
    pub fn task_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: EntityKind::Task,
            id: id.into(),
        }
    }

    /// Create a lookup failure for a component id
    pub fn component_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: EntityKind::Component,
            id: id.into(),
        }
    }

    /// Create a persistence error
    pub fn persistence(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Persistence {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            path: None,
        }
    }

    /// Create a configuration error with path
    pub fn config_with_path(message: impl Into<String>, path: PathBuf) -> Self {
        Self::Config {
            message: message.into(),
            path: Some(path),
        }
    }

    // =========================================================================
    // Classification helpers
    // =========================================================================

    /// Check if this error aborts a build loop run.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Execution { .. }
                | Self::TestRun { .. }
                | Self::MalformedResult { .. }
                | Self::Persistence { .. }
                | Self::Io(_)
        )
    }

    /// Check if the loop can carry on after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Repair { .. } | Self::NotFound { .. })
    }

    /// Check if this error came from a collaborator.
    pub fn is_collaborator_failure(&self) -> bool {
        matches!(
            self,
            Self::Execution { .. }
                | Self::TestRun { .. }
                | Self::Repair { .. }
                | Self::MalformedResult { .. }
        )
    }

    /// Get error code for exit status
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Execution { .. } | Self::TestRun { .. } | Self::MalformedResult { .. } => 2,
            Self::Persistence { .. } => 3,
            Self::InvalidPlan { .. } | Self::NotFound { .. } => 4,
            Self::Config { .. } | Self::InvalidConfig { .. } | Self::MissingCollaborator { .. } => 7,
            _ => 1,
        }
    }
}

/// Type alias for Foreman results
pub type Result<T> = std::result::Result<T, ForemanError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = ForemanError::task_not_found("t-9");
        assert_eq!(err.to_string(), "Unknown task 't-9'");

        let err = ForemanError::component_not_found("auth");
        assert_eq!(err.to_string(), "Unknown component 'auth'");
    }

    #[test]
    fn test_execution_is_fatal() {
        let err = ForemanError::Execution {
            task_id: "t1".into(),
            source: anyhow::anyhow!("llm unreachable"),
        };
        assert!(err.is_fatal());
        assert!(err.is_collaborator_failure());
        assert!(err.to_string().contains("t1"));
        assert!(err.to_string().contains("llm unreachable"));
    }

    #[test]
    fn test_repair_is_recoverable() {
        let err = ForemanError::Repair {
            source: anyhow::anyhow!("bad json"),
        };
        assert!(err.is_recoverable());
        assert!(!err.is_fatal());
        assert!(err.is_collaborator_failure());
    }

    #[test]
    fn test_persistence_is_fatal_and_carries_path() {
        let err = ForemanError::persistence("/tmp/p/.foreman/progress.json", "disk full");
        assert!(err.is_fatal());
        assert!(!err.is_collaborator_failure());
        assert!(err.to_string().contains("progress.json"));
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(ForemanError::invalid_plan("dup").exit_code(), 4);
        assert_eq!(ForemanError::config("bad").exit_code(), 7);
        assert_eq!(
            ForemanError::TestRun {
                source: anyhow::anyhow!("boom")
            }
            .exit_code(),
            2
        );
    }

    #[test]
    fn test_config_with_path() {
        let path = PathBuf::from("/test/foreman.toml");
        let err = ForemanError::config_with_path("failed to parse", path.clone());
        if let ForemanError::Config {
            message,
            path: opt_path,
        } = err
        {
            assert_eq!(message, "failed to parse");
            assert_eq!(opt_path, Some(path));
        } else {
            panic!("Wrong error variant");
        }
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err: ForemanError = io_err.into();
        assert!(matches!(err, ForemanError::Io(_)));
        assert!(err.to_string().contains("access denied"));
    }
}
