//! Values exchanged with collaborators.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Result of executing one task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    /// Files produced or rewritten by this execution.
    #[serde(default)]
    pub files: BTreeMap<String, String>,
    /// Whether the task reports itself complete.
    #[serde(default)]
    pub completed: bool,
}

impl ExecutionOutcome {
    /// A completed outcome with no files.
    #[must_use]
    pub fn completed() -> Self {
        Self {
            files: BTreeMap::new(),
            completed: true,
        }
    }

    /// An outcome that leaves the task incomplete.
    #[must_use]
    pub fn incomplete() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_file(mut self, path: impl Into<String>, content: impl Into<String>) -> Self {
        self.files.insert(path.into(), content.into());
        self
    }
}

/// Result of a test run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestReport {
    pub passed: bool,
    #[serde(default)]
    pub output: String,
    /// True when no test framework was found and nothing ran.
    #[serde(default)]
    pub skipped: bool,
}

impl TestReport {
    #[must_use]
    pub fn pass(output: impl Into<String>) -> Self {
        Self {
            passed: true,
            output: output.into(),
            skipped: false,
        }
    }

    #[must_use]
    pub fn fail(output: impl Into<String>) -> Self {
        Self {
            passed: false,
            output: output.into(),
            skipped: false,
        }
    }

    #[must_use]
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            passed: true,
            output: reason.into(),
            skipped: true,
        }
    }
}

/// One error block extracted from test output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateError {
    /// 1-based line in the test output where the block starts.
    pub line: usize,
    pub text: String,
}

/// A file-level fix proposed by the repairer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProposedFix {
    #[serde(default)]
    pub files: BTreeMap<String, String>,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    #[serde(default)]
    pub analysis: String,
}

impl ProposedFix {
    #[must_use]
    pub fn new(confidence: f64) -> Self {
        Self {
            confidence,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_file(mut self, path: impl Into<String>, content: impl Into<String>) -> Self {
        self.files.insert(path.into(), content.into());
        self
    }

    #[must_use]
    pub fn with_analysis(mut self, analysis: impl Into<String>) -> Self {
        self.analysis = analysis.into();
        self
    }
}

/// Result of one repair attempt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepairOutcome {
    /// The repairer's own verdict. Informational; acceptance is decided per fix.
    #[serde(default)]
    pub fixed: bool,
    #[serde(default)]
    pub fixes: Vec<ProposedFix>,
    #[serde(default)]
    pub message: String,
}

impl RepairOutcome {
    /// An outcome proposing nothing.
    #[must_use]
    pub fn no_fix(message: impl Into<String>) -> Self {
        Self {
            fixed: false,
            fixes: Vec::new(),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn with_fix(mut self, fix: ProposedFix) -> Self {
        self.fixed = true;
        self.fixes.push(fix);
        self
    }
}
