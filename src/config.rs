//! Foreman configuration.
//!
//! Settings live in TOML files layered from lowest to highest precedence:
//!
//! 1. Built-in defaults
//! 2. User file: `<config_dir>/foreman/config.toml`
//! 3. Project file: `<project>/.foreman/foreman.toml`
//! 4. Command-line flags (applied by the caller)
//!
//! ```toml
//! [loop]
//! max_iterations = 200
//! auto_test = true
//! auto_fix = false
//!
//! [collaborators]
//! executor = ["python", "-m", "codegen.execute"]
//! repairer = ["python", "-m", "codegen.repair"]
//! test_command = ["pytest", "-q"]
//! test_timeout_secs = 300
//! collaborator_timeout_secs = 600
//! ```

pub mod resolution;

pub use resolution::{ConfigLevel, ConfigLoader, ConfigSource, InheritanceChain};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::engine::manager::DEFAULT_MAX_ITERATIONS;
use crate::progress::METADATA_DIR;

/// Project configuration file name inside the metadata directory.
pub const PROJECT_CONFIG_FILE: &str = "foreman.toml";

fn default_true() -> bool {
    true
}

fn default_max_iterations() -> u32 {
    DEFAULT_MAX_ITERATIONS
}

fn default_test_timeout() -> u64 {
    300
}

fn default_collaborator_timeout() -> u64 {
    600
}

/// `[loop]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopSettings {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    #[serde(default = "default_true")]
    pub auto_test: bool,
    #[serde(default = "default_true")]
    pub auto_fix: bool,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            auto_test: true,
            auto_fix: true,
        }
    }
}

/// `[collaborators]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollaboratorSettings {
    /// Command producing files for a task.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executor: Option<Vec<String>>,
    /// Command proposing fixes for failing tests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repairer: Option<Vec<String>>,
    /// Test command. Detected from the project when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_command: Option<Vec<String>>,
    #[serde(default = "default_test_timeout")]
    pub test_timeout_secs: u64,
    #[serde(default = "default_collaborator_timeout")]
    pub collaborator_timeout_secs: u64,
}

impl Default for CollaboratorSettings {
    fn default() -> Self {
        Self {
            executor: None,
            repairer: None,
            test_command: None,
            test_timeout_secs: default_test_timeout(),
            collaborator_timeout_secs: default_collaborator_timeout(),
        }
    }
}

impl CollaboratorSettings {
    #[must_use]
    pub fn test_timeout(&self) -> Duration {
        Duration::from_secs(self.test_timeout_secs)
    }

    #[must_use]
    pub fn collaborator_timeout(&self) -> Duration {
        Duration::from_secs(self.collaborator_timeout_secs)
    }
}

/// Resolved configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForemanConfig {
    #[serde(default, rename = "loop")]
    pub loop_settings: LoopSettings,
    #[serde(default)]
    pub collaborators: CollaboratorSettings,
}

impl ForemanConfig {
    /// Path of the project-level configuration file.
    #[must_use]
    pub fn project_path(project_dir: &Path) -> PathBuf {
        project_dir.join(METADATA_DIR).join(PROJECT_CONFIG_FILE)
    }

    /// Default path of the user-level configuration file.
    #[must_use]
    pub fn user_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("foreman").join("config.toml"))
    }

    /// Load with the default user path and the project's file.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ForemanError::Config`] if a file exists but cannot
    /// be parsed.
    pub fn load(project_dir: &Path) -> crate::Result<Self> {
        ConfigLoader::new().load(project_dir)
    }

    /// Parse a single TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ForemanError::Config`] on invalid TOML or types.
    pub fn parse(content: &str) -> crate::Result<Self> {
        toml::from_str(content)
            .map_err(|e| crate::ForemanError::config(format!("failed to parse config: {e}")))
    }

    /// Render as TOML.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ForemanError::Config`] if serialization fails.
    pub fn to_toml(&self) -> crate::Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| crate::ForemanError::config(format!("failed to render config: {e}")))
    }

    /// Check values that parse but cannot work.
    ///
    /// Returns one message per problem; empty means valid.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        let c = &self.collaborators;

        for (field, argv) in [
            ("collaborators.executor", &c.executor),
            ("collaborators.repairer", &c.repairer),
            ("collaborators.test_command", &c.test_command),
        ] {
            if let Some(argv) = argv {
                if argv.first().map_or(true, |p| p.trim().is_empty()) {
                    problems.push(format!("{field}: command must not be empty"));
                }
            }
        }
        if c.test_timeout_secs == 0 {
            problems.push("collaborators.test_timeout_secs: must be greater than 0".to_string());
        }
        if c.collaborator_timeout_secs == 0 {
            problems.push(
                "collaborators.collaborator_timeout_secs: must be greater than 0".to_string(),
            );
        }
        problems
    }

    /// Fail on the first validation problem.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ForemanError::InvalidConfig`] describing the problem.
    pub fn ensure_valid(&self) -> crate::Result<()> {
        match self.validate().into_iter().next() {
            None => Ok(()),
            Some(problem) => {
                let (field, reason) = problem
                    .split_once(": ")
                    .map(|(f, r)| (f.to_string(), r.to_string()))
                    .unwrap_or_else(|| ("config".to_string(), problem.clone()));
                Err(crate::ForemanError::InvalidConfig { field, reason })
            }
        }
    }
}
