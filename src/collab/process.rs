//! Subprocess-backed collaborators.
//!
//! [`ProcessExecutor`] and [`ProcessRepairer`] speak a small JSON protocol:
//! the request is written to the child's stdin and a single JSON document
//! is read back from its stdout. A non-zero exit, a timeout, or output that
//! does not parse is an error.
//!
//! [`CommandTestRunner`] runs a configured test command, or detects one
//! from the files in the project directory.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command as AsyncCommand;
use tracing::{debug, warn};
use walkdir::WalkDir;

use super::traits::{Repairer, TaskExecutor, TestRunner};
use super::types::{CandidateError, ExecutionOutcome, RepairOutcome, TestReport};
use crate::engine::ArtifactMap;
use crate::error::ForemanError;
use crate::plan::Task;

/// Default timeout for executor and repairer processes.
pub const DEFAULT_COLLABORATOR_TIMEOUT: Duration = Duration::from_secs(600);

/// Default timeout for a test run.
pub const DEFAULT_TEST_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Serialize)]
struct ExecuteRequest<'a> {
    task: &'a Task,
    project_dir: &'a Path,
    artifacts: &'a ArtifactMap,
    architecture: &'a serde_json::Value,
}

#[derive(Serialize)]
struct RepairRequest<'a> {
    project_dir: &'a Path,
    test_result: &'a TestReport,
    errors: &'a [CandidateError],
    artifacts: &'a ArtifactMap,
}

/// Executes tasks by invoking an external command.
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    argv: Vec<String>,
    timeout: Duration,
}

impl ProcessExecutor {
    /// # Errors
    ///
    /// Returns [`ForemanError::InvalidConfig`] if `argv` is empty.
    pub fn new(argv: Vec<String>) -> crate::error::Result<Self> {
        ensure_argv("collaborators.executor", &argv)?;
        Ok(Self {
            argv,
            timeout: DEFAULT_COLLABORATOR_TIMEOUT,
        })
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl TaskExecutor for ProcessExecutor {
    async fn execute(
        &self,
        task: &Task,
        project_dir: &Path,
        artifacts: &ArtifactMap,
        architecture: &serde_json::Value,
    ) -> Result<ExecutionOutcome> {
        let request = ExecuteRequest {
            task,
            project_dir,
            artifacts,
            architecture,
        };
        exchange_json("executor", &self.argv, project_dir, &request, self.timeout).await
    }
}

/// Proposes fixes by invoking an external command.
#[derive(Debug, Clone)]
pub struct ProcessRepairer {
    argv: Vec<String>,
    timeout: Duration,
}

impl ProcessRepairer {
    /// # Errors
    ///
    /// Returns [`ForemanError::InvalidConfig`] if `argv` is empty.
    pub fn new(argv: Vec<String>) -> crate::error::Result<Self> {
        ensure_argv("collaborators.repairer", &argv)?;
        Ok(Self {
            argv,
            timeout: DEFAULT_COLLABORATOR_TIMEOUT,
        })
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl Repairer for ProcessRepairer {
    async fn debug_and_fix(
        &self,
        project_dir: &Path,
        report: &TestReport,
        errors: &[CandidateError],
        artifacts: &ArtifactMap,
    ) -> Result<RepairOutcome> {
        let request = RepairRequest {
            project_dir,
            test_result: report,
            errors,
            artifacts,
        };
        exchange_json("repairer", &self.argv, project_dir, &request, self.timeout).await
    }
}

fn ensure_argv(field: &str, argv: &[String]) -> crate::error::Result<()> {
    if argv.first().map_or(true, |p| p.trim().is_empty()) {
        return Err(ForemanError::InvalidConfig {
            field: field.to_string(),
            reason: "command must not be empty".to_string(),
        });
    }
    Ok(())
}

/// Write `request` to the child's stdin and parse its stdout as `T`.
async fn exchange_json<Req, T>(
    name: &str,
    argv: &[String],
    project_dir: &Path,
    request: &Req,
    timeout: Duration,
) -> Result<T>
where
    Req: Serialize + ?Sized,
    T: DeserializeOwned,
{
    let (program, args) = argv
        .split_first()
        .with_context(|| format!("{name} command is empty"))?;
    let payload = serde_json::to_vec(request).context("Failed to encode request")?;

    debug!(collaborator = name, program = %program, "spawning collaborator");

    let mut child = AsyncCommand::new(program)
        .args(args)
        .current_dir(project_dir)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("Failed to spawn {name} '{program}'"))?;

    // Feed stdin from a separate task so a child that writes before it has
    // read everything cannot deadlock against us.
    let writer = child.stdin.take().map(|mut stdin| {
        tokio::spawn(async move {
            stdin.write_all(&payload).await?;
            stdin.flush().await?;
            drop(stdin);
            Ok::<_, std::io::Error>(())
        })
    });

    let output = tokio::time::timeout(timeout, child.wait_with_output())
        .await
        .map_err(|_| anyhow::anyhow!("{name} timed out after {}s", timeout.as_secs()))?
        .with_context(|| format!("Failed to wait for {name}"))?;

    if let Some(writer) = writer {
        match writer.await {
            Ok(Err(e)) if e.kind() != std::io::ErrorKind::BrokenPipe => {
                warn!(collaborator = name, "failed to write request: {}", e);
            }
            Err(e) => warn!(collaborator = name, "request writer panicked: {}", e),
            _ => {}
        }
    }

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!(
            "{name} exited with {}: {}",
            output.status.code().map_or("signal".to_string(), |c| c.to_string()),
            stderr.trim()
        );
    }

    serde_json::from_slice(&output.stdout).map_err(|e| {
        ForemanError::MalformedResult {
            name: name.to_string(),
            reason: e.to_string(),
        }
        .into()
    })
}

/// A test framework detected from project files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestFramework {
    Pytest,
    Npm,
    Cargo,
}

impl TestFramework {
    /// Detect the framework a project uses, if any.
    ///
    /// Python projects need `pytest.ini` or `pyproject.toml` plus pytest in
    /// `requirements.txt`. Node projects need jest or mocha in
    /// `devDependencies`. Rust projects need `Cargo.toml`.
    #[must_use]
    pub fn detect(project_dir: &Path) -> Option<Self> {
        let has = |name: &str| project_dir.join(name).exists();

        if (has("pytest.ini") || has("pyproject.toml"))
            && file_contains(&project_dir.join("requirements.txt"), "pytest")
        {
            return Some(Self::Pytest);
        }

        if has("package.json") && package_has_test_dependency(&project_dir.join("package.json")) {
            return Some(Self::Npm);
        }

        if has("Cargo.toml") {
            return Some(Self::Cargo);
        }

        None
    }

    /// Base command line for this framework.
    #[must_use]
    pub fn command(self) -> Vec<String> {
        let argv: &[&str] = match self {
            Self::Pytest => &["python", "-m", "pytest", "-v", "--tb=short"],
            Self::Npm => &["npm", "test"],
            Self::Cargo => &["cargo", "test"],
        };
        argv.iter().map(|s| (*s).to_string()).collect()
    }
}

impl std::fmt::Display for TestFramework {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pytest => write!(f, "pytest"),
            Self::Npm => write!(f, "npm"),
            Self::Cargo => write!(f, "cargo"),
        }
    }
}

fn file_contains(path: &Path, needle: &str) -> bool {
    std::fs::read_to_string(path)
        .map(|c| c.contains(needle))
        .unwrap_or(false)
}

fn package_has_test_dependency(path: &Path) -> bool {
    let Ok(content) = std::fs::read_to_string(path) else {
        return false;
    };
    let Ok(json) = serde_json::from_str::<serde_json::Value>(&content) else {
        return false;
    };
    json.get("devDependencies")
        .and_then(|d| d.as_object())
        .is_some_and(|deps| deps.contains_key("jest") || deps.contains_key("mocha"))
}

/// Find a pytest file under `tests/` whose name mentions the component.
fn pytest_file_for(project_dir: &Path, task: &Task) -> Option<PathBuf> {
    let tests_dir = project_dir.join("tests");
    if !tests_dir.is_dir() || task.component_id.is_empty() {
        return None;
    }
    let component = task.component_id.to_lowercase();
    WalkDir::new(&tests_dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .find(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .map(str::to_lowercase)
                .is_some_and(|name| {
                    name.starts_with("test_") && name.ends_with(".py") && name.contains(&component)
                })
        })
}

/// Runs a project's test suite as a subprocess.
#[derive(Debug, Clone)]
pub struct CommandTestRunner {
    command: Option<Vec<String>>,
    timeout: Duration,
}

impl Default for CommandTestRunner {
    fn default() -> Self {
        Self::auto_detect()
    }
}

impl CommandTestRunner {
    /// Detect the test command from the project on every run.
    #[must_use]
    pub fn auto_detect() -> Self {
        Self {
            command: None,
            timeout: DEFAULT_TEST_TIMEOUT,
        }
    }

    /// Always run `argv`.
    ///
    /// # Errors
    ///
    /// Returns [`ForemanError::InvalidConfig`] if `argv` is empty.
    pub fn with_command(argv: Vec<String>) -> crate::error::Result<Self> {
        ensure_argv("collaborators.test_command", &argv)?;
        Ok(Self {
            command: Some(argv),
            timeout: DEFAULT_TEST_TIMEOUT,
        })
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn resolve(&self, project_dir: &Path, task: Option<&Task>) -> Option<Vec<String>> {
        if let Some(ref argv) = self.command {
            return Some(argv.clone());
        }
        let framework = TestFramework::detect(project_dir)?;
        let mut argv = framework.command();
        if which::which(&argv[0]).is_err() {
            warn!("{} detected but '{}' is not on PATH", framework, argv[0]);
            return None;
        }
        if let (TestFramework::Pytest, Some(task)) = (framework, task) {
            if let Some(file) = pytest_file_for(project_dir, task) {
                argv.push(file.display().to_string());
            }
        }
        Some(argv)
    }
}

#[async_trait]
impl TestRunner for CommandTestRunner {
    async fn run_tests(&self, project_dir: &Path, task: Option<&Task>) -> Result<TestReport> {
        let Some(argv) = self.resolve(project_dir, task) else {
            warn!("No test framework detected, skipping tests");
            return Ok(TestReport::skipped("No test framework detected"));
        };
        let (program, args) = argv
            .split_first()
            .context("test command is empty")?;

        debug!(command = %argv.join(" "), "running tests");

        let child = AsyncCommand::new(program)
            .args(args)
            .current_dir(project_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to spawn test command '{program}'"))?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.context("Failed to wait for test command")?,
            Err(_) => {
                warn!("Tests timed out after {}s", self.timeout.as_secs());
                return Ok(TestReport::fail(format!(
                    "Tests timed out after {}s",
                    self.timeout.as_secs()
                )));
            }
        };

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        Ok(if output.status.success() {
            TestReport::pass(combined)
        } else {
            TestReport::fail(combined)
        })
    }
}
