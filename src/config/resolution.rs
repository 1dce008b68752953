//! Layered configuration loading.
//!
//! Each existing file is parsed as a TOML table and deep-merged over the
//! layers below it. Tables merge key by key; every other value, arrays
//! included, is replaced by the higher layer.
//!
//! # Example
//!
//! ```rust,ignore
//! use foreman::config::ConfigLoader;
//! use std::path::Path;
//!
//! let (config, chain) = ConfigLoader::new().load_with_chain(Path::new("."))?;
//! println!("{}", chain.describe());
//! ```

use std::path::{Path, PathBuf};
use tracing::debug;

use super::ForemanConfig;
use crate::error::{ForemanError, Result};

/// Layer a configuration file belongs to. Later layers win.
///
/// # Example
///
/// ```rust
/// use foreman::config::ConfigLevel;
///
/// assert!(ConfigLevel::User < ConfigLevel::Project);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConfigLevel {
    /// `<config_dir>/foreman/config.toml`
    User,
    /// `<project>/.foreman/foreman.toml`
    Project,
}

impl std::fmt::Display for ConfigLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Project => write!(f, "project"),
        }
    }
}

/// A file considered while loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigSource {
    pub level: ConfigLevel,
    pub path: PathBuf,
    /// False when the file does not exist.
    pub loaded: bool,
}

/// The files considered while loading, lowest precedence first.
#[derive(Debug, Clone, Default)]
pub struct InheritanceChain {
    pub sources: Vec<ConfigSource>,
}

impl InheritanceChain {
    pub fn add_source(&mut self, level: ConfigLevel, path: PathBuf, loaded: bool) {
        self.sources.push(ConfigSource {
            level,
            path,
            loaded,
        });
    }

    #[must_use]
    pub fn loaded_count(&self) -> usize {
        self.sources.iter().filter(|s| s.loaded).count()
    }

    /// One line per source, `+` for loaded and `-` for missing.
    #[must_use]
    pub fn describe(&self) -> String {
        let mut lines = vec!["Configuration layers:".to_string()];
        lines.push("  + [defaults] built-in".to_string());
        for source in &self.sources {
            let status = if source.loaded { "+" } else { "-" };
            lines.push(format!(
                "  {} [{}] {}",
                status,
                source.level,
                source.path.display()
            ));
        }
        lines.join("\n")
    }
}

/// Loads [`ForemanConfig`] from the user and project layers.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    user_config_path: Option<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Loader using the platform user configuration directory.
    #[must_use]
    pub fn new() -> Self {
        Self {
            user_config_path: ForemanConfig::user_path(),
        }
    }

    /// Use a specific user configuration file.
    #[must_use]
    pub fn with_user_config_path(mut self, path: PathBuf) -> Self {
        self.user_config_path = Some(path);
        self
    }

    /// Skip the user layer.
    #[must_use]
    pub fn without_user_config(mut self) -> Self {
        self.user_config_path = None;
        self
    }

    #[must_use]
    pub fn user_config_path(&self) -> Option<&PathBuf> {
        self.user_config_path.as_ref()
    }

    /// # Errors
    ///
    /// Returns [`ForemanError::Config`] if an existing file cannot be parsed.
    pub fn load(&self, project_dir: &Path) -> Result<ForemanConfig> {
        let (config, chain) = self.load_with_chain(project_dir)?;
        debug!("{}", chain.describe());
        Ok(config)
    }

    /// Load and report which files contributed.
    ///
    /// # Errors
    ///
    /// Returns [`ForemanError::Config`] if an existing file cannot be parsed
    /// or the merged result has the wrong shape.
    pub fn load_with_chain(&self, project_dir: &Path) -> Result<(ForemanConfig, InheritanceChain)> {
        let mut chain = InheritanceChain::default();
        let mut merged = toml::Table::new();

        if let Some(ref user_path) = self.user_config_path {
            let loaded = load_and_merge(&mut merged, user_path)?;
            chain.add_source(ConfigLevel::User, user_path.clone(), loaded);
        }

        let project_path = ForemanConfig::project_path(project_dir);
        let loaded = load_and_merge(&mut merged, &project_path)?;
        chain.add_source(ConfigLevel::Project, project_path, loaded);

        let config: ForemanConfig = toml::Value::Table(merged)
            .try_into()
            .map_err(|e| ForemanError::config(format!("invalid merged configuration: {e}")))?;

        Ok((config, chain))
    }
}

fn load_and_merge(accumulated: &mut toml::Table, path: &Path) -> Result<bool> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => {
            return Err(ForemanError::config_with_path(
                format!("failed to read {}: {e}", path.display()),
                path.to_path_buf(),
            ))
        }
    };
    let table: toml::Table = toml::from_str(&content).map_err(|e| {
        ForemanError::config_with_path(
            format!("failed to parse {}: {e}", path.display()),
            path.to_path_buf(),
        )
    })?;
    deep_merge(accumulated, table);
    Ok(true)
}

fn deep_merge(parent: &mut toml::Table, child: toml::Table) {
    for (key, child_value) in child {
        match (parent.get_mut(&key), child_value) {
            (Some(toml::Value::Table(parent_table)), toml::Value::Table(child_table)) => {
                deep_merge(parent_table, child_table);
            }
            (_, child_value) => {
                parent.insert(key, child_value);
            }
        }
    }
}
