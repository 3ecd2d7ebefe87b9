//! Configuration loading and validation
//!
//! Layers, lowest precedence first:
//! 1. Built-in defaults
//! 2. User config (`~/.config/autosync/config.toml`)
//! 3. Repository config (`<root>/.autosync.toml`, or `--config <file>`)
//! 4. Command-line flags

use anyhow::{Context, Result};
use git::sync::{DEFAULT_MESSAGE_TEMPLATE, TIMESTAMP_PLACEHOLDER};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use watcher::IgnoreConfig;

/// Repository config file name, looked up in the watched root
pub const REPO_CONFIG_FILE: &str = ".autosync.toml";

pub const DEFAULT_REMOTE: &str = "origin";
pub const DEFAULT_BRANCH: &str = "main";
pub const DEFAULT_DEBOUNCE_SECS: f64 = 2.0;

const MIN_DEBOUNCE_SECS: f64 = 0.05;
const MAX_DEBOUNCE_SECS: f64 = 3600.0;

/// Settings for one watcher process, fixed at startup
#[derive(Debug, Clone, PartialEq)]
pub struct WatchConfig {
    /// Directory to watch and stage
    pub root: PathBuf,
    pub remote: String,
    /// Branch to push; `None` means "whatever is checked out"
    pub branch: Option<String>,
    /// User ignore patterns
    pub ignore: Vec<String>,
    pub debounce: Duration,
    pub push: bool,
    pub message_template: String,
    pub use_gitignore: bool,
    /// Our own log file; never a reason to sync
    pub log_file: Option<PathBuf>,
}

impl WatchConfig {
    /// Validate all values are in their allowed ranges
    pub fn validate(&self) -> Result<()> {
        let secs = self.debounce.as_secs_f64();
        if !(MIN_DEBOUNCE_SECS..=MAX_DEBOUNCE_SECS).contains(&secs) {
            anyhow::bail!(
                "debounce must be between {} and {} seconds, got {}",
                MIN_DEBOUNCE_SECS,
                MAX_DEBOUNCE_SECS,
                secs
            );
        }
        if self.remote.trim().is_empty() {
            anyhow::bail!("remote name must not be empty");
        }
        if let Some(ref branch) = self.branch {
            if branch.trim().is_empty() {
                anyhow::bail!("branch name must not be empty");
            }
        }
        if !self.message_template.contains(TIMESTAMP_PLACEHOLDER) {
            anyhow::bail!(
                "commit message template must contain {}: {:?}",
                TIMESTAMP_PLACEHOLDER,
                self.message_template
            );
        }
        Ok(())
    }

    pub fn ignore_config(&self) -> IgnoreConfig {
        IgnoreConfig {
            use_gitignore: self.use_gitignore,
            patterns: self.ignore.clone(),
            exclude: self.log_file.iter().cloned().collect(),
        }
    }
}

/// One config file layer; every key is optional
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub remote: Option<String>,
    pub branch: Option<String>,
    #[serde(default)]
    pub ignore: Vec<String>,
    pub debounce_secs: Option<f64>,
    pub push: Option<bool>,
    pub message: Option<String>,
    pub use_gitignore: Option<bool>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&text)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Layer `upper` over `self`; ignore patterns accumulate
    pub fn merge(mut self, upper: FileConfig) -> Self {
        self.ignore.extend(upper.ignore);
        Self {
            remote: upper.remote.or(self.remote),
            branch: upper.branch.or(self.branch),
            ignore: self.ignore,
            debounce_secs: upper.debounce_secs.or(self.debounce_secs),
            push: upper.push.or(self.push),
            message: upper.message.or(self.message),
            use_gitignore: upper.use_gitignore.or(self.use_gitignore),
        }
    }
}

/// Values supplied on the command line
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub path: Option<PathBuf>,
    pub remote: Option<String>,
    pub branch: Option<String>,
    pub ignore: Vec<String>,
    pub debounce_secs: Option<f64>,
    pub no_push: bool,
    pub message: Option<String>,
    pub no_gitignore: bool,
    /// Explicit config file, replaces the repository config lookup
    pub config_file: Option<PathBuf>,
    pub log_file: Option<PathBuf>,
}

/// Default user config location
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("autosync").join("config.toml"))
}

/// Build the final configuration from every layer
///
/// `user_config` is passed in so tests can avoid the real home directory.
pub fn resolve(overrides: Overrides, user_config: Option<&Path>) -> Result<WatchConfig> {
    let root = overrides.path.clone().unwrap_or_else(|| PathBuf::from("."));

    let mut file = FileConfig::default();

    if let Some(path) = user_config.filter(|p| p.is_file()) {
        tracing::debug!("Loading user config {}", path.display());
        file = file.merge(FileConfig::load(path)?);
    }

    match overrides.config_file {
        Some(ref path) => {
            file = file.merge(FileConfig::load(path)?);
        }
        None => {
            let repo_config = root.join(REPO_CONFIG_FILE);
            if repo_config.is_file() {
                tracing::debug!("Loading repository config {}", repo_config.display());
                file = file.merge(FileConfig::load(&repo_config)?);
            }
        }
    }

    let debounce_secs = overrides
        .debounce_secs
        .or(file.debounce_secs)
        .unwrap_or(DEFAULT_DEBOUNCE_SECS);
    // Checked before conversion: Duration::from_secs_f64 panics on NaN or overflow
    if !(MIN_DEBOUNCE_SECS..=MAX_DEBOUNCE_SECS).contains(&debounce_secs) {
        anyhow::bail!(
            "debounce must be between {} and {} seconds, got {}",
            MIN_DEBOUNCE_SECS,
            MAX_DEBOUNCE_SECS,
            debounce_secs
        );
    }

    let mut ignore = file.ignore;
    ignore.extend(overrides.ignore);

    let config = WatchConfig {
        root,
        remote: overrides
            .remote
            .or(file.remote)
            .unwrap_or_else(|| DEFAULT_REMOTE.to_string()),
        branch: overrides.branch.or(file.branch),
        ignore,
        debounce: Duration::from_secs_f64(debounce_secs),
        push: !overrides.no_push && file.push.unwrap_or(true),
        message_template: overrides
            .message
            .or(file.message)
            .unwrap_or_else(|| DEFAULT_MESSAGE_TEMPLATE.to_string()),
        use_gitignore: !overrides.no_gitignore && file.use_gitignore.unwrap_or(true),
        log_file: overrides.log_file,
    };

    config.validate().context("Invalid configuration")?;
    Ok(config)
}
