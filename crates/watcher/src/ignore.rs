//! Ignore pattern management for autosync
//!
//! Supports multiple sources of ignore patterns:
//! 1. Built-in patterns (.git/ and editor temp files - always active)
//! 2. .gitignore patterns (optional, enabled by default)
//! 3. User patterns from `--ignore` and config files

use crate::WatchError;
use ::ignore::gitignore::{Gitignore, GitignoreBuilder};
use serde::Deserialize;
use std::path::{Component, Path, PathBuf};

/// Ignore rule manager
///
/// Combines the pattern sources with this precedence:
/// 1. Built-in patterns (highest priority - always enforced)
/// 2. .gitignore patterns
/// 3. User patterns
pub struct IgnoreRules {
    /// Watched root directory (canonical)
    root: PathBuf,

    /// Gitignore patterns (optional)
    gitignore: Option<Gitignore>,

    /// User glob patterns compiled with gitignore syntax
    user_globs: Option<Gitignore>,

    /// User patterns without glob metacharacters, matched as substrings
    user_literals: Vec<String>,

    /// Files autosync itself writes under the root (e.g. its log file)
    excluded: Vec<PathBuf>,

    /// Configuration
    config: IgnoreConfig,
}

impl IgnoreRules {
    /// Load ignore rules for the watched root
    pub fn load(root: &Path, config: IgnoreConfig) -> Result<Self, WatchError> {
        let root = root
            .canonicalize()
            .map_err(|source| WatchError::RootUnreadable {
                path: root.to_path_buf(),
                source,
            })?;

        let mut builder = GitignoreBuilder::new(&root);
        let mut user_literals = Vec::new();
        let mut globs = 0;
        for pattern in &config.patterns {
            let pattern = pattern.trim();
            if pattern.is_empty() {
                continue;
            }
            match pattern_under_root(&root, pattern) {
                // A path spelled out absolutely names one place: anchor it
                Some(rel) => {
                    builder.add_line(None, &format!("/{}", rel))?;
                }
                None => {
                    builder.add_line(None, pattern)?;
                    if !pattern.starts_with('/') && !pattern.contains(['*', '?', '[']) {
                        let literal = pattern.trim_end_matches('/');
                        if !literal.is_empty() {
                            user_literals.push(literal.to_string());
                        }
                    }
                }
            }
            globs += 1;
        }
        let user_globs = if globs == 0 {
            None
        } else {
            Some(builder.build()?)
        };

        let excluded = config
            .exclude
            .iter()
            .filter_map(|path| {
                let abs = resolve_file_path(path)?;
                abs.strip_prefix(&root).ok().map(Path::to_path_buf)
            })
            .collect();

        let mut rules = Self {
            root,
            gitignore: None,
            user_globs,
            user_literals,
            excluded,
            config,
        };

        rules.reload_gitignore()?;
        Ok(rules)
    }

    /// Reload .gitignore from disk
    ///
    /// Called by the detector whenever .gitignore itself changes.
    pub fn reload_gitignore(&mut self) -> Result<(), WatchError> {
        self.gitignore = None;
        if !self.config.use_gitignore {
            return Ok(());
        }

        let gitignore_path = self.root.join(".gitignore");
        if gitignore_path.exists() {
            let mut builder = GitignoreBuilder::new(&self.root);
            if let Some(err) = builder.add(&gitignore_path) {
                tracing::warn!("Partially invalid .gitignore: {}", err);
            }
            self.gitignore = Some(builder.build()?);
        }

        Ok(())
    }

    /// Check if path should be ignored
    ///
    /// Accepts absolute paths under the root or root-relative paths.
    /// Absolute paths outside the root are never ignored.
    pub fn should_ignore(&self, path: &Path) -> bool {
        let rel = match self.relative(path) {
            Some(rel) => rel,
            None => return false,
        };

        // 1. Built-in patterns (highest priority - always enforced)
        if is_builtin_ignored(rel) || self.excluded.iter().any(|p| p == rel) {
            return true;
        }

        let is_dir = self.root.join(rel).is_dir();

        // 2. .gitignore
        if let Some(ref gitignore) = self.gitignore {
            if gitignore.matched_path_or_any_parents(rel, is_dir).is_ignore() {
                return true;
            }
        }

        // 3. User patterns
        if let Some(ref globs) = self.user_globs {
            if globs.matched_path_or_any_parents(rel, is_dir).is_ignore() {
                return true;
            }
        }
        let rel_str = rel.to_string_lossy();
        self.user_literals
            .iter()
            .any(|literal| rel_str.contains(literal.as_str()))
    }

    /// True if the path is the root .gitignore file
    pub fn is_gitignore_file(&self, path: &Path) -> bool {
        self.relative(path) == Some(Path::new(".gitignore"))
    }

    /// Get number of active ignore sources
    pub fn active_sources(&self) -> usize {
        let mut count = 1; // Built-in always active
        if self.gitignore.is_some() {
            count += 1;
        }
        if self.user_globs.is_some() {
            count += 1;
        }
        count
    }

    /// Get watched root
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn relative<'a>(&self, path: &'a Path) -> Option<&'a Path> {
        if path.is_absolute() {
            path.strip_prefix(&self.root).ok()
        } else {
            Some(path)
        }
    }
}

/// Root-relative form of a pattern written as an absolute path under the root
///
/// `None` for ordinary patterns, including gitignore-style `/anchored` ones.
fn pattern_under_root(root: &Path, pattern: &str) -> Option<String> {
    let path = Path::new(pattern);
    if !path.is_absolute() {
        return None;
    }
    let rel = match path.strip_prefix(root) {
        Ok(rel) => rel.to_path_buf(),
        // The pattern may spell the root through a symlink (e.g. /tmp on macOS)
        Err(_) => resolve_file_path(path)?.strip_prefix(root).ok()?.to_path_buf(),
    };
    if rel.as_os_str().is_empty() {
        None
    } else {
        Some(rel.to_string_lossy().into_owned())
    }
}

/// Absolute, symlink-free form of a file path whose parent exists
///
/// The file itself may not exist yet.
fn resolve_file_path(path: &Path) -> Option<PathBuf> {
    if let Ok(abs) = path.canonicalize() {
        return Some(abs);
    }
    let name = path.file_name()?;
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    parent.canonicalize().ok().map(|dir| dir.join(name))
}

/// Check if path matches built-in ignore patterns
fn is_builtin_ignored(rel: &Path) -> bool {
    if rel
        .components()
        .any(|c| matches!(c, Component::Normal(name) if name == ".git"))
    {
        return true;
    }

    let filename = rel.file_name().and_then(|n| n.to_str()).unwrap_or("");
    matches_editor_temp(filename)
}

/// Editor swap/backup files and OS litter that should never trigger a sync
fn matches_editor_temp(filename: &str) -> bool {
    // Vim swap files
    if filename.ends_with(".swp")
        || filename.ends_with(".swo")
        || filename.ends_with(".swx")
        || filename == "4913"
    {
        return true;
    }

    // Backup files (~)
    if filename.ends_with('~') {
        return true;
    }

    // Emacs auto-save (#*#) and lock files (.#*)
    if (filename.len() > 1 && filename.starts_with('#') && filename.ends_with('#'))
        || filename.starts_with(".#")
    {
        return true;
    }

    filename == ".DS_Store" || filename.starts_with("._")
}

/// Ignore configuration
#[derive(Debug, Clone, Deserialize)]
pub struct IgnoreConfig {
    /// Use .gitignore patterns (default: true)
    #[serde(default = "default_true")]
    pub use_gitignore: bool,

    /// User patterns
    #[serde(default)]
    pub patterns: Vec<String>,

    /// Exact files to ignore, relative to the working directory or absolute
    #[serde(skip)]
    pub exclude: Vec<PathBuf>,
}

impl Default for IgnoreConfig {
    fn default() -> Self {
        Self {
            use_gitignore: true,
            patterns: vec![],
            exclude: vec![],
        }
    }
}

fn default_true() -> bool {
    true
}
