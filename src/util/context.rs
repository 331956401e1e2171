//! Global context for srclink runs.
//!
//! Provides centralized access to the working directory, the user's home
//! directory and the plugin folder the bundles are read from.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::BaseDirs;

use crate::util::config::WorkspaceSettings;

/// Plugin folder used when the configuration names none, relative to home.
pub const DEFAULT_PLUGINS_DIR: &str = ".p2/pool/plugins";

/// Global context containing paths and output preferences.
#[derive(Debug, Clone)]
pub struct GlobalContext {
    /// Current working directory (the workspace root)
    cwd: PathBuf,

    /// User home directory
    home: PathBuf,

    /// Whether to use verbose output
    verbose: bool,
}

impl GlobalContext {
    /// Create a new GlobalContext from the process environment.
    pub fn new() -> Result<Self> {
        let cwd = std::env::current_dir().context("failed to get current directory")?;
        Ok(Self::with_cwd(cwd))
    }

    /// Create a GlobalContext with a specific working directory.
    pub fn with_cwd(cwd: PathBuf) -> Self {
        let home = BaseDirs::new()
            .map(|b| b.home_dir().to_path_buf())
            .unwrap_or_else(|| cwd.clone());

        GlobalContext {
            cwd,
            home,
            verbose: false,
        }
    }

    /// Override the home directory.
    pub fn with_home(mut self, home: PathBuf) -> Self {
        self.home = home;
        self
    }

    /// Set verbose mode.
    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    /// Get the current working directory.
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Get the user home directory.
    pub fn home(&self) -> &Path {
        &self.home
    }

    /// Check if verbose mode is enabled.
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Resolve the plugin folder.
    ///
    /// A configured relative path is taken relative to the workspace root; a
    /// leading `~/` is expanded to the home directory.
    pub fn plugins_dir(&self, settings: &WorkspaceSettings) -> PathBuf {
        match &settings.plugins_dir {
            Some(path) => {
                if let Ok(rest) = path.strip_prefix("~") {
                    self.home.join(rest)
                } else if path.is_absolute() {
                    path.clone()
                } else {
                    self.cwd.join(path)
                }
            }
            None => self.home.join(DEFAULT_PLUGINS_DIR),
        }
    }
}
