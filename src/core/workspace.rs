//! Workspace - the fixed directory layout a run works in.
//!
//! ```text
//! <root>/
//!   srclink.toml          optional configuration
//!   libraries/<repo>/...  independent source repositories
//!   projects/<name>/      one generated IDE project per bundle
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::util::config::{load_config, Config};
use crate::util::GlobalContext;

pub const LIBRARIES_DIR: &str = "libraries";
pub const PROJECTS_DIR: &str = "projects";

/// Project descriptor file names.
pub const PROJECT_FILE: &str = ".project";
pub const CLASSPATH_FILE: &str = ".classpath";

/// Presence of this file in a project suppresses descriptor regeneration.
/// Its lines name extra target files for the bundle.
pub const MANUAL_OVERRIDE_FILE: &str = ".manual";

/// Compiled output tree inside each project.
pub const OUTPUT_DIR: &str = "bin";

/// Family used when a bundle has only project-local source.
pub const LOCAL_FAMILY: &str = "local";

/// Family used when a bundle has no source at all.
pub const NO_SOURCE_FAMILY: &str = "nosrc";

/// A workspace rooted at the working directory.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
    config: Config,
}

impl Workspace {
    /// Create a workspace with an already loaded configuration.
    pub fn new(root: PathBuf, config: Config) -> Self {
        Workspace { root, config }
    }

    /// Open the workspace at the context's working directory.
    pub fn load(ctx: &GlobalContext) -> Result<Self> {
        let root = ctx.cwd().to_path_buf();
        let config = load_config(&root)?;
        Ok(Workspace::new(root, config))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn libraries_dir(&self) -> PathBuf {
        self.root.join(LIBRARIES_DIR)
    }

    pub fn projects_dir(&self) -> PathBuf {
        self.root.join(PROJECTS_DIR)
    }

    pub fn project_dir(&self, name: &str) -> PathBuf {
        self.projects_dir().join(name)
    }

    /// Resolve a workspace-relative `/` path.
    pub fn resolve(&self, relative: &str) -> PathBuf {
        relative
            .split('/')
            .filter(|s| !s.is_empty())
            .fold(self.root.clone(), |p, s| p.join(s))
    }

    /// Deterministic project name: `<prefix>-<family>-<bundle>`.
    pub fn project_name(&self, family: &str, bundle_id: &str) -> String {
        format!("{}-{}-{}", self.config.workspace.prefix(), family, bundle_id)
    }

    /// Names of the project folders currently on disk, sorted.
    pub fn existing_projects(&self) -> Result<Vec<String>> {
        list_dir_names(&self.projects_dir())
    }

    /// Names of the top-level library repositories, sorted.
    pub fn library_repos(&self) -> Result<Vec<String>> {
        list_dir_names(&self.libraries_dir())
    }
}

fn list_dir_names(dir: &Path) -> Result<Vec<String>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
    {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.starts_with('.') {
                names.push(name);
            }
        }
    }
    names.sort();
    Ok(names)
}
