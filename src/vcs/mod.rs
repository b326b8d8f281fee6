//! Version-control identity of package directories and import paths.

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AuditResult;

pub mod local;

/// The VCS tool managing a directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VcsTool {
    /// Display name, e.g. `Git`.
    pub name: String,
    /// Executable, e.g. `git`.
    pub cmd: String,
    /// Repository directory relative to the search root, `/`-separated.
    pub root: String,
}

/// Canonical repository for an import path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepoRoot {
    pub vcs: String,
    /// Clone URL.
    pub repo: String,
    /// Import path of the repository root.
    pub root: String,
}

impl RepoRoot {
    pub fn vcs_name(&self) -> &str {
        display_name(&self.vcs)
    }
}

#[async_trait]
pub trait VcsProvider: Send + Sync {
    /// Find the VCS checkout containing `dir`, looking no higher than
    /// `search_root`.
    fn from_dir(&self, dir: &Path, search_root: &Path) -> AuditResult<VcsTool>;

    async fn repo_root_for_import_path(&self, import_path: &str) -> AuditResult<RepoRoot>;
}

/// Known VCS tools as `(command, display name, marker directory)`.
pub(crate) const VCS_TOOLS: &[(&str, &str, &str)] = &[
    ("git", "Git", ".git"),
    ("hg", "Mercurial", ".hg"),
    ("bzr", "Bazaar", ".bzr"),
    ("svn", "Subversion", ".svn"),
];

pub(crate) fn display_name(cmd: &str) -> &str {
    VCS_TOOLS
        .iter()
        .find(|(c, _, _)| *c == cmd)
        .map(|(_, name, _)| *name)
        .unwrap_or(cmd)
}
