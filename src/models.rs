use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// A resolved package as reported by the package resolver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageRef {
    pub import_path: String,
    pub root: PathBuf,
    pub dir: PathBuf,
}

impl PackageRef {
    /// Directory the VCS walk must stay strictly below.
    ///
    /// GOPATH layouts use `root/src`; anything else (module mode) uses the
    /// parent of `root` so the module directory itself is still inspected.
    pub fn search_root(&self) -> PathBuf {
        let src = self.root.join("src");
        if self.dir.starts_with(&src) {
            return src;
        }
        self.root
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.root.clone())
    }
}

/// VCS identity of a dependency, plus the link to its license file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub vcs_name: String,
    pub vcs_cmd: String,
    pub repo: String,
    pub license_link: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LicenseInfo {
    #[serde(rename = "type")]
    pub license_type: String,
    /// Base name of the file the license was detected in.
    pub file: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommitInfo {
    pub commit: String,
    /// Author date exactly as printed by the VCS.
    pub date: String,
    pub subject: String,
}

/// Outcome of a best-effort lookup.
///
/// `Pending` means the lookup has not run yet; `Unavailable` means it ran
/// and produced nothing. Both render as empty in reports.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Lookup<T> {
    #[default]
    Pending,
    Found(T),
    Unavailable { reason: String },
}

impl<T> Lookup<T> {
    pub fn unavailable(reason: impl ToString) -> Self {
        Lookup::Unavailable {
            reason: reason.to_string(),
        }
    }

    pub fn found(&self) -> Option<&T> {
        match self {
            Lookup::Found(v) => Some(v),
            _ => None,
        }
    }
}

impl Lookup<LicenseInfo> {
    /// Detected license type, or `""` when undetected.
    pub fn license_type(&self) -> &str {
        self.found().map(|l| l.license_type.as_str()).unwrap_or("")
    }

    pub fn file(&self) -> &str {
        self.found().map(|l| l.file.as_str()).unwrap_or("")
    }
}

impl Lookup<CommitInfo> {
    pub fn commit_id(&self) -> &str {
        self.found().map(|c| c.commit.as_str()).unwrap_or("")
    }

    pub fn date(&self) -> &str {
        self.found().map(|c| c.date.as_str()).unwrap_or("")
    }

    pub fn subject(&self) -> &str {
        self.found().map(|c| c.subject.as_str()).unwrap_or("")
    }
}

/// One row of the audit report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dependency {
    pub package: PackageRef,
    pub commit: Lookup<CommitInfo>,
    pub license: Lookup<LicenseInfo>,
    pub project: Project,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commits_behind: Option<u32>,
}

impl Dependency {
    pub fn new(package: PackageRef, project: Project) -> Self {
        Dependency {
            package,
            commit: Lookup::Pending,
            license: Lookup::Pending,
            project,
            commits_behind: None,
        }
    }

    pub fn import_path(&self) -> &str {
        &self.package.import_path
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LicenseRisk {
    Permissive,
    WeakCopyleft,
    StrongCopyleft,
    Proprietary,
    Unknown,
}

impl std::fmt::Display for LicenseRisk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LicenseRisk::Permissive => write!(f, "Permissive"),
            LicenseRisk::WeakCopyleft => write!(f, "Weak Copyleft"),
            LicenseRisk::StrongCopyleft => write!(f, "Strong Copyleft"),
            LicenseRisk::Proprietary => write!(f, "Proprietary"),
            LicenseRisk::Unknown => write!(f, "Unknown"),
        }
    }
}
