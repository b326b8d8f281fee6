//! Parent/child license inheritance.
//!
//! Sub-packages frequently have no license file of their own while the
//! repository that contains them does. For a package without a license the
//! resolver consults the repository root's license, once per root per run:
//!
//! | root already seen? | root license | outcome                              |
//! |--------------------|--------------|--------------------------------------|
//! | yes                | non-empty    | drop the package                     |
//! | yes                | empty        | keep the package, unlicensed         |
//! | no                 | non-empty    | report the root package instead      |
//! | no                 | empty        | keep the package, unlicensed         |

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::AuditError;
use crate::license::detector::{detect_license, LicenseProvider};
use crate::models::{Dependency, LicenseInfo, Lookup};
use crate::resolver::PackageResolver;

/// Repository root import path → license type (`""` for unlicensed),
/// scoped to one pipeline run.
#[derive(Debug, Default)]
pub struct LicenseMemo {
    seen: HashMap<String, String>,
}

impl LicenseMemo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, root: &str, license_type: &str) {
        self.seen.insert(root.to_string(), license_type.to_string());
    }

    pub fn get(&self, root: &str) -> Option<&str> {
        self.seen.get(root).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }
}

/// A package that survived VCS resolution, with its own license detected.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub dependency: Dependency,
    /// Import path of the repository containing the package.
    pub repo_root: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Keep(Dependency),
    /// The repository root's record replaces the package's.
    Substitute(Dependency),
    Drop,
}

impl Decision {
    pub fn into_dependency(self) -> Option<Dependency> {
        match self {
            Decision::Keep(d) | Decision::Substitute(d) => Some(d),
            Decision::Drop => None,
        }
    }
}

pub struct InheritanceResolver<'a> {
    packages: &'a dyn PackageResolver,
    licenses: Arc<dyn LicenseProvider>,
    memo: LicenseMemo,
}

impl<'a> InheritanceResolver<'a> {
    pub fn new(packages: &'a dyn PackageResolver, licenses: Arc<dyn LicenseProvider>) -> Self {
        InheritanceResolver {
            packages,
            licenses,
            memo: LicenseMemo::new(),
        }
    }

    pub fn memo(&self) -> &LicenseMemo {
        &self.memo
    }

    /// Decide how `candidate` appears in the report. Candidates must be
    /// passed in report order: earlier packages populate the memo.
    pub async fn resolve(&mut self, candidate: Candidate) -> Decision {
        let own = candidate.dependency.license.license_type().to_string();
        self.memo.record(candidate.dependency.import_path(), &own);

        if !own.is_empty() {
            return Decision::Keep(candidate.dependency);
        }

        match self.memo.get(&candidate.repo_root) {
            Some(root_license) if !root_license.is_empty() => {
                tracing::debug!(
                    package = candidate.dependency.import_path(),
                    root = %candidate.repo_root,
                    license = root_license,
                    "unlicensed package under licensed repository, dropping"
                );
                Decision::Drop
            }
            Some(_) => Decision::Keep(candidate.dependency),
            None => self.check_root(candidate).await,
        }
    }

    /// First look at a repository root this run.
    async fn check_root(&mut self, candidate: Candidate) -> Decision {
        let root = candidate.repo_root.as_str();

        let root_pkg = match self.packages.package(root).await {
            Ok(pkg) => pkg,
            Err(e) => {
                tracing::debug!(root, error = %e, "cannot load repository root package");
                return Decision::Keep(candidate.dependency);
            }
        };

        let license = self.detect_blocking(root_pkg.dir.clone()).await;
        self.memo.record(root, license.license_type());

        if license.license_type().is_empty() {
            return Decision::Keep(candidate.dependency);
        }

        tracing::debug!(
            package = candidate.dependency.import_path(),
            root,
            license = license.license_type(),
            "substituting repository root for unlicensed package"
        );
        let mut parent = Dependency::new(root_pkg, candidate.dependency.project.clone());
        parent.license = license;
        Decision::Substitute(parent)
    }

    async fn detect_blocking(&self, dir: std::path::PathBuf) -> Lookup<LicenseInfo> {
        let licenses = self.licenses.clone();
        tokio::task::spawn_blocking(move || detect_license(licenses.as_ref(), &dir))
            .await
            .unwrap_or_else(|e| Lookup::unavailable(AuditError::Io(std::io::Error::other(e))))
    }
}
