//! Drives packages through VCS, license, inheritance, commit, and link
//! lookups to produce the ordered dependency report.
//!
//! # Stages
//! 1. **Survey** (concurrent): VCS tool, repository root, own license.
//!    Packages whose VCS or repository cannot be determined are skipped.
//! 2. **Inheritance** (sequential, input order): see [`crate::inheritance`].
//! 3. **Enrichment** (concurrent): last commit, optional commits-behind,
//!    license link.
//!
//! Concurrent stages use order-preserving buffering, so the output order
//! always matches the input order.

use std::sync::Arc;
use std::time::Instant;

use futures::stream::{self, StreamExt};
use indicatif::ProgressBar;

use crate::commit::{last_commit, CommitProvider};
use crate::error::{AuditError, AuditResult};
use crate::inheritance::{Candidate, InheritanceResolver};
use crate::license::detector::{detect_license, LicenseProvider};
use crate::link::LinkBuilder;
use crate::models::{Dependency, Lookup, PackageRef, Project};
use crate::resolver::{resolve_packages, PackageResolver};
use crate::vcs::VcsProvider;

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Maximum packages in flight during concurrent stages.
    pub jobs: usize,
    /// Count commits between `origin/master` and the last commit.
    pub commits_behind: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        PipelineOptions {
            jobs: 8,
            commits_behind: false,
        }
    }
}

pub struct Pipeline {
    resolver: Arc<dyn PackageResolver>,
    vcs: Arc<dyn VcsProvider>,
    licenses: Arc<dyn LicenseProvider>,
    commits: Arc<dyn CommitProvider>,
    links: LinkBuilder,
    options: PipelineOptions,
    progress: Option<ProgressBar>,
}

impl Pipeline {
    pub fn new(
        resolver: Arc<dyn PackageResolver>,
        vcs: Arc<dyn VcsProvider>,
        licenses: Arc<dyn LicenseProvider>,
        commits: Arc<dyn CommitProvider>,
        links: LinkBuilder,
        options: PipelineOptions,
    ) -> Self {
        Pipeline {
            resolver,
            vcs,
            licenses,
            commits,
            links,
            options,
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Resolve the transitive dependencies of `pkgs` and audit them.
    ///
    /// Only package resolution failures are returned as errors; everything
    /// else degrades individual records.
    pub async fn load_dependencies(
        &self,
        pkgs: &[String],
        ignores: &[String],
    ) -> AuditResult<Vec<Dependency>> {
        let packages = resolve_packages(self.resolver.as_ref(), pkgs, ignores).await?;
        Ok(self.run(packages).await)
    }

    /// Audit an already-filtered package list.
    pub async fn run(&self, packages: Vec<PackageRef>) -> Vec<Dependency> {
        let jobs = self.options.jobs.max(1);
        let total = packages.len();
        if let Some(pb) = &self.progress {
            pb.set_length(total as u64);
            pb.set_message("surveying");
        }

        let started = Instant::now();
        let candidates: Vec<Option<Candidate>> = stream::iter(packages)
            .map(|pkg| self.survey(pkg))
            .buffered(jobs)
            .collect()
            .await;
        let candidates: Vec<Candidate> = candidates.into_iter().flatten().collect();
        tracing::info!(
            total,
            resolved = candidates.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "survey complete"
        );

        let mut inheritance = InheritanceResolver::new(self.resolver.as_ref(), self.licenses.clone());
        let mut kept = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            if let Some(dep) = inheritance.resolve(candidate).await.into_dependency() {
                kept.push(dep);
            }
        }
        tracing::info!(
            kept = kept.len(),
            repo_roots = inheritance.memo().len(),
            "license inheritance applied"
        );

        if let Some(pb) = &self.progress {
            pb.set_length((total + kept.len()) as u64);
            pb.set_message("reading commits");
        }

        let started = Instant::now();
        let out: Vec<Dependency> = stream::iter(kept)
            .map(|dep| self.enrich(dep))
            .buffered(jobs)
            .collect()
            .await;
        tracing::info!(
            dependencies = out.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "enrichment complete"
        );

        out
    }

    /// VCS identity and own license for one package; `None` skips it.
    async fn survey(&self, pkg: PackageRef) -> Option<Candidate> {
        let result = self.survey_inner(pkg).await;
        if let Some(pb) = &self.progress {
            pb.inc(1);
        }
        result
    }

    async fn survey_inner(&self, pkg: PackageRef) -> Option<Candidate> {
        let vcs = self.vcs.clone();
        let dir = pkg.dir.clone();
        let search_root = pkg.search_root();
        let tool = match blocking(move || vcs.from_dir(&dir, &search_root)).await {
            Ok(tool) => tool,
            Err(e) => {
                tracing::warn!(
                    package = %pkg.import_path,
                    dir = %pkg.dir.display(),
                    error = %e,
                    "error computing vcs, skipping"
                );
                return None;
            }
        };

        let repo_root = match self.vcs.repo_root_for_import_path(&pkg.import_path).await {
            Ok(root) => root,
            Err(e) => {
                tracing::warn!(
                    package = %pkg.import_path,
                    error = %e,
                    "error computing repository, skipping"
                );
                return None;
            }
        };

        if tool.cmd != repo_root.vcs {
            tracing::debug!(
                package = %pkg.import_path,
                checkout = %tool.root,
                checkout_vcs = %tool.name,
                repo_vcs = repo_root.vcs_name(),
                "checkout and repository disagree on VCS"
            );
        }

        let licenses = self.licenses.clone();
        let dir = pkg.dir.clone();
        let license = blocking(move || Ok(detect_license(licenses.as_ref(), &dir)))
            .await
            .unwrap_or_else(|e| Lookup::unavailable(e));

        let mut dependency = Dependency::new(
            pkg,
            Project {
                vcs_name: tool.name,
                vcs_cmd: tool.cmd,
                repo: repo_root.repo,
                license_link: String::new(),
            },
        );
        dependency.license = license;

        Some(Candidate {
            dependency,
            repo_root: repo_root.root,
        })
    }

    /// Best-effort commit metadata and license link.
    async fn enrich(&self, mut dep: Dependency) -> Dependency {
        let dir = dep.package.dir.clone();

        dep.commit = match last_commit(self.commits.as_ref(), &dir).await {
            Ok(commit) => Lookup::Found(commit),
            Err(e) => Lookup::unavailable(e),
        };

        if self.options.commits_behind {
            if let Some(commit) = dep.commit.found() {
                match self.commits.commits_behind(&dir, &commit.commit).await {
                    Ok(n) => dep.commits_behind = Some(n),
                    Err(e) => tracing::debug!(
                        package = dep.import_path(),
                        error = %e,
                        "cannot count commits behind"
                    ),
                }
            }
        }

        dep.project.license_link = self
            .links
            .link_to_file(dep.import_path(), dep.license.file(), dep.commit.commit_id())
            .await;

        if let Some(pb) = &self.progress {
            pb.inc(1);
        }
        dep
    }
}

/// Run filesystem work off the async worker threads.
async fn blocking<T, F>(f: F) -> AuditResult<T>
where
    F: FnOnce() -> AuditResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AuditError::Io(std::io::Error::other(e)))?
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, HashSet};
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::license::detector::DetectedLicense;
    use crate::vcs::{RepoRoot, VcsTool};

    fn pkg(path: &str) -> PackageRef {
        PackageRef {
            import_path: path.to_string(),
            root: PathBuf::from("/go"),
            dir: PathBuf::from(format!("/go/src/{}", path)),
        }
    }

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[derive(Default)]
    struct FakeResolver {
        std: Vec<String>,
        deps: Vec<String>,
        fail: bool,
    }

    #[async_trait]
    impl PackageResolver for FakeResolver {
        async fn std_packages(&self) -> AuditResult<Vec<String>> {
            if self.fail {
                return Err(AuditError::CommandFailed {
                    command: "go list std".into(),
                    stderr: "go: command not found".into(),
                });
            }
            Ok(self.std.clone())
        }
        async fn deps(&self, _pkgs: &[String]) -> AuditResult<Vec<String>> {
            Ok(self.deps.clone())
        }
        async fn packages(&self, paths: &[String]) -> AuditResult<Vec<PackageRef>> {
            Ok(paths.iter().map(|p| pkg(p)).collect())
        }
        async fn package(&self, path: &str) -> AuditResult<PackageRef> {
            Ok(pkg(path))
        }
    }

    /// Repository root = first three path segments.
    #[derive(Default)]
    struct FakeVcs {
        no_vcs: HashSet<String>,
        no_root: HashSet<String>,
    }

    #[async_trait]
    impl VcsProvider for FakeVcs {
        fn from_dir(&self, dir: &Path, search_root: &Path) -> AuditResult<VcsTool> {
            let path = dir
                .strip_prefix(search_root)
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_default();
            if self.no_vcs.contains(&path) {
                return Err(AuditError::VcsUndetected {
                    dir: dir.to_path_buf(),
                    search_root: search_root.to_path_buf(),
                });
            }
            Ok(VcsTool {
                name: "Git".into(),
                cmd: "git".into(),
                root: path.split('/').take(3).collect::<Vec<_>>().join("/"),
            })
        }

        async fn repo_root_for_import_path(&self, import_path: &str) -> AuditResult<RepoRoot> {
            if self.no_root.contains(import_path) {
                return Err(AuditError::RepoRootUnresolved {
                    import_path: import_path.into(),
                    reason: "no go-import meta tag".into(),
                });
            }
            let root = import_path.split('/').take(3).collect::<Vec<_>>().join("/");
            Ok(RepoRoot {
                vcs: "git".into(),
                repo: format!("https://{}", root),
                root,
            })
        }
    }

    struct FakeLicenses {
        licensed: HashMap<PathBuf, String>,
        scans: Mutex<Vec<PathBuf>>,
    }

    impl FakeLicenses {
        fn new(licensed: &[(&str, &str)]) -> Arc<Self> {
            Arc::new(FakeLicenses {
                licensed: licensed
                    .iter()
                    .map(|(p, l)| (pkg(p).dir, l.to_string()))
                    .collect(),
                scans: Mutex::new(Vec::new()),
            })
        }

        fn scans_of(&self, path: &str) -> usize {
            let dir = pkg(path).dir;
            self.scans.lock().unwrap().iter().filter(|d| **d == dir).count()
        }
    }

    impl LicenseProvider for FakeLicenses {
        fn detect(&self, dir: &Path) -> AuditResult<DetectedLicense> {
            self.scans.lock().unwrap().push(dir.to_path_buf());
            self.licensed
                .get(dir)
                .map(|l| DetectedLicense {
                    license_type: l.clone(),
                    file: dir.join("LICENSE"),
                })
                .ok_or_else(|| AuditError::LicenseNotFound(dir.to_path_buf()))
        }
    }

    /// Every directory has commit `c-{dirname}` unless listed as history-less.
    #[derive(Default)]
    struct FakeCommits {
        no_history: HashSet<String>,
    }

    #[async_trait]
    impl CommitProvider for FakeCommits {
        async fn last_commit_record(&self, dir: &Path) -> AuditResult<String> {
            let name = dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            if self.no_history.contains(&name) {
                return Err(AuditError::CommandFailed {
                    command: "git log -1".into(),
                    stderr: "fatal: your current branch does not have any commits yet".into(),
                });
            }
            Ok(format!(
                "Commit: c-{}\nDate: Mon, 2 Jan 2017 15:04:05 -0700\nSubject: update {}\n\nbody\n",
                name, name
            ))
        }

        async fn commits_behind(&self, _dir: &Path, _hash: &str) -> AuditResult<u32> {
            Ok(3)
        }
    }

    fn pipeline(
        resolver: FakeResolver,
        vcs: FakeVcs,
        licenses: Arc<FakeLicenses>,
        commits: FakeCommits,
        options: PipelineOptions,
    ) -> Pipeline {
        Pipeline::new(
            Arc::new(resolver),
            Arc::new(vcs),
            licenses,
            Arc::new(commits),
            LinkBuilder::new(None, "master"),
            options,
        )
    }

    fn imports(deps: &[Dependency]) -> Vec<&str> {
        deps.iter().map(|d| d.import_path()).collect()
    }

    #[tokio::test]
    async fn test_siblings_under_unlicensed_root_are_kept() {
        let licenses = FakeLicenses::new(&[]);
        let p = pipeline(
            FakeResolver::default(),
            FakeVcs::default(),
            licenses.clone(),
            FakeCommits::default(),
            PipelineOptions::default(),
        );

        let out = p
            .run(vec![pkg("github.com/a/b/one"), pkg("github.com/a/b/two")])
            .await;

        assert_eq!(imports(&out), vec!["github.com/a/b/one", "github.com/a/b/two"]);
        assert!(out.iter().all(|d| d.license.license_type().is_empty()));
        assert!(out.iter().all(|d| d.project.license_link.is_empty()));
        assert_eq!(licenses.scans_of("github.com/a/b"), 1);
    }

    #[tokio::test]
    async fn test_licensed_root_replaces_first_child_and_drops_the_rest() {
        let licenses = FakeLicenses::new(&[("github.com/a/b", "MIT"), ("github.com/c/d", "ISC")]);
        let p = pipeline(
            FakeResolver::default(),
            FakeVcs::default(),
            licenses.clone(),
            FakeCommits::default(),
            PipelineOptions::default(),
        );

        let out = p
            .run(vec![
                pkg("github.com/a/b/one"),
                pkg("github.com/c/d"),
                pkg("github.com/a/b/two"),
            ])
            .await;

        assert_eq!(imports(&out), vec!["github.com/a/b", "github.com/c/d"]);
        assert_eq!(out[0].license.license_type(), "MIT");
        assert_eq!(
            out[0].project.license_link,
            "https://github.com/a/b/blob/c-b/LICENSE"
        );
        assert_eq!(out[1].license.license_type(), "ISC");
        assert_eq!(licenses.scans_of("github.com/a/b"), 1);
    }

    #[tokio::test]
    async fn test_own_license_always_reported() {
        let licenses = FakeLicenses::new(&[
            ("github.com/a/b", "MIT"),
            ("github.com/a/b/vendored", "GPL-3.0"),
        ]);
        let p = pipeline(
            FakeResolver::default(),
            FakeVcs::default(),
            licenses,
            FakeCommits::default(),
            PipelineOptions::default(),
        );

        let out = p
            .run(vec![pkg("github.com/a/b"), pkg("github.com/a/b/vendored")])
            .await;

        assert_eq!(out.len(), 2);
        assert_eq!(out[1].license.license_type(), "GPL-3.0");
    }

    #[tokio::test]
    async fn test_vcs_and_repo_failures_skip_package() {
        let vcs = FakeVcs {
            no_vcs: ["example.org/novcs".to_string()].into(),
            no_root: ["example.org/noroot".to_string()].into(),
        };
        let p = pipeline(
            FakeResolver::default(),
            vcs,
            FakeLicenses::new(&[("github.com/a/b", "MIT")]),
            FakeCommits::default(),
            PipelineOptions::default(),
        );

        let out = p
            .run(vec![
                pkg("example.org/novcs"),
                pkg("github.com/a/b"),
                pkg("example.org/noroot"),
            ])
            .await;

        assert_eq!(imports(&out), vec!["github.com/a/b"]);
        assert!(out.iter().all(|d| !d.project.repo.is_empty()));
    }

    #[tokio::test]
    async fn test_missing_history_keeps_record_with_empty_commit() {
        let commits = FakeCommits {
            no_history: ["b".to_string()].into(),
        };
        let p = pipeline(
            FakeResolver::default(),
            FakeVcs::default(),
            FakeLicenses::new(&[("github.com/a/b", "MIT")]),
            commits,
            PipelineOptions::default(),
        );

        let out = p.run(vec![pkg("github.com/a/b")]).await;

        assert_eq!(out.len(), 1);
        assert!(matches!(out[0].commit, Lookup::Unavailable { .. }));
        assert_eq!(out[0].commit.commit_id(), "");
        assert_eq!(
            out[0].project.license_link,
            "https://github.com/a/b/blob/master/LICENSE"
        );
    }

    #[tokio::test]
    async fn test_output_order_matches_input_under_concurrency() {
        let paths: Vec<String> = (0..40).map(|i| format!("github.com/org{}/repo", i)).collect();
        let licensed: Vec<(&str, &str)> = paths.iter().map(|p| (p.as_str(), "MIT")).collect();
        let p = pipeline(
            FakeResolver::default(),
            FakeVcs::default(),
            FakeLicenses::new(&licensed),
            FakeCommits::default(),
            PipelineOptions {
                jobs: 6,
                commits_behind: false,
            },
        );

        let out = p.run(paths.iter().map(|p| pkg(p)).collect()).await;

        let got: Vec<String> = out.iter().map(|d| d.import_path().to_string()).collect();
        assert_eq!(got, paths);
    }

    #[tokio::test]
    async fn test_commits_behind_is_optional() {
        let licenses = FakeLicenses::new(&[("github.com/a/b", "MIT")]);
        let off = pipeline(
            FakeResolver::default(),
            FakeVcs::default(),
            licenses.clone(),
            FakeCommits::default(),
            PipelineOptions::default(),
        );
        let on = pipeline(
            FakeResolver::default(),
            FakeVcs::default(),
            licenses,
            FakeCommits::default(),
            PipelineOptions {
                jobs: 2,
                commits_behind: true,
            },
        );

        assert_eq!(off.run(vec![pkg("github.com/a/b")]).await[0].commits_behind, None);
        assert_eq!(on.run(vec![pkg("github.com/a/b")]).await[0].commits_behind, Some(3));
    }

    #[tokio::test]
    async fn test_load_dependencies_filters_std_and_ignores() {
        let resolver = FakeResolver {
            std: strings(&["fmt", "os"]),
            deps: strings(&["fmt", "github.com/a/b", "github.com/me/private", "os"]),
            fail: false,
        };
        let p = pipeline(
            resolver,
            FakeVcs::default(),
            FakeLicenses::new(&[("github.com/a/b", "MIT")]),
            FakeCommits::default(),
            PipelineOptions::default(),
        );

        let out = p
            .load_dependencies(&strings(&["./..."]), &strings(&["github.com/me/"]))
            .await
            .unwrap();

        assert_eq!(imports(&out), vec!["github.com/a/b"]);
    }

    #[tokio::test]
    async fn test_resolution_failure_aborts_run() {
        let p = pipeline(
            FakeResolver {
                fail: true,
                ..Default::default()
            },
            FakeVcs::default(),
            FakeLicenses::new(&[]),
            FakeCommits::default(),
            PipelineOptions::default(),
        );

        let err = p.load_dependencies(&strings(&["./..."]), &[]).await;
        assert!(matches!(err, Err(AuditError::CommandFailed { .. })));
    }
}
