use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;

use super::{RepoRoot, VcsProvider, VcsTool, VCS_TOOLS};
use crate::error::{AuditError, AuditResult};
use crate::meta::MetaCache;

/// Detects VCS checkouts on the local filesystem and maps import paths to
/// repositories, consulting `?go-get=1` metadata when a cache is present.
pub struct LocalVcs {
    meta: Option<Arc<MetaCache>>,
}

impl LocalVcs {
    pub fn new(meta: Option<Arc<MetaCache>>) -> Self {
        LocalVcs { meta }
    }
}

#[async_trait]
impl VcsProvider for LocalVcs {
    fn from_dir(&self, dir: &Path, search_root: &Path) -> AuditResult<VcsTool> {
        let undetected = || AuditError::VcsUndetected {
            dir: dir.to_path_buf(),
            search_root: search_root.to_path_buf(),
        };

        for candidate in dir.ancestors() {
            if candidate == search_root || !candidate.starts_with(search_root) {
                break;
            }
            for (cmd, name, marker) in VCS_TOOLS {
                if candidate.join(marker).exists() {
                    let root = candidate
                        .strip_prefix(search_root)
                        .map_err(|_| undetected())?
                        .components()
                        .map(|c| c.as_os_str().to_string_lossy())
                        .collect::<Vec<_>>()
                        .join("/");
                    return Ok(VcsTool {
                        name: name.to_string(),
                        cmd: cmd.to_string(),
                        root,
                    });
                }
            }
        }

        Err(undetected())
    }

    async fn repo_root_for_import_path(&self, import_path: &str) -> AuditResult<RepoRoot> {
        if let Some(root) = static_repo_root(import_path)? {
            return Ok(root);
        }

        let unresolved = |reason: String| AuditError::RepoRootUnresolved {
            import_path: import_path.to_string(),
            reason,
        };

        let Some(cache) = &self.meta else {
            return Err(unresolved("no static rule matches and discovery is offline".into()));
        };

        let meta = cache
            .get(import_path)
            .await
            .map_err(|e| unresolved(e.to_string()))?;

        meta.import_for(import_path)
            .map(|m| RepoRoot {
                vcs: m.vcs.clone(),
                repo: m.repo_root.clone(),
                root: m.prefix.clone(),
            })
            .ok_or_else(|| unresolved("no go-import meta tag".into()))
    }
}

/// Repository roots for hosts whose layout is known without a network call.
pub fn static_repo_root(import_path: &str) -> AuditResult<Option<RepoRoot>> {
    let rules: [(&str, &str); 4] = [
        (r"^(github\.com/[A-Za-z0-9_.\-]+/[A-Za-z0-9_.\-]+)(?:/|$)", "git"),
        (r"^(bitbucket\.org/[A-Za-z0-9_.\-]+/[A-Za-z0-9_.\-]+)(?:/|$)", "git"),
        (r"^(launchpad\.net/[A-Za-z0-9_.\-]+)(?:/|$)", "bzr"),
        (r"^(gopkg\.in/(?:[A-Za-z0-9_\-]+/)?[A-Za-z0-9_\-]+\.v[0-9]+)(?:/|$)", "git"),
    ];
    for (pattern, vcs) in rules {
        if let Some(caps) = Regex::new(pattern)?.captures(import_path) {
            let root = caps[1].to_string();
            return Ok(Some(RepoRoot {
                vcs: vcs.to_string(),
                repo: format!("https://{}", root),
                root,
            }));
        }
    }

    let x_repo = Regex::new(r"^golang\.org/x/([A-Za-z0-9_.\-]+)(?:/|$)")?;
    if let Some(caps) = x_repo.captures(import_path) {
        return Ok(Some(RepoRoot {
            vcs: "git".to_string(),
            repo: format!("https://go.googlesource.com/{}", &caps[1]),
            root: format!("golang.org/x/{}", &caps[1]),
        }));
    }

    let suffixed = Regex::new(
        r"^((?:[a-z0-9.\-]+\.)+[a-z0-9.\-]+(?::[0-9]+)?/[A-Za-z0-9_.\-/]*?)\.(bzr|git|hg|svn)(?:/|$)",
    )?;
    if let Some(caps) = suffixed.captures(import_path) {
        let root = format!("{}.{}", &caps[1], &caps[2]);
        return Ok(Some(RepoRoot {
            vcs: caps[2].to_string(),
            repo: format!("https://{}", root),
            root,
        }));
    }

    Ok(None)
}
