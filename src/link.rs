//! Browsable links to a file at a given revision of a package's repository.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::AuditResult;
use crate::meta::{MetaCache, SourceMeta};

/// Looks up `go-source` metadata for hosts without a built-in template.
#[async_trait]
pub trait SourceLinkDiscovery: Send + Sync {
    async fn discover(&self, import_path: &str) -> AuditResult<Option<SourceMeta>>;
}

/// Reads `go-source` from the page the repository lookup already fetched.
pub struct HttpDiscovery {
    meta: Arc<MetaCache>,
}

impl HttpDiscovery {
    pub fn new(meta: Arc<MetaCache>) -> Self {
        HttpDiscovery { meta }
    }
}

#[async_trait]
impl SourceLinkDiscovery for HttpDiscovery {
    async fn discover(&self, import_path: &str) -> AuditResult<Option<SourceMeta>> {
        let meta = self.meta.get(import_path).await?;
        Ok(meta.source_for(import_path).cloned())
    }
}

pub struct LinkBuilder {
    discovery: Option<Arc<dyn SourceLinkDiscovery>>,
    default_branch: String,
}

impl LinkBuilder {
    pub fn new(discovery: Option<Arc<dyn SourceLinkDiscovery>>, default_branch: &str) -> Self {
        LinkBuilder {
            discovery,
            default_branch: default_branch.to_string(),
        }
    }

    /// URL of `file` in the repository holding `import_path`, at `rev` (the
    /// default branch when empty). Empty when `file` is empty; the bare
    /// `https://{import_path}` when discovery is off or fails.
    pub async fn link_to_file(&self, import_path: &str, file: &str, rev: &str) -> String {
        if file.is_empty() {
            return String::new();
        }

        if let Some(url) = static_link(import_path, file, rev, &self.default_branch) {
            return url;
        }

        let project_url = format!("https://{}", import_path);
        let Some(discovery) = &self.discovery else {
            return project_url;
        };

        match discovery.discover(import_path).await {
            Ok(Some(source)) => {
                let dir = import_path
                    .strip_prefix(source.prefix.as_str())
                    .unwrap_or("");
                source.file_url(dir, file).unwrap_or(project_url)
            }
            Ok(None) => project_url,
            Err(e) => {
                tracing::debug!(import_path, error = %e, "source link discovery failed");
                project_url
            }
        }
    }
}

/// Links for hosts with a fixed URL layout; `None` means discovery is needed.
pub fn static_link(import_path: &str, file: &str, rev: &str, default_branch: &str) -> Option<String> {
    let rev = if rev.is_empty() { default_branch } else { rev };

    if let Some(rest) = import_path.strip_prefix("github.com/") {
        return Some(github_blob(import_path, rest, rev, file));
    }
    if let Some(rest) = import_path.strip_prefix("golang.org/x/") {
        return Some(github_blob(import_path, &format!("golang/{}", rest), rev, file));
    }
    if import_path.starts_with("gopkg.in/") {
        let base = gopkg_in_to_github(import_path, default_branch);
        if base.is_empty() {
            return Some(String::new());
        }
        return Some(format!("{}/{}", base, file));
    }
    None
}

/// `path` is `user/repo[/subdir…]` on github.com.
fn github_blob(import_path: &str, path: &str, rev: &str, file: &str) -> String {
    let mut parts = path.splitn(3, '/');
    let user = parts.next().unwrap_or_default();
    let repo = parts.next().unwrap_or_default();
    if user.is_empty() || repo.is_empty() {
        return format!("https://{}", import_path);
    }
    match parts.next() {
        Some(sub) if !sub.is_empty() => format!(
            "https://github.com/{}/{}/blob/{}/{}/{}",
            user, repo, rev, sub, file
        ),
        _ => format!("https://github.com/{}/{}/blob/{}/{}", user, repo, rev, file),
    }
}

/// Components of a `gopkg.in` import path.
#[derive(Debug, PartialEq)]
pub struct GoPkgIn {
    pub user: String,
    pub pkg: String,
    pub version: String,
    /// Remaining path segments with a leading `/`, or empty.
    pub dir: String,
}

/// Parse `gopkg.in/pkg.vN[/dir]` or `gopkg.in/user/pkg.vN[/dir]`.
///
/// The implicit user for the short form is `go-{pkg}`; version `v0` maps to
/// `default_branch`.
pub fn parse_gopkg_in(name: &str, default_branch: &str) -> Option<GoPkgIn> {
    let parts: Vec<&str> = name.split('/').collect();
    if parts.len() < 2 || parts[0] != "gopkg.in" {
        return None;
    }

    let (user, pkgversion, rest) = if parts[1].contains('.') {
        (None, parts[1], &parts[2..])
    } else {
        (Some(parts[1]), *parts.get(2)?, parts.get(3..).unwrap_or(&[]))
    };

    let (pkg, version) = pkgversion.split_once('.')?;
    if pkg.is_empty() || version.is_empty() {
        return None;
    }

    let user = match user {
        Some(u) => u.to_string(),
        None => format!("go-{}", pkg),
    };
    let version = if version == "v0" {
        default_branch.to_string()
    } else {
        version.to_string()
    };
    let dir = if rest.is_empty() {
        String::new()
    } else {
        format!("/{}", rest.join("/"))
    };

    Some(GoPkgIn {
        user,
        pkg: pkg.to_string(),
        version,
        dir,
    })
}

/// Convert a `gopkg.in` import path to its GitHub tree URL, or `""` when
/// the path is malformed.
pub fn gopkg_in_to_github(name: &str, default_branch: &str) -> String {
    match parse_gopkg_in(name, default_branch) {
        Some(p) => format!(
            "https://github.com/{}/{}/blob/{}{}",
            p.user, p.pkg, p.version, p.dir
        ),
        None => String::new(),
    }
}
