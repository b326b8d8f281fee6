//! Transitive package enumeration.
//!
//! [`PackageResolver`] abstracts the Go toolchain so the pipeline can run
//! against in-memory fixtures; [`golist::GoList`] is the real implementation.

use async_trait::async_trait;

use crate::error::AuditResult;
use crate::models::PackageRef;

pub mod golist;

#[async_trait]
pub trait PackageResolver: Send + Sync {
    /// Import paths of the standard library.
    async fn std_packages(&self) -> AuditResult<Vec<String>>;

    /// Transitive dependencies of `pkgs`, deduplicated and sorted.
    async fn deps(&self, pkgs: &[String]) -> AuditResult<Vec<String>>;

    /// Package metadata for each import path, in the order given.
    async fn packages(&self, import_paths: &[String]) -> AuditResult<Vec<PackageRef>>;

    async fn package(&self, import_path: &str) -> AuditResult<PackageRef>;
}

/// Expand `pkgs` to their non-standard transitive dependencies, minus
/// anything matching `ignores`. Errors here abort the run.
pub async fn resolve_packages(
    resolver: &dyn PackageResolver,
    pkgs: &[String],
    ignores: &[String],
) -> AuditResult<Vec<PackageRef>> {
    let stdlib = resolver.std_packages().await?;
    let deps = resolver.deps(pkgs).await?;
    let total = deps.len();

    let deps = remove_if_equals(deps, &stdlib);
    let deps = remove_if_substring(deps, ignores);

    tracing::info!(
        total,
        kept = deps.len(),
        "filtered standard library and ignored packages"
    );

    if deps.is_empty() {
        return Ok(Vec::new());
    }
    resolver.packages(&deps).await
}

/// Drop every element of `list` that equals an element of `exclude`, and
/// the cgo pseudo-package `C`.
pub fn remove_if_equals(list: Vec<String>, exclude: &[String]) -> Vec<String> {
    list.into_iter()
        .filter(|a| a != "C" && !exclude.iter().any(|b| a == b))
        .collect()
}

/// Drop every element of `list` containing any of `patterns`.
pub fn remove_if_substring(list: Vec<String>, patterns: &[String]) -> Vec<String> {
    list.into_iter()
        .filter(|a| !patterns.iter().any(|p| a.contains(p.as_str())))
        .collect()
}
