use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::command;
use crate::error::{AuditError, AuditResult};
use crate::models::PackageRef;

/// Subset of `go list -json` output.
#[derive(Debug, Deserialize)]
struct GoPackage {
    #[serde(rename = "ImportPath")]
    import_path: String,
    #[serde(rename = "Root", default)]
    root: PathBuf,
    #[serde(rename = "Dir", default)]
    dir: PathBuf,
}

impl From<GoPackage> for PackageRef {
    fn from(p: GoPackage) -> Self {
        PackageRef {
            import_path: p.import_path,
            root: p.root,
            dir: p.dir,
        }
    }
}

/// Resolves packages by shelling out to `go list` in `workdir`.
pub struct GoList {
    workdir: PathBuf,
    timeout: Duration,
}

impl GoList {
    pub fn new(workdir: &Path, timeout: Duration) -> Self {
        GoList {
            workdir: workdir.to_path_buf(),
            timeout,
        }
    }

    async fn go(&self, args: &[&str]) -> AuditResult<String> {
        command::run("go", args, Some(&self.workdir), self.timeout).await
    }
}

#[async_trait]
impl super::PackageResolver for GoList {
    async fn std_packages(&self) -> AuditResult<Vec<String>> {
        Ok(lines(&self.go(&["list", "std"]).await?))
    }

    async fn deps(&self, pkgs: &[String]) -> AuditResult<Vec<String>> {
        let mut args = vec!["list", "-f", "{{join .Deps \"\\n\"}}"];
        args.extend(pkgs.iter().map(String::as_str));
        let unique: BTreeSet<String> = lines(&self.go(&args).await?).into_iter().collect();
        Ok(unique.into_iter().collect())
    }

    async fn packages(&self, import_paths: &[String]) -> AuditResult<Vec<PackageRef>> {
        let mut args = vec!["list", "-json"];
        args.extend(import_paths.iter().map(String::as_str));
        parse_package_stream(&self.go(&args).await?)
    }

    async fn package(&self, import_path: &str) -> AuditResult<PackageRef> {
        self.packages(&[import_path.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AuditError::PackageNotFound(import_path.to_string()))
    }
}

fn lines(out: &str) -> Vec<String> {
    out.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

/// `go list -json` prints one JSON object per package, back to back.
fn parse_package_stream(out: &str) -> AuditResult<Vec<PackageRef>> {
    let mut packages = Vec::new();
    for pkg in serde_json::Deserializer::from_str(out).into_iter::<GoPackage>() {
        packages.push(pkg?.into());
    }
    Ok(packages)
}
