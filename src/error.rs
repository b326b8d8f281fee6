use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Failures raised by the audit pipeline and its providers.
///
/// Only [`AuditError`]s coming out of package resolution abort a run; every
/// other variant is logged and degrades a single dependency record.
#[derive(Error, Debug)]
pub enum AuditError {
    #[error("no version control found for {dir} (search root {search_root})")]
    VcsUndetected { dir: PathBuf, search_root: PathBuf },

    #[error("cannot resolve repository root for {import_path}: {reason}")]
    RepoRootUnresolved { import_path: String, reason: String },

    #[error("`{command}` failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("`{command}` timed out after {timeout:?}")]
    CommandTimeout { command: String, timeout: Duration },

    #[error("malformed commit record: {0}")]
    CommitParse(String),

    #[error("no license file in {0}")]
    LicenseNotFound(PathBuf),

    #[error("unrecognized license text in {0}")]
    LicenseUnrecognized(PathBuf),

    #[error("package {0} not found")]
    PackageNotFound(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type AuditResult<T> = Result<T, AuditError>;
