//! Last-commit metadata read from `git log`.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use crate::command;
use crate::error::{AuditError, AuditResult};
use crate::models::CommitInfo;

/// `git log` format producing a header block (`Key: value` lines), a blank
/// line, and the commit body.
pub const LOG_FORMAT: &str = "--format=Commit: %H%nDate: %aD%nSubject: %s%n%n%b%n";

#[async_trait]
pub trait CommitProvider: Send + Sync {
    /// Raw record for the most recent commit affecting `dir`.
    async fn last_commit_record(&self, dir: &Path) -> AuditResult<String>;

    /// Commits between `origin/master` and `hash`.
    async fn commits_behind(&self, dir: &Path, hash: &str) -> AuditResult<u32>;
}

/// Reads commits with the `git` executable.
pub struct GitLog {
    timeout: Duration,
}

impl GitLog {
    pub fn new(timeout: Duration) -> Self {
        GitLog { timeout }
    }
}

#[async_trait]
impl CommitProvider for GitLog {
    async fn last_commit_record(&self, dir: &Path) -> AuditResult<String> {
        command::run("git", &["log", "-1", LOG_FORMAT], Some(dir), self.timeout).await
    }

    async fn commits_behind(&self, dir: &Path, hash: &str) -> AuditResult<u32> {
        let range = format!("origin/master...{}", hash);
        let out = command::run(
            "git",
            &["rev-list", "--count", &range],
            Some(dir),
            self.timeout,
        )
        .await?;
        out.trim()
            .parse()
            .map_err(|_| AuditError::CommitParse(format!("rev-list count {:?}", out.trim())))
    }
}

/// Fetch and parse the last commit in `dir`.
///
/// Failures are logged here; callers treat them as "no commit".
pub async fn last_commit(provider: &dyn CommitProvider, dir: &Path) -> AuditResult<CommitInfo> {
    tracing::debug!(dir = %dir.display(), "reading last commit");
    let record = provider.last_commit_record(dir).await.map_err(|e| {
        tracing::warn!(dir = %dir.display(), error = %e, "git log failed");
        e
    })?;
    parse_commit_record(&record).map_err(|e| {
        tracing::warn!(dir = %dir.display(), error = %e, "git log parse failed");
        e
    })
}

/// Parse a header-style record into a [`CommitInfo`]. The body after the
/// first blank line is ignored.
pub fn parse_commit_record(record: &str) -> AuditResult<CommitInfo> {
    let headers = parse_headers(record)?;
    let get = |key: &str| headers.get(key).cloned().unwrap_or_default();

    Ok(CommitInfo {
        commit: get("commit"),
        date: get("date"),
        subject: get("subject"),
    })
}

/// Header keys are lowercased; a line starting with whitespace continues
/// the previous value.
fn parse_headers(record: &str) -> AuditResult<HashMap<String, String>> {
    let mut headers: HashMap<String, String> = HashMap::new();
    let mut last_key: Option<String> = None;
    let mut terminated = false;

    for line in record.lines() {
        if line.trim().is_empty() {
            terminated = true;
            break;
        }

        if line.starts_with(' ') || line.starts_with('\t') {
            let key = last_key
                .as_ref()
                .ok_or_else(|| AuditError::CommitParse("continuation before first header".into()))?;
            if let Some(value) = headers.get_mut(key) {
                value.push(' ');
                value.push_str(line.trim());
            }
            continue;
        }

        let (key, value) = line
            .split_once(':')
            .ok_or_else(|| AuditError::CommitParse(format!("malformed header line {:?}", line)))?;
        let key = key.trim().to_ascii_lowercase();
        if key.is_empty() || key.contains(' ') {
            return Err(AuditError::CommitParse(format!("malformed header key {:?}", line)));
        }
        headers.entry(key.clone()).or_insert_with(|| value.trim().to_string());
        last_key = Some(key);
    }

    if headers.is_empty() && !terminated {
        return Err(AuditError::CommitParse("empty record".into()));
    }
    Ok(headers)
}
