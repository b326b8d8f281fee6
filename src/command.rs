use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use crate::error::{AuditError, AuditResult};

/// Run `program args…` and return its stdout.
///
/// Non-zero exit maps to [`AuditError::CommandFailed`] carrying stderr; the
/// child is killed if `timeout` elapses first.
pub async fn run(
    program: &str,
    args: &[&str],
    dir: Option<&Path>,
    timeout: Duration,
) -> AuditResult<String> {
    let command_line = format!("{} {}", program, args.join(" "));

    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = dir {
        cmd.current_dir(dir);
    }

    tracing::trace!(command = %command_line, dir = ?dir, "spawning");

    let output = match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(result) => result?,
        Err(_) => {
            return Err(AuditError::CommandTimeout {
                command: command_line,
                timeout,
            })
        }
    };

    if !output.status.success() {
        return Err(AuditError::CommandFailed {
            command: command_line,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
