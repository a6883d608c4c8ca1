use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use reqwest::Url;
use tokio::process::Command;

use super::GitError;

pub const DEFAULT_GIT_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug)]
pub struct GitOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl GitOutput {
    /// Combined stdout and stderr, as git splits conflict reports across both.
    #[must_use]
    pub fn text(&self) -> String {
        match (self.stdout.trim(), self.stderr.trim()) {
            ("", err) => err.to_string(),
            (out, "") => out.to_string(),
            (out, err) => format!("{out}\n{err}"),
        }
    }
}

/// Runs `git <args>` in `dir` with prompts disabled and a hard timeout.
pub async fn run_git(
    dir: Option<&Path>,
    args: &[&str],
    timeout: Duration,
) -> Result<GitOutput, GitError> {
    let mut cmd = Command::new("git");
    cmd.args(args);

    if let Some(dir) = dir {
        cmd.current_dir(dir);
    }

    cmd.env("GIT_TERMINAL_PROMPT", "0");
    cmd.env("LC_ALL", "C");
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    cmd.kill_on_drop(true);

    let subcommand = args
        .iter()
        .find(|a| !a.starts_with('-') && !a.contains('='))
        .copied()
        .unwrap_or("git");
    tracing::debug!(command = subcommand, dir = ?dir, "running git");

    let child = cmd.spawn()?;

    let output = tokio::time::timeout(timeout, child.wait_with_output())
        .await
        .map_err(|_| {
            GitError::Command(format!(
                "git {subcommand} timed out after {}s",
                timeout.as_secs()
            ))
        })??;

    Ok(GitOutput {
        success: output.status.success(),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    })
}

/// Hides the password of an authenticated remote wherever git echoed it back.
#[must_use]
pub fn redact_credentials(text: &str, remote: Option<&str>) -> String {
    let secret = remote
        .and_then(|r| Url::parse(r).ok())
        .and_then(|u| u.password().map(str::to_string));

    match secret {
        Some(secret) if !secret.is_empty() => text.replace(&secret, "***"),
        _ => text.to_string(),
    }
}
