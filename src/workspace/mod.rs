//! Per-user git working trees under the repositories root.
//!
//! Local operations (branches, commits, resets) go through libgit2. Network
//! operations (clone, pull, push) shell out to the `git` binary so that the
//! user's credentials and merge machinery behave exactly like a terminal
//! session.

mod commit;
mod files;
mod git_ops;
mod locks;
pub mod path;
mod process;

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::types::{CommitIdentity, RepoState};

pub use commit::{
    MAX_COMMIT_MESSAGE_LEN, make_commit_message, sanitize_commit_message, truncate_commit_message,
};
pub use files::FileChange;
pub use locks::WorkspaceLocks;
pub use process::DEFAULT_GIT_TIMEOUT;

#[derive(Debug, Error)]
pub enum GitError {
    #[error("Repository has not been cloned: {0}")]
    NotCloned(String),
    #[error("Merge conflict in {0}")]
    MergeConflict(String),
    #[error("Repository has no commits")]
    NoCommits,
    #[error("Invalid branch name: {0}")]
    InvalidBranch(String),
    #[error("Invalid file path: {0}")]
    InvalidPath(String),
    #[error("{0}")]
    Command(String),
    #[error("{}", .0.message())]
    Git(#[from] git2::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloneOutcome {
    Cloned,
    Pulled,
}

/// Output fragments git prints when a pull cannot complete without the user
/// resolving files by hand.
const CONFLICT_MARKERS: &[&str] = &[
    "CONFLICT",
    "Merge conflict",
    "unmerged files",
    "would be overwritten by merge",
];

fn is_merge_conflict(output: &str) -> bool {
    CONFLICT_MARKERS.iter().any(|m| output.contains(m))
}

pub struct Workspaces {
    root: PathBuf,
    git_timeout: Duration,
    locks: WorkspaceLocks,
}

impl Workspaces {
    pub fn new(root: impl Into<PathBuf>, git_timeout: Duration) -> Self {
        Self {
            root: root.into(),
            git_timeout,
            locks: WorkspaceLocks::new(),
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn exists(&self, workspace: &Path) -> bool {
        workspace.join(".git").exists()
    }

    /// Clones `source` into `workspace`, or pulls when the workspace already
    /// holds a repository. A failed clone leaves no directory behind.
    pub async fn clone_repository(
        &self,
        workspace: &Path,
        source: &str,
        identity: &CommitIdentity,
    ) -> Result<CloneOutcome, GitError> {
        let _guard = self.locks.lock(workspace).await;

        if self.exists(workspace) {
            self.pull_locked(workspace, identity, Some(source)).await?;
            return Ok(CloneOutcome::Pulled);
        }

        if let Some(parent) = workspace.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let target = workspace.to_string_lossy().to_string();
        let result = process::run_git(None, &["clone", source, target.as_str()], self.git_timeout)
            .await
            .and_then(|output| {
                if output.success {
                    Ok(())
                } else {
                    Err(GitError::Command(process::redact_credentials(
                        &output.text(),
                        Some(source),
                    )))
                }
            });

        if let Err(e) = result {
            remove_partial_clone(workspace).await;
            return Err(e);
        }

        tracing::info!(workspace = %workspace.display(), "cloned repository");
        Ok(CloneOutcome::Cloned)
    }

    /// Pulls the current branch from `origin`. `remote` replaces the origin URL
    /// first when given.
    pub async fn pull(
        &self,
        workspace: &Path,
        identity: &CommitIdentity,
        remote: Option<&str>,
    ) -> Result<(), GitError> {
        let _guard = self.locks.lock(workspace).await;
        self.pull_locked(workspace, identity, remote).await
    }

    async fn pull_locked(
        &self,
        workspace: &Path,
        identity: &CommitIdentity,
        remote: Option<&str>,
    ) -> Result<(), GitError> {
        let branch = {
            let repo = git_ops::open_repo(workspace)?;

            if git_ops::merge_in_progress(&repo) || git_ops::has_conflicts(&repo)? {
                return Err(GitError::MergeConflict(workspace.display().to_string()));
            }
            if let Some(url) = remote {
                git_ops::set_origin_url(&repo, url)?;
            }

            git_ops::current_branch(&repo)?.ok_or(GitError::NoCommits)?
        };

        let user_name = format!("user.name={}", identity.name);
        let user_email = format!("user.email={}", identity.email);
        let output = process::run_git(
            Some(workspace),
            &[
                "-c",
                user_name.as_str(),
                "-c",
                user_email.as_str(),
                "pull",
                "--no-rebase",
                "--no-edit",
                git_ops::ORIGIN,
                branch.as_str(),
            ],
            self.git_timeout,
        )
        .await?;

        let text = output.text();
        if is_merge_conflict(&text) {
            tracing::warn!(workspace = %workspace.display(), "pull stopped on merge conflict");
            return Err(GitError::MergeConflict(workspace.display().to_string()));
        }
        if !output.success {
            return Err(GitError::Command(process::redact_credentials(&text, remote)));
        }

        Ok(())
    }

    pub async fn switch_branch(&self, workspace: &Path, name: &str) -> Result<String, GitError> {
        let _guard = self.locks.lock(workspace).await;
        let repo = git_ops::open_repo(workspace)?;
        git_ops::switch_branch(&repo, name)
    }

    /// Writes `changes`, commits them on `branch` and pushes when the
    /// workspace has an `origin`.
    pub async fn save_changes(
        &self,
        workspace: &Path,
        changes: &[FileChange],
        branch: &str,
        message: &str,
        identity: &CommitIdentity,
        remote: Option<&str>,
    ) -> Result<(), GitError> {
        let _guard = self.locks.lock(workspace).await;

        if !git_ops::is_valid_branch_name(branch) {
            return Err(GitError::InvalidBranch(branch.to_string()));
        }
        git_ops::open_repo(workspace)?;
        files::write_files(workspace, changes).await?;

        let push = {
            let repo = git_ops::open_repo(workspace)?;
            git_ops::switch_branch(&repo, branch)?;
            if let Some(url) = remote {
                git_ops::set_origin_url(&repo, url)?;
            }

            let paths: Vec<&str> = changes.iter().map(|c| c.relative.as_str()).collect();
            git_ops::commit_paths(&repo, &paths, message, identity, false)?;
            git_ops::has_origin(&repo)
        };

        if push {
            self.push(workspace, branch, remote).await?;
        }
        Ok(())
    }

    /// Commits resolved files on top of an interrupted merge and pushes.
    pub async fn save_merge_edit(
        &self,
        workspace: &Path,
        changes: &[FileChange],
        message: &str,
        identity: &CommitIdentity,
        remote: Option<&str>,
    ) -> Result<(), GitError> {
        let _guard = self.locks.lock(workspace).await;

        git_ops::open_repo(workspace)?;
        files::write_files(workspace, changes).await?;

        let branch = {
            let repo = git_ops::open_repo(workspace)?;
            if let Some(url) = remote {
                git_ops::set_origin_url(&repo, url)?;
            }

            let merging = git_ops::merge_in_progress(&repo);
            let paths: Vec<&str> = changes.iter().map(|c| c.relative.as_str()).collect();
            git_ops::commit_paths(&repo, &paths, message, identity, merging)?;

            git_ops::has_origin(&repo)
                .then(|| git_ops::current_branch(&repo))
                .transpose()?
                .flatten()
        };

        if let Some(branch) = branch {
            self.push(workspace, &branch, remote).await?;
        }
        Ok(())
    }

    /// Commits a file that was previously saved locally, on the current branch.
    pub async fn commit_local_changes(
        &self,
        workspace: &Path,
        relative: &str,
        message: &str,
        identity: &CommitIdentity,
        remote: Option<&str>,
    ) -> Result<(), GitError> {
        let _guard = self.locks.lock(workspace).await;

        let branch = {
            let repo = git_ops::open_repo(workspace)?;
            if let Some(url) = remote {
                git_ops::set_origin_url(&repo, url)?;
            }

            git_ops::commit_paths(&repo, &[relative], message, identity, false)?;

            git_ops::has_origin(&repo)
                .then(|| git_ops::current_branch(&repo))
                .transpose()?
                .flatten()
        };

        if let Some(branch) = branch {
            self.push(workspace, &branch, remote).await?;
        }
        Ok(())
    }

    async fn push(
        &self,
        workspace: &Path,
        branch: &str,
        remote: Option<&str>,
    ) -> Result<(), GitError> {
        let output = process::run_git(
            Some(workspace),
            &["push", git_ops::ORIGIN, branch],
            self.git_timeout,
        )
        .await?;

        if !output.success {
            return Err(GitError::Command(process::redact_credentials(
                &output.text(),
                remote,
            )));
        }

        tracing::debug!(workspace = %workspace.display(), branch, "pushed");
        Ok(())
    }

    pub async fn reset_local_changes(&self, workspace: &Path) -> Result<String, GitError> {
        let _guard = self.locks.lock(workspace).await;
        let repo = git_ops::open_repo(workspace)?;
        git_ops::reset_hard(&repo)
    }

    pub async fn reset_file(&self, workspace: &Path, relative: &str) -> Result<(), GitError> {
        let _guard = self.locks.lock(workspace).await;
        let repo = git_ops::open_repo(workspace)?;
        git_ops::checkout_path(&repo, relative)
    }

    /// Writes a file without touching the index.
    pub async fn local_save(
        &self,
        workspace: &Path,
        relative: &str,
        content: &str,
    ) -> Result<(), GitError> {
        let _guard = self.locks.lock(workspace).await;
        git_ops::open_repo(workspace)?;
        files::write_file(workspace, relative, content).await
    }

    pub async fn repo_state(&self, workspace: &Path, url: &str) -> Result<RepoState, GitError> {
        let _guard = self.locks.lock(workspace).await;

        let (current_branch, branches, commit_message) = {
            let repo = git_ops::open_repo(workspace)?;
            (
                git_ops::current_branch(&repo)?.unwrap_or_default(),
                git_ops::local_branches(&repo)?,
                git_ops::head_message(&repo)?
                    .map(|m| truncate_commit_message(&m))
                    .unwrap_or_default(),
            )
        };

        let files = files::read_workspace_files(&self.root, workspace).await?;

        Ok(RepoState {
            current_branch,
            files,
            branches,
            url: url.to_string(),
            commit_message,
        })
    }
}

async fn remove_partial_clone(workspace: &Path) {
    match tokio::fs::remove_dir_all(workspace).await {
        Ok(()) => {
            tracing::debug!(workspace = %workspace.display(), "removed partial clone");
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(
                workspace = %workspace.display(),
                error = %e,
                "failed to remove partial clone"
            );
        }
    }
}
