use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;

use crate::types::RepoFile;

use super::GitError;
use super::path::is_git_metadata;

/// A file to write into a workspace, relative to the workspace root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub relative: String,
    pub content: String,
}

/// Writes `content` to `relative` inside `workspace`. Paths into `.git`,
/// through symlinks or out of the workspace are refused.
pub async fn write_file(workspace: &Path, relative: &str, content: &str) -> Result<(), GitError> {
    let path = checked_target(workspace, relative).await?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;

        let root = fs::canonicalize(workspace).await?;
        if !fs::canonicalize(parent).await?.starts_with(&root) {
            return Err(GitError::InvalidPath(relative.to_string()));
        }
    }

    fs::write(&path, content).await?;
    Ok(())
}

/// Resolves `relative` under `workspace` without following any symlink
/// already present on the way.
async fn checked_target(workspace: &Path, relative: &str) -> Result<PathBuf, GitError> {
    let invalid = || GitError::InvalidPath(relative.to_string());

    let segments: Vec<&str> = relative.split('/').collect();
    if !segments.iter().all(|s| is_plain_segment(s)) {
        return Err(invalid());
    }

    let mut path = workspace.to_path_buf();
    for segment in segments {
        path.push(segment);
        match fs::symlink_metadata(&path).await {
            Ok(meta) if meta.file_type().is_symlink() => return Err(invalid()),
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => break,
            Err(e) => return Err(e.into()),
        }
    }

    Ok(workspace.join(relative))
}

fn is_plain_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment != "."
        && segment != ".."
        && !segment.contains('\\')
        && !is_git_metadata(segment)
}

pub async fn write_files(workspace: &Path, changes: &[FileChange]) -> Result<(), GitError> {
    for change in changes {
        write_file(workspace, &change.relative, &change.content).await?;
    }
    Ok(())
}

/// Reads every file under `workspace`, skipping `.git`. Names are relative to
/// `root`, sorted.
pub async fn read_workspace_files(
    root: &Path,
    workspace: &Path,
) -> Result<Vec<RepoFile>, GitError> {
    let mut pending: Vec<PathBuf> = vec![workspace.to_path_buf()];
    let mut files = Vec::new();

    while let Some(dir) = pending.pop() {
        let mut entries = fs::read_dir(&dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let file_type = entry.file_type().await?;

            if file_type.is_dir() {
                if entry.file_name() != ".git" {
                    pending.push(path);
                }
                continue;
            }

            if !file_type.is_file() {
                continue;
            }

            let bytes = fs::read(&path).await?;
            let name = path
                .strip_prefix(root)
                .unwrap_or(&path)
                .to_string_lossy()
                .replace('\\', "/");

            files.push(RepoFile {
                name,
                content: String::from_utf8_lossy(&bytes).to_string(),
            });
        }
    }

    files.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(files)
}
