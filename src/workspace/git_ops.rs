use std::path::Path;

use git2::build::CheckoutBuilder;
use git2::{
    BranchType, Commit, ErrorCode, Oid, Reference, Repository, RepositoryState, ResetType,
    Signature,
};

use crate::types::CommitIdentity;

use super::GitError;

pub const ORIGIN: &str = "origin";

pub fn open_repo(path: &Path) -> Result<Repository, GitError> {
    Repository::open(path).map_err(|_| GitError::NotCloned(path.display().to_string()))
}

/// HEAD reference, or `None` while the current branch has no commits.
fn head(repo: &Repository) -> Result<Option<Reference<'_>>, GitError> {
    match repo.head() {
        Ok(head) => Ok(Some(head)),
        Err(e) if e.code() == ErrorCode::UnbornBranch || e.code() == ErrorCode::NotFound => {
            Ok(None)
        }
        Err(e) => Err(GitError::Git(e)),
    }
}

pub fn head_commit(repo: &Repository) -> Result<Option<Commit<'_>>, GitError> {
    match head(repo)? {
        Some(reference) => Ok(Some(reference.peel_to_commit()?)),
        None => Ok(None),
    }
}

/// Name of the checked out branch. An unborn HEAD still names its branch.
pub fn current_branch(repo: &Repository) -> Result<Option<String>, GitError> {
    if let Some(reference) = head(repo)? {
        if !reference.is_branch() {
            return Ok(None);
        }
        return Ok(reference.shorthand().map(String::from));
    }

    let head_ref = repo.find_reference("HEAD")?;
    Ok(head_ref
        .symbolic_target()
        .and_then(|t| t.strip_prefix("refs/heads/"))
        .map(String::from))
}

pub fn local_branches(repo: &Repository) -> Result<Vec<String>, GitError> {
    let mut names = Vec::new();
    for branch in repo.branches(Some(BranchType::Local))? {
        let (branch, _) = branch?;
        if let Some(name) = branch.name()? {
            names.push(name.to_string());
        }
    }
    names.sort();
    Ok(names)
}

pub fn head_message(repo: &Repository) -> Result<Option<String>, GitError> {
    Ok(head_commit(repo)?.and_then(|c| c.message().map(|m| m.trim_end().to_string())))
}

#[must_use]
pub fn is_valid_branch_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('-')
        && Reference::is_valid_name(&format!("refs/heads/{name}"))
}

/// Checks out `name`, creating it from HEAD when it does not exist yet.
pub fn switch_branch(repo: &Repository, name: &str) -> Result<String, GitError> {
    if !is_valid_branch_name(name) {
        return Err(GitError::InvalidBranch(name.to_string()));
    }

    let full_ref = format!("refs/heads/{name}");

    let Some(commit) = head_commit(repo)? else {
        repo.set_head(&full_ref)?;
        return Ok(name.to_string());
    };

    if current_branch(repo)?.as_deref() == Some(name) {
        return Ok(name.to_string());
    }

    let branch = match repo.find_branch(name, BranchType::Local) {
        Ok(branch) => branch,
        Err(e) if e.code() == ErrorCode::NotFound => repo.branch(name, &commit, false)?,
        Err(e) => return Err(GitError::Git(e)),
    };

    let target = branch.get().peel_to_commit()?;
    repo.checkout_tree(target.as_object(), Some(CheckoutBuilder::new().safe()))?;
    repo.set_head(&full_ref)?;

    Ok(name.to_string())
}

fn signature(identity: &CommitIdentity) -> Result<Signature<'static>, GitError> {
    Ok(Signature::now(&identity.name, &identity.email)?)
}

/// Stages `paths` and commits them on HEAD, with MERGE_HEAD as a second parent
/// when `merge` is set.
pub fn commit_paths(
    repo: &Repository,
    paths: &[&str],
    message: &str,
    identity: &CommitIdentity,
    merge: bool,
) -> Result<Oid, GitError> {
    let mut index = repo.index()?;
    for path in paths {
        index.add_path(Path::new(path))?;
    }
    index.write()?;

    if index.has_conflicts() {
        return Err(GitError::MergeConflict(workdir_name(repo)));
    }

    let tree = repo.find_tree(index.write_tree()?)?;
    let sig = signature(identity)?;

    let mut parents: Vec<Commit<'_>> = Vec::new();
    if let Some(commit) = head_commit(repo)? {
        parents.push(commit);
    }
    if merge {
        let merge_head = repo.find_reference("MERGE_HEAD")?.peel_to_commit()?;
        parents.push(merge_head);
    }
    let parent_refs: Vec<&Commit<'_>> = parents.iter().collect();

    let oid = repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parent_refs)?;

    if merge {
        repo.cleanup_state()?;
    }

    Ok(oid)
}

#[must_use]
pub fn merge_in_progress(repo: &Repository) -> bool {
    matches!(repo.state(), RepositoryState::Merge)
}

pub fn has_conflicts(repo: &Repository) -> Result<bool, GitError> {
    Ok(repo.index()?.has_conflicts())
}

#[must_use]
pub fn has_origin(repo: &Repository) -> bool {
    repo.find_remote(ORIGIN).is_ok()
}

/// Points `origin` at `url`, creating the remote when missing.
pub fn set_origin_url(repo: &Repository, url: &str) -> Result<(), GitError> {
    if has_origin(repo) {
        repo.remote_set_url(ORIGIN, url)?;
    } else {
        repo.remote(ORIGIN, url)?;
    }
    Ok(())
}

/// Hard reset to HEAD. Returns the same summary line `git reset --hard` prints.
pub fn reset_hard(repo: &Repository) -> Result<String, GitError> {
    let commit = head_commit(repo)?.ok_or(GitError::NoCommits)?;

    repo.reset(commit.as_object(), ResetType::Hard, None)?;
    repo.cleanup_state()?;

    let short = commit.as_object().short_id()?;
    Ok(format!(
        "HEAD is now at {} {}",
        short.as_str().unwrap_or_default(),
        commit.summary().unwrap_or_default()
    ))
}

/// Restores one path from HEAD. Paths HEAD does not know are removed.
pub fn checkout_path(repo: &Repository, relative: &str) -> Result<(), GitError> {
    let commit = head_commit(repo)?.ok_or(GitError::NoCommits)?;
    let tree = commit.tree()?;

    if tree.get_path(Path::new(relative)).is_err() {
        if let Some(workdir) = repo.workdir() {
            let path = workdir.join(relative);
            let is_file = path.symlink_metadata().is_ok_and(|m| m.is_file());
            if !is_file {
                return Ok(());
            }

            let inside = path
                .parent()
                .and_then(|p| p.canonicalize().ok())
                .zip(workdir.canonicalize().ok())
                .is_some_and(|(parent, root)| parent.starts_with(root));
            if !inside {
                return Err(GitError::InvalidPath(relative.to_string()));
            }
            std::fs::remove_file(path)?;
        }
        return Ok(());
    }

    let mut checkout = CheckoutBuilder::new();
    checkout.force().update_index(true).path(relative);
    repo.checkout_head(Some(&mut checkout))?;
    Ok(())
}

fn workdir_name(repo: &Repository) -> String {
    repo.workdir()
        .map(|p| p.display().to_string())
        .unwrap_or_default()
}
