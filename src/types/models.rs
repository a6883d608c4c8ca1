use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ServiceName, UserRole};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip)]
    pub password_hash: String,
    pub role: UserRole,
    pub created_on: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_login: Option<DateTime<Utc>>,
}

/// Fields needed to insert a user; the store assigns the id.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: UserRole,
}

/// A user's account on an external git service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceAccount {
    pub user_id: i64,
    pub service: ServiceName,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub reposurl: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryRecord {
    pub id: i64,
    pub user_id: i64,
    pub service: ServiceName,
    pub web_url: String,
}

/// A file inside a workspace. `name` is relative to the repositories root,
/// e.g. `testuser/github/owner/repo/tests/login.robot`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoFile {
    pub name: String,
    pub content: String,
}

/// Snapshot of a workspace as shown in the editor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoState {
    pub current_branch: String,
    pub files: Vec<RepoFile>,
    pub branches: Vec<String>,
    pub url: String,
    pub commit_message: String,
}

/// Identity a commit is authored with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitIdentity {
    pub name: String,
    pub email: String,
}

impl CommitIdentity {
    /// Prefers the linked service account, falling back to the Amandus account.
    #[must_use]
    pub fn resolve(user: &User, account: Option<&ServiceAccount>) -> Self {
        let name = account
            .map(|a| a.username.clone())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| user.username.clone());
        let email = account
            .and_then(|a| a.email.clone())
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| user.email.clone());
        Self { name, email }
    }
}
