#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Arc, Mutex};

use async_graphql::{Request, Variables};
use async_trait::async_trait;
use serde_json::Value;
use tempfile::TempDir;

use amandus::auth::{PasswordHasher, Session};
use amandus::config::ServerConfig;
use amandus::error::{Error, Result};
use amandus::oauth::{OAuthProvider, RemoteRepository, ServiceUser};
use amandus::server::{AppState, graphql};
use amandus::store::{SqliteStore, Store};
use amandus::tokens::{AccessTokenResponse, TokenRefresher};
use amandus::types::{NewUser, ServiceName, User, UserRole};

pub const PASSWORD: &str = "mypAssword?45";

/// Stands in for the git services: every code is accepted and every refresh
/// fails.
#[derive(Default)]
pub struct MockProvider {
    pub exchanged: Mutex<Vec<(ServiceName, String)>>,
}

#[async_trait]
impl OAuthProvider for MockProvider {
    fn login_url(&self, service: ServiceName) -> Result<String> {
        Err(Error::Config(format!(
            "{} client id or callback url not set",
            service.display_name()
        )))
    }

    async fn exchange_code(&self, service: ServiceName, code: &str) -> Result<AccessTokenResponse> {
        self.exchanged
            .lock()
            .expect("exchanged lock")
            .push((service, code.to_string()));
        Ok(AccessTokenResponse {
            access_token: format!("{service}-token-{code}"),
            ..AccessTokenResponse::default()
        })
    }

    async fn refresh(
        &self,
        _service: ServiceName,
        _refresh_token: &str,
    ) -> Result<AccessTokenResponse> {
        Err(Error::OAuth("refresh not supported".to_string()))
    }

    async fn fetch_user(&self, service: ServiceName, _access_token: &str) -> Result<ServiceUser> {
        Ok(ServiceUser {
            service,
            username: format!("{service}_username"),
            email: Some(format!("user@{service}mail.com")),
            reposurl: format!("https://{}/repos", service.host()),
        })
    }

    async fn list_repositories(
        &self,
        service: ServiceName,
        _access_token: &str,
        service_username: &str,
    ) -> Result<Vec<RemoteRepository>> {
        Ok(vec![RemoteRepository {
            id: "1".to_string(),
            name: "repo".to_string(),
            full_name: format!("{service_username}/repo"),
            clone_url: format!("https://{}/{service_username}/repo.git", service.host()),
            html_url: format!("https://{}/{service_username}/repo", service.host()),
            service,
        }])
    }
}

#[async_trait]
impl TokenRefresher for MockProvider {
    async fn refresh(
        &self,
        service: ServiceName,
        refresh_token: &str,
    ) -> Result<AccessTokenResponse> {
        OAuthProvider::refresh(self, service, refresh_token).await
    }
}

pub struct TestApp {
    pub temp_dir: TempDir,
    pub state: Arc<AppState>,
    pub provider: Arc<MockProvider>,
}

impl TestApp {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("create temp dir");
        let config = ServerConfig {
            data_dir: temp_dir.path().join("data"),
            jwt_secret: Some("test-secret".to_string()),
            ..ServerConfig::default()
        };
        std::fs::create_dir_all(config.repositories_dir()).expect("create repositories dir");

        let store = SqliteStore::open_in_memory().expect("open store");
        store.initialize().expect("initialize store");

        let provider = Arc::new(MockProvider::default());
        let state = Arc::new(AppState::new(config, Arc::new(store), provider.clone()));

        Self {
            temp_dir,
            state,
            provider,
        }
    }

    pub fn repositories(&self) -> PathBuf {
        self.state.workspaces.root().to_path_buf()
    }

    pub fn create_user(&self, username: &str, role: UserRole) -> User {
        let password_hash = PasswordHasher::new().hash(PASSWORD).expect("hash password");
        self.state
            .store
            .create_user(&NewUser {
                username: username.to_string(),
                email: format!("{username}@test.fi"),
                password_hash,
                role,
            })
            .expect("create user")
    }

    pub fn session(user: &User) -> Session {
        Session {
            user: Some(user.clone()),
            reissued: None,
        }
    }

    /// Runs a GraphQL document and returns the response as JSON.
    pub async fn run(&self, user: Option<&User>, query: &str, variables: Value) -> Value {
        let session = user.map(Self::session).unwrap_or_default();
        let request = Request::new(query).variables(Variables::from_json(variables));
        let response = graphql::execute(&self.state, session, request).await;
        serde_json::to_value(&response).expect("serialize response")
    }
}

/// Messages of all errors in a GraphQL response.
pub fn error_messages(response: &Value) -> Vec<String> {
    response["errors"]
        .as_array()
        .map(|errors| {
            errors
                .iter()
                .filter_map(|e| e["message"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

pub fn error_codes(response: &Value) -> Vec<String> {
    response["errors"]
        .as_array()
        .map(|errors| {
            errors
                .iter()
                .filter_map(|e| e["extensions"]["code"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

/// Runs the git binary in `dir` with a fixed identity.
pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(["-c", "init.defaultBranch=master", "-c", "commit.gpgsign=false"])
        .args(args)
        .current_dir(dir)
        .env("GIT_AUTHOR_NAME", "Remote Author")
        .env("GIT_AUTHOR_EMAIL", "remote@test.fi")
        .env("GIT_COMMITTER_NAME", "Remote Author")
        .env("GIT_COMMITTER_EMAIL", "remote@test.fi")
        .env("LC_ALL", "C")
        .output()
        .expect("run git");
    assert!(
        output.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// A bare repository at `<base>/remote/owner/repo.git` whose master holds
/// `file.txt`, plus a working clone at `<base>/upstream` to push from.
pub struct Remote {
    pub bare: PathBuf,
    pub upstream: PathBuf,
}

impl Remote {
    pub fn create(base: &Path) -> Self {
        let seed = base.join("seed");
        std::fs::create_dir_all(&seed).expect("create seed dir");
        git(&seed, &["init"]);
        std::fs::write(seed.join("file.txt"), "base\n").expect("write seed file");
        git(&seed, &["add", "file.txt"]);
        git(&seed, &["commit", "-m", "Initial commit"]);

        let bare = base.join("remote/owner/repo.git");
        std::fs::create_dir_all(bare.parent().expect("bare parent")).expect("create remote dir");
        git(
            base,
            &["clone", "--bare", path_str(&seed), path_str(&bare)],
        );

        let upstream = base.join("upstream");
        git(base, &["clone", path_str(&bare), path_str(&upstream)]);

        Self { bare, upstream }
    }

    pub fn url(&self) -> String {
        format!("file://{}", self.bare.display())
    }

    /// Commits `content` to `file` upstream and pushes it to the bare repository.
    pub fn push_change(&self, file: &str, content: &str, message: &str) {
        std::fs::write(self.upstream.join(file), content).expect("write upstream file");
        git(&self.upstream, &["add", file]);
        git(&self.upstream, &["commit", "-m", message]);
        git(&self.upstream, &["push", "origin", "master"]);
    }

    pub fn head_message(&self) -> String {
        git(&self.bare, &["log", "-1", "--format=%s", "master"])
    }
}

pub fn path_str(path: &Path) -> &str {
    path.to_str().expect("utf-8 path")
}

/// An empty repository at the workspace of `owner/repo` on GitHub for `username`.
pub fn init_github_workspace(app: &TestApp, username: &str) -> PathBuf {
    let workspace = app
        .repositories()
        .join(username)
        .join("github")
        .join("owner")
        .join("repo");
    std::fs::create_dir_all(&workspace).expect("create workspace");
    git2::Repository::init(&workspace).expect("init workspace");
    workspace
}
