use async_graphql::{Context, Object, Result};

use super::dto::{RepoStateObject, RepositoryObject, SettingsObject, UserObject};
use super::{app, current_user, remote_access, require_user};
use crate::server::response::{ApiError, StoreResultExt};
use crate::types::ServiceName;
use crate::workspace::CloneOutcome;
use crate::workspace::path::{resolve_workspace_path, service_for_url};

#[derive(Default)]
pub struct QueryRoot;

#[Object]
impl QueryRoot {
    /// The logged in user, or `null` for anonymous sessions.
    async fn me(&self, ctx: &Context<'_>) -> Result<Option<UserObject>> {
        let Some(user) = current_user(ctx) else {
            return Ok(None);
        };
        let state = app(ctx)?;

        let accounts = state
            .store
            .list_service_accounts(user.id)
            .api_err("Failed to load service accounts")?;
        Ok(Some(UserObject::new(user, accounts)))
    }

    async fn get_all_users(&self, ctx: &Context<'_>) -> Result<Vec<UserObject>> {
        let state = app(ctx)?;
        match current_user(ctx) {
            Some(user) if user.role.is_admin() => {}
            _ => return Err(ApiError::forbidden("Not authorized").into()),
        }

        let users = state.store.list_users().api_err("Failed to list users")?;
        let mut result = Vec::with_capacity(users.len());
        for user in &users {
            let accounts = state
                .store
                .list_service_accounts(user.id)
                .api_err("Failed to load service accounts")?;
            result.push(UserObject::new(user, accounts));
        }
        Ok(result)
    }

    async fn github_login_url(&self, ctx: &Context<'_>) -> Result<String> {
        login_url(ctx, ServiceName::Github)
    }

    #[graphql(name = "gitLabLoginUrl")]
    async fn gitlab_login_url(&self, ctx: &Context<'_>) -> Result<String> {
        login_url(ctx, ServiceName::Gitlab)
    }

    async fn bitbucket_login_url(&self, ctx: &Context<'_>) -> Result<String> {
        login_url(ctx, ServiceName::Bitbucket)
    }

    async fn is_github_connected(&self, ctx: &Context<'_>) -> Result<bool> {
        is_connected(ctx, ServiceName::Github)
    }

    #[graphql(name = "isGitLabConnected")]
    async fn is_gitlab_connected(&self, ctx: &Context<'_>) -> Result<bool> {
        is_connected(ctx, ServiceName::Gitlab)
    }

    async fn is_bitbucket_connected(&self, ctx: &Context<'_>) -> Result<bool> {
        is_connected(ctx, ServiceName::Bitbucket)
    }

    async fn get_repo_state(&self, ctx: &Context<'_>, url: String) -> Result<RepoStateObject> {
        let state = app(ctx)?;
        let user = require_user(ctx)?;

        let workspace = resolve_workspace_path(state.workspaces.root(), &url, &user.username)
            .map_err(ApiError::from)?;
        let repo_state = state
            .workspaces
            .repo_state(&workspace, &url)
            .await
            .map_err(ApiError::from)?;

        Ok(repo_state.into())
    }

    /// Clones the repository into the caller's workspace, pulling instead
    /// when it was cloned before.
    async fn clone_repository(&self, ctx: &Context<'_>, url: String) -> Result<String> {
        let state = app(ctx)?;
        let user = require_user(ctx)?;

        let workspace = resolve_workspace_path(state.workspaces.root(), &url, &user.username)
            .map_err(ApiError::from)?;
        let service = service_for_url(&url);
        let access = remote_access(state, user, service, &url).await?;
        let source = access.remote.as_deref().unwrap_or(&url);

        let outcome = state
            .workspaces
            .clone_repository(&workspace, source, &access.identity)
            .await
            .map_err(ApiError::from)?;

        if let (CloneOutcome::Cloned, Some(service)) = (outcome, service) {
            state
                .store
                .record_repository(user.id, service, &url)
                .api_err("Failed to record repository")?;
        }

        tracing::info!(user = %user.username, url = %url, ?outcome, "repository ready");
        Ok("Cloned".to_string())
    }

    /// The caller's GitHub access token.
    async fn current_token(&self, ctx: &Context<'_>) -> Result<Option<String>> {
        let state = app(ctx)?;
        let Some(user) = current_user(ctx) else {
            return Ok(None);
        };

        let token = state
            .tokens
            .get_access_token(user.id, ServiceName::Github)
            .await
            .map_err(ApiError::from)?;
        Ok(token)
    }

    /// Repositories of every service the caller has connected.
    async fn get_repo_list_from_service(&self, ctx: &Context<'_>) -> Result<Vec<RepositoryObject>> {
        let state = app(ctx)?;
        let user = require_user(ctx)?;

        let services = state.tokens.services(user.id).map_err(ApiError::from)?;
        let mut repositories = Vec::new();

        for service in services {
            let Some(token) = state
                .tokens
                .get_access_token(user.id, service)
                .await
                .map_err(ApiError::from)?
            else {
                continue;
            };

            let service_username = match state
                .store
                .get_service_account(user.id, service)
                .api_err("Failed to load service account")?
            {
                Some(account) => account.username,
                None => {
                    state
                        .oauth
                        .fetch_user(service, &token)
                        .await
                        .map_err(ApiError::from)?
                        .username
                }
            };

            let listed = state
                .oauth
                .list_repositories(service, &token, &service_username)
                .await
                .map_err(ApiError::from)?;
            repositories.extend(listed.into_iter().map(RepositoryObject::from));
        }

        Ok(repositories)
    }

    async fn get_settings(&self, ctx: &Context<'_>) -> Result<SettingsObject> {
        let state = app(ctx)?;
        let settings = state.settings.load().await.map_err(ApiError::from)?;
        Ok(settings.into())
    }
}

fn login_url(ctx: &Context<'_>, service: ServiceName) -> Result<String> {
    let state = app(ctx)?;
    Ok(state.oauth.login_url(service).map_err(ApiError::from)?)
}

fn is_connected(ctx: &Context<'_>, service: ServiceName) -> Result<bool> {
    let state = app(ctx)?;
    let Some(user) = current_user(ctx) else {
        return Ok(false);
    };
    Ok(state
        .tokens
        .is_connected(user.id, service)
        .map_err(ApiError::from)?)
}
