use std::path::Path;

use async_graphql::{Context, Object, Result};

use super::dto::{
    AddServiceArgs, FileInput, ServiceAuthResponse, ServiceUserObject, SettingsInput, TokensObject,
};
use super::{
    FileTarget, app, current_user, file_remote_access, file_target, remote_access, require_user,
};
use crate::error::Error;
use crate::server::AppState;
use crate::server::response::{ApiError, StoreOptionExt, StoreResultExt};
use crate::server::validation::{parse_role, validate_email, validate_password, validate_username};
use crate::types::{NewUser, ServiceAccount, ServiceName, User, UserRole};
use crate::workspace::path::{resolve_workspace_path, service_for_url};
use crate::workspace::{FileChange, make_commit_message};

const UNSUPPORTED_SERVICE: &str =
    "Currently supported services are 'github', 'bitbucket' and 'gitlab'.";

#[derive(Default)]
pub struct MutationRoot;

#[Object]
impl MutationRoot {
    /// Session tokens are dropped by the client; nothing is kept server side.
    async fn logout(&self) -> String {
        "logout".to_string()
    }

    async fn register(
        &self,
        ctx: &Context<'_>,
        username: String,
        #[graphql(name = "user_role")] user_role: Option<String>,
        email: String,
        password: String,
    ) -> Result<TokensObject> {
        let state = app(ctx)?;

        validate_username(&username)?;
        validate_password(&password)?;
        validate_email(&email)?;

        let caller_is_admin = current_user(ctx).is_some_and(|u| u.role.is_admin());
        let role = match user_role.as_deref() {
            Some(role) if caller_is_admin => parse_role(role)?,
            _ => UserRole::NonAdmin,
        };

        let password_hash = state.hasher.hash(&password).map_err(ApiError::from)?;
        let user = state
            .store
            .create_user(&NewUser {
                username,
                email,
                password_hash,
                role,
            })
            .map_err(|e| match e {
                Error::AlreadyExists => ApiError::bad_request("Username already taken"),
                other => ApiError::from(other),
            })?;

        tracing::info!(user = %user.username, role = %user.role, "registered user");
        session_tokens(state, &user)
    }

    async fn login(
        &self,
        ctx: &Context<'_>,
        username: String,
        password: String,
    ) -> Result<TokensObject> {
        let state = app(ctx)?;
        let invalid = || ApiError::bad_request("Invalid username or password");

        let user = state
            .store
            .get_user_by_username(&username)
            .api_err("Failed to load user")?
            .ok_or_else(invalid)?;

        let valid = state
            .hasher
            .verify(&password, &user.password_hash)
            .map_err(ApiError::from)?;
        if !valid {
            return Err(invalid().into());
        }

        state
            .store
            .touch_last_login(user.id)
            .api_err("Failed to update last login")?;
        session_tokens(state, &user)
    }

    /// Applies the given changes to `username` and returns fresh tokens for
    /// the caller.
    async fn update_user(
        &self,
        ctx: &Context<'_>,
        username: String,
        new_username: Option<String>,
        new_email: Option<String>,
        new_password: Option<String>,
        new_user_role: Option<String>,
    ) -> Result<TokensObject> {
        let state = app(ctx)?;
        let caller = require_user(ctx)?;

        if caller.username != username && !caller.role.is_admin() {
            return Err(ApiError::forbidden("You have no permission to edit other users").into());
        }

        let mut target = state
            .store
            .get_user_by_username(&username)
            .api_err("Failed to load user")?
            .or_not_found(format!("No such a user: {username}"))?;

        let new_username = non_empty(new_username);
        let new_email = non_empty(new_email);
        let new_password = non_empty(new_password);
        let new_user_role = non_empty(new_user_role);

        if let Some(name) = &new_username {
            validate_username(name)?;
        }
        if let Some(email) = &new_email {
            validate_email(email)?;
        }
        if let Some(password) = &new_password {
            validate_password(password)?;
        }

        if let Some(role) = &new_user_role {
            if !caller.role.is_admin() {
                return Err(ApiError::forbidden("You have no permission to change roles").into());
            }
            target.role = parse_role(role)?;
        }
        if let Some(password) = &new_password {
            target.password_hash = state.hasher.hash(password).map_err(ApiError::from)?;
        }
        if let Some(email) = new_email {
            target.email = email;
        }
        let renamed = match new_username {
            Some(name) if name != target.username => {
                Some(std::mem::replace(&mut target.username, name))
            }
            _ => None,
        };

        state.store.update_user(&target).map_err(|e| match e {
            Error::AlreadyExists => ApiError::bad_request("Username already taken"),
            other => ApiError::from(other),
        })?;

        if let Some(old) = renamed {
            rename_repositories(state.workspaces.root(), &old, &target.username).await;
        }

        tracing::info!(user = %target.username, by = %caller.username, "updated user");

        let caller = state
            .store
            .get_user(caller.id)
            .api_err("Failed to load user")?
            .or_not_found("User not valid")?;
        session_tokens(state, &caller)
    }

    async fn delete_user(&self, ctx: &Context<'_>, username: String) -> Result<String> {
        let state = app(ctx)?;
        let caller = require_user(ctx)?;

        if username.is_empty() {
            return Err(ApiError::bad_request("User not valid").into());
        }
        if caller.username != username && !caller.role.is_admin() {
            return Err(ApiError::forbidden("You have no permission to delete other users").into());
        }

        let user = state
            .store
            .get_user_by_username(&username)
            .api_err("Failed to load user")?
            .or_not_found(format!("No such a user: {username}"))?;

        state.store.delete_user(user.id).api_err("Failed to delete user")?;
        if let Err(e) = state.tokens.delete_user(user.id) {
            tracing::warn!(user = %username, error = %e, "failed to delete service tokens");
        }

        let repositories = state.workspaces.root().join(&user.username);
        if repositories.exists() {
            if let Err(e) = tokio::fs::remove_dir_all(&repositories).await {
                tracing::warn!(
                    path = %repositories.display(),
                    error = %e,
                    "failed to remove workspaces"
                );
            }
        }

        tracing::info!(user = %username, by = %caller.username, "deleted user");
        Ok(format!("Deleted user {username}"))
    }

    async fn connect_git_service(
        &self,
        ctx: &Context<'_>,
        service: AddServiceArgs,
    ) -> Result<String> {
        let state = app(ctx)?;
        let user = require_user(ctx)?;

        let name = ServiceName::parse(&service.service_name)
            .ok_or_else(|| ApiError::bad_request(UNSUPPORTED_SERVICE))?;

        state
            .store
            .upsert_service_account(&ServiceAccount {
                user_id: user.id,
                service: name,
                username: service.username,
                email: non_empty(service.email),
                reposurl: service.reposurl,
            })
            .api_err("Failed to save service account")?;

        Ok("success".to_string())
    }

    /// Completes the OAuth flow for `service` with the callback `code`.
    async fn authorize_with_service(
        &self,
        ctx: &Context<'_>,
        code: String,
        service: String,
    ) -> Result<ServiceAuthResponse> {
        let state = app(ctx)?;
        let user = require_user(ctx)?;

        if code.is_empty() {
            return Err(ApiError::bad_request(format!("{service} code not provided")).into());
        }
        let name =
            ServiceName::parse(&service).ok_or_else(|| ApiError::bad_request(UNSUPPORTED_SERVICE))?;

        let response = state
            .oauth
            .exchange_code(name, &code)
            .await
            .map_err(ApiError::from)?;
        let service_user = state
            .oauth
            .fetch_user(name, &response.access_token)
            .await
            .map_err(ApiError::from)?;

        state
            .tokens
            .set_token(user.id, name, response)
            .map_err(ApiError::from)?;
        state
            .store
            .upsert_service_account(&ServiceAccount {
                user_id: user.id,
                service: name,
                username: service_user.username.clone(),
                email: service_user.email.clone(),
                reposurl: service_user.reposurl.clone(),
            })
            .api_err("Failed to save service account")?;

        tracing::info!(user = %user.username, service = %name, "connected service");

        Ok(ServiceAuthResponse {
            service_user: ServiceUserObject::from(service_user),
            tokens: session_tokens(state, user)?,
        })
    }

    async fn delete_service_tokens(&self, ctx: &Context<'_>, username: String) -> Result<String> {
        let state = app(ctx)?;
        let caller = require_user(ctx)?;

        if caller.username != username && !caller.role.is_admin() {
            return Err(ApiError::forbidden(
                "You have no permission to delete other users service tokens",
            )
            .into());
        }

        let user = state
            .store
            .get_user_by_username(&username)
            .api_err("Failed to load user")?
            .ok_or_else(|| ApiError::bad_request(format!("No such a user: {username}")))?;

        state.tokens.delete_user(user.id).map_err(ApiError::from)?;
        Ok("Successfully deleted users service tokens".to_string())
    }

    /// Writes `files`, commits them on `branch` and pushes.
    async fn save_changes(
        &self,
        ctx: &Context<'_>,
        files: Vec<FileInput>,
        branch: String,
        commit_message: Option<String>,
    ) -> Result<String> {
        let state = app(ctx)?;
        let user = require_user(ctx)?;

        let (target, changes) = file_changes(state, user, files)?;
        let access = file_remote_access(state, user, &target).await?;

        let names: Vec<&str> = changes.iter().map(|c| c.relative.as_str()).collect();
        let message = make_commit_message(commit_message.as_deref(), &user.username, &names);

        state
            .workspaces
            .save_changes(
                &target.workspace,
                &changes,
                &branch,
                &message,
                &access.identity,
                access.remote.as_deref(),
            )
            .await
            .map_err(ApiError::from)?;

        tracing::info!(
            user = %user.username,
            workspace = %target.workspace.display(),
            branch = %branch,
            files = changes.len(),
            "saved changes"
        );
        Ok("Saved".to_string())
    }

    /// Commits the resolved files of an interrupted merge.
    async fn save_merge_edit(
        &self,
        ctx: &Context<'_>,
        files: Vec<FileInput>,
        commit_message: Option<String>,
    ) -> Result<String> {
        let state = app(ctx)?;
        let user = require_user(ctx)?;

        let (target, changes) = file_changes(state, user, files)?;
        let access = file_remote_access(state, user, &target).await?;

        let names: Vec<&str> = changes.iter().map(|c| c.relative.as_str()).collect();
        let message = make_commit_message(commit_message.as_deref(), &user.username, &names);

        state
            .workspaces
            .save_merge_edit(
                &target.workspace,
                &changes,
                &message,
                &access.identity,
                access.remote.as_deref(),
            )
            .await
            .map_err(ApiError::from)?;

        Ok("Merge saved".to_string())
    }

    async fn commit_local_changes(
        &self,
        ctx: &Context<'_>,
        url: String,
        commit_message: Option<String>,
        file_name: String,
    ) -> Result<String> {
        let state = app(ctx)?;
        let user = require_user(ctx)?;

        let (workspace, target) = url_file_target(state, user, &url, &file_name)?;
        let access = remote_access(state, user, service_for_url(&url), &url).await?;
        let message = make_commit_message(
            commit_message.as_deref(),
            &user.username,
            &[target.location.relative.as_str()],
        );

        state
            .workspaces
            .commit_local_changes(
                &workspace,
                &target.location.relative,
                &message,
                &access.identity,
                access.remote.as_deref(),
            )
            .await
            .map_err(ApiError::from)?;

        Ok("Committed".to_string())
    }

    async fn switch_branch(
        &self,
        ctx: &Context<'_>,
        url: String,
        branch: String,
    ) -> Result<String> {
        let state = app(ctx)?;
        let user = require_user(ctx)?;

        let workspace = resolve_workspace_path(state.workspaces.root(), &url, &user.username)
            .map_err(ApiError::from)?;
        let branch = state
            .workspaces
            .switch_branch(&workspace, &branch)
            .await
            .map_err(ApiError::from)?;

        Ok(branch)
    }

    async fn pull_repository(&self, ctx: &Context<'_>, url: String) -> Result<String> {
        let state = app(ctx)?;
        let user = require_user(ctx)?;

        let workspace = resolve_workspace_path(state.workspaces.root(), &url, &user.username)
            .map_err(ApiError::from)?;
        let access = remote_access(state, user, service_for_url(&url), &url).await?;

        state
            .workspaces
            .pull(&workspace, &access.identity, access.remote.as_deref())
            .await
            .map_err(ApiError::from)?;

        Ok("Pulled".to_string())
    }

    /// Writes a file into the workspace without committing it.
    async fn local_save(&self, ctx: &Context<'_>, file: FileInput) -> Result<String> {
        let state = app(ctx)?;
        let user = require_user(ctx)?;

        let target = file_target(state, user, &file.name)?;
        state
            .workspaces
            .local_save(&target.workspace, &target.location.relative, &file.content)
            .await
            .map_err(ApiError::from)?;

        Ok("Saved locally".to_string())
    }

    async fn reset_local_changes(&self, ctx: &Context<'_>, url: String) -> Result<String> {
        let state = app(ctx)?;
        let user = require_user(ctx)?;

        let workspace = resolve_workspace_path(state.workspaces.root(), &url, &user.username)
            .map_err(ApiError::from)?;
        let summary = state
            .workspaces
            .reset_local_changes(&workspace)
            .await
            .map_err(ApiError::from)?;

        Ok(summary)
    }

    async fn reset_current_file(
        &self,
        ctx: &Context<'_>,
        url: String,
        file_name: String,
    ) -> Result<String> {
        let state = app(ctx)?;
        let user = require_user(ctx)?;

        let (workspace, target) = url_file_target(state, user, &url, &file_name)?;
        state
            .workspaces
            .reset_file(&workspace, &target.location.relative)
            .await
            .map_err(ApiError::from)?;

        Ok(format!("reset file {file_name}"))
    }

    async fn save_settings(&self, ctx: &Context<'_>, settings: SettingsInput) -> Result<String> {
        let state = app(ctx)?;
        require_user(ctx)?;

        if let Err(e) = state.settings.save(&settings.into()).await {
            tracing::error!("Failed to save settings: {e}");
            return Err(ApiError::internal("Could not save settings").into());
        }
        Ok("Saved!".to_string())
    }
}

fn session_tokens(state: &AppState, user: &User) -> Result<TokensObject> {
    let pair = state
        .session_keys
        .create_tokens(user)
        .map_err(ApiError::from)?;
    Ok(pair.into())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Resolves the files of one save to a single workspace of the caller.
fn file_changes(
    state: &AppState,
    user: &User,
    files: Vec<FileInput>,
) -> Result<(FileTarget, Vec<FileChange>), ApiError> {
    let mut files = files.into_iter();
    let Some(first) = files.next() else {
        return Err(ApiError::bad_request("No files to save"));
    };

    let target = file_target(state, user, &first.name)?;
    let mut changes = vec![FileChange {
        relative: target.location.relative.clone(),
        content: first.content,
    }];

    for file in files {
        let other = file_target(state, user, &file.name)?;
        if !other.location.same_workspace(&target.location) {
            return Err(ApiError::bad_request(
                "All files must belong to the same repository",
            ));
        }
        changes.push(FileChange {
            relative: other.location.relative,
            content: file.content,
        });
    }

    Ok((target, changes))
}

/// Resolves `file_name` and checks it lies in the workspace of `url`.
fn url_file_target(
    state: &AppState,
    user: &User,
    url: &str,
    file_name: &str,
) -> Result<(std::path::PathBuf, FileTarget), ApiError> {
    let workspace = resolve_workspace_path(state.workspaces.root(), url, &user.username)?;
    let target = file_target(state, user, file_name)?;

    if target.workspace != workspace {
        return Err(ApiError::bad_request(format!(
            "File {file_name} does not belong to {url}"
        )));
    }
    Ok((workspace, target))
}

async fn rename_repositories(root: &Path, old: &str, new: &str) {
    let from = root.join(old);
    if !from.exists() {
        return;
    }

    let to = root.join(new);
    if let Err(e) = tokio::fs::rename(&from, &to).await {
        tracing::warn!(
            from = %from.display(),
            to = %to.display(),
            error = %e,
            "failed to move workspaces"
        );
    }
}
