//! GraphQL schema served at `/graphql`.
//!
//! Resolvers read the shared [`AppState`] and the caller's [`Session`] from
//! the request data; [`execute`] attaches both.

mod dto;
mod mutation;
mod query;

use std::path::PathBuf;
use std::sync::Arc;

use async_graphql::{Context, EmptySubscription, Schema};

pub use dto::*;
pub use mutation::MutationRoot;
pub use query::QueryRoot;

use crate::auth::Session;
use crate::server::AppState;
use crate::server::response::{ApiError, StoreResultExt};
use crate::types::{CommitIdentity, ServiceName, User};
use crate::workspace::path::{self, FileLocation};

pub type AppSchema = Schema<QueryRoot, MutationRoot, EmptySubscription>;

#[must_use]
pub fn build_schema() -> AppSchema {
    Schema::build(QueryRoot, MutationRoot, EmptySubscription).finish()
}

/// Runs `request` as `session`.
pub async fn execute(
    state: &Arc<AppState>,
    session: Session,
    request: impl Into<async_graphql::Request>,
) -> async_graphql::Response {
    let request: async_graphql::Request = request.into();
    state
        .schema
        .execute(request.data(Arc::clone(state)).data(session))
        .await
}

fn app<'a>(ctx: &Context<'a>) -> async_graphql::Result<&'a Arc<AppState>> {
    ctx.data::<Arc<AppState>>()
}

fn current_user<'a>(ctx: &Context<'a>) -> Option<&'a User> {
    ctx.data_opt::<Session>().and_then(Session::user)
}

fn require_user<'a>(ctx: &Context<'a>) -> Result<&'a User, ApiError> {
    current_user(ctx).ok_or_else(ApiError::login_required)
}

/// Credentials a workspace operation runs with: who commits, and the
/// authenticated remote when the user has connected the service.
struct RemoteAccess {
    identity: CommitIdentity,
    remote: Option<String>,
}

async fn remote_access(
    state: &AppState,
    user: &User,
    service: Option<ServiceName>,
    url: &str,
) -> Result<RemoteAccess, ApiError> {
    let Some(service) = service else {
        return Ok(RemoteAccess {
            identity: CommitIdentity::resolve(user, None),
            remote: None,
        });
    };

    let account = state
        .store
        .get_service_account(user.id, service)
        .api_err("Failed to load service account")?;
    let identity = CommitIdentity::resolve(user, account.as_ref());

    let remote = match state.tokens.get_access_token(user.id, service).await? {
        Some(token) => {
            let service_username = account
                .as_ref()
                .map_or(user.username.as_str(), |a| a.username.as_str());
            Some(path::authenticated_remote_url(
                url,
                service,
                service_username,
                &token,
            )?)
        }
        None => None,
    };

    Ok(RemoteAccess { identity, remote })
}

/// A workspace addressed by the file names the editor sends.
struct FileTarget {
    location: FileLocation,
    workspace: PathBuf,
    url: String,
}

fn file_target(state: &AppState, user: &User, name: &str) -> Result<FileTarget, ApiError> {
    let location = path::parse_file_path(name)?;
    if location.username != user.username {
        return Err(ApiError::forbidden(
            "You have no permission to edit files of other users",
        ));
    }

    let workspace = location.workspace_path(state.workspaces.root());
    let url = match location.service_name() {
        Some(service) => format!(
            "https://{}/{}",
            path::service_host(service),
            location.repository()
        ),
        None => String::new(),
    };

    Ok(FileTarget {
        location,
        workspace,
        url,
    })
}

async fn file_remote_access(
    state: &AppState,
    user: &User,
    target: &FileTarget,
) -> Result<RemoteAccess, ApiError> {
    remote_access(state, user, target.location.service_name(), &target.url).await
}
