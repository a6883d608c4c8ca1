use async_graphql::ErrorExtensions;

use crate::error::{Error, Result as StoreResult};
use crate::workspace::GitError;

pub const LOGIN_REQUIRED: &str = "You have to login";

/// Category of an API failure, reported to clients as `extensions.code`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Unauthenticated,
    Forbidden,
    BadUserInput,
    MergeConflict,
    Git,
    NotFound,
    Internal,
}

impl ErrorKind {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Unauthenticated => "UNAUTHENTICATED",
            Self::Forbidden => "FORBIDDEN",
            Self::BadUserInput => "BAD_USER_INPUT",
            Self::MergeConflict => "MERGE_CONFLICT",
            Self::Git => "GIT_ERROR",
            Self::NotFound => "NOT_FOUND",
            Self::Internal => "INTERNAL_SERVER_ERROR",
        }
    }
}

/// API error that converts to a GraphQL error carrying its code.
///
/// Must not implement `Display`: async-graphql's blanket conversion for
/// displayable types would then apply and drop the code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ApiError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn login_required() -> Self {
        Self::new(ErrorKind::Unauthenticated, LOGIN_REQUIRED)
    }

    #[must_use]
    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthenticated, message)
    }

    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Forbidden, message)
    }

    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadUserInput, message)
    }

    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    #[must_use]
    pub fn merge_conflict() -> Self {
        Self::new(ErrorKind::MergeConflict, "Merge conflict detected")
    }

    #[must_use]
    pub fn git(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Git, message)
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }
}

impl From<GitError> for ApiError {
    fn from(err: GitError) -> Self {
        match err {
            GitError::MergeConflict(detail) => {
                tracing::info!("merge conflict: {detail}");
                Self::merge_conflict()
            }
            GitError::NotCloned(_) => Self::not_found(err.to_string()),
            GitError::InvalidBranch(_) | GitError::InvalidPath(_) => {
                Self::bad_request(err.to_string())
            }
            GitError::Io(ref e) => {
                tracing::error!("workspace io error: {e}");
                Self::git(err.to_string())
            }
            GitError::NoCommits | GitError::Command(_) | GitError::Git(_) => {
                Self::git(err.to_string())
            }
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::NotFound => Self::not_found("Not found"),
            Error::AlreadyExists => Self::bad_request("Already exists"),
            Error::Unauthorized => Self::login_required(),
            Error::Forbidden => Self::forbidden("Not authorized"),
            Error::BadRequest(message) => Self::bad_request(message),
            Error::Git(git) => git.into(),
            Error::Config(message) | Error::OAuth(message) => {
                tracing::error!("{message}");
                Self::internal(message)
            }
            Error::Database(e) => {
                tracing::error!("database error: {e}");
                Self::internal("Internal server error")
            }
            Error::Io(e) => {
                tracing::error!("io error: {e}");
                Self::internal("Internal server error")
            }
        }
    }
}

impl From<ApiError> for async_graphql::Error {
    fn from(err: ApiError) -> Self {
        let code = err.kind.code();
        async_graphql::Error::new(err.message).extend_with(|_, e| e.set("code", code))
    }
}

/// Extension trait for converting store results to API errors with a custom message.
pub trait StoreResultExt<T> {
    fn api_err(self, message: &'static str) -> Result<T, ApiError>;
}

impl<T> StoreResultExt<T> for StoreResult<T> {
    fn api_err(self, message: &'static str) -> Result<T, ApiError> {
        self.map_err(|e| {
            tracing::error!("{message}: {e}");
            ApiError::internal(message)
        })
    }
}

/// Extension for Option types from store operations.
pub trait StoreOptionExt<T> {
    fn or_not_found(self, message: impl Into<String>) -> Result<T, ApiError>;
}

impl<T> StoreOptionExt<T> for Option<T> {
    fn or_not_found(self, message: impl Into<String>) -> Result<T, ApiError> {
        self.ok_or_else(|| ApiError::not_found(message))
    }
}
