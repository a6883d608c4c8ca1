use std::sync::Arc;

use axum::{
    Json,
    extract::FromRequestParts,
    http::{HeaderMap, HeaderValue, StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use serde_json::json;

use super::session::{ACCESS_TOKEN_HEADER, REFRESH_TOKEN_HEADER, SessionTokenError, TokenPair};
use crate::server::AppState;
use crate::types::User;

/// The caller behind a request, resolved from the session token headers.
///
/// Requests without tokens, or whose tokens have both expired, are anonymous.
/// When only the access token has expired a new pair is issued in `reissued`.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub user: Option<User>,
    pub reissued: Option<TokenPair>,
}

impl Session {
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    /// Response headers handing a reissued token pair to the client.
    #[must_use]
    pub fn reissue_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let Some(pair) = &self.reissued else {
            return headers;
        };

        let (Ok(access), Ok(refresh)) = (
            HeaderValue::from_str(&pair.access_token),
            HeaderValue::from_str(&pair.refresh_token),
        ) else {
            return headers;
        };

        headers.insert(
            "access-control-expose-headers",
            HeaderValue::from_static("x-access-token,x-refresh-token"),
        );
        headers.insert(ACCESS_TOKEN_HEADER, access);
        headers.insert(REFRESH_TOKEN_HEADER, refresh);
        headers
    }
}

#[derive(Debug)]
pub enum AuthError {
    InvalidToken,
    InternalError,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthError::InvalidToken => (StatusCode::UNAUTHORIZED, "Invalid token"),
            AuthError::InternalError => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };

        let body = json!({ "data": null, "error": message });
        (status, Json(body)).into_response()
    }
}

impl FromRequestParts<Arc<AppState>> for Session {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|h| h.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };

        let (Some(access), Some(refresh)) =
            (header(ACCESS_TOKEN_HEADER), header(REFRESH_TOKEN_HEADER))
        else {
            return Ok(Session::anonymous());
        };

        match state.session_keys.verify(access) {
            Ok(claims) => Ok(Session {
                user: load_user(state, claims.id)?,
                reissued: None,
            }),
            Err(SessionTokenError::Expired) => match state.session_keys.verify(refresh) {
                Ok(claims) => {
                    let Some(user) = load_user(state, claims.id)? else {
                        return Ok(Session::anonymous());
                    };

                    let pair = state.session_keys.create_tokens(&user).map_err(|e| {
                        tracing::error!("Failed to reissue session tokens: {e}");
                        AuthError::InternalError
                    })?;
                    tracing::debug!(user = %user.username, "reissued session tokens");

                    Ok(Session {
                        user: Some(user),
                        reissued: Some(pair),
                    })
                }
                Err(SessionTokenError::Expired) => Ok(Session::anonymous()),
                Err(SessionTokenError::Invalid) => Err(AuthError::InvalidToken),
            },
            Err(SessionTokenError::Invalid) => Err(AuthError::InvalidToken),
        }
    }
}

fn load_user(state: &AppState, id: i64) -> Result<Option<User>, AuthError> {
    state.store.get_user(id).map_err(|e| {
        tracing::error!("Failed to load session user {id}: {e}");
        AuthError::InternalError
    })
}
