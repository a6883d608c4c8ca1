//! OAuth credentials for each user's linked git services.

mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::ServiceName;

pub use memory::InMemoryTokenStore;

/// Token payload as returned by a provider's token endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessTokenResponse {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceToken {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl ServiceToken {
    #[must_use]
    pub fn from_response(response: AccessTokenResponse, now: DateTime<Utc>) -> Self {
        Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            expires_at: response.expires_in.map(|secs| now + Duration::seconds(secs)),
        }
    }

    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Keyed storage of service tokens by (user id, service).
pub trait TokenStore: Send + Sync {
    fn get(&self, user_id: i64, service: ServiceName) -> Result<Option<ServiceToken>>;
    fn set(&self, user_id: i64, service: ServiceName, token: ServiceToken) -> Result<()>;
    fn delete_service(&self, user_id: i64, service: ServiceName) -> Result<bool>;
    fn delete_user(&self, user_id: i64) -> Result<bool>;
    fn services(&self, user_id: i64) -> Result<Vec<ServiceName>>;
}

/// Exchanges a refresh token for a fresh access token.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(
        &self,
        service: ServiceName,
        refresh_token: &str,
    ) -> Result<AccessTokenResponse>;
}

/// Token store plus the provider used to renew expired entries.
#[derive(Clone)]
pub struct ServiceTokens {
    store: Arc<dyn TokenStore>,
    refresher: Arc<dyn TokenRefresher>,
}

impl ServiceTokens {
    pub fn new(store: Arc<dyn TokenStore>, refresher: Arc<dyn TokenRefresher>) -> Self {
        Self { store, refresher }
    }

    pub fn set_token(
        &self,
        user_id: i64,
        service: ServiceName,
        response: AccessTokenResponse,
    ) -> Result<()> {
        self.store.set(
            user_id,
            service,
            ServiceToken::from_response(response, Utc::now()),
        )
    }

    /// Returns a usable access token, refreshing it first when it expired.
    ///
    /// A failed refresh drops the stored token, so the user has to connect
    /// the service again. Concurrent callers holding the same expired token
    /// may each trigger a refresh.
    pub async fn get_access_token(
        &self,
        user_id: i64,
        service: ServiceName,
    ) -> Result<Option<String>> {
        let Some(token) = self.store.get(user_id, service)? else {
            return Ok(None);
        };

        let refresh_token = match &token.refresh_token {
            Some(refresh) if token.is_expired(Utc::now()) => refresh.clone(),
            _ => return Ok(Some(token.access_token)),
        };

        match self.refresher.refresh(service, &refresh_token).await {
            Ok(response) => {
                let access_token = response.access_token.clone();
                self.set_token(user_id, service, response)?;
                tracing::debug!(user_id, %service, "refreshed service token");
                Ok(Some(access_token))
            }
            Err(e) => {
                tracing::warn!(user_id, %service, error = %e, "service token refresh failed");
                self.store.delete_service(user_id, service)?;
                Ok(None)
            }
        }
    }

    pub fn is_connected(&self, user_id: i64, service: ServiceName) -> Result<bool> {
        Ok(self.store.get(user_id, service)?.is_some())
    }

    pub fn delete_service(&self, user_id: i64, service: ServiceName) -> Result<bool> {
        self.store.delete_service(user_id, service)
    }

    pub fn delete_user(&self, user_id: i64) -> Result<bool> {
        self.store.delete_user(user_id)
    }

    pub fn services(&self, user_id: i64) -> Result<Vec<ServiceName>> {
        self.store.services(user_id)
    }
}
