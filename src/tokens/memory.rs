use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::Result;
use crate::types::ServiceName;

use super::{ServiceToken, TokenStore};

/// Process-lifetime token storage. Tokens are lost on restart and users
/// reconnect their services.
#[derive(Default)]
pub struct InMemoryTokenStore {
    tokens: RwLock<HashMap<i64, HashMap<ServiceName, ServiceToken>>>,
}

impl InMemoryTokenStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for InMemoryTokenStore {
    fn get(&self, user_id: i64, service: ServiceName) -> Result<Option<ServiceToken>> {
        let tokens = self.tokens.read().unwrap_or_else(|e| e.into_inner());
        Ok(tokens
            .get(&user_id)
            .and_then(|services| services.get(&service))
            .cloned())
    }

    fn set(&self, user_id: i64, service: ServiceName, token: ServiceToken) -> Result<()> {
        let mut tokens = self.tokens.write().unwrap_or_else(|e| e.into_inner());
        tokens.entry(user_id).or_default().insert(service, token);
        Ok(())
    }

    fn delete_service(&self, user_id: i64, service: ServiceName) -> Result<bool> {
        let mut tokens = self.tokens.write().unwrap_or_else(|e| e.into_inner());
        let Some(services) = tokens.get_mut(&user_id) else {
            return Ok(false);
        };

        let removed = services.remove(&service).is_some();
        if services.is_empty() {
            tokens.remove(&user_id);
        }
        Ok(removed)
    }

    fn delete_user(&self, user_id: i64) -> Result<bool> {
        let mut tokens = self.tokens.write().unwrap_or_else(|e| e.into_inner());
        Ok(tokens.remove(&user_id).is_some())
    }

    fn services(&self, user_id: i64) -> Result<Vec<ServiceName>> {
        let tokens = self.tokens.read().unwrap_or_else(|e| e.into_inner());
        let mut services: Vec<ServiceName> = tokens
            .get(&user_id)
            .map(|s| s.keys().copied().collect())
            .unwrap_or_default();
        services.sort_by_key(|s| s.as_str());
        Ok(services)
    }
}
