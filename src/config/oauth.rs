use serde::{Deserialize, Serialize};

use crate::types::ServiceName;

/// OAuth application registered with one git service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub callback_url: Option<String>,
}

impl ProviderConfig {
    /// Client id and callback url, when both are set and non-empty.
    pub fn authorize_params(&self) -> Option<(&str, &str)> {
        let client_id = self.client_id.as_deref().filter(|s| !s.is_empty())?;
        let callback = self.callback_url.as_deref().filter(|s| !s.is_empty())?;
        Some((client_id, callback))
    }

    pub fn client_secret(&self) -> &str {
        self.client_secret.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OAuthConfig {
    pub github: ProviderConfig,
    pub gitlab: ProviderConfig,
    pub bitbucket: ProviderConfig,
}

impl OAuthConfig {
    #[must_use]
    pub fn provider(&self, service: ServiceName) -> &ProviderConfig {
        match service {
            ServiceName::Github => &self.github,
            ServiceName::Gitlab => &self.gitlab,
            ServiceName::Bitbucket => &self.bitbucket,
        }
    }

    pub fn provider_mut(&mut self, service: ServiceName) -> &mut ProviderConfig {
        match service {
            ServiceName::Github => &mut self.github,
            ServiceName::Gitlab => &mut self.gitlab,
            ServiceName::Bitbucket => &mut self.bitbucket,
        }
    }
}
