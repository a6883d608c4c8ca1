//! OAuth clients for the supported git services.

mod http;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::OAuthConfig;
use crate::error::{Error, Result};
use crate::tokens::AccessTokenResponse;
use crate::types::ServiceName;

pub use http::HttpOAuthClient;

/// Account a user holds on a git service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceUser {
    pub service: ServiceName,
    pub username: String,
    pub email: Option<String>,
    pub reposurl: String,
}

/// Repository listed from a git service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRepository {
    pub id: String,
    pub name: String,
    pub full_name: String,
    pub clone_url: String,
    pub html_url: String,
    pub service: ServiceName,
}

#[async_trait]
pub trait OAuthProvider: Send + Sync {
    /// URL the browser is sent to for granting access.
    fn login_url(&self, service: ServiceName) -> Result<String>;

    async fn exchange_code(&self, service: ServiceName, code: &str) -> Result<AccessTokenResponse>;

    async fn refresh(
        &self,
        service: ServiceName,
        refresh_token: &str,
    ) -> Result<AccessTokenResponse>;

    async fn fetch_user(&self, service: ServiceName, access_token: &str) -> Result<ServiceUser>;

    async fn list_repositories(
        &self,
        service: ServiceName,
        access_token: &str,
        service_username: &str,
    ) -> Result<Vec<RemoteRepository>>;
}

fn random_state() -> String {
    let bytes: [u8; 24] = rand::random();
    hex::encode(bytes)
}

/// Builds the authorize URL for `service` from the configured OAuth app.
pub fn login_url(config: &OAuthConfig, service: ServiceName) -> Result<String> {
    let Some((client_id, callback)) = config.provider(service).authorize_params() else {
        return Err(Error::Config(format!(
            "{} client id or callback url not set",
            service.display_name()
        )));
    };

    let client_id = urlencoding::encode(client_id);
    let callback = urlencoding::encode(callback);

    let url = match service {
        ServiceName::Github => format!(
            "https://github.com/login/oauth/authorize?response_type=code&redirect_uri={callback}&client_id={client_id}&scope=repo"
        ),
        ServiceName::Gitlab => format!(
            "https://gitlab.com/oauth/authorize?client_id={client_id}&redirect_uri={callback}&response_type=code&state={}&scope=read_user+read_repository+write_repository+api",
            random_state()
        ),
        ServiceName::Bitbucket => format!(
            "https://bitbucket.org/site/oauth2/authorize?client_id={client_id}&response_type=code"
        ),
    };

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderConfig;

    fn configured() -> OAuthConfig {
        let provider = |id: &str| ProviderConfig {
            client_id: Some(id.to_string()),
            client_secret: Some("secret".to_string()),
            callback_url: Some("http://localhost:3000/auth".to_string()),
        };
        OAuthConfig {
            github: provider("gh"),
            gitlab: provider("gl"),
            bitbucket: provider("bb"),
        }
    }

    #[test]
    fn test_github_login_url() {
        let url = login_url(&configured(), ServiceName::Github).unwrap();
        assert_eq!(
            url,
            "https://github.com/login/oauth/authorize?response_type=code&redirect_uri=http%3A%2F%2Flocalhost%3A3000%2Fauth&client_id=gh&scope=repo"
        );
    }

    #[test]
    fn test_gitlab_login_url_has_random_state() {
        let first = login_url(&configured(), ServiceName::Gitlab).unwrap();
        let second = login_url(&configured(), ServiceName::Gitlab).unwrap();

        assert!(first.starts_with("https://gitlab.com/oauth/authorize?client_id=gl&"));
        assert!(first.ends_with("&scope=read_user+read_repository+write_repository+api"));
        assert_ne!(first, second);

        let state = first
            .split('&')
            .find_map(|p| p.strip_prefix("state="))
            .unwrap();
        assert_eq!(state.len(), 48);
        assert!(state.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_bitbucket_login_url() {
        assert_eq!(
            login_url(&configured(), ServiceName::Bitbucket).unwrap(),
            "https://bitbucket.org/site/oauth2/authorize?client_id=bb&response_type=code"
        );
    }

    #[test]
    fn test_missing_client_id_is_reported() {
        let err = login_url(&OAuthConfig::default(), ServiceName::Gitlab).unwrap_err();
        assert!(err.to_string().contains("GitLab client id or callback url not set"));
    }
}
