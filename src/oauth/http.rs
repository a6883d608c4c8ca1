use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use super::{OAuthProvider, RemoteRepository, ServiceUser};
use crate::config::{OAuthConfig, ProviderConfig};
use crate::error::{Error, Result};
use crate::tokens::{AccessTokenResponse, TokenRefresher};
use crate::types::ServiceName;

const HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const HTTP_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const USER_AGENT: &str = "amandus";

const GITHUB_TOKEN_URL: &str = "https://github.com/login/oauth/access_token";
const GITHUB_API: &str = "https://api.github.com";
const GITLAB_TOKEN_URL: &str = "https://gitlab.com/oauth/token";
const GITLAB_API: &str = "https://gitlab.com/api/v4";
const BITBUCKET_TOKEN_URL: &str = "https://bitbucket.org/site/oauth2/access_token";
const BITBUCKET_API: &str = "https://api.bitbucket.org/2.0";

/// Token endpoint payload. Providers report failures in-band with `error`.
#[derive(Debug, Deserialize)]
struct TokenEndpointResponse {
    access_token: Option<String>,
    token_type: Option<String>,
    expires_in: Option<i64>,
    refresh_token: Option<String>,
    scope: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

impl TokenEndpointResponse {
    fn into_token(self, service: ServiceName) -> Result<AccessTokenResponse> {
        if let Some(error) = self.error {
            let detail = self.error_description.unwrap_or_default();
            return Err(Error::OAuth(format!(
                "{} rejected the request: {error} {detail}",
                service.display_name()
            )
            .trim_end()
            .to_string()));
        }

        let access_token = self.access_token.ok_or_else(|| {
            Error::OAuth(format!(
                "{} did not return an access token",
                service.display_name()
            ))
        })?;

        Ok(AccessTokenResponse {
            access_token,
            token_type: self.token_type,
            expires_in: self.expires_in,
            refresh_token: self.refresh_token,
            scope: self.scope,
        })
    }
}

#[derive(Debug, Deserialize)]
struct GitHubUser {
    login: String,
    email: Option<String>,
    repos_url: String,
}

#[derive(Debug, Deserialize)]
struct GitLabUser {
    id: i64,
    username: String,
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BitbucketUser {
    username: String,
}

#[derive(Debug, Deserialize)]
struct BitbucketEmails {
    values: Vec<BitbucketEmail>,
}

#[derive(Debug, Deserialize)]
struct BitbucketEmail {
    email: String,
    #[serde(default)]
    is_primary: bool,
}

#[derive(Debug, Deserialize)]
struct GitHubRepository {
    id: i64,
    name: String,
    full_name: String,
    clone_url: String,
    html_url: String,
}

#[derive(Debug, Deserialize)]
struct GitLabRepository {
    id: i64,
    name: String,
    path_with_namespace: String,
    http_url_to_repo: String,
    web_url: String,
}

#[derive(Debug, Deserialize)]
struct BitbucketRepositories {
    values: Vec<BitbucketRepository>,
}

#[derive(Debug, Deserialize)]
struct BitbucketRepository {
    uuid: String,
    name: String,
    full_name: String,
    links: BitbucketLinks,
}

#[derive(Debug, Deserialize)]
struct BitbucketLinks {
    #[serde(default, rename = "clone")]
    clone_links: Vec<BitbucketLink>,
    html: BitbucketLink,
}

#[derive(Debug, Deserialize)]
struct BitbucketLink {
    href: String,
    #[serde(default)]
    name: Option<String>,
}

impl From<GitHubRepository> for RemoteRepository {
    fn from(repo: GitHubRepository) -> Self {
        Self {
            id: repo.id.to_string(),
            name: repo.name,
            full_name: repo.full_name,
            clone_url: repo.clone_url,
            html_url: repo.html_url,
            service: ServiceName::Github,
        }
    }
}

impl From<GitLabRepository> for RemoteRepository {
    fn from(repo: GitLabRepository) -> Self {
        Self {
            id: repo.id.to_string(),
            name: repo.name,
            full_name: repo.path_with_namespace,
            clone_url: repo.http_url_to_repo,
            html_url: repo.web_url,
            service: ServiceName::Gitlab,
        }
    }
}

impl From<BitbucketRepository> for RemoteRepository {
    fn from(repo: BitbucketRepository) -> Self {
        let clone_url = repo
            .links
            .clone_links
            .iter()
            .find(|l| l.name.as_deref() == Some("https"))
            .or_else(|| repo.links.clone_links.first())
            .map(|l| l.href.clone())
            .unwrap_or_else(|| repo.links.html.href.clone());

        Self {
            id: repo.uuid,
            name: repo.name,
            full_name: repo.full_name,
            clone_url,
            html_url: repo.links.html.href,
            service: ServiceName::Bitbucket,
        }
    }
}

/// [`OAuthProvider`] talking to the public GitHub, GitLab and Bitbucket APIs.
pub struct HttpOAuthClient {
    http: Client,
    config: OAuthConfig,
}

impl HttpOAuthClient {
    pub fn new(config: OAuthConfig) -> Result<Self> {
        let http = Client::builder()
            .connect_timeout(HTTP_CONNECT_TIMEOUT)
            .timeout(HTTP_REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::OAuth(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, config })
    }

    fn provider(&self, service: ServiceName) -> Result<&ProviderConfig> {
        let provider = self.config.provider(service);
        if provider.client_id.as_deref().unwrap_or_default().is_empty() {
            return Err(Error::Config(format!(
                "{} client id or callback url not set",
                service.display_name()
            )));
        }
        Ok(provider)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        service: ServiceName,
        request: RequestBuilder,
    ) -> Result<T> {
        let response = request
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(%service, "OAuth request failed: {}", e);
                Error::OAuth(format!("{} request failed: {e}", service.display_name()))
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(Error::OAuth(format!(
                "{} rejected the access token",
                service.display_name()
            )));
        }
        if !status.is_success() && status != reqwest::StatusCode::BAD_REQUEST {
            return Err(Error::OAuth(format!(
                "{} responded with {status}",
                service.display_name()
            )));
        }

        response.json().await.map_err(|e| {
            tracing::warn!(%service, "failed to parse OAuth response: {}", e);
            Error::OAuth(format!(
                "invalid response from {}: {e}",
                service.display_name()
            ))
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        service: ServiceName,
        url: &str,
        access_token: &str,
    ) -> Result<T> {
        let request = self.http.get(url).bearer_auth(access_token);
        self.send_json(service, request).await
    }

    async fn token_request(
        &self,
        service: ServiceName,
        grant: Grant<'_>,
    ) -> Result<AccessTokenResponse> {
        let provider = self.provider(service)?;
        let client_id = provider.client_id.as_deref().unwrap_or_default();
        let redirect_uri = provider.callback_url.as_deref().unwrap_or_default();

        let request = match service {
            ServiceName::Github => {
                let Grant::AuthorizationCode(code) = grant else {
                    return Err(Error::OAuth(
                        "GitHub access tokens cannot be refreshed".to_string(),
                    ));
                };
                self.http.post(GITHUB_TOKEN_URL).json(&serde_json::json!({
                    "client_id": client_id,
                    "client_secret": provider.client_secret(),
                    "code": code,
                    "redirect_uri": redirect_uri,
                }))
            }
            ServiceName::Gitlab => {
                let mut body = serde_json::json!({
                    "client_id": client_id,
                    "client_secret": provider.client_secret(),
                    "redirect_uri": redirect_uri,
                    "grant_type": grant.grant_type(),
                });
                body[grant.field()] = serde_json::Value::String(grant.value().to_string());
                self.http.post(GITLAB_TOKEN_URL).json(&body)
            }
            ServiceName::Bitbucket => self
                .http
                .post(BITBUCKET_TOKEN_URL)
                .basic_auth(client_id, Some(provider.client_secret()))
                .form(&[
                    ("grant_type", grant.grant_type()),
                    (grant.field(), grant.value()),
                ]),
        };

        let response: TokenEndpointResponse = self.send_json(service, request).await?;
        response.into_token(service)
    }
}

#[derive(Debug, Clone, Copy)]
enum Grant<'a> {
    AuthorizationCode(&'a str),
    RefreshToken(&'a str),
}

impl Grant<'_> {
    fn grant_type(&self) -> &'static str {
        match self {
            Self::AuthorizationCode(_) => "authorization_code",
            Self::RefreshToken(_) => "refresh_token",
        }
    }

    fn field(&self) -> &'static str {
        match self {
            Self::AuthorizationCode(_) => "code",
            Self::RefreshToken(_) => "refresh_token",
        }
    }

    fn value(&self) -> &str {
        match self {
            Self::AuthorizationCode(v) | Self::RefreshToken(v) => v,
        }
    }
}

#[async_trait]
impl OAuthProvider for HttpOAuthClient {
    fn login_url(&self, service: ServiceName) -> Result<String> {
        super::login_url(&self.config, service)
    }

    async fn exchange_code(&self, service: ServiceName, code: &str) -> Result<AccessTokenResponse> {
        self.token_request(service, Grant::AuthorizationCode(code))
            .await
    }

    async fn refresh(
        &self,
        service: ServiceName,
        refresh_token: &str,
    ) -> Result<AccessTokenResponse> {
        self.token_request(service, Grant::RefreshToken(refresh_token))
            .await
    }

    async fn fetch_user(&self, service: ServiceName, access_token: &str) -> Result<ServiceUser> {
        match service {
            ServiceName::Github => {
                let user: GitHubUser = self
                    .get_json(service, &format!("{GITHUB_API}/user"), access_token)
                    .await?;
                Ok(ServiceUser {
                    service,
                    username: user.login,
                    email: user.email,
                    reposurl: user.repos_url,
                })
            }
            ServiceName::Gitlab => {
                let user: GitLabUser = self
                    .get_json(service, &format!("{GITLAB_API}/user"), access_token)
                    .await?;
                Ok(ServiceUser {
                    service,
                    reposurl: format!("{GITLAB_API}/users/{}/projects", user.id),
                    username: user.username,
                    email: user.email,
                })
            }
            ServiceName::Bitbucket => {
                let user: BitbucketUser = self
                    .get_json(service, &format!("{BITBUCKET_API}/user"), access_token)
                    .await?;
                let emails: BitbucketEmails = self
                    .get_json(service, &format!("{BITBUCKET_API}/user/emails"), access_token)
                    .await?;

                let email = emails
                    .values
                    .iter()
                    .find(|e| e.is_primary)
                    .or_else(|| emails.values.first())
                    .map(|e| e.email.clone());

                Ok(ServiceUser {
                    service,
                    reposurl: format!("{BITBUCKET_API}/repositories/{}", user.username),
                    username: user.username,
                    email,
                })
            }
        }
    }

    async fn list_repositories(
        &self,
        service: ServiceName,
        access_token: &str,
        service_username: &str,
    ) -> Result<Vec<RemoteRepository>> {
        let repositories = match service {
            ServiceName::Github => {
                let repos: Vec<GitHubRepository> = self
                    .get_json(service, &format!("{GITHUB_API}/user/repos"), access_token)
                    .await?;
                repos.into_iter().map(RemoteRepository::from).collect()
            }
            ServiceName::Gitlab => {
                let repos: Vec<GitLabRepository> = self
                    .get_json(
                        service,
                        &format!("{GITLAB_API}/projects?membership=true"),
                        access_token,
                    )
                    .await?;
                repos.into_iter().map(RemoteRepository::from).collect()
            }
            ServiceName::Bitbucket => {
                let url = format!(
                    "{BITBUCKET_API}/repositories/{}",
                    urlencoding::encode(service_username)
                );
                let repos: BitbucketRepositories =
                    self.get_json(service, &url, access_token).await?;
                repos
                    .values
                    .into_iter()
                    .map(RemoteRepository::from)
                    .collect()
            }
        };

        Ok(repositories)
    }
}

#[async_trait]
impl TokenRefresher for HttpOAuthClient {
    async fn refresh(
        &self,
        service: ServiceName,
        refresh_token: &str,
    ) -> Result<AccessTokenResponse> {
        OAuthProvider::refresh(self, service, refresh_token).await
    }
}
