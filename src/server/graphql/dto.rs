use async_graphql::{InputObject, SimpleObject};

use crate::auth::TokenPair;
use crate::oauth::{RemoteRepository, ServiceUser};
use crate::settings::{MiscSetting, PluginSetting, Settings};
use crate::types::{RepoFile, RepoState, ServiceAccount, ServiceName, User};

#[derive(Debug, Clone, SimpleObject)]
#[graphql(name = "User")]
pub struct UserObject {
    pub id: i64,
    pub username: String,
    #[graphql(name = "user_role")]
    pub user_role: String,
    pub email: String,
    /// Linked service accounts, `null` when there are none.
    pub services: Option<Vec<ServiceUserObject>>,
}

impl UserObject {
    pub fn new(user: &User, accounts: Vec<ServiceAccount>) -> Self {
        let services = (!accounts.is_empty())
            .then(|| accounts.into_iter().map(ServiceUserObject::from).collect());

        Self {
            id: user.id,
            username: user.username.clone(),
            user_role: user.role.as_str().to_string(),
            email: user.email.clone(),
            services,
        }
    }
}

#[derive(Debug, Clone, SimpleObject)]
#[graphql(name = "ServiceUser")]
pub struct ServiceUserObject {
    pub service_name: Option<ServiceName>,
    pub username: String,
    pub email: Option<String>,
    pub reposurl: String,
}

impl From<ServiceAccount> for ServiceUserObject {
    fn from(account: ServiceAccount) -> Self {
        Self {
            service_name: Some(account.service),
            username: account.username,
            email: account.email,
            reposurl: account.reposurl,
        }
    }
}

impl From<ServiceUser> for ServiceUserObject {
    fn from(user: ServiceUser) -> Self {
        Self {
            service_name: Some(user.service),
            username: user.username,
            email: user.email,
            reposurl: user.reposurl,
        }
    }
}

#[derive(Debug, Clone, SimpleObject)]
#[graphql(name = "Tokens")]
pub struct TokensObject {
    pub access_token: String,
    pub refresh_token: String,
}

impl From<TokenPair> for TokensObject {
    fn from(pair: TokenPair) -> Self {
        Self {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
        }
    }
}

#[derive(Debug, Clone, SimpleObject)]
pub struct ServiceAuthResponse {
    pub service_user: ServiceUserObject,
    pub tokens: TokensObject,
}

#[derive(Debug, Clone, InputObject)]
pub struct AddServiceArgs {
    pub service_name: String,
    pub username: String,
    pub email: Option<String>,
    pub reposurl: String,
}

#[derive(Debug, Clone, SimpleObject)]
#[graphql(name = "File")]
pub struct FileObject {
    pub name: String,
    pub content: String,
}

impl From<RepoFile> for FileObject {
    fn from(file: RepoFile) -> Self {
        Self {
            name: file.name,
            content: file.content,
        }
    }
}

#[derive(Debug, Clone, InputObject)]
pub struct FileInput {
    pub name: String,
    pub content: String,
}

#[derive(Debug, Clone, SimpleObject)]
#[graphql(name = "RepoState")]
pub struct RepoStateObject {
    pub current_branch: String,
    pub files: Vec<FileObject>,
    pub branches: Vec<String>,
    pub url: String,
    pub commit_message: String,
}

impl From<RepoState> for RepoStateObject {
    fn from(state: RepoState) -> Self {
        Self {
            current_branch: state.current_branch,
            files: state.files.into_iter().map(FileObject::from).collect(),
            branches: state.branches,
            url: state.url,
            commit_message: state.commit_message,
        }
    }
}

#[derive(Debug, Clone, SimpleObject)]
#[graphql(name = "Repository")]
pub struct RepositoryObject {
    pub id: String,
    pub name: String,
    #[graphql(name = "full_name")]
    pub full_name: String,
    #[graphql(name = "clone_url")]
    pub clone_url: String,
    #[graphql(name = "html_url")]
    pub html_url: String,
    pub service: ServiceName,
}

impl From<RemoteRepository> for RepositoryObject {
    fn from(repo: RemoteRepository) -> Self {
        Self {
            id: repo.id,
            name: repo.name,
            full_name: repo.full_name,
            clone_url: repo.clone_url,
            html_url: repo.html_url,
            service: repo.service,
        }
    }
}

#[derive(Debug, Clone, SimpleObject)]
#[graphql(name = "MiscSetting")]
pub struct MiscSettingObject {
    pub name: String,
    pub value: i32,
    pub unit: Option<String>,
}

#[derive(Debug, Clone, SimpleObject)]
#[graphql(name = "PluginSetting")]
pub struct PluginSettingObject {
    pub name: String,
    pub active: bool,
}

#[derive(Debug, Clone, SimpleObject)]
#[graphql(name = "Settings")]
pub struct SettingsObject {
    pub misc: Vec<MiscSettingObject>,
    pub plugins: Vec<PluginSettingObject>,
}

impl From<Settings> for SettingsObject {
    fn from(settings: Settings) -> Self {
        Self {
            misc: settings
                .misc
                .into_iter()
                .map(|m| MiscSettingObject {
                    name: m.name,
                    value: m.value,
                    unit: m.unit,
                })
                .collect(),
            plugins: settings
                .plugins
                .into_iter()
                .map(|p| PluginSettingObject {
                    name: p.name,
                    active: p.active,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, InputObject)]
#[graphql(name = "Minput")]
pub struct MiscSettingInput {
    pub name: String,
    pub value: i32,
    pub unit: Option<String>,
}

#[derive(Debug, Clone, InputObject)]
#[graphql(name = "Pinput")]
pub struct PluginSettingInput {
    pub name: String,
    pub active: bool,
}

#[derive(Debug, Clone, InputObject)]
#[graphql(name = "Sinput")]
pub struct SettingsInput {
    #[graphql(default)]
    pub misc: Vec<MiscSettingInput>,
    #[graphql(default)]
    pub plugins: Vec<PluginSettingInput>,
}

impl From<SettingsInput> for Settings {
    fn from(input: SettingsInput) -> Self {
        Self {
            misc: input
                .misc
                .into_iter()
                .map(|m| MiscSetting {
                    name: m.name,
                    value: m.value,
                    unit: m.unit,
                })
                .collect(),
            plugins: input
                .plugins
                .into_iter()
                .map(|p| PluginSetting {
                    name: p.name,
                    active: p.active,
                })
                .collect(),
        }
    }
}
