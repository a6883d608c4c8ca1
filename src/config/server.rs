use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::OAuthConfig;
use crate::error::{Error, Result};
use crate::types::ServiceName;

pub const CONFIG_FILE_NAME: &str = "amandus.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    /// HMAC secret for session tokens. A random secret is generated at startup
    /// when unset, which logs everyone out on restart.
    pub jwt_secret: Option<String>,
    pub git_timeout_secs: u64,
    pub oauth: OAuthConfig,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> std::result::Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }

    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("amandus.db")
    }

    #[must_use]
    pub fn repositories_dir(&self) -> PathBuf {
        self.data_dir.join("repositories")
    }

    #[must_use]
    pub fn settings_path(&self) -> PathBuf {
        self.data_dir.join("settings.json")
    }

    #[must_use]
    pub fn git_timeout(&self) -> Duration {
        Duration::from_secs(self.git_timeout_secs)
    }

    /// Reads a TOML config file. A missing file yields the defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }

    /// Loads `config_path`, or `<data_dir>/amandus.toml`, then applies the
    /// process environment on top.
    pub fn load(config_path: Option<&Path>, data_dir: &Path) -> Result<Self> {
        let path = config_path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| data_dir.join(CONFIG_FILE_NAME));

        if config_path.is_some() && !path.exists() {
            return Err(Error::Config(format!(
                "config file not found: {}",
                path.display()
            )));
        }

        let mut config = Self::from_file(&path)?;
        config.data_dir = data_dir.to_path_buf();
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Overrides settings from environment variables looked up with `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(secret) = lookup("AMANDUS_JWT_SECRET").filter(|s| !s.is_empty()) {
            self.jwt_secret = Some(secret);
        }

        if let Some(timeout) = lookup("AMANDUS_GIT_TIMEOUT_SECS") {
            self.git_timeout_secs = timeout.parse().map_err(|_| {
                Error::Config(format!("AMANDUS_GIT_TIMEOUT_SECS must be a number, got '{timeout}'"))
            })?;
        }

        for service in ServiceName::ALL {
            let prefix = service.as_str().to_ascii_uppercase();
            let provider = self.oauth.provider_mut(service);

            if let Some(v) = lookup(&format!("{prefix}_CLIENT_ID")) {
                provider.client_id = Some(v);
            }
            if let Some(v) = lookup(&format!("{prefix}_CLIENT_SECRET")) {
                provider.client_secret = Some(v);
            }
            if let Some(v) = lookup(&format!("{prefix}_CB_URL")) {
                provider.callback_url = Some(v);
            }
        }

        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3001,
            data_dir: PathBuf::from("./data"),
            jwt_secret: None,
            git_timeout_secs: crate::workspace::DEFAULT_GIT_TIMEOUT.as_secs(),
            oauth: OAuthConfig::default(),
        }
    }
}
