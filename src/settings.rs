//! Editor settings shared by every user, kept as a JSON file in the data dir.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MiscSetting {
    pub name: String,
    pub value: i32,
    #[serde(default)]
    pub unit: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginSetting {
    pub name: String,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub misc: Vec<MiscSetting>,
    #[serde(default)]
    pub plugins: Vec<PluginSetting>,
}

impl Default for Settings {
    fn default() -> Self {
        let misc = |name: &str| MiscSetting {
            name: name.to_string(),
            value: 1000,
            unit: Some("ms".to_string()),
        };
        let plugin = |name: &str, active: bool| PluginSetting {
            name: name.to_string(),
            active,
        };

        Self {
            misc: vec![misc("Autosave Interval"), misc("Autodelete Interval")],
            plugins: vec![
                plugin("robot-language-server", true),
                plugin("c-language-server", false),
                plugin("cypress-language-server", false),
            ],
        }
    }
}

pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Current settings, or the defaults when nothing was saved yet.
    pub async fn load(&self) -> Result<Settings> {
        match tokio::fs::read(&self.path).await {
            Ok(raw) => serde_json::from_slice(&raw).map_err(|e| {
                Error::Config(format!("invalid settings file {}: {e}", self.path.display()))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Settings::default()),
            Err(e) => Err(Error::Io(e)),
        }
    }

    pub async fn save(&self, settings: &Settings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let raw = serde_json::to_vec_pretty(settings)
            .map_err(|e| Error::Config(format!("failed to encode settings: {e}")))?;
        tokio::fs::write(&self.path, raw).await?;
        Ok(())
    }
}
