use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::adapters::xh::DEFAULT_XH_BIN;
use crate::client::url::DevOpsUrl;
use crate::domain::error::ConfigError;

/// Optional TOML file with the same keys as the connection flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub url: Option<String>,
    pub token: Option<String>,
    pub xh_bin: Option<String>,
}

impl ConfigFile {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Connection settings given on the command line (or their env vars).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionOverrides {
    pub url: Option<String>,
    pub token: Option<String>,
    pub xh_bin: Option<String>,
    pub config: Option<PathBuf>,
}

/// Fully resolved connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub url: DevOpsUrl,
    pub token: String,
    pub xh_bin: String,
}

impl ClientConfig {
    /// Flags and environment win over the config file.
    pub fn resolve(overrides: &ConnectionOverrides) -> Result<Self, ConfigError> {
        let file = match overrides.config.as_deref() {
            Some(path) => ConfigFile::load(path)?,
            None => ConfigFile::default(),
        };
        let url = overrides
            .url
            .clone()
            .or(file.url)
            .filter(|url| !url.trim().is_empty())
            .ok_or(ConfigError::MissingUrl)?;
        let token = overrides
            .token
            .clone()
            .or(file.token)
            .filter(|token| !token.is_empty())
            .ok_or(ConfigError::MissingToken)?;
        let xh_bin = overrides
            .xh_bin
            .clone()
            .or(file.xh_bin)
            .unwrap_or_else(|| DEFAULT_XH_BIN.to_string());
        Ok(Self {
            url: DevOpsUrl::parse(&url)?,
            token,
            xh_bin,
        })
    }
}
