//! Configuration: where the token lives and how to reach the login service

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::auth::store::TOKEN_FILE_NAME;
use crate::auth::{AuthConfig, QuestradeFlow, TokenStore};
use crate::error::{Result, TokenError};

/// Application configuration
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Token file; `~/questrade_token.json` when unset
    pub token_file: Option<PathBuf>,
    /// Questrade login endpoints and browser
    pub auth: AuthConfig,
}

impl Config {
    /// Get config directory path
    fn config_dir() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("com", "questrade-token", "questrade-token")
            .ok_or_else(|| TokenError::Config("could not determine config directory".into()))?;
        Ok(proj_dirs.config_dir().to_path_buf())
    }

    /// Get config file path
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from `path`; a missing file means defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| {
            TokenError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        toml::from_str(&content)
            .map_err(|e| TokenError::Config(format!("failed to parse {}: {}", path.display(), e)))
    }

    /// Resolved token file path
    pub fn token_path(&self) -> Result<PathBuf> {
        match &self.token_file {
            Some(path) => Ok(path.clone()),
            None => default_token_path(),
        }
    }

    /// Build the Questrade-backed token store described by this config
    pub fn token_store(&self) -> Result<TokenStore<QuestradeFlow>> {
        let path = self.token_path()?;
        let flow = QuestradeFlow::new(self.auth.clone(), &path);
        Ok(TokenStore::new(path, flow))
    }
}

/// `<home>/questrade_token.json`
pub fn default_token_path() -> Result<PathBuf> {
    let home = home::home_dir()
        .ok_or_else(|| TokenError::Config("could not determine home directory".into()))?;
    Ok(home.join(TOKEN_FILE_NAME))
}
