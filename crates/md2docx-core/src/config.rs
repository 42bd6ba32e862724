//! Application configuration management.
//!
//! This module handles loading the application configuration:
//! backend URL, environment, and optional directory overrides. Environment
//! variables take precedence over the file.
//!
//! Configuration is stored at `~/.config/md2docx/config.json`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::auth::cookies::{CookieOptions, SameSite, DEFAULT_TTL_DAYS};

/// Application name used for config/data directory paths
const APP_NAME: &str = "md2docx";

/// Config file name
const CONFIG_FILE: &str = "config.json";

pub const DEFAULT_API_BASE_URL: &str = "https://markdown-to-docx.onrender.com";

const ENV_API_URL: &str = "MD2DOCX_API_URL";
const ENV_ENVIRONMENT: &str = "MD2DOCX_ENV";
const ENV_STORAGE_DIR: &str = "MD2DOCX_STORAGE_DIR";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Production,
    Development,
}

impl Environment {
    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "production" | "prod" => Some(Self::Production),
            "development" | "dev" => Some(Self::Development),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default)]
    pub environment: Environment,
    #[serde(default)]
    pub storage_dir: Option<PathBuf>,
    #[serde(default)]
    pub download_dir: Option<PathBuf>,
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            environment: Environment::default(),
            storage_dir: None,
            download_dir: None,
        }
    }
}

impl Config {
    /// Load from disk, then apply environment overrides
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config: {}", path.display()))?;
            serde_json::from_str(&contents).context("Failed to parse config")?
        } else {
            Self::default()
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(url) = var(ENV_API_URL).filter(|s| !s.is_empty()) {
            self.api_base_url = url;
        }
        if let Some(env) = var(ENV_ENVIRONMENT).as_deref().and_then(Environment::parse) {
            self.environment = env;
        }
        if let Some(dir) = var(ENV_STORAGE_DIR).filter(|s| !s.is_empty()) {
            self.storage_dir = Some(PathBuf::from(dir));
        }
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    /// Attributes for persisted credentials: secure-only in production
    pub fn cookie_options(&self) -> CookieOptions {
        CookieOptions {
            secure_only: self.is_production(),
            same_site: SameSite::Lax,
            ttl_days: DEFAULT_TTL_DAYS,
        }
    }

    /// Directory holding the credential jar. An error means no storage medium.
    pub fn storage_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.storage_dir {
            return Ok(dir.clone());
        }
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    pub fn log_dir(&self) -> Result<PathBuf> {
        Ok(self.storage_dir()?.join("logs"))
    }

    /// Where downloaded archives are saved
    pub fn download_dir(&self) -> PathBuf {
        self.download_dir
            .clone()
            .or_else(dirs::download_dir)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}
