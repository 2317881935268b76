//! User configuration, stored as `config.toml` next to the secrets file.
//!
//! Nothing in here is secret. Client identities and tokens go through a
//! [`SecretStore`](crate::storage::SecretStore).

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

const APP_DIR: &str = "redline";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecretBackend {
    File,
    Keyring,
}

impl std::str::FromStr for SecretBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(SecretBackend::File),
            "keyring" | "keychain" => Ok(SecretBackend::Keyring),
            other => anyhow::bail!("Unknown secret backend '{}'. Available: file, keyring", other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    /// Middle segment of the User-Agent (`platform:bundle-id:version`).
    pub bundle_id: String,
    pub secret_backend: SecretBackend,
    pub http_timeout_secs: u64,
    /// Reply depth requested from the comments endpoint.
    pub comment_depth: u32,
    pub comment_sort: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            redirect_uri: "http://localhost:8484/callback".to_string(),
            scopes: ["identity", "read", "submit", "vote", "history"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            bundle_id: "dev.redline".to_string(),
            secret_backend: SecretBackend::File,
            http_timeout_secs: 30,
            comment_depth: 15,
            comment_sort: "confidence".to_string(),
        }
    }
}

impl Config {
    /// Load from the default location, then apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&config_dir()?.join(CONFIG_FILE))?;
        config.apply_env()?;
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let dir = config_dir()?;
        fs::create_dir_all(&dir)?;
        self.save_to(&dir.join(CONFIG_FILE))
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(backend) = std::env::var("REDLINE_SECRET_BACKEND") {
            self.secret_backend = backend.parse()?;
        }
        if let Ok(uri) = std::env::var("REDLINE_REDIRECT_URI") {
            self.redirect_uri = uri.trim().to_string();
        }
        Ok(())
    }
}

/// `<config_dir>/redline`
pub fn config_dir() -> Result<PathBuf> {
    Ok(dirs::config_dir()
        .context("Could not determine config directory")?
        .join(APP_DIR))
}
