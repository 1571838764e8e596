use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::login::DEFAULT_USER_INFO;

/// Env override for [`LoginConfig::frontend_url`].
pub const ENV_FRONTEND_URL: &str = "QRLOGIN_FRONTEND_URL";
/// Env override for [`GatewayConfig::host`].
pub const ENV_HOST: &str = "QRLOGIN_HOST";
/// Env override for [`GatewayConfig::port`].
pub const ENV_PORT: &str = "QRLOGIN_PORT";

/// Top-level configuration, loaded from `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub login: LoginConfig,
}

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Allow binding a non-loopback address. Off by default: the gateway is
    /// meant to sit behind a reverse proxy that terminates TLS.
    #[serde(default)]
    pub allow_public_bind: bool,
}

/// Login session settings. The 5-minute validity window is fixed and
/// deliberately absent here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginConfig {
    /// Base URL the scanning device opens. When unset, the gateway uses
    /// `http://{Host header}` of the generate request.
    #[serde(default)]
    pub frontend_url: Option<String>,
    /// Stored as `user_info` when the confirming device sends none.
    #[serde(default = "default_user_info")]
    pub default_user_info: String,
    /// Interval of the background expiry sweep. 0 disables it; expiry is
    /// still enforced on every read and create.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

fn default_host() -> String {
    "127.0.0.1".into()
}

fn default_port() -> u16 {
    3000
}

fn default_user_info() -> String {
    DEFAULT_USER_INFO.into()
}

fn default_sweep_interval_secs() -> u64 {
    60
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            allow_public_bind: false,
        }
    }
}

impl Default for LoginConfig {
    fn default() -> Self {
        Self {
            frontend_url: None,
            default_user_info: default_user_info(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl Config {
    /// Default location: `<platform config dir>/qrlogin/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "qrlogin").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Load config from `path`, or from [`Config::default_path`] when `None`,
    /// then validate it.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = Self::resolve(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Read the config file and apply environment overrides without
    /// validating, so callers can layer further overrides first.
    ///
    /// An explicit path must exist. A missing default file yields defaults.
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        Self::resolve_from(path, Self::default_path())
    }

    fn resolve_from(path: Option<&Path>, fallback: Option<PathBuf>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => match fallback {
                Some(p) if p.exists() => Self::from_file(&p)?,
                _ => {
                    tracing::debug!("No config file found, using defaults");
                    Self::default()
                }
            },
        };

        config.apply_env_overrides()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        tracing::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Environment variables take priority over the config file.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(url) = env_non_empty(ENV_FRONTEND_URL) {
            self.login.frontend_url = Some(url);
        }
        if let Some(host) = env_non_empty(ENV_HOST) {
            self.gateway.host = host;
        }
        if let Some(port) = env_non_empty(ENV_PORT) {
            self.gateway.port = port
                .parse()
                .with_context(|| format!("{ENV_PORT} must be a port number, got '{port}'"))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.gateway.host.trim().is_empty() {
            anyhow::bail!("gateway.host cannot be empty");
        }
        if self.gateway.port == 0 {
            anyhow::bail!("gateway.port must be non-zero");
        }
        if self.login.default_user_info.trim().is_empty() {
            anyhow::bail!("login.default_user_info cannot be empty");
        }
        if let Some(url) = &self.login.frontend_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                anyhow::bail!(
                    "login.frontend_url must start with http:// or https://, got '{url}'"
                );
            }
        }
        Ok(())
    }

    /// Write config as TOML to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        std::fs::write(path, self.to_toml()?)
            .with_context(|| format!("Failed to write config file {}", path.display()))?;
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config")
    }
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}
