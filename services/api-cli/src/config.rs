//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! `API_BASE_URL` overrides `[api].base_url`. Every section is optional; a
//! missing file is only an error when its path was given explicitly.

use serde::Deserialize;
use session_client::{AuthConfig, ClientConfig, SessionRoutes};
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG_FILE: &str = "api-cli.toml";

/// Root configuration
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

/// Upstream API settings
#[derive(Debug, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout(),
        }
    }
}

/// Session persistence and navigation targets
#[derive(Debug, Default, Deserialize)]
pub struct SessionConfig {
    /// Credential file; omitted means the session lives only for this run
    #[serde(default)]
    pub credentials_file: Option<PathBuf>,
    #[serde(flatten)]
    pub routes: SessionRoutes,
}

fn default_base_url() -> String {
    "http://127.0.0.1:8000/api".to_string()
}

fn default_timeout() -> u64 {
    30
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Like `load`, but a missing file yields the defaults.
    pub fn load_or_default(path: &Path) -> common::Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Self::from_toml("")
        }
    }

    fn from_toml(contents: &str) -> common::Result<Self> {
        let mut config: Config = toml::from_str(contents)?;

        if let Ok(url) = std::env::var("API_BASE_URL") {
            config.api.base_url = url;
        }
        if let Some(file) = config.session.credentials_file.take() {
            config.session.credentials_file = Some(expand_home(&file));
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> common::Result<()> {
        if !self.api.base_url.starts_with("http://") && !self.api.base_url.starts_with("https://")
        {
            return Err(common::Error::Config(format!(
                "base_url must start with http:// or https://, got: {}",
                self.api.base_url
            )));
        }

        if self.api.timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        self.auth.validate().map_err(common::Error::Config)
    }

    /// Library-side settings for `ApiClient`.
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            auth: self.auth.clone(),
            session: self.session.routes.clone(),
        }
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    ///
    /// The flag reports whether the path was chosen explicitly.
    pub fn resolve_path(cli_path: Option<&str>) -> (PathBuf, bool) {
        if let Some(p) = cli_path {
            return (PathBuf::from(p), true);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return (PathBuf::from(p), true);
        }
        (PathBuf::from(DEFAULT_CONFIG_FILE), false)
    }
}

/// Expand a leading `~/` using `HOME`.
fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), std::env::var_os("HOME")) {
        (Ok(rest), Some(home)) => PathBuf::from(home).join(rest),
        _ => path.to_path_buf(),
    }
}
