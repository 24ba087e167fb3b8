//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The client secret is loaded from the LINKEDIN_CLIENT_SECRET env var or
//! client_secret_file, never stored in the TOML directly to avoid leaking
//! secrets.

use anyhow::{Context, bail};
use linkedin_oauth::Secret;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub server: ServerConfig,
}

/// LinkedIn application settings
#[derive(Debug, Deserialize)]
pub struct AppConfig {
    pub client_id: String,
    #[serde(skip)]
    pub client_secret: Option<Secret>,
    /// Path to a file containing the client secret (alternative to the
    /// LINKEDIN_CLIENT_SECRET env var)
    #[serde(default)]
    pub client_secret_file: Option<PathBuf>,
    /// Scopes requested on login
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
}

/// HTTP server settings
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    /// Externally visible base URL, used to build the redirect_uri
    pub public_url: String,
}

fn default_scopes() -> Vec<String> {
    vec!["r_basicprofile".to_string()]
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment
    /// variables.
    ///
    /// Client secret resolution order:
    /// 1. LINKEDIN_CLIENT_SECRET env var
    /// 2. client_secret_file path from config
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let mut config: Config = toml::from_str(&contents).context("parsing config file")?;

        if config.app.client_id.is_empty() {
            bail!("client_id must not be empty");
        }

        if !config.server.public_url.starts_with("http://")
            && !config.server.public_url.starts_with("https://")
        {
            bail!(
                "public_url must start with http:// or https://, got: {}",
                config.server.public_url
            );
        }

        // Resolve client secret: env var takes precedence over file
        if let Ok(secret) = std::env::var("LINKEDIN_CLIENT_SECRET") {
            config.app.client_secret = Some(Secret::new(secret));
        } else if let Some(ref secret_file) = config.app.client_secret_file {
            let secret = std::fs::read_to_string(secret_file).with_context(|| {
                format!("reading client_secret_file {}", secret_file.display())
            })?;
            let secret = secret.trim().to_owned();
            if !secret.is_empty() {
                config.app.client_secret = Some(Secret::new(secret));
            }
        }

        Ok(config)
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("linkedin-login-demo.toml")
    }
}
