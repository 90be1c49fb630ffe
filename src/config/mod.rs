use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::core::transport::{BearerTokenSigner, CredentialSigner, HttpTransport};

pub const DEFAULT_CONFIG_FILE: &str = "vidscrape.toml";
pub const VIMEO_TOKEN_ENV: &str = "VIDSCRAPE_VIMEO_TOKEN";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Credentials {
    pub vimeo_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub user_agent: String,
    /// Seconds.
    pub timeout: u64,
    pub concurrent_fetches: usize,
    pub credentials: Credentials,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            user_agent: format!("vidscrape/{}", env!("CARGO_PKG_VERSION")),
            timeout: 30,
            concurrent_fetches: 4,
            credentials: Credentials::default(),
        }
    }
}

impl Config {
    /// Reads `path`, or `vidscrape.toml` in the working directory when no
    /// path is given and that file exists. The token environment variable
    /// wins over the file.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = match path {
            Some(path) => Some(path.to_path_buf()),
            None => Some(PathBuf::from(DEFAULT_CONFIG_FILE)).filter(|p| p.exists()),
        };

        let mut config = match path {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        if let Ok(token) = std::env::var(VIMEO_TOKEN_ENV) {
            config.apply_vimeo_token(token);
        }
        Ok(config)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&text)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        tracing::debug!("loaded config from {}", path.display());
        Ok(config)
    }

    fn apply_vimeo_token(&mut self, token: String) {
        let token = token.trim().to_string();
        if !token.is_empty() {
            self.credentials.vimeo_token = Some(token);
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    pub fn transport(&self) -> anyhow::Result<HttpTransport> {
        Ok(HttpTransport::new(&self.user_agent, self.timeout())?)
    }

    /// `None` leaves suites on their public tier.
    pub fn signer(&self) -> Option<Arc<dyn CredentialSigner>> {
        self.credentials
            .vimeo_token
            .as_deref()
            .filter(|token| !token.is_empty())
            .map(|token| Arc::new(BearerTokenSigner::new(token)) as Arc<dyn CredentialSigner>)
    }
}
