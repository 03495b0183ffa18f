//! HTTP access for the manifest and binary artifacts.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::info;

use crate::domain::error::Result;
use crate::fsutil;

/// HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    /// Skip TLS certificate verification for this client only.
    pub accept_invalid_certs: bool,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        HttpConfig {
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(5),
            accept_invalid_certs: false,
            user_agent: format!("buildtools/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Source of remote documents and files.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch a small text document.
    async fn get_text(&self, url: &str) -> Result<String>;

    /// Download `url` to `target`. The target only appears once complete.
    async fn download(&self, url: &str, target: &Path) -> Result<()>;
}

/// [`Fetcher`] backed by `reqwest`.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .connect_timeout(config.connect_timeout)
            .read_timeout(config.read_timeout)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()?;
        Ok(HttpFetcher { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn get_text(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.text().await?)
    }

    async fn download(&self, url: &str, target: &Path) -> Result<()> {
        info!(url, "Starting download");
        let response = self.client.get(url).send().await?.error_for_status()?;
        let bytes = response.bytes().await?;

        fsutil::write_atomic(target, &bytes)?;
        info!(
            target = %target.display(),
            size = bytes.len(),
            sha256 = %sha256_hex(&bytes),
            "Downloaded file"
        );
        Ok(())
    }
}

/// Descriptive digest logged for downloads.
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
