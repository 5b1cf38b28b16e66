//! Native implementation of the tile fetcher.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::OfflineError;
use crate::tiles::TileFetcher;

const USER_AGENT: &str = concat!("lux-offline/", env!("CARGO_PKG_VERSION"));

/// Loads tiles with a `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpTileFetcher {
    http_client: reqwest::Client,
}

impl HttpTileFetcher {
    /// Creates a fetcher with its own HTTP client.
    pub fn new() -> Result<Self, OfflineError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|err| OfflineError::Configuration(format!("http client: {err}")))?;

        Ok(Self::with_client(http_client))
    }

    /// Creates a fetcher sharing an existing client.
    pub fn with_client(http_client: reqwest::Client) -> Self {
        Self { http_client }
    }
}

#[async_trait(?Send)]
impl TileFetcher for HttpTileFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes, OfflineError> {
        let response = self.http_client.get(url).send().await?;
        if !response.status().is_success() {
            log::info!(
                "Failed to load {url}: {}, {:?}",
                response.status(),
                response.text().await
            );
            return Err(OfflineError::IO);
        }

        Ok(response.bytes().await?)
    }
}
