use crate::core::error::Result;
use crate::core::feed::VideoFeed;
use crate::core::metadata::VideoRecord;
use crate::core::registry::{self, Registry};
use crate::core::search::{SearchQuery, SearchSession};
use crate::core::suite::{self, Extraction};
use crate::core::transport::{Client, CredentialSigner, Transport};
use std::sync::Arc;

/// Entry point for consumers: resolves URLs against a registry and runs
/// suites over a transport.
#[derive(Clone)]
pub struct Scraper {
    client: Client,
    registry: Arc<Registry>,
}

impl Scraper {
    /// A scraper over the built-in suites.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::with_registry(transport, registry::global())
    }

    pub fn with_registry(transport: Arc<dyn Transport>, registry: Arc<Registry>) -> Self {
        Self {
            client: Client::new(transport),
            registry,
        }
    }

    pub fn with_signer(mut self, signer: Arc<dyn CredentialSigner>) -> Self {
        self.client = self.client.with_signer(signer);
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub async fn fetch_video(&self, url: &str) -> Result<VideoRecord> {
        Ok(self.fetch_video_detailed(url).await?.record)
    }

    /// Like [`Scraper::fetch_video`], keeping what each method did.
    pub async fn fetch_video_detailed(&self, url: &str) -> Result<Extraction> {
        let (suite, video) = self.registry.suite_for_url(url)?;
        tracing::debug!("{} handled by {}", url, suite.id());
        suite::fetch_video(suite.as_ref(), &video, &self.client).await
    }

    pub fn feed(&self, url: &str) -> Result<VideoFeed> {
        let (suite, feed) = self.registry.suite_for_feed_url(url)?;
        VideoFeed::open(suite.as_ref(), &feed, self.client.clone())
    }

    pub fn search(&self, suite_id: &str, query: SearchQuery) -> Result<SearchSession> {
        let suite = self.registry.get(suite_id)?;
        SearchSession::new(suite, query, self.client.clone())
    }
}
