//! Forward-only pagination over a site's video listing.

use crate::core::entry::FeedEntry;
use crate::core::error::{Error, Result};
use crate::core::metadata::VideoRecord;
use crate::core::suite::{ApiTier, Suite, UrlMatch};
use crate::core::transport::{Client, Request, Response};
use serde::Serialize;

/// One raw listing item, before the suite maps it to a record.
#[derive(Debug, Clone, PartialEq)]
pub enum RawItem {
    Json(serde_json::Value),
    Entry(FeedEntry),
}

/// Metadata about the feed itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FeedInfo {
    pub title: Option<String>,
    pub description: Option<String>,
    pub video_count: Option<u64>,
    pub webpage: Option<String>,
    pub thumbnail_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedPage {
    pub items: Vec<RawItem>,
    /// Total item count, when the server reports one.
    pub total_hint: Option<u64>,
    /// The server said explicitly that there is nothing here.
    pub no_results: bool,
}

impl FeedPage {
    pub fn new(items: Vec<RawItem>) -> Self {
        Self {
            items,
            ..Self::default()
        }
    }

    pub fn no_results() -> Self {
        Self {
            no_results: true,
            ..Self::default()
        }
    }
}

/// Per-session adapter a suite hands out for one feed URL.
pub trait FeedSource: Send + Sync {
    /// Fixed for the session's lifetime.
    fn per_page(&self) -> usize;

    fn info_request(&self) -> Result<Request>;

    fn parse_info(&self, response: &Response) -> Result<FeedInfo>;

    /// Request for a 1-based page.
    fn page_request(&self, page: u32) -> Result<Request>;

    /// Sees every response, successful or not; status handling is the
    /// source's call.
    fn parse_page(&self, response: &Response) -> Result<FeedPage>;

    fn item_to_record(&self, item: &RawItem) -> Result<VideoRecord>;
}

/// Why a feed stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// The known total item count was reached.
    TotalReached,
    /// A page came back smaller than the page size.
    ShortPage,
    /// The server signalled that there are no results.
    NoResults,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedState {
    Unloaded,
    Loaded,
    Fetching,
    Exhausted(Termination),
}

pub struct VideoFeed {
    url: String,
    source: Box<dyn FeedSource>,
    client: Client,
    per_page: usize,
    info: Option<FeedInfo>,
    cursor: u32,
    items_seen: u64,
    total: Option<u64>,
    termination: Option<Termination>,
    last_response: Option<Response>,
}

impl VideoFeed {
    /// Opens a session on `feed`. The capability tier, and with it the page
    /// size, is chosen here and never changes.
    pub fn open(suite: &dyn Suite, feed: &UrlMatch, client: Client) -> Result<Self> {
        let source = suite.feed_source(feed, ApiTier::for_client(&client))?;
        Ok(Self::with_source(feed.url(), source, client))
    }

    pub fn with_source(url: impl Into<String>, source: Box<dyn FeedSource>, client: Client) -> Self {
        let per_page = source.per_page();
        Self {
            url: url.into(),
            source,
            client,
            per_page,
            info: None,
            cursor: 1,
            items_seen: 0,
            total: None,
            termination: None,
            last_response: None,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn per_page(&self) -> usize {
        self.per_page
    }

    pub fn info(&self) -> Option<&FeedInfo> {
        self.info.as_ref()
    }

    pub fn is_loaded(&self) -> bool {
        self.info.is_some()
    }

    pub fn state(&self) -> FeedState {
        match (self.termination, self.cursor > 1, self.is_loaded()) {
            (Some(reason), _, _) => FeedState::Exhausted(reason),
            (None, true, _) => FeedState::Fetching,
            (None, false, true) => FeedState::Loaded,
            (None, false, false) => FeedState::Unloaded,
        }
    }

    pub fn termination(&self) -> Option<Termination> {
        self.termination
    }

    /// Total item count, from the feed info or a page's hint.
    pub fn total(&self) -> Option<u64> {
        self.total
    }

    pub fn items_seen(&self) -> u64 {
        self.items_seen
    }

    /// ETag of the most recent page response, when the site sends one.
    pub fn etag(&self) -> Option<&str> {
        self.last_response.as_ref().and_then(|r| r.header("etag"))
    }

    pub fn last_response(&self) -> Option<&Response> {
        self.last_response.as_ref()
    }

    /// Fetches feed metadata once. Later calls do nothing.
    pub async fn load(&mut self) -> Result<&FeedInfo> {
        if self.info.is_none() {
            let response = self.client.send(self.source.info_request()?).await?;
            if !response.is_success() {
                return Err(Error::Transport(format!(
                    "HTTP {} loading feed {}",
                    response.status, self.url
                )));
            }
            let info = self.source.parse_info(&response)?;
            if self.total.is_none() {
                self.total = info.video_count;
            }
            self.info = Some(info);
        }
        self.info
            .as_ref()
            .ok_or_else(|| Error::parse("feed info missing after load"))
    }

    /// Fetches the next page and maps its items. Once exhausted this returns
    /// an empty page without fetching. A failed fetch leaves the cursor
    /// where it was.
    pub async fn next_page(&mut self) -> Result<Vec<Result<VideoRecord>>> {
        if self.termination.is_some() {
            return Ok(Vec::new());
        }

        let response = self
            .client
            .send(self.source.page_request(self.cursor)?)
            .await?;
        let page = self.source.parse_page(&response)?;
        self.last_response = Some(response);

        tracing::debug!(
            "{}: page {} returned {} items",
            self.url,
            self.cursor,
            page.items.len()
        );
        self.cursor += 1;
        if page.total_hint.is_some() {
            self.total = page.total_hint;
        }

        if page.no_results {
            self.finish(Termination::NoResults);
            return Ok(Vec::new());
        }

        self.items_seen += page.items.len() as u64;
        if self.total.is_some_and(|total| self.items_seen >= total) {
            self.finish(Termination::TotalReached);
        } else if page.items.len() < self.per_page {
            self.finish(Termination::ShortPage);
        }

        Ok(page
            .items
            .iter()
            .map(|item| self.source.item_to_record(item))
            .collect())
    }

    /// Walks pages until the feed is exhausted or `limit` items were
    /// gathered.
    pub async fn collect(&mut self, limit: Option<usize>) -> Result<Vec<Result<VideoRecord>>> {
        let mut items = Vec::new();
        while self.termination.is_none() && limit.map_or(true, |limit| items.len() < limit) {
            items.extend(self.next_page().await?);
        }
        if let Some(limit) = limit {
            items.truncate(limit);
        }
        Ok(items)
    }

    fn finish(&mut self, reason: Termination) {
        tracing::debug!("{}: exhausted ({:?})", self.url, reason);
        self.termination = Some(reason);
    }
}
