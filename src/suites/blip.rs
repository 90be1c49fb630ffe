//! blip.tv, which publishes everything as RSS: single videos, show feeds and
//! search results.

use crate::core::entry::{parse_rss, FeedEntry, RssChannel};
use crate::core::error::{Error, Result};
use crate::core::extractor::ExtractionMethod;
use crate::core::feed::{FeedInfo, FeedPage, FeedSource, RawItem};
use crate::core::metadata::{Field, VideoRecord};
use crate::core::search::{SearchPage, SearchQuery};
use crate::core::suite::{ApiTier, OrderBy, Suite, UrlMatch};
use crate::core::thumbnail::{accepted_enclosures, default_enclosure, resolve_entry_thumbnail};
use crate::core::transport::{Request, Response};
use crate::utils::clean_description_html;
use chrono::{DateTime, Utc};
use regex::Regex;
use std::sync::LazyLock;

const SEARCH_URL: &str = "http://blip.tv/rss";
const NO_RESULTS: &str = "Search returned no results.";
const PER_PAGE: usize = 20;

static VIDEO_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://(?:www\.)?blip\.tv/(?P<user>[\w-]+)/(?P<slug>[\w-]+)-(?P<video_id>\d+)/?$")
        .expect("invalid blip video regex")
});

static FEED_HOST_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://(?P<user>[\w-]+)\.blip\.tv(?:/rss)?/?$").expect("invalid blip feed regex")
});

static FEED_PATH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://(?:www\.)?blip\.tv/(?P<user>[\w-]+)/rss/?$")
        .expect("invalid blip feed regex")
});

pub struct BlipSuite {
    methods: Vec<Box<dyn ExtractionMethod>>,
}

impl BlipSuite {
    pub fn new() -> Self {
        Self {
            methods: vec![Box::new(BlipRssMethod)],
        }
    }
}

impl Default for BlipSuite {
    fn default() -> Self {
        Self::new()
    }
}

impl Suite for BlipSuite {
    fn id(&self) -> &'static str {
        "blip"
    }

    fn display_name(&self) -> &'static str {
        "Blip.tv"
    }

    fn video_regex(&self) -> &Regex {
        &VIDEO_RE
    }

    fn methods(&self) -> &[Box<dyn ExtractionMethod>] {
        &self.methods
    }

    fn match_feed_url(&self, url: &str) -> Option<UrlMatch> {
        UrlMatch::capture(&FEED_HOST_RE, url)
            .filter(|feed| feed.get("user") != Some("www"))
            .or_else(|| UrlMatch::capture(&FEED_PATH_RE, url))
    }

    fn feed_source(&self, feed: &UrlMatch, _tier: ApiTier) -> Result<Box<dyn FeedSource>> {
        Ok(Box::new(BlipFeedSource {
            user: feed.require("user")?.to_string(),
        }))
    }

    fn order_bys(&self) -> &[OrderBy] {
        &[OrderBy::Latest, OrderBy::Relevant]
    }

    fn supports_search(&self) -> bool {
        true
    }

    /// Both orderings send the same query; blip's own sort options return
    /// unrelated videos.
    fn search_request(&self, query: &SearchQuery, _page: Option<u32>) -> Result<Request> {
        Ok(Request::get(SEARCH_URL).param("q", query.search_string()))
    }

    fn parse_search_page(&self, response: &Response) -> Result<SearchPage> {
        let page = feed_page(&parse_rss(&response.body)?);
        let count = page.items.len();
        Ok(SearchPage {
            items: page.items,
            total: None,
            page: 1,
            per_page: u32::try_from(count).unwrap_or(u32::MAX),
        })
    }

    fn parse_search_result(&self, item: &RawItem) -> Result<VideoRecord> {
        match item {
            RawItem::Entry(entry) => entry_to_record(entry),
            RawItem::Json(_) => Err(Error::parse("blip search results are RSS items")),
        }
    }
}

/// A single video's RSS view.
struct BlipRssMethod;

impl BlipRssMethod {
    const FIELDS: [Field; 12] = [
        Field::Title,
        Field::Link,
        Field::Description,
        Field::User,
        Field::UserUrl,
        Field::PublishDatetime,
        Field::Tags,
        Field::FileUrl,
        Field::FileUrlMimetype,
        Field::ThumbnailUrl,
        Field::EmbedCode,
        Field::Guid,
    ];
}

impl ExtractionMethod for BlipRssMethod {
    fn name(&self) -> &str {
        "rss"
    }

    fn fields(&self) -> &[Field] {
        &Self::FIELDS
    }

    fn request(&self, video: &UrlMatch) -> Result<Request> {
        Ok(Request::get(format!("http://blip.tv/rss/view/{}", video.video_id()?)))
    }

    fn process(&self, video: &UrlMatch, response: &Response) -> Result<VideoRecord> {
        let channel = parse_rss(&response.body)?;
        let entry = channel
            .entries
            .first()
            .ok_or_else(|| Error::field_not_found(format!("rss item for {}", video.url())))?;
        entry_to_record(entry)
    }
}

struct BlipFeedSource {
    user: String,
}

impl BlipFeedSource {
    fn feed_url(&self) -> String {
        format!("http://blip.tv/{}/rss", self.user)
    }
}

impl FeedSource for BlipFeedSource {
    fn per_page(&self) -> usize {
        PER_PAGE
    }

    fn info_request(&self) -> Result<Request> {
        Ok(Request::get(self.feed_url()))
    }

    fn parse_info(&self, response: &Response) -> Result<FeedInfo> {
        let channel = parse_rss(&response.body)?;
        Ok(FeedInfo {
            title: channel.title,
            description: channel.description,
            video_count: None,
            webpage: channel.link,
            thumbnail_url: channel.image,
        })
    }

    fn page_request(&self, page: u32) -> Result<Request> {
        Ok(Request::get(self.feed_url()).param("page", page))
    }

    fn parse_page(&self, response: &Response) -> Result<FeedPage> {
        if !response.is_success() {
            return Err(Error::Transport(format!("HTTP {}", response.status)));
        }
        Ok(feed_page(&parse_rss(&response.body)?))
    }

    fn item_to_record(&self, item: &RawItem) -> Result<VideoRecord> {
        match item {
            RawItem::Entry(entry) => entry_to_record(entry),
            RawItem::Json(_) => Err(Error::parse("blip feed items are RSS items")),
        }
    }
}

/// A lone item whose summary is blip's "no results" message stands for an
/// empty listing.
fn feed_page(channel: &RssChannel) -> FeedPage {
    if let [only] = channel.entries.as_slice() {
        if only.summary.as_deref().map(str::trim) == Some(NO_RESULTS) {
            return FeedPage::no_results();
        }
    }
    FeedPage::new(channel.entries.iter().cloned().map(RawItem::Entry).collect())
}

fn embed_code(embed_url: &str) -> String {
    format!(
        "<embed src=\"{}\" type=\"application/x-shockwave-flash\" width=\"480\" height=\"390\" \
         allowscriptaccess=\"always\" allowfullscreen=\"true\"></embed>",
        embed_url
    )
}

/// Maps one blip RSS item to a record.
pub fn entry_to_record(entry: &FeedEntry) -> Result<VideoRecord> {
    let mut record = VideoRecord::new();
    if let Some(title) = &entry.title {
        record.set(Field::Title, title.as_str());
    }
    if let Some(link) = &entry.link {
        record.set(Field::Link, link.as_str());
    }
    if let Some(description) = entry
        .extension("blip:puredescription")
        .or(entry.summary.as_deref())
    {
        record.set(Field::Description, clean_description_html(description));
    }
    if let Some(user) = entry.extension("blip:user").or(entry.author.as_deref()) {
        record.set(Field::User, user);
    }
    if let Some(showpage) = entry.extension("blip:showpage") {
        record.set(Field::UserUrl, showpage);
    }
    if let Some(published) = &entry.published {
        match DateTime::parse_from_rfc2822(published.trim()) {
            Ok(date) => {
                record.set(Field::PublishDatetime, date.with_timezone(&Utc));
            }
            Err(e) => tracing::debug!("blip: bad pubDate {:?}: {}", published, e),
        }
    }
    if !entry.categories.is_empty() {
        record.set(Field::Tags, entry.categories.clone());
    }

    let enclosures = accepted_enclosures(entry);
    if let Some(enclosure) = default_enclosure(&enclosures).or(enclosures.first().copied()) {
        record.set(Field::FileUrl, enclosure.url.as_str());
        if let Some(mime_type) = &enclosure.mime_type {
            record.set(Field::FileUrlMimetype, mime_type.as_str());
        }
    }
    if let Some(thumbnail) = resolve_entry_thumbnail(entry).into_url() {
        record.set(Field::ThumbnailUrl, thumbnail);
    }
    if let Some(embed_url) = entry.extension("blip:embedUrl") {
        record.set(Field::EmbedCode, embed_code(embed_url));
    }
    if let Some(guid) = &entry.guid {
        record.set(Field::Guid, guid.as_str());
    }
    Ok(record)
}
