//! vimeo.com: oEmbed, the Simple API, the moogaloop player config, and the
//! authenticated REST API for larger feeds and search.

use crate::core::error::{Error, Result};
use crate::core::extract::{json_scalar, Document, DocumentKind, FieldRule, Rule};
use crate::core::extractor::{ExtractionMethod, OEmbedMethod};
use crate::core::feed::{FeedInfo, FeedPage, FeedSource, RawItem};
use crate::core::metadata::{Field, VideoRecord};
use crate::core::search::{SearchPage, SearchQuery};
use crate::core::suite::{ApiTier, OrderBy, Suite, UrlMatch};
use crate::core::transport::{Request, Response};
use chrono::{DateTime, NaiveDateTime};
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;
use url::Url;

const OEMBED_ENDPOINT: &str = "http://vimeo.com/api/oembed.json";
const SIMPLE_API: &str = "http://vimeo.com/api/v2";
const ADVANCED_API: &str = "http://vimeo.com/api/rest/v2";
const MOOGALOOP: &str = "http://www.vimeo.com/moogaloop";
const UPLOAD_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const SIMPLE_PER_PAGE: usize = 20;
const ADVANCED_PER_PAGE: usize = 50;

static VIDEO_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://([^/]+\.)?vimeo\.com/(?P<video_id>\d+)").expect("invalid vimeo video regex")
});

/// Web page shapes of album, channel, group and user listings.
static FEED_PATH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?:^/album/(?P<album_id>\d+)(?:/format:\w+)?/?$)|",
        r"(?:^/channels/(?P<channel_id>\w+)(?:/videos/rss)?/?$)|",
        r"(?:^/groups/(?P<group_id>\w+)(?:/videos(?:/sort:\w+(?:/format:\w+)?)?)?/?$)|",
        r"(?:^/(?P<user_id>\w+)(?:/(?P<request_type>videos|likes)(?:/sort:\w+(?:/format:\w+)?|/rss)?)?/?$)",
    ))
    .expect("invalid vimeo feed path regex")
});

/// Simple API listing URLs, tried after the page shapes.
static FEED_API_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^/api/v2/(?:album/(?P<album_id>\d+)|channel/(?P<channel_id>\w+)|",
        r"group/(?P<group_id>\w+)|(?P<user_id>\w+))/(?P<request_type>\w+)\.(?:json|php|xml)",
    ))
    .expect("invalid vimeo api regex")
});

pub struct VimeoSuite {
    methods: Vec<Box<dyn ExtractionMethod>>,
}

impl VimeoSuite {
    pub fn new() -> Self {
        Self {
            methods: vec![
                Box::new(OEmbedMethod::new(OEMBED_ENDPOINT)),
                Box::new(VimeoApiMethod),
                Box::new(VimeoScrapeMethod::new()),
            ],
        }
    }
}

impl Default for VimeoSuite {
    fn default() -> Self {
        Self::new()
    }
}

impl Suite for VimeoSuite {
    fn id(&self) -> &'static str {
        "vimeo"
    }

    fn display_name(&self) -> &'static str {
        "Vimeo"
    }

    fn video_regex(&self) -> &Regex {
        &VIDEO_RE
    }

    fn methods(&self) -> &[Box<dyn ExtractionMethod>] {
        &self.methods
    }

    fn match_feed_url(&self, url: &str) -> Option<UrlMatch> {
        let parsed = Url::parse(url).ok()?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return None;
        }
        if !matches!(parsed.host_str(), Some("vimeo.com" | "www.vimeo.com")) {
            return None;
        }
        UrlMatch::capture_part(&FEED_PATH_RE, parsed.path(), url)
            .or_else(|| UrlMatch::capture_part(&FEED_API_RE, parsed.path(), url))
    }

    fn feed_source(&self, feed: &UrlMatch, tier: ApiTier) -> Result<Box<dyn FeedSource>> {
        let target = FeedTarget::from_match(feed)?;
        if tier == ApiTier::Public {
            tracing::warn!(
                "{}: no credentials, only the first pages of the Simple API are available",
                feed.url()
            );
        }
        Ok(Box::new(VimeoFeedSource { target, tier }))
    }

    fn order_bys(&self) -> &[OrderBy] {
        &[OrderBy::Latest, OrderBy::Relevant]
    }

    fn supports_search(&self) -> bool {
        true
    }

    fn search_requires_credentials(&self) -> bool {
        true
    }

    fn search_request(&self, query: &SearchQuery, page: Option<u32>) -> Result<Request> {
        let mut request = Request::get(ADVANCED_API)
            .param("format", "json")
            .param("full_response", "1")
            .param("method", "vimeo.videos.search")
            .param("query", query.search_string());
        if let Some(order_by) = query.order_by {
            let sort = match order_by {
                OrderBy::Latest => "newest",
                OrderBy::Relevant => "relevant",
            };
            request = request.param("sort", sort);
        }
        if let Some(page) = page {
            request = request.param("page", page);
        }
        Ok(request.authenticated())
    }

    fn parse_search_page(&self, response: &Response) -> Result<SearchPage> {
        let data: Value = serde_json::from_str(&response.body)?;
        let Some(videos) = data.get("videos") else {
            return Ok(SearchPage {
                items: Vec::new(),
                total: Some(0),
                page: 1,
                per_page: ADVANCED_PER_PAGE as u32,
            });
        };

        // "video" is only sent when the page has results
        let items = if json_u64(videos.get("on_this_page")).unwrap_or(0) > 0 {
            as_list(videos.get("video"))
                .into_iter()
                .cloned()
                .map(RawItem::Json)
                .collect()
        } else {
            Vec::new()
        };
        let (Some(page), Some(per_page)) =
            (json_u32(videos.get("page")), json_u32(videos.get("perpage")))
        else {
            return Err(Error::parse("vimeo search page without page or perpage"));
        };
        Ok(SearchPage {
            items,
            total: json_u64(videos.get("total")),
            page,
            per_page,
        })
    }

    fn parse_search_result(&self, item: &RawItem) -> Result<VideoRecord> {
        match item {
            RawItem::Json(video) => advanced_video_to_data(video),
            RawItem::Entry(_) => Err(Error::parse("vimeo search results are JSON")),
        }
    }
}

/// Simple API `video/<id>.json`.
struct VimeoApiMethod;

impl VimeoApiMethod {
    const FIELDS: [Field; 11] = [
        Field::Link,
        Field::Title,
        Field::Description,
        Field::Tags,
        Field::Guid,
        Field::PublishDatetime,
        Field::ThumbnailUrl,
        Field::User,
        Field::UserUrl,
        Field::FlashEnclosureUrl,
        Field::EmbedCode,
    ];
}

impl ExtractionMethod for VimeoApiMethod {
    fn name(&self) -> &str {
        "simple_api"
    }

    fn fields(&self) -> &[Field] {
        &Self::FIELDS
    }

    fn request(&self, video: &UrlMatch) -> Result<Request> {
        Ok(Request::get(format!(
            "{}/video/{}.json",
            SIMPLE_API,
            video.video_id()?
        )))
    }

    fn process(&self, _video: &UrlMatch, response: &Response) -> Result<VideoRecord> {
        let data: Value = serde_json::from_str(&response.body)?;
        let first = data
            .get(0)
            .ok_or_else(|| Error::parse("empty video list from the Simple API"))?;
        api_video_to_data(first)
    }
}

/// The moogaloop player config, the only source of a direct file URL.
struct VimeoScrapeMethod {
    rules: Vec<FieldRule>,
}

impl VimeoScrapeMethod {
    const FIELDS: [Field; 10] = [
        Field::Link,
        Field::Title,
        Field::User,
        Field::UserUrl,
        Field::ThumbnailUrl,
        Field::EmbedCode,
        Field::FileUrl,
        Field::FileUrlMimetype,
        Field::FileUrlExpires,
        Field::IsEmbeddable,
    ];

    fn new() -> Self {
        Self {
            rules: vec![
                FieldRule::new(Field::Link, Rule::xml("url")),
                FieldRule::new(Field::Title, Rule::xml("caption")),
                FieldRule::new(Field::User, Rule::xml("uploader_display_name")),
                FieldRule::new(Field::UserUrl, Rule::xml("uploader_url")),
                FieldRule::new(Field::ThumbnailUrl, Rule::xml("thumbnail")),
                FieldRule::new(Field::EmbedCode, Rule::xml("embed_code")),
            ],
        }
    }
}

impl ExtractionMethod for VimeoScrapeMethod {
    fn name(&self) -> &str {
        "moogaloop"
    }

    fn fields(&self) -> &[Field] {
        &Self::FIELDS
    }

    fn request(&self, video: &UrlMatch) -> Result<Request> {
        Ok(Request::get(format!("{}/load/clip:{}", MOOGALOOP, video.video_id()?)))
    }

    fn process(&self, _video: &UrlMatch, response: &Response) -> Result<VideoRecord> {
        let doc = Document::parse(DocumentKind::Xml, &response.body)?;
        let mut record = VideoRecord::new();
        if doc.xml_text("error_id") == Some("embed_blocked") {
            return Ok(record.with(Field::IsEmbeddable, false));
        }

        for rule in &self.rules {
            match rule.extract(&doc) {
                Ok(value) => {
                    record.set(rule.field, value);
                }
                Err(Error::FieldNotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }

        let expires = doc.xml_text("request_signature_expires");
        if let Some(expiry) = expires
            .and_then(|secs| secs.trim().parse::<i64>().ok())
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
        {
            record.set(Field::FileUrlExpires, expiry);
        }
        if let (Some(node_id), Some(signature), Some(expires)) = (
            doc.xml_text("nodeId"),
            doc.xml_text("request_signature"),
            expires,
        ) {
            let quality = if doc.xml_text("isHD") == Some("1") { "hd" } else { "sd" };
            record.set(
                Field::FileUrl,
                format!(
                    "{}/play/clip:{}/{}/{}/?q={}",
                    MOOGALOOP, node_id, signature, expires, quality
                ),
            );
            record.set(Field::FileUrlMimetype, "video/x-flv");
        }
        Ok(record)
    }
}

/// Listing kinds of a user feed. Unknown request types read as uploads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UserFeed {
    Videos,
    Likes,
    AppearsIn,
    AllVideos,
    Subscriptions,
}

impl UserFeed {
    fn parse(request_type: Option<&str>) -> Self {
        match request_type {
            Some("likes") => UserFeed::Likes,
            Some("appears_in") => UserFeed::AppearsIn,
            Some("all_videos") => UserFeed::AllVideos,
            Some("subscriptions") => UserFeed::Subscriptions,
            _ => UserFeed::Videos,
        }
    }

    fn request_type(self) -> &'static str {
        match self {
            UserFeed::Videos => "videos",
            UserFeed::Likes => "likes",
            UserFeed::AppearsIn => "appears_in",
            UserFeed::AllVideos => "all_videos",
            UserFeed::Subscriptions => "subscriptions",
        }
    }

    fn advanced_method(self) -> &'static str {
        match self {
            UserFeed::Videos => "videos.getUploaded",
            UserFeed::Likes => "videos.getLiked",
            UserFeed::AppearsIn => "videos.getAppearsIn",
            UserFeed::AllVideos => "videos.getAll",
            UserFeed::Subscriptions => "videos.getSubscriptions",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum FeedTarget {
    User { user_id: String, feed: UserFeed },
    Album(String),
    Channel(String),
    Group(String),
}

impl FeedTarget {
    fn from_match(feed: &UrlMatch) -> Result<Self> {
        if let Some(user_id) = feed.get("user_id") {
            Ok(FeedTarget::User {
                user_id: user_id.to_string(),
                feed: UserFeed::parse(feed.get("request_type")),
            })
        } else if let Some(id) = feed.get("album_id") {
            Ok(FeedTarget::Album(id.to_string()))
        } else if let Some(id) = feed.get("channel_id") {
            Ok(FeedTarget::Channel(id.to_string()))
        } else if let Some(id) = feed.get("group_id") {
            Ok(FeedTarget::Group(id.to_string()))
        } else {
            Err(Error::parse(format!("{} names no vimeo feed", feed.url())))
        }
    }

    fn simple_path(&self) -> String {
        match self {
            FeedTarget::User { user_id, .. } => user_id.clone(),
            FeedTarget::Album(id) => format!("album/{}", id),
            FeedTarget::Channel(id) => format!("channel/{}", id),
            FeedTarget::Group(id) => format!("group/{}", id),
        }
    }

    fn request_type(&self) -> &'static str {
        match self {
            FeedTarget::User { feed, .. } => feed.request_type(),
            _ => "videos",
        }
    }

    /// REST method name and its identifying parameter.
    fn advanced_method(&self) -> (&'static str, &'static str, &str) {
        match self {
            FeedTarget::User { user_id, feed } => {
                (feed.advanced_method(), "user_id", user_id.as_str())
            }
            FeedTarget::Album(id) => ("albums.getVideos", "album_id", id.as_str()),
            FeedTarget::Channel(id) => ("channels.getVideos", "channel_id", id.as_str()),
            FeedTarget::Group(id) => ("groups.getVideos", "group_id", id.as_str()),
        }
    }
}

struct VimeoFeedSource {
    target: FeedTarget,
    tier: ApiTier,
}

impl FeedSource for VimeoFeedSource {
    fn per_page(&self) -> usize {
        match self.tier {
            ApiTier::Public => SIMPLE_PER_PAGE,
            ApiTier::Authenticated => ADVANCED_PER_PAGE,
        }
    }

    /// Feed info only exists on the Simple API, whatever the tier.
    fn info_request(&self) -> Result<Request> {
        Ok(Request::get(format!(
            "{}/{}/info.json",
            SIMPLE_API,
            self.target.simple_path()
        )))
    }

    fn parse_info(&self, response: &Response) -> Result<FeedInfo> {
        let data: Value = serde_json::from_str(&response.body)?;
        let text = |key: &str| data.get(key).and_then(json_scalar);

        let info = match &self.target {
            FeedTarget::User { feed, .. } => {
                let name = text("display_name").unwrap_or_default();
                let profile = text("profile_url");
                let (title, count, webpage) = match feed {
                    UserFeed::Videos => (
                        format!("{}'s videos", name),
                        json_u64(data.get("total_videos_uploaded")),
                        text("videos_url"),
                    ),
                    UserFeed::Likes => (
                        format!("Videos {} likes", name),
                        json_u64(data.get("total_videos_liked")),
                        profile.map(|url| format!("{}/likes", url)),
                    ),
                    UserFeed::AppearsIn => (
                        format!("Videos {} appears in", name),
                        json_u64(data.get("total_videos_appears_in")),
                        profile,
                    ),
                    UserFeed::AllVideos => (
                        format!("{0}'s videos and videos {0} appears in", name),
                        None,
                        profile,
                    ),
                    UserFeed::Subscriptions => {
                        (format!("Videos {} is subscribed to", name), None, profile)
                    }
                };
                FeedInfo {
                    title: Some(title),
                    description: text("bio"),
                    video_count: count,
                    webpage,
                    thumbnail_url: text("portrait_huge"),
                }
            }
            target => {
                let title = match target {
                    FeedTarget::Album(_) => text("title"),
                    _ => text("name"),
                };
                // channel and group logos are often blank
                let thumbnail_url = text("logo")
                    .filter(|logo| !logo.is_empty())
                    .or_else(|| text("thumbnail"));
                FeedInfo {
                    title,
                    description: text("description"),
                    video_count: json_u64(data.get("total_videos")),
                    webpage: text("url"),
                    thumbnail_url,
                }
            }
        };
        Ok(info)
    }

    fn page_request(&self, page: u32) -> Result<Request> {
        match self.tier {
            ApiTier::Public => Ok(Request::get(format!(
                "{}/{}/{}.json",
                SIMPLE_API,
                self.target.simple_path(),
                self.target.request_type()
            ))
            .param("page", page)),
            ApiTier::Authenticated => {
                let (method, key, value) = self.target.advanced_method();
                Ok(Request::get(ADVANCED_API)
                    .param("format", "json")
                    .param("full_response", "1")
                    .param("sort", "newest")
                    .param("method", format!("vimeo.{}", method))
                    .param("per_page", ADVANCED_PER_PAGE)
                    .param("page", page)
                    .param(key, value)
                    .authenticated())
            }
        }
    }

    fn parse_page(&self, response: &Response) -> Result<FeedPage> {
        // the Simple API refuses pages past its limit
        if self.tier == ApiTier::Public && response.status == 403 {
            return Ok(FeedPage::new(Vec::new()));
        }
        if !response.is_success() {
            return Err(Error::Transport(format!("HTTP {}", response.status)));
        }

        let data: Value = serde_json::from_str(&response.body)?;
        match self.tier {
            ApiTier::Public => match data {
                Value::Array(videos) => Ok(FeedPage::new(
                    videos.into_iter().map(RawItem::Json).collect(),
                )),
                _ => Err(Error::parse("expected a video list from the Simple API")),
            },
            ApiTier::Authenticated => {
                let Some(videos) = data.get("videos") else {
                    return Ok(FeedPage::new(Vec::new()));
                };
                Ok(FeedPage {
                    items: as_list(videos.get("video"))
                        .into_iter()
                        .cloned()
                        .map(RawItem::Json)
                        .collect(),
                    total_hint: json_u64(videos.get("total")),
                    no_results: false,
                })
            }
        }
    }

    fn item_to_record(&self, item: &RawItem) -> Result<VideoRecord> {
        match (item, self.tier) {
            (RawItem::Json(video), ApiTier::Public) => api_video_to_data(video),
            (RawItem::Json(video), ApiTier::Authenticated) => advanced_video_to_data(video),
            (RawItem::Entry(_), _) => Err(Error::parse("vimeo feed items are JSON")),
        }
    }
}

fn embed_code(id: &str) -> String {
    format!(
        "<iframe src=\"http://player.vimeo.com/video/{}\" width=\"320\" height=\"240\" \
         frameborder=\"0\" webkitAllowFullScreen allowFullScreen></iframe>",
        id
    )
}

fn flash_enclosure_url(id: &str) -> String {
    format!("http://vimeo.com/moogaloop.swf?clip_id={}", id)
}

fn parse_upload_date(date: &str) -> Result<DateTime<chrono::Utc>> {
    Ok(NaiveDateTime::parse_from_str(date, UPLOAD_DATE_FORMAT)?.and_utc())
}

/// The upload date, or the reason there is none. Only an object that still
/// carries its link counts as deleted; anything else is malformed.
fn check_upload_date(upload_date: Option<String>, link: Option<&str>) -> Result<String> {
    match (upload_date.filter(|date| !date.is_empty()), link.filter(|link| !link.is_empty())) {
        (Some(date), _) => Ok(date),
        (None, Some(link)) => Err(Error::VideoDeleted(link.to_string())),
        (None, None) => Err(Error::parse("vimeo video object without upload_date or url")),
    }
}

/// Maps a Simple API video object. A video that still has its URL but no
/// upload date has been deleted.
pub fn api_video_to_data(video: &Value) -> Result<VideoRecord> {
    let text = |key: &str| video.get(key).and_then(json_scalar);
    let id = text("id");
    let link = text("url");
    let upload_date = check_upload_date(text("upload_date"), link.as_deref())?;

    let mut record = VideoRecord::new();
    for (key, field) in [
        ("title", Field::Title),
        ("url", Field::Link),
        ("description", Field::Description),
        ("thumbnail_medium", Field::ThumbnailUrl),
        ("user_name", Field::User),
        ("user_url", Field::UserUrl),
    ] {
        if let Some(value) = text(key) {
            record.set(field, value);
        }
    }
    record.set(Field::PublishDatetime, parse_upload_date(&upload_date)?);
    if let Some(tags) = text("tags") {
        let tags: Vec<String> = tags
            .split(", ")
            .filter(|tag| !tag.is_empty())
            .map(str::to_string)
            .collect();
        record.set(Field::Tags, tags);
    }
    if let Some(id) = id {
        record.set(Field::FlashEnclosureUrl, flash_enclosure_url(&id));
        record.set(Field::EmbedCode, embed_code(&id));
        let day = upload_date.get(..10).unwrap_or(&upload_date);
        record.set(Field::Guid, format!("tag:vimeo,{}:clip{}", day, id));
    }
    Ok(record)
}

/// Maps a video object from the REST API (`full_response=1`).
pub fn advanced_video_to_data(video: &Value) -> Result<VideoRecord> {
    let id = video.get("id").and_then(json_scalar);
    let link = as_list(video.pointer("/urls/url"))
        .into_iter()
        .find(|url| url.get("type").and_then(Value::as_str) == Some("video"))
        .and_then(|url| url.get("_content"))
        .and_then(json_scalar);

    let upload_date = check_upload_date(
        video.get("upload_date").and_then(json_scalar),
        link.as_deref(),
    )?;

    let mut record = VideoRecord::new();
    if let Some(title) = video.get("title").and_then(json_scalar) {
        record.set(Field::Title, title);
    }
    if let Some(link) = link {
        record.set(Field::Link, link);
    }
    if let Some(description) = video.get("description").and_then(json_scalar) {
        record.set(Field::Description, description);
    }
    let thumbnails = as_list(video.pointer("/thumbnails/thumbnail"));
    if let Some(thumbnail) = thumbnails
        .get(1)
        .or(thumbnails.first())
        .and_then(|t| t.get("_content"))
        .and_then(json_scalar)
    {
        record.set(Field::ThumbnailUrl, thumbnail);
    }
    if let Some(user) = video.pointer("/owner/realname").and_then(json_scalar) {
        record.set(Field::User, user);
    }
    if let Some(user_url) = video.pointer("/owner/profileurl").and_then(json_scalar) {
        record.set(Field::UserUrl, user_url);
    }
    record.set(Field::PublishDatetime, parse_upload_date(&upload_date)?);
    let tags: Vec<String> = as_list(video.pointer("/tags/tag"))
        .into_iter()
        .filter_map(|tag| tag.get("_content").and_then(json_scalar))
        .collect();
    record.set(Field::Tags, tags);
    if let Some(id) = id {
        record.set(Field::FlashEnclosureUrl, flash_enclosure_url(&id));
        record.set(Field::EmbedCode, embed_code(&id));
    }
    Ok(record)
}

/// The REST API sends single-element lists as a bare object.
fn as_list(value: Option<&Value>) -> Vec<&Value> {
    match value {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(item @ Value::Object(_)) => vec![item],
        _ => Vec::new(),
    }
}

/// Counts arrive as numbers or as numeric strings.
fn json_u64(value: Option<&Value>) -> Option<u64> {
    match value? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn json_u32(value: Option<&Value>) -> Option<u32> {
    json_u64(value).and_then(|n| u32::try_from(n).ok())
}
