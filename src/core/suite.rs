use crate::core::error::{Error, Result};
use crate::core::extractor::ExtractionMethod;
use crate::core::feed::{FeedSource, RawItem};
use crate::core::metadata::{Field, VideoRecord};
use crate::core::search::{SearchPage, SearchQuery};
use crate::core::transport::{Client, Request, Response};
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{(\w+)\}").expect("invalid placeholder regex"));

/// The named capture groups of a matched video or feed URL. Only groups
/// that took part in the match are present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlMatch {
    url: String,
    groups: BTreeMap<String, String>,
}

impl UrlMatch {
    pub fn capture(regex: &Regex, url: &str) -> Option<Self> {
        let captures = regex.captures(url)?;
        let groups = regex
            .capture_names()
            .flatten()
            .filter_map(|name| {
                captures
                    .name(name)
                    .map(|m| (name.to_string(), m.as_str().to_string()))
            })
            .collect();
        Some(Self {
            url: url.to_string(),
            groups,
        })
    }

    /// Matches `regex` against one component of `url`, such as its path,
    /// while keeping the whole URL.
    pub fn capture_part(regex: &Regex, part: &str, url: &str) -> Option<Self> {
        let mut matched = Self::capture(regex, part)?;
        matched.url = url.to_string();
        Some(matched)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.groups.get(name).map(String::as_str)
    }

    pub fn require(&self, name: &str) -> Result<&str> {
        self.get(name)
            .ok_or_else(|| Error::parse(format!("{} has no {}", self.url, name)))
    }

    pub fn video_id(&self) -> Result<&str> {
        self.require("video_id")
    }

    /// Fills `{group}` placeholders; `{url}` is the matched URL itself.
    pub fn expand(&self, template: &str) -> Result<String> {
        let mut expanded = String::with_capacity(template.len());
        let mut last = 0;
        for captures in PLACEHOLDER.captures_iter(template) {
            let (Some(whole), Some(name)) = (captures.get(0), captures.get(1)) else {
                continue;
            };
            let value = match name.as_str() {
                "url" => self.url.as_str(),
                other => self.get(other).ok_or_else(|| {
                    Error::Config(format!("{} references missing group {}", template, other))
                })?,
            };
            expanded.push_str(&template[last..whole.start()]);
            expanded.push_str(value);
            last = whole.end();
        }
        expanded.push_str(&template[last..]);
        Ok(expanded)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderBy {
    Latest,
    Relevant,
}

impl OrderBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderBy::Latest => "latest",
            OrderBy::Relevant => "relevant",
        }
    }
}

impl fmt::Display for OrderBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderBy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "latest" => Ok(OrderBy::Latest),
            "relevant" => Ok(OrderBy::Relevant),
            other => Err(Error::unsupported(format!("order-by {}", other))),
        }
    }
}

/// Which capability tier a session runs at. Chosen once, from whether a
/// credential signer is available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiTier {
    Public,
    Authenticated,
}

impl ApiTier {
    pub fn for_client(client: &Client) -> Self {
        if client.is_authenticated() {
            ApiTier::Authenticated
        } else {
            ApiTier::Public
        }
    }
}

/// A per-site adapter: URL matching, ordered extraction methods, and the
/// optional feed and search capabilities.
///
/// Suites are immutable once registered. Feed and search hooks default to
/// [`Error::CapabilityUnsupported`] so callers can tell "unsupported" from
/// "no results".
pub trait Suite: Send + Sync {
    fn id(&self) -> &'static str;

    fn display_name(&self) -> &'static str;

    fn video_regex(&self) -> &Regex;

    /// Extraction methods, in the order they run.
    fn methods(&self) -> &[Box<dyn ExtractionMethod>];

    fn match_video_url(&self, url: &str) -> Option<UrlMatch> {
        UrlMatch::capture(self.video_regex(), url)
    }

    fn match_feed_url(&self, _url: &str) -> Option<UrlMatch> {
        None
    }

    fn feed_source(&self, _feed: &UrlMatch, _tier: ApiTier) -> Result<Box<dyn FeedSource>> {
        Err(Error::unsupported(format!("{} feeds", self.id())))
    }

    fn order_bys(&self) -> &[OrderBy] {
        &[]
    }

    fn supports_search(&self) -> bool {
        false
    }

    fn search_requires_credentials(&self) -> bool {
        false
    }

    /// Request for one page of results; `None` is the first page.
    fn search_request(&self, _query: &SearchQuery, _page: Option<u32>) -> Result<Request> {
        Err(Error::unsupported(format!("{} search", self.id())))
    }

    fn parse_search_page(&self, _response: &Response) -> Result<SearchPage> {
        Err(Error::unsupported(format!("{} search", self.id())))
    }

    fn parse_search_result(&self, _item: &RawItem) -> Result<VideoRecord> {
        Err(Error::unsupported(format!("{} search", self.id())))
    }

    fn next_search_request(&self, query: &SearchQuery, last: &SearchPage) -> Result<Option<Request>> {
        match last.next_page() {
            Some(page) => self.search_request(query, Some(page)).map(Some),
            None => Ok(None),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The method ran and supplied these fields (possibly none).
    Supplied(Vec<Field>),
    Failed(String),
    /// Credentialed method with no signer available.
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodAttempt {
    pub method: String,
    pub outcome: AttemptOutcome,
}

/// A merged record plus what each method contributed.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub record: VideoRecord,
    pub attempts: Vec<MethodAttempt>,
}

/// Runs every method of `suite` for one video, in declared order, and
/// merges their fields: a later method overwrites only the fields it
/// supplies.
///
/// Method failures are absorbed. A positively detected deletion aborts with
/// [`Error::VideoDeleted`]; if nothing supplied any field the result is
/// [`Error::VideoNotFound`].
pub async fn fetch_video(suite: &dyn Suite, video: &UrlMatch, client: &Client) -> Result<Extraction> {
    let mut record = VideoRecord::new();
    let mut attempts = Vec::with_capacity(suite.methods().len());

    for method in suite.methods() {
        let outcome = match method.request(video) {
            Ok(request) if request.authenticated && !client.is_authenticated() => {
                tracing::debug!("{}: skipping {}, no credentials", suite.id(), method.name());
                AttemptOutcome::Skipped
            }
            Ok(request) => match run_method(method.as_ref(), video, client, request).await {
                Ok(partial) => {
                    let supplied: Vec<Field> = partial.fields().collect();
                    tracing::debug!("{}: {} supplied {:?}", suite.id(), method.name(), supplied);
                    record.merge(partial);
                    AttemptOutcome::Supplied(supplied)
                }
                Err(Error::VideoDeleted(link)) => return Err(Error::VideoDeleted(link)),
                Err(e) => {
                    tracing::warn!("{}: {} failed for {}: {}", suite.id(), method.name(), video.url(), e);
                    AttemptOutcome::Failed(e.to_string())
                }
            },
            Err(e) => AttemptOutcome::Failed(e.to_string()),
        };
        attempts.push(MethodAttempt {
            method: method.name().to_string(),
            outcome,
        });
    }

    if record.is_empty() {
        return Err(Error::VideoNotFound(video.url().to_string()));
    }
    Ok(Extraction { record, attempts })
}

async fn run_method(
    method: &dyn ExtractionMethod,
    video: &UrlMatch,
    client: &Client,
    request: Request,
) -> Result<VideoRecord> {
    let response = client.send(request).await?;
    if !response.is_success() {
        return Err(Error::Transport(format!("HTTP {}", response.status)));
    }
    method.process(video, &response)
}
