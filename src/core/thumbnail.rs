//! Thumbnail and enclosure selection for RSS items.

use crate::core::entry::{Enclosure, FeedEntry, ThumbnailRefs};
use regex::Regex;
use std::sync::LazyLock;

const BLIP_IMAGE_HOST: &str = "http://a.images.blip.tv";

const ACCEPTED_TYPES: &[&str] = &[
    "application/ogg",
    "application/x-shockwave-flash",
    "application/x-flv",
    "application/vnd.rn-realmedia",
];

const ACCEPTED_EXTENSIONS: &[&str] = &[
    "mp4", "m4v", "mov", "flv", "ogv", "ogg", "oga", "webm", "avi", "mpg", "mpeg", "wmv", "3gp",
    "mp3", "m4a", "divx", "mkv",
];

static YOUTUBE_CONTENT_IMAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<img alt="" src="([^"]+)" />"#).expect("invalid content image regex")
});

pub fn is_accepted_type(mime_type: &str) -> bool {
    let mime_type = mime_type.trim().to_ascii_lowercase();
    mime_type.starts_with("video/")
        || mime_type.starts_with("audio/")
        || ACCEPTED_TYPES.contains(&mime_type.as_str())
}

/// Judges a URL or file name by its extension, ignoring any query string.
pub fn is_accepted_filename(name: &str) -> bool {
    let path = name.split(['?', '#']).next().unwrap_or_default();
    let file = path.rsplit('/').next().unwrap_or_default();
    match file.rsplit_once('.') {
        Some((_, ext)) => ACCEPTED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()),
        None => false,
    }
}

fn is_accepted_enclosure(enclosure: &Enclosure) -> bool {
    enclosure.mime_type.as_deref().is_some_and(is_accepted_type)
        || is_accepted_filename(&enclosure.url)
}

/// Media RSS content when present, else plain RSS enclosures.
pub fn entry_enclosures(entry: &FeedEntry) -> &[Enclosure] {
    if !entry.media_content.is_empty() {
        &entry.media_content
    } else {
        &entry.enclosures
    }
}

/// Enclosures with an accepted media type or extension, in feed order.
pub fn accepted_enclosures(entry: &FeedEntry) -> Vec<&Enclosure> {
    entry_enclosures(entry)
        .iter()
        .filter(|enclosure| is_accepted_enclosure(enclosure))
        .collect()
}

/// The default-marked enclosure among already filtered ones.
pub fn default_enclosure<'a>(enclosures: &[&'a Enclosure]) -> Option<&'a Enclosure> {
    enclosures.iter().copied().find(|enclosure| enclosure.is_default)
}

/// First thumbnail reference present, in precedence order.
pub fn item_thumbnail_url(refs: &ThumbnailRefs) -> Option<String> {
    if let Some(url) = &refs.media_thumbnail {
        return Some(url.clone());
    }
    if let Some(src) = refs.blip_thumbnail_src.as_deref().filter(|s| !s.is_empty()) {
        return Some(format!("{}/{}", BLIP_IMAGE_HOST, src));
    }
    refs.itunes_image.clone().or_else(|| refs.image.clone())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThumbnailSource {
    DefaultEnclosure,
    Enclosure,
    Entry,
    /// Scraped out of the item's HTML content.
    Content,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedThumbnail {
    Found { url: String, source: ThumbnailSource },
    /// Every step ran and none produced a URL.
    Absent,
}

impl ResolvedThumbnail {
    pub fn url(&self) -> Option<&str> {
        match self {
            ResolvedThumbnail::Found { url, .. } => Some(url),
            ResolvedThumbnail::Absent => None,
        }
    }

    pub fn into_url(self) -> Option<String> {
        match self {
            ResolvedThumbnail::Found { url, .. } => Some(url),
            ResolvedThumbnail::Absent => None,
        }
    }
}

/// Walks the thumbnail chain for one item: the default enclosure, any other
/// accepted enclosure, the item itself, and finally an image scraped from
/// YouTube item content.
pub fn resolve_entry_thumbnail(entry: &FeedEntry) -> ResolvedThumbnail {
    let found = |url, source| ResolvedThumbnail::Found { url, source };

    let enclosures = accepted_enclosures(entry);
    let default = default_enclosure(&enclosures);
    if let Some(url) = default.and_then(|enclosure| item_thumbnail_url(&enclosure.thumbnails)) {
        return found(url, ThumbnailSource::DefaultEnclosure);
    }

    for enclosure in &enclosures {
        if default.is_some_and(|d| std::ptr::eq(d, *enclosure)) {
            continue;
        }
        if let Some(url) = item_thumbnail_url(&enclosure.thumbnails) {
            return found(url, ThumbnailSource::Enclosure);
        }
    }

    if let Some(url) = item_thumbnail_url(&entry.thumbnails) {
        return found(url, ThumbnailSource::Entry);
    }

    if entry.link.as_deref().is_some_and(|link| link.contains("youtube.com")) {
        let content = entry.content.first().or(entry.summary.as_ref());
        if let Some(url) = content
            .and_then(|html| YOUTUBE_CONTENT_IMAGE.captures(html))
            .and_then(|captures| captures.get(1))
        {
            return found(url.as_str().to_string(), ThumbnailSource::Content);
        }
    }

    ResolvedThumbnail::Absent
}
