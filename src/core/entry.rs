//! RSS items as the suites and the thumbnail resolver see them.

use crate::core::error::{Error, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;

/// The thumbnail references an item or enclosure may carry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThumbnailRefs {
    pub media_thumbnail: Option<String>,
    /// Blip's bare file name, relative to its image host.
    pub blip_thumbnail_src: Option<String>,
    pub itunes_image: Option<String>,
    pub image: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Enclosure {
    pub url: String,
    pub mime_type: Option<String>,
    pub length: Option<u64>,
    pub is_default: bool,
    pub thumbnails: ThumbnailRefs,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedEntry {
    pub title: Option<String>,
    pub link: Option<String>,
    pub summary: Option<String>,
    pub content: Vec<String>,
    pub author: Option<String>,
    pub published: Option<String>,
    pub guid: Option<String>,
    pub categories: Vec<String>,
    pub media_content: Vec<Enclosure>,
    pub enclosures: Vec<Enclosure>,
    pub thumbnails: ThumbnailRefs,
    /// Other namespaced single-valued elements by qualified name, e.g.
    /// `blip:embedUrl`.
    pub extensions: HashMap<String, String>,
}

impl FeedEntry {
    pub fn extension(&self, name: &str) -> Option<&str> {
        self.extensions.get(name).map(String::as_str)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RssChannel {
    pub title: Option<String>,
    pub link: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub entries: Vec<FeedEntry>,
}

struct Open {
    name: String,
    text: String,
}

#[derive(Default)]
struct RssReader {
    channel: RssChannel,
    entry: Option<FeedEntry>,
    media: Option<Enclosure>,
    open: Vec<Open>,
}

/// Parses an RSS 2.0 document, including the Media RSS, iTunes and Blip
/// extensions used for enclosures and thumbnails.
pub fn parse_rss(body: &str) -> Result<RssChannel> {
    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(true);

    let mut state = RssReader::default();
    loop {
        match reader.read_event()? {
            Event::Start(start) => {
                state.attributes(&start, false)?;
                state.open.push(Open {
                    name: qualified_name(&start),
                    text: String::new(),
                });
            }
            Event::Empty(start) => state.attributes(&start, true)?,
            Event::Text(text) => {
                if let Some(open) = state.open.last_mut() {
                    open.text.push_str(&text.unescape()?);
                }
            }
            Event::CData(cdata) => {
                if let Some(open) = state.open.last_mut() {
                    open.text.push_str(&String::from_utf8_lossy(&cdata.into_inner()));
                }
            }
            Event::End(_) => {
                if let Some(open) = state.open.pop() {
                    state.close(open);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(state.channel)
}

fn qualified_name(start: &BytesStart) -> String {
    String::from_utf8_lossy(start.name().as_ref()).into_owned()
}

fn attribute(start: &BytesStart, key: &str) -> Result<Option<String>> {
    for attr in start.attributes() {
        let attr = attr.map_err(|e| Error::parse(format!("bad attribute: {}", e)))?;
        if attr.key.as_ref() == key.as_bytes() {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

impl RssReader {
    fn parent(&self) -> Option<&str> {
        self.open.last().map(|open| open.name.as_str())
    }

    /// Handles attribute-carrying elements. `empty` elements never see a
    /// matching end event.
    fn attributes(&mut self, start: &BytesStart, empty: bool) -> Result<()> {
        match qualified_name(start).as_str() {
            "item" => self.entry = Some(FeedEntry::default()),
            "enclosure" => {
                if let (Some(entry), Some(url)) = (self.entry.as_mut(), attribute(start, "url")?) {
                    entry.enclosures.push(Enclosure {
                        url,
                        mime_type: attribute(start, "type")?,
                        length: attribute(start, "length")?.and_then(|l| l.parse().ok()),
                        ..Enclosure::default()
                    });
                }
            }
            "media:content" => {
                if self.entry.is_none() {
                    return Ok(());
                }
                let media = Enclosure {
                    url: attribute(start, "url")?.unwrap_or_default(),
                    mime_type: attribute(start, "type")?,
                    length: attribute(start, "fileSize")?.and_then(|l| l.parse().ok()),
                    is_default: attribute(start, "isDefault")?.as_deref() == Some("true"),
                    ..Enclosure::default()
                };
                if empty {
                    self.push_media(media);
                } else {
                    self.media = Some(media);
                }
            }
            "media:thumbnail" => {
                if let Some(url) = attribute(start, "url")? {
                    if let Some(media) = self.media.as_mut() {
                        media.thumbnails.media_thumbnail.get_or_insert(url);
                    } else if let Some(entry) = self.entry.as_mut() {
                        entry.thumbnails.media_thumbnail.get_or_insert(url);
                    }
                }
            }
            "itunes:image" => {
                if let Some(href) = attribute(start, "href")? {
                    match self.entry.as_mut() {
                        Some(entry) => {
                            entry.thumbnails.itunes_image.get_or_insert(href);
                        }
                        None => {
                            self.channel.image.get_or_insert(href);
                        }
                    }
                }
            }
            "image" => {
                if let (Some(entry), Some(href)) = (self.entry.as_mut(), attribute(start, "href")?) {
                    entry.thumbnails.image.get_or_insert(href);
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn push_media(&mut self, media: Enclosure) {
        if let Some(entry) = self.entry.as_mut() {
            if !media.url.is_empty() {
                entry.media_content.push(media);
            }
        }
    }

    fn close(&mut self, open: Open) {
        let Open { name, text } = open;
        if name == "item" {
            if let Some(entry) = self.entry.take() {
                self.channel.entries.push(entry);
            }
            return;
        }
        if name == "media:content" {
            if let Some(media) = self.media.take() {
                self.push_media(media);
            }
            return;
        }

        let parent = self.parent().map(str::to_string);
        let Some(entry) = self.entry.as_mut() else {
            match (parent.as_deref(), name.as_str()) {
                (Some("channel"), "title") => self.channel.title = Some(text),
                (Some("channel"), "link") => self.channel.link = Some(text),
                (Some("channel"), "description") => self.channel.description = Some(text),
                (Some("image"), "url") => {
                    self.channel.image.get_or_insert(text);
                }
                _ => {}
            }
            return;
        };

        if parent.as_deref() != Some("item") {
            return;
        }
        match name.as_str() {
            "title" => entry.title = Some(text),
            "link" => entry.link = Some(text),
            "description" => entry.summary = Some(text),
            "content:encoded" => entry.content.push(text),
            "author" | "dc:creator" => {
                entry.author.get_or_insert(text);
            }
            "pubDate" | "dc:date" => {
                entry.published.get_or_insert(text);
            }
            "guid" => entry.guid = Some(text),
            "category" => {
                if !text.is_empty() {
                    entry.categories.push(text);
                }
            }
            "blip:thumbnail_src" => entry.thumbnails.blip_thumbnail_src = Some(text),
            other if other.contains(':') => {
                entry.extensions.entry(other.to_string()).or_insert(text);
            }
            _ => {}
        }
    }
}
