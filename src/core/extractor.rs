use crate::core::error::{Error, Result};
use crate::core::extract::{json_scalar, Document, DocumentKind, FieldRule};
use crate::core::metadata::{Field, VideoRecord};
use crate::core::suite::UrlMatch;
use crate::core::transport::{Request, Response};

/// One strategy for obtaining fields of a single video: an official API,
/// an oEmbed endpoint, a page scrape.
///
/// Methods are stateless and shared across videos. `fields` documents what
/// the method can produce; the record it returns is never filtered by it.
pub trait ExtractionMethod: Send + Sync {
    fn name(&self) -> &str;

    fn fields(&self) -> &[Field];

    /// Builds the request for this video. Returning an `authenticated`
    /// request marks the method as credentialed: it is skipped when no
    /// signer is available.
    fn request(&self, video: &UrlMatch) -> Result<Request>;

    /// Maps a successful response to the fields this method could find.
    /// Fields it could not find are left out, not defaulted.
    fn process(&self, video: &UrlMatch, response: &Response) -> Result<VideoRecord>;
}

/// Generic oEmbed endpoint method.
pub struct OEmbedMethod {
    endpoint: String,
}

impl OEmbedMethod {
    const FIELDS: [Field; 5] = [
        Field::Title,
        Field::User,
        Field::UserUrl,
        Field::ThumbnailUrl,
        Field::EmbedCode,
    ];

    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }
}

impl ExtractionMethod for OEmbedMethod {
    fn name(&self) -> &str {
        "oembed"
    }

    fn fields(&self) -> &[Field] {
        &Self::FIELDS
    }

    fn request(&self, video: &UrlMatch) -> Result<Request> {
        Ok(Request::get(self.endpoint.as_str()).param("url", video.url()))
    }

    fn process(&self, _video: &UrlMatch, response: &Response) -> Result<VideoRecord> {
        let data: serde_json::Value = serde_json::from_str(&response.body)?;
        let mut record = VideoRecord::new();
        for (key, field) in [
            ("title", Field::Title),
            ("author_name", Field::User),
            ("author_url", Field::UserUrl),
            ("thumbnail_url", Field::ThumbnailUrl),
            ("html", Field::EmbedCode),
        ] {
            if let Some(value) = data.get(key).and_then(json_scalar) {
                record.set(field, value);
            }
        }
        Ok(record)
    }
}

/// A method driven entirely by per-field rules over one fetched document.
pub struct ScrapeMethod {
    name: String,
    url_template: String,
    kind: DocumentKind,
    rules: Vec<FieldRule>,
    fields: Vec<Field>,
}

impl ScrapeMethod {
    /// `url_template` may reference capture groups as `{video_id}` and the
    /// original URL as `{url}`.
    pub fn new(
        name: impl Into<String>,
        url_template: impl Into<String>,
        kind: DocumentKind,
        rules: Vec<FieldRule>,
    ) -> Self {
        let fields = rules.iter().map(|rule| rule.field).collect();
        Self {
            name: name.into(),
            url_template: url_template.into(),
            kind,
            rules,
            fields,
        }
    }
}

impl ExtractionMethod for ScrapeMethod {
    fn name(&self) -> &str {
        &self.name
    }

    fn fields(&self) -> &[Field] {
        &self.fields
    }

    fn request(&self, video: &UrlMatch) -> Result<Request> {
        Ok(Request::get(video.expand(&self.url_template)?))
    }

    fn process(&self, _video: &UrlMatch, response: &Response) -> Result<VideoRecord> {
        let doc = Document::parse(self.kind, &response.body)?;
        let mut record = VideoRecord::new();
        for rule in &self.rules {
            match rule.extract(&doc) {
                Ok(value) => {
                    record.set(rule.field, value);
                }
                Err(Error::FieldNotFound(what)) => {
                    tracing::debug!("{}: no {} ({})", self.name, rule.field, what);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(record)
    }
}
