use crate::core::error::Result;
use crate::core::extract::{DocumentKind, FieldRule, Rule};
use crate::core::extractor::{ExtractionMethod, ScrapeMethod};
use crate::core::metadata::{Field, VideoRecord};
use crate::core::suite::{Suite, UrlMatch};
use crate::core::transport::{Request, Response};
use regex::Regex;
use std::sync::LazyLock;

static VIDEO_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://video\.google\.com/videoplay\?(?:.*&)?docid=(?P<video_id>-?\d+)")
        .expect("invalid google video regex")
});

/// video.google.com watch pages. No feeds, no search.
pub struct GoogleVideoSuite {
    methods: Vec<Box<dyn ExtractionMethod>>,
}

impl GoogleVideoSuite {
    pub fn new() -> Self {
        Self {
            methods: vec![Box::new(WatchPageMethod::new())],
        }
    }
}

impl Default for GoogleVideoSuite {
    fn default() -> Self {
        Self::new()
    }
}

impl Suite for GoogleVideoSuite {
    fn id(&self) -> &'static str {
        "google_video"
    }

    fn display_name(&self) -> &'static str {
        "Google Video"
    }

    fn video_regex(&self) -> &Regex {
        &VIDEO_RE
    }

    fn methods(&self) -> &[Box<dyn ExtractionMethod>] {
        &self.methods
    }
}

/// Scrapes the watch page. Download links found there often stop working,
/// so any file URL is flagged as flaky.
struct WatchPageMethod {
    page: ScrapeMethod,
    fields: Vec<Field>,
}

impl WatchPageMethod {
    fn new() -> Self {
        let page = ScrapeMethod::new(
            "watch_page",
            "{url}",
            DocumentKind::Html,
            vec![
                FieldRule::new(Field::Title, Rule::css("#video-title")),
                FieldRule::cleaned(Field::Description, Rule::css_inner_html("#video-description")),
                FieldRule::new(
                    Field::FileUrl,
                    Rule::css_attr("#download-instructions-detail a", "href"),
                ),
                FieldRule::new(Field::EmbedCode, Rule::css("textarea#embed-video-code")),
            ],
        );
        let mut fields = page.fields().to_vec();
        fields.push(Field::FileUrlIsFlaky);
        Self { page, fields }
    }
}

impl ExtractionMethod for WatchPageMethod {
    fn name(&self) -> &str {
        self.page.name()
    }

    fn fields(&self) -> &[Field] {
        &self.fields
    }

    fn request(&self, video: &UrlMatch) -> Result<Request> {
        self.page.request(video)
    }

    fn process(&self, video: &UrlMatch, response: &Response) -> Result<VideoRecord> {
        let mut record = self.page.process(video, response)?;
        if record.contains(Field::FileUrl) {
            record.set(Field::FileUrlIsFlaky, true);
        }
        Ok(record)
    }
}
