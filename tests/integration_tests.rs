use anyhow::Result;
use regex::Regex;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use vidscrape::core::extract::{DocumentKind, FieldRule, Rule};
use vidscrape::core::feed::{FeedState, Termination};
use vidscrape::core::transport::{
    BearerTokenSigner, HttpTransport, Request, Response, ScriptedTransport, Transport,
};
use vidscrape::core::{
    AttemptOutcome, ExtractionMethod, Registry, ScrapeMethod, SearchPage, UrlMatch,
};
use vidscrape::{Error, Field, OrderBy, Scraper, SearchQuery, Suite};
use wiremock::matchers::{body_string, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const VIMEO_URL: &str = "http://vimeo.com/1234";
const OEMBED: &str = "http://vimeo.com/api/oembed.json";
const SIMPLE_API: &str = "http://vimeo.com/api/v2/video/1234.json";
const MOOGALOOP: &str = "http://www.vimeo.com/moogaloop/load/clip:1234";
const REST_API: &str = "http://vimeo.com/api/rest/v2";

fn oembed_body() -> Response {
    Response::ok(
        json!({
            "title": "oEmbed title",
            "author_name": "Ann",
            "author_url": "http://vimeo.com/ann",
            "html": "<iframe src=\"http://player.vimeo.com/video/1234\"></iframe>"
        })
        .to_string(),
    )
}

fn simple_api_body(upload_date: &str) -> Response {
    Response::ok(
        json!([{
            "id": 1234,
            "title": "API title",
            "url": VIMEO_URL,
            "description": "From the API",
            "thumbnail_medium": "http://b.vimeocdn.com/ts/1234_200.jpg",
            "user_name": "Ann",
            "user_url": "http://vimeo.com/ann",
            "upload_date": upload_date,
            "tags": "talk, science"
        }])
        .to_string(),
    )
}

fn moogaloop_body() -> Response {
    Response::ok(
        r#"<xml>
             <video>
               <nodeId>1234</nodeId>
               <caption>Moogaloop title</caption>
               <isHD>0</isHD>
             </video>
             <request_signature>sig</request_signature>
             <request_signature_expires>1300000000</request_signature_expires>
           </xml>"#,
    )
}

fn scraper(transport: Arc<ScriptedTransport>) -> Scraper {
    Scraper::new(transport)
}

#[tokio::test]
async fn test_registry_routes_urls() -> Result<()> {
    let registry = vidscrape::registry::global();

    let (suite, video) = registry.suite_for_url(VIMEO_URL)?;
    assert_eq!(suite.id(), "vimeo");
    assert_eq!(video.video_id()?, "1234");

    let (suite, _) = registry.suite_for_url("http://blip.tv/show/pilot-77")?;
    assert_eq!(suite.id(), "blip");

    let (suite, _) = registry.suite_for_feed_url("http://show.blip.tv/rss")?;
    assert_eq!(suite.id(), "blip");

    assert!(matches!(
        registry.suite_for_url("https://example.com/watch/1"),
        Err(Error::UnhandledUrl(_))
    ));
    Ok(())
}

#[tokio::test]
async fn test_vimeo_methods_merge_in_order() -> Result<()> {
    let transport = Arc::new(
        ScriptedTransport::new()
            .respond(OEMBED, oembed_body())
            .respond(SIMPLE_API, simple_api_body("2011-03-04 10:20:30"))
            .respond(MOOGALOOP, moogaloop_body()),
    );
    let extraction = scraper(transport.clone())
        .fetch_video_detailed(VIMEO_URL)
        .await?;
    let record = &extraction.record;

    // supplied by all three, the moogaloop config runs last
    assert_eq!(record.title(), Some("Moogaloop title"));
    // only oEmbed and the API supply these; the API runs later
    assert_eq!(record.text(Field::User), Some("Ann"));
    assert!(record
        .text(Field::EmbedCode)
        .unwrap_or_default()
        .contains("width=\"320\""));
    // API only
    assert_eq!(record.description(), Some("From the API"));
    assert_eq!(record.text(Field::Guid), Some("tag:vimeo,2011-03-04:clip1234"));
    // moogaloop only
    assert_eq!(
        record.text(Field::FileUrl),
        Some("http://www.vimeo.com/moogaloop/play/clip:1234/sig/1300000000/?q=sd")
    );

    let methods: Vec<_> = extraction.attempts.iter().map(|a| a.method.as_str()).collect();
    assert_eq!(methods, vec!["oembed", "simple_api", "moogaloop"]);
    assert_eq!(
        transport.fetched_urls(),
        vec![
            "http://vimeo.com/api/oembed.json?url=http%3A%2F%2Fvimeo.com%2F1234",
            SIMPLE_API,
            MOOGALOOP,
        ]
    );
    Ok(())
}

#[tokio::test]
async fn test_failed_method_does_not_overwrite() -> Result<()> {
    let transport = Arc::new(
        ScriptedTransport::new()
            .respond(OEMBED, oembed_body())
            .respond(SIMPLE_API, simple_api_body("2011-03-04 10:20:30"))
            .fail(MOOGALOOP, "connection reset"),
    );
    let extraction = scraper(transport).fetch_video_detailed(VIMEO_URL).await?;

    assert_eq!(extraction.record.title(), Some("API title"));
    assert!(!extraction.record.contains(Field::FileUrl));
    assert!(matches!(
        extraction.attempts[2].outcome,
        AttemptOutcome::Failed(_)
    ));
    Ok(())
}

#[tokio::test]
async fn test_deleted_vimeo_video() -> Result<()> {
    let transport = Arc::new(
        ScriptedTransport::new()
            .respond(OEMBED, oembed_body())
            .respond(SIMPLE_API, simple_api_body(""))
            .respond(MOOGALOOP, moogaloop_body()),
    );
    let result = scraper(transport.clone()).fetch_video(VIMEO_URL).await;

    assert!(matches!(result, Err(Error::VideoDeleted(link)) if link == VIMEO_URL));
    assert_eq!(transport.fetch_count(), 2);
    Ok(())
}

#[tokio::test]
async fn test_malformed_api_object_keeps_other_fields() -> Result<()> {
    let transport = Arc::new(
        ScriptedTransport::new()
            .respond(OEMBED, Response::ok(json!({"title": "oEmbed title"}).to_string()))
            .respond(SIMPLE_API, Response::ok(json!([{"error": "rate limited"}]).to_string()))
            .respond(MOOGALOOP, Response::with_status(500, "")),
    );
    let extraction = scraper(transport.clone())
        .fetch_video_detailed(VIMEO_URL)
        .await?;

    assert_eq!(extraction.record.title(), Some("oEmbed title"));
    assert!(matches!(
        extraction.attempts[1].outcome,
        AttemptOutcome::Failed(_)
    ));
    assert_eq!(transport.fetch_count(), 3);
    Ok(())
}

#[tokio::test]
async fn test_every_method_failing_is_not_found() -> Result<()> {
    let transport = Arc::new(
        ScriptedTransport::new()
            .fail(OEMBED, "timeout")
            .respond(SIMPLE_API, Response::with_status(404, "not found"))
            .respond(MOOGALOOP, Response::with_status(500, "")),
    );
    let result = scraper(transport.clone()).fetch_video(VIMEO_URL).await;

    assert!(matches!(result, Err(Error::VideoNotFound(_))));
    assert_eq!(transport.fetch_count(), 3);
    Ok(())
}

#[tokio::test]
async fn test_vimeo_search_needs_credentials() -> Result<()> {
    let transport = Arc::new(ScriptedTransport::new());
    let result = scraper(transport.clone()).search("vimeo", SearchQuery::new(["cats"]));

    assert!(matches!(result, Err(Error::CapabilityUnsupported(_))));
    assert_eq!(transport.fetch_count(), 0);

    assert!(matches!(
        scraper(transport.clone()).search("google_video", SearchQuery::new(["cats"])),
        Err(Error::CapabilityUnsupported(_))
    ));
    assert!(matches!(
        scraper(transport).search("nowhere", SearchQuery::new(["cats"])),
        Err(Error::UnknownSuite(_))
    ));
    Ok(())
}

fn search_result(id: u32, upload_date: &str) -> serde_json::Value {
    json!({
        "id": id.to_string(),
        "title": format!("Result {}", id),
        "description": "",
        "upload_date": upload_date,
        "urls": {"url": [{"type": "video", "_content": format!("http://vimeo.com/{}", id)}]},
        "thumbnails": {"thumbnail": [{"_content": "http://t/small.jpg"}]},
        "owner": {"realname": "Bo", "profileurl": "http://vimeo.com/bo"}
    })
}

#[tokio::test]
async fn test_vimeo_search_pages_with_signer() -> Result<()> {
    let first = format!("{}?format=json&full_response=1&method=vimeo.videos.search&query=cats", REST_API);
    let second = format!("{}&sort=newest&page=2", first);
    let first = format!("{}&sort=newest", first);
    let transport = Arc::new(
        ScriptedTransport::new()
            .respond(
                first.as_str(),
                Response::ok(
                    json!({"videos": {"total": "3", "page": "1", "perpage": "2", "on_this_page": "2",
                        "video": [search_result(1, "2012-01-01 00:00:00"), search_result(2, "")]}})
                    .to_string(),
                ),
            )
            .respond(
                second.as_str(),
                Response::ok(
                    json!({"videos": {"total": "3", "page": "2", "perpage": "2", "on_this_page": "1",
                        "video": search_result(3, "2012-01-03 00:00:00")}})
                    .to_string(),
                ),
            ),
    );
    let scraper = scraper(transport.clone()).with_signer(Arc::new(BearerTokenSigner::new("t0ken")));

    let query = SearchQuery::new(["cats"]).order_by(OrderBy::Latest);
    let mut session = scraper.search("vimeo", query)?;
    let results = session.collect(None).await?;

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].as_ref().map(|r| r.title()).ok().flatten(), Some("Result 1"));
    assert!(matches!(&results[1], Err(Error::VideoDeleted(link)) if link == "http://vimeo.com/2"));
    assert_eq!(
        results[2].as_ref().map(|r| r.thumbnail_url()).ok().flatten(),
        Some("http://t/small.jpg")
    );
    assert_eq!(session.total(), Some(3));
    assert!(session.is_exhausted());
    assert_eq!(transport.fetched_urls(), vec![first, second]);
    assert!(transport.requests().iter().all(|request| request
        .headers
        .iter()
        .any(|(key, value)| key == "Authorization" && value == "Bearer t0ken")));
    Ok(())
}

#[tokio::test]
async fn test_vimeo_advanced_feed_stops_at_total() -> Result<()> {
    let videos: Vec<_> = (1..=3)
        .map(|id| search_result(id, "2012-01-01 00:00:00"))
        .collect();
    let transport = Arc::new(
        ScriptedTransport::new()
            .respond(
                "http://vimeo.com/api/v2/album/42/info.json",
                Response::ok(
                    json!({"title": "Shorts", "total_videos": 3, "description": "",
                           "url": "http://vimeo.com/album/42", "thumbnail": "http://t/a.jpg"})
                    .to_string(),
                ),
            )
            .respond(
                REST_API,
                Response::ok(json!({"videos": {"total": "3", "video": videos}}).to_string()),
            ),
    );
    let scraper = scraper(transport.clone()).with_signer(Arc::new(BearerTokenSigner::new("t0ken")));

    let mut feed = scraper.feed("http://vimeo.com/album/42")?;
    assert_eq!(feed.per_page(), 50);
    assert_eq!(feed.load().await?.title.as_deref(), Some("Shorts"));

    let items = feed.collect(None).await?;
    assert_eq!(items.len(), 3);
    assert_eq!(feed.state(), FeedState::Exhausted(Termination::TotalReached));
    assert!(feed.next_page().await?.is_empty());
    assert_eq!(transport.fetch_count(), 2);

    let page_request = &transport.requests()[1];
    assert!(page_request
        .params
        .contains(&("method".to_string(), "vimeo.albums.getVideos".to_string())));
    Ok(())
}

#[test]
fn test_feed_load_is_idempotent() -> Result<()> {
    let transport = Arc::new(ScriptedTransport::new().respond(
        "http://blip.tv/show/rss",
        Response::ok(
            r#"<rss><channel><title>Show</title><description>Episodes</description>
               <link>http://show.blip.tv/</link></channel></rss>"#,
        ),
    ));
    let mut feed = scraper(transport.clone()).feed("http://blip.tv/show/rss")?;

    tokio_test::block_on(async {
        assert_eq!(feed.state(), FeedState::Unloaded);
        let info = feed.load().await?;
        assert_eq!(info.title.as_deref(), Some("Show"));
        assert_eq!(info.webpage.as_deref(), Some("http://show.blip.tv/"));
        feed.load().await?;
        assert_eq!(feed.state(), FeedState::Loaded);
        Ok::<_, Error>(())
    })?;
    assert_eq!(transport.fetch_count(), 1);
    Ok(())
}

/// A search-only suite that declares a single ordering.
struct LatestOnly {
    regex: Regex,
}

impl Suite for LatestOnly {
    fn id(&self) -> &'static str {
        "latest_only"
    }

    fn display_name(&self) -> &'static str {
        "Latest only"
    }

    fn video_regex(&self) -> &Regex {
        &self.regex
    }

    fn methods(&self) -> &[Box<dyn ExtractionMethod>] {
        &[]
    }

    fn order_bys(&self) -> &[OrderBy] {
        &[OrderBy::Latest]
    }

    fn supports_search(&self) -> bool {
        true
    }

    fn search_request(&self, query: &SearchQuery, _page: Option<u32>) -> vidscrape::Result<Request> {
        Ok(Request::get("http://latest.test/search").param("q", query.search_string()))
    }

    fn parse_search_page(&self, _response: &Response) -> vidscrape::Result<SearchPage> {
        Ok(SearchPage::default())
    }
}

#[tokio::test]
async fn test_unsupported_order_by_fails_before_fetch() -> Result<()> {
    let mut registry = Registry::new();
    registry.register(Arc::new(LatestOnly {
        regex: Regex::new(r"^http://latest\.test/(?P<video_id>\d+)$")?,
    }))?;
    let transport = Arc::new(ScriptedTransport::new().respond("http://latest.test/", Response::ok("")));
    let scraper = Scraper::with_registry(transport.clone(), Arc::new(registry));

    let result = scraper.search(
        "latest_only",
        SearchQuery::new(["news"]).order_by(OrderBy::Relevant),
    );
    assert!(matches!(result, Err(Error::CapabilityUnsupported(_))));
    assert_eq!(transport.fetch_count(), 0);

    let mut session = scraper.search("latest_only", SearchQuery::new(["news"]).order_by(OrderBy::Latest))?;
    assert!(session.next_page().await?.is_empty());
    assert_eq!(transport.fetch_count(), 1);
    Ok(())
}

#[tokio::test]
async fn test_http_transport_against_mock_server() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v2/video/1.json"))
        .and(query_param("page", "2"))
        .and(header("user-agent", "vidscrape-test"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("ETag", "\"abc\"")
                .set_body_string("[]"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/forbidden"))
        .respond_with(ResponseTemplate::new(403).set_body_string("no"))
        .mount(&server)
        .await;

    let transport = HttpTransport::new("vidscrape-test", Duration::from_secs(5))?;

    let request = Request::get(format!("{}/api/v2/video/1.json", server.uri())).param("page", 2);
    let response = transport.fetch(&request).await?;
    assert_eq!(response.status, 200);
    assert_eq!(response.body, "[]");
    assert_eq!(response.header("etag"), Some("\"abc\""));

    let response = transport
        .fetch(&Request::get(format!("{}/forbidden", server.uri())))
        .await?;
    assert_eq!(response.status, 403);
    assert!(!response.is_success());

    Mock::given(method("POST"))
        .and(path("/form"))
        .and(body_string("query=cats&page=1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("posted"))
        .mount(&server)
        .await;
    let request = Request::post(format!("{}/form", server.uri()))
        .param("query", "cats")
        .param("page", 1);
    assert_eq!(transport.fetch(&request).await?.body, "posted");
    Ok(())
}

/// A page-scraping suite pointed at the mock server.
struct MockSiteSuite {
    regex: Regex,
    methods: Vec<Box<dyn ExtractionMethod>>,
}

impl Suite for MockSiteSuite {
    fn id(&self) -> &'static str {
        "mock_site"
    }

    fn display_name(&self) -> &'static str {
        "Mock site"
    }

    fn video_regex(&self) -> &Regex {
        &self.regex
    }

    fn methods(&self) -> &[Box<dyn ExtractionMethod>] {
        &self.methods
    }
}

#[tokio::test]
async fn test_scrape_suite_over_http() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/watch/55"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<html><h1 class="title">Over the wire</h1>
               <div id="about"><p>Real <i>HTTP</i></p></div></html>"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/55.json"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let suite = MockSiteSuite {
        regex: Regex::new(r"^http://site\.test/watch/(?P<video_id>\d+)$")?,
        methods: vec![
            Box::new(ScrapeMethod::new(
                "page",
                format!("{}/watch/{{video_id}}", server.uri()),
                DocumentKind::Html,
                vec![
                    FieldRule::new(Field::Title, Rule::css("h1.title")),
                    FieldRule::cleaned(Field::Description, Rule::css_inner_html("#about")),
                ],
            )),
            Box::new(ScrapeMethod::new(
                "api",
                format!("{}/api/{{video_id}}.json", server.uri()),
                DocumentKind::Json,
                vec![FieldRule::new(Field::Title, Rule::json("video.title"))],
            )),
        ],
    };
    let mut registry = Registry::new();
    registry.register(Arc::new(suite))?;

    let transport = Arc::new(HttpTransport::new("vidscrape-test", Duration::from_secs(5))?);
    let scraper = Scraper::with_registry(transport, Arc::new(registry));
    let extraction = scraper
        .fetch_video_detailed("http://site.test/watch/55")
        .await?;

    assert_eq!(extraction.record.title(), Some("Over the wire"));
    assert_eq!(extraction.record.description(), Some("Real HTTP"));
    assert_eq!(
        extraction.attempts[1].outcome,
        AttemptOutcome::Failed("Transport error: HTTP 500".to_string())
    );

    let video: UrlMatch = scraper.registry().suite_for_url("http://site.test/watch/55")?.1;
    assert_eq!(video.video_id()?, "55");
    Ok(())
}
