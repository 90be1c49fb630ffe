use crate::core::error::{Error, Result};
use crate::core::suite::{Suite, UrlMatch};
use crate::suites::{BlipSuite, GoogleVideoSuite, VimeoSuite};
use std::sync::{Arc, LazyLock};

static GLOBAL: LazyLock<Arc<Registry>> = LazyLock::new(|| {
    Arc::new(Registry::builtin().expect("duplicate built-in suite id"))
});

/// The process-wide registry of built-in suites, built on first use.
pub fn global() -> Arc<Registry> {
    Arc::clone(&GLOBAL)
}

/// Ordered collection of suites. When several suites match a URL, the one
/// registered first wins.
#[derive(Default)]
pub struct Registry {
    suites: Vec<Arc<dyn Suite>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Vimeo, Blip.tv and Google Video, in that order.
    pub fn builtin() -> Result<Self> {
        let mut registry = Self::new();
        registry.register(Arc::new(VimeoSuite::new()))?;
        registry.register(Arc::new(BlipSuite::new()))?;
        registry.register(Arc::new(GoogleVideoSuite::new()))?;
        Ok(registry)
    }

    pub fn register(&mut self, suite: Arc<dyn Suite>) -> Result<()> {
        if self.suites.iter().any(|s| s.id() == suite.id()) {
            return Err(Error::DuplicateSuite(suite.id().to_string()));
        }
        tracing::debug!("registered suite {}", suite.id());
        self.suites.push(suite);
        Ok(())
    }

    pub fn suites(&self) -> &[Arc<dyn Suite>] {
        &self.suites
    }

    pub fn get(&self, id: &str) -> Result<Arc<dyn Suite>> {
        self.suites
            .iter()
            .find(|s| s.id() == id)
            .cloned()
            .ok_or_else(|| Error::UnknownSuite(id.to_string()))
    }

    /// The first suite whose video pattern matches `url`.
    pub fn suite_for_url(&self, url: &str) -> Result<(Arc<dyn Suite>, UrlMatch)> {
        self.suites
            .iter()
            .find_map(|suite| suite.match_video_url(url).map(|m| (Arc::clone(suite), m)))
            .ok_or_else(|| Error::UnhandledUrl(url.to_string()))
    }

    /// The first suite whose feed patterns match `url`.
    pub fn suite_for_feed_url(&self, url: &str) -> Result<(Arc<dyn Suite>, UrlMatch)> {
        self.suites
            .iter()
            .find_map(|suite| suite.match_feed_url(url).map(|m| (Arc::clone(suite), m)))
            .ok_or_else(|| Error::UnhandledUrl(url.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::extractor::ExtractionMethod;
    use regex::Regex;

    struct Catchall {
        id: &'static str,
        regex: Regex,
    }

    impl Catchall {
        fn new(id: &'static str, pattern: &str) -> Arc<dyn Suite> {
            Arc::new(Self {
                id,
                regex: Regex::new(pattern).unwrap(),
            })
        }
    }

    impl Suite for Catchall {
        fn id(&self) -> &'static str {
            self.id
        }

        fn display_name(&self) -> &'static str {
            self.id
        }

        fn video_regex(&self) -> &Regex {
            &self.regex
        }

        fn methods(&self) -> &[Box<dyn ExtractionMethod>] {
            &[]
        }
    }

    #[test]
    fn test_first_registered_suite_wins() {
        let mut registry = Registry::new();
        registry
            .register(Catchall::new("specific", r"^http://site/(?P<video_id>\d+)$"))
            .unwrap();
        registry
            .register(Catchall::new("broad", r"^http://site/(?P<video_id>.+)$"))
            .unwrap();

        let (suite, matched) = registry.suite_for_url("http://site/12").unwrap();
        assert_eq!(suite.id(), "specific");
        assert_eq!(matched.video_id().unwrap(), "12");

        let (suite, _) = registry.suite_for_url("http://site/abc").unwrap();
        assert_eq!(suite.id(), "broad");
    }

    #[test]
    fn test_unhandled_and_duplicate() {
        let mut registry = Registry::new();
        registry.register(Catchall::new("a", r"^http://a/")).unwrap();
        assert!(matches!(
            registry.register(Catchall::new("a", r"^http://b/")),
            Err(Error::DuplicateSuite(id)) if id == "a"
        ));
        assert!(matches!(
            registry.suite_for_url("http://nowhere/1"),
            Err(Error::UnhandledUrl(_))
        ));
        assert!(matches!(registry.get("zzz"), Err(Error::UnknownSuite(_))));
        assert!(matches!(
            registry.suite_for_feed_url("http://a/feed"),
            Err(Error::UnhandledUrl(_))
        ));
    }

    #[test]
    fn test_builtin_order() {
        let ids: Vec<_> = global().suites().iter().map(|s| s.id()).collect();
        assert_eq!(ids, vec!["vimeo", "blip", "google_video"]);

        let (suite, matched) = global()
            .suite_for_url("http://video.google.com/videoplay?docid=-123&hl=en")
            .unwrap();
        assert_eq!(suite.id(), "google_video");
        assert_eq!(matched.video_id().unwrap(), "-123");
    }

    #[test]
    fn test_builtin_rejects_reregistration() {
        let mut registry = Registry::builtin().unwrap();
        assert_eq!(registry.suites().len(), 3);
        assert!(matches!(
            registry.register(Arc::new(VimeoSuite::new())),
            Err(Error::DuplicateSuite(id)) if id == "vimeo"
        ));
        assert_eq!(registry.suites().len(), 3);
    }
}
