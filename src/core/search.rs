use crate::core::error::{Error, Result};
use crate::core::feed::RawItem;
use crate::core::metadata::VideoRecord;
use crate::core::suite::{OrderBy, Suite};
use crate::core::transport::{Client, Request, Response};
use crate::utils::search_string_from_terms;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub include_terms: Vec<String>,
    pub exclude_terms: Vec<String>,
    pub order_by: Option<OrderBy>,
}

impl SearchQuery {
    pub fn new<I, S>(include_terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            include_terms: include_terms.into_iter().map(Into::into).collect(),
            exclude_terms: Vec::new(),
            order_by: None,
        }
    }

    pub fn exclude<I, S>(mut self, terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_terms.extend(terms.into_iter().map(Into::into));
        self
    }

    pub fn order_by(mut self, order_by: OrderBy) -> Self {
        self.order_by = Some(order_by);
        self
    }

    pub fn search_string(&self) -> String {
        search_string_from_terms(&self.include_terms, &self.exclude_terms)
    }
}

/// One page of search results as the suite parsed it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchPage {
    pub items: Vec<RawItem>,
    pub total: Option<u64>,
    pub page: u32,
    pub per_page: u32,
}

impl SearchPage {
    /// The following page number, or `None` once `page * per_page` covers
    /// the total. Without a total there is only one page.
    pub fn next_page(&self) -> Option<u32> {
        let total = self.total?;
        if self.per_page == 0 || u64::from(self.page) * u64::from(self.per_page) >= total {
            None
        } else {
            Some(self.page + 1)
        }
    }
}

/// Forward-only walk over a suite's search results.
pub struct SearchSession {
    suite: Arc<dyn Suite>,
    client: Client,
    query: SearchQuery,
    next_request: Option<Request>,
    total: Option<u64>,
    pages_fetched: u32,
    /// Number of the page last requested; the first request is page 1.
    page_number: u32,
}

impl SearchSession {
    /// Validates the query against the suite before anything is fetched:
    /// search support, credentials, and the order-by value.
    pub fn new(suite: Arc<dyn Suite>, query: SearchQuery, client: Client) -> Result<Self> {
        if !suite.supports_search() {
            return Err(Error::unsupported(format!("{} search", suite.id())));
        }
        if suite.search_requires_credentials() && !client.is_authenticated() {
            return Err(Error::unsupported(format!(
                "{} search without credentials",
                suite.id()
            )));
        }
        if let Some(order_by) = query.order_by {
            if !suite.order_bys().contains(&order_by) {
                return Err(Error::unsupported(format!(
                    "{} search ordered by {}",
                    suite.id(),
                    order_by
                )));
            }
        }
        if query.include_terms.is_empty() {
            return Err(Error::Config("search needs at least one term".to_string()));
        }

        let first = suite.search_request(&query, None)?;
        Ok(Self {
            suite,
            client,
            query,
            next_request: Some(first),
            total: None,
            pages_fetched: 0,
            page_number: 1,
        })
    }

    pub fn query(&self) -> &SearchQuery {
        &self.query
    }

    pub fn total(&self) -> Option<u64> {
        self.total
    }

    pub fn pages_fetched(&self) -> u32 {
        self.pages_fetched
    }

    pub fn is_exhausted(&self) -> bool {
        self.next_request.is_none()
    }

    /// Fetches the next page of results. Returns an empty page without
    /// fetching once the results are exhausted.
    pub async fn next_page(&mut self) -> Result<Vec<Result<VideoRecord>>> {
        let Some(request) = self.next_request.clone() else {
            return Ok(Vec::new());
        };

        let response = self.client.send(request).await?;
        let page = self.parse(&response)?;
        self.pages_fetched += 1;
        self.total = page.total.or(self.total);
        if let Some(next) = page.next_page() {
            if next <= self.page_number {
                self.next_request = None;
                return Err(Error::parse(format!(
                    "{} search did not advance past page {}",
                    self.suite.id(),
                    self.page_number
                )));
            }
            self.page_number = next;
        }
        self.next_request = self.suite.next_search_request(&self.query, &page)?;

        tracing::debug!(
            "{} search page {}: {} results, total {:?}",
            self.suite.id(),
            self.pages_fetched,
            page.items.len(),
            self.total
        );
        Ok(page
            .items
            .iter()
            .map(|item| self.suite.parse_search_result(item))
            .collect())
    }

    pub async fn collect(&mut self, limit: Option<usize>) -> Result<Vec<Result<VideoRecord>>> {
        let mut results = Vec::new();
        while !self.is_exhausted() && limit.map_or(true, |limit| results.len() < limit) {
            results.extend(self.next_page().await?);
        }
        if let Some(limit) = limit {
            results.truncate(limit);
        }
        Ok(results)
    }

    fn parse(&self, response: &Response) -> Result<SearchPage> {
        if !response.is_success() {
            return Err(Error::Transport(format!("HTTP {}", response.status)));
        }
        self.suite.parse_search_page(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::extractor::ExtractionMethod;
    use crate::core::transport::ScriptedTransport;
    use regex::Regex;

    /// Search-only suite whose server always reports page 1 of 500.
    struct StuckSearch {
        regex: Regex,
    }

    impl Suite for StuckSearch {
        fn id(&self) -> &'static str {
            "stuck"
        }

        fn display_name(&self) -> &'static str {
            "Stuck"
        }

        fn video_regex(&self) -> &Regex {
            &self.regex
        }

        fn methods(&self) -> &[Box<dyn ExtractionMethod>] {
            &[]
        }

        fn supports_search(&self) -> bool {
            true
        }

        fn search_request(&self, query: &SearchQuery, page: Option<u32>) -> Result<Request> {
            let request = Request::get("http://stuck.test/search").param("q", query.search_string());
            Ok(match page {
                Some(page) => request.param("page", page),
                None => request,
            })
        }

        fn parse_search_page(&self, _response: &Response) -> Result<SearchPage> {
            Ok(SearchPage {
                items: Vec::new(),
                total: Some(500),
                page: 1,
                per_page: 50,
            })
        }
    }

    #[test]
    fn test_next_page_arithmetic() {
        let page = |page, per_page, total| SearchPage {
            items: Vec::new(),
            total,
            page,
            per_page,
        };
        assert_eq!(page(1, 50, Some(120)).next_page(), Some(2));
        assert_eq!(page(2, 50, Some(120)).next_page(), Some(3));
        assert_eq!(page(3, 50, Some(120)).next_page(), None);
        assert_eq!(page(2, 50, Some(100)).next_page(), None);
        assert_eq!(page(1, 50, None).next_page(), None);
        assert_eq!(page(1, 50, Some(0)).next_page(), None);
    }

    #[tokio::test]
    async fn test_session_stops_when_pages_do_not_advance() {
        let transport = Arc::new(ScriptedTransport::new().respond("http://stuck.test/", Response::ok("")));
        let suite = Arc::new(StuckSearch {
            regex: Regex::new(r"^http://stuck\.test/(?P<video_id>\d+)$").unwrap(),
        });
        let mut session =
            SearchSession::new(suite, SearchQuery::new(["cats"]), Client::new(transport.clone())).unwrap();

        assert!(session.next_page().await.unwrap().is_empty());
        assert!(matches!(session.next_page().await, Err(Error::Parse(_))));
        assert!(session.is_exhausted());
        assert!(session.collect(None).await.unwrap().is_empty());
        assert_eq!(
            transport.fetched_urls(),
            vec!["http://stuck.test/search?q=cats", "http://stuck.test/search?q=cats&page=2"]
        );
    }

    #[test]
    fn test_query_search_string() {
        let query = SearchQuery::new(["cats", "piano"]).exclude(["dogs"]);
        assert_eq!(query.search_string(), "cats piano -dogs");
    }
}
