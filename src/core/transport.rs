use crate::core::error::{Error, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// An outgoing request. GET params are appended to the query string, POST
/// params are sent as a form body. `authenticated` requests must pass
/// through a [`CredentialSigner`] before they are sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub url: String,
    pub method: HttpMethod,
    pub params: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub authenticated: bool,
}

impl Request {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: HttpMethod::Get,
            params: Vec::new(),
            headers: Vec::new(),
            authenticated: false,
        }
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Post,
            ..Self::get(url)
        }
    }

    pub fn param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.params.push((key.into(), value.to_string()));
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    pub fn authenticated(mut self) -> Self {
        self.authenticated = true;
        self
    }

    /// The URL as it goes on the wire, query string included.
    pub fn full_url(&self) -> String {
        if self.params.is_empty() || self.method == HttpMethod::Post {
            return self.url.clone();
        }
        let query = self
            .params
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        let separator = if self.url.contains('?') { '&' } else { '?' };
        format!("{}{}{}", self.url, separator, query)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Response {
    pub fn ok(body: impl Into<String>) -> Self {
        Self::with_status(200, body)
    }

    pub fn with_status(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Performs a single request/response exchange. Retries and timeouts are
/// the implementation's business.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch(&self, request: &Request) -> Result<Response>;
}

pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, request: &Request) -> Result<Response> {
        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url).query(&request.params),
            HttpMethod::Post => self.client.post(&request.url).form(&request.params),
        };
        for (key, value) in &request.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }

        tracing::debug!("{:?} {}", request.method, request.full_url());
        let response = builder.send().await?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(key, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (key.as_str().to_string(), value.to_string()))
            })
            .collect();
        let body = response.text().await?;
        tracing::debug!("HTTP {} ({} bytes)", status, body.len());

        Ok(Response {
            status,
            headers,
            body,
        })
    }
}

/// Signs requests for credentialed endpoints.
pub trait CredentialSigner: Send + Sync {
    fn sign(&self, request: Request) -> Result<Request>;
}

pub struct BearerTokenSigner {
    token: String,
}

impl BearerTokenSigner {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl fmt::Debug for BearerTokenSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerTokenSigner { token: <redacted> }")
    }
}

impl CredentialSigner for BearerTokenSigner {
    fn sign(&self, request: Request) -> Result<Request> {
        if self.token.is_empty() {
            return Err(Error::Config("empty bearer token".to_string()));
        }
        Ok(request.header("Authorization", format!("Bearer {}", self.token)))
    }
}

/// A transport paired with the optional signer for credentialed endpoints.
#[derive(Clone)]
pub struct Client {
    transport: Arc<dyn Transport>,
    signer: Option<Arc<dyn CredentialSigner>>,
}

impl Client {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            signer: None,
        }
    }

    pub fn with_signer(mut self, signer: Arc<dyn CredentialSigner>) -> Self {
        self.signer = Some(signer);
        self
    }

    /// Whether credentialed endpoints are reachable.
    pub fn is_authenticated(&self) -> bool {
        self.signer.is_some()
    }

    pub async fn send(&self, request: Request) -> Result<Response> {
        let request = if request.authenticated {
            let signer = self.signer.as_ref().ok_or_else(|| {
                Error::unsupported(format!("{} requires credentials", request.url))
            })?;
            signer.sign(request)?
        } else {
            request
        };
        self.transport.fetch(&request).await
    }
}

#[derive(Debug, Clone)]
enum Scripted {
    Respond(Response),
    Fail(String),
}

/// In-memory transport serving canned responses by URL prefix.
///
/// Each prefix holds a queue; the last queued outcome keeps being served
/// once the queue is down to one entry. The longest matching prefix wins.
#[derive(Default)]
pub struct ScriptedTransport {
    routes: Mutex<Vec<(String, VecDeque<Scripted>)>>,
    requests: Mutex<Vec<Request>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, prefix: impl Into<String>, response: Response) -> Self {
        self.push(prefix.into(), Scripted::Respond(response));
        self
    }

    pub fn fail(self, prefix: impl Into<String>, message: impl Into<String>) -> Self {
        self.push(prefix.into(), Scripted::Fail(message.into()));
        self
    }

    fn push(&self, prefix: String, outcome: Scripted) {
        let mut routes = self.routes.lock().unwrap_or_else(|e| e.into_inner());
        match routes.iter_mut().find(|(p, _)| *p == prefix) {
            Some((_, queue)) => queue.push_back(outcome),
            None => routes.push((prefix, VecDeque::from([outcome]))),
        }
    }

    /// Every request fetched so far, in order.
    pub fn requests(&self) -> Vec<Request> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn fetched_urls(&self) -> Vec<String> {
        self.requests().iter().map(Request::full_url).collect()
    }

    pub fn fetch_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn fetch(&self, request: &Request) -> Result<Response> {
        let url = request.full_url();
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.clone());

        let outcome = {
            let mut routes = self.routes.lock().unwrap_or_else(|e| e.into_inner());
            let route = routes
                .iter_mut()
                .filter(|(prefix, _)| url.starts_with(prefix.as_str()))
                .max_by_key(|(prefix, _)| prefix.len());
            match route {
                Some((_, queue)) if queue.len() > 1 => queue.pop_front(),
                Some((_, queue)) => queue.front().cloned(),
                None => None,
            }
        };

        match outcome {
            Some(Scripted::Respond(response)) => Ok(response),
            Some(Scripted::Fail(message)) => Err(Error::Transport(message)),
            None => Err(Error::Transport(format!("no scripted response for {}", url))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_url_appends_encoded_params() {
        let request = Request::get("http://vimeo.com/api/rest/v2")
            .param("query", "cats & dogs")
            .param("page", 2);
        assert_eq!(
            request.full_url(),
            "http://vimeo.com/api/rest/v2?query=cats%20%26%20dogs&page=2"
        );

        let request = Request::get("http://blip.tv/rss?skin=rss").param("page", 3);
        assert_eq!(request.full_url(), "http://blip.tv/rss?skin=rss&page=3");

        let request = Request::post("http://example.com/form").param("q", "x");
        assert_eq!(request.method, HttpMethod::Post);
        assert_eq!(request.full_url(), "http://example.com/form");
    }

    #[test]
    fn test_header_lookup_ignores_case() {
        let response = Response::ok("").with_header("ETag", "\"abc\"");
        assert_eq!(response.header("etag"), Some("\"abc\""));
        assert_eq!(response.header("last-modified"), None);
    }

    #[test]
    fn test_bearer_signer_adds_authorization() {
        let signer = BearerTokenSigner::new("secret");
        let signed = signer.sign(Request::get("http://example.com")).unwrap();
        assert_eq!(
            signed.headers,
            vec![("Authorization".to_string(), "Bearer secret".to_string())]
        );
        assert!(!format!("{:?}", signer).contains("secret"));
    }

    #[tokio::test]
    async fn test_scripted_transport_serves_queue_then_repeats_last() {
        let transport = ScriptedTransport::new()
            .respond("http://a/", Response::ok("one"))
            .respond("http://a/", Response::ok("two"))
            .respond("http://a/b", Response::ok("longest"));

        let first = transport.fetch(&Request::get("http://a/x")).await.unwrap();
        let second = transport.fetch(&Request::get("http://a/x")).await.unwrap();
        let third = transport.fetch(&Request::get("http://a/x")).await.unwrap();
        let nested = transport.fetch(&Request::get("http://a/b/c")).await.unwrap();

        assert_eq!(first.body, "one");
        assert_eq!(second.body, "two");
        assert_eq!(third.body, "two");
        assert_eq!(nested.body, "longest");
        assert!(transport.fetch(&Request::get("http://zzz")).await.is_err());
        assert_eq!(transport.fetch_count(), 5);
    }

    #[tokio::test]
    async fn test_client_signs_only_authenticated_requests() {
        let transport = Arc::new(ScriptedTransport::new().respond("http://a/", Response::ok("")));
        let anonymous = Client::new(transport.clone());
        assert!(anonymous.send(Request::get("http://a/public")).await.is_ok());
        assert!(matches!(
            anonymous.send(Request::get("http://a/private").authenticated()).await,
            Err(Error::CapabilityUnsupported(_))
        ));

        let signed = anonymous.with_signer(Arc::new(BearerTokenSigner::new("t")));
        signed
            .send(Request::get("http://a/private").authenticated())
            .await
            .unwrap();

        let requests = transport.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].headers.is_empty());
        assert_eq!(requests[1].headers[0].1, "Bearer t");
    }
}
