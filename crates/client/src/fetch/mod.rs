//! Network seam used by the worker.
//!
//! ### Contract
//! - A network-level failure (DNS, connect, timeout) is an `Err`.
//! - Any HTTP response, whatever its status, is an `Ok(Response)`.
//!
//! ### Response bodies
//! - Bodies are buffered `Bytes`. [`Response::tee`] yields two independent
//!   copies, one for the requester and one for the cache store.

pub mod url;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, header};
use std::time::{Duration, Instant};

pub use self::url::{Scope, UrlError, canonicalize};
pub use reqwest::{Method, StatusCode, Url};

use honyaku_core::{AppConfig, CachedResponse, Error};

/// Configuration for the HTTP network.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "honyaku/0.1")
    pub user_agent: String,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self { user_agent: "honyaku/0.1".to_string(), timeout: Duration::from_millis(20000), max_redirects: 5 }
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self { user_agent: config.user_agent.clone(), timeout: config.timeout(), ..Default::default() }
    }
}

/// An outgoing request as seen by the worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    pub url: Url,
}

impl Request {
    /// A GET request for `url`.
    pub fn get(url: Url) -> Self {
        Self { method: Method::GET, url }
    }

    /// Cache identity: upper-case method plus canonical URL.
    pub fn cache_key(&self) -> String {
        honyaku_core::cache::hash::compute_request_key(self.method.as_str(), canonicalize(&self.url).as_str())
    }
}

/// Where a response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Network,
    Cache,
    /// Built by the worker itself (e.g. a redirect).
    Synthetic,
}

impl std::fmt::Display for ResponseSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResponseSource::Network => write!(f, "network"),
            ResponseSource::Cache => write!(f, "cache"),
            ResponseSource::Synthetic => write!(f, "synthetic"),
        }
    }
}

/// A response delivered to the requester.
#[derive(Debug, Clone)]
pub struct Response {
    /// The URL this response answers
    pub url: Url,
    /// HTTP status code
    pub status: StatusCode,
    /// Response headers
    pub headers: header::HeaderMap,
    /// Response body bytes
    pub body: Bytes,
    /// Network, cache, or worker-built
    pub source: ResponseSource,
}

impl Response {
    /// A temporary redirect to `location` (303 See Other).
    pub fn see_other(url: Url, location: &Url) -> Self {
        let mut headers = header::HeaderMap::new();
        if let Ok(value) = header::HeaderValue::from_str(location.as_str()) {
            headers.insert(header::LOCATION, value);
        }
        Self { url, status: StatusCode::SEE_OTHER, headers, body: Bytes::new(), source: ResponseSource::Synthetic }
    }

    /// Whether the status is exactly 200; only those are written to the cache.
    pub fn is_cacheable(&self) -> bool {
        self.status == StatusCode::OK
    }

    /// The `Location` header, if any.
    pub fn location(&self) -> Option<&str> {
        self.headers.get(header::LOCATION).and_then(|v| v.to_str().ok())
    }

    /// Split into two independently consumable copies.
    pub fn tee(self) -> (Self, Self) {
        let copy = self.clone();
        (self, copy)
    }

    /// Snapshot for the cache store, keyed by `request`.
    pub fn to_cached(&self, request: &Request) -> CachedResponse {
        let headers = self
            .headers
            .iter()
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string())))
            .collect();
        CachedResponse::new(
            request.method.as_str(),
            canonicalize(&request.url).as_str(),
            self.status.as_u16(),
            headers,
            self.body.to_vec(),
        )
    }

    /// Rebuild a response from a stored snapshot.
    pub fn from_cached(url: Url, cached: CachedResponse) -> Result<Self, Error> {
        let status = StatusCode::from_u16(cached.status)
            .map_err(|e| Error::CorruptEntry(format!("status {}: {e}", cached.status)))?;
        let mut headers = header::HeaderMap::new();
        for (name, value) in cached.headers {
            let name = header::HeaderName::from_bytes(name.as_bytes()).map_err(|e| Error::CorruptEntry(e.to_string()))?;
            let value = header::HeaderValue::from_str(&value).map_err(|e| Error::CorruptEntry(e.to_string()))?;
            headers.append(name, value);
        }
        Ok(Self { url, status, headers, body: Bytes::from(cached.body), source: ResponseSource::Cache })
    }
}

/// Anything that can perform a fetch on the worker's behalf.
#[async_trait]
pub trait Network: Send + Sync {
    /// Perform the request once. No retries.
    async fn fetch(&self, request: &Request) -> Result<Response, Error>;
}

/// reqwest-backed network.
pub struct HttpNetwork {
    http: Client,
}

impl HttpNetwork {
    /// Create a new network client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http })
    }
}

#[async_trait]
impl Network for HttpNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        let start = Instant::now();

        let response = self
            .http
            .request(request.method.clone(), request.url.clone())
            .send()
            .await
            .map_err(|e| Error::Network(format!("{}: {}", request.url, e)))?;

        let status = response.status();
        let headers = response.headers().clone();

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Network(format!("failed to read response: {}", e)))?;

        tracing::debug!(
            "fetched {} {} -> {} in {}ms ({} bytes)",
            request.method,
            request.url,
            status.as_u16(),
            start.elapsed().as_millis(),
            body.len()
        );

        Ok(Response { url: request.url.clone(), status, headers, body, source: ResponseSource::Network })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn ok_response(u: &str, body: &'static str) -> Response {
        let mut headers = header::HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, header::HeaderValue::from_static("text/css"));
        Response {
            url: url(u),
            status: StatusCode::OK,
            headers,
            body: Bytes::from_static(body.as_bytes()),
            source: ResponseSource::Network,
        }
    }

    #[test]
    fn test_fetch_config_default() {
        let config = FetchConfig::default();
        assert_eq!(config.user_agent, "honyaku/0.1");
        assert_eq!(config.timeout, Duration::from_millis(20000));
        assert_eq!(config.max_redirects, 5);
    }

    #[test]
    fn test_fetch_config_from_app_config() {
        let app = AppConfig { user_agent: "tester/1".into(), timeout_ms: 1500, ..Default::default() };
        let config = FetchConfig::from(&app);
        assert_eq!(config.user_agent, "tester/1");
        assert_eq!(config.timeout, Duration::from_millis(1500));
    }

    #[test]
    fn test_cache_key_ignores_fragment() {
        let a = Request::get(url("https://app.test/index.js#top"));
        let b = Request::get(url("https://app.test/index.js"));
        assert_eq!(a.cache_key(), b.cache_key());
    }

    #[test]
    fn test_see_other() {
        let response = Response::see_other(url("https://app.test/?text=hi"), &url("https://app.test/"));
        assert_eq!(response.status, StatusCode::SEE_OTHER);
        assert_eq!(response.location(), Some("https://app.test/"));
        assert_eq!(response.source, ResponseSource::Synthetic);
        assert!(!response.is_cacheable());
    }

    #[test]
    fn test_tee_copies_are_independent() {
        let (first, mut second) = ok_response("https://app.test/index.css", "body{}").tee();
        second.body = Bytes::new();
        assert_eq!(first.body, Bytes::from_static(b"body{}"));
    }

    #[test]
    fn test_cached_snapshot_restores_response() {
        let request = Request::get(url("https://app.test/index.css"));
        let original = ok_response("https://app.test/index.css", "body{}");

        let cached = original.to_cached(&request);
        assert_eq!(cached.key_hash, request.cache_key());

        let restored = Response::from_cached(request.url.clone(), cached).unwrap();
        assert_eq!(restored.status, StatusCode::OK);
        assert_eq!(restored.body, original.body);
        assert_eq!(restored.headers.get(header::CONTENT_TYPE).unwrap(), "text/css");
        assert_eq!(restored.source, ResponseSource::Cache);
    }

    #[test]
    fn test_from_cached_rejects_bad_status() {
        let cached = CachedResponse::new("GET", "https://app.test/", 42, Vec::new(), Vec::new());
        let result = Response::from_cached(url("https://app.test/"), cached);
        assert!(matches!(result, Err(Error::CorruptEntry(_))));
    }

    #[tokio::test]
    async fn test_http_network_new() {
        let network = HttpNetwork::new(FetchConfig::default());
        assert!(network.is_ok());
    }
}
