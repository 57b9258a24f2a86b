//! Cached, retrying HTTP client.
//!
//! # Request Flow
//! ```text
//! GET:  CacheKey → cache hit? → return
//!                → miss → RetryingTransport → 2xx → cache put → return
//! POST: RetryingTransport → return (never cached)
//! ```
//!
//! # Design Decisions
//! - Each client owns its cache and retry policy; clones share both
//! - The cache lock is never held across the network call
//! - An entry is written only after the full body has been received

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use url::Url;

use crate::cache::{CacheKey, CacheStats, ResponseCache};
use crate::config::CommonsConfig;
use crate::error::{HttpError, HttpResult};
use crate::resilience::{RetryPolicy, RetryingTransport};
use crate::serialization::Serializable;
use crate::transport::{OutboundRequest, ReqwestTransport, Transport};

/// A completed response as seen by callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Bytes,
    /// Network attempts made; 0 when served from cache.
    pub attempts: u32,
    pub from_cache: bool,
}

impl ClientResponse {
    pub fn json<T: DeserializeOwned>(&self) -> HttpResult<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Per-request query parameters and header overrides.
///
/// Headers are merged over the client's default headers, names compared
/// case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestOptions {
    params: Vec<(String, String)>,
    headers: BTreeMap<String, String>,
    within_base: bool,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }

    pub fn params<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        self.params.extend(
            params
                .into_iter()
                .map(|(k, v)| (k.as_ref().to_string(), v.as_ref().to_string())),
        );
        self
    }

    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Only accept paths that stay under the client's base URL.
    ///
    /// Absolute URLs are rejected, as is any path whose resolved URL leaves
    /// the base origin or path prefix (e.g. through `..`).
    pub fn within_base(mut self) -> Self {
        self.within_base = true;
        self
    }
}

/// HTTP client with a TTL response cache and bounded retries.
pub struct CachedHttpClient<T = ReqwestTransport> {
    base_url: String,
    default_headers: BTreeMap<String, String>,
    timeout: Duration,
    cache: Option<ResponseCache>,
    transport: Arc<RetryingTransport<T>>,
}

impl<T> Clone for CachedHttpClient<T> {
    fn clone(&self) -> Self {
        Self {
            base_url: self.base_url.clone(),
            default_headers: self.default_headers.clone(),
            timeout: self.timeout,
            cache: self.cache.clone(),
            transport: Arc::clone(&self.transport),
        }
    }
}

impl<T> CachedHttpClient<T> {
    fn cache_size(&self) -> usize {
        self.cache.as_ref().map(ResponseCache::len).unwrap_or(0)
    }
}

impl CachedHttpClient<ReqwestTransport> {
    /// Build a client over `reqwest` from configuration.
    pub fn from_config(config: &CommonsConfig) -> HttpResult<Self> {
        let timeout = Duration::from_secs(config.client.timeout_secs);
        let transport = ReqwestTransport::new(timeout, &config.client.user_agent)
            .map_err(|e| HttpError::Protocol {
                attempts: 0,
                message: e.to_string(),
            })?;
        Self::with_transport(transport, config)
    }
}

impl<T: Transport> CachedHttpClient<T> {
    /// Build a client over any transport.
    pub fn with_transport(transport: T, config: &CommonsConfig) -> HttpResult<Self> {
        let base_url = config.client.base_url.trim().to_string();
        if !base_url.is_empty() {
            Url::parse(&base_url).map_err(|e| HttpError::InvalidUrl {
                url: base_url.clone(),
                reason: e.to_string(),
            })?;
        }

        let timeout = Duration::from_secs(config.client.timeout_secs);
        let cache = config.cache.enabled.then(|| {
            ResponseCache::new(
                Duration::from_secs(config.cache.ttl_secs),
                config.cache.max_entries,
            )
        });
        let policy = RetryPolicy::from_config(&config.retries);

        let default_headers = config
            .client
            .default_headers
            .iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v.clone()))
            .collect();

        tracing::debug!(
            base_url = %base_url,
            max_attempts = policy.max_attempts(),
            cache_enabled = cache.is_some(),
            "http_client_created"
        );

        Ok(Self {
            base_url,
            default_headers,
            timeout,
            cache,
            transport: Arc::new(RetryingTransport::new(transport, policy).with_attempt_timeout(timeout)),
        })
    }

    /// Replace the response cache (e.g. one on a manual clock).
    pub fn with_cache(mut self, cache: ResponseCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn without_cache(mut self) -> Self {
        self.cache = None;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn policy(&self) -> &RetryPolicy {
        self.transport.policy()
    }

    pub fn cache(&self) -> Option<&ResponseCache> {
        self.cache.as_ref()
    }

    /// Cached GET.
    pub async fn get<I, K, V>(&self, path: &str, params: I) -> HttpResult<ClientResponse>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        self.get_with(path, &RequestOptions::new().params(params), true).await
    }

    /// Cached GET with header overrides. The cache key covers method and URL.
    pub async fn get_with_options(&self, path: &str, options: &RequestOptions) -> HttpResult<ClientResponse> {
        self.get_with(path, options, true).await
    }

    /// GET bypassing the cache for both lookup and store.
    pub async fn get_uncached<I, K, V>(&self, path: &str, params: I) -> HttpResult<ClientResponse>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        self.get_with(path, &RequestOptions::new().params(params), false).await
    }

    /// Cached GET decoded as JSON.
    pub async fn get_json<R, I, K, V>(&self, path: &str, params: I) -> HttpResult<R>
    where
        R: DeserializeOwned,
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        self.get(path, params).await?.json()
    }

    async fn get_with(&self, path: &str, options: &RequestOptions, use_cache: bool) -> HttpResult<ClientResponse> {
        let url = self.resolve(path, options)?;
        let cache = self.cache.as_ref().filter(|_| use_cache);

        let key = CacheKey::new(Method::GET.as_str(), url.as_str(), None::<(&str, &str)>);
        if let Some(entry) = cache.and_then(|c| c.get(&key)) {
            return Ok(ClientResponse {
                status: entry.status,
                headers: entry.headers,
                body: entry.payload,
                attempts: 0,
                from_cache: true,
            });
        }

        let request = self.build(Method::GET, url, options);
        let outcome = self.transport.execute(&request).await?;
        let response = outcome.response;

        if let Some(cache) = cache {
            if response.is_success() {
                let entry = cache.entry(
                    key.clone(),
                    response.status,
                    response.headers.clone(),
                    response.body.clone(),
                );
                cache.put(key, entry);
            }
        }

        Ok(ClientResponse {
            status: response.status,
            headers: response.headers,
            body: response.body,
            attempts: outcome.attempts,
            from_cache: false,
        })
    }

    /// POST a JSON body. Retried like GET, never cached.
    pub async fn post(&self, path: &str, body: &Value) -> HttpResult<ClientResponse> {
        self.send(Method::POST, path, Some(body), &RequestOptions::default()).await
    }

    /// POST with query parameters and header overrides.
    pub async fn post_with_options(
        &self,
        path: &str,
        body: &Value,
        options: &RequestOptions,
    ) -> HttpResult<ClientResponse> {
        self.send(Method::POST, path, Some(body), options).await
    }

    /// POST and decode the JSON response.
    pub async fn post_json<R: DeserializeOwned>(&self, path: &str, body: &Value) -> HttpResult<R> {
        self.post(path, body).await?.json()
    }

    /// Any method, uncached.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        options: &RequestOptions,
    ) -> HttpResult<ClientResponse> {
        let url = self.resolve(path, options)?;
        let mut request = self.build(method, url, options);
        if let Some(body) = body {
            request = request.json_body(body)?;
        }

        let outcome = self.transport.execute(&request).await?;
        Ok(ClientResponse {
            status: outcome.response.status,
            headers: outcome.response.headers,
            body: outcome.response.body,
            attempts: outcome.attempts,
            from_cache: false,
        })
    }

    /// Drop every cached response. Returns how many were removed.
    pub fn clear_cache(&self) -> usize {
        self.cache.as_ref().map(ResponseCache::clear).unwrap_or(0)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.as_ref().map(ResponseCache::stats).unwrap_or_default()
    }

    fn build(&self, method: Method, url: Url, options: &RequestOptions) -> OutboundRequest {
        let mut request = OutboundRequest::new(method, url);
        request.headers = self.default_headers.clone();
        request.headers.extend(options.headers.clone());
        request.timeout = Some(self.timeout);
        request
    }

    /// Absolute URL for `path` plus the options' params.
    ///
    /// Absolute `path`s are used as-is unless the options confine requests to
    /// the base URL; otherwise `path` is appended to the base URL's path.
    fn resolve(&self, path: &str, options: &RequestOptions) -> HttpResult<Url> {
        let mut url = match Url::parse(path) {
            Ok(_) if options.within_base => {
                return Err(invalid_url(path, "absolute URLs are not allowed here"));
            }
            Ok(url) => url,
            Err(_) if self.base_url.is_empty() => {
                return Err(invalid_url(path, "relative URL without a base URL"));
            }
            Err(_) => {
                let joined = format!(
                    "{}/{}",
                    self.base_url.trim_end_matches('/'),
                    path.trim_start_matches('/')
                );
                let url = Url::parse(&joined).map_err(|e| invalid_url(&joined, e))?;
                if options.within_base {
                    self.ensure_within_base(&url)?;
                }
                url
            }
        };

        if !options.params.is_empty() {
            url.query_pairs_mut().extend_pairs(&options.params);
        }
        Ok(url)
    }

    fn ensure_within_base(&self, url: &Url) -> HttpResult<()> {
        let base = Url::parse(&self.base_url).map_err(|e| invalid_url(&self.base_url, e))?;
        let prefix = base.path().trim_end_matches('/');
        let under_prefix = url.path() == prefix || url.path().starts_with(&format!("{prefix}/"));

        if url.origin() == base.origin() && under_prefix {
            Ok(())
        } else {
            Err(invalid_url(url.as_str(), "resolves outside the base URL"))
        }
    }
}

fn invalid_url(url: &str, reason: impl fmt::Display) -> HttpError {
    HttpError::InvalidUrl {
        url: url.to_string(),
        reason: reason.to_string(),
    }
}

impl<T> Serializable for CachedHttpClient<T> {
    fn to_structured(&self) -> Map<String, Value> {
        let policy = self.transport.policy();
        let cache_size = self.cache_size();
        let cache_ttl = self.cache.as_ref().map(|c| c.ttl().as_secs()).unwrap_or(0);

        let mut map = Map::new();
        map.insert("base_url".into(), json!(self.base_url));
        map.insert("cache_ttl_seconds".into(), json!(cache_ttl));
        map.insert("max_retries".into(), json!(policy.max_attempts()));
        map.insert("timeout_seconds".into(), json!(self.timeout.as_secs()));
        map.insert("cache_size".into(), json!(cache_size));
        map
    }
}

impl<T> fmt::Display for CachedHttpClient<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CachedHttpClient(base_url={}, cache_entries={})",
            self.base_url,
            self.cache_size()
        )
    }
}

impl<T> fmt::Debug for CachedHttpClient<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedHttpClient")
            .field("base_url", &self.base_url)
            .field("cache_ttl", &self.cache.as_ref().map(ResponseCache::ttl))
            .field("max_retries", &self.transport.policy().max_attempts())
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use crate::error::TransportFailure;
    use crate::transport::TransportResponse;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Answers 200 with `{"url": <requested URL>}`; records requests.
    #[derive(Default)]
    struct EchoTransport {
        calls: AtomicU32,
        seen: Mutex<Vec<OutboundRequest>>,
    }

    impl EchoTransport {
        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Transport for EchoTransport {
        async fn send(&self, request: &OutboundRequest) -> Result<TransportResponse, TransportFailure> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(request.clone());
            Ok(TransportResponse::new(200, json!({ "url": request.url.as_str() }).to_string()))
        }
    }

    fn config() -> CommonsConfig {
        let mut config = CommonsConfig::default();
        config.client.base_url = "https://api.example.ch/v1/".to_string();
        config.client.default_headers.insert("X-Api-Key".into(), "secret".into());
        config.retries.base_delay_ms = 1;
        config.retries.max_delay_ms = 5;
        config
    }

    fn client() -> CachedHttpClient<EchoTransport> {
        CachedHttpClient::with_transport(EchoTransport::default(), &config()).unwrap()
    }

    #[tokio::test]
    async fn test_get_joins_base_url_and_params() {
        let client = client();
        let response = client.get("/stations", [("q", "Bern")]).await.unwrap();
        assert_eq!(
            response.json::<Value>().unwrap()["url"],
            "https://api.example.ch/v1/stations?q=Bern"
        );
        assert_eq!(response.attempts, 1);
        assert!(!response.from_cache);

        let seen = client.transport.transport().seen.lock().unwrap();
        assert_eq!(seen[0].headers.get("x-api-key").map(String::as_str), Some("secret"));
    }

    #[tokio::test]
    async fn test_second_get_served_from_cache() {
        let client = client();
        client.get("stations", [("b", "2"), ("a", "1")]).await.unwrap();
        let cached = client.get("stations", [("a", "1"), ("b", "2")]).await.unwrap();

        assert!(cached.from_cache);
        assert_eq!(cached.attempts, 0);
        assert_eq!(client.transport.transport().calls(), 1);
        assert_eq!(client.cache_stats().hits, 1);
    }

    #[tokio::test]
    async fn test_expired_entry_is_refetched() {
        let clock = Arc::new(ManualClock::new());
        let cache = ResponseCache::with_clock(Duration::from_secs(1), 16, clock.clone());
        let client = client().with_cache(cache);

        client.get("stations", None::<(&str, &str)>).await.unwrap();
        clock.advance(Duration::from_millis(1100));
        let again = client.get("stations", None::<(&str, &str)>).await.unwrap();

        assert!(!again.from_cache);
        assert_eq!(client.transport.transport().calls(), 2);
    }

    #[tokio::test]
    async fn test_post_is_never_cached() {
        let client = client();
        client.post("bookings", &json!({"seat": 12})).await.unwrap();
        client.post("bookings", &json!({"seat": 12})).await.unwrap();

        assert_eq!(client.transport.transport().calls(), 2);
        assert_eq!(client.cache_stats().entries, 0);
        let seen = client.transport.transport().seen.lock().unwrap();
        assert_eq!(seen[0].method, Method::POST);
        assert_eq!(seen[0].body.as_deref(), Some(&b"{\"seat\":12}"[..]));
    }

    #[tokio::test]
    async fn test_get_uncached_bypasses_cache() {
        let client = client();
        client.get_uncached("stations", None::<(&str, &str)>).await.unwrap();
        client.get_uncached("stations", None::<(&str, &str)>).await.unwrap();
        assert_eq!(client.transport.transport().calls(), 2);
        assert!(client.cache().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_relative_url_without_base_fails() {
        let client =
            CachedHttpClient::with_transport(EchoTransport::default(), &CommonsConfig::default()).unwrap();
        let err = client.get("stations", None::<(&str, &str)>).await.unwrap_err();
        assert!(matches!(err, HttpError::InvalidUrl { .. }));

        let ok = client
            .get("http://other.example.ch/x", None::<(&str, &str)>)
            .await
            .unwrap();
        assert_eq!(ok.status, 200);
    }

    #[tokio::test]
    async fn test_within_base_rejects_other_hosts() {
        let client = client();
        let confined = RequestOptions::new().within_base();

        for path in [
            "http://other.example.ch/admin",
            "https://api.example.ch/v2/stations",
            "../v2/stations",
            "stations/../../admin",
            "%2e%2e/admin",
        ] {
            let err = client.get_with_options(path, &confined).await.unwrap_err();
            assert!(matches!(err, HttpError::InvalidUrl { .. }), "{path}: {err:?}");
        }
        assert_eq!(client.transport.transport().calls(), 0);

        let ok = client
            .get_with_options("stations/zh/../be", &confined)
            .await
            .unwrap();
        assert_eq!(
            ok.json::<Value>().unwrap()["url"],
            "https://api.example.ch/v1/stations/be"
        );
    }

    #[tokio::test]
    async fn test_header_override_replaces_default() {
        let client = client();
        let options = RequestOptions::new()
            .header("X-API-KEY", "rotated")
            .header("Accept", "application/json");
        client.get_with_options("stations", &options).await.unwrap();
        client.get("stations/be", None::<(&str, &str)>).await.unwrap();

        let seen = client.transport.transport().seen.lock().unwrap();
        assert_eq!(seen[0].headers["x-api-key"], "rotated");
        assert_eq!(seen[0].headers["accept"], "application/json");
        assert_eq!(seen[1].headers["x-api-key"], "secret");
        assert!(!seen[1].headers.contains_key("accept"));
    }

    #[tokio::test]
    async fn test_post_params_reach_query_string() {
        let client = client();
        let options = RequestOptions::new().param("dry_run", "true").header("idempotency-key", "abc");
        let response = client
            .post_with_options("bookings", &json!({"seat": 3}), &options)
            .await
            .unwrap();

        assert_eq!(
            response.json::<Value>().unwrap()["url"],
            "https://api.example.ch/v1/bookings?dry_run=true"
        );
        let seen = client.transport.transport().seen.lock().unwrap();
        assert_eq!(seen[0].method, Method::POST);
        assert_eq!(seen[0].headers["idempotency-key"], "abc");
        assert_eq!(seen[0].headers["content-type"], "application/json");
    }

    #[tokio::test]
    async fn test_json_helpers_decode_body() {
        #[derive(serde::Deserialize)]
        struct Echo {
            url: String,
        }

        let client = client();
        let echo: Echo = client.get_json("stations", [("q", "Thun")]).await.unwrap();
        assert_eq!(echo.url, "https://api.example.ch/v1/stations?q=Thun");

        let echo: Echo = client.post_json("bookings", &json!({})).await.unwrap();
        assert_eq!(echo.url, "https://api.example.ch/v1/bookings");
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let mut config = CommonsConfig::default();
        config.client.base_url = "not a url".to_string();
        let err = CachedHttpClient::with_transport(EchoTransport::default(), &config).unwrap_err();
        assert!(matches!(err, HttpError::InvalidUrl { .. }));
    }

    #[tokio::test]
    async fn test_clear_cache() {
        let client = client();
        client.get("a", None::<(&str, &str)>).await.unwrap();
        client.get("b", None::<(&str, &str)>).await.unwrap();
        assert_eq!(client.clear_cache(), 2);
        assert_eq!(client.cache_stats().entries, 0);
    }

    #[tokio::test]
    async fn test_structured_state_and_display() {
        let client = client();
        client.get("a", None::<(&str, &str)>).await.unwrap();

        let state = client.to_structured();
        assert_eq!(state["base_url"], "https://api.example.ch/v1/");
        assert_eq!(state["cache_ttl_seconds"], 120);
        assert_eq!(state["max_retries"], 3);
        assert_eq!(state["timeout_seconds"], 30);
        assert_eq!(state["cache_size"], 1);
        assert_eq!(
            client.to_string(),
            "CachedHttpClient(base_url=https://api.example.ch/v1/, cache_entries=1)"
        );
    }
}
