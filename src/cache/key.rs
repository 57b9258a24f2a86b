//! Canonical request signatures.
//!
//! A key is `METHOD URL` where the URL is normalized (lowercase scheme and
//! host, default port and fragment dropped) and its query string is rebuilt
//! from every parameter sorted by name, then value. Shuffled parameter order
//! therefore maps to the same key.

use url::Url;

/// Deterministic cache key for one logical request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Build the key from method, URL and extra query parameters.
    ///
    /// `url` may be absolute or a bare path; parameters already present in an
    /// absolute URL's query string are merged with `params`.
    ///
    /// ```
    /// use commons_http::cache::CacheKey;
    ///
    /// let a = CacheKey::new("GET", "/v1/x", [("b", "2"), ("a", "1")]);
    /// let b = CacheKey::new("get", "/v1/x", [("a", "1"), ("b", "2")]);
    /// assert_eq!(a, b);
    /// assert_eq!(a.as_str(), "GET /v1/x?a=1&b=2");
    /// ```
    pub fn new<I, K, V>(method: &str, url: &str, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut pairs: Vec<(String, String)> = params
            .into_iter()
            .map(|(k, v)| (k.as_ref().to_string(), v.as_ref().to_string()))
            .collect();

        let base = match Url::parse(url.trim()) {
            Ok(mut parsed) => {
                pairs.extend(parsed.query_pairs().into_owned());
                parsed.set_query(None);
                parsed.set_fragment(None);
                parsed.to_string()
            }
            Err(_) => {
                let (path, query) = split_relative(url.trim());
                pairs.extend(
                    url::form_urlencoded::parse(query.as_bytes()).into_owned(),
                );
                path.to_string()
            }
        };

        pairs.sort();

        let mut key = format!("{} {}", method.trim().to_ascii_uppercase(), base);
        if !pairs.is_empty() {
            let query = url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(&pairs)
                .finish();
            key.push('?');
            key.push_str(&query);
        }
        Self(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short prefix suitable for log lines.
    pub fn short(&self) -> &str {
        let end = self
            .0
            .char_indices()
            .nth(48)
            .map(|(idx, _)| idx)
            .unwrap_or(self.0.len());
        &self.0[..end]
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<CacheKey> for String {
    fn from(key: CacheKey) -> Self {
        key.0
    }
}

fn split_relative(url: &str) -> (&str, &str) {
    let without_fragment = url.split('#').next().unwrap_or(url);
    without_fragment
        .split_once('?')
        .unwrap_or((without_fragment, ""))
}
