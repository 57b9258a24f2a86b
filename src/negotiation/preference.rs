//! Weighted preference header parsing (`Accept`, `Accept-Encoding`).
//!
//! # Parsing Rules
//! - Segments split on top-level commas; parameters split on `;`
//! - Tokens and parameter names are lowercased
//! - Missing or unparseable `q` means 1.0; numeric `q` is clamped to [0, 1]
//! - Wildcards (`*`, `*/*`, `type/*`) are kept literally
//!
//! Content-level malformations never fail. Only raw header bytes that are not
//! visible text are rejected, through [`parse_header_value`].

use std::collections::BTreeMap;
use std::ops::Deref;

use reqwest::header::HeaderValue;

use crate::error::{HttpError, HttpResult};

/// One item of a preference header.
#[derive(Debug, Clone, PartialEq)]
pub struct PreferenceEntry {
    /// Lowercased token, e.g. `application/json`, `gzip`, `text/*`.
    pub token: String,
    /// Weight in [0, 1]. Zero means "not acceptable".
    pub quality: f32,
    /// Parameters other than `q`, keyed by lowercased name.
    pub params: BTreeMap<String, String>,
}

impl PreferenceEntry {
    /// Create an entry with no parameters.
    pub fn new(token: impl Into<String>, quality: f32) -> Self {
        Self {
            token: token.into().to_ascii_lowercase(),
            quality,
            params: BTreeMap::new(),
        }
    }

    /// True for `*` and `*/*`.
    pub fn is_full_wildcard(&self) -> bool {
        self.token == "*" || self.token == "*/*"
    }

    /// The `type` of a `type/*` token.
    pub fn wildcard_type(&self) -> Option<&str> {
        self.token
            .strip_suffix("/*")
            .filter(|main| !main.is_empty() && *main != "*")
    }

    /// True if the client declared this entry unacceptable.
    pub fn is_excluded(&self) -> bool {
        self.quality <= 0.0
    }
}

impl std::fmt::Display for PreferenceEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.token)?;
        for (name, value) in &self.params {
            write!(f, "; {}={}", name, value)?;
        }
        if self.quality < 1.0 {
            write!(f, "; q={}", self.quality)?;
        }
        Ok(())
    }
}

/// Parsed preference header, highest quality first.
///
/// Entries of equal quality keep the order in which the client declared them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreferenceList {
    entries: Vec<PreferenceEntry>,
}

impl PreferenceList {
    /// An empty list (no constraints).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a list from entries, applying the stable quality ordering.
    pub fn from_entries(mut entries: Vec<PreferenceEntry>) -> Self {
        // sort_by is stable: equal qualities keep header order
        entries.sort_by(|a, b| b.quality.total_cmp(&a.quality));
        Self { entries }
    }

    /// The entries, in negotiation order.
    pub fn entries(&self) -> &[PreferenceEntry] {
        &self.entries
    }

    /// Find the entry for an exact token.
    pub fn find(&self, token: &str) -> Option<&PreferenceEntry> {
        self.entries
            .iter()
            .find(|entry| entry.token.eq_ignore_ascii_case(token))
    }

    /// True if the header names `token` explicitly, whatever its quality.
    pub fn mentions(&self, token: &str) -> bool {
        self.find(token).is_some()
    }
}

impl Deref for PreferenceList {
    type Target = [PreferenceEntry];

    fn deref(&self) -> &Self::Target {
        &self.entries
    }
}

impl<'a> IntoIterator for &'a PreferenceList {
    type Item = &'a PreferenceEntry;
    type IntoIter = std::slice::Iter<'a, PreferenceEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Parse a preference header into a sorted list.
///
/// ```
/// use commons_http::negotiation::parse;
///
/// let prefs = parse("text/html;q=0.8, application/json");
/// assert_eq!(prefs[0].token, "application/json");
/// assert_eq!(prefs[1].quality, 0.8);
/// ```
pub fn parse(header: &str) -> PreferenceList {
    let entries = header.split(',').filter_map(parse_entry).collect();
    PreferenceList::from_entries(entries)
}

/// Parse a raw header value.
///
/// Fails only when the value contains bytes that are not visible ASCII.
pub fn parse_header_value(value: &HeaderValue) -> HttpResult<PreferenceList> {
    let text = value
        .to_str()
        .map_err(|e| HttpError::NegotiationParse(e.to_string()))?;
    Ok(parse(text))
}

fn parse_entry(segment: &str) -> Option<PreferenceEntry> {
    let mut parts = segment.split(';');
    let token = parts.next()?.trim();
    if token.is_empty() {
        return None;
    }

    let mut quality = 1.0;
    let mut params = BTreeMap::new();
    for part in parts {
        let Some((name, value)) = part.split_once('=') else {
            continue;
        };
        let name = name.trim().to_ascii_lowercase();
        let value = value.trim();
        if name == "q" {
            quality = parse_quality(value);
        } else if !name.is_empty() {
            params.insert(name, value.trim_matches('"').to_string());
        }
    }

    Some(PreferenceEntry {
        token: token.to_ascii_lowercase(),
        quality,
        params,
    })
}

fn parse_quality(raw: &str) -> f32 {
    match raw.parse::<f32>() {
        Ok(q) if q.is_finite() => q.clamp(0.0, 1.0),
        _ => 1.0,
    }
}
