//! Candidate selection against parsed preferences.
//!
//! # Algorithm
//! ```text
//! for entry in preferences (quality order, q > 0):
//!     exact token match          → candidate
//!     type/* match               → first candidate under type/
//!     * or */* match             → first candidate not named in the header
//! no match / no preferences      → server's first candidate
//! ```
//!
//! Client quality decides first; server order only breaks ties inside a
//! wildcard. Encoding negotiation adds an implicit `identity` candidate.

use super::preference::{parse, PreferenceEntry, PreferenceList};
use super::IDENTITY;

/// Select the best candidate for the given preferences.
///
/// Without a match the server's first candidate the client did not exclude
/// is used (or simply its first). Returns `None` only when `candidates` is
/// empty.
pub fn select<S: AsRef<str>>(preferences: &PreferenceList, candidates: &[S]) -> Option<String> {
    let first = candidates.first()?.as_ref();
    let chosen = match_preferences(preferences, candidates).unwrap_or_else(|| {
        candidates
            .iter()
            .map(|c| c.as_ref())
            .find(|c| !excluded(preferences, c))
            .unwrap_or(first)
            .to_string()
    });
    Some(chosen)
}

/// Select a content coding for the given `Accept-Encoding` preferences.
///
/// `identity` is always acceptable unless the client excludes it with
/// `identity;q=0` (or `*;q=0` without a positive `identity` entry). Returns
/// `None` when nothing the server offers is acceptable.
pub fn select_encoding<S: AsRef<str>>(
    preferences: &PreferenceList,
    candidates: &[S],
) -> Option<String> {
    if preferences.is_empty() {
        return Some(IDENTITY.to_string());
    }
    if let Some(found) = match_preferences(preferences, candidates) {
        return Some(found);
    }
    if identity_acceptable(preferences) {
        Some(IDENTITY.to_string())
    } else {
        None
    }
}

/// Parse an `Accept` header and select a content type.
pub fn select_content_type<S: AsRef<str>>(accept: &str, candidates: &[S]) -> Option<String> {
    select(&parse(accept), candidates)
}

/// Parse an `Accept-Encoding` header and select a content coding.
pub fn select_encoding_header<S: AsRef<str>>(
    accept_encoding: &str,
    candidates: &[S],
) -> Option<String> {
    select_encoding(&parse(accept_encoding), candidates)
}

fn match_preferences<S: AsRef<str>>(
    preferences: &PreferenceList,
    candidates: &[S],
) -> Option<String> {
    preferences
        .iter()
        .filter(|entry| !entry.is_excluded())
        .find_map(|entry| match_entry(entry, preferences, candidates))
}

fn match_entry<S: AsRef<str>>(
    entry: &PreferenceEntry,
    preferences: &PreferenceList,
    candidates: &[S],
) -> Option<String> {
    let candidates = candidates.iter().map(|c| c.as_ref());

    if entry.is_full_wildcard() {
        return candidates
            .filter(|c| !preferences.mentions(c))
            .find(|c| !excluded(preferences, c))
            .map(str::to_string);
    }

    if let Some(main_type) = entry.wildcard_type() {
        return candidates
            .filter(|c| {
                c.split_once('/')
                    .is_some_and(|(t, _)| t.eq_ignore_ascii_case(main_type))
            })
            .find(|c| !excluded(preferences, c))
            .map(str::to_string);
    }

    candidates
        .into_iter()
        .find(|c| c.eq_ignore_ascii_case(&entry.token))
        .map(str::to_string)
}

fn excluded(preferences: &PreferenceList, candidate: &str) -> bool {
    preferences
        .find(candidate)
        .is_some_and(PreferenceEntry::is_excluded)
}

fn identity_acceptable(preferences: &PreferenceList) -> bool {
    match preferences.find(IDENTITY) {
        Some(entry) => !entry.is_excluded(),
        None => !preferences
            .iter()
            .any(|entry| entry.is_full_wildcard() && entry.is_excluded()),
    }
}
