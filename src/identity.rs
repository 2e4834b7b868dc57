//! Track and playlist identity extraction
//!
//! Campaign orders and resources carry external references in several
//! shapes. This module normalizes them to bare Spotify ids:
//! - Web URLs: `https://open.spotify.com/track/{id}?si=...`
//! - Localized web URLs: `https://open.spotify.com/intl-de/track/{id}`
//! - URIs: `spotify:track:{id}`
//! - Bare ids: 22 base62 characters
//!
//! Unparseable references yield `None`; duplicate protection then has
//! nothing to match on and degrades to "no exclusions".

use regex::Regex;
use std::sync::OnceLock;
use url::Url;

use crate::models::TrackIdentity;

const SPOTIFY_HOST: &str = "open.spotify.com";

fn bare_id_pattern() -> &'static Regex {
    static BARE_ID: OnceLock<Regex> = OnceLock::new();
    BARE_ID.get_or_init(|| Regex::new(r"^[0-9A-Za-z]{22}$").expect("Invalid regex pattern"))
}

fn uri_pattern() -> &'static Regex {
    static URI: OnceLock<Regex> = OnceLock::new();
    URI.get_or_init(|| {
        Regex::new(r"^spotify:(track|playlist):([0-9A-Za-z]{22})$").expect("Invalid regex pattern")
    })
}

/// Extract the normalized identity of a track reference
///
/// # Examples
///
/// ```
/// use slotbook::identity::extract_track_identity;
///
/// let id = extract_track_identity("https://open.spotify.com/track/4uLU6hMCjMI75M1A2tKUQC?si=abc");
/// assert_eq!(id.unwrap().as_str(), "4uLU6hMCjMI75M1A2tKUQC");
/// assert!(extract_track_identity("not a track").is_none());
/// ```
pub fn extract_track_identity(reference: &str) -> Option<TrackIdentity> {
    extract_id(reference, "track").and_then(TrackIdentity::new)
}

/// Extract the playlist id of a resource reference
pub fn extract_playlist_id(reference: &str) -> Option<String> {
    extract_id(reference, "playlist")
}

fn extract_id(reference: &str, kind: &str) -> Option<String> {
    let reference = reference.trim();
    if reference.is_empty() {
        return None;
    }

    if bare_id_pattern().is_match(reference) {
        return Some(reference.to_string());
    }

    if let Some(caps) = uri_pattern().captures(reference) {
        return (caps.get(1)?.as_str() == kind).then(|| caps[2].to_string());
    }

    let parsed = Url::parse(reference).ok()?;
    if parsed.host_str() != Some(SPOTIFY_HOST) {
        return None;
    }

    // Path is [intl-xx/]{kind}/{id}
    let mut segments = parsed.path_segments()?.filter(|s| !s.is_empty()).peekable();
    if segments.peek().is_some_and(|s| s.starts_with("intl-")) {
        segments.next();
    }
    if segments.next()? != kind {
        return None;
    }
    let id = segments.next()?;
    bare_id_pattern().is_match(id).then(|| id.to_string())
}
