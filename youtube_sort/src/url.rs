use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Result, SortError};

static LIST_PARAM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[?&]list=([^&#]+)").expect("valid playlist regex"));

static BARE_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("valid id regex"));

/// Pulls the playlist id out of a playlist or watch URL.
///
/// A bare playlist id is accepted unchanged.
pub fn extract_playlist_id(input: &str) -> Option<String> {
    let input = input.trim();
    if let Some(captures) = LIST_PARAM.captures(input) {
        return Some(captures[1].to_string());
    }
    BARE_ID.is_match(input).then(|| input.to_string())
}

pub fn require_playlist_id(input: &str) -> Result<String> {
    extract_playlist_id(input).ok_or_else(|| SortError::InvalidUrl(input.to_string()))
}

pub fn playlist_url(playlist_id: &str) -> String {
    format!("https://www.youtube.com/playlist?list={playlist_id}")
}
