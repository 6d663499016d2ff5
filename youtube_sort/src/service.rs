//! The remote operations the pipeline needs, independent of transport.
//!
//! [`crate::YouTubeClient`] implements [`PlaylistService`] over HTTP; tests
//! substitute an in-memory implementation.

use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;

/// Largest page the membership listing returns.
pub const MAX_PAGE_SIZE: u32 = 50;
/// Largest number of ids a single bulk video lookup accepts.
pub const MAX_BATCH_SIZE: usize = 50;

/// A playlist member as listed, before enrichment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistItem {
    pub video_id: String,
    pub title: String,
    /// Raw RFC 3339 text of the time the video joined the playlist.
    pub added_at: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaylistItemPage {
    pub items: Vec<PlaylistItem>,
    /// Continuation cursor; `None` or empty on the last page.
    pub next_page_token: Option<String>,
}

/// Authoritative metadata for one video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoRecord {
    pub id: String,
    pub title: String,
    /// Raw RFC 3339 upload time.
    pub published_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Privacy {
    Private,
    Unlisted,
    Public,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPlaylist {
    pub title: String,
    pub description: String,
    pub privacy: Privacy,
}

/// An authenticated handle on the video service.
#[async_trait]
pub trait PlaylistService: Send + Sync {
    /// Lists one page of playlist membership in playlist order.
    async fn playlist_items(
        &self,
        playlist_id: &str,
        page_size: u32,
        page_token: Option<&str>,
    ) -> Result<PlaylistItemPage>;

    /// Looks up at most [`MAX_BATCH_SIZE`] videos. Videos that no longer
    /// exist or are not visible are absent from the result.
    async fn videos(&self, ids: &[String]) -> Result<Vec<VideoRecord>>;

    /// Display title of a playlist.
    ///
    /// # Errors
    /// `SortError::NotFound` when the service returns no playlist.
    async fn playlist_title(&self, playlist_id: &str) -> Result<String>;

    /// Creates a playlist and returns its id.
    async fn create_playlist(&self, playlist: &NewPlaylist) -> Result<String>;

    /// Appends a video at the end of a playlist.
    async fn insert_playlist_item(&self, playlist_id: &str, video_id: &str) -> Result<()>;
}
