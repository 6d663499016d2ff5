//! In-memory stand-in for the YouTube API.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, TimeZone, Utc};
use youtube_sort::{
    BuildProgress, BuildReport, NewPlaylist, PlaylistItem, PlaylistItemPage, PlaylistService,
    Result, SortError, VideoRecord,
};

pub const NEW_PLAYLIST_ID: &str = "PLsorted";

pub fn day(n: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap() + Duration::days(n)
}

pub fn stamp(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[derive(Debug, Default)]
pub struct Calls {
    pub page_tokens: Vec<Option<String>>,
    pub page_sizes: Vec<u32>,
    pub video_batches: Vec<Vec<String>>,
    pub created: Vec<NewPlaylist>,
    pub insert_attempts: Vec<String>,
    pub inserted: Vec<String>,
}

#[derive(Debug, Default)]
pub struct FakeService {
    title: Option<String>,
    members: Vec<PlaylistItem>,
    videos: HashMap<String, VideoRecord>,
    failing_inserts: HashSet<String>,
    fail_video_lookup: bool,
    fail_create: bool,
    pub calls: Mutex<Calls>,
}

impl FakeService {
    pub fn new(title: &str) -> Self {
        FakeService {
            title: Some(title.to_string()),
            ..FakeService::default()
        }
    }

    /// Adds a playlist member whose video resolves to `published`.
    pub fn with_video(mut self, id: &str, added: DateTime<Utc>, published: DateTime<Utc>) -> Self {
        self.members.push(PlaylistItem {
            video_id: id.to_string(),
            title: format!("listed {id}"),
            added_at: stamp(added),
        });
        self.videos.insert(
            id.to_string(),
            VideoRecord {
                id: id.to_string(),
                title: format!("video {id}"),
                published_at: stamp(published),
            },
        );
        self
    }

    /// Adds a playlist member that the bulk lookup does not return.
    pub fn with_missing_video(mut self, id: &str, added: DateTime<Utc>) -> Self {
        self.members.push(PlaylistItem {
            video_id: id.to_string(),
            title: format!("listed {id}"),
            added_at: stamp(added),
        });
        self
    }

    /// Adds a playlist member whose lookup record carries `published_at` verbatim.
    pub fn with_raw_video(mut self, id: &str, added: DateTime<Utc>, published_at: &str) -> Self {
        self.members.push(PlaylistItem {
            video_id: id.to_string(),
            title: format!("listed {id}"),
            added_at: stamp(added),
        });
        self.videos.insert(
            id.to_string(),
            VideoRecord {
                id: id.to_string(),
                title: format!("video {id}"),
                published_at: published_at.to_string(),
            },
        );
        self
    }

    pub fn with_raw_member(mut self, id: &str, added_at: &str) -> Self {
        self.members.push(PlaylistItem {
            video_id: id.to_string(),
            title: format!("listed {id}"),
            added_at: added_at.to_string(),
        });
        self
    }

    pub fn failing_insert(mut self, id: &str) -> Self {
        self.failing_inserts.insert(id.to_string());
        self
    }

    pub fn failing_video_lookup(mut self) -> Self {
        self.fail_video_lookup = true;
        self
    }

    pub fn failing_create(mut self) -> Self {
        self.fail_create = true;
        self
    }

    pub fn without_title(mut self) -> Self {
        self.title = None;
        self
    }

    pub fn calls(&self) -> std::sync::MutexGuard<'_, Calls> {
        self.calls.lock().unwrap()
    }
}

#[async_trait]
impl PlaylistService for FakeService {
    async fn playlist_items(
        &self,
        _playlist_id: &str,
        page_size: u32,
        page_token: Option<&str>,
    ) -> Result<PlaylistItemPage> {
        let mut calls = self.calls();
        calls.page_tokens.push(page_token.map(str::to_string));
        calls.page_sizes.push(page_size);

        let start: usize = page_token.map_or(0, |t| t.parse().unwrap());
        let end = (start + page_size as usize).min(self.members.len());
        let next_page_token = (end < self.members.len()).then(|| end.to_string());
        Ok(PlaylistItemPage {
            items: self.members[start..end].to_vec(),
            next_page_token,
        })
    }

    async fn videos(&self, ids: &[String]) -> Result<Vec<VideoRecord>> {
        self.calls().video_batches.push(ids.to_vec());
        if self.fail_video_lookup {
            return Err(SortError::Api {
                status: 500,
                message: "backendError".into(),
            });
        }
        Ok(ids
            .iter()
            .filter_map(|id| self.videos.get(id).cloned())
            .collect())
    }

    async fn playlist_title(&self, playlist_id: &str) -> Result<String> {
        self.title
            .clone()
            .ok_or_else(|| SortError::NotFound(format!("playlist {playlist_id}")))
    }

    async fn create_playlist(&self, playlist: &NewPlaylist) -> Result<String> {
        self.calls().created.push(playlist.clone());
        if self.fail_create {
            return Err(SortError::Api {
                status: 400,
                message: "invalid title".into(),
            });
        }
        Ok(NEW_PLAYLIST_ID.to_string())
    }

    async fn insert_playlist_item(&self, playlist_id: &str, video_id: &str) -> Result<()> {
        assert_eq!(playlist_id, NEW_PLAYLIST_ID);
        let mut calls = self.calls();
        calls.insert_attempts.push(video_id.to_string());
        if self.failing_inserts.contains(video_id) {
            return Err(SortError::NotFound(format!("video {video_id}")));
        }
        calls.inserted.push(video_id.to_string());
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct RecordingProgress {
    pub started: Option<(String, usize)>,
    pub inserted: Vec<(usize, usize, String)>,
    pub skipped: Vec<String>,
    pub finished: bool,
}

impl BuildProgress for RecordingProgress {
    fn started(&mut self, playlist_title: &str, total: usize) {
        self.started = Some((playlist_title.to_string(), total));
    }

    fn inserted(&mut self, done: usize, total: usize, title: &str) {
        self.inserted.push((done, total, title.to_string()));
    }

    fn skipped(&mut self, title: &str, _reason: &str) {
        self.skipped.push(title.to_string());
    }

    fn finished(&mut self, _report: &BuildReport) {
        self.finished = true;
    }
}
