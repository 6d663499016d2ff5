//! [`PlaylistService`] over the YouTube Data API v3.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION},
    Client, RequestBuilder, Response,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Result, SortError};
use crate::pacing::Backoff;
use crate::service::{
    NewPlaylist, PlaylistItem, PlaylistItemPage, PlaylistService, Privacy, VideoRecord,
};

const YOUTUBE_API_URL: &str = "https://www.googleapis.com/youtube/v3";
const REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
const RETRY_BASE_MS: u64 = 500;

/// Which failures a request may be repeated after.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RetryOn {
    /// Reads: any transient failure.
    Transient,
    /// Writes: only rate-limit rejections, which the service refuses before
    /// doing anything. A 5xx or a timeout may have been applied already.
    RateLimit,
}

impl RetryOn {
    fn allows(self, error: &SortError) -> bool {
        match self {
            RetryOn::Transient => error.is_transient(),
            RetryOn::RateLimit => error.is_rate_limit(),
        }
    }
}

pub struct YouTubeClient {
    client: Client,
    base_url: String,
    max_retries: u32,
    retry_base: Duration,
}

impl YouTubeClient {
    /// Builds a client that sends `access_token` as a bearer token.
    pub fn new(access_token: &str) -> Result<Self> {
        let mut bearer =
            HeaderValue::from_str(&format!("Bearer {access_token}")).map_err(|_| {
                SortError::Unauthorized("access token is not a valid header value".into())
            })?;
        bearer.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.append(AUTHORIZATION, bearer);
        headers.append(ACCEPT, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(YouTubeClient {
            client,
            base_url: YOUTUBE_API_URL.to_string(),
            max_retries: DEFAULT_MAX_RETRIES,
            retry_base: Duration::from_millis(RETRY_BASE_MS),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// How many times a transient failure is retried before giving up.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// First retry delay; later retries double it.
    pub fn with_retry_base(mut self, retry_base: Duration) -> Self {
        self.retry_base = retry_base;
        self
    }

    fn url(&self, resource: &str) -> String {
        format!("{}/{}", self.base_url, resource)
    }

    /// Sends the request built by `request`, retrying the failures `retry_on` allows.
    async fn execute<T, F>(&self, what: &str, retry_on: RetryOn, request: F) -> Result<T>
    where
        T: DeserializeOwned,
        F: Fn(&Client) -> RequestBuilder,
    {
        let mut backoff = Backoff::with_base(self.max_retries, self.retry_base);
        loop {
            debug!("YouTube API: {}", what);
            let outcome = match request(&self.client).send().await {
                Ok(response) => handle_response(response).await,
                Err(e) => Err(SortError::Http(e)),
            };

            match outcome {
                Err(e) if retry_on.allows(&e) => match backoff.next_delay() {
                    Some(delay) => {
                        warn!(
                            "{} failed ({}), retry {} in {:?}",
                            what,
                            e,
                            backoff.attempts(),
                            delay
                        );
                        tokio::time::sleep(delay).await;
                    }
                    None => return Err(e),
                },
                other => return other,
            }
        }
    }
}

async fn handle_response<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(SortError::from_status(status, body));
    }

    let text = response.text().await?;
    serde_json::from_str(&text).map_err(|e| {
        warn!("Failed to parse response: {}", e);
        SortError::Json(e)
    })
}

#[async_trait]
impl PlaylistService for YouTubeClient {
    async fn playlist_items(
        &self,
        playlist_id: &str,
        page_size: u32,
        page_token: Option<&str>,
    ) -> Result<PlaylistItemPage> {
        let url = self.url("playlistItems");
        let max_results = page_size.to_string();
        let response: ListResponse<PlaylistItemResource> = self
            .execute("list playlist items", RetryOn::Transient, |client| {
                let mut query = vec![
                    ("part", "snippet"),
                    ("playlistId", playlist_id),
                    ("maxResults", max_results.as_str()),
                ];
                if let Some(token) = page_token {
                    query.push(("pageToken", token));
                }
                client.get(&url).query(&query)
            })
            .await?;

        Ok(PlaylistItemPage {
            items: response
                .items
                .into_iter()
                .map(|item| PlaylistItem {
                    video_id: item.snippet.resource_id.video_id,
                    title: item.snippet.title,
                    added_at: item.snippet.published_at,
                })
                .collect(),
            next_page_token: response.next_page_token,
        })
    }

    async fn videos(&self, ids: &[String]) -> Result<Vec<VideoRecord>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let url = self.url("videos");
        let joined = ids.join(",");
        let response: ListResponse<VideoResource> = self
            .execute("list videos", RetryOn::Transient, |client| {
                client
                    .get(&url)
                    .query(&[("part", "snippet"), ("id", joined.as_str())])
            })
            .await?;

        Ok(response
            .items
            .into_iter()
            .map(|video| VideoRecord {
                id: video.id,
                title: video.snippet.title,
                published_at: video.snippet.published_at,
            })
            .collect())
    }

    async fn playlist_title(&self, playlist_id: &str) -> Result<String> {
        let url = self.url("playlists");
        let response: ListResponse<PlaylistResource> = self
            .execute("get playlist", RetryOn::Transient, |client| {
                client
                    .get(&url)
                    .query(&[("part", "snippet"), ("id", playlist_id)])
            })
            .await?;

        response
            .items
            .into_iter()
            .next()
            .and_then(|playlist| playlist.snippet)
            .map(|snippet| snippet.title)
            .ok_or_else(|| SortError::NotFound(format!("playlist {playlist_id}")))
    }

    async fn create_playlist(&self, playlist: &NewPlaylist) -> Result<String> {
        let url = self.url("playlists");
        let body = PlaylistBody {
            snippet: PlaylistBodySnippet {
                title: &playlist.title,
                description: &playlist.description,
            },
            status: PlaylistBodyStatus {
                privacy_status: playlist.privacy,
            },
        };
        let created: CreatedResource = self
            .execute("create playlist", RetryOn::RateLimit, |client| {
                client
                    .post(&url)
                    .query(&[("part", "snippet,status")])
                    .json(&body)
            })
            .await?;
        Ok(created.id)
    }

    async fn insert_playlist_item(&self, playlist_id: &str, video_id: &str) -> Result<()> {
        let url = self.url("playlistItems");
        let body = PlaylistItemBody {
            snippet: PlaylistItemBodySnippet {
                playlist_id,
                resource_id: ResourceIdBody {
                    kind: "youtube#video",
                    video_id,
                },
            },
        };
        let _: CreatedResource = self
            .execute("insert playlist item", RetryOn::RateLimit, |client| {
                client
                    .post(&url)
                    .query(&[("part", "snippet")])
                    .json(&body)
            })
            .await?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlaylistItemResource {
    snippet: PlaylistItemSnippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItemSnippet {
    #[serde(default)]
    title: String,
    /// When the item was added to the playlist.
    #[serde(default)]
    published_at: String,
    resource_id: ResourceId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResourceId {
    video_id: String,
}

#[derive(Debug, Deserialize)]
struct VideoResource {
    id: String,
    snippet: VideoSnippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoSnippet {
    #[serde(default)]
    title: String,
    #[serde(default)]
    published_at: String,
}

#[derive(Debug, Deserialize)]
struct PlaylistResource {
    snippet: Option<PlaylistSnippet>,
}

#[derive(Debug, Deserialize)]
struct PlaylistSnippet {
    title: String,
}

#[derive(Debug, Deserialize)]
struct CreatedResource {
    id: String,
}

#[derive(Serialize)]
struct PlaylistBody<'a> {
    snippet: PlaylistBodySnippet<'a>,
    status: PlaylistBodyStatus,
}

#[derive(Serialize)]
struct PlaylistBodySnippet<'a> {
    title: &'a str,
    description: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistBodyStatus {
    privacy_status: Privacy,
}

#[derive(Serialize)]
struct PlaylistItemBody<'a> {
    snippet: PlaylistItemBodySnippet<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItemBodySnippet<'a> {
    playlist_id: &'a str,
    resource_id: ResourceIdBody<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ResourceIdBody<'a> {
    kind: &'a str,
    video_id: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_playlist_items_page() {
        let payload = json!({
            "kind": "youtube#playlistItemListResponse",
            "nextPageToken": "CDIQAA",
            "items": [{
                "id": "UExf",
                "snippet": {
                    "publishedAt": "2021-06-01T08:00:00Z",
                    "title": "Private video",
                    "resourceId": { "kind": "youtube#video", "videoId": "abc123" }
                }
            }]
        });
        let page: ListResponse<PlaylistItemResource> = serde_json::from_value(payload).unwrap();
        assert_eq!(page.next_page_token.as_deref(), Some("CDIQAA"));
        assert_eq!(page.items[0].snippet.resource_id.video_id, "abc123");
        assert_eq!(page.items[0].snippet.published_at, "2021-06-01T08:00:00Z");
    }

    #[test]
    fn last_page_has_no_token_and_may_omit_items() {
        let page: ListResponse<VideoResource> =
            serde_json::from_value(json!({ "kind": "youtube#videoListResponse" })).unwrap();
        assert!(page.items.is_empty());
        assert!(page.next_page_token.is_none());
    }

    #[test]
    fn serializes_private_playlist_body() {
        let body = PlaylistBody {
            snippet: PlaylistBodySnippet {
                title: "Talks - Sorted",
                description: "d",
            },
            status: PlaylistBodyStatus {
                privacy_status: Privacy::Private,
            },
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({
                "snippet": { "title": "Talks - Sorted", "description": "d" },
                "status": { "privacyStatus": "private" }
            })
        );
    }

    #[test]
    fn serializes_playlist_item_body() {
        let body = PlaylistItemBody {
            snippet: PlaylistItemBodySnippet {
                playlist_id: "PLnew",
                resource_id: ResourceIdBody {
                    kind: "youtube#video",
                    video_id: "abc123",
                },
            },
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({
                "snippet": {
                    "playlistId": "PLnew",
                    "resourceId": { "kind": "youtube#video", "videoId": "abc123" }
                }
            })
        );
    }

    #[test]
    fn client_rejects_unprintable_token() {
        assert!(matches!(
            YouTubeClient::new("bad\ntoken"),
            Err(SortError::Unauthorized(_))
        ));
    }
}
