use tracing::{debug, warn};

use crate::error::Result;
use crate::model::{parse_timestamp, VideoEntry};
use crate::service::{PlaylistService, MAX_PAGE_SIZE};

/// Lists every member of a playlist, in playlist order.
///
/// Pages are requested until the service stops returning a continuation
/// cursor. A member whose added-at timestamp does not parse is dropped on
/// its own; the rest of its page is kept.
pub async fn fetch_all(
    service: &dyn PlaylistService,
    playlist_id: &str,
    page_size: u32,
) -> Result<Vec<VideoEntry>> {
    let page_size = page_size.clamp(1, MAX_PAGE_SIZE);
    let mut entries = Vec::new();
    let mut page_token: Option<String> = None;
    let mut pages = 0usize;

    loop {
        let page = service
            .playlist_items(playlist_id, page_size, page_token.as_deref())
            .await?;
        pages += 1;
        debug!(
            "Fetched page {} of playlist {}: {} items",
            pages,
            playlist_id,
            page.items.len()
        );

        for item in page.items {
            let Some(added_at) = parse_timestamp(&item.added_at) else {
                warn!(
                    "Skipping {} ({}): unparseable added-at timestamp {:?}",
                    item.video_id, item.title, item.added_at
                );
                continue;
            };
            entries.push(VideoEntry::new(item.video_id, item.title, added_at));
        }

        match page.next_page_token {
            Some(token) if !token.is_empty() => page_token = Some(token),
            _ => break,
        }
    }

    Ok(entries)
}
