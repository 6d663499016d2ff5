use tracing::{info, warn};

use crate::error::Result;
use crate::model::VideoEntry;
use crate::pacing::RateLimiter;
use crate::progress::BuildProgress;
use crate::service::{NewPlaylist, PlaylistService, Privacy};

pub const SORTED_DESCRIPTION: &str = "Sorted by upload date (oldest to newest)";

/// A video that could not be added to the new playlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedItem {
    pub video_id: String,
    pub title: String,
    pub reason: String,
}

/// Outcome of a rebuild.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    pub playlist_id: String,
    pub inserted: usize,
    pub skipped: Vec<SkippedItem>,
}

impl BuildReport {
    pub fn total(&self) -> usize {
        self.inserted + self.skipped.len()
    }

    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }
}

pub fn sorted_title(original_title: &str) -> String {
    format!("{original_title} - Sorted")
}

/// Creates a private playlist and fills it oldest first.
///
/// `sorted_desc` must be newest first, as produced by
/// [`crate::sort_descending_by_publish_date`]. The service only appends, so
/// the entries are visited back to front. A failed insertion is recorded in
/// the report and the loop moves on; only failing to create the playlist
/// is an error.
pub async fn build(
    service: &dyn PlaylistService,
    limiter: &RateLimiter,
    progress: &mut dyn BuildProgress,
    sorted_desc: &[VideoEntry],
    original_title: &str,
) -> Result<BuildReport> {
    let playlist = NewPlaylist {
        title: sorted_title(original_title),
        description: SORTED_DESCRIPTION.to_string(),
        privacy: Privacy::Private,
    };
    let playlist_id = service.create_playlist(&playlist).await?;
    info!("Created playlist {} ({})", playlist.title, playlist_id);

    let total = sorted_desc.len();
    progress.started(&playlist.title, total);

    let mut report = BuildReport {
        playlist_id,
        inserted: 0,
        skipped: Vec::new(),
    };

    for (position, entry) in sorted_desc.iter().rev().enumerate() {
        limiter.wait().await;
        match service
            .insert_playlist_item(&report.playlist_id, &entry.id)
            .await
        {
            Ok(()) => {
                limiter.relaxed().await;
                report.inserted += 1;
                progress.inserted(position + 1, total, &entry.title);
            }
            Err(e) => {
                if e.is_rate_limit() {
                    limiter.throttled().await;
                }
                warn!("Skipped {} ({}): {}", entry.id, entry.title, e);
                let reason = e.to_string();
                progress.skipped(&entry.title, &reason);
                report.skipped.push(SkippedItem {
                    video_id: entry.id.clone(),
                    title: entry.title.clone(),
                    reason,
                });
            }
        }
    }

    progress.finished(&report);
    info!(
        "Rebuild finished: {} inserted, {} skipped",
        report.inserted,
        report.skipped.len()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_title() {
        assert_eq!(sorted_title("Talks"), "Talks - Sorted");
    }

    #[test]
    fn report_completeness() {
        let mut report = BuildReport {
            playlist_id: "PLnew".into(),
            inserted: 3,
            skipped: Vec::new(),
        };
        assert!(report.is_complete());
        report.skipped.push(SkippedItem {
            video_id: "v".into(),
            title: "t".into(),
            reason: "gone".into(),
        });
        assert!(!report.is_complete());
        assert_eq!(report.total(), 4);
    }
}
