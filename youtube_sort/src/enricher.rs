use std::collections::HashMap;

use tracing::{debug, warn};

use crate::error::Result;
use crate::model::{parse_timestamp, VideoEntry};
use crate::pacing::RateLimiter;
use crate::service::{PlaylistService, VideoRecord, MAX_BATCH_SIZE};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichStats {
    pub resolved: usize,
    pub unresolved: usize,
}

/// Fills in upload times and canonical titles with bulk lookups.
///
/// Entries are looked up in order, `batch_size` ids per request. Entries the
/// service does not return keep their listed title and stay unresolved; the
/// slice length never changes. A failed batch aborts the whole enrichment.
pub async fn enrich(
    service: &dyn PlaylistService,
    limiter: &RateLimiter,
    entries: &mut [VideoEntry],
    batch_size: usize,
) -> Result<EnrichStats> {
    let batch_size = batch_size.clamp(1, MAX_BATCH_SIZE);
    let mut stats = EnrichStats::default();

    for (index, batch) in entries.chunks_mut(batch_size).enumerate() {
        let ids: Vec<String> = batch.iter().map(|entry| entry.id.clone()).collect();

        limiter.wait().await;
        let records = match service.videos(&ids).await {
            Ok(records) => records,
            Err(e) => {
                if e.is_rate_limit() {
                    limiter.throttled().await;
                }
                return Err(e);
            }
        };
        limiter.relaxed().await;

        let found: HashMap<&str, &VideoRecord> = records
            .iter()
            .map(|record| (record.id.as_str(), record))
            .collect();

        for entry in batch.iter_mut() {
            let Some(record) = found.get(entry.id.as_str()) else {
                debug!("No metadata for {} ({})", entry.id, entry.title);
                stats.unresolved += 1;
                continue;
            };
            match parse_timestamp(&record.published_at) {
                Some(published_at) => {
                    entry.published_at = Some(published_at);
                    entry.title = record.title.clone();
                    stats.resolved += 1;
                }
                None => {
                    warn!(
                        "Unparseable publish time {:?} for {}",
                        record.published_at, entry.id
                    );
                    stats.unresolved += 1;
                }
            }
        }

        debug!(
            "Enriched batch {} ({} ids, {} returned)",
            index + 1,
            ids.len(),
            records.len()
        );
    }

    Ok(stats)
}
