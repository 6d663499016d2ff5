use tracing::info;

use crate::builder::{self, BuildReport};
use crate::enricher::{self, EnrichStats};
use crate::error::Result;
use crate::model::UnresolvedPolicy;
use crate::pacing::{PacingConfig, RateLimiter};
use crate::progress::BuildProgress;
use crate::reader;
use crate::service::{PlaylistService, MAX_BATCH_SIZE, MAX_PAGE_SIZE};
use crate::sorter::sort_descending_by_publish_date;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
    pub page_size: u32,
    pub batch_size: usize,
    pub unresolved: UnresolvedPolicy,
    pub pacing: PacingConfig,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        PipelineOptions {
            page_size: MAX_PAGE_SIZE,
            batch_size: MAX_BATCH_SIZE,
            unresolved: UnresolvedPolicy::default(),
            pacing: PacingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortOutcome {
    pub source_title: String,
    /// Entries offered to the builder.
    pub entries: usize,
    pub enrich: EnrichStats,
    pub report: BuildReport,
}

/// Reads a playlist, orders it by upload time and writes a sorted copy.
pub struct SortPipeline<'a> {
    service: &'a dyn PlaylistService,
    options: PipelineOptions,
    limiter: RateLimiter,
}

impl<'a> SortPipeline<'a> {
    pub fn new(service: &'a dyn PlaylistService, options: PipelineOptions) -> Self {
        SortPipeline {
            service,
            options,
            limiter: RateLimiter::new(options.pacing),
        }
    }

    /// Replaces the limiter built from `options.pacing`.
    pub fn with_limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiter = limiter;
        self
    }

    /// Runs every stage in turn.
    ///
    /// A failure after the destination playlist was created leaves that
    /// playlist in place, partially filled.
    pub async fn run(
        &self,
        playlist_id: &str,
        progress: &mut dyn BuildProgress,
    ) -> Result<SortOutcome> {
        let source_title = self.service.playlist_title(playlist_id).await?;
        info!("Sorting playlist \"{}\" ({})", source_title, playlist_id);

        let mut entries =
            reader::fetch_all(self.service, playlist_id, self.options.page_size).await?;
        info!("Found {} videos", entries.len());

        let enrich = enricher::enrich(
            self.service,
            &self.limiter,
            &mut entries,
            self.options.batch_size,
        )
        .await?;
        info!(
            "Resolved upload dates for {} videos, {} unresolved",
            enrich.resolved, enrich.unresolved
        );

        if self.options.unresolved == UnresolvedPolicy::Drop {
            entries.retain(|entry| entry.is_resolved());
        }

        let sorted = sort_descending_by_publish_date(entries);
        let report = builder::build(
            self.service,
            &self.limiter,
            progress,
            &sorted,
            &source_title,
        )
        .await?;

        Ok(SortOutcome {
            source_title,
            entries: sorted.len(),
            enrich,
            report,
        })
    }
}
