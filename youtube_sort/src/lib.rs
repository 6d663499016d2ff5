//! Rebuilds a YouTube playlist as a private copy ordered by upload date.
//!
//! The work happens in four stages, each in its own module:
//! [`fetch_all`] lists the source playlist, [`enrich`] looks up real upload
//! times in bulk, [`sort_descending_by_publish_date`] orders the entries
//! newest first, and [`build`] creates the new playlist and appends the
//! entries oldest first. [`SortPipeline`] runs them in sequence against any
//! [`PlaylistService`].

pub mod auth;
pub mod builder;
pub mod config;
pub mod enricher;
pub mod error;
pub mod model;
pub mod pacing;
pub mod pipeline;
pub mod progress;
pub mod reader;
pub mod service;
pub mod sorter;
pub mod url;
pub mod youtube;

pub use builder::{build, sorted_title, BuildReport, SkippedItem};
pub use config::Config;
pub use enricher::{enrich, EnrichStats};
pub use error::{Result, SortError};
pub use model::{UnresolvedPolicy, VideoEntry};
pub use pacing::{Backoff, PacingConfig, RateLimiter};
pub use pipeline::{PipelineOptions, SortOutcome, SortPipeline};
pub use progress::{BuildProgress, ConsoleProgress, NoProgress};
pub use reader::fetch_all;
pub use service::{
    NewPlaylist, PlaylistItem, PlaylistItemPage, PlaylistService, Privacy, VideoRecord,
};
pub use sorter::sort_descending_by_publish_date;
pub use youtube::YouTubeClient;
