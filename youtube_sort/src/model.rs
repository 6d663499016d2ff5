use chrono::{DateTime, Utc};

/// One video flowing through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoEntry {
    pub id: String,
    /// Title as listed in the source playlist until enrichment replaces it.
    pub title: String,
    /// When the video joined the source playlist. Never a sort key.
    pub added_at: DateTime<Utc>,
    /// Authoritative upload time. `None` until enriched, and still `None`
    /// for videos the bulk lookup could not resolve (deleted, private,
    /// region blocked). `None` orders before any timestamp.
    pub published_at: Option<DateTime<Utc>>,
}

impl VideoEntry {
    pub fn new(id: impl Into<String>, title: impl Into<String>, added_at: DateTime<Utc>) -> Self {
        VideoEntry {
            id: id.into(),
            title: title.into(),
            added_at,
            published_at: None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.published_at.is_some()
    }
}

/// What to do with entries the bulk lookup did not return.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnresolvedPolicy {
    /// Keep them; they sort as oldest and are still offered for insertion.
    #[default]
    Keep,
    /// Remove them before sorting.
    Drop,
}

/// Parses the RFC 3339 timestamps the API returns.
pub(crate) fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}
