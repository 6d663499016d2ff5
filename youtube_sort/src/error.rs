use reqwest::StatusCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SortError>;

/// Everything that can go wrong while sorting a playlist.
///
/// Only playlist-item insertion failures are recovered locally (see
/// [`crate::BuildReport`]); every other variant aborts the run.
#[derive(Debug, Error)]
pub enum SortError {
    /// Missing or unreadable local configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The session token is missing, expired or was rejected.
    #[error("Not authorized: {0}")]
    Unauthorized(String),

    /// Unknown playlist or video.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The service asked us to slow down (HTTP 429 or a quota reason on 403).
    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("YouTube API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid playlist URL: {0}")]
    InvalidUrl(String),
}

impl SortError {
    /// Maps a non-success HTTP response onto the error taxonomy.
    ///
    /// YouTube reports quota exhaustion as a 403 whose body names the reason,
    /// so the body is inspected before falling back to a plain API error.
    pub fn from_status(status: StatusCode, body: impl Into<String>) -> Self {
        let message = body.into();
        match status.as_u16() {
            401 => Self::Unauthorized(message),
            403 if is_quota_reason(&message) => Self::RateLimited(message),
            404 => Self::NotFound(message),
            429 => Self::RateLimited(message),
            code => Self::Api {
                status: code,
                message,
            },
        }
    }

    /// Whether retrying the same request later may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RateLimited(_) => true,
            Self::Api { status, .. } => *status >= 500,
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    pub fn is_rate_limit(&self) -> bool {
        matches!(self, Self::RateLimited(_))
    }
}

fn is_quota_reason(body: &str) -> bool {
    ["quotaExceeded", "rateLimitExceeded", "userRateLimitExceeded"]
        .iter()
        .any(|reason| body.contains(reason))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_statuses() {
        assert!(matches!(
            SortError::from_status(StatusCode::UNAUTHORIZED, "expired"),
            SortError::Unauthorized(_)
        ));
        assert!(matches!(
            SortError::from_status(StatusCode::NOT_FOUND, "playlistNotFound"),
            SortError::NotFound(_)
        ));
        assert!(matches!(
            SortError::from_status(StatusCode::TOO_MANY_REQUESTS, ""),
            SortError::RateLimited(_)
        ));
        assert!(matches!(
            SortError::from_status(StatusCode::BAD_REQUEST, "bad"),
            SortError::Api { status: 400, .. }
        ));
    }

    #[test]
    fn forbidden_quota_is_rate_limit() {
        let body = r#"{"error":{"errors":[{"reason":"quotaExceeded"}]}}"#;
        let err = SortError::from_status(StatusCode::FORBIDDEN, body);
        assert!(err.is_rate_limit());
        assert!(err.is_transient());

        let err = SortError::from_status(StatusCode::FORBIDDEN, "playlistItemsNotAccessible");
        assert!(matches!(err, SortError::Api { status: 403, .. }));
        assert!(!err.is_transient());
    }

    #[test]
    fn server_errors_are_transient() {
        assert!(SortError::from_status(StatusCode::SERVICE_UNAVAILABLE, "").is_transient());
        assert!(!SortError::NotFound("x".into()).is_transient());
    }
}
