//! Error types for the scout-search crate.
//!
//! Network failures are split into transient (retried) and permanent
//! (never retried) so every call site shares one retry policy.

/// Errors that can occur while searching or fetching pages.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// Timeout, connection failure, HTTP 5xx or 429. Safe to retry.
    #[error("transient error from {host}: {reason}")]
    Transient { host: String, reason: String },

    /// HTTP 4xx other than 429, auth failure or a malformed request.
    #[error("permanent error from {host}: {reason}")]
    Permanent {
        host: String,
        /// Status code when the server answered at all.
        status: Option<u16>,
        reason: String,
    },

    /// The host is inside its cool-down window after repeated 429s.
    #[error("host {0} is cooling down after repeated rate limiting")]
    CoolingDown(String),

    /// All enabled search engines failed to return results.
    #[error("all search engines failed: {0}")]
    AllEnginesFailed(String),

    /// Failed to parse a search engine response.
    #[error("parse error: {0}")]
    Parse(String),

    /// Invalid search or network configuration.
    #[error("config error: {0}")]
    Config(String),

    /// The owning run was cancelled.
    #[error("request cancelled")]
    Cancelled,
}

impl SearchError {
    /// Whether the retry policy may attempt this request again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    /// Whether this failure is rate/availability related rather than a
    /// property of the request itself.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Transient { .. } | Self::CoolingDown(_) | Self::AllEnginesFailed(_)
        )
    }

    pub(crate) fn transient(host: &str, reason: impl Into<String>) -> Self {
        Self::Transient {
            host: host.to_owned(),
            reason: reason.into(),
        }
    }

    pub(crate) fn permanent(host: &str, status: Option<u16>, reason: impl Into<String>) -> Self {
        Self::Permanent {
            host: host.to_owned(),
            status,
            reason: reason.into(),
        }
    }
}

/// Convenience type alias for scout-search results.
pub type Result<T> = std::result::Result<T, SearchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_transient() {
        let err = SearchError::transient("example.com", "HTTP 503");
        assert_eq!(
            err.to_string(),
            "transient error from example.com: HTTP 503"
        );
    }

    #[test]
    fn display_permanent() {
        let err = SearchError::permanent("example.com", Some(404), "HTTP 404");
        assert_eq!(
            err.to_string(),
            "permanent error from example.com: HTTP 404"
        );
    }

    #[test]
    fn display_cooling_down() {
        let err = SearchError::CoolingDown("api.example.com".into());
        assert!(err.to_string().contains("cooling down"));
    }

    #[test]
    fn only_transient_is_retryable() {
        assert!(SearchError::transient("h", "timeout").is_retryable());
        assert!(!SearchError::permanent("h", Some(403), "forbidden").is_retryable());
        assert!(!SearchError::CoolingDown("h".into()).is_retryable());
        assert!(!SearchError::Cancelled.is_retryable());
        assert!(!SearchError::Parse("bad".into()).is_retryable());
    }

    #[test]
    fn cooling_down_counts_as_transient() {
        assert!(SearchError::CoolingDown("h".into()).is_transient());
        assert!(!SearchError::Config("x".into()).is_transient());
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SearchError>();
    }
}
