//! Error types for the fetch service.

use thiserror::Error;

/// Result type alias for fetch operations.
pub type Result<T> = std::result::Result<T, FetchError>;

/// Errors that can occur during fetch operations.
#[derive(Error, Debug)]
pub enum FetchError {
    /// Missing URL, malformed parameters. Surfaced as HTTP 400.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// An underlying engine failed (network, timeout, protocol).
    #[error("engine '{engine}' failed: {reason}")]
    EngineError {
        /// The engine's stable identifier (e.g. `fast:direct`).
        engine: String,
        /// Human-readable reason.
        reason: String,
    },

    /// Every ladder step in the escalation scheduler failed or was
    /// judged insufficient.
    #[error("escalation exhausted for '{domain}' after {steps} step(s)")]
    ExhaustedEscalation {
        /// The domain that could not be fetched.
        domain: String,
        /// How many ladder steps were attempted.
        steps: usize,
    },

    /// An advanced-mode per-item failure (API capture or resource
    /// download). Recorded in the result, never fatal to the whole
    /// request.
    #[error("resource error: {0}")]
    ResourceError(String),

    /// The browser pool's remote connection dropped. Transient;
    /// triggers one reconnect + retry before surfacing.
    #[error("browser pool disconnected: {0}")]
    PoolDisconnected(String),

    /// The caller aborted the request; no profile store mutation
    /// should follow.
    #[error("request cancelled")]
    Cancelled,

    /// HTTP transport failure.
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("url parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Domain profile store failure.
    #[error("profile store error: {0}")]
    Store(#[from] rusqlite::Error),

    /// Headless browser failure (launch, navigation, protocol).
    #[error("browser error: {0}")]
    Browser(String),

    /// Generic error.
    #[error("{0}")]
    Other(String),
}

impl FetchError {
    /// A one-line string safe to hand back to a caller verbatim (never
    /// a stack trace, per the error-handling design).
    pub fn user_message(&self) -> String {
        self.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_bad_request() {
        let err = FetchError::BadRequest("missing url".to_string());
        assert_eq!(err.to_string(), "bad request: missing url");
    }

    #[test]
    fn test_error_display_engine_error() {
        let err = FetchError::EngineError {
            engine: "fast:direct".to_string(),
            reason: "timeout".to_string(),
        };
        assert_eq!(err.to_string(), "engine 'fast:direct' failed: timeout");
    }

    #[test]
    fn test_error_display_exhausted_escalation() {
        let err = FetchError::ExhaustedEscalation {
            domain: "example.com".to_string(),
            steps: 6,
        };
        assert_eq!(
            err.to_string(),
            "escalation exhausted for 'example.com' after 6 step(s)"
        );
    }

    #[test]
    fn test_error_display_cancelled() {
        let err = FetchError::Cancelled;
        assert_eq!(err.to_string(), "request cancelled");
    }

    #[test]
    fn test_error_user_message_is_one_line() {
        let err = FetchError::Other("boom".to_string());
        assert!(!err.user_message().contains('\n'));
    }
}
