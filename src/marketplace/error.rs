//! Marketplace API error types with retry classification.
//!
//! Distinguishes between transient errors (should retry) and permanent errors
//! (should not retry). Every HTTP round trip in the client is classified here
//! before the workflow layer decides what the failure means for the run.

use std::time::Duration;

/// Error from a marketplace API call.
#[derive(Debug)]
pub struct MarketError {
    /// The kind of error
    pub kind: MarketErrorKind,
    /// HTTP status code, if applicable
    pub status_code: Option<u16>,
    /// Error message (server body or transport error text)
    pub message: String,
    /// Suggested retry delay (from Retry-After header, when present)
    pub retry_after: Option<Duration>,
}

impl MarketError {
    /// Create a rate limit error.
    pub fn rate_limited(message: String, retry_after: Option<Duration>) -> Self {
        Self {
            kind: MarketErrorKind::RateLimited,
            status_code: Some(429),
            message,
            retry_after,
        }
    }

    /// Create a server error.
    pub fn server_error(status_code: u16, message: String) -> Self {
        Self {
            kind: MarketErrorKind::ServerError,
            status_code: Some(status_code),
            message,
            retry_after: None,
        }
    }

    /// Create a client error (bad request, auth, conflict, etc.).
    pub fn client_error(status_code: u16, message: String) -> Self {
        Self {
            kind: MarketErrorKind::ClientError,
            status_code: Some(status_code),
            message,
            retry_after: None,
        }
    }

    /// Create a network error.
    pub fn network_error(message: String) -> Self {
        Self {
            kind: MarketErrorKind::NetworkError,
            status_code: None,
            message,
            retry_after: None,
        }
    }

    /// Create a parse error.
    pub fn parse_error(message: String) -> Self {
        Self {
            kind: MarketErrorKind::ParseError,
            status_code: None,
            message,
            retry_after: None,
        }
    }

    /// Check if this error is transient and should be retried.
    pub fn is_transient(&self) -> bool {
        self.kind.is_transient()
    }

    /// Check if this is an authentication/authorization failure (401/403).
    pub fn is_auth(&self) -> bool {
        matches!(self.status_code, Some(401) | Some(403))
    }

    /// Check if this is a conflict (409): gig taken, duplicate application,
    /// name already registered.
    pub fn is_conflict(&self) -> bool {
        self.status_code == Some(409)
    }

    /// Get the suggested delay before retry.
    ///
    /// Returns the `retry_after` if set, otherwise an exponential backoff
    /// based on the error kind.
    pub fn suggested_delay(&self, attempt: u32) -> Duration {
        if let Some(retry_after) = self.retry_after {
            return retry_after;
        }

        let base_delay = match self.kind {
            MarketErrorKind::RateLimited => Duration::from_secs(5),
            MarketErrorKind::ServerError => Duration::from_secs(2),
            MarketErrorKind::NetworkError => Duration::from_secs(1),
            _ => Duration::from_secs(1),
        };

        // Exponential backoff: base * 2^attempt
        let multiplier = 2u64.saturating_pow(attempt);
        let delay_secs = base_delay.as_secs().saturating_mul(multiplier);

        // Deterministic jitter (up to 25% of delay) before capping
        let jitter_range = delay_secs / 4;
        let jitter = if jitter_range > 0 {
            (attempt as u64 * 7) % jitter_range
        } else {
            0
        };

        // Cap total delay (including jitter) at 60 seconds
        let total_delay = (delay_secs + jitter).min(60);

        Duration::from_secs(total_delay)
    }
}

impl std::fmt::Display for MarketError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status_code {
            Some(code) => write!(f, "{} (HTTP {}): {}", self.kind, code, self.message),
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

impl std::error::Error for MarketError {}

/// Classification of marketplace API errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketErrorKind {
    /// Rate limited (429) - transient, should retry with backoff
    RateLimited,
    /// Server error (500, 502, 503, 504) - transient, should retry
    ServerError,
    /// Client error (400, 401, 403, 404, 409) - permanent, should not retry
    ClientError,
    /// Network error (connection failed, timeout) - transient, should retry
    NetworkError,
    /// Response parsing error - permanent
    ParseError,
}

impl MarketErrorKind {
    /// Check if this error kind is transient (worth retrying).
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            MarketErrorKind::RateLimited
                | MarketErrorKind::ServerError
                | MarketErrorKind::NetworkError
        )
    }
}

impl std::fmt::Display for MarketErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MarketErrorKind::RateLimited => write!(f, "Rate limited"),
            MarketErrorKind::ServerError => write!(f, "Server error"),
            MarketErrorKind::ClientError => write!(f, "Client error"),
            MarketErrorKind::NetworkError => write!(f, "Network error"),
            MarketErrorKind::ParseError => write!(f, "Parse error"),
        }
    }
}

/// Configuration for retry behavior on transient errors.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Maximum total time to spend retrying
    pub max_retry_duration: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            max_retry_duration: Duration::from_secs(120),
        }
    }
}

impl RetryPolicy {
    /// Check if the given error should be retried under this policy.
    pub fn should_retry(&self, error: &MarketError) -> bool {
        error.is_transient()
    }
}

/// Parse an HTTP status code into an error kind.
pub fn classify_http_status(status: u16) -> MarketErrorKind {
    match status {
        429 => MarketErrorKind::RateLimited,
        500 | 502 | 503 | 504 => MarketErrorKind::ServerError,
        400..=499 => MarketErrorKind::ClientError,
        _ => MarketErrorKind::ServerError,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(MarketErrorKind::RateLimited.is_transient());
        assert!(MarketErrorKind::ServerError.is_transient());
        assert!(MarketErrorKind::NetworkError.is_transient());
        assert!(!MarketErrorKind::ClientError.is_transient());
        assert!(!MarketErrorKind::ParseError.is_transient());
    }

    #[test]
    fn test_http_status_classification() {
        assert_eq!(classify_http_status(429), MarketErrorKind::RateLimited);
        assert_eq!(classify_http_status(500), MarketErrorKind::ServerError);
        assert_eq!(classify_http_status(503), MarketErrorKind::ServerError);
        assert_eq!(classify_http_status(400), MarketErrorKind::ClientError);
        assert_eq!(classify_http_status(401), MarketErrorKind::ClientError);
        assert_eq!(classify_http_status(409), MarketErrorKind::ClientError);
    }

    #[test]
    fn test_conflict_detection() {
        let err = MarketError::client_error(409, "already applied".to_string());
        assert!(err.is_conflict());
        assert!(!err.is_auth());

        let err = MarketError::client_error(401, "bad key".to_string());
        assert!(err.is_auth());
        assert!(!err.is_conflict());
    }

    #[test]
    fn test_exponential_backoff() {
        let error = MarketError::rate_limited("test".to_string(), None);

        let delay_0 = error.suggested_delay(0);
        let delay_1 = error.suggested_delay(1);
        let delay_2 = error.suggested_delay(2);

        assert!(delay_1 > delay_0);
        assert!(delay_2 > delay_1);

        // Should be capped
        let delay_10 = error.suggested_delay(10);
        assert!(delay_10.as_secs() <= 60);
    }

    #[test]
    fn test_retry_after_respected() {
        let error =
            MarketError::rate_limited("test".to_string(), Some(Duration::from_secs(30)));

        assert_eq!(error.suggested_delay(0), Duration::from_secs(30));
        assert_eq!(error.suggested_delay(5), Duration::from_secs(30));
    }

    #[test]
    fn test_retry_policy_skips_permanent_errors() {
        let policy = RetryPolicy::default();
        assert!(policy.should_retry(&MarketError::server_error(502, "bad gateway".into())));
        assert!(!policy.should_retry(&MarketError::client_error(409, "gig taken".into())));
        assert!(!policy.should_retry(&MarketError::parse_error("bad json".into())));
    }
}
