//! Error types for video generation.

use std::time::Duration;

/// Maximum length (in characters) of vendor error text kept in an error.
const MAX_ERROR_MESSAGE_LEN: usize = 500;

/// Errors that can occur during video generation.
#[derive(Debug, thiserror::Error)]
pub enum VidGenError {
    /// API key missing or invalid.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api {
        /// HTTP status, or the vendor's own status code.
        status: u16,
        /// Vendor error text.
        message: String,
    },

    /// Rate limit exceeded.
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited {
        /// Delay suggested by the vendor, if any.
        retry_after: Option<Duration>,
    },

    /// Polling did not reach a terminal state in time.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// Content was blocked by the vendor's safety filters.
    #[error("content blocked: {0}")]
    ContentBlocked(String),

    /// Account has no credits left.
    #[error("billing error: {0}")]
    Billing(String),

    /// Invalid request parameters.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The vendor answered with a payload we could not make sense of.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// The vendor reported the job as failed.
    #[error("video generation failed: {0}")]
    VideoGeneration(String),

    /// Network or HTTP error.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Failed to decode base64 data.
    #[error("failed to decode: {0}")]
    Decode(String),

    /// I/O error (e.g., reading the input image or saving the video).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for video generation operations.
pub type Result<T> = std::result::Result<T, VidGenError>;

/// Cleans up vendor error text before it is stored in an error.
///
/// Collapses whitespace, redacts bearer tokens and `api_key`-style values,
/// and caps the length so a vendor HTML error page does not flood the
/// terminal.
pub(crate) fn sanitize_error_message(text: &str) -> String {
    let mut words = Vec::new();
    let mut redact_next = false;

    for word in text.split_whitespace() {
        if redact_next {
            words.push("[REDACTED]".to_string());
            redact_next = false;
            continue;
        }
        if word.eq_ignore_ascii_case("bearer") {
            redact_next = true;
            words.push(word.to_string());
            continue;
        }
        words.push(redact_key_value(word));
    }

    let joined = words.join(" ");
    if joined.chars().count() > MAX_ERROR_MESSAGE_LEN {
        let truncated: String = joined.chars().take(MAX_ERROR_MESSAGE_LEN).collect();
        format!("{truncated}...")
    } else {
        joined
    }
}

fn redact_key_value(word: &str) -> String {
    let lower = word.to_ascii_lowercase();
    for key in ["api_key=", "api-key=", "x-api-key:", "apikey="] {
        if let Some(pos) = lower.find(key) {
            let end = pos + key.len();
            return format!("{}[REDACTED]", &word[..end]);
        }
    }
    word.to_string()
}

/// Parses a `Retry-After` header given in seconds.
pub(crate) fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

/// Maps a failed HTTP status plus body to an error.
///
/// Shared by the vendors whose APIs use plain HTTP status codes for errors.
pub(crate) fn classify_http_error(
    status: u16,
    text: &str,
    headers: &reqwest::header::HeaderMap,
) -> VidGenError {
    let text = sanitize_error_message(text);
    match status {
        401 | 403 => return VidGenError::Auth(text),
        402 => return VidGenError::Billing(text),
        400 | 422 => return VidGenError::InvalidRequest(text),
        429 => {
            let retry_after = parse_retry_after(headers).map(Duration::from_secs);
            return VidGenError::RateLimited { retry_after };
        }
        _ => {}
    }
    let lower = text.to_lowercase();
    if lower.contains("safety")
        || lower.contains("blocked")
        || lower.contains("content_policy")
        || lower.contains("moderated")
    {
        return VidGenError::ContentBlocked(text);
    }
    VidGenError::Api {
        status,
        message: text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderMap, HeaderValue, RETRY_AFTER};

    #[test]
    fn test_error_display() {
        let err = VidGenError::Api {
            status: 404,
            message: "Not found".into(),
        };
        assert_eq!(err.to_string(), "API error: 404 - Not found");

        let err = VidGenError::ContentBlocked("Safety filter triggered".into());
        assert_eq!(err.to_string(), "content blocked: Safety filter triggered");

        let err = VidGenError::Timeout(Duration::from_secs(30));
        assert_eq!(err.to_string(), "operation timed out after 30s");
    }

    #[test]
    fn test_sanitize_redacts_bearer_token() {
        let msg = sanitize_error_message("invalid header Authorization: Bearer sk-secret-123");
        assert_eq!(msg, "invalid header Authorization: Bearer [REDACTED]");
    }

    #[test]
    fn test_sanitize_redacts_api_key_param() {
        let msg = sanitize_error_message("bad request to /v1?api_key=abc123");
        assert_eq!(msg, "bad request to /v1?api_key=[REDACTED]");
    }

    #[test]
    fn test_sanitize_collapses_whitespace() {
        let msg = sanitize_error_message("  line one\n\n  line two\t ");
        assert_eq!(msg, "line one line two");
    }

    #[test]
    fn test_sanitize_truncates_long_text() {
        let long = "x".repeat(2000);
        let msg = sanitize_error_message(&long);
        assert_eq!(msg.chars().count(), MAX_ERROR_MESSAGE_LEN + 3);
        assert!(msg.ends_with("..."));
    }

    #[test]
    fn test_parse_retry_after() {
        let mut headers = HeaderMap::new();
        assert_eq!(parse_retry_after(&headers), None);

        headers.insert(RETRY_AFTER, HeaderValue::from_static("30"));
        assert_eq!(parse_retry_after(&headers), Some(30));

        headers.insert(
            RETRY_AFTER,
            HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"),
        );
        assert_eq!(parse_retry_after(&headers), None);
    }

    #[test]
    fn test_classify_http_error() {
        let headers = HeaderMap::new();
        assert!(matches!(
            classify_http_error(401, "Unauthorized", &headers),
            VidGenError::Auth(_)
        ));
        assert!(matches!(
            classify_http_error(402, "Payment required", &headers),
            VidGenError::Billing(_)
        ));
        assert!(matches!(
            classify_http_error(422, "bad field", &headers),
            VidGenError::InvalidRequest(_)
        ));
        assert!(matches!(
            classify_http_error(500, "prompt blocked by safety system", &headers),
            VidGenError::ContentBlocked(_)
        ));
        assert!(matches!(
            classify_http_error(503, "Service Unavailable", &headers),
            VidGenError::Api { status: 503, .. }
        ));
    }

    #[test]
    fn test_classify_rate_limited_with_retry_after() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("12"));
        let err = classify_http_error(429, "slow down", &headers);
        assert!(matches!(
            err,
            VidGenError::RateLimited {
                retry_after: Some(d)
            } if d == Duration::from_secs(12)
        ));
    }
}
