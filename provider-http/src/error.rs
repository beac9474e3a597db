//! Error types for the HTTP feed provider

use bridge_traits::error::BridgeError;
use thiserror::Error;

/// HTTP feed errors
#[derive(Error, Debug)]
pub enum HttpFeedError {
    /// Provider has no usable feed URL
    #[error("Invalid feed URL for provider {provider_id}: '{url}'")]
    InvalidUrl { provider_id: i64, url: String },

    /// Feed endpoint answered with a non-success status
    #[error("Feed request failed (status {status_code}): {message}")]
    Status { status_code: u16, message: String },

    /// Payload is not one of the accepted feed shapes
    #[error("Failed to parse feed: {0}")]
    Parse(String),

    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

/// Result type for HTTP feed operations
pub type Result<T> = std::result::Result<T, HttpFeedError>;

impl From<HttpFeedError> for BridgeError {
    fn from(error: HttpFeedError) -> Self {
        match error {
            HttpFeedError::Bridge(e) => e,
            other => BridgeError::Feed(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = HttpFeedError::Status {
            status_code: 404,
            message: "Not Found".to_string(),
        };

        assert_eq!(error.to_string(), "Feed request failed (status 404): Not Found");
    }

    #[test]
    fn test_error_conversion() {
        let error = HttpFeedError::Parse("expected array".to_string());
        let bridge_error: BridgeError = error.into();
        assert!(matches!(bridge_error, BridgeError::Feed(ref msg) if msg.contains("expected array")));

        let passthrough: BridgeError =
            HttpFeedError::Bridge(BridgeError::OperationFailed("connect".to_string())).into();
        assert!(matches!(passthrough, BridgeError::OperationFailed(_)));
    }
}
