//! Lookup error taxonomy

use thiserror::Error;

use crate::cache::StoreError;
use crate::data::UpstreamError;

/// Message shown to callers for any failed lookup
pub const PUBLIC_FAILURE_MESSAGE: &str = "Failed to look up banks";

/// Errors that can end a lookup or an administrative operation
#[derive(Debug, Error)]
pub enum LookupError {
    /// Store query failed; on the search path this only causes a miss
    #[error("store unavailable: {0}")]
    StoreUnavailable(StoreError),

    /// Partner API could not be reached
    #[error("{0}")]
    UpstreamUnavailable(UpstreamError),

    /// Partner API returned content that could not be decoded
    #[error("{0}")]
    UpstreamMalformed(UpstreamError),

    /// Writing refreshed records failed
    #[error("persistence failed: {0}")]
    PersistenceFailure(StoreError),
}

impl LookupError {
    /// Caller-facing text, free of internal detail
    pub fn public_message(&self) -> &'static str {
        PUBLIC_FAILURE_MESSAGE
    }
}

impl From<UpstreamError> for LookupError {
    fn from(error: UpstreamError) -> Self {
        match error {
            UpstreamError::Unavailable(_) => LookupError::UpstreamUnavailable(error),
            UpstreamError::Malformed(_) => LookupError::UpstreamMalformed(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_errors_map_to_matching_kind() {
        let err: LookupError = UpstreamError::Unavailable("timed out".to_string()).into();
        assert!(matches!(err, LookupError::UpstreamUnavailable(_)));

        let err: LookupError = UpstreamError::Malformed("not JSON".to_string()).into();
        assert!(matches!(err, LookupError::UpstreamMalformed(_)));
    }

    #[test]
    fn test_public_message_hides_detail() {
        let err: LookupError =
            UpstreamError::Unavailable("token exchange connection failed".to_string()).into();
        assert_eq!(err.public_message(), PUBLIC_FAILURE_MESSAGE);
        assert!(err.to_string().contains("token exchange"));
    }
}
