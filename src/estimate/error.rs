use thiserror::Error;

/// Shown for every failure that is not a missing-image validation error.
pub const GENERIC_FAILURE_MESSAGE: &str =
    "Unable to estimate measurements. Please upload clear full-body images with proper posture.";

pub const MISSING_IMAGES_MESSAGE: &str =
    "Please upload all three images (front, side, and standing).";

/// Why an estimation did not produce a result.
///
/// `Display` keeps the variants apart for logs; [`EstimateError::user_message`]
/// is what the UI shows.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EstimateError {
    #[error("missing images: {0} of 3 views selected")]
    MissingImages(usize),

    #[error("server error: {0}")]
    RemoteStatus(u16),

    #[error("invalid response from server: {0}")]
    MalformedResponse(String),

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("request timed out after {0}s")]
    TimedOut(u64),

    #[error("could not build request: {0}")]
    Request(String),
}

impl EstimateError {
    pub fn user_message(&self) -> &'static str {
        match self {
            EstimateError::MissingImages(_) => MISSING_IMAGES_MESSAGE,
            _ => GENERIC_FAILURE_MESSAGE,
        }
    }

    /// Status code carried by a remote failure, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            EstimateError::RemoteStatus(code) => Some(*code),
            _ => None,
        }
    }

    /// Local validation errors never reached the network.
    pub fn is_local(&self) -> bool {
        matches!(self, EstimateError::MissingImages(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_missing_images_has_specific_message() {
        assert_eq!(EstimateError::MissingImages(1).user_message(), MISSING_IMAGES_MESSAGE);
        for err in [
            EstimateError::RemoteStatus(500),
            EstimateError::MalformedResponse("no measurements".into()),
            EstimateError::Transport("connection refused".into()),
            EstimateError::TimedOut(120),
        ] {
            assert_eq!(err.user_message(), GENERIC_FAILURE_MESSAGE);
            assert!(!err.is_local());
        }
    }

    #[test]
    fn test_display_distinguishes_remote_failures() {
        let remote = EstimateError::RemoteStatus(502).to_string();
        let malformed = EstimateError::MalformedResponse("missing field".into()).to_string();
        assert!(remote.contains("502"));
        assert_ne!(remote, malformed);
        assert_eq!(EstimateError::RemoteStatus(502).status(), Some(502));
        assert_eq!(EstimateError::Transport("dns".into()).status(), None);
    }
}
