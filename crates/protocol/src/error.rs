use {
    serde::{Deserialize, Serialize},
    thiserror::Error,
};

/// Stable error codes carried in [`ErrorShape`].
pub mod error_codes {
    /// A required field is missing or blank.
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    /// An unknown user or group was referenced.
    pub const NOT_FOUND: &str = "NOT_FOUND";
    /// Password did not match the stored credential.
    pub const AUTH_FAILED: &str = "AUTH_FAILED";
    /// The caller is not a member of the group it addressed.
    pub const PERMISSION_DENIED: &str = "PERMISSION_DENIED";
    /// The connection has not announced a user via `login`.
    pub const NOT_IDENTIFIED: &str = "NOT_IDENTIFIED";
    /// The frame could not be decoded as a known event.
    pub const INVALID_EVENT: &str = "INVALID_EVENT";
    /// The backing store failed to read or write.
    pub const PERSISTENCE_ERROR: &str = "PERSISTENCE_ERROR";
}

/// Serializable error carried in `error` events and HTTP error bodies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{code}: {message}")]
pub struct ErrorShape {
    pub code: String,
    pub message: String,
}

impl ErrorShape {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Failure to decode an incoming frame.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed event frame: {0}")]
    Malformed(#[from] serde_json::Error),
}
