use thiserror::Error;

/// Store failure taxonomy.
///
/// `Persistence` only surfaces where the caller cannot proceed without the
/// data (the startup load); a failed flush after a mutation is logged and
/// the operation completes against in-memory state instead.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A required field is missing or blank.
    #[error("{0}")]
    Validation(String),
    /// An unknown user or group was referenced.
    #[error("{0}")]
    NotFound(String),
    /// Password did not match the stored hash.
    #[error("invalid credentials")]
    AuthFailed,
    /// The backing file could not be read, parsed or written.
    #[error("{0}")]
    Persistence(String),
}
