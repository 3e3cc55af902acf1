use thiserror::Error;

// Type alias for Result with our ComposeError
pub type Result<T> = std::result::Result<T, ComposeError>;

/// Hard failures of a whole composition call.
///
/// Everything else (unreachable stores, missing credentials, malformed
/// transport configuration, per-server timeouts) degrades to a per-entry
/// status in the returned registry and never aborts `compose`.
#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("Invalid identity: {0}")]
    InvalidIdentity(String),

    #[error("Composition cancelled by caller")]
    Cancelled,
}
