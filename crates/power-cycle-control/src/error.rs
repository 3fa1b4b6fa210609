//! Error types for the cycle controller.
//!
//! Only setup-phase failures surface here. Per-entity failures during the
//! steady-state loop are folded into batch reports instead.

use power_cycle_client::ApiError;
use thiserror::Error;

/// A result type using `CycleError`.
pub type Result<T> = std::result::Result<T, CycleError>;

/// Errors that abort a run.
#[derive(Debug, Error)]
pub enum CycleError {
    /// The configuration is incomplete or inconsistent.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The management client could not be constructed.
    #[error("client error: {0}")]
    Client(#[from] ApiError),

    /// Opening the session failed.
    #[error("authentication failed: {0}")]
    Authentication(#[source] ApiError),

    /// Listing entities during setup failed.
    #[error("failed to list entities: {0}")]
    Listing(#[source] ApiError),
}

impl CycleError {
    /// Returns the process exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidConfig(_) => 2,
            Self::Client(_) | Self::Authentication(_) | Self::Listing(_) => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setup_errors_wrap_api_errors() {
        let err = CycleError::Authentication(ApiError::Auth {
            status: 401,
            body: "denied".to_string(),
        });
        assert!(err.to_string().contains("401"));
        assert_eq!(err.exit_code(), 1);
        assert_eq!(CycleError::InvalidConfig("x".into()).exit_code(), 2);
    }
}
