//! Management API error types.

use power_cycle_core::EntityId;
use thiserror::Error;

/// A result type using `ApiError`.
pub type Result<T> = std::result::Result<T, ApiError>;

/// Errors returned by management API operations.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// Session creation was rejected.
    #[error("authentication failed ({status}): {body}")]
    Auth {
        /// HTTP status returned by the server.
        status: u16,
        /// Response body, as text.
        body: String,
    },

    /// A read query returned a non-success status.
    #[error("query failed ({status}): {body}")]
    Query {
        /// HTTP status returned by the server.
        status: u16,
        /// Response body, as text.
        body: String,
    },

    /// A successful response lacked a required field.
    #[error("malformed response: missing field `{field}` in {body}")]
    MissingField {
        /// Dotted path of the missing field.
        field: &'static str,
        /// Response body, as text.
        body: String,
    },

    /// A successful response could not be decoded.
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// A power state change was rejected for one entity.
    #[error("power operation on {entity} failed ({status}): {body}")]
    PowerOp {
        /// The entity the request targeted.
        entity: EntityId,
        /// HTTP status returned by the server.
        status: u16,
        /// Response body, as text.
        body: String,
    },

    /// The request never produced an HTTP response.
    #[error("transport error: {0}")]
    Transport(String),
}

impl ApiError {
    /// Returns `true` if the request failed before reaching the server's API layer.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Returns the HTTP status carried by this error, if any.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Auth { status, .. }
            | Self::Query { status, .. }
            | Self::PowerOp { status, .. } => Some(*status),
            Self::MissingField { .. } | Self::Decode(_) | Self::Transport(_) => None,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_is_exposed_for_http_failures() {
        let err = ApiError::PowerOp {
            entity: EntityId::new("vm-2").unwrap(),
            status: 500,
            body: "boom".to_string(),
        };
        assert_eq!(err.status(), Some(500));
        assert!(!err.is_transport());
        assert!(err.to_string().contains("vm-2"));
    }

    #[test]
    fn transport_errors_are_tagged() {
        let err = ApiError::Transport("connection refused".to_string());
        assert!(err.is_transport());
        assert_eq!(err.status(), None);
    }
}
