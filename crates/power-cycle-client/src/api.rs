//! The management API seam.
//!
//! The cycle controller talks to the management server only through the
//! [`ManagementApi`] trait, so tests can substitute a scripted implementation
//! and a retry policy can wrap the HTTP client without touching the controller.

use async_trait::async_trait;
use power_cycle_core::{EntityId, EntitySummary, PowerAction, PowerState, SessionToken};

use crate::config::Credentials;
use crate::error::Result;

/// Acknowledgement of an accepted power state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack {
    /// The accepted HTTP status (`200` or `204`).
    pub status: u16,
}

impl Ack {
    /// Status codes the power endpoint uses to signal acceptance.
    pub const ACCEPTED_STATUSES: [u16; 2] = [204, 200];

    /// Returns `true` if the server answered `204 No Content`.
    #[must_use]
    pub const fn is_no_content(&self) -> bool {
        self.status == 204
    }
}

/// Operations consumed from the virtualization management API.
///
/// No implementation retries. A failed or missing acknowledgement means the
/// final state of the entity is unknown, not unchanged.
#[async_trait]
pub trait ManagementApi: Send + Sync {
    /// Open a session.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Auth` on any non-success status.
    async fn authenticate(&self, credentials: &Credentials) -> Result<SessionToken>;

    /// List the managed entities visible to the session.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Query` on a non-success status.
    async fn list_entities(&self, session: &SessionToken) -> Result<Vec<EntitySummary>>;

    /// Request a power transition for one entity.
    ///
    /// Powering on an entity that is already on is left to the server's semantics.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::PowerOp` when the status is not in [`Ack::ACCEPTED_STATUSES`].
    async fn set_power(
        &self,
        session: &SessionToken,
        entity: &EntityId,
        action: PowerAction,
    ) -> Result<Ack>;

    /// Read the current power state of one entity.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Query` on a non-success status and
    /// `ApiError::MissingField` if the state is absent from the response.
    async fn get_power_state(&self, session: &SessionToken, entity: &EntityId)
        -> Result<PowerState>;
}
