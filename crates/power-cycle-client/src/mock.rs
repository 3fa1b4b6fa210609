//! Scriptable in-memory `ManagementApi` for tests.
//!
//! Failures and latencies are configured per entity. Every power request is
//! recorded twice, once when it starts and once when it finishes, so tests can
//! assert batch ordering.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use power_cycle_core::{EntityId, EntitySummary, PowerAction, PowerState, SessionToken};

use crate::api::{Ack, ManagementApi};
use crate::config::Credentials;
use crate::error::{ApiError, Result};

/// Token handed out by a successful `authenticate`.
pub const MOCK_TOKEN: &str = "mock-session";

/// Whether a recorded event marks the start or end of a power request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallPhase {
    /// The request was issued.
    Started,
    /// The request returned, successfully or not.
    Finished,
}

/// One recorded power request event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PowerCall {
    /// Target entity.
    pub entity: EntityId,
    /// Requested action.
    pub action: PowerAction,
    /// Start or finish.
    pub phase: CallPhase,
}

/// In-memory management API with scripted failures.
#[derive(Debug, Default)]
pub struct MockManagementApi {
    entities: Vec<EntityId>,
    auth_failure: Option<u16>,
    listing_failure: Option<u16>,
    power_failures: HashMap<EntityId, u16>,
    transport_failures: HashSet<EntityId>,
    delays: HashMap<EntityId, Duration>,
    states: Mutex<HashMap<EntityId, PowerState>>,
    calls: Mutex<Vec<PowerCall>>,
    auth_calls: AtomicUsize,
    list_calls: AtomicUsize,
}

impl MockManagementApi {
    /// Create a mock that knows the given entities, all powered off.
    #[must_use]
    pub fn new<I, S>(entities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let entities: Vec<EntityId> = entities
            .into_iter()
            .filter_map(|s| EntityId::new(s.as_ref()).ok())
            .collect();
        let states = entities
            .iter()
            .map(|id| (id.clone(), PowerState::Off))
            .collect();
        Self {
            entities,
            states: Mutex::new(states),
            ..Self::default()
        }
    }

    /// Reject `authenticate` with the given status.
    #[must_use]
    pub fn with_auth_failure(mut self, status: u16) -> Self {
        self.auth_failure = Some(status);
        self
    }

    /// Reject `list_entities` with the given status.
    #[must_use]
    pub fn with_listing_failure(mut self, status: u16) -> Self {
        self.listing_failure = Some(status);
        self
    }

    /// Reject every power request for `entity` with the given status.
    #[must_use]
    pub fn with_power_failure(mut self, entity: &str, status: u16) -> Self {
        if let Ok(id) = EntityId::new(entity) {
            self.power_failures.insert(id, status);
        }
        self
    }

    /// Fail every power request for `entity` as if the connection dropped.
    #[must_use]
    pub fn with_transport_failure(mut self, entity: &str) -> Self {
        if let Ok(id) = EntityId::new(entity) {
            self.transport_failures.insert(id);
        }
        self
    }

    /// Delay every power request for `entity`.
    #[must_use]
    pub fn with_delay(mut self, entity: &str, delay: Duration) -> Self {
        if let Ok(id) = EntityId::new(entity) {
            self.delays.insert(id, delay);
        }
        self
    }

    /// All recorded power request events, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<PowerCall> {
        self.calls.lock().clone()
    }

    /// Number of power requests issued for `action`.
    #[must_use]
    pub fn started(&self, action: PowerAction) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.action == action && c.phase == CallPhase::Started)
            .count()
    }

    /// Number of power requests for `action` that returned.
    #[must_use]
    pub fn finished(&self, action: PowerAction) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.action == action && c.phase == CallPhase::Finished)
            .count()
    }

    /// Number of `authenticate` calls.
    #[must_use]
    pub fn auth_calls(&self) -> usize {
        self.auth_calls.load(Ordering::SeqCst)
    }

    /// Number of `list_entities` calls.
    #[must_use]
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    fn record(&self, entity: &EntityId, action: PowerAction, phase: CallPhase) {
        self.calls.lock().push(PowerCall {
            entity: entity.clone(),
            action,
            phase,
        });
    }

    fn check_session(session: &SessionToken) -> Result<()> {
        if session.expose() == MOCK_TOKEN {
            Ok(())
        } else {
            Err(ApiError::Query {
                status: 401,
                body: "invalid session".to_string(),
            })
        }
    }
}

#[async_trait]
impl ManagementApi for MockManagementApi {
    async fn authenticate(&self, _credentials: &Credentials) -> Result<SessionToken> {
        self.auth_calls.fetch_add(1, Ordering::SeqCst);
        match self.auth_failure {
            Some(status) => Err(ApiError::Auth {
                status,
                body: "authentication rejected".to_string(),
            }),
            None => Ok(SessionToken::new(MOCK_TOKEN)),
        }
    }

    async fn list_entities(&self, session: &SessionToken) -> Result<Vec<EntitySummary>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        Self::check_session(session)?;
        if let Some(status) = self.listing_failure {
            return Err(ApiError::Query {
                status,
                body: "listing rejected".to_string(),
            });
        }
        let states = self.states.lock();
        Ok(self
            .entities
            .iter()
            .map(|id| EntitySummary {
                id: id.clone(),
                name: format!("{id}-name"),
                power_state: states.get(id).copied(),
            })
            .collect())
    }

    async fn set_power(
        &self,
        session: &SessionToken,
        entity: &EntityId,
        action: PowerAction,
    ) -> Result<Ack> {
        self.record(entity, action, CallPhase::Started);

        if let Some(delay) = self.delays.get(entity) {
            tokio::time::sleep(*delay).await;
        }

        let result = if let Err(e) = Self::check_session(session) {
            Err(e)
        } else if self.transport_failures.contains(entity) {
            Err(ApiError::Transport("connection reset by peer".to_string()))
        } else if let Some(&status) = self.power_failures.get(entity) {
            Err(ApiError::PowerOp {
                entity: entity.clone(),
                status,
                body: "operation rejected".to_string(),
            })
        } else {
            self.states
                .lock()
                .insert(entity.clone(), action.target_state());
            Ok(Ack { status: 204 })
        };

        self.record(entity, action, CallPhase::Finished);
        result
    }

    async fn get_power_state(
        &self,
        session: &SessionToken,
        entity: &EntityId,
    ) -> Result<PowerState> {
        Self::check_session(session)?;
        self.states
            .lock()
            .get(entity)
            .copied()
            .ok_or_else(|| ApiError::Query {
                status: 404,
                body: format!("unknown entity {entity}"),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_start_and_finish() {
        let api = MockManagementApi::new(["vm-1"]);
        let session = SessionToken::new(MOCK_TOKEN);
        let vm = EntityId::new("vm-1").unwrap();

        api.set_power(&session, &vm, PowerAction::On).await.unwrap();

        assert_eq!(api.started(PowerAction::On), 1);
        assert_eq!(api.finished(PowerAction::On), 1);
        assert_eq!(
            api.get_power_state(&session, &vm).await.unwrap(),
            PowerState::On
        );
    }

    #[tokio::test]
    async fn scripted_failure_keeps_state() {
        let api = MockManagementApi::new(["vm-2"]).with_power_failure("vm-2", 500);
        let session = SessionToken::new(MOCK_TOKEN);
        let vm = EntityId::new("vm-2").unwrap();

        let result = api.set_power(&session, &vm, PowerAction::On).await;

        assert!(matches!(result, Err(ApiError::PowerOp { status: 500, .. })));
        assert_eq!(
            api.get_power_state(&session, &vm).await.unwrap(),
            PowerState::Off
        );
    }

    #[tokio::test]
    async fn rejects_unknown_session() {
        let api = MockManagementApi::new(["vm-1"]);
        let result = api.list_entities(&SessionToken::new("stale")).await;
        assert!(matches!(result, Err(ApiError::Query { status: 401, .. })));
    }
}
