//! HTTP client for the vCenter REST API.
//!
//! Endpoints consumed:
//!
//! - `POST /rest/com/vmware/cis/session` - open a session (basic auth)
//! - `GET /rest/vcenter/vm` - list virtual machines
//! - `GET /rest/vcenter/vm/{vm}` - read one machine, including its power state
//! - `POST /rest/vcenter/vm/{vm}/power/start` and `/power/stop` - power transitions
//!
//! Every response body is wrapped as `{"value": ...}`. The session token is
//! sent in the `vmware-api-session-id` header.

use async_trait::async_trait;
use power_cycle_core::{EntityId, EntitySummary, PowerAction, PowerState, SessionToken};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::api::{Ack, ManagementApi};
use crate::config::{ClientConfig, Credentials};
use crate::error::{ApiError, Result};

/// Header carrying the session token on authenticated calls.
pub const SESSION_HEADER: &str = "vmware-api-session-id";

/// Response wrapper used by every `/rest` endpoint.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    value: Option<T>,
}

#[derive(Debug, Deserialize)]
struct VmInfo {
    power_state: Option<PowerState>,
}

/// Decode `{"value": T}`, reporting a missing `value` as `field`.
fn decode_value<T: DeserializeOwned>(body: &str, field: &'static str) -> Result<T> {
    let envelope: Envelope<T> =
        serde_json::from_str(body).map_err(|e| ApiError::Decode(e.to_string()))?;
    envelope.value.ok_or_else(|| ApiError::MissingField {
        field,
        body: body.to_string(),
    })
}

/// HTTP client for the vCenter management API.
#[derive(Debug, Clone)]
pub struct VcenterClient {
    client: reqwest::Client,
    base_url: String,
}

impl VcenterClient {
    /// Create a new client from configuration.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Transport` if the HTTP client cannot be built.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(config.connect_timeout())
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()
            .map_err(|e| ApiError::Transport(format!("failed to build HTTP client: {e}")))?;

        if config.accept_invalid_certs {
            tracing::warn!(base_url = %config.base_url, "TLS certificate verification disabled");
        }

        Ok(Self::with_client(client, &config.base_url))
    }

    /// Create a new client with a custom reqwest client.
    #[must_use]
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Get the base URL of the management server.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn session_headers(session: &SessionToken) -> Result<HeaderMap> {
        let value = HeaderValue::from_str(session.expose())
            .map_err(|_| ApiError::Decode("session token is not a valid header value".into()))?;
        let mut headers = HeaderMap::new();
        headers.insert(SESSION_HEADER, value);
        Ok(headers)
    }
}

#[async_trait]
impl ManagementApi for VcenterClient {
    async fn authenticate(&self, credentials: &Credentials) -> Result<SessionToken> {
        let url = format!("{}/rest/com/vmware/cis/session", self.base_url);

        let response = self
            .client
            .post(&url)
            .basic_auth(&credentials.username, Some(credentials.password()))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status != StatusCode::OK {
            tracing::error!(status = %status, "Session creation rejected");
            return Err(ApiError::Auth {
                status: status.as_u16(),
                body,
            });
        }

        let token: String = decode_value(&body, "value")?;
        tracing::debug!(username = %credentials.username, "Opened management session");
        Ok(SessionToken::new(token))
    }

    async fn list_entities(&self, session: &SessionToken) -> Result<Vec<EntitySummary>> {
        let url = format!("{}/rest/vcenter/vm", self.base_url);

        let response = self
            .client
            .get(&url)
            .headers(Self::session_headers(session)?)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status != StatusCode::OK {
            return Err(ApiError::Query {
                status: status.as_u16(),
                body,
            });
        }

        decode_value(&body, "value")
    }

    async fn set_power(
        &self,
        session: &SessionToken,
        entity: &EntityId,
        action: PowerAction,
    ) -> Result<Ack> {
        let url = format!(
            "{}/rest/vcenter/vm/{}/power/{}",
            self.base_url,
            entity,
            action.endpoint_verb()
        );

        let response = self
            .client
            .post(&url)
            .headers(Self::session_headers(session)?)
            .send()
            .await?;

        let status = response.status().as_u16();
        if Ack::ACCEPTED_STATUSES.contains(&status) {
            tracing::debug!(entity = %entity, action = %action, status, "Power request accepted");
            return Ok(Ack { status });
        }

        let body = response.text().await.unwrap_or_default();
        Err(ApiError::PowerOp {
            entity: entity.clone(),
            status,
            body,
        })
    }

    async fn get_power_state(
        &self,
        session: &SessionToken,
        entity: &EntityId,
    ) -> Result<PowerState> {
        let url = format!("{}/rest/vcenter/vm/{}", self.base_url, entity);

        let response = self
            .client
            .get(&url)
            .headers(Self::session_headers(session)?)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status != StatusCode::OK {
            return Err(ApiError::Query {
                status: status.as_u16(),
                body,
            });
        }

        let info: VmInfo = decode_value(&body, "value.power_state")?;
        info.power_state.ok_or(ApiError::MissingField {
            field: "value.power_state",
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn vm(id: &str) -> EntityId {
        EntityId::new(id).unwrap()
    }

    fn session() -> SessionToken {
        SessionToken::new("session-abc")
    }

    #[test]
    fn trims_trailing_slash() {
        let client = VcenterClient::with_client(reqwest::Client::new(), "https://vc.local/");
        assert_eq!(client.base_url(), "https://vc.local");
    }

    #[test]
    fn decode_value_reports_missing_field() {
        let result: Result<String> = decode_value("{}", "value");
        assert!(matches!(
            result,
            Err(ApiError::MissingField { field: "value", .. })
        ));
    }

    #[tokio::test]
    async fn authenticate_returns_token() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/rest/com/vmware/cis/session"))
            .and(header_exists("authorization"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"value": "tok-1"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = VcenterClient::new(&ClientConfig::new(server.uri())).unwrap();
        let token = client
            .authenticate(&Credentials::new("admin", "secret"))
            .await
            .unwrap();

        assert_eq!(token.expose(), "tok-1");
    }

    #[tokio::test]
    async fn authenticate_rejects_non_ok_status() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/rest/com/vmware/cis/session"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad credentials"))
            .mount(&server)
            .await;

        let client = VcenterClient::new(&ClientConfig::new(server.uri())).unwrap();
        let result = client
            .authenticate(&Credentials::new("admin", "wrong"))
            .await;

        match result {
            Err(ApiError::Auth { status, body }) => {
                assert_eq!(status, 401);
                assert_eq!(body, "bad credentials");
            }
            other => panic!("expected auth error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn list_entities_sends_session_header() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/rest/vcenter/vm"))
            .and(header(SESSION_HEADER, "session-abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "value": [
                    {"vm": "vm-1001", "name": "load-01", "power_state": "POWERED_ON"},
                    {"vm": "vm-1002", "name": "load-02", "power_state": "POWERED_OFF"}
                ]
            })))
            .mount(&server)
            .await;

        let client = VcenterClient::new(&ClientConfig::new(server.uri())).unwrap();
        let vms = client.list_entities(&session()).await.unwrap();

        assert_eq!(vms.len(), 2);
        assert_eq!(vms[0].id, vm("vm-1001"));
        assert_eq!(vms[1].name, "load-02");
        assert_eq!(vms[1].power_state, Some(PowerState::Off));
    }

    #[tokio::test]
    async fn list_entities_maps_failure_to_query_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/rest/vcenter/vm"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = VcenterClient::new(&ClientConfig::new(server.uri())).unwrap();
        let result = client.list_entities(&session()).await;

        assert!(matches!(result, Err(ApiError::Query { status: 503, .. })));
    }

    #[tokio::test]
    async fn set_power_accepts_no_content_and_ok() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/rest/vcenter/vm/vm-1/power/start"))
            .and(header(SESSION_HEADER, "session-abc"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/rest/vcenter/vm/vm-1/power/stop"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = VcenterClient::new(&ClientConfig::new(server.uri())).unwrap();

        let on = client
            .set_power(&session(), &vm("vm-1"), PowerAction::On)
            .await
            .unwrap();
        assert!(on.is_no_content());

        let off = client
            .set_power(&session(), &vm("vm-1"), PowerAction::Off)
            .await
            .unwrap();
        assert_eq!(off.status, 200);
    }

    #[tokio::test]
    async fn set_power_rejection_carries_entity_and_body() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/rest/vcenter/vm/vm-2/power/start"))
            .respond_with(ResponseTemplate::new(400).set_body_string("already powered on"))
            .mount(&server)
            .await;

        let client = VcenterClient::new(&ClientConfig::new(server.uri())).unwrap();
        let result = client
            .set_power(&session(), &vm("vm-2"), PowerAction::On)
            .await;

        match result {
            Err(ApiError::PowerOp {
                entity,
                status,
                body,
            }) => {
                assert_eq!(entity, vm("vm-2"));
                assert_eq!(status, 400);
                assert_eq!(body, "already powered on");
            }
            other => panic!("expected power error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn get_power_state_decodes_state() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/rest/vcenter/vm/vm-3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "value": {"name": "load-03", "power_state": "SUSPENDED"}
            })))
            .mount(&server)
            .await;

        let client = VcenterClient::new(&ClientConfig::new(server.uri())).unwrap();
        let state = client
            .get_power_state(&session(), &vm("vm-3"))
            .await
            .unwrap();

        assert_eq!(state, PowerState::Suspended);
    }

    #[tokio::test]
    async fn get_power_state_missing_field_is_malformed() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/rest/vcenter/vm/vm-3"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"value": {"name": "load-03"}})),
            )
            .mount(&server)
            .await;

        let client = VcenterClient::new(&ClientConfig::new(server.uri())).unwrap();
        let result = client.get_power_state(&session(), &vm("vm-3")).await;

        assert!(matches!(
            result,
            Err(ApiError::MissingField {
                field: "value.power_state",
                ..
            })
        ));
    }

    #[tokio::test]
    async fn unreachable_server_is_transport_error() {
        let client = VcenterClient::new(&ClientConfig::new("http://127.0.0.1:1")).unwrap();
        let result = client
            .set_power(&session(), &vm("vm-1"), PowerAction::On)
            .await;

        assert!(result.unwrap_err().is_transport());
    }
}
