//! Run configuration.
//!
//! A `CycleConfig` is built once at startup, validated, and then only read.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use power_cycle_client::{ClientConfig, Credentials, VcenterClient};
use power_cycle_core::EntityId;
use serde::Deserialize;

use crate::error::{CycleError, Result};

/// How many iterations a run performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "IterationsRepr")]
pub enum Iterations {
    /// Stop after this many completed iterations.
    Bounded(u64),
    /// Run until cancelled.
    Unbounded,
}

impl Iterations {
    /// Returns the target count, or `None` for an unbounded run.
    #[must_use]
    pub const fn target(self) -> Option<u64> {
        match self {
            Self::Bounded(n) => Some(n),
            Self::Unbounded => None,
        }
    }

    /// Returns `true` once `completed` iterations satisfy the target.
    #[must_use]
    pub const fn is_reached(self, completed: u64) -> bool {
        match self {
            Self::Bounded(n) => completed >= n,
            Self::Unbounded => false,
        }
    }
}

impl fmt::Display for Iterations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bounded(n) => write!(f, "{n}"),
            Self::Unbounded => f.write_str("unbounded"),
        }
    }
}

impl FromStr for Iterations {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("unbounded") {
            return Ok(Self::Unbounded);
        }
        s.parse::<u64>()
            .map(Self::Bounded)
            .map_err(|_| format!("expected a count or \"unbounded\", got {s:?}"))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IterationsRepr {
    Count(u64),
    Word(String),
}

impl TryFrom<IterationsRepr> for Iterations {
    type Error = String;

    fn try_from(value: IterationsRepr) -> std::result::Result<Self, Self::Error> {
        match value {
            IterationsRepr::Count(n) => Ok(Self::Bounded(n)),
            IterationsRepr::Word(word) => word.parse(),
        }
    }
}

/// Configuration for a power cycling run.
#[derive(Debug, Clone, Deserialize)]
pub struct CycleConfig {
    /// Base address of the management API.
    pub server_url: String,

    /// Authentication input.
    pub credentials: Credentials,

    /// The fixed working set, in display order.
    #[serde(default)]
    pub entities: Vec<EntityId>,

    /// Wait after the power-on batch before powering off.
    #[serde(default = "CycleConfig::default_dwell")]
    pub dwell_seconds: u64,

    /// Wait after the power-off batch before the next iteration.
    #[serde(default = "CycleConfig::default_interval")]
    pub interval_seconds: u64,

    /// Stop condition.
    #[serde(default = "CycleConfig::default_iterations")]
    pub iterations: Iterations,

    /// Upper bound on a single power request, including queueing.
    #[serde(default = "CycleConfig::default_unit_timeout")]
    pub unit_timeout_seconds: u64,

    /// HTTP request timeout passed to the client.
    #[serde(default = "CycleConfig::default_request_timeout")]
    pub request_timeout_seconds: u64,

    /// Skip TLS certificate verification.
    #[serde(default)]
    pub accept_invalid_certs: bool,
}

impl CycleConfig {
    const fn default_dwell() -> u64 {
        60
    }

    const fn default_interval() -> u64 {
        10
    }

    const fn default_iterations() -> Iterations {
        Iterations::Bounded(3000)
    }

    const fn default_unit_timeout() -> u64 {
        60
    }

    const fn default_request_timeout() -> u64 {
        30
    }

    /// Create a configuration with default pacing for the given server and entities.
    #[must_use]
    pub fn new(
        server_url: impl Into<String>,
        credentials: Credentials,
        entities: Vec<EntityId>,
    ) -> Self {
        Self {
            server_url: server_url.into(),
            credentials,
            entities,
            dwell_seconds: Self::default_dwell(),
            interval_seconds: Self::default_interval(),
            iterations: Self::default_iterations(),
            unit_timeout_seconds: Self::default_unit_timeout(),
            request_timeout_seconds: Self::default_request_timeout(),
            accept_invalid_certs: false,
        }
    }

    /// Parse a configuration from a JSON file without validating it.
    ///
    /// # Errors
    ///
    /// Returns `CycleError::InvalidConfig` if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            CycleError::InvalidConfig(format!("cannot read {}: {e}", path.display()))
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            CycleError::InvalidConfig(format!("cannot parse {}: {e}", path.display()))
        })
    }

    /// Load a configuration from a JSON file and validate it.
    ///
    /// # Errors
    ///
    /// Returns `CycleError::InvalidConfig` if the file cannot be read, parsed, or validated.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let config = Self::load(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for inconsistencies.
    ///
    /// # Errors
    ///
    /// Returns `CycleError::InvalidConfig` describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        let url = self.server_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(CycleError::InvalidConfig(format!(
                "server_url must start with http:// or https://, got {url:?}"
            )));
        }
        if self.credentials.username.trim().is_empty() {
            return Err(CycleError::InvalidConfig(
                "credentials.username must not be empty".to_string(),
            ));
        }
        if self.unit_timeout_seconds == 0 {
            return Err(CycleError::InvalidConfig(
                "unit_timeout_seconds must be greater than zero".to_string(),
            ));
        }
        let mut seen = HashSet::with_capacity(self.entities.len());
        for entity in &self.entities {
            if !seen.insert(entity) {
                return Err(CycleError::InvalidConfig(format!(
                    "entity {entity} is listed more than once"
                )));
            }
        }
        Ok(())
    }

    /// Get the dwell duration.
    #[must_use]
    pub const fn dwell(&self) -> Duration {
        Duration::from_secs(self.dwell_seconds)
    }

    /// Get the interval duration.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }

    /// Get the per-unit timeout.
    #[must_use]
    pub const fn unit_timeout(&self) -> Duration {
        Duration::from_secs(self.unit_timeout_seconds)
    }

    /// Derive the HTTP client configuration.
    #[must_use]
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            request_timeout_seconds: self.request_timeout_seconds,
            accept_invalid_certs: self.accept_invalid_certs,
            ..ClientConfig::new(self.server_url.trim())
        }
    }

    /// Build the HTTP management client for this configuration.
    ///
    /// # Errors
    ///
    /// Returns `CycleError::Client` if the HTTP client cannot be built.
    pub fn connect(&self) -> Result<VcenterClient> {
        Ok(VcenterClient::new(&self.client_config())?)
    }
}
