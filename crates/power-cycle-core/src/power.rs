//! Power state vocabulary and listing rows.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;
use crate::ids::EntityId;

/// Power state of a managed virtual machine.
///
/// `Suspended` only appears when reading state; requests use [`PowerAction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PowerState {
    /// The machine is powered on.
    #[serde(rename = "POWERED_ON")]
    On,
    /// The machine is powered off.
    #[serde(rename = "POWERED_OFF")]
    Off,
    /// The machine is suspended.
    #[serde(rename = "SUSPENDED")]
    Suspended,
}

impl PowerState {
    /// Returns the wire representation used by the management API.
    #[must_use]
    pub const fn as_wire(self) -> &'static str {
        match self {
            Self::On => "POWERED_ON",
            Self::Off => "POWERED_OFF",
            Self::Suspended => "SUSPENDED",
        }
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::On => "on",
            Self::Off => "off",
            Self::Suspended => "suspended",
        };
        f.write_str(label)
    }
}

impl FromStr for PowerState {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "POWERED_ON" | "ON" => Ok(Self::On),
            "POWERED_OFF" | "OFF" => Ok(Self::Off),
            "SUSPENDED" => Ok(Self::Suspended),
            _ => Err(CoreError::UnknownPowerState(s.to_string())),
        }
    }
}

/// A requested power transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerAction {
    /// Power the machine on.
    On,
    /// Power the machine off.
    Off,
}

impl PowerAction {
    /// Returns the other action of the cycle.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::On => Self::Off,
            Self::Off => Self::On,
        }
    }

    /// Returns the state the machine is expected to reach.
    #[must_use]
    pub const fn target_state(self) -> PowerState {
        match self {
            Self::On => PowerState::On,
            Self::Off => PowerState::Off,
        }
    }

    /// Returns the verb used in the power endpoint path.
    #[must_use]
    pub const fn endpoint_verb(self) -> &'static str {
        match self {
            Self::On => "start",
            Self::Off => "stop",
        }
    }
}

impl fmt::Display for PowerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::On => f.write_str("power-on"),
            Self::Off => f.write_str("power-off"),
        }
    }
}

/// One row of the entity listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySummary {
    /// Identifier of the machine.
    #[serde(rename = "vm")]
    pub id: EntityId,
    /// Display name of the machine.
    pub name: String,
    /// Power state, when the listing includes it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power_state: Option<PowerState>,
}
