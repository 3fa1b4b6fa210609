//! Core types and utilities for power-cycle.
//!
//! This crate provides the foundational types shared by the API client and the
//! cycle controller:
//!
//! - **Identifiers**: `EntityId` for managed virtual machines and the opaque
//!   `SessionToken` returned by authentication
//! - **Power types**: `PowerState`, the `PowerAction` requests, and `EntitySummary` listing rows
//!
//! # Example
//!
//! ```
//! use power_cycle_core::{EntityId, PowerAction, PowerState};
//!
//! let vm: EntityId = "vm-1001".parse().unwrap();
//! assert_eq!(vm.as_str(), "vm-1001");
//! assert_eq!(PowerAction::On.target_state(), PowerState::On);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod ids;
pub mod power;

pub use error::{CoreError, Result};
pub use ids::{EntityId, IdError, SessionToken};
pub use power::{EntitySummary, PowerAction, PowerState};
