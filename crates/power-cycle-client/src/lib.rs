//! Management API client for power-cycle.
//!
//! This crate translates the four operations the cycle controller needs
//! (authenticate, list entities, set power, read power state) into
//! authenticated HTTP calls and maps responses into [`ApiError`].
//!
//! # Usage
//!
//! ```no_run
//! use power_cycle_client::{ClientConfig, Credentials, ManagementApi, VcenterClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = VcenterClient::new(&ClientConfig::new("https://vcenter.lab.local"))?;
//! let session = client
//!     .authenticate(&Credentials::new("administrator@vsphere.local", "secret"))
//!     .await?;
//!
//! for vm in client.list_entities(&session).await? {
//!     println!("{} {}", vm.id, vm.name);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Calls are never retried. Callers should treat a missing acknowledgement as
//! an unknown final state.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod api;
pub mod config;
pub mod error;
#[cfg(any(test, feature = "test-utils"))]
pub mod mock;
pub mod vcenter;

pub use api::{Ack, ManagementApi};
pub use config::{ClientConfig, Credentials};
pub use error::{ApiError, Result};
pub use vcenter::{VcenterClient, SESSION_HEADER};

#[cfg(any(test, feature = "test-utils"))]
pub use mock::{CallPhase, MockManagementApi, PowerCall, MOCK_TOKEN};
