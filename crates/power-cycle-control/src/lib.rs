//! Batch cycle controller for power-cycle.
//!
//! This crate drives repeated, synchronized power-on/power-off batches over a
//! fixed set of virtual machines to generate sustained load on a
//! virtualization management API.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      CycleController                        │
//! │   setup: authenticate ─► list entities (display only)       │
//! │   loop:  on-batch ─► dwell ─► off-batch ─► interval ─► +1   │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       BatchExecutor                          │
//! │   one task per entity, full join, per-unit timeout,         │
//! │   shared cancellation token                                 │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//!                   Arc<dyn ManagementApi>
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use power_cycle_client::{Credentials, ManagementApi};
//! use power_cycle_control::{CycleConfig, CycleController};
//! use power_cycle_core::EntityId;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = CycleConfig::new(
//!     "https://vcenter.lab.local",
//!     Credentials::new("administrator@vsphere.local", "secret"),
//!     vec![EntityId::new("vm-1001")?, EntityId::new("vm-1002")?],
//! );
//! config.validate()?;
//!
//! let api: Arc<dyn ManagementApi> = Arc::new(config.connect()?);
//! let summary = CycleController::new(api, &config, CancellationToken::new())
//!     .run()
//!     .await?;
//!
//! println!("completed {} iterations", summary.iterations);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod batch;
pub mod config;
pub mod controller;
pub mod error;
pub mod report;

pub use batch::{BatchExecutor, UnitOutcome};
pub use config::{CycleConfig, Iterations};
pub use controller::CycleController;
pub use error::{CycleError, Result};
pub use report::{BatchReport, BatchTotals, RunProgress, RunSummary};

// Re-export commonly used types from dependencies for convenience
pub use power_cycle_client::{ApiError, Credentials, ManagementApi};
pub use power_cycle_core::{EntityId, PowerAction, PowerState};
