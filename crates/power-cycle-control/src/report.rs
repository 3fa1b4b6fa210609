//! Batch reports, run progress, and run summaries.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use power_cycle_client::Ack;
use power_cycle_core::{EntityId, PowerAction};
use serde::Serialize;

use crate::batch::UnitOutcome;

/// Per-entity results of one batch.
#[derive(Debug, Clone)]
pub struct BatchReport {
    /// Direction of the batch.
    pub action: PowerAction,
    /// When the batch was dispatched.
    pub started_at: DateTime<Utc>,
    /// Time from dispatch to full join.
    pub elapsed: Duration,
    /// Outcomes in working-set order.
    pub outcomes: Vec<(EntityId, UnitOutcome<Ack>)>,
}

impl BatchReport {
    /// Number of accepted requests.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| o.is_success()).count()
    }

    /// Number of requests that did not succeed, for any reason.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    /// Entities whose request did not succeed, with the outcome.
    pub fn failures(&self) -> impl Iterator<Item = (&EntityId, &UnitOutcome<Ack>)> {
        self.outcomes
            .iter()
            .filter(|(_, o)| !o.is_success())
            .map(|(e, o)| (e, o))
    }

    /// Returns `true` if any unit was cut short by cancellation.
    #[must_use]
    pub fn was_cancelled(&self) -> bool {
        self.outcomes.iter().any(|(_, o)| o.is_cancelled())
    }
}

/// Running totals for one direction across a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchTotals {
    /// Batches dispatched.
    pub batches: u64,
    /// Accepted requests.
    pub succeeded: u64,
    /// Requests that did not succeed.
    pub failed: u64,
}

impl BatchTotals {
    fn record(&mut self, report: &BatchReport) {
        self.batches += 1;
        self.succeeded += report.succeeded() as u64;
        self.failed += report.failed() as u64;
    }
}

/// Completed iterations out of an optional target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunProgress {
    /// Iterations fully completed.
    pub completed: u64,
    /// Configured count, or `None` when unbounded.
    pub target: Option<u64>,
}

impl fmt::Display for RunProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.target {
            Some(target) => write!(f, "{}/{target}", self.completed),
            None => write!(f, "{}/unbounded", self.completed),
        }
    }
}

/// Outcome of a whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Iterations fully completed.
    pub iterations: u64,
    /// Power-on totals.
    pub power_on: BatchTotals,
    /// Power-off totals.
    pub power_off: BatchTotals,
    /// Whether the run stopped because it was cancelled.
    pub cancelled: bool,
}

impl RunSummary {
    /// Fold a batch report into the totals.
    pub fn record(&mut self, report: &BatchReport) {
        match report.action {
            PowerAction::On => self.power_on.record(report),
            PowerAction::Off => self.power_off.record(report),
        }
    }

    /// Total failed requests in both directions.
    #[must_use]
    pub const fn total_failures(&self) -> u64 {
        self.power_on.failed + self.power_off.failed
    }
}
