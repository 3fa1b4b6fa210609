//! The batch cycle controller.
//!
//! A run authenticates once, lists entities once for display, then repeats:
//!
//! 1. power-on batch across every entity, fully joined
//! 2. dwell sleep
//! 3. power-off batch across every entity, fully joined
//! 4. interval sleep
//! 5. progress increment
//!
//! Per-entity failures are logged and counted but never abort a batch or
//! the run. Only setup failures are returned as errors.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use power_cycle_client::{Ack, ManagementApi};
use power_cycle_core::{EntityId, PowerAction, SessionToken};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::batch::{BatchExecutor, UnitOutcome};
use crate::config::CycleConfig;
use crate::error::{CycleError, Result};
use crate::report::{BatchReport, RunProgress, RunSummary};

/// Drives repeated power-on/power-off batches over a fixed entity set.
pub struct CycleController<'a> {
    api: Arc<dyn ManagementApi>,
    config: &'a CycleConfig,
    executor: BatchExecutor,
    progress: watch::Sender<RunProgress>,
}

impl<'a> CycleController<'a> {
    /// Create a controller.
    ///
    /// Cancelling `cancel` stops the run at the next batch boundary or sleep,
    /// and resolves any in-flight requests as cancelled.
    #[must_use]
    pub fn new(
        api: Arc<dyn ManagementApi>,
        config: &'a CycleConfig,
        cancel: CancellationToken,
    ) -> Self {
        let (progress, _) = watch::channel(RunProgress {
            completed: 0,
            target: config.iterations.target(),
        });

        Self {
            api,
            config,
            executor: BatchExecutor::new(cancel, config.unit_timeout()),
            progress,
        }
    }

    /// Subscribe to run progress.
    #[must_use]
    pub fn progress(&self) -> watch::Receiver<RunProgress> {
        self.progress.subscribe()
    }

    /// Run to completion or cancellation.
    ///
    /// # Errors
    ///
    /// Returns `CycleError::Authentication` or `CycleError::Listing` if setup
    /// fails. No power request is issued in that case.
    pub async fn run(&self) -> Result<RunSummary> {
        let session = Arc::new(self.setup().await?);
        let mut summary = RunSummary::default();

        tracing::info!(
            entities = self.config.entities.len(),
            iterations = %self.config.iterations,
            dwell_secs = self.config.dwell_seconds,
            interval_secs = self.config.interval_seconds,
            "Starting power cycle run"
        );

        while !self.config.iterations.is_reached(summary.iterations) {
            if self.cancellation().is_cancelled() {
                summary.cancelled = true;
                break;
            }

            let iteration = summary.iterations + 1;
            tracing::info!(iteration, at = %Utc::now().to_rfc3339(), "Iteration started");

            let on = self.run_batch(&session, PowerAction::On).await;
            summary.record(&on);
            if on.was_cancelled() || !self.pause(self.config.dwell()).await {
                summary.cancelled = true;
                break;
            }

            let off = self.run_batch(&session, PowerAction::Off).await;
            summary.record(&off);
            if off.was_cancelled() {
                summary.cancelled = true;
                break;
            }

            let interrupted = !self.pause(self.config.interval()).await;

            summary.iterations = iteration;
            self.progress.send_modify(|p| p.completed = iteration);
            let progress = *self.progress.borrow();
            tracing::info!(
                completed = iteration,
                progress = %progress,
                at = %Utc::now().to_rfc3339(),
                "Iteration complete"
            );

            if interrupted {
                summary.cancelled = true;
                break;
            }
        }

        tracing::info!(
            iterations = summary.iterations,
            failures = summary.total_failures(),
            cancelled = summary.cancelled,
            "Power cycle run finished"
        );

        Ok(summary)
    }

    /// Authenticate and list entities once.
    ///
    /// # Errors
    ///
    /// Returns `CycleError::Authentication` or `CycleError::Listing`.
    pub async fn setup(&self) -> Result<SessionToken> {
        let session = self
            .api
            .authenticate(&self.config.credentials)
            .await
            .map_err(CycleError::Authentication)?;

        let listing = self
            .api
            .list_entities(&session)
            .await
            .map_err(CycleError::Listing)?;

        tracing::info!(count = listing.len(), "Available entities");
        for entity in &listing {
            tracing::info!(id = %entity.id, name = %entity.name, "Entity");
        }

        let known: HashSet<&EntityId> = listing.iter().map(|e| &e.id).collect();
        for missing in self.config.entities.iter().filter(|e| !known.contains(e)) {
            tracing::warn!(entity = %missing, "Configured entity not present in listing");
        }

        Ok(session)
    }

    fn cancellation(&self) -> &CancellationToken {
        self.executor.cancellation()
    }

    /// Issue `action` for every entity concurrently and wait for all of them.
    async fn run_batch(&self, session: &Arc<SessionToken>, action: PowerAction) -> BatchReport {
        let started_at = Utc::now();
        let clock = tokio::time::Instant::now();

        let outcomes = self
            .executor
            .run(&self.config.entities, |entity| {
                let api = Arc::clone(&self.api);
                let session = Arc::clone(session);
                async move { api.set_power(&session, &entity, action).await }
            })
            .await;

        let report = BatchReport {
            action,
            started_at,
            elapsed: clock.elapsed(),
            outcomes,
        };

        for (entity, outcome) in &report.outcomes {
            log_outcome(entity, action, outcome);
        }

        tracing::info!(
            action = %action,
            succeeded = report.succeeded(),
            failed = report.failed(),
            elapsed_ms = u64::try_from(report.elapsed.as_millis()).unwrap_or(u64::MAX),
            "Batch joined"
        );

        report
    }

    /// Sleep for `duration`. Returns `false` if cancelled first.
    async fn pause(&self, duration: Duration) -> bool {
        if duration.is_zero() {
            return !self.cancellation().is_cancelled();
        }
        tokio::select! {
            () = self.cancellation().cancelled() => false,
            () = tokio::time::sleep(duration) => true,
        }
    }
}

fn log_outcome(entity: &EntityId, action: PowerAction, outcome: &UnitOutcome<Ack>) {
    match outcome {
        UnitOutcome::Succeeded(ack) => {
            tracing::info!(
                entity = %entity,
                action = %action,
                status = ack.status,
                "Request accepted"
            );
        }
        UnitOutcome::Failed(e) => {
            tracing::warn!(
                entity = %entity,
                action = %action,
                transport = e.is_transport(),
                error = %e,
                "Request failed"
            );
        }
        other => {
            tracing::warn!(
                entity = %entity,
                action = %action,
                outcome = %other,
                "Request did not complete"
            );
        }
    }
}
