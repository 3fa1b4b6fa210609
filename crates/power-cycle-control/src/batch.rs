//! Concurrent fan-out with a full join.
//!
//! [`BatchExecutor::run`] starts one task per entity on a fresh `JoinSet`,
//! waits for every task to reach a terminal outcome, and returns the outcomes
//! in working-set order. Each unit is bounded by a timeout and observes a
//! shared cancellation token. The `JoinSet` is dropped when the call returns,
//! so no task outlives its batch.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::time::Duration;

use power_cycle_client::ApiError;
use power_cycle_core::EntityId;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Terminal outcome of one unit of work.
#[derive(Debug, Clone)]
pub enum UnitOutcome<T> {
    /// The call returned successfully.
    Succeeded(T),
    /// The call returned an error.
    Failed(ApiError),
    /// The call did not finish within the unit timeout.
    TimedOut(Duration),
    /// The run was cancelled before the call finished.
    Cancelled,
    /// The task running the call panicked.
    Panicked(String),
}

impl<T> UnitOutcome<T> {
    /// Returns `true` for `Succeeded`.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded(_))
    }

    /// Returns `true` for `Cancelled`.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl<T> fmt::Display for UnitOutcome<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded(_) => f.write_str("ok"),
            Self::Failed(e) => write!(f, "{e}"),
            Self::TimedOut(limit) => write!(f, "timed out after {}s", limit.as_secs_f64()),
            Self::Cancelled => f.write_str("cancelled"),
            Self::Panicked(msg) => write!(f, "worker panicked: {msg}"),
        }
    }
}

/// Runs one unit of work per entity concurrently and joins them all.
#[derive(Debug, Clone)]
pub struct BatchExecutor {
    cancel: CancellationToken,
    unit_timeout: Duration,
}

impl BatchExecutor {
    /// Create an executor bound to a cancellation token and per-unit timeout.
    #[must_use]
    pub const fn new(cancel: CancellationToken, unit_timeout: Duration) -> Self {
        Self {
            cancel,
            unit_timeout,
        }
    }

    /// The token that aborts in-flight units.
    #[must_use]
    pub const fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// The per-unit timeout.
    #[must_use]
    pub const fn unit_timeout(&self) -> Duration {
        self.unit_timeout
    }

    /// Run `work` once for every entity and wait for all of them.
    ///
    /// Fan-out equals `entities.len()`. A failure, timeout, or panic in one
    /// unit never affects the others. Units still running when the token is
    /// cancelled resolve to `Cancelled`; units not yet polled never issue
    /// their call.
    pub async fn run<T, F, Fut>(
        &self,
        entities: &[EntityId],
        work: F,
    ) -> Vec<(EntityId, UnitOutcome<T>)>
    where
        T: Send + 'static,
        F: Fn(EntityId) -> Fut,
        Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
    {
        let mut set = JoinSet::new();
        let mut owners = HashMap::with_capacity(entities.len());

        for (index, entity) in entities.iter().enumerate() {
            let unit = work(entity.clone());
            let cancel = self.cancel.clone();
            let limit = self.unit_timeout;

            let handle = set.spawn(async move {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => UnitOutcome::Cancelled,
                    result = tokio::time::timeout(limit, unit) => match result {
                        Ok(Ok(value)) => UnitOutcome::Succeeded(value),
                        Ok(Err(e)) => UnitOutcome::Failed(e),
                        Err(_) => UnitOutcome::TimedOut(limit),
                    },
                }
            });
            owners.insert(handle.id(), index);
        }

        let mut slots: Vec<Option<UnitOutcome<T>>> = entities.iter().map(|_| None).collect();

        while let Some(joined) = set.join_next_with_id().await {
            let (id, outcome) = match joined {
                Ok((id, outcome)) => (id, outcome),
                Err(e) => {
                    let id = e.id();
                    let outcome = if e.is_panic() {
                        let payload = e.into_panic();
                        UnitOutcome::Panicked(panic_message(payload.as_ref()))
                    } else {
                        UnitOutcome::Cancelled
                    };
                    (id, outcome)
                }
            };
            if let Some(&index) = owners.get(&id) {
                slots[index] = Some(outcome);
            }
        }

        entities
            .iter()
            .cloned()
            .zip(slots)
            .map(|(entity, slot)| (entity, slot.unwrap_or(UnitOutcome::Cancelled)))
            .collect()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn entities(n: usize) -> Vec<EntityId> {
        (1..=n)
            .map(|i| EntityId::new(format!("vm-{i}")).unwrap())
            .collect()
    }

    fn executor(timeout: Duration) -> BatchExecutor {
        BatchExecutor::new(CancellationToken::new(), timeout)
    }

    #[tokio::test]
    async fn outcomes_follow_working_set_order() {
        let set = entities(4);
        let outcomes = executor(Duration::from_secs(5))
            .run(&set, |entity| async move {
                // Later entities finish first.
                let n: u64 = entity.as_str()[3..].parse().unwrap();
                tokio::time::sleep(Duration::from_millis(40 - n * 10)).await;
                Ok::<_, ApiError>(n)
            })
            .await;

        let ids: Vec<&str> = outcomes.iter().map(|(e, _)| e.as_str()).collect();
        assert_eq!(ids, ["vm-1", "vm-2", "vm-3", "vm-4"]);
        assert!(outcomes.iter().all(|(_, o)| o.is_success()));
    }

    #[tokio::test]
    async fn empty_set_joins_immediately() {
        let outcomes = executor(Duration::from_secs(1))
            .run(&[], |_| async { Ok::<_, ApiError>(()) })
            .await;
        assert!(outcomes.is_empty());
    }

    #[tokio::test]
    async fn failure_is_isolated() {
        let set = entities(3);
        let outcomes = executor(Duration::from_secs(5))
            .run(&set, |entity| async move {
                if entity.as_str() == "vm-2" {
                    Err(ApiError::Transport("reset".to_string()))
                } else {
                    Ok(())
                }
            })
            .await;

        assert!(outcomes[0].1.is_success());
        assert!(matches!(outcomes[1].1, UnitOutcome::Failed(ref e) if e.is_transport()));
        assert!(outcomes[2].1.is_success());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_unit_times_out_alone() {
        let set = entities(2);
        let outcomes = executor(Duration::from_secs(10))
            .run(&set, |entity| async move {
                if entity.as_str() == "vm-1" {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                }
                Ok::<_, ApiError>(())
            })
            .await;

        assert!(matches!(outcomes[0].1, UnitOutcome::TimedOut(d) if d == Duration::from_secs(10)));
        assert!(outcomes[1].1.is_success());
    }

    #[tokio::test]
    async fn panic_is_attributed_to_its_entity() {
        let set = entities(2);
        let outcomes = executor(Duration::from_secs(5))
            .run(&set, |entity| async move {
                assert!(entity.as_str() != "vm-2", "boom");
                Ok::<_, ApiError>(())
            })
            .await;

        assert!(outcomes[0].1.is_success());
        assert!(matches!(outcomes[1].1, UnitOutcome::Panicked(ref msg) if msg.contains("boom")));
    }

    #[tokio::test]
    async fn cancelled_token_skips_every_call() {
        let calls = Arc::new(AtomicUsize::new(0));
        let exec = executor(Duration::from_secs(5));
        exec.cancellation().cancel();

        let set = entities(3);
        let outcomes = exec
            .run(&set, |_| {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, ApiError>(())
                }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(outcomes.iter().all(|(_, o)| o.is_cancelled()));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_interrupts_in_flight_units() {
        let exec = executor(Duration::from_secs(600));
        let token = exec.cancellation().clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            token.cancel();
        });

        let set = entities(2);
        let outcomes = exec
            .run(&set, |_| async {
                tokio::time::sleep(Duration::from_secs(300)).await;
                Ok::<_, ApiError>(())
            })
            .await;

        assert!(outcomes.iter().all(|(_, o)| o.is_cancelled()));
    }
}
