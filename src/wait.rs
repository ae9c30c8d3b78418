//! Bounded polling for resource state transitions
//!
//! Every "wait until the VM is running / the volume is available / the
//! image is gone" loop in the harness goes through [`wait_until`]. Each poll
//! is followed by a fixed sleep, and the whole wait has a hard wall-clock
//! budget after which it fails with [`DaseinError::Timeout`]. The budget
//! also bounds a single poll that hangs. Nothing here cancels the underlying
//! cloud operation; timing out only stops waiting.

use crate::error::{DaseinError, Result};
use crate::provider::{ResourceKind, ResourceState};
use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Polling interval and wall-clock budget for one wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitConfig {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            timeout: Duration::from_secs(5 * 60),
        }
    }
}

impl WaitConfig {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }
}

/// Wall-clock budgets observed for real providers
pub fn default_budget(kind: ResourceKind) -> Duration {
    let minutes = |m: u64| Duration::from_secs(m * 60);
    match kind {
        ResourceKind::VirtualMachine
        | ResourceKind::MachineImage
        | ResourceKind::Snapshot
        | ResourceKind::Database => minutes(20),
        ResourceKind::Volume => minutes(10),
        _ => minutes(5),
    }
}

/// Poll interval plus a timeout per resource kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitBudgets {
    pub interval: Duration,
    pub default: Duration,
    overrides: BTreeMap<ResourceKind, Duration>,
}

impl Default for WaitBudgets {
    fn default() -> Self {
        let mut budgets = Self::uniform(Duration::from_secs(15), default_budget(ResourceKind::Vlan));
        for kind in ResourceKind::ALL {
            if default_budget(kind) != budgets.default {
                budgets.overrides.insert(kind, default_budget(kind));
            }
        }
        budgets
    }
}

impl WaitBudgets {
    /// Same timeout for every kind
    pub fn uniform(interval: Duration, timeout: Duration) -> Self {
        Self {
            interval,
            default: timeout,
            overrides: BTreeMap::new(),
        }
    }

    pub fn with_budget(mut self, kind: ResourceKind, timeout: Duration) -> Self {
        self.overrides.insert(kind, timeout);
        self
    }

    pub fn for_kind(&self, kind: ResourceKind) -> WaitConfig {
        let timeout = self.overrides.get(&kind).copied().unwrap_or(self.default);
        WaitConfig::new(self.interval, timeout)
    }
}

/// Result of one poll
#[derive(Debug, Clone, PartialEq)]
pub enum Progress<T> {
    /// Condition met
    Done(T),
    /// Not yet; carries the observed state for the timeout message
    Waiting(String),
    /// Reached a state that will never change; stop now
    Stuck(String),
}

/// Poll `check` until it reports [`Progress::Done`], or fail after `config.timeout`.
///
/// A failing check counts as "not yet": providers routinely error on a
/// resource that is mid-transition, so the error is logged and polling
/// continues until the budget runs out.
pub async fn wait_until<T, F, Fut>(what: &str, config: WaitConfig, mut check: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Progress<T>>>,
{
    let start = Instant::now();
    let mut attempts = 0u32;
    let mut last_state = "never observed".to_string();

    loop {
        attempts += 1;
        let remaining = config.timeout.saturating_sub(start.elapsed());
        let Ok(polled) = tokio::time::timeout(remaining, check()).await else {
            warn!(what, attempts, "Check did not return within the wait budget");
            return Err(DaseinError::Timeout {
                what: what.to_string(),
                waited: start.elapsed(),
                attempts,
                last_state: format!("check still running ({})", last_state),
            });
        };
        match polled {
            Ok(Progress::Done(value)) => {
                debug!(
                    what,
                    attempts,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Wait complete"
                );
                return Ok(value);
            }
            Ok(Progress::Waiting(state)) => {
                debug!(what, attempts, state = %state, "Not there yet");
                last_state = state;
            }
            Ok(Progress::Stuck(state)) => {
                warn!(what, attempts, state = %state, "Reached a terminal state, giving up");
                return Err(DaseinError::TerminalState {
                    what: what.to_string(),
                    attempts,
                    state,
                });
            }
            Err(e) => {
                warn!(what, attempts, error = %e, "Check failed while waiting, will retry");
                last_state = format!("check failed: {}", e);
            }
        }

        let elapsed = start.elapsed();
        if elapsed + config.interval > config.timeout {
            return Err(DaseinError::Timeout {
                what: what.to_string(),
                waited: elapsed,
                attempts,
                last_state,
            });
        }
        tokio::time::sleep(config.interval).await;
    }
}

/// Poll a resource state until it equals `target`.
///
/// A terminal state other than the target ends the wait early.
pub async fn await_state<F, Fut>(
    what: &str,
    target: ResourceState,
    config: WaitConfig,
    mut poll: F,
) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<ResourceState>>,
{
    wait_until(what, config, || {
        let fut = poll();
        let target = target.clone();
        async move {
            let state = fut.await?;
            Ok(if state == target {
                Progress::Done(())
            } else if state.is_terminal() {
                Progress::Stuck(state.to_string())
            } else {
                Progress::Waiting(state.to_string())
            })
        }
    })
    .await
}
