//! Best-effort release of everything a run provisioned
//!
//! Records are deleted in dependency order: by [`ResourceKind::cleanup_priority`],
//! then nested children before their parents. Every record gets exactly one
//! delete call. A failure is logged and recorded in the report, and the next
//! record is attempted regardless; teardown itself never fails.

use crate::provider::{CloudProvider, ResourceId, ResourceKind, ResourceState};
use crate::registry::ResourceRecord;
use crate::wait::{wait_until, Progress, WaitConfig};
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tracing::{debug, info, warn};

/// A record teardown acted on
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Released {
    pub kind: ResourceKind,
    pub id: ResourceId,
    pub label: String,
}

/// Teardown outcome
#[derive(Debug, Clone, Default, Serialize)]
pub struct TeardownReport {
    pub deleted: Vec<Released>,
    /// Delete said the resource no longer exists
    pub already_gone: Vec<Released>,
    pub failed: Vec<(Released, String)>,
    /// Deleted, but never confirmed gone within the settle budget
    pub unsettled: Vec<Released>,
}

impl TeardownReport {
    pub fn attempted(&self) -> usize {
        self.deleted.len() + self.already_gone.len() + self.failed.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.unsettled.is_empty()
    }

    pub fn merge(&mut self, other: TeardownReport) {
        self.deleted.extend(other.deleted);
        self.already_gone.extend(other.already_gone);
        self.failed.extend(other.failed);
        self.unsettled.extend(other.unsettled);
    }
}

/// Deletes records in dependency order, never stopping at the first failure
#[derive(Debug, Clone)]
pub struct TeardownCoordinator {
    settle: WaitConfig,
}

impl Default for TeardownCoordinator {
    fn default() -> Self {
        Self::new(WaitConfig::new(Duration::from_secs(10), Duration::from_secs(5 * 60)))
    }
}

impl TeardownCoordinator {
    /// `settle` bounds the wait for VMs and databases to disappear before
    /// the resources they were using are released
    pub fn new(settle: WaitConfig) -> Self {
        Self { settle }
    }

    pub async fn tear_down(
        &self,
        provider: &dyn CloudProvider,
        records: Vec<ResourceRecord>,
    ) -> TeardownReport {
        let mut report = TeardownReport::default();
        if records.is_empty() {
            return report;
        }

        let ordered = teardown_order(records);
        info!(count = ordered.len(), "Tearing down test resources");

        let mut by_priority: BTreeMap<u8, Vec<ResourceRecord>> = BTreeMap::new();
        for record in ordered {
            by_priority
                .entry(record.kind.cleanup_priority())
                .or_default()
                .push(record);
        }

        for (priority, group) in by_priority {
            debug!(priority, count = group.len(), "Releasing priority group");
            let mut settling = Vec::new();

            for record in group {
                if !record.is_owned() {
                    debug!(kind = %record.kind, id = %record.id, "Not owned by this run, leaving it");
                    continue;
                }
                let released = Released {
                    kind: record.kind,
                    id: record.id.clone(),
                    label: record.label.clone(),
                };

                match provider.delete(record.kind, &record.id).await {
                    Ok(()) => {
                        info!(kind = %record.kind, id = %record.id, label = %record.label, "Deleted");
                        if record.kind.settles() {
                            settling.push(released.clone());
                        }
                        report.deleted.push(released);
                    }
                    Err(e) if e.is_not_found() => {
                        debug!(kind = %record.kind, id = %record.id, "Already gone");
                        report.already_gone.push(released);
                    }
                    Err(e) => {
                        warn!(
                            kind = %record.kind,
                            id = %record.id,
                            label = %record.label,
                            error = %e,
                            "Failed to delete, continuing teardown"
                        );
                        report.failed.push((released, e.to_string()));
                    }
                }
            }

            for released in settling {
                if !self.settle_one(provider, &released).await {
                    report.unsettled.push(released);
                }
            }
        }

        if report.is_clean() {
            info!(released = report.attempted(), "Teardown complete");
        } else {
            warn!(
                failed = report.failed.len(),
                unsettled = report.unsettled.len(),
                "Teardown complete with leftovers"
            );
        }
        report
    }

    /// Wait for a deleted resource to be gone or terminal
    async fn settle_one(&self, provider: &dyn CloudProvider, released: &Released) -> bool {
        let what = format!("{} {} to go away", released.kind, released.id);
        let result = wait_until(&what, self.settle, || async move {
            let state = provider.get(released.kind, &released.id).await?.map(|d| d.state);
            Ok(match state {
                Some(s) if !is_gone(Some(&s)) => Progress::Waiting(s.to_string()),
                _ => Progress::Done(()),
            })
        })
        .await;

        match result {
            Ok(()) => true,
            Err(e) => {
                warn!(kind = %released.kind, id = %released.id, error = %e, "Resource did not settle");
                false
            }
        }
    }
}

/// Sort records so that dependents come before what they depend on
///
/// Ids are only unique within a kind, so records are tracked by position.
/// A `parent_id` resolves to another record with that id, whatever its kind.
pub fn teardown_order(records: Vec<ResourceRecord>) -> Vec<ResourceRecord> {
    let keys: Vec<(u8, Reverse<usize>)> = {
        let mut by_id: HashMap<&str, Vec<usize>> = HashMap::new();
        for (i, r) in records.iter().enumerate() {
            by_id.entry(r.id.as_str()).or_default().push(i);
        }
        let parent_of = |i: usize| -> Option<usize> {
            let parent = records[i].parent_id.as_deref()?;
            by_id.get(parent)?.iter().copied().find(|&j| j != i)
        };

        // Depth within the set being torn down; bounded walk in case of cycles
        let depth_of = |i: usize| -> usize {
            let mut depth = 0;
            let mut current = parent_of(i);
            while let Some(parent) = current {
                if depth >= records.len() {
                    break;
                }
                depth += 1;
                current = parent_of(parent);
            }
            depth
        };

        (0..records.len())
            .map(|i| (records[i].kind.cleanup_priority(), Reverse(depth_of(i))))
            .collect()
    };

    let mut keyed: Vec<_> = keys.into_iter().zip(records).collect();
    keyed.sort_by_key(|(key, _)| *key);
    keyed.into_iter().map(|(_, record)| record).collect()
}

/// State teardown treats as "gone"
pub fn is_gone(state: Option<&ResourceState>) -> bool {
    state.map(ResourceState::is_terminal).unwrap_or(true)
}
