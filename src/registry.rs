//! Label registry for provisioned and discovered test resources
//!
//! One [`LabelRegistry`] exists per resource kind. It maps labels to the
//! identifying data of a resource and is the source of truth for what the
//! run is responsible for tearing down.

use crate::labels;
use crate::provider::{ResourceDescriptor, ResourceId, ResourceKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// How a record came to exist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Origin {
    /// Created by this run; released at teardown
    Provisioned,
    /// Found in the account; owned by whatever was there before the run
    Discovered,
}

/// A labeled resource known to the harness
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub label: String,
    pub kind: ResourceKind,
    pub id: ResourceId,
    pub name: Option<String>,
    pub region: Option<String>,
    pub parent_id: Option<ResourceId>,
    pub owner: Option<String>,
    pub origin: Origin,
    pub registered_at: DateTime<Utc>,
}

impl ResourceRecord {
    pub fn provisioned(kind: ResourceKind, id: impl Into<ResourceId>) -> Self {
        Self {
            label: String::new(),
            kind,
            id: id.into(),
            name: None,
            region: None,
            parent_id: None,
            owner: None,
            origin: Origin::Provisioned,
            registered_at: Utc::now(),
        }
    }

    pub fn from_descriptor(descriptor: &ResourceDescriptor, origin: Origin) -> Self {
        Self {
            label: String::new(),
            kind: descriptor.kind,
            id: descriptor.id.clone(),
            name: descriptor.name.clone(),
            region: descriptor.region.clone(),
            parent_id: descriptor.parent_id.clone(),
            owner: descriptor.owner.clone(),
            origin,
            registered_at: Utc::now(),
        }
    }

    /// Whether teardown is responsible for this record
    pub fn is_owned(&self) -> bool {
        self.origin == Origin::Provisioned && !labels::is_stateless(&self.label)
    }
}

/// Label -> record map for one resource kind
///
/// Every check-then-insert happens under one lock so that label mangling on
/// collision stays correct if tests ever run concurrently.
#[derive(Clone)]
pub struct LabelRegistry {
    kind: ResourceKind,
    records: Arc<Mutex<BTreeMap<String, ResourceRecord>>>,
}

impl LabelRegistry {
    pub fn new(kind: ResourceKind) -> Self {
        Self {
            kind,
            records: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Get the record registered under `label`
    pub async fn get(&self, label: &str) -> Option<ResourceRecord> {
        let records = self.records.lock().await;
        records.get(label).cloned()
    }

    /// Find something a read-only test can use: the stateless record if one
    /// was already discovered, otherwise any record not slated for removal
    pub async fn get_for_stateless(&self) -> Option<ResourceRecord> {
        let records = self.records.lock().await;
        if let Some(record) = records.get(labels::STATELESS) {
            return Some(record.clone());
        }
        records
            .iter()
            .find(|(label, _)| !labels::is_removed(label))
            .map(|(_, record)| record.clone())
    }

    /// Register a record under `label`, returning it with its final label
    ///
    /// An occupied label is mangled by appending pseudo-random digits until a
    /// free one is found; existing records are never overwritten.
    pub async fn register(&self, label: &str, mut record: ResourceRecord) -> ResourceRecord {
        let mut records = self.records.lock().await;

        let mut candidate = label.to_string();
        while records.contains_key(&candidate) {
            candidate.push(char::from(b'0' + fastrand::u8(0..10)));
        }
        if candidate != label {
            debug!(kind = %self.kind, label, relabeled = %candidate, "Label taken, relabeled");
        }

        record.label = candidate.clone();
        records.insert(candidate, record.clone());
        record
    }

    /// Register a discovered record under [`labels::STATELESS`] unless one is
    /// already there, in which case the existing record wins
    pub async fn register_stateless(&self, mut record: ResourceRecord) -> ResourceRecord {
        let mut records = self.records.lock().await;
        if let Some(existing) = records.get(labels::STATELESS) {
            return existing.clone();
        }
        record.label = labels::STATELESS.to_string();
        record.origin = Origin::Discovered;
        records.insert(record.label.clone(), record.clone());
        record
    }

    /// Forget a record without touching the cloud
    pub async fn remove(&self, label: &str) -> Option<ResourceRecord> {
        let mut records = self.records.lock().await;
        records.remove(label)
    }

    /// Forget whichever record points at `id`
    pub async fn remove_id(&self, id: &str) -> Option<ResourceRecord> {
        let mut records = self.records.lock().await;
        let label = records
            .iter()
            .find(|(_, record)| record.id == id)
            .map(|(label, _)| label.clone())?;
        records.remove(&label)
    }

    /// Take every record this run owns out of the registry, leaving
    /// discovered ones in place
    pub async fn take_owned(&self) -> Vec<ResourceRecord> {
        let mut records = self.records.lock().await;
        let owned: Vec<String> = records
            .iter()
            .filter(|(_, record)| record.is_owned())
            .map(|(label, _)| label.clone())
            .collect();
        owned
            .into_iter()
            .filter_map(|label| records.remove(&label))
            .collect()
    }

    /// Take every owned record whose label marks it for removal
    pub async fn take_removed(&self) -> Vec<ResourceRecord> {
        let mut records = self.records.lock().await;
        let removed: Vec<String> = records
            .iter()
            .filter(|(label, record)| labels::is_removed(label) && record.is_owned())
            .map(|(label, _)| label.clone())
            .collect();
        removed
            .into_iter()
            .filter_map(|label| records.remove(&label))
            .collect()
    }

    pub async fn labels(&self) -> Vec<String> {
        let records = self.records.lock().await;
        records.keys().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }
}
