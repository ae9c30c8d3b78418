//! In-memory simulated cloud
//!
//! Implements [`CloudProvider`] over a map of descriptors. It is what the
//! CLI runs against when `provider.name = "memory"`, and what the harness's
//! own tests use as a recording stub: every create and delete is counted,
//! and failures, missing capabilities and slow state transitions can be
//! injected.

use crate::error::{DaseinError, Result};
use crate::provider::*;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

pub const PROVIDER_NAME: &str = "memory";

/// Simulated provider
pub struct InMemoryProvider {
    provider_name: String,
    cloud_name: String,
    region: String,
    unsupported: HashSet<ResourceKind>,
    unknown: HashSet<ResourceKind>,
    unsubscribed: HashSet<ResourceKind>,
    fail_create: HashSet<ResourceKind>,
    fail_list: HashSet<ResourceKind>,
    pending_polls: u32,
    state: Mutex<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    resources: BTreeMap<ResourceId, ResourceDescriptor>,
    /// Remaining `get` calls before a pending resource becomes available
    pending: HashMap<ResourceId, u32>,
    next_id: u64,
    create_calls: HashMap<ResourceKind, usize>,
    delete_calls: Vec<(ResourceKind, ResourceId)>,
    fail_delete_kinds: HashSet<ResourceKind>,
    fail_delete_ids: HashSet<ResourceId>,
    closed: usize,
}

/// Builder for [`InMemoryProvider`]
#[derive(Default)]
pub struct InMemoryProviderBuilder {
    provider_name: Option<String>,
    cloud_name: Option<String>,
    region: Option<String>,
    unsupported: HashSet<ResourceKind>,
    unknown: HashSet<ResourceKind>,
    unsubscribed: HashSet<ResourceKind>,
    fail_create: HashSet<ResourceKind>,
    fail_delete: HashSet<ResourceKind>,
    fail_list: HashSet<ResourceKind>,
    pending_polls: u32,
}

impl InMemoryProviderBuilder {
    pub fn names(mut self, provider: impl Into<String>, cloud: impl Into<String>) -> Self {
        self.provider_name = Some(provider.into());
        self.cloud_name = Some(cloud.into());
        self
    }

    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Report `kind` as unsupported up front
    pub fn unsupported(mut self, kind: ResourceKind) -> Self {
        self.unsupported.insert(kind);
        self
    }

    /// Report `kind` as [`Capability::Unknown`] and fail creates with a typed
    /// unsupported error, like a provider that only finds out by trying
    pub fn unsupported_on_create(mut self, kind: ResourceKind) -> Self {
        self.unknown.insert(kind);
        self
    }

    pub fn unsubscribed(mut self, kind: ResourceKind) -> Self {
        self.unsubscribed.insert(kind);
        self
    }

    pub fn fail_create(mut self, kind: ResourceKind) -> Self {
        self.fail_create.insert(kind);
        self
    }

    pub fn fail_delete(mut self, kind: ResourceKind) -> Self {
        self.fail_delete.insert(kind);
        self
    }

    pub fn fail_list(mut self, kind: ResourceKind) -> Self {
        self.fail_list.insert(kind);
        self
    }

    /// New resources stay pending for `polls` `get` calls
    pub fn pending_polls(mut self, polls: u32) -> Self {
        self.pending_polls = polls;
        self
    }

    pub fn build(self) -> InMemoryProvider {
        InMemoryProvider {
            provider_name: self.provider_name.unwrap_or_else(|| PROVIDER_NAME.to_string()),
            cloud_name: self.cloud_name.unwrap_or_else(|| "simulated".to_string()),
            region: self.region.unwrap_or_else(|| "sim-region-1".to_string()),
            unsupported: self.unsupported,
            unknown: self.unknown,
            unsubscribed: self.unsubscribed,
            fail_create: self.fail_create,
            fail_list: self.fail_list,
            pending_polls: self.pending_polls,
            state: Mutex::new(MemoryState {
                fail_delete_kinds: self.fail_delete,
                ..Default::default()
            }),
        }
    }
}

impl InMemoryProvider {
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> InMemoryProviderBuilder {
        InMemoryProviderBuilder::default()
    }

    /// Put a resource into the account as if it existed before the run
    pub async fn seed(&self, descriptor: ResourceDescriptor) {
        let mut state = self.state.lock().await;
        state.resources.insert(descriptor.id.clone(), descriptor);
    }

    /// Make every future delete of `id` fail
    pub async fn fail_delete_id(&self, id: impl Into<ResourceId>) {
        let mut state = self.state.lock().await;
        state.fail_delete_ids.insert(id.into());
    }

    pub async fn create_count(&self, kind: ResourceKind) -> usize {
        let state = self.state.lock().await;
        state.create_calls.get(&kind).copied().unwrap_or(0)
    }

    pub async fn total_create_count(&self) -> usize {
        let state = self.state.lock().await;
        state.create_calls.values().sum()
    }

    /// Every delete call in order, including failed ones
    pub async fn delete_calls(&self) -> Vec<(ResourceKind, ResourceId)> {
        let state = self.state.lock().await;
        state.delete_calls.clone()
    }

    pub async fn contains(&self, id: &str) -> bool {
        let state = self.state.lock().await;
        state.resources.contains_key(id)
    }

    pub async fn resource_count(&self) -> usize {
        let state = self.state.lock().await;
        state.resources.len()
    }

    pub async fn close_count(&self) -> usize {
        self.state.lock().await.closed
    }

    fn error(&self, message: impl Into<String>) -> DaseinError {
        DaseinError::provider(self.provider_name.clone(), message)
    }
}

impl Default for InMemoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryState {
    fn children_of(&self, id: &str) -> usize {
        self.resources
            .values()
            .filter(|r| r.parent_id.as_deref() == Some(id))
            .count()
    }

    fn snapshot(&self, descriptor: &ResourceDescriptor) -> ResourceDescriptor {
        let mut out = descriptor.clone();
        if out.is_container {
            out.child_count = Some(self.children_of(&out.id));
        }
        out
    }
}

#[async_trait]
impl CloudProvider for InMemoryProvider {
    fn provider_name(&self) -> String {
        self.provider_name.clone()
    }

    fn cloud_name(&self) -> String {
        self.cloud_name.clone()
    }

    fn supports(&self, kind: ResourceKind) -> Capability {
        if self.unsupported.contains(&kind) {
            Capability::Unsupported
        } else if self.unknown.contains(&kind) {
            Capability::Unknown
        } else {
            Capability::Supported
        }
    }

    async fn is_subscribed(&self, kind: ResourceKind) -> Result<bool> {
        Ok(!self.unsubscribed.contains(&kind) && !self.unsupported.contains(&kind))
    }

    async fn create(&self, kind: ResourceKind, params: &ProvisionParams) -> Result<ResourceId> {
        let mut state = self.state.lock().await;
        *state.create_calls.entry(kind).or_insert(0) += 1;

        if self.unsupported.contains(&kind) || self.unknown.contains(&kind) {
            return Err(DaseinError::Unsupported { kind });
        }
        if self.unsubscribed.contains(&kind) {
            return Err(DaseinError::NotSubscribed { kind });
        }
        if self.fail_create.contains(&kind) {
            return Err(self.error(format!("injected create failure for {}", kind)));
        }
        if let Some(parent) = &params.parent_id {
            if !state.resources.contains_key(parent) {
                return Err(self.error(format!("parent {} does not exist", parent)));
            }
        }

        state.next_id += 1;
        let id = format!("{}-{:04}", kind.short_name(), state.next_id);
        let mut descriptor = ResourceDescriptor::new(kind, id.clone()).with_name(params.name.clone());
        descriptor.region = Some(params.region.clone().unwrap_or_else(|| self.region.clone()));
        descriptor.parent_id = params.parent_id.clone();
        descriptor.created_at = Some(Utc::now());
        descriptor.tags = params.attributes.clone();
        if kind == ResourceKind::Bucket {
            descriptor.owner = Some(format!("{}-account", self.provider_name));
        }
        if self.pending_polls > 0 {
            descriptor.state = ResourceState::Pending;
            state.pending.insert(id.clone(), self.pending_polls);
        }

        debug!(kind = %kind, id = %id, "Simulated create");
        state.resources.insert(id.clone(), descriptor);
        Ok(id)
    }

    async fn get(&self, kind: ResourceKind, id: &str) -> Result<Option<ResourceDescriptor>> {
        let mut state = self.state.lock().await;

        let became_ready = match state.pending.get_mut(id) {
            Some(remaining) => {
                *remaining = remaining.saturating_sub(1);
                *remaining == 0
            }
            None => false,
        };
        if became_ready {
            state.pending.remove(id);
            if let Some(r) = state.resources.get_mut(id) {
                r.state = ResourceState::Available;
            }
        }

        Ok(state
            .resources
            .get(id)
            .filter(|r| r.kind == kind)
            .map(|r| state.snapshot(r)))
    }

    async fn list(
        &self,
        kind: ResourceKind,
        parent_id: Option<ResourceId>,
    ) -> Result<Vec<ResourceDescriptor>> {
        if self.fail_list.contains(&kind) {
            return Err(self.error(format!("injected list failure for {}", kind)));
        }
        if !self.is_subscribed(kind).await? {
            return Err(DaseinError::NotSubscribed { kind });
        }

        let state = self.state.lock().await;
        Ok(state
            .resources
            .values()
            .filter(|r| r.kind == kind)
            .filter(|r| match &parent_id {
                Some(parent) => r.parent_id.as_ref() == Some(parent),
                None => true,
            })
            .map(|r| state.snapshot(r))
            .collect())
    }

    async fn delete(&self, kind: ResourceKind, id: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        state.delete_calls.push((kind, id.to_string()));

        if state.fail_delete_kinds.contains(&kind) || state.fail_delete_ids.contains(id) {
            return Err(self.error(format!("injected delete failure for {} {}", kind, id)));
        }
        match state.resources.get(id) {
            Some(r) if r.kind == kind => {}
            _ => {
                return Err(DaseinError::ResourceNotFound {
                    kind,
                    id: id.to_string(),
                })
            }
        }
        let children = state.children_of(id);
        if children > 0 {
            return Err(self.error(format!("{} {} still has {} dependents", kind, id, children)));
        }

        state.resources.remove(id);
        state.pending.remove(id);
        debug!(kind = %kind, id = %id, "Simulated delete");
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.state.lock().await.closed += 1;
        Ok(())
    }
}

/// Hands out the same simulated cloud to every connection
#[derive(Clone)]
pub struct InMemoryFactory {
    provider: Arc<InMemoryProvider>,
}

impl InMemoryFactory {
    pub fn new(provider: Arc<InMemoryProvider>) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &Arc<InMemoryProvider> {
        &self.provider
    }
}

#[async_trait]
impl ProviderFactory for InMemoryFactory {
    async fn connect(&self, ctx: &ProviderContext) -> Result<Arc<dyn CloudProvider>> {
        debug!(cloud = %ctx.cloud_name, region = ?ctx.region, "Connecting to simulated cloud");
        Ok(self.provider.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_get_list_delete() {
        let provider = InMemoryProvider::new();
        let bucket = provider
            .create(ResourceKind::Bucket, &ProvisionParams::named("b"))
            .await
            .unwrap();
        let object = provider
            .create(
                ResourceKind::Object,
                &ProvisionParams::named("o").with_parent(bucket.clone()),
            )
            .await
            .unwrap();

        let got = provider.get(ResourceKind::Bucket, &bucket).await.unwrap().unwrap();
        assert_eq!(got.child_count, Some(1));
        assert!(got.owner.is_some());

        let children = provider
            .list(ResourceKind::Object, Some(bucket.clone()))
            .await
            .unwrap();
        assert_eq!(children.len(), 1);

        // Parent with children can't go first
        assert!(provider.delete(ResourceKind::Bucket, &bucket).await.is_err());
        provider.delete(ResourceKind::Object, &object).await.unwrap();
        provider.delete(ResourceKind::Bucket, &bucket).await.unwrap();
        assert_eq!(provider.resource_count().await, 0);
    }

    #[tokio::test]
    async fn test_get_nonexistent_is_none() {
        let provider = InMemoryProvider::new();
        assert!(provider
            .get(ResourceKind::Vlan, "vlan-9999")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let provider = InMemoryProvider::new();
        let err = provider.delete(ResourceKind::Vlan, "vlan-9999").await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(provider.delete_calls().await.len(), 1);
    }

    #[tokio::test]
    async fn test_pending_resources_become_available() {
        let provider = InMemoryProvider::builder().pending_polls(2).build();
        let id = provider
            .create(ResourceKind::Volume, &ProvisionParams::named("v"))
            .await
            .unwrap();
        let first = provider.get(ResourceKind::Volume, &id).await.unwrap().unwrap();
        assert_eq!(first.state, ResourceState::Pending);
        let second = provider.get(ResourceKind::Volume, &id).await.unwrap().unwrap();
        assert_eq!(second.state, ResourceState::Available);
    }

    #[tokio::test]
    async fn test_unsubscribed_list_errors() {
        let provider = InMemoryProvider::builder()
            .unsubscribed(ResourceKind::Database)
            .build();
        assert!(!provider.is_subscribed(ResourceKind::Database).await.unwrap());
        let err = provider.list(ResourceKind::Database, None).await.unwrap_err();
        assert!(err.is_skip());
    }
}
