//! Get-or-provision for one resource kind
//!
//! A [`KindManager`] pairs a [`LabelRegistry`] with the provider and a
//! [`StatelessFinder`]. Asking it for a label either returns what is already
//! registered, discovers something (stateless), or creates a new resource.
//! Failures come back as `None` after being logged: whether a missing
//! resource fails the test is the test's call. A create that the provider
//! rejects as unsupported or unsubscribed is remembered, so later requests
//! (and [`KindManager::unavailable`]) report the kind as a skip.

use crate::error::{DaseinError, Result};
use crate::finder::StatelessFinder;
use crate::labels;
use crate::naming::NameGenerator;
use crate::provider::{
    Capability, CloudProvider, ProvisionParams, ResourceDescriptor, ResourceId, ResourceKind,
    ResourceState,
};
use crate::registry::{LabelRegistry, Origin, ResourceRecord};
use crate::wait::{await_state, WaitConfig};
use std::future::Future;
use std::sync::{Arc, OnceLock};
use tracing::{debug, info, warn};

/// Registry, finder and provider for a single resource kind
pub struct KindManager {
    kind: ResourceKind,
    provider: Arc<dyn CloudProvider>,
    registry: LabelRegistry,
    finder: StatelessFinder,
    names: Arc<NameGenerator>,
    /// When set, a new resource is polled until available before it is handed out
    ready_wait: Option<WaitConfig>,
    /// Set the first time a create is refused as unsupported or unsubscribed
    refused: OnceLock<Refusal>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Refusal {
    Unsupported,
    NotSubscribed,
}

impl Refusal {
    fn from_error(err: &DaseinError) -> Option<Self> {
        match err {
            DaseinError::Unsupported { .. } => Some(Self::Unsupported),
            DaseinError::NotSubscribed { .. } => Some(Self::NotSubscribed),
            _ => None,
        }
    }

    fn error(self, kind: ResourceKind) -> DaseinError {
        match self {
            Self::Unsupported => DaseinError::Unsupported { kind },
            Self::NotSubscribed => DaseinError::NotSubscribed { kind },
        }
    }
}

impl KindManager {
    pub fn new(
        kind: ResourceKind,
        provider: Arc<dyn CloudProvider>,
        names: Arc<NameGenerator>,
    ) -> Self {
        Self {
            kind,
            provider,
            registry: LabelRegistry::new(kind),
            finder: StatelessFinder::for_kind(kind),
            names,
            ready_wait: None,
            refused: OnceLock::new(),
        }
    }

    pub fn with_ready_wait(mut self, wait: WaitConfig) -> Self {
        self.ready_wait = Some(wait);
        self
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn registry(&self) -> &LabelRegistry {
        &self.registry
    }

    pub fn provider(&self) -> &Arc<dyn CloudProvider> {
        &self.provider
    }

    /// Skip-class error for this kind, if the provider declares it
    /// unsupported or has already refused to create one in this run
    pub fn unavailable(&self) -> Option<DaseinError> {
        if self.provider.supports(self.kind) == Capability::Unsupported {
            return Some(DaseinError::Unsupported { kind: self.kind });
        }
        self.refused.get().map(|refusal| refusal.error(self.kind))
    }

    /// Fresh name for a resource of this kind
    pub fn generate_name(&self, base: Option<&str>) -> String {
        self.names.name_for(self.kind, base)
    }

    /// Return the resource registered under `label`, creating one if allowed.
    ///
    /// - [`labels::STATELESS`] never creates anything, even with `provision`
    ///   set; it reuses a registered record or discovers one.
    /// - Any other label is created at most once per run; later calls return
    ///   the same record.
    /// - `params` is only consulted when a create happens. A blank name is
    ///   filled in with a generated one.
    pub async fn get_or_provision(
        &self,
        label: &str,
        provision: bool,
        params: ProvisionParams,
    ) -> Option<ResourceRecord> {
        self.get_or_provision_with(label, provision, || async move { Some(params) })
            .await
    }

    /// [`Self::get_or_provision`] with parameters built only when a create
    /// is actually about to happen.
    ///
    /// Helpers whose resources depend on other resources (a subnet needs a
    /// VLAN) resolve those dependencies inside `params`, so a lookup that
    /// hits the registry never provisions dependencies. `params` returning
    /// `None` means a dependency is unavailable and nothing is created.
    pub async fn get_or_provision_with<F, Fut>(
        &self,
        label: &str,
        provision: bool,
        params: F,
    ) -> Option<ResourceRecord>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Option<ProvisionParams>>,
    {
        match self.try_get_or_provision_with(label, provision, params).await {
            Ok(record) => record,
            Err(e) => {
                info!(kind = %self.kind, label, reason = %e, "Skipping provisioning");
                None
            }
        }
    }

    /// Lookup-or-create where the only error is a skip-class one: the kind is
    /// unsupported, or the account is not subscribed to it. Every other
    /// failure is logged and comes back as `Ok(None)`.
    async fn try_get_or_provision_with<F, Fut>(
        &self,
        label: &str,
        provision: bool,
        params: F,
    ) -> Result<Option<ResourceRecord>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Option<ProvisionParams>>,
    {
        if labels::is_stateless(label) {
            return Ok(self.get_stateless().await);
        }

        if let Some(existing) = self.registry.get(label).await {
            debug!(kind = %self.kind, label, id = %existing.id, "Reusing registered resource");
            return Ok(Some(existing));
        }

        if !provision {
            return Ok(None);
        }

        if let Some(err) = self.unavailable() {
            return Err(err);
        }

        let Some(params) = params().await else {
            warn!(kind = %self.kind, label, "A dependency is unavailable, not provisioning");
            return Ok(None);
        };

        match self.provision(label, params).await {
            Ok(record) => Ok(Some(record)),
            Err(e) => match Refusal::from_error(&e) {
                Some(refusal) => {
                    let _ = self.refused.set(refusal);
                    Err(e)
                }
                None => {
                    warn!(kind = %self.kind, label, error = %e, "Provisioning failed");
                    Ok(None)
                }
            },
        }
    }

    /// Like [`Self::get_or_provision`], but an absent resource is an error.
    ///
    /// A kind the provider does not support, declared up front or learned
    /// from a refused create, comes back as a skip-class error so the caller
    /// can report a skip instead of a failure.
    pub async fn require(
        &self,
        label: &str,
        provision: bool,
        params: ProvisionParams,
    ) -> Result<ResourceRecord> {
        if let Some(err) = self.unavailable() {
            return Err(err);
        }
        self.try_get_or_provision_with(label, provision, || async move { Some(params) })
            .await?
            .ok_or_else(|| DaseinError::Provisioning {
                kind: self.kind,
                label: label.to_string(),
                message: "no resource available (see earlier log lines)".to_string(),
            })
    }

    async fn get_stateless(&self) -> Option<ResourceRecord> {
        if let Some(existing) = self.registry.get_for_stateless().await {
            return Some(existing);
        }
        let found = self.finder.find(self.provider.as_ref()).await?;
        let record = ResourceRecord::from_descriptor(&found, Origin::Discovered);
        Some(self.registry.register_stateless(record).await)
    }

    async fn provision(&self, label: &str, mut params: ProvisionParams) -> Result<ResourceRecord> {
        if params.name.is_empty() {
            params.name = self.generate_name(None);
            if params.description.is_empty() {
                params.description = format!("Dasein test {} {}", self.kind, params.name);
            }
        }

        let id = self.provider.create(self.kind, &params).await?;
        info!(kind = %self.kind, label, id = %id, name = %params.name, "Provisioned");

        // Register before waiting so a resource that never becomes ready is
        // still torn down
        let mut record = ResourceRecord::provisioned(self.kind, id.clone());
        record.name = Some(params.name.clone());
        record.region = params.region.clone();
        record.parent_id = params.parent_id.clone();
        let record = self.registry.register(label, record).await;

        if let Some(wait) = self.ready_wait {
            self.wait_for_state(&id, ResourceState::Available, wait).await?;
        }
        Ok(record)
    }

    /// Current state of a resource, `Deleted` when the provider no longer knows it
    pub async fn state_of(&self, id: &str) -> Result<ResourceState> {
        Ok(self
            .provider
            .get(self.kind, id)
            .await?
            .map(|d| d.state)
            .unwrap_or(ResourceState::Deleted))
    }

    /// Poll until the resource reaches `target`
    pub async fn wait_for_state(
        &self,
        id: &str,
        target: ResourceState,
        wait: WaitConfig,
    ) -> Result<()> {
        let what = format!("{} {} to become {}", self.kind, id, target);
        await_state(&what, target, wait, || self.state_of(id)).await
    }

    /// Fetch straight from the provider
    pub async fn describe(&self, id: &str) -> Result<Option<ResourceDescriptor>> {
        self.provider.get(self.kind, id).await
    }

    /// Delete a resource the test is done with and forget it
    pub async fn delete_now(&self, id: &ResourceId) -> Result<()> {
        self.provider.delete(self.kind, id).await?;
        self.registry.remove_id(id).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::memory::InMemoryProvider;

    fn manager(provider: Arc<InMemoryProvider>, kind: ResourceKind) -> KindManager {
        KindManager::new(kind, provider, Arc::new(NameGenerator::default()))
    }

    #[tokio::test]
    async fn test_same_label_provisions_once() {
        let provider = Arc::new(InMemoryProvider::new());
        let vlans = manager(provider.clone(), ResourceKind::Vlan);

        let first = vlans
            .get_or_provision(labels::STATEFUL, true, ProvisionParams::default())
            .await
            .unwrap();
        let second = vlans
            .get_or_provision(labels::STATEFUL, true, ProvisionParams::default())
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(provider.create_count(ResourceKind::Vlan).await, 1);
        assert!(first.name.unwrap().starts_with("dsnvlan"));
    }

    #[tokio::test]
    async fn test_no_provision_flag_returns_none() {
        let provider = Arc::new(InMemoryProvider::new());
        let vlans = manager(provider.clone(), ResourceKind::Vlan);
        assert!(vlans
            .get_or_provision(labels::STATEFUL, false, ProvisionParams::default())
            .await
            .is_none());
        assert_eq!(provider.create_count(ResourceKind::Vlan).await, 0);
    }

    #[tokio::test]
    async fn test_stateless_never_creates() {
        let provider = Arc::new(InMemoryProvider::new());
        let vlans = manager(provider.clone(), ResourceKind::Vlan);

        let found = vlans
            .get_or_provision(labels::STATELESS, true, ProvisionParams::default())
            .await;
        assert!(found.is_none());
        assert_eq!(provider.create_count(ResourceKind::Vlan).await, 0);

        provider
            .seed(ResourceDescriptor::new(ResourceKind::Vlan, "vlan-existing"))
            .await;
        let found = vlans
            .get_or_provision(labels::STATELESS, true, ProvisionParams::default())
            .await
            .unwrap();
        assert_eq!(found.id, "vlan-existing");
        assert_eq!(found.origin, Origin::Discovered);
        assert_eq!(provider.create_count(ResourceKind::Vlan).await, 0);
    }

    #[tokio::test]
    async fn test_unsupported_kind_is_not_attempted() {
        let provider = Arc::new(InMemoryProvider::builder().unsupported(ResourceKind::Vlan).build());
        let vlans = manager(provider.clone(), ResourceKind::Vlan);

        assert!(vlans
            .get_or_provision(labels::STATEFUL, true, ProvisionParams::default())
            .await
            .is_none());
        assert_eq!(provider.create_count(ResourceKind::Vlan).await, 0);

        let err = vlans
            .require(labels::STATEFUL, true, ProvisionParams::default())
            .await
            .unwrap_err();
        assert!(err.is_skip());
    }

    #[tokio::test]
    async fn test_create_refused_as_unsupported_is_a_skip() {
        let provider = Arc::new(
            InMemoryProvider::builder()
                .unsupported_on_create(ResourceKind::Database)
                .build(),
        );
        let databases = manager(provider.clone(), ResourceKind::Database);
        assert_eq!(provider.supports(ResourceKind::Database), Capability::Unknown);
        assert!(databases.unavailable().is_none());

        let err = databases
            .require(labels::STATEFUL, true, ProvisionParams::default())
            .await
            .unwrap_err();
        assert!(err.is_skip(), "expected a skip, got {err}");
        assert_eq!(provider.create_count(ResourceKind::Database).await, 1);
        assert!(databases.registry().is_empty().await);

        // Remembered: no second create, and the kind now reads as unavailable
        assert!(databases.unavailable().is_some_and(|e| e.is_skip()));
        assert!(databases
            .get_or_provision(labels::STATEFUL, true, ProvisionParams::default())
            .await
            .is_none());
        let err = databases
            .require("other", true, ProvisionParams::default())
            .await
            .unwrap_err();
        assert!(err.is_skip());
        assert_eq!(provider.create_count(ResourceKind::Database).await, 1);
    }

    #[tokio::test]
    async fn test_create_failure_is_swallowed_and_not_registered() {
        let provider = Arc::new(
            InMemoryProvider::builder()
                .fail_create(ResourceKind::Volume)
                .build(),
        );
        let volumes = manager(provider.clone(), ResourceKind::Volume);

        assert!(volumes
            .get_or_provision(labels::STATEFUL, true, ProvisionParams::default())
            .await
            .is_none());
        assert!(volumes.registry().is_empty().await);

        let err = volumes
            .require(labels::STATEFUL, true, ProvisionParams::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DaseinError::Provisioning { .. }));
    }

    #[tokio::test]
    async fn test_ready_wait_times_out_but_stays_registered() {
        let provider = Arc::new(InMemoryProvider::builder().pending_polls(1_000).build());
        let vms = manager(provider.clone(), ResourceKind::VirtualMachine).with_ready_wait(
            WaitConfig::new(
                std::time::Duration::from_millis(1),
                std::time::Duration::from_millis(20),
            ),
        );

        assert!(vms
            .get_or_provision(labels::STATEFUL, true, ProvisionParams::default())
            .await
            .is_none());
        assert_eq!(vms.registry().len().await, 1);
    }

    #[tokio::test]
    async fn test_params_not_built_for_registered_label() {
        let provider = Arc::new(InMemoryProvider::new());
        let subnets = manager(provider.clone(), ResourceKind::Subnet);
        subnets
            .get_or_provision(labels::STATEFUL, true, ProvisionParams::default())
            .await
            .unwrap();

        let built = std::sync::atomic::AtomicBool::new(false);
        let record = subnets
            .get_or_provision_with(labels::STATEFUL, true, || async {
                built.store(true, std::sync::atomic::Ordering::SeqCst);
                Some(ProvisionParams::default())
            })
            .await;
        assert!(record.is_some());
        assert!(!built.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_missing_dependency_creates_nothing() {
        let provider = Arc::new(InMemoryProvider::new());
        let subnets = manager(provider.clone(), ResourceKind::Subnet);
        let record = subnets
            .get_or_provision_with(labels::STATEFUL, true, || async { None::<ProvisionParams> })
            .await;
        assert!(record.is_none());
        assert_eq!(provider.total_create_count().await, 0);
    }

    #[tokio::test]
    async fn test_delete_now_forgets_record() {
        let provider = Arc::new(InMemoryProvider::new());
        let vlans = manager(provider.clone(), ResourceKind::Vlan);
        let record = vlans
            .get_or_provision(labels::REMOVED, true, ProvisionParams::default())
            .await
            .unwrap();

        vlans.delete_now(&record.id).await.unwrap();
        assert!(vlans.registry().is_empty().await);
        assert!(vlans.describe(&record.id).await.unwrap().is_none());
    }
}
