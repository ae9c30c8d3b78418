//! Per-kind resource helpers and the run-wide set that owns them
//!
//! Each helper module instantiates [`KindManager`] for its kinds with the
//! parameters, finders and dependency sequencing those kinds need.
//! [`ResourceSet`] holds one of each for a provider connection and is what
//! teardown sweeps.

pub mod compute;
pub mod identity;
pub mod network;
pub mod platform;
pub mod storage;

pub use compute::ComputeResources;
pub use identity::IdentityResources;
pub use network::NetworkResources;
pub use platform::PlatformResources;
pub use storage::StorageResources;

use crate::naming::NameGenerator;
use crate::provider::{CloudProvider, ResourceKind};
use crate::provisioner::KindManager;
use crate::registry::ResourceRecord;
use crate::teardown::{TeardownCoordinator, TeardownReport};
use crate::wait::WaitBudgets;
use std::sync::Arc;
use tracing::debug;

/// Every kind manager for one provider connection
pub struct ResourceSet {
    provider: Arc<dyn CloudProvider>,
    pub identity: Arc<IdentityResources>,
    pub network: Arc<NetworkResources>,
    pub compute: ComputeResources,
    pub storage: StorageResources,
    pub platform: PlatformResources,
    teardown: TeardownCoordinator,
}

impl ResourceSet {
    pub fn new(
        provider: Arc<dyn CloudProvider>,
        names: Arc<NameGenerator>,
        budgets: &WaitBudgets,
        teardown: TeardownCoordinator,
    ) -> Self {
        let identity = Arc::new(IdentityResources::new(provider.clone(), names.clone()));
        let network = Arc::new(NetworkResources::new(provider.clone(), names.clone()));
        Self {
            compute: ComputeResources::new(
                provider.clone(),
                names.clone(),
                budgets,
                network.clone(),
                identity.clone(),
            ),
            storage: StorageResources::new(provider.clone(), names.clone()),
            platform: PlatformResources::new(provider.clone(), names, budgets),
            identity,
            network,
            provider,
            teardown,
        }
    }

    pub fn provider(&self) -> &Arc<dyn CloudProvider> {
        &self.provider
    }

    fn managers(&self) -> Vec<&KindManager> {
        let mut all: Vec<&KindManager> = Vec::with_capacity(ResourceKind::ALL.len());
        all.extend(self.identity.managers());
        all.extend(self.network.managers());
        all.extend(self.compute.managers());
        all.extend(self.storage.managers());
        all.extend(self.platform.managers());
        all
    }

    /// Manager for `kind`
    pub fn manager(&self, kind: ResourceKind) -> Option<&KindManager> {
        self.managers().into_iter().find(|m| m.kind() == kind)
    }

    /// Number of records across all kinds, discovered ones included
    pub async fn registered_count(&self) -> usize {
        let mut total = 0;
        for manager in self.managers() {
            total += manager.registry().len().await;
        }
        total
    }

    /// Release records a test provisioned for deletion
    pub async fn release_removed(&self) -> TeardownReport {
        let mut records: Vec<ResourceRecord> = Vec::new();
        for manager in self.managers() {
            records.extend(manager.registry().take_removed().await);
        }
        if records.is_empty() {
            return TeardownReport::default();
        }
        debug!(count = records.len(), "Releasing per-test resources");
        self.teardown.tear_down(self.provider.as_ref(), records).await
    }

    /// Release everything this run owns; a second call finds nothing to do
    pub async fn close(&self) -> TeardownReport {
        let mut records: Vec<ResourceRecord> = Vec::new();
        for manager in self.managers() {
            records.extend(manager.registry().take_owned().await);
        }
        self.teardown.tear_down(self.provider.as_ref(), records).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels;
    use crate::providers::memory::InMemoryProvider;
    use std::time::Duration;

    fn set(provider: Arc<InMemoryProvider>) -> ResourceSet {
        ResourceSet::new(
            provider,
            Arc::new(NameGenerator::default()),
            &WaitBudgets::uniform(Duration::from_millis(1), Duration::from_millis(200)),
            TeardownCoordinator::default(),
        )
    }

    #[test]
    fn test_every_kind_has_a_manager() {
        let resources = set(Arc::new(InMemoryProvider::new()));
        for kind in ResourceKind::ALL {
            assert!(resources.manager(kind).is_some(), "no manager for {}", kind);
        }
    }

    #[tokio::test]
    async fn test_close_releases_whole_dependency_chain() {
        let provider = Arc::new(InMemoryProvider::new());
        let resources = set(provider.clone());

        let vm = resources.compute.get_test_vm_id(labels::STATEFUL, true).await.unwrap();
        resources
            .network
            .get_test_load_balancer_id(labels::STATEFUL, true, Some(&vm))
            .await
            .unwrap();
        resources.compute.get_test_image_id(labels::STATEFUL, true).await.unwrap();
        resources.identity.get_test_user_id(labels::STATEFUL, true).await.unwrap();
        resources.storage.get_test_object_id("provision", true, "provision").await.unwrap();

        let report = resources.close().await;
        assert!(report.is_clean(), "{:?}", report.failed);
        assert_eq!(provider.resource_count().await, 0);
        assert_eq!(resources.registered_count().await, 0);

        let again = resources.close().await;
        assert_eq!(again.attempted(), 0);
    }

    #[tokio::test]
    async fn test_release_removed_leaves_shared_resources() {
        let provider = Arc::new(InMemoryProvider::new());
        let resources = set(provider.clone());

        let shared = resources.network.get_test_vlan_id(labels::STATEFUL, true).await.unwrap();
        let doomed = resources
            .network
            .get_test_vlan_id(&labels::removed_for("removeVlan"), true)
            .await
            .unwrap();

        let report = resources.release_removed().await;
        assert_eq!(report.deleted.len(), 1);
        assert!(!provider.contains(&doomed).await);
        assert!(provider.contains(&shared).await);

        let report = resources.close().await;
        assert_eq!(report.deleted.len(), 1);
        let deletes = provider.delete_calls().await;
        assert_eq!(deletes.iter().filter(|(_, id)| *id == doomed).count(), 1);
    }
}
