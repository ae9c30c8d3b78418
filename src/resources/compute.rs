//! Virtual machines, volumes, snapshots and machine images
//!
//! Launching a VM is sequenced after its network and identity
//! dependencies: subnet (and with it the VLAN), keypair and firewall are
//! looked up or provisioned first, each optional when the provider lacks
//! the feature. Every kind here has a transitional state, so new resources
//! are polled until available before being handed out.

use crate::labels;
use crate::naming::NameGenerator;
use crate::provider::{CloudProvider, ProvisionParams, ResourceId, ResourceKind};
use crate::provisioner::KindManager;
use crate::resources::identity::IdentityResources;
use crate::resources::network::NetworkResources;
use crate::wait::WaitBudgets;
use std::sync::Arc;

const DEFAULT_PRODUCT: &str = "small";
const VOLUME_SIZE_GB: &str = "2";

pub struct ComputeResources {
    network: Arc<NetworkResources>,
    identity: Arc<IdentityResources>,
    vms: KindManager,
    volumes: KindManager,
    snapshots: KindManager,
    images: KindManager,
}

impl ComputeResources {
    pub fn new(
        provider: Arc<dyn CloudProvider>,
        names: Arc<NameGenerator>,
        budgets: &WaitBudgets,
        network: Arc<NetworkResources>,
        identity: Arc<IdentityResources>,
    ) -> Self {
        let manager = |kind| {
            KindManager::new(kind, provider.clone(), names.clone())
                .with_ready_wait(budgets.for_kind(kind))
        };
        Self {
            network,
            identity,
            vms: manager(ResourceKind::VirtualMachine),
            volumes: manager(ResourceKind::Volume),
            snapshots: manager(ResourceKind::Snapshot),
            images: manager(ResourceKind::MachineImage),
        }
    }

    pub fn vms(&self) -> &KindManager {
        &self.vms
    }

    pub fn volumes(&self) -> &KindManager {
        &self.volumes
    }

    pub fn snapshots(&self) -> &KindManager {
        &self.snapshots
    }

    pub fn images(&self) -> &KindManager {
        &self.images
    }

    pub(crate) fn managers(&self) -> [&KindManager; 4] {
        [&self.vms, &self.volumes, &self.snapshots, &self.images]
    }

    /// Launch parameters with every dependency the provider can offer
    async fn launch_params(&self) -> ProvisionParams {
        let mut params = ProvisionParams::default().with_attribute("product", DEFAULT_PRODUCT);

        if let Some(subnet) = self.network.get_test_subnet_id(labels::STATEFUL, true).await {
            params = params.with_parent(subnet);
        }
        if let Some(keypair) = self.identity.get_test_keypair_id(labels::STATEFUL, true).await {
            params = params.with_attribute("keypair", keypair);
        }
        if let Some(firewall) = self.network.get_test_firewall_id(labels::STATEFUL, true).await {
            params = params.with_attribute("firewall", firewall);
        }
        let image = self
            .images
            .get_or_provision(labels::STATELESS, false, ProvisionParams::default())
            .await;
        if let Some(image) = image {
            params = params.with_attribute("image", image.id);
        }
        params
    }

    pub async fn get_test_vm_id(&self, label: &str, provision: bool) -> Option<ResourceId> {
        self.vms
            .get_or_provision_with(label, provision, || async { Some(self.launch_params().await) })
            .await
            .map(|r| r.id)
    }

    pub async fn get_test_volume_id(&self, label: &str, provision: bool) -> Option<ResourceId> {
        let params = ProvisionParams::default().with_attribute("size_gb", VOLUME_SIZE_GB);
        self.volumes
            .get_or_provision(label, provision, params)
            .await
            .map(|r| r.id)
    }

    /// A snapshot of the shared volume
    pub async fn get_test_snapshot_id(&self, label: &str, provision: bool) -> Option<ResourceId> {
        self.snapshots
            .get_or_provision_with(label, provision, || async {
                let volume = self.get_test_volume_id(labels::STATEFUL, true).await?;
                Some(ProvisionParams::default().with_parent(volume))
            })
            .await
            .map(|r| r.id)
    }

    /// An image captured from the shared VM
    ///
    /// The source VM is only referenced, not made the parent: the VM is
    /// released before images at teardown.
    pub async fn get_test_image_id(&self, label: &str, provision: bool) -> Option<ResourceId> {
        self.images
            .get_or_provision_with(label, provision, || async {
                let vm = self.get_test_vm_id(labels::STATEFUL, true).await?;
                Some(ProvisionParams::default().with_attribute("source_vm", vm))
            })
            .await
            .map(|r| r.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ResourceState;
    use std::time::Duration;

    fn compute(provider: Arc<dyn CloudProvider>, budgets: &WaitBudgets) -> ComputeResources {
        let names = Arc::new(NameGenerator::default());
        let network = Arc::new(NetworkResources::new(provider.clone(), names.clone()));
        let identity = Arc::new(IdentityResources::new(provider.clone(), names.clone()));
        ComputeResources::new(provider, names, budgets, network, identity)
    }

    fn fast() -> WaitBudgets {
        WaitBudgets::uniform(Duration::from_millis(1), Duration::from_millis(500))
    }

    #[tokio::test]
    async fn test_vm_launch_provisions_dependencies_first() {
        use crate::providers::memory::InMemoryProvider;
        let provider = Arc::new(InMemoryProvider::builder().pending_polls(2).build());
        let compute = compute(provider.clone(), &fast());

        let vm = compute.get_test_vm_id(labels::STATEFUL, true).await.unwrap();

        for kind in [
            ResourceKind::Vlan,
            ResourceKind::Subnet,
            ResourceKind::Keypair,
            ResourceKind::Firewall,
            ResourceKind::VirtualMachine,
        ] {
            assert_eq!(provider.create_count(kind).await, 1, "{}", kind);
        }
        let described = compute.vms().describe(&vm).await.unwrap().unwrap();
        assert_eq!(described.state, ResourceState::Available);
        assert!(described.tags.contains_key("keypair"));
    }

    #[tokio::test]
    async fn test_vm_launch_without_network_support() {
        use crate::providers::memory::InMemoryProvider;
        let provider = Arc::new(
            InMemoryProvider::builder()
                .unsupported(ResourceKind::Vlan)
                .unsupported(ResourceKind::Firewall)
                .build(),
        );
        let compute = compute(provider.clone(), &fast());

        let vm = compute.get_test_vm_id(labels::STATEFUL, true).await.unwrap();
        let described = compute.vms().describe(&vm).await.unwrap().unwrap();
        assert!(described.parent_id.is_none());
    }

    #[tokio::test]
    async fn test_snapshot_and_image_sources() {
        use crate::providers::memory::InMemoryProvider;
        let provider = Arc::new(InMemoryProvider::new());
        let compute = compute(provider.clone(), &fast());

        let snapshot = compute.get_test_snapshot_id(labels::STATEFUL, true).await.unwrap();
        let volume = compute.get_test_volume_id(labels::STATEFUL, false).await.unwrap();
        let described = compute.snapshots().describe(&snapshot).await.unwrap().unwrap();
        assert_eq!(described.parent_id, Some(volume));

        let image = compute.get_test_image_id(labels::STATEFUL, true).await.unwrap();
        let vm = compute.get_test_vm_id(labels::STATEFUL, false).await.unwrap();
        let described = compute.images().describe(&image).await.unwrap().unwrap();
        assert_eq!(described.tags.get("source_vm"), Some(&vm));
    }
}
