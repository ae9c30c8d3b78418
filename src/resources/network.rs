//! VLANs, subnets, firewalls, static IPs and load balancers
//!
//! Subnets live inside the shared VLAN and firewalls are scoped to it when
//! the provider has VLANs. Load balancers front a virtual machine the caller
//! hands in, since VMs are provisioned by the compute helpers.

use crate::labels;
use crate::naming::NameGenerator;
use crate::provider::{CloudProvider, ProvisionParams, ResourceId, ResourceKind};
use crate::provisioner::KindManager;
use std::sync::Arc;
use tracing::debug;

const VLAN_CIDR: &str = "192.168.101.0/24";
const SUBNET_CIDR: &str = "192.168.101.0/27";

pub struct NetworkResources {
    vlans: KindManager,
    subnets: KindManager,
    firewalls: KindManager,
    static_ips: KindManager,
    load_balancers: KindManager,
}

impl NetworkResources {
    pub fn new(provider: Arc<dyn CloudProvider>, names: Arc<NameGenerator>) -> Self {
        let manager = |kind| KindManager::new(kind, provider.clone(), names.clone());
        Self {
            vlans: manager(ResourceKind::Vlan),
            subnets: manager(ResourceKind::Subnet),
            firewalls: manager(ResourceKind::Firewall),
            static_ips: manager(ResourceKind::StaticIp),
            load_balancers: manager(ResourceKind::LoadBalancer),
        }
    }

    pub fn vlans(&self) -> &KindManager {
        &self.vlans
    }

    pub fn subnets(&self) -> &KindManager {
        &self.subnets
    }

    pub fn firewalls(&self) -> &KindManager {
        &self.firewalls
    }

    pub fn static_ips(&self) -> &KindManager {
        &self.static_ips
    }

    pub fn load_balancers(&self) -> &KindManager {
        &self.load_balancers
    }

    pub(crate) fn managers(&self) -> [&KindManager; 5] {
        [
            &self.vlans,
            &self.subnets,
            &self.firewalls,
            &self.static_ips,
            &self.load_balancers,
        ]
    }

    pub async fn get_test_vlan_id(&self, label: &str, provision: bool) -> Option<ResourceId> {
        let params = ProvisionParams::default().with_attribute("cidr", VLAN_CIDR);
        self.vlans
            .get_or_provision(label, provision, params)
            .await
            .map(|r| r.id)
    }

    /// A subnet inside the shared VLAN; never created without one
    pub async fn get_test_subnet_id(&self, label: &str, provision: bool) -> Option<ResourceId> {
        self.subnets
            .get_or_provision_with(label, provision, || async {
                let vlan = self.get_test_vlan_id(labels::STATEFUL, true).await?;
                Some(
                    ProvisionParams::default()
                        .with_parent(vlan)
                        .with_attribute("cidr", SUBNET_CIDR),
                )
            })
            .await
            .map(|r| r.id)
    }

    pub async fn get_test_firewall_id(&self, label: &str, provision: bool) -> Option<ResourceId> {
        self.firewalls
            .get_or_provision_with(label, provision, || async {
                let params = ProvisionParams::default();
                Some(match self.get_test_vlan_id(labels::STATEFUL, true).await {
                    Some(vlan) => params.with_parent(vlan),
                    None => {
                        debug!("No VLAN available, creating a general firewall");
                        params
                    }
                })
            })
            .await
            .map(|r| r.id)
    }

    pub async fn get_test_static_ip_id(&self, label: &str, provision: bool) -> Option<ResourceId> {
        self.static_ips
            .get_or_provision(label, provision, ProvisionParams::default())
            .await
            .map(|r| r.id)
    }

    /// A load balancer with `member` behind it
    pub async fn get_test_load_balancer_id(
        &self,
        label: &str,
        provision: bool,
        member: Option<&ResourceId>,
    ) -> Option<ResourceId> {
        let mut params = ProvisionParams::default().with_attribute("listener", "tcp:80:8080");
        if let Some(vm) = member {
            params = params.with_attribute("members", vm.clone());
        }
        self.load_balancers
            .get_or_provision(label, provision, params)
            .await
            .map(|r| r.id)
    }
}
