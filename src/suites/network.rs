use super::{need_resource, require_support};
use crate::error::ensure;
use crate::labels;
use crate::manager::TestManager;
use crate::provider::{ResourceKind, ResourceState};
use crate::suite::{need, Suite, TestCase, TestFuture};
use futures::FutureExt;

pub const SUITE: Suite = Suite {
    name: "StatefulNetworkTests",
    tests: &[
        TestCase { name: "createVlan", run: create_vlan },
        TestCase { name: "createSubnet", run: create_subnet },
        TestCase { name: "createFirewall", run: create_firewall },
        TestCase { name: "allocateStaticIp", run: allocate_static_ip },
        TestCase { name: "removeVlan", run: remove_vlan },
    ],
};

fn create_vlan(m: &TestManager) -> TestFuture<'_> {
    async move {
        require_support(m, ResourceKind::Vlan)?;
        let network = &m.resources().network;
        let id = need_resource(
            m,
            network.get_test_vlan_id(labels::STATEFUL, true).await,
            &[ResourceKind::Vlan],
            "VLAN",
        )?;
        m.out("VLAN", &id);

        let vlan = need(network.vlans().describe(&id).await?, "VLAN description")?;
        ensure(vlan.id == id, format!("asked for {} but got {}", id, vlan.id))?;
        ensure(vlan.name.is_some(), "VLAN has no name")?;
        m.ok("VLAN provisioned and visible");
        Ok(())
    }
    .boxed()
}

fn create_subnet(m: &TestManager) -> TestFuture<'_> {
    async move {
        require_support(m, ResourceKind::Vlan)?;
        require_support(m, ResourceKind::Subnet)?;
        let network = &m.resources().network;
        let subnet = need_resource(
            m,
            network.get_test_subnet_id(labels::STATEFUL, true).await,
            &[ResourceKind::Subnet, ResourceKind::Vlan],
            "subnet",
        )?;
        let vlan = need_resource(
            m,
            network.get_test_vlan_id(labels::STATEFUL, false).await,
            &[ResourceKind::Vlan],
            "VLAN",
        )?;
        m.out("Subnet", &subnet);

        let described = need(network.subnets().describe(&subnet).await?, "subnet description")?;
        ensure(
            described.parent_id.as_deref() == Some(vlan.as_str()),
            "subnet is not inside the shared VLAN",
        )?;
        m.ok("Subnet lives in the shared VLAN");
        Ok(())
    }
    .boxed()
}

fn create_firewall(m: &TestManager) -> TestFuture<'_> {
    async move {
        require_support(m, ResourceKind::Firewall)?;
        let network = &m.resources().network;
        let id = need_resource(
            m,
            network.get_test_firewall_id(labels::STATEFUL, true).await,
            &[ResourceKind::Firewall],
            "firewall",
        )?;
        m.out("Firewall", &id);
        ensure(network.firewalls().describe(&id).await?.is_some(), "firewall not found")?;
        Ok(())
    }
    .boxed()
}

fn allocate_static_ip(m: &TestManager) -> TestFuture<'_> {
    async move {
        require_support(m, ResourceKind::StaticIp)?;
        let network = &m.resources().network;
        let id = need_resource(
            m,
            network.get_test_static_ip_id(labels::STATEFUL, true).await,
            &[ResourceKind::StaticIp],
            "static IP",
        )?;
        let again = network.get_test_static_ip_id(labels::STATEFUL, true).await;
        ensure(again.as_ref() == Some(&id), "second lookup returned a different address")?;
        m.out("Static IP", &id);
        Ok(())
    }
    .boxed()
}

fn remove_vlan(m: &TestManager) -> TestFuture<'_> {
    async move {
        require_support(m, ResourceKind::Vlan)?;
        let network = &m.resources().network;
        let label = labels::removed_for("removeVlan");
        let id = need_resource(
            m,
            network.get_test_vlan_id(&label, true).await,
            &[ResourceKind::Vlan],
            "VLAN",
        )?;

        network.vlans().delete_now(&id).await?;
        let wait = m.context().budgets().for_kind(ResourceKind::Vlan);
        network
            .vlans()
            .wait_for_state(&id, ResourceState::Deleted, wait)
            .await?;
        ensure(
            network.vlans().describe(&id).await?.is_none(),
            "deleted VLAN is still visible",
        )?;
        m.ok("VLAN removed");
        Ok(())
    }
    .boxed()
}
