//! Read-only suites
//!
//! Nothing here may change cloud state: every lookup uses the stateless
//! label, and an account with nothing to look at is logged as a skip line
//! rather than failed.

use super::require_support;
use crate::error::ensure;
use crate::labels;
use crate::manager::TestManager;
use crate::provider::ResourceKind;
use crate::suite::{Suite, TestCase, TestFuture};
use futures::FutureExt;

pub const NETWORK: Suite = Suite {
    name: "StatelessNetworkTests",
    tests: &[
        TestCase { name: "getNonexistentVlan", run: get_nonexistent_vlan },
        TestCase { name: "getVlan", run: get_vlan },
        TestCase { name: "listVlans", run: list_vlans },
    ],
};

pub const COMPUTE: Suite = Suite {
    name: "StatelessComputeTests",
    tests: &[
        TestCase { name: "getNonexistentVm", run: get_nonexistent_vm },
        TestCase { name: "getVm", run: get_vm },
    ],
};

pub const STORAGE: Suite = Suite {
    name: "StatelessStorageTests",
    tests: &[
        TestCase { name: "getNonexistentBucket", run: get_nonexistent_bucket },
        TestCase { name: "getBucket", run: get_bucket },
        TestCase { name: "getObject", run: get_object },
    ],
};

/// A fetch of an id that can't exist returns nothing rather than failing
async fn assert_get_nonexistent(m: &TestManager, kind: ResourceKind) -> crate::error::Result<()> {
    require_support(m, kind)?;
    let id = format!("{}-{}", labels::STATELESS, uuid::Uuid::new_v4());
    let found = m.provider().await?.get(kind, &id).await?;
    ensure(found.is_none(), format!("{} {} should not exist", kind, id))?;
    m.ok(&format!("Nonexistent {} returned nothing", kind));
    Ok(())
}

fn get_nonexistent_vlan(m: &TestManager) -> TestFuture<'_> {
    assert_get_nonexistent(m, ResourceKind::Vlan).boxed()
}

fn get_vlan(m: &TestManager) -> TestFuture<'_> {
    async move {
        require_support(m, ResourceKind::Vlan)?;
        let network = &m.resources().network;
        let Some(id) = network.get_test_vlan_id(labels::STATELESS, false).await else {
            m.skip("No VLAN in this account to test against");
            return Ok(());
        };
        let vlan = network.vlans().describe(&id).await?;
        ensure(vlan.is_some(), format!("stateless VLAN {} vanished", id))?;
        m.out("VLAN", &id);
        Ok(())
    }
    .boxed()
}

fn list_vlans(m: &TestManager) -> TestFuture<'_> {
    async move {
        require_support(m, ResourceKind::Vlan)?;
        let provider = m.provider().await?;
        if !provider.is_subscribed(ResourceKind::Vlan).await? {
            m.skip("Not subscribed to VLANs");
            return Ok(());
        }
        let vlans = provider.list(ResourceKind::Vlan, None).await?;
        for vlan in &vlans {
            ensure(vlan.kind == ResourceKind::Vlan, format!("{} listed as a VLAN", vlan.kind))?;
        }
        if let Some(id) = m.resources().network.get_test_vlan_id(labels::STATELESS, false).await {
            ensure(
                vlans.iter().any(|v| v.id == id),
                format!("stateless VLAN {} missing from the listing", id),
            )?;
        }
        m.out("VLANs", vlans.len());
        Ok(())
    }
    .boxed()
}

fn get_nonexistent_vm(m: &TestManager) -> TestFuture<'_> {
    assert_get_nonexistent(m, ResourceKind::VirtualMachine).boxed()
}

fn get_vm(m: &TestManager) -> TestFuture<'_> {
    async move {
        require_support(m, ResourceKind::VirtualMachine)?;
        let compute = &m.resources().compute;
        let Some(id) = compute.get_test_vm_id(labels::STATELESS, false).await else {
            m.skip("No virtual machine in this account to test against");
            return Ok(());
        };
        let vm = compute.vms().describe(&id).await?;
        ensure(vm.is_some(), format!("stateless VM {} vanished", id))?;
        m.out("VM", &id);
        Ok(())
    }
    .boxed()
}

fn get_nonexistent_bucket(m: &TestManager) -> TestFuture<'_> {
    assert_get_nonexistent(m, ResourceKind::Bucket).boxed()
}

fn get_bucket(m: &TestManager) -> TestFuture<'_> {
    async move {
        require_support(m, ResourceKind::Bucket)?;
        let storage = &m.resources().storage;
        let Some(id) = storage.get_test_bucket_id(labels::STATELESS, false).await else {
            m.skip("No bucket in this account to test against");
            return Ok(());
        };
        let bucket = storage.buckets().describe(&id).await?;
        ensure(
            bucket.map(|b| b.is_container).unwrap_or(false),
            format!("stateless bucket {} is not a container", id),
        )?;
        m.out("Bucket", &id);
        Ok(())
    }
    .boxed()
}

fn get_object(m: &TestManager) -> TestFuture<'_> {
    async move {
        require_support(m, ResourceKind::Object)?;
        let storage = &m.resources().storage;
        let Some(id) = storage
            .get_test_object_id(labels::STATELESS, false, labels::STATELESS)
            .await
        else {
            m.skip("No object in this account to test against");
            return Ok(());
        };
        let object = storage.objects().describe(&id).await?;
        ensure(
            object.map(|o| !o.is_container).unwrap_or(false),
            format!("stateless object {} is not a leaf", id),
        )?;
        m.out("Object", &id);
        Ok(())
    }
    .boxed()
}
