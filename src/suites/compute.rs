use super::{need_resource, require_support};
use crate::error::ensure;
use crate::labels;
use crate::manager::TestManager;
use crate::provider::{ResourceKind, ResourceState};
use crate::suite::{need, Suite, TestCase, TestFuture};
use futures::FutureExt;

pub const SUITE: Suite = Suite {
    name: "StatefulComputeTests",
    tests: &[
        TestCase { name: "launchVm", run: launch_vm },
        TestCase { name: "attachLoadBalancer", run: attach_load_balancer },
        TestCase { name: "createVolume", run: create_volume },
        TestCase { name: "snapshotVolume", run: snapshot_volume },
        TestCase { name: "captureImage", run: capture_image },
        TestCase { name: "terminateVm", run: terminate_vm },
    ],
};

fn launch_vm(m: &TestManager) -> TestFuture<'_> {
    async move {
        require_support(m, ResourceKind::VirtualMachine)?;
        let compute = &m.resources().compute;
        let id = need_resource(
            m,
            compute.get_test_vm_id(labels::STATEFUL, true).await,
            &[ResourceKind::VirtualMachine],
            "virtual machine",
        )?;
        m.out("VM", &id);

        let state = compute.vms().state_of(&id).await?;
        ensure(
            state == ResourceState::Available,
            format!("VM {} is {}, expected available", id, state),
        )?;
        m.ok("VM launched and running");
        Ok(())
    }
    .boxed()
}

fn attach_load_balancer(m: &TestManager) -> TestFuture<'_> {
    async move {
        require_support(m, ResourceKind::LoadBalancer)?;
        let resources = m.resources();
        let vm = resources.compute.get_test_vm_id(labels::STATEFUL, true).await;
        let lb = need_resource(
            m,
            resources
                .network
                .get_test_load_balancer_id(labels::STATEFUL, true, vm.as_ref())
                .await,
            &[ResourceKind::LoadBalancer],
            "load balancer",
        )?;
        m.out("Load balancer", &lb);

        let described = need(
            resources.network.load_balancers().describe(&lb).await?,
            "load balancer description",
        )?;
        if let Some(vm) = vm {
            ensure(
                described.tags.get("members") == Some(&vm),
                "VM is not behind the load balancer",
            )?;
        }
        Ok(())
    }
    .boxed()
}

fn create_volume(m: &TestManager) -> TestFuture<'_> {
    async move {
        require_support(m, ResourceKind::Volume)?;
        let compute = &m.resources().compute;
        let id = need_resource(
            m,
            compute.get_test_volume_id(labels::STATEFUL, true).await,
            &[ResourceKind::Volume],
            "volume",
        )?;
        m.out("Volume", &id);
        let state = compute.volumes().state_of(&id).await?;
        ensure(state == ResourceState::Available, format!("volume is {}", state))?;
        Ok(())
    }
    .boxed()
}

fn snapshot_volume(m: &TestManager) -> TestFuture<'_> {
    async move {
        require_support(m, ResourceKind::Volume)?;
        require_support(m, ResourceKind::Snapshot)?;
        let compute = &m.resources().compute;
        let snapshot = need_resource(
            m,
            compute.get_test_snapshot_id(labels::STATEFUL, true).await,
            &[ResourceKind::Snapshot, ResourceKind::Volume],
            "snapshot",
        )?;
        let volume = need_resource(
            m,
            compute.get_test_volume_id(labels::STATEFUL, false).await,
            &[ResourceKind::Volume],
            "volume",
        )?;
        m.out("Snapshot", &snapshot);

        let described = need(compute.snapshots().describe(&snapshot).await?, "snapshot description")?;
        ensure(
            described.parent_id.as_deref() == Some(volume.as_str()),
            "snapshot does not reference the shared volume",
        )?;
        Ok(())
    }
    .boxed()
}

fn capture_image(m: &TestManager) -> TestFuture<'_> {
    async move {
        require_support(m, ResourceKind::VirtualMachine)?;
        require_support(m, ResourceKind::MachineImage)?;
        let compute = &m.resources().compute;
        let image = need_resource(
            m,
            compute.get_test_image_id(labels::STATEFUL, true).await,
            &[ResourceKind::MachineImage, ResourceKind::VirtualMachine],
            "machine image",
        )?;
        m.out("Image", &image);
        let state = compute.images().state_of(&image).await?;
        ensure(state == ResourceState::Available, format!("image is {}", state))?;
        Ok(())
    }
    .boxed()
}

fn terminate_vm(m: &TestManager) -> TestFuture<'_> {
    async move {
        require_support(m, ResourceKind::VirtualMachine)?;
        let compute = &m.resources().compute;
        let label = labels::removed_for("terminateVm");
        let id = need_resource(
            m,
            compute.get_test_vm_id(&label, true).await,
            &[ResourceKind::VirtualMachine],
            "virtual machine",
        )?;

        compute.vms().delete_now(&id).await?;
        let wait = m.context().budgets().for_kind(ResourceKind::VirtualMachine);
        compute
            .vms()
            .wait_for_state(&id, ResourceState::Deleted, wait)
            .await?;
        m.ok("VM terminated");
        Ok(())
    }
    .boxed()
}
