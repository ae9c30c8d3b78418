//! Provider interaction tests against a mockall double
//!
//! These pin down exactly which provider calls the harness makes, which the
//! simulated cloud can't express: no create for stateless lookups, one
//! delete per owned record, and no retries after a failed delete.

use async_trait::async_trait;
use dasein_tests::error::{DaseinError, Result};
use dasein_tests::labels;
use dasein_tests::naming::NameGenerator;
use dasein_tests::provider::{
    Capability, CloudProvider, ProvisionParams, ResourceDescriptor, ResourceId, ResourceKind,
};
use dasein_tests::provisioner::KindManager;
use dasein_tests::registry::{Origin, ResourceRecord};
use dasein_tests::teardown::TeardownCoordinator;
use mockall::mock;
use mockall::predicate::eq;
use std::sync::Arc;

mock! {
    pub Cloud {}

    #[async_trait]
    impl CloudProvider for Cloud {
        fn provider_name(&self) -> String;
        fn cloud_name(&self) -> String;
        fn supports(&self, kind: ResourceKind) -> Capability;
        async fn is_subscribed(&self, kind: ResourceKind) -> Result<bool>;
        async fn create(&self, kind: ResourceKind, params: &ProvisionParams) -> Result<ResourceId>;
        async fn get(&self, kind: ResourceKind, id: &str) -> Result<Option<ResourceDescriptor>>;
        async fn list(
            &self,
            kind: ResourceKind,
            parent_id: Option<ResourceId>,
        ) -> Result<Vec<ResourceDescriptor>>;
        async fn delete(&self, kind: ResourceKind, id: &str) -> Result<()>;
        async fn close(&self) -> Result<()>;
    }
}

fn base_mock() -> MockCloud {
    let mut cloud = MockCloud::new();
    cloud.expect_provider_name().return_const("mock".to_string());
    cloud.expect_cloud_name().return_const("mock cloud".to_string());
    cloud.expect_supports().return_const(Capability::Supported);
    cloud
}

fn manager(cloud: MockCloud, kind: ResourceKind) -> KindManager {
    KindManager::new(kind, Arc::new(cloud), Arc::new(NameGenerator::new("dsn")))
}

fn owned(kind: ResourceKind, id: &str, label: &str) -> ResourceRecord {
    let mut record = ResourceRecord::provisioned(kind, id);
    record.label = label.to_string();
    record
}

#[tokio::test]
async fn test_stateless_lookup_never_creates() {
    let mut cloud = base_mock();
    cloud.expect_is_subscribed().returning(|_| Ok(true));
    cloud
        .expect_list()
        .with(eq(ResourceKind::Vlan), eq(None::<ResourceId>))
        .returning(|kind, _| Ok(vec![ResourceDescriptor::new(kind, "vlan-existing")]));
    cloud.expect_create().times(0);

    let vlans = manager(cloud, ResourceKind::Vlan);
    let found = vlans
        .get_or_provision(labels::STATELESS, true, ProvisionParams::named("unused"))
        .await
        .unwrap();

    assert_eq!(found.id, "vlan-existing");
    assert_eq!(found.origin, Origin::Discovered);
    assert!(!found.is_owned());
}

#[tokio::test]
async fn test_stateless_lookup_on_empty_account_returns_none() {
    let mut cloud = base_mock();
    cloud.expect_is_subscribed().returning(|_| Ok(true));
    cloud.expect_list().returning(|_, _| Ok(vec![]));
    cloud.expect_create().times(0);

    let vlans = manager(cloud, ResourceKind::Vlan);
    assert!(vlans
        .get_or_provision(labels::STATELESS, true, ProvisionParams::default())
        .await
        .is_none());
    assert!(vlans.registry().is_empty().await);
}

#[tokio::test]
async fn test_listing_failure_is_absorbed() {
    let mut cloud = base_mock();
    cloud.expect_is_subscribed().returning(|_| Ok(true));
    cloud
        .expect_list()
        .returning(|_, _| Err(DaseinError::provider("mock", "throttled")));
    cloud.expect_create().times(0);

    let volumes = manager(cloud, ResourceKind::Volume);
    assert!(volumes
        .get_or_provision(labels::STATELESS, false, ProvisionParams::default())
        .await
        .is_none());
}

#[tokio::test]
async fn test_provisioned_label_creates_once() {
    let mut cloud = base_mock();
    cloud
        .expect_create()
        .times(1)
        .returning(|_, _| Ok("kp-1".to_string()));
    cloud.expect_get().returning(|kind, id| {
        Ok(Some(ResourceDescriptor::new(kind, id).with_name("dsnkp")))
    });

    let keypairs = manager(cloud, ResourceKind::Keypair);
    let first = keypairs
        .get_or_provision(labels::STATEFUL, true, ProvisionParams::default())
        .await
        .unwrap();
    let second = keypairs
        .get_or_provision(labels::STATEFUL, true, ProvisionParams::default())
        .await
        .unwrap();

    assert_eq!(first.id, "kp-1");
    assert_eq!(second.id, first.id);
    assert!(first.is_owned());
}

#[tokio::test]
async fn test_create_failure_yields_none() {
    let mut cloud = base_mock();
    cloud
        .expect_create()
        .times(1)
        .returning(|_, _| Err(DaseinError::provider("mock", "quota exceeded")));

    let volumes = manager(cloud, ResourceKind::Volume);
    assert!(volumes
        .get_or_provision(labels::STATEFUL, true, ProvisionParams::default())
        .await
        .is_none());
    assert!(volumes.registry().get(labels::STATEFUL).await.is_none());
}

#[tokio::test]
async fn test_delete_failure_does_not_stop_teardown() {
    const COUNT: usize = 5;

    for failing in 0..COUNT {
        let failing_id = format!("vol-{}", failing);
        let mut cloud = base_mock();
        cloud
            .expect_delete()
            .times(COUNT)
            .returning(move |_, id| {
                if id == failing_id {
                    Err(DaseinError::provider("mock", "volume in use"))
                } else {
                    Ok(())
                }
            });

        let records: Vec<_> = (0..COUNT)
            .map(|i| owned(ResourceKind::Volume, &format!("vol-{}", i), &format!("v{}", i)))
            .collect();

        let report = TeardownCoordinator::default().tear_down(&cloud, records).await;

        assert_eq!(report.attempted(), COUNT);
        assert_eq!(report.deleted.len(), COUNT - 1);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0.id, format!("vol-{}", failing));
        assert!(!report.is_clean());
    }
}

#[tokio::test]
async fn test_not_found_on_delete_counts_as_gone() {
    let mut cloud = base_mock();
    cloud
        .expect_delete()
        .with(eq(ResourceKind::StaticIp), eq("ip-1"))
        .times(1)
        .returning(|kind, id| {
            Err(DaseinError::ResourceNotFound {
                kind,
                id: id.to_string(),
            })
        });

    let report = TeardownCoordinator::default()
        .tear_down(&cloud, vec![owned(ResourceKind::StaticIp, "ip-1", labels::STATEFUL)])
        .await;

    assert_eq!(report.already_gone.len(), 1);
    assert!(report.is_clean());
}

#[tokio::test]
async fn test_discovered_records_are_left_alone() {
    let mut cloud = base_mock();
    cloud.expect_delete().times(0);

    let descriptor = ResourceDescriptor::new(ResourceKind::Bucket, "bkt-shared");
    let mut record = ResourceRecord::from_descriptor(&descriptor, Origin::Discovered);
    record.label = labels::STATELESS.to_string();

    let report = TeardownCoordinator::default().tear_down(&cloud, vec![record]).await;
    assert_eq!(report.attempted(), 0);
}
