//! Buckets and the objects inside them

use crate::naming::NameGenerator;
use crate::provider::{CloudProvider, ProvisionParams, ResourceId, ResourceKind};
use crate::provisioner::KindManager;
use std::sync::Arc;

pub struct StorageResources {
    buckets: KindManager,
    objects: KindManager,
}

impl StorageResources {
    pub fn new(provider: Arc<dyn CloudProvider>, names: Arc<NameGenerator>) -> Self {
        Self {
            buckets: KindManager::new(ResourceKind::Bucket, provider.clone(), names.clone()),
            objects: KindManager::new(ResourceKind::Object, provider, names),
        }
    }

    pub fn buckets(&self) -> &KindManager {
        &self.buckets
    }

    pub fn objects(&self) -> &KindManager {
        &self.objects
    }

    pub(crate) fn managers(&self) -> [&KindManager; 2] {
        [&self.buckets, &self.objects]
    }

    /// A top-level bucket
    pub async fn get_test_bucket_id(&self, label: &str, provision: bool) -> Option<ResourceId> {
        self.buckets
            .get_or_provision(label, provision, ProvisionParams::default())
            .await
            .map(|r| r.id)
    }

    /// A bucket nested inside `parent`
    pub async fn get_test_child_bucket_id(
        &self,
        label: &str,
        provision: bool,
        parent: &ResourceId,
    ) -> Option<ResourceId> {
        let params = ProvisionParams::default().with_parent(parent.clone());
        self.buckets
            .get_or_provision(label, provision, params)
            .await
            .map(|r| r.id)
    }

    /// An object inside the bucket registered as `bucket_label`, which is
    /// provisioned first if needed
    pub async fn get_test_object_id(
        &self,
        label: &str,
        provision: bool,
        bucket_label: &str,
    ) -> Option<ResourceId> {
        self.objects
            .get_or_provision_with(label, provision, || async {
                let bucket = self.get_test_bucket_id(bucket_label, true).await?;
                Some(
                    ProvisionParams::default()
                        .with_parent(bucket)
                        .with_attribute("content", "dasein test object"),
                )
            })
            .await
            .map(|r| r.id)
    }
}
