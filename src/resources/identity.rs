//! Keypairs, groups and users

use crate::labels;
use crate::naming::NameGenerator;
use crate::provider::{CloudProvider, ProvisionParams, ResourceId, ResourceKind};
use crate::provisioner::KindManager;
use std::sync::Arc;

pub struct IdentityResources {
    keypairs: KindManager,
    groups: KindManager,
    users: KindManager,
}

impl IdentityResources {
    pub fn new(provider: Arc<dyn CloudProvider>, names: Arc<NameGenerator>) -> Self {
        Self {
            keypairs: KindManager::new(ResourceKind::Keypair, provider.clone(), names.clone()),
            groups: KindManager::new(ResourceKind::Group, provider.clone(), names.clone()),
            users: KindManager::new(ResourceKind::User, provider, names),
        }
    }

    pub fn keypairs(&self) -> &KindManager {
        &self.keypairs
    }

    pub fn groups(&self) -> &KindManager {
        &self.groups
    }

    pub fn users(&self) -> &KindManager {
        &self.users
    }

    pub(crate) fn managers(&self) -> [&KindManager; 3] {
        [&self.keypairs, &self.groups, &self.users]
    }

    pub async fn get_test_keypair_id(&self, label: &str, provision: bool) -> Option<ResourceId> {
        self.keypairs
            .get_or_provision(label, provision, ProvisionParams::default())
            .await
            .map(|r| r.id)
    }

    pub async fn get_test_group_id(&self, label: &str, provision: bool) -> Option<ResourceId> {
        let params = ProvisionParams::default().with_attribute("path", "/dasein/");
        self.groups
            .get_or_provision(label, provision, params)
            .await
            .map(|r| r.id)
    }

    /// A user, placed in the shared group when the provider has groups
    pub async fn get_test_user_id(&self, label: &str, provision: bool) -> Option<ResourceId> {
        self.users
            .get_or_provision_with(label, provision, || async {
                let params = ProvisionParams::default();
                Some(match self.get_test_group_id(labels::STATEFUL, true).await {
                    Some(group) => params.with_parent(group),
                    None => params,
                })
            })
            .await
            .map(|r| r.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::memory::InMemoryProvider;

    #[tokio::test]
    async fn test_user_lands_in_shared_group() {
        let provider = Arc::new(InMemoryProvider::new());
        let identity = IdentityResources::new(provider.clone(), Arc::new(NameGenerator::default()));

        let user = identity.get_test_user_id(labels::STATEFUL, true).await.unwrap();
        let group = identity.get_test_group_id(labels::STATEFUL, false).await.unwrap();

        let described = identity.users().describe(&user).await.unwrap().unwrap();
        assert_eq!(described.parent_id.as_deref(), Some(group.as_str()));
        assert_eq!(provider.create_count(ResourceKind::Group).await, 1);
    }

    #[tokio::test]
    async fn test_user_without_group_support() {
        let provider = Arc::new(
            InMemoryProvider::builder()
                .unsupported(ResourceKind::Group)
                .build(),
        );
        let identity = IdentityResources::new(provider.clone(), Arc::new(NameGenerator::default()));

        let user = identity.get_test_user_id(labels::STATEFUL, true).await.unwrap();
        let described = identity.users().describe(&user).await.unwrap().unwrap();
        assert!(described.parent_id.is_none());
    }
}
