//! Managed relational databases

use crate::naming::NameGenerator;
use crate::provider::{CloudProvider, ProvisionParams, ResourceId, ResourceKind};
use crate::provisioner::KindManager;
use crate::wait::WaitBudgets;
use std::sync::Arc;

pub struct PlatformResources {
    databases: KindManager,
}

impl PlatformResources {
    pub fn new(
        provider: Arc<dyn CloudProvider>,
        names: Arc<NameGenerator>,
        budgets: &WaitBudgets,
    ) -> Self {
        Self {
            databases: KindManager::new(ResourceKind::Database, provider, names)
                .with_ready_wait(budgets.for_kind(ResourceKind::Database)),
        }
    }

    pub fn databases(&self) -> &KindManager {
        &self.databases
    }

    pub(crate) fn managers(&self) -> [&KindManager; 1] {
        [&self.databases]
    }

    pub async fn get_test_database_id(&self, label: &str, provision: bool) -> Option<ResourceId> {
        let params = ProvisionParams::default()
            .with_attribute("engine", "mysql")
            .with_attribute("product", "small")
            .with_attribute("storage_gb", "5");
        self.databases
            .get_or_provision(label, provision, params)
            .await
            .map(|r| r.id)
    }
}
