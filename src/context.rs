//! Run-wide state shared by every suite
//!
//! A [`TestContext`] is built once per run with [`TestContext::init`] and
//! handed to each suite's [`crate::manager::TestManager`]. It owns the
//! run-wide [`ResourceSet`] (resources shared across suites), the skip
//! filter, wait budgets and the name generator. [`TestContext::close`]
//! sweeps whatever the run still owns.

use crate::config::Config;
use crate::error::Result;
use crate::naming::NameGenerator;
use crate::provider::{CloudProvider, ProviderContext, ProviderFactory};
use crate::resources::ResourceSet;
use crate::skip::SkipFilter;
use crate::teardown::{TeardownCoordinator, TeardownReport};
use crate::wait::WaitBudgets;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

pub struct TestContext {
    run_id: Uuid,
    started_at: DateTime<Utc>,
    provider_ctx: ProviderContext,
    factory: Arc<dyn ProviderFactory>,
    filter: SkipFilter,
    budgets: WaitBudgets,
    teardown: TeardownCoordinator,
    names: Arc<NameGenerator>,
    resources: ResourceSet,
}

impl TestContext {
    /// Validate `config`, connect the run-wide provider session and set up
    /// empty registries
    pub async fn init(config: &Config, factory: Arc<dyn ProviderFactory>) -> Result<Self> {
        config.validate()?;

        let run_id = Uuid::new_v4();
        let provider_ctx = config.provider.to_context();
        let budgets = config.timeouts.budgets();
        let teardown = TeardownCoordinator::new(config.timeouts.settle());
        let names = Arc::new(NameGenerator::new(config.naming.prefix.clone()));

        let provider = factory.connect(&provider_ctx).await?;
        info!(
            run_id = %run_id,
            provider = %provider.provider_name(),
            cloud = %provider.cloud_name(),
            "Test run initialized"
        );

        let resources = ResourceSet::new(provider, names.clone(), &budgets, teardown.clone());
        Ok(Self {
            run_id,
            started_at: Utc::now(),
            provider_ctx,
            factory,
            filter: config.skip_filter(),
            budgets,
            teardown,
            names,
            resources,
        })
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn filter(&self) -> &SkipFilter {
        &self.filter
    }

    pub fn budgets(&self) -> &WaitBudgets {
        &self.budgets
    }

    pub fn names(&self) -> &Arc<NameGenerator> {
        &self.names
    }

    /// Resources shared by every suite in the run
    pub fn resources(&self) -> &ResourceSet {
        &self.resources
    }

    /// Open a fresh provider session
    pub async fn connect(&self) -> Result<Arc<dyn CloudProvider>> {
        self.factory.connect(&self.provider_ctx).await
    }

    /// Empty resource set over `provider`, sharing this run's settings
    pub fn resource_set(&self, provider: Arc<dyn CloudProvider>) -> ResourceSet {
        ResourceSet::new(provider, self.names.clone(), &self.budgets, self.teardown.clone())
    }

    /// Tear down everything the run still owns and end the session.
    /// Never fails; problems are logged and reported.
    pub async fn close(&self) -> TeardownReport {
        let report = self.resources.close().await;
        if let Err(e) = self.resources.provider().close().await {
            warn!(error = %e, "Failed to close provider session");
        }
        info!(
            run_id = %self.run_id,
            deleted = report.deleted.len(),
            failed = report.failed.len(),
            "Test run closed"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels;
    use crate::providers::memory::{InMemoryFactory, InMemoryProvider};

    #[tokio::test]
    async fn test_init_rejects_invalid_config() {
        let mut config = Config::default();
        config.timeouts.poll_interval_secs = 0;
        let factory = Arc::new(InMemoryFactory::new(Arc::new(InMemoryProvider::new())));
        assert!(TestContext::init(&config, factory).await.is_err());
    }

    #[tokio::test]
    async fn test_close_sweeps_run_resources() {
        let provider = Arc::new(InMemoryProvider::new());
        let factory = Arc::new(InMemoryFactory::new(provider.clone()));
        let ctx = TestContext::init(&Config::default(), factory).await.unwrap();

        ctx.resources()
            .network
            .get_test_vlan_id(labels::STATEFUL, true)
            .await
            .unwrap();
        assert_eq!(provider.resource_count().await, 1);

        let report = ctx.close().await;
        assert_eq!(report.deleted.len(), 1);
        assert_eq!(provider.resource_count().await, 0);
        assert_eq!(provider.close_count().await, 1);
    }
}
