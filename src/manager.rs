//! Per-suite test manager
//!
//! One [`TestManager`] exists per suite. It connects its own provider
//! session on first use, tracks the running test for log prefixes, and
//! releases per-test resources when a test ends. Resources that should
//! outlive the suite come from the run-wide context instead of
//! [`TestManager::suite_resources`].

use crate::context::TestContext;
use crate::error::{DaseinError, Result};
use crate::naming::log_prefix;
use crate::provider::{CloudProvider, ResourceKind};
use crate::registry::ResourceRecord;
use crate::resources::ResourceSet;
use crate::teardown::TeardownReport;
use std::fmt::Display;
use std::sync::{Arc, RwLock};
use tokio::sync::OnceCell;
use tracing::{debug, error, info, warn};

pub struct TestManager {
    ctx: Arc<TestContext>,
    suite: String,
    provider: OnceCell<Arc<dyn CloudProvider>>,
    suite_resources: OnceCell<ResourceSet>,
    current: RwLock<Option<String>>,
}

impl TestManager {
    pub fn new(ctx: Arc<TestContext>, suite: impl Into<String>) -> Self {
        Self {
            ctx,
            suite: suite.into(),
            provider: OnceCell::new(),
            suite_resources: OnceCell::new(),
            current: RwLock::new(None),
        }
    }

    pub fn suite(&self) -> &str {
        &self.suite
    }

    pub fn context(&self) -> &Arc<TestContext> {
        &self.ctx
    }

    /// Resources shared with every other suite in the run
    pub fn resources(&self) -> &ResourceSet {
        self.ctx.resources()
    }

    /// This suite's provider session, connected on first use
    pub async fn provider(&self) -> Result<Arc<dyn CloudProvider>> {
        let provider = self
            .provider
            .get_or_try_init(|| async {
                debug!(suite = %self.suite, "Connecting provider for suite");
                self.ctx.connect().await
            })
            .await?;
        Ok(provider.clone())
    }

    /// Resources owned by this suite, released by [`Self::close`]
    pub async fn suite_resources(&self) -> Result<&ResourceSet> {
        self.suite_resources
            .get_or_try_init(|| async {
                let provider = self.provider().await?;
                Ok::<_, DaseinError>(self.ctx.resource_set(provider))
            })
            .await
    }

    pub fn should_run(&self, test: &str) -> bool {
        self.ctx.filter().should_run(&self.suite, test)
    }

    pub fn current_test(&self) -> Option<String> {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Fixed-width prefix for the suite and, during a test, the test name
    pub fn prefix(&self) -> String {
        let provider = self.ctx.resources().provider();
        log_prefix(
            &provider.provider_name(),
            &provider.cloud_name(),
            &self.suite,
            self.current_test().as_deref(),
        )
    }

    pub fn begin(&self, test: &str) {
        *self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(test.to_string());
        info!("{}BEGIN", self.prefix());
    }

    /// Finish the running test, releasing anything it provisioned under a
    /// removal label
    pub async fn end(&self) -> TeardownReport {
        let mut report = self.ctx.resources().release_removed().await;
        if let Some(resources) = self.suite_resources.get() {
            report.merge(resources.release_removed().await);
        }
        info!("{}END", self.prefix());
        *self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
        report
    }

    /// Record for `label` in the shared set, or a provisioning error
    pub async fn require(&self, kind: ResourceKind, label: &str) -> Result<ResourceRecord> {
        let manager = self
            .resources()
            .manager(kind)
            .ok_or(DaseinError::Unsupported { kind })?;
        manager
            .registry()
            .get(label)
            .await
            .ok_or_else(|| DaseinError::Provisioning {
                kind,
                label: label.to_string(),
                message: "not provisioned".to_string(),
            })
    }

    /// Skip-class error for `kind` if the provider declares it unsupported,
    /// or a create of it has already been refused in this run
    pub fn unavailable(&self, kind: ResourceKind) -> Option<DaseinError> {
        let shared = self.resources().manager(kind);
        let own = self.suite_resources.get().and_then(|set| set.manager(kind));
        shared.into_iter().chain(own).find_map(|m| m.unavailable())
    }

    pub fn out(&self, key: &str, value: impl Display) {
        info!("{}{}: {}", self.prefix(), key, value);
    }

    pub fn ok(&self, message: &str) {
        info!("{}{} (OK)", self.prefix(), message);
    }

    pub fn skip(&self, message: &str) {
        info!("{}SKIPPING: {}", self.prefix(), message);
    }

    pub fn warn(&self, message: &str) {
        warn!("{}WARNING: {}", self.prefix(), message);
    }

    pub fn error(&self, message: &str) {
        error!("{}ERROR: {}", self.prefix(), message);
    }

    /// Release the suite's own resources and close its session
    pub async fn close(&self) -> TeardownReport {
        let report = match self.suite_resources.get() {
            Some(resources) => resources.close().await,
            None => TeardownReport::default(),
        };
        if let Some(provider) = self.provider.get() {
            if let Err(e) = provider.close().await {
                warn!(suite = %self.suite, error = %e, "Failed to close provider session");
            }
        }
        report
    }
}
