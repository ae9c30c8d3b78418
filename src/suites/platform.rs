use super::{need_resource, require_support};
use crate::error::ensure;
use crate::labels;
use crate::manager::TestManager;
use crate::provider::{ResourceKind, ResourceState};
use crate::suite::{need, Suite, TestCase, TestFuture};
use futures::FutureExt;

pub const SUITE: Suite = Suite {
    name: "StatefulPlatformTests",
    tests: &[TestCase { name: "createDatabase", run: create_database }],
};

fn create_database(m: &TestManager) -> TestFuture<'_> {
    async move {
        require_support(m, ResourceKind::Database)?;
        let platform = &m.resources().platform;
        let id = need_resource(
            m,
            platform.get_test_database_id(labels::STATEFUL, true).await,
            &[ResourceKind::Database],
            "database",
        )?;
        m.out("Database", &id);

        let db = need(platform.databases().describe(&id).await?, "database description")?;
        ensure(db.state == ResourceState::Available, format!("database is {}", db.state))?;
        ensure(
            db.name.as_deref().map(|n| n == n.to_lowercase()).unwrap_or(false),
            "database name is not a lowercase DNS-style label",
        )?;
        Ok(())
    }
    .boxed()
}
