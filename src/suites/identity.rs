use super::{need_resource, require_support};
use crate::error::ensure;
use crate::labels;
use crate::manager::TestManager;
use crate::provider::ResourceKind;
use crate::suite::{need, Suite, TestCase, TestFuture};
use futures::FutureExt;

pub const SUITE: Suite = Suite {
    name: "StatefulIdentityTests",
    tests: &[
        TestCase { name: "createKeypair", run: create_keypair },
        TestCase { name: "createGroup", run: create_group },
        TestCase { name: "createUserInGroup", run: create_user_in_group },
    ],
};

fn create_keypair(m: &TestManager) -> TestFuture<'_> {
    async move {
        require_support(m, ResourceKind::Keypair)?;
        let identity = &m.resources().identity;
        let id = need_resource(
            m,
            identity.get_test_keypair_id(labels::STATEFUL, true).await,
            &[ResourceKind::Keypair],
            "keypair",
        )?;
        m.out("Keypair", &id);
        ensure(identity.keypairs().describe(&id).await?.is_some(), "keypair not found")?;
        Ok(())
    }
    .boxed()
}

fn create_group(m: &TestManager) -> TestFuture<'_> {
    async move {
        require_support(m, ResourceKind::Group)?;
        let identity = &m.resources().identity;
        let id = need_resource(
            m,
            identity.get_test_group_id(labels::STATEFUL, true).await,
            &[ResourceKind::Group],
            "group",
        )?;
        let group = need(identity.groups().describe(&id).await?, "group description")?;
        ensure(
            group.tags.get("path").map(String::as_str) == Some("/dasein/"),
            "group path was not applied",
        )?;
        m.out("Group", &id);
        Ok(())
    }
    .boxed()
}

fn create_user_in_group(m: &TestManager) -> TestFuture<'_> {
    async move {
        require_support(m, ResourceKind::User)?;
        let identity = &m.resources().identity;
        let user = need_resource(
            m,
            identity.get_test_user_id(labels::STATEFUL, true).await,
            &[ResourceKind::User],
            "user",
        )?;
        m.out("User", &user);

        if let Some(group) = identity.get_test_group_id(labels::STATEFUL, false).await {
            let described = need(identity.users().describe(&user).await?, "user description")?;
            ensure(
                described.parent_id.as_deref() == Some(group.as_str()),
                "user was not placed in the shared group",
            )?;
            m.ok("User is a member of the shared group");
        } else {
            m.skip("No group support, user created standalone");
        }
        Ok(())
    }
    .boxed()
}
