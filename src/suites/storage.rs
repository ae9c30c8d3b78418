use super::{need_resource, require_support};
use crate::error::ensure;
use crate::labels;
use crate::manager::TestManager;
use crate::provider::ResourceKind;
use crate::suite::{need, Suite, TestCase, TestFuture};
use futures::FutureExt;

/// Label shared by the root bucket and the objects put into it
const PROVISION: &str = "provision";

pub const SUITE: Suite = Suite {
    name: "StatefulStorageTests",
    tests: &[
        TestCase { name: "createBucket", run: create_bucket },
        TestCase { name: "uploadObject", run: upload_object },
        TestCase { name: "createChildBucket", run: create_child_bucket },
        TestCase { name: "removeObject", run: remove_object },
    ],
};

fn create_bucket(m: &TestManager) -> TestFuture<'_> {
    async move {
        require_support(m, ResourceKind::Bucket)?;
        let storage = &m.suite_resources().await?.storage;
        let id = need_resource(
            m,
            storage.get_test_bucket_id(PROVISION, true).await,
            &[ResourceKind::Bucket],
            "bucket",
        )?;
        m.out("Bucket", &id);

        let bucket = need(storage.buckets().describe(&id).await?, "bucket description")?;
        ensure(bucket.is_container, "bucket is not a container")?;
        ensure(bucket.owner.is_some(), "bucket has no owner")?;
        Ok(())
    }
    .boxed()
}

fn upload_object(m: &TestManager) -> TestFuture<'_> {
    async move {
        require_support(m, ResourceKind::Object)?;
        let storage = &m.suite_resources().await?.storage;
        let object = need_resource(
            m,
            storage.get_test_object_id(PROVISION, true, PROVISION).await,
            &[ResourceKind::Object, ResourceKind::Bucket],
            "object",
        )?;
        let bucket = need(storage.get_test_bucket_id(PROVISION, false).await, "bucket")?;
        m.out("Object", &object);

        let listed = m
            .provider()
            .await?
            .list(ResourceKind::Object, Some(bucket.clone()))
            .await?;
        ensure(
            listed.iter().any(|o| o.id == object),
            format!("object {} not listed in bucket {}", object, bucket),
        )?;
        m.ok("Object listed in its bucket");
        Ok(())
    }
    .boxed()
}

fn create_child_bucket(m: &TestManager) -> TestFuture<'_> {
    async move {
        require_support(m, ResourceKind::Bucket)?;
        let storage = &m.suite_resources().await?.storage;
        let root = need_resource(
            m,
            storage.get_test_bucket_id(PROVISION, true).await,
            &[ResourceKind::Bucket],
            "bucket",
        )?;
        let child = need_resource(
            m,
            storage.get_test_child_bucket_id("child", true, &root).await,
            &[ResourceKind::Bucket],
            "child bucket",
        )?;

        let described = need(storage.buckets().describe(&root).await?, "bucket description")?;
        ensure(
            described.child_count.unwrap_or(0) > 0,
            "root bucket reports no children",
        )?;
        m.out("Child bucket", &child);
        Ok(())
    }
    .boxed()
}

fn remove_object(m: &TestManager) -> TestFuture<'_> {
    async move {
        require_support(m, ResourceKind::Object)?;
        let storage = &m.suite_resources().await?.storage;
        // Left for end-of-test release to delete
        let id = need_resource(
            m,
            storage
                .get_test_object_id(&labels::removed_for("removeObject"), true, PROVISION)
                .await,
            &[ResourceKind::Object, ResourceKind::Bucket],
            "object",
        )?;
        ensure(storage.objects().describe(&id).await?.is_some(), "object not found")?;
        Ok(())
    }
    .boxed()
}
