//! Property-based tests for filtering and label registration
//!
//! Uses proptest to check the skip-filter resolution rules and the
//! label-collision behavior of the registry across many inputs.

use dasein_tests::labels;
use dasein_tests::provider::ResourceKind;
use dasein_tests::registry::{LabelRegistry, ResourceRecord};
use dasein_tests::skip::SkipFilter;
use proptest::prelude::*;
use std::collections::HashSet;

// Never collides with generated names: they are plain lowercase letters
const UNRELATED: &str = "zz-unrelated";

fn join(items: &[String]) -> Option<String> {
    if items.is_empty() {
        None
    } else {
        Some(items.join(","))
    }
}

proptest! {
    #[test]
    fn test_no_lists_runs_everything(suite in "[A-Za-z]{1,12}", test in "[A-Za-z]{1,12}") {
        let filter = SkipFilter::from_lists(None, None);
        prop_assert!(filter.is_unrestricted());
        prop_assert!(filter.should_run(&suite, &test));
        prop_assert!(filter.may_run_suite(&suite));
    }

    #[test]
    fn test_filter_resolution_table(
        suite in "[a-z]{1,8}",
        test in "[a-z]{1,8}",
        include_suite in any::<bool>(),
        include_test in any::<bool>(),
        include_other in any::<bool>(),
        exclude_suite in any::<bool>(),
        exclude_test in any::<bool>(),
    ) {
        let qualified = format!("{}.{}", suite, test);

        let mut inclusions = Vec::new();
        if include_suite { inclusions.push(suite.clone()); }
        if include_test { inclusions.push(qualified.clone()); }
        if include_other { inclusions.push(UNRELATED.to_string()); }

        let mut exclusions = Vec::new();
        if exclude_suite { exclusions.push(suite.clone()); }
        if exclude_test { exclusions.push(qualified.clone()); }

        let filter = SkipFilter::from_lists(join(&inclusions).as_deref(), join(&exclusions).as_deref());

        let has_inclusions = !inclusions.is_empty();
        let expected = if has_inclusions && !include_suite && !include_test {
            false
        } else if exclude_suite || exclude_test {
            include_test
        } else {
            true
        };

        // Matching is case-insensitive on both sides
        prop_assert_eq!(filter.should_run(&suite.to_uppercase(), &test), expected);
        prop_assert_eq!(filter.should_run(&suite, &test.to_uppercase()), expected);
    }

    #[test]
    fn test_selected_tests_belong_to_runnable_suites(
        suite in "[a-z]{1,8}",
        test in "[a-z]{1,8}",
        include_suite in any::<bool>(),
        include_test in any::<bool>(),
    ) {
        let mut inclusions = vec![UNRELATED.to_string()];
        if include_suite { inclusions.push(suite.clone()); }
        if include_test { inclusions.push(format!("{}.{}", suite, test)); }

        let filter = SkipFilter::from_lists(join(&inclusions).as_deref(), None);
        if filter.should_run(&suite, &test) {
            prop_assert!(filter.may_run_suite(&suite));
        }
    }

    #[test]
    fn test_colliding_labels_stay_distinct(label in "[a-z]{1,10}", count in 1usize..24) {
        let (assigned, retrieved) = tokio_test::block_on(async {
            let registry = LabelRegistry::new(ResourceKind::Volume);
            let mut assigned = Vec::new();
            for i in 0..count {
                let record = registry
                    .register(&label, ResourceRecord::provisioned(ResourceKind::Volume, format!("vol-{}", i)))
                    .await;
                assigned.push(record.label);
            }
            let mut retrieved = Vec::new();
            for assigned_label in &assigned {
                retrieved.push(registry.get(assigned_label).await.map(|r| r.id));
            }
            (assigned, retrieved)
        });

        // The first registration keeps the requested label
        prop_assert_eq!(&assigned[0], &label);
        let unique: HashSet<_> = assigned.iter().collect();
        prop_assert_eq!(unique.len(), count);
        for (i, id) in retrieved.into_iter().enumerate() {
            prop_assert_eq!(id, Some(format!("vol-{}", i)));
        }
    }

    #[test]
    fn test_removed_labels_never_serve_stateless(tests in prop::collection::vec("[a-z]{1,8}", 1..6)) {
        let found = tokio_test::block_on(async {
            let registry = LabelRegistry::new(ResourceKind::Vlan);
            for (i, test) in tests.iter().enumerate() {
                registry
                    .register(&labels::removed_for(test), ResourceRecord::provisioned(ResourceKind::Vlan, format!("vlan-{}", i)))
                    .await;
            }
            registry.get_for_stateless().await
        });
        prop_assert!(found.is_none());
    }
}
