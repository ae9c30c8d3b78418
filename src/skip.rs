//! Include/exclude filtering of suites and tests
//!
//! Entries are lowercase `suite` or `suite.test` strings. Resolution:
//!
//! 1. No inclusions and no exclusions: run everything.
//! 2. With inclusions, a test runs only if its suite or its exact
//!    `suite.test` is included; otherwise it is skipped without looking at
//!    exclusions.
//! 3. An excluded `suite.test` or `suite` is skipped, unless the exact
//!    `suite.test` was explicitly included (explicit inclusion wins).
//! 4. Anything else runs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Resolved inclusion/exclusion lists
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipFilter {
    inclusions: Option<BTreeSet<String>>,
    exclusions: Option<BTreeSet<String>>,
}

impl SkipFilter {
    /// Empty sets count as absent.
    pub fn new(inclusions: Option<BTreeSet<String>>, exclusions: Option<BTreeSet<String>>) -> Self {
        Self {
            inclusions: inclusions.map(lowercase_all).filter(|s| !s.is_empty()),
            exclusions: exclusions.map(lowercase_all).filter(|s| !s.is_empty()),
        }
    }

    /// Build from comma-separated lists as they appear in config and env vars.
    /// Blank or missing lists count as absent.
    pub fn from_lists(inclusions: Option<&str>, exclusions: Option<&str>) -> Self {
        Self {
            inclusions: inclusions.and_then(parse_list),
            exclusions: exclusions.and_then(parse_list),
        }
    }

    pub fn is_unrestricted(&self) -> bool {
        self.inclusions.is_none() && self.exclusions.is_none()
    }

    /// Whether `suite.test` should run
    pub fn should_run(&self, suite: &str, test: &str) -> bool {
        if self.is_unrestricted() {
            return true;
        }

        let suite = suite.to_lowercase();
        let qualified = format!("{}.{}", suite, test.to_lowercase());

        let mut test_explicitly_included = false;
        if let Some(inclusions) = &self.inclusions {
            let suite_included = inclusions.contains(&suite);
            test_explicitly_included = inclusions.contains(&qualified);
            if !suite_included && !test_explicitly_included {
                return false;
            }
        }

        if let Some(exclusions) = &self.exclusions {
            if exclusions.contains(&qualified) || exclusions.contains(&suite) {
                return test_explicitly_included;
            }
        }

        true
    }

    /// Whether any test of `suite` could run; lets a runner skip suite setup
    pub fn may_run_suite(&self, suite: &str) -> bool {
        let suite = suite.to_lowercase();
        match &self.inclusions {
            None => true,
            Some(inclusions) => {
                let prefix = format!("{}.", suite);
                inclusions.contains(&suite) || inclusions.iter().any(|i| i.starts_with(&prefix))
            }
        }
    }
}

fn parse_list(raw: &str) -> Option<BTreeSet<String>> {
    let items: BTreeSet<String> = raw
        .split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect();
    if items.is_empty() {
        None
    } else {
        Some(items)
    }
}

fn lowercase_all(set: BTreeSet<String>) -> BTreeSet<String> {
    set.into_iter().map(|s| s.to_lowercase()).collect()
}
