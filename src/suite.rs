//! Statically registered suites and the runner that executes them
//!
//! Suites are plain tables of `(name, fn)` pairs built at compile time.
//! The runner walks them in order, one [`TestManager`] per suite, applying
//! the skip filter, timing each test and classifying its result:
//!
//! - `Ok(())` passes
//! - an [`DaseinError::is_skip`] error is a skip (feature not there)
//! - any other error, or a panic, fails the test
//!
//! Teardown output is collected into the report but never fails the run.

use crate::context::TestContext;
use crate::error::{DaseinError, Result};
use crate::manager::TestManager;
use crate::skip::SkipFilter;
use crate::teardown::TeardownReport;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::Serialize;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use uuid::Uuid;

pub type TestFuture<'a> = BoxFuture<'a, Result<()>>;

/// A test body; receives its suite's manager
pub type TestFn = for<'a> fn(&'a TestManager) -> TestFuture<'a>;

pub struct TestCase {
    pub name: &'static str,
    pub run: TestFn,
}

pub struct Suite {
    pub name: &'static str,
    pub tests: &'static [TestCase],
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum Outcome {
    Passed,
    Skipped(String),
    /// Not selected by the include/exclude filters
    Filtered,
    Failed(String),
}

impl Outcome {
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Passed => "passed",
            Outcome::Skipped(_) => "skipped",
            Outcome::Filtered => "filtered",
            Outcome::Failed(_) => "failed",
        }
    }

    fn from_result(result: std::result::Result<Result<()>, String>) -> Self {
        match result {
            Ok(Ok(())) => Outcome::Passed,
            Ok(Err(e)) if e.is_skip() => Outcome::Skipped(e.to_string()),
            Ok(Err(e)) => Outcome::Failed(e.to_string()),
            Err(panic) => Outcome::Failed(format!("panicked: {}", panic)),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TestResult {
    pub suite: String,
    pub test: String,
    pub outcome: Outcome,
    pub duration: Duration,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub run_id: Option<Uuid>,
    pub suites: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub filtered: usize,
    pub results: Vec<TestResult>,
    pub teardown: TeardownReport,
}

impl RunReport {
    fn record(&mut self, result: TestResult) {
        match result.outcome {
            Outcome::Passed => self.passed += 1,
            Outcome::Skipped(_) => self.skipped += 1,
            Outcome::Filtered => self.filtered += 1,
            Outcome::Failed(_) => self.failed += 1,
        }
        self.results.push(result);
    }

    /// No test failed; teardown leftovers don't count
    pub fn success(&self) -> bool {
        self.failed == 0
    }
}

/// Every `(suite, test)` pair with whether `filter` selects it
pub fn plan(suites: &[Suite], filter: &SkipFilter) -> Vec<(&'static str, &'static str, bool)> {
    suites
        .iter()
        .flat_map(|suite| {
            suite
                .tests
                .iter()
                .map(move |case| (suite.name, case.name, filter.should_run(suite.name, case.name)))
        })
        .collect()
}

pub struct SuiteRunner {
    ctx: Arc<TestContext>,
}

impl SuiteRunner {
    pub fn new(ctx: Arc<TestContext>) -> Self {
        Self { ctx }
    }

    /// Run `suites` in order, then close the run context
    pub async fn run(&self, suites: &[Suite]) -> RunReport {
        let mut report = RunReport {
            run_id: Some(self.ctx.run_id()),
            ..Default::default()
        };

        for suite in suites {
            self.run_suite(suite, &mut report).await;
        }

        report.teardown.merge(self.ctx.close().await);
        info!(
            passed = report.passed,
            failed = report.failed,
            skipped = report.skipped,
            filtered = report.filtered,
            "Run complete"
        );
        report
    }

    async fn run_suite(&self, suite: &Suite, report: &mut RunReport) {
        report.suites += 1;
        let filter = self.ctx.filter();

        if !filter.may_run_suite(suite.name) {
            for case in suite.tests {
                report.record(filtered(suite, case));
            }
            return;
        }

        let manager = TestManager::new(self.ctx.clone(), suite.name);
        for case in suite.tests {
            if !manager.should_run(case.name) {
                report.record(filtered(suite, case));
                continue;
            }

            manager.begin(case.name);
            let start = Instant::now();
            let result = AssertUnwindSafe((case.run)(&manager))
                .catch_unwind()
                .await
                .map_err(panic_message);
            let duration = start.elapsed();
            let outcome = Outcome::from_result(result);

            match &outcome {
                Outcome::Failed(message) => manager.error(message),
                Outcome::Skipped(reason) => manager.skip(reason),
                _ => {}
            }
            report.teardown.merge(manager.end().await);
            report.record(TestResult {
                suite: suite.name.to_string(),
                test: case.name.to_string(),
                outcome,
                duration,
            });
        }

        let teardown = manager.close().await;
        if !teardown.is_clean() {
            warn!(
                suite = suite.name,
                failed = teardown.failed.len(),
                "Suite teardown left resources behind"
            );
        }
        report.teardown.merge(teardown);
    }
}

fn filtered(suite: &Suite, case: &TestCase) -> TestResult {
    TestResult {
        suite: suite.name.to_string(),
        test: case.name.to_string(),
        outcome: Outcome::Filtered,
        duration: Duration::ZERO,
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Turn a missing resource into a test failure
pub fn need<T>(value: Option<T>, what: &str) -> Result<T> {
    value.ok_or_else(|| DaseinError::Assertion(format!("no {} available", what)))
}
