//! Test suite
//!
//! All test cases loaded from one test module.

use futures::future::{FutureExt, LocalBoxFuture};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use super::case::{CaseSettings, TestCase};
use super::tree::{Reducer, ReductionNode, RunOptions, Runnable};
use crate::discovery::{suite_name, ModuleLoader};
use crate::error::EngineError;
use crate::models::{CaseSummary, Module, SetResult, SetSummary};
use crate::utils::panic_error;

/// Folds case summaries into a suite summary
#[derive(Clone, Copy, Debug, Default)]
pub struct SuiteReducer;

impl Reducer<CaseSummary> for SuiteReducer {
    type Summary = SetSummary;

    fn initial(&self) -> SetSummary {
        SetSummary::for_suite()
    }

    fn reduce(&self, mut summary: SetSummary, case: &CaseSummary) -> SetSummary {
        summary.tests.total += 1;
        summary.assertions.absorb(&case.assertions);
        summary.aborted = summary.aborted || case.aborted;

        if case.skipped {
            summary.tests.skipped += 1;
        }
        if !case.passed {
            summary.passed = false;
            if case.errored {
                summary.tests.errored += 1;
            } else {
                summary.tests.failed += 1;
            }
        }
        summary
    }
}

pub struct Suite {
    path: Option<PathBuf>,
    load_error: Option<anyhow::Error>,
    load_summary: Option<SetSummary>,
    node: ReductionNode<TestCase, SuiteReducer>,
}

impl Suite {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            path: None,
            load_error: None,
            load_summary: None,
            node: ReductionNode::new(name, SuiteReducer),
        }
    }

    /// Build a suite from a module's exports, in export order
    pub fn from_module(name: impl Into<String>, module: Module, settings: &CaseSettings) -> Self {
        let cases = module
            .flatten()
            .into_iter()
            .map(|definition| TestCase::from_definition(definition).with_settings(*settings));

        let mut suite = Self::new(name);
        suite.node = suite.node.with_children(cases);
        suite
    }

    /// Load the module behind a test file. A loader error or panic leaves the
    /// suite in `LoadError`.
    pub fn load(path: &Path, loader: &dyn ModuleLoader, settings: &CaseSettings) -> Self {
        let name = suite_name(path);
        let loaded = catch_unwind(AssertUnwindSafe(|| loader.load(path)))
            .unwrap_or_else(|payload| Err(panic_error(payload)));

        let mut suite = match loaded {
            Ok(module) => Self::from_module(name, module, settings),
            Err(error) => {
                warn!("Failed to load {}: {:#}", path.display(), error);
                let mut suite = Self::new(name);
                suite.load_error = Some(error);
                suite
            }
        };
        suite.path = Some(path.to_path_buf());
        suite
    }

    pub fn add_test(&mut self, case: TestCase) -> Result<(), EngineError> {
        self.node.add_child(case)
    }

    pub fn name(&self) -> &str {
        self.node.name()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn load_error(&self) -> Option<&anyhow::Error> {
        self.load_error.as_ref()
    }

    pub fn tests(&self) -> &[TestCase] {
        self.node.children()
    }

    pub fn result(&self) -> SetResult {
        if self.load_error.is_some() {
            SetResult::LoadError
        } else if self.node.is_empty() {
            SetResult::NoTests
        } else {
            self.node.result()
        }
    }

    pub fn summary(&self) -> Option<&SetSummary> {
        if self.load_error.is_some() {
            self.load_summary.as_ref()
        } else {
            self.node.summary()
        }
    }

    /// Sum of the durations of the tests that ran
    pub fn duration(&self) -> Duration {
        self.node.executed().iter().map(TestCase::duration).sum()
    }

    pub async fn run(&mut self, options: &RunOptions) -> Result<SetSummary, EngineError> {
        if self.load_error.is_some() {
            let summary = SetSummary::load_failure();
            self.load_summary = Some(summary.clone());
            return Ok(summary);
        }

        info!("Running suite {}", self.name());
        self.node.run(options).await
    }
}

impl Runnable for Suite {
    type Summary = SetSummary;

    fn execute<'a>(
        &'a mut self,
        options: &'a RunOptions,
    ) -> LocalBoxFuture<'a, Result<SetSummary, EngineError>> {
        self.run(options).boxed_local()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::ModuleRegistry;
    use crate::models::{Group, Outcome};

    fn passing_module() -> Module {
        Module::new()
            .test("one", |t| {
                t.ok(true);
                Ok(Outcome::resolved())
            })
            .group(Group::new("pair").test("two", |t| {
                t.equal(1, 1);
                t.equal(2, 2);
                Ok(Outcome::resolved())
            }))
    }

    #[tokio::test]
    async fn test_suite_counts() {
        let mut suite = Suite::from_module("math_test", passing_module(), &CaseSettings::default());
        assert_eq!(suite.result(), SetResult::Untested);
        assert_eq!(suite.tests()[1].name(), "pair : two");

        let summary = suite.run(&RunOptions::default()).await.unwrap();
        assert!(summary.passed);
        assert_eq!(summary.tests.total, 2);
        assert_eq!(summary.assertions.total, 3);
        assert_eq!(suite.result(), SetResult::Passed);
        assert!(summary.suites.is_none());
    }

    #[tokio::test]
    async fn test_failed_and_errored_counts() {
        let module = Module::new()
            .test("fails", |t| {
                t.ok(false);
                Ok(Outcome::resolved())
            })
            .test("errors", |_| Err(anyhow::anyhow!("bad")))
            .test("skips", |t| {
                t.skip();
                Ok(Outcome::Pending)
            });
        let mut suite = Suite::from_module("mixed_test", module, &CaseSettings::default());

        let summary = suite.run(&RunOptions::default()).await.unwrap();
        assert!(!summary.passed);
        assert_eq!(summary.tests.failed, 1);
        assert_eq!(summary.tests.errored, 1);
        assert_eq!(summary.tests.skipped, 1);
        assert_eq!(summary.tests.total, 3);
        assert_eq!(suite.result(), SetResult::Failed);
    }

    #[tokio::test]
    async fn test_setup_failure_aborts_remaining_tests() {
        let module = Module::new()
            .setup(|_| Err(anyhow::anyhow!("no fixture")))
            .test("first", |_| Ok(Outcome::resolved()))
            .test("second", |_| Ok(Outcome::resolved()));
        let mut suite = Suite::from_module("fixture_test", module, &CaseSettings::default());

        let summary = suite.run(&RunOptions::default()).await.unwrap();
        assert!(summary.aborted);
        assert_eq!(summary.tests.total, 1);
        assert_eq!(summary.tests.errored, 1);
    }

    #[tokio::test]
    async fn test_load_error() {
        let registry = ModuleRegistry::new().register("broken_test", || {
            Err(anyhow::anyhow!("does not compile"))
        });
        let mut suite = Suite::load(
            Path::new("/suites/broken_test.rs"),
            &registry,
            &CaseSettings::default(),
        );

        assert_eq!(suite.name(), "broken_test");
        assert_eq!(suite.result(), SetResult::LoadError);
        assert!(suite.load_error().is_some());

        let summary = suite.run(&RunOptions::default()).await.unwrap();
        assert_eq!(summary, SetSummary::load_failure());
        assert_eq!(suite.summary(), Some(&SetSummary::load_failure()));
    }

    #[tokio::test]
    async fn test_panicking_loader() {
        let registry = ModuleRegistry::new().register("panics_test", || panic!("loader bug"));
        let suite = Suite::load(Path::new("panics_test.rs"), &registry, &CaseSettings::default());

        assert_eq!(suite.result(), SetResult::LoadError);
        assert_eq!(
            suite.load_error().unwrap().to_string(),
            "panicked: loader bug"
        );
    }

    #[tokio::test]
    async fn test_no_tests() {
        let mut suite = Suite::from_module("empty_test", Module::new(), &CaseSettings::default());
        let summary = suite.run(&RunOptions::default()).await.unwrap();
        assert!(summary.passed);
        assert_eq!(suite.result(), SetResult::NoTests);
    }
}
