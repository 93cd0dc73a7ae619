//! Test run
//!
//! The root of the tree: every suite discovered from the input paths.

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use super::case::CaseSettings;
use super::suite::Suite;
use super::tree::{Reducer, ReductionNode, RunOptions};
use crate::discovery::{is_test_file, list_tree, ModuleLoader};
use crate::error::EngineError;
use crate::models::{SetResult, SetSummary, SuiteCounts};

/// Folds suite summaries into a run summary
#[derive(Clone, Copy, Debug, Default)]
pub struct RunReducer;

impl Reducer<SetSummary> for RunReducer {
    type Summary = SetSummary;

    fn initial(&self) -> SetSummary {
        SetSummary::for_run()
    }

    fn reduce(&self, mut summary: SetSummary, suite: &SetSummary) -> SetSummary {
        let suites = summary.suites.get_or_insert_with(SuiteCounts::default);
        suites.total += 1;
        if !suite.passed {
            suites.failed += 1;
            summary.passed = false;
        }

        summary.tests.errored += suite.tests.errored;
        summary.tests.failed += suite.tests.failed;
        summary.tests.skipped += suite.tests.skipped;
        summary.tests.total += suite.tests.total;
        summary.assertions.absorb(&suite.assertions);
        summary.aborted = summary.aborted || suite.aborted;
        summary
    }
}

pub struct Run {
    settings: CaseSettings,
    node: ReductionNode<Suite, RunReducer>,
}

impl Run {
    pub fn new() -> Self {
        Self {
            settings: CaseSettings::default(),
            node: ReductionNode::new("run", RunReducer),
        }
    }

    /// Settings applied to every test loaded by `add_path`
    pub fn with_settings(mut self, settings: CaseSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn add_suite(&mut self, suite: Suite) -> Result<(), EngineError> {
        self.node.add_child(suite)
    }

    /// Add every test file under `path`, one suite each. Returns the files
    /// added, in run order.
    pub fn add_path(&mut self, path: impl AsRef<Path>, loader: &dyn ModuleLoader) -> Result<Vec<PathBuf>> {
        let files = list_tree(path.as_ref(), is_test_file)?;
        for file in &files {
            let suite = Suite::load(file, loader, &self.settings);
            self.add_suite(suite)?;
        }
        Ok(files)
    }

    pub fn suites(&self) -> &[Suite] {
        self.node.children()
    }

    pub fn result(&self) -> SetResult {
        self.node.result()
    }

    pub fn summary(&self) -> Option<&SetSummary> {
        self.node.summary()
    }

    /// Sum of the durations of the suites that ran
    pub fn duration(&self) -> Duration {
        self.node.executed().iter().map(Suite::duration).sum()
    }

    pub async fn run(&mut self, options: &RunOptions) -> Result<SetSummary, EngineError> {
        info!("Running {} suite(s)", self.suites().len());
        let summary = self.node.run(options).await?;
        info!("{}", summary);
        Ok(summary)
    }
}

impl Default for Run {
    fn default() -> Self {
        Self::new()
    }
}
