//! Run summaries
//!
//! Plain snapshots produced by a test case run and folded upward by suites and runs.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Pass/abort view of a summary, used by the reduction tree to decide
/// whether to keep running children.
pub trait Verdict {
    fn passed(&self) -> bool;
    fn aborted(&self) -> bool;
}

/// Assertion totals
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionCounts {
    pub total: usize,
    pub failed: usize,
}

impl AssertionCounts {
    pub fn absorb(&mut self, other: &AssertionCounts) {
        self.total += other.total;
        self.failed += other.failed;
    }
}

/// Test totals for a suite or run
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCounts {
    pub errored: usize,
    pub failed: usize,
    pub skipped: usize,
    pub total: usize,
}

/// Suite totals for a run
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuiteCounts {
    pub failed: usize,
    pub total: usize,
}

/// Summary of one test case run
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseSummary {
    pub passed: bool,
    pub errored: bool,
    pub skipped: bool,
    pub aborted: bool,
    pub assertions: AssertionCounts,
}

impl CaseSummary {
    /// A clean slate: innocent until proven guilty
    pub fn passing() -> Self {
        Self {
            passed: true,
            ..Default::default()
        }
    }
}

impl Verdict for CaseSummary {
    fn passed(&self) -> bool {
        self.passed
    }

    fn aborted(&self) -> bool {
        self.aborted
    }
}

/// Summary of a suite or a run
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetSummary {
    pub passed: bool,
    pub aborted: bool,
    pub tests: TestCounts,
    pub assertions: AssertionCounts,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suites: Option<SuiteCounts>,
}

impl SetSummary {
    /// Initial accumulator for a suite
    pub fn for_suite() -> Self {
        Self {
            passed: true,
            ..Default::default()
        }
    }

    /// Initial accumulator for a run
    pub fn for_run() -> Self {
        Self {
            passed: true,
            suites: Some(SuiteCounts::default()),
            ..Default::default()
        }
    }

    /// Zeroed sentinel for a suite whose module failed to load
    pub fn load_failure() -> Self {
        Self {
            passed: false,
            ..Default::default()
        }
    }

    /// Number of tests that did not pass, errored or failed
    pub fn unsuccessful(&self) -> usize {
        self.tests.failed + self.tests.errored
    }
}

impl Verdict for SetSummary {
    fn passed(&self) -> bool {
        self.passed
    }

    fn aborted(&self) -> bool {
        self.aborted
    }
}

impl fmt::Display for SetSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(suites) = &self.suites {
            write!(f, "Suites: {} ({} failed) | ", suites.total, suites.failed)?;
        }
        write!(
            f,
            "Tests: {} | Failed: {} | Errored: {} | Skipped: {} | Assertions: {} ({} failed)",
            self.tests.total,
            self.tests.failed,
            self.tests.errored,
            self.tests.skipped,
            self.assertions.total,
            self.assertions.failed
        )?;
        if self.aborted {
            write!(f, " | ABORTED")?;
        }
        Ok(())
    }
}
