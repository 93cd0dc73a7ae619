//! Result codes for test cases and test sets
//!
//! Defines case results, failure classifications, set-level results, and phases.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of a single test case run
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseResult {
    #[default]
    Untested,
    Passed,
    Failed,
    Skipped,
}

impl CaseResult {
    pub fn symbol(&self) -> &'static str {
        match self {
            CaseResult::Untested => "·",
            CaseResult::Passed => "✓",
            CaseResult::Failed => "✗",
            CaseResult::Skipped => "○",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, CaseResult::Passed | CaseResult::Skipped)
    }
}

impl fmt::Display for CaseResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaseResult::Untested => write!(f, "not yet tested"),
            CaseResult::Passed => write!(f, "passed"),
            CaseResult::Failed => write!(f, "failed"),
            CaseResult::Skipped => write!(f, "skipped"),
        }
    }
}

/// Why a case failed. Only meaningful when the result is [`CaseResult::Failed`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The body faulted, timed out, or its returned future rejected
    GeneralError,
    /// Setup or teardown faulted
    SetupTeardownError,
    /// At least one recorded assertion failed
    AssertionFail,
    /// Recorded assertion count differs from the declared expectation
    AssertionCount,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::GeneralError => write!(f, "an error occurred"),
            FailureKind::SetupTeardownError => write!(f, "an error occurred in setup or teardown"),
            FailureKind::AssertionFail => write!(f, "assertion(s) failed"),
            FailureKind::AssertionCount => write!(f, "unexpected number of assertions"),
        }
    }
}

/// Result code of a suite or a whole run
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetResult {
    #[default]
    Untested,
    NoTests,
    LoadError,
    Failed,
    Passed,
}

impl fmt::Display for SetResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetResult::Untested => write!(f, "not yet tested"),
            SetResult::NoTests => write!(f, "no tests found"),
            SetResult::LoadError => write!(f, "an error occurred during load"),
            SetResult::Failed => write!(f, "one or more tests failed"),
            SetResult::Passed => write!(f, "all tests passed"),
        }
    }
}

/// Lifecycle phase of a test case run
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Setup,
    Test,
    Teardown,
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Setup => write!(f, "setup"),
            Phase::Test => write!(f, "test"),
            Phase::Teardown => write!(f, "teardown"),
            Phase::Done => write!(f, "done"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_result_default() {
        assert_eq!(CaseResult::default(), CaseResult::Untested);
        assert_eq!(SetResult::default(), SetResult::Untested);
    }

    #[test]
    fn test_skipped_counts_as_success() {
        assert!(CaseResult::Passed.is_success());
        assert!(CaseResult::Skipped.is_success());
        assert!(!CaseResult::Failed.is_success());
        assert!(!CaseResult::Untested.is_success());
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(Phase::Test.to_string(), "test");
        assert_eq!(Phase::Setup.to_string(), "setup");
        assert_eq!(format!("timed out waiting for {}", Phase::Teardown), "timed out waiting for teardown");
    }
}
