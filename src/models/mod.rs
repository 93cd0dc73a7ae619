//! Data models for the test engine
//!
//! Result codes, summaries, assertion records, and test definitions.

mod assertion;
mod definition;
mod result;
mod summary;

pub use assertion::{AssertionError, AssertionKind, AssertionRecord, CallSite, Validation};
pub use definition::{CaseDefinition, Export, Group, HookFn, Module, Outcome, StepResult, TestFn};
pub use result::{CaseResult, FailureKind, Phase, SetResult};
pub use summary::{
    AssertionCounts, CaseSummary, SetSummary, SuiteCounts, TestCounts, Verdict,
};
