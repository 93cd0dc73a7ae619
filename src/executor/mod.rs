//! Test execution engine
//!
//! Sequential execution of test cases, suites and runs.

mod case;
mod fault;
mod race;
mod run;
mod suite;
mod tree;

pub use case::{CaseSettings, GeneralError, TestCase, DEFAULT_TIMEOUT};
pub use fault::{FaultChannel, FaultSource, FaultSubscription};
pub use race::{Completion, Done, PhaseFault, Settlement, Signal};
pub use run::{Run, RunReducer};
pub use suite::{Suite, SuiteReducer};
pub use tree::{Reducer, ReductionNode, RunOptions, Runnable};
