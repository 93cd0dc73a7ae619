//! Test case
//!
//! Runs one test through setup, body and teardown, and classifies the outcome.

use futures::future::{FutureExt, LocalBoxFuture};
use std::cell::Cell;
use std::fmt;
use std::future::Future;
use std::rc::Rc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::fault::{FaultChannel, FaultSource};
use super::race::{race, Done, PhaseFault, Signal};
use super::tree::{RunOptions, Runnable};
use crate::error::EngineError;
use crate::ledger::{Ledger, ARGUMENT_TIMEOUT};
use crate::models::{
    AssertionCounts, AssertionRecord, CaseDefinition, CaseResult, CaseSummary, FailureKind, HookFn,
    Phase, StepResult, TestFn,
};
use crate::utils::{Clock, MonotonicClock};

/// Default time allowed for each phase
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Time limits applied to a test case
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CaseSettings {
    /// Limit for each of setup, body and teardown
    pub timeout: Duration,
    /// Limit for deferred assertion operands
    pub argument_timeout: Duration,
}

impl Default for CaseSettings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            argument_timeout: ARGUMENT_TIMEOUT,
        }
    }
}

/// Fault that failed a test case
#[derive(Debug)]
pub struct GeneralError {
    pub error: anyhow::Error,
    pub phase: Phase,
    /// Delivered through the fault channel rather than the phase itself
    pub uncaught: bool,
}

impl fmt::Display for GeneralError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#}", self.error)
    }
}

#[derive(Default)]
struct RunState {
    phase: Option<Phase>,
    result: CaseResult,
    failure: Option<FailureKind>,
    general_error: Option<GeneralError>,
    assertions: Vec<AssertionRecord>,
    expected: Option<usize>,
    duration: Option<Duration>,
    summary: Option<CaseSummary>,
}

/// One executable test
pub struct TestCase {
    name: String,
    body: TestFn,
    setup: Option<HookFn>,
    teardown: Option<HookFn>,
    settings: CaseSettings,
    clock: Rc<dyn Clock>,
    faults: Rc<dyn FaultSource>,
    state: RunState,
}

impl TestCase {
    pub fn new(name: impl Into<String>, body: impl Fn(Ledger) -> StepResult + 'static) -> Self {
        Self::from_parts(name.into(), Rc::new(body), None, None)
    }

    pub fn from_definition(definition: CaseDefinition) -> Self {
        Self::from_parts(
            definition.name,
            definition.body,
            definition.setup,
            definition.teardown,
        )
    }

    fn from_parts(name: String, body: TestFn, setup: Option<HookFn>, teardown: Option<HookFn>) -> Self {
        Self {
            name,
            body,
            setup,
            teardown,
            settings: CaseSettings::default(),
            clock: Rc::new(MonotonicClock),
            faults: Rc::new(FaultChannel::current()),
            state: RunState::default(),
        }
    }

    pub fn with_setup(mut self, hook: impl Fn(Done) -> StepResult + 'static) -> Self {
        self.setup = Some(Rc::new(hook));
        self
    }

    pub fn with_teardown(mut self, hook: impl Fn(Done) -> StepResult + 'static) -> Self {
        self.teardown = Some(Rc::new(hook));
        self
    }

    pub fn with_settings(mut self, settings: CaseSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.settings.timeout = timeout;
        self
    }

    pub fn with_clock(mut self, clock: Rc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_fault_source(mut self, faults: Rc<dyn FaultSource>) -> Self {
        self.faults = faults;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn result(&self) -> CaseResult {
        self.state.result
    }

    pub fn failure(&self) -> Option<FailureKind> {
        self.state.failure
    }

    pub fn general_error(&self) -> Option<&GeneralError> {
        self.state.general_error.as_ref()
    }

    /// Phase the last run is in, `Done` once it has finished
    pub fn phase(&self) -> Option<Phase> {
        self.state.phase
    }

    pub fn assertions(&self) -> &[AssertionRecord] {
        &self.state.assertions
    }

    pub fn expected_assertions(&self) -> Option<usize> {
        self.state.expected
    }

    /// From the start of setup to the end of the last phase that ran
    pub fn duration(&self) -> Duration {
        self.state.duration.unwrap_or_default()
    }

    pub fn summary(&self) -> Option<&CaseSummary> {
        self.state.summary.as_ref()
    }

    /// Run the test. Each call starts from a clean state.
    ///
    /// Only engine defects come back as `Err`; every user fault is recorded on
    /// the case and reflected in the returned summary.
    pub async fn run(&mut self) -> Result<CaseSummary, EngineError> {
        self.state = RunState::default();
        let timeout = Rc::new(Cell::new(self.settings.timeout));
        let faults = Rc::clone(&self.faults);
        let started: Instant = self.clock.now();

        let mut aborted = false;
        let mut skipped = false;
        let mut ledger = None;

        self.state.phase = Some(Phase::Setup);
        if let Some(setup) = self.setup.clone() {
            let settled = race(Phase::Setup, faults.as_ref(), &timeout, |completion| {
                setup(Done::new(completion))
            })
            .await?;

            if let Err(fault) = settled {
                warn!("Setup for '{}' failed: {:#}", self.name, fault.error);
                self.record_fault(Phase::Setup, FailureKind::SetupTeardownError, fault);
                aborted = true;
            }
        }

        if !aborted {
            self.state.phase = Some(Phase::Test);
            info!("Running {}", self.name);

            let fresh = Ledger::new().with_argument_timeout(self.settings.argument_timeout);
            let body = Rc::clone(&self.body);
            let body_race = race(Phase::Test, faults.as_ref(), &timeout, |completion| {
                fresh.attach(completion, Rc::clone(&timeout));
                body(fresh.clone())
            });
            let settled = driving(&fresh, body_race).await?;

            match settled {
                Ok(Signal::Finished) => {}
                Ok(Signal::Skipped) => skipped = true,
                Err(fault) => self.record_fault(Phase::Test, FailureKind::GeneralError, fault),
            }

            self.state.phase = Some(Phase::Teardown);
            if let Some(teardown) = self.teardown.clone() {
                let teardown_race = race(Phase::Teardown, faults.as_ref(), &timeout, |completion| {
                    teardown(Done::new(completion))
                });
                let settled = driving(&fresh, teardown_race).await?;

                if let Err(fault) = settled {
                    if self.state.general_error.is_none() {
                        self.record_fault(Phase::Teardown, FailureKind::SetupTeardownError, fault);
                    } else {
                        warn!(
                            "Ignoring teardown fault for '{}' after earlier failure: {:#}",
                            self.name, fault.error
                        );
                    }
                }
            }
            ledger = Some(fresh);
        }

        let finished = self.clock.now();
        self.state.duration = Some(finished.saturating_duration_since(started));

        if let Some(ledger) = ledger {
            self.state.assertions = ledger.get_assertions().await;
            self.state.expected = ledger.get_expected();
            ledger.close();
        }

        let summary = self.classify(aborted, skipped);
        self.state.phase = Some(Phase::Done);
        self.state.summary = Some(summary.clone());

        debug!("{} {} ({:?})", self.state.result.symbol(), self.name, self.duration());
        Ok(summary)
    }

    fn record_fault(&mut self, phase: Phase, kind: FailureKind, fault: PhaseFault) {
        self.state.result = CaseResult::Failed;
        self.state.failure = Some(kind);
        self.state.general_error = Some(GeneralError {
            error: fault.error,
            phase,
            uncaught: fault.uncaught,
        });
    }

    /// Derive the result from the recorded fault and assertions
    fn classify(&mut self, aborted: bool, skipped: bool) -> CaseSummary {
        let total = self.state.assertions.len();
        let failed = self
            .state
            .assertions
            .iter()
            .filter(|record| !record.passed())
            .count();

        let mut summary = CaseSummary::passing();
        summary.aborted = aborted;
        summary.assertions = AssertionCounts { total, failed };

        if self.state.general_error.is_some() {
            summary.passed = false;
            summary.errored = true;
        } else if failed > 0 {
            self.state.result = CaseResult::Failed;
            self.state.failure = Some(FailureKind::AssertionFail);
            summary.passed = false;
        } else if !skipped && self.state.expected.is_some_and(|expected| expected != total) {
            self.state.result = CaseResult::Failed;
            self.state.failure = Some(FailureKind::AssertionCount);
            summary.passed = false;
            summary.errored = true;
        } else if skipped {
            self.state.result = CaseResult::Skipped;
            summary.skipped = true;
        } else {
            self.state.result = CaseResult::Passed;
        }

        summary
    }
}

impl Runnable for TestCase {
    type Summary = CaseSummary;

    fn execute<'a>(
        &'a mut self,
        _options: &'a RunOptions,
    ) -> LocalBoxFuture<'a, Result<CaseSummary, EngineError>> {
        self.run().boxed_local()
    }
}

impl fmt::Debug for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestCase")
            .field("name", &self.name)
            .field("result", &self.state.result)
            .field("failure", &self.state.failure)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

/// Await `phase` while the ledger's deferred records keep resolving
async fn driving<F: Future>(ledger: &Ledger, phase: F) -> F::Output {
    tokio::select! {
        biased;
        output = phase => output,
        never = ledger.drive() => match never {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::Operand;
    use crate::models::Outcome;
    use crate::utils::clock::SteppingClock;

    fn flag() -> Rc<Cell<bool>> {
        Rc::new(Cell::new(false))
    }

    async fn blow_up<T>(message: &'static str) -> T {
        tokio::task::yield_now().await;
        panic!("{message}")
    }

    #[tokio::test]
    async fn test_sync_body_passes() {
        let mut case = TestCase::new("adds", |t| {
            t.equal(2 + 2, 4);
            t.ok(true);
            t.done();
            Ok(Outcome::Pending)
        });

        let summary = case.run().await.unwrap();
        assert!(summary.passed);
        assert_eq!(summary.assertions.total, 2);
        assert_eq!(case.result(), CaseResult::Passed);
        assert_eq!(case.failure(), None);
        assert_eq!(case.phase(), Some(Phase::Done));
    }

    #[tokio::test]
    async fn test_untested_until_run() {
        let case = TestCase::new("idle", |_| Ok(Outcome::resolved()));
        assert_eq!(case.result(), CaseResult::Untested);
        assert!(case.summary().is_none());
    }

    #[tokio::test]
    async fn test_returned_future_passes() {
        let mut case = TestCase::new("async", |t| {
            Ok(Outcome::future(async move {
                tokio::time::sleep(Duration::from_millis(5)).await;
                t.strict_equal("a", "a");
                Ok(())
            }))
        });

        let summary = case.run().await.unwrap();
        assert!(summary.passed);
        assert_eq!(case.assertions().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_body_times_out() {
        let mut case =
            TestCase::new("hangs", |_| Ok(Outcome::Pending)).with_timeout(Duration::from_millis(100));

        let summary = case.run().await.unwrap();
        assert!(!summary.passed);
        assert!(summary.errored);
        assert_eq!(case.result(), CaseResult::Failed);
        assert_eq!(case.failure(), Some(FailureKind::GeneralError));

        let error = case.general_error().unwrap();
        assert_eq!(error.to_string(), "timed out waiting for test");
        assert_eq!(error.phase, Phase::Test);
        assert!(!error.uncaught);
    }

    #[tokio::test(start_paused = true)]
    async fn test_body_may_extend_timeout() {
        let mut case = TestCase::new("slow", |t| {
            t.set_timeout(Duration::from_secs(30));
            Ok(Outcome::future(async move {
                tokio::time::sleep(Duration::from_secs(10)).await;
                t.ok(true);
                Ok(())
            }))
        });

        assert!(case.run().await.unwrap().passed);
    }

    #[tokio::test]
    async fn test_expected_count() {
        let mut exact = TestCase::new("exact", |t| {
            t.expect(2);
            t.ok(true);
            t.ok(true);
            t.done();
            Ok(Outcome::Pending)
        });
        assert!(exact.run().await.unwrap().passed);
        assert_eq!(exact.expected_assertions(), Some(2));

        let mut short = TestCase::new("short", |t| {
            t.expect(3);
            t.ok(true);
            t.done();
            Ok(Outcome::Pending)
        });
        let summary = short.run().await.unwrap();
        assert!(!summary.passed);
        assert!(summary.errored);
        assert_eq!(short.failure(), Some(FailureKind::AssertionCount));
        assert_eq!(short.expected_assertions(), Some(3));
        assert_eq!(short.assertions().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_assertion() {
        let mut case = TestCase::new("wrong", |t| {
            t.expect(5);
            t.equal(1, 2);
            t.done();
            Ok(Outcome::Pending)
        });

        let summary = case.run().await.unwrap();
        assert!(!summary.passed);
        assert!(!summary.errored);
        assert_eq!(summary.assertions.failed, 1);
        assert_eq!(case.failure(), Some(FailureKind::AssertionFail));
    }

    #[tokio::test]
    async fn test_setup_throw_aborts_and_skips_teardown() {
        let body_ran = flag();
        let teardown_ran = flag();
        let (b, t) = (body_ran.clone(), teardown_ran.clone());

        let mut case = TestCase::new("guarded", move |_| {
            b.set(true);
            Ok(Outcome::resolved())
        })
        .with_setup(|_| Err(anyhow::anyhow!("no database")))
        .with_teardown(move |done| {
            t.set(true);
            done.done();
            Ok(Outcome::Pending)
        });

        let summary = case.run().await.unwrap();
        assert!(summary.aborted);
        assert!(!summary.passed);
        assert_eq!(case.failure(), Some(FailureKind::SetupTeardownError));
        assert_eq!(case.general_error().unwrap().phase, Phase::Setup);
        assert!(!body_ran.get());
        assert!(!teardown_ran.get());
    }

    #[tokio::test]
    async fn test_teardown_runs_after_body_failure() {
        let teardown_ran = flag();
        let t = teardown_ran.clone();

        let mut case = TestCase::new("broken", |_| Err(anyhow::anyhow!("body failed")))
            .with_teardown(move |_| {
                t.set(true);
                Err(anyhow::anyhow!("teardown failed too"))
            });

        let summary = case.run().await.unwrap();
        assert!(teardown_ran.get());
        assert!(!summary.aborted);
        assert_eq!(case.failure(), Some(FailureKind::GeneralError));
        assert_eq!(case.general_error().unwrap().to_string(), "body failed");
    }

    #[tokio::test]
    async fn test_teardown_fault_after_clean_body() {
        let mut case = TestCase::new("tidy", |t| {
            t.ok(true);
            Ok(Outcome::resolved())
        })
        .with_teardown(|_| Ok(Outcome::future(async { Err(anyhow::anyhow!("leak")) })));

        let summary = case.run().await.unwrap();
        assert!(!summary.passed);
        assert!(!summary.aborted);
        assert_eq!(case.failure(), Some(FailureKind::SetupTeardownError));
        assert_eq!(case.general_error().unwrap().phase, Phase::Teardown);
    }

    #[tokio::test]
    async fn test_skip() {
        let teardown_ran = flag();
        let t = teardown_ran.clone();

        let mut case = TestCase::new("later", |t| {
            t.expect(10);
            t.skip();
            t.ok(false);
            Ok(Outcome::Pending)
        })
        .with_teardown(move |done| {
            t.set(true);
            done.done();
            Ok(Outcome::Pending)
        });

        let summary = case.run().await.unwrap();
        assert!(summary.passed);
        assert!(summary.skipped);
        assert_eq!(case.result(), CaseResult::Skipped);
        assert!(case.assertions().is_empty());
        assert!(teardown_ran.get());
    }

    #[tokio::test]
    async fn test_uncaught_fault() {
        let channel = FaultChannel::new();
        let reporter = channel.clone();

        let mut case = TestCase::new("spawns", move |_| {
            let reporter = reporter.clone();
            Ok(Outcome::future(async move {
                tokio::task::yield_now().await;
                reporter.report(anyhow::anyhow!("socket closed"));
                futures::future::pending::<()>().await;
                Ok(())
            }))
        })
        .with_fault_source(Rc::new(channel.clone()));

        case.run().await.unwrap();
        let error = case.general_error().unwrap();
        assert!(error.uncaught);
        assert_eq!(error.to_string(), "socket closed");
        assert!(!channel.is_listening());
    }

    #[tokio::test]
    async fn test_duration_uses_captured_clock() {
        let clock = Rc::new(SteppingClock::new(Duration::from_millis(42)));
        let mut case = TestCase::new("timed", |t| {
            t.done();
            Ok(Outcome::Pending)
        })
        .with_clock(clock.clone());

        case.run().await.unwrap();
        assert_eq!(case.duration(), Duration::from_millis(42));
        assert_eq!(clock.reads(), 2);
    }

    #[tokio::test]
    async fn test_rerun_has_no_carry_over() {
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();

        let mut case = TestCase::new("flaky", move |t| {
            counter.set(counter.get() + 1);
            if counter.get() == 1 {
                t.ok(false);
                t.ok(false);
            } else {
                t.ok(true);
            }
            Ok(Outcome::resolved())
        });

        let first = case.run().await.unwrap();
        assert!(!first.passed);
        assert_eq!(first.assertions.failed, 2);

        let second = case.run().await.unwrap();
        assert!(second.passed);
        assert_eq!(second.assertions.total, 1);
        assert_eq!(case.assertions().len(), 1);
        assert_eq!(case.failure(), None);
        assert_eq!(case.result(), CaseResult::Passed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deferred_operand_resolves_while_body_runs() {
        // Operand settles at 2s, body ends at 2.5s, limit is 3s from the call
        let mut case = TestCase::new("overlap", |t| {
            t.ok_eventually(Operand::resolved(async {
                tokio::time::sleep(Duration::from_secs(2)).await;
                true
            }));
            Ok(Outcome::future(async {
                tokio::time::sleep(Duration::from_millis(2500)).await;
                Ok(())
            }))
        });

        let summary = case.run().await.unwrap();
        assert!(summary.passed, "{:?}", case.assertions());
        assert_eq!(summary.assertions.total, 1);
        assert_eq!(case.result(), CaseResult::Passed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejection_settles_across_body_and_teardown() {
        let mut case = TestCase::new("spans phases", |t| {
            t.rejects(async {
                tokio::time::sleep(Duration::from_millis(2800)).await;
                Err::<(), _>(anyhow::anyhow!("refused"))
            });
            Ok(Outcome::future(async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                Ok(())
            }))
        })
        .with_teardown(|_| {
            Ok(Outcome::future(async {
                tokio::time::sleep(Duration::from_millis(1500)).await;
                Ok(())
            }))
        });

        let summary = case.run().await.unwrap();
        assert!(summary.passed, "{:?}", case.assertions());
        assert_eq!(case.assertions().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_operand_still_times_out() {
        let mut case = TestCase::new("too slow", |t| {
            t.ok_eventually(Operand::resolved(async {
                tokio::time::sleep(Duration::from_secs(4)).await;
                true
            }));
            Ok(Outcome::resolved())
        });

        let summary = case.run().await.unwrap();
        assert!(!summary.passed);
        assert_eq!(case.failure(), Some(FailureKind::AssertionFail));
        let error = case.assertions()[0].error.as_ref().unwrap();
        assert!(error.message.contains("timed out"));
    }

    #[tokio::test]
    async fn test_panicking_operand_fails_assertion() {
        let mut case = TestCase::new("explodes", |t| {
            t.ok_eventually(Operand::resolved(blow_up::<bool>("operand blew up")));
            t.ok(true);
            Ok(Outcome::resolved())
        });

        let summary = case.run().await.unwrap();
        assert!(!summary.passed);
        assert!(!summary.errored);
        assert_eq!(summary.assertions.total, 2);
        assert_eq!(summary.assertions.failed, 1);
        assert_eq!(case.failure(), Some(FailureKind::AssertionFail));

        let error = case.assertions()[0].error.as_ref().unwrap();
        assert!(error.message.contains("operand blew up"), "{}", error.message);
        assert!(case.assertions()[1].passed());
    }

    #[tokio::test]
    async fn test_panicking_rejection_fails_assertion() {
        let mut case = TestCase::new("explodes later", |t| {
            t.rejects(blow_up::<anyhow::Result<()>>("rejection blew up"));
            Ok(Outcome::resolved())
        });

        let summary = case.run().await.unwrap();
        assert!(!summary.passed);
        assert_eq!(case.failure(), Some(FailureKind::AssertionFail));

        let error = case.assertions()[0].error.as_ref().unwrap();
        assert!(error.message.contains("rejection blew up"), "{}", error.message);
    }
}
