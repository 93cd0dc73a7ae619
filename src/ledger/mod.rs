//! Assertion ledger
//!
//! Records every assertion made during one run of a test body. Records are
//! kept in call order even when their operands settle out of order.

mod operand;

pub use operand::Operand;

use futures::future::{self, FutureExt, LocalBoxFuture, Shared};
use serde::Serialize;
use std::cell::{Cell, RefCell};
use std::convert::Infallible;
use std::fmt::{self, Debug, Display};
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::Rc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::debug;

use crate::executor::{Completion, Signal};
use crate::models::{AssertionError, AssertionKind, AssertionRecord, CallSite, Validation};
use crate::utils::{panic_error, panic_message};

/// Default bound on waiting for deferred operands
pub const ARGUMENT_TIMEOUT: Duration = Duration::from_secs(3);

const ARGUMENT_TIMEOUT_MESSAGE: &str = "timed out waiting for assertion arguments to resolve";
const RESOLVED_MESSAGE: &str = "promise should have been rejected, but was resolved";
const MISSING_EXCEPTION: &str = "Missing expected exception.";

/// User check run against the reason of a rejected future
pub type Validator = Box<dyn FnOnce(&anyhow::Error) -> anyhow::Result<()>>;

type PendingRecord = Shared<LocalBoxFuture<'static, AssertionRecord>>;

#[derive(Clone)]
enum Entry {
    Settled(AssertionRecord),
    Pending(PendingRecord),
}

/// Hooks back into the running test case
struct Control {
    completion: Completion,
    timeout: Rc<Cell<Duration>>,
}

struct LedgerState {
    entries: Vec<Entry>,
    closed: bool,
    expected: Option<usize>,
    argument_timeout: Duration,
    control: Option<Control>,
    pending_added: Rc<Notify>,
}

/// Handle passed to a test body. Clones share the same records.
#[derive(Clone)]
pub struct Ledger {
    state: Rc<RefCell<LedgerState>>,
}

impl Ledger {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(LedgerState {
                entries: Vec::new(),
                closed: false,
                expected: None,
                argument_timeout: ARGUMENT_TIMEOUT,
                control: None,
                pending_added: Rc::new(Notify::new()),
            })),
        }
    }

    pub fn with_argument_timeout(self, timeout: Duration) -> Self {
        self.state.borrow_mut().argument_timeout = timeout;
        self
    }

    pub(crate) fn attach(&self, completion: Completion, timeout: Rc<Cell<Duration>>) {
        self.state.borrow_mut().control = Some(Control {
            completion,
            timeout,
        });
    }

    // ----- control -----

    /// Declare how many assertions the body will make
    pub fn expect(&self, count: usize) {
        self.state.borrow_mut().expected = Some(count);
    }

    pub fn get_expected(&self) -> Option<usize> {
        self.state.borrow().expected
    }

    /// Stop accepting assertions. Later calls are silently dropped.
    pub fn close(&self) {
        self.state.borrow_mut().closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.state.borrow().closed
    }

    /// Number of assertions recorded so far, settled or not
    pub fn len(&self) -> usize {
        self.state.borrow().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Finish the test phase
    pub fn done(&self) {
        self.settle(Signal::Finished);
    }

    /// Finish the test phase as skipped. Assertions made afterwards are dropped.
    pub fn skip(&self) {
        self.close();
        self.settle(Signal::Skipped);
    }

    /// Change the phase timeout. Only effective before the body first yields.
    pub fn set_timeout(&self, timeout: Duration) {
        match &self.state.borrow().control {
            Some(control) => control.timeout.set(timeout),
            None => debug!("set_timeout on a ledger with no running test"),
        }
    }

    fn settle(&self, signal: Signal) {
        let completion = self
            .state
            .borrow()
            .control
            .as_ref()
            .map(|control| control.completion.clone());

        match completion {
            Some(completion) => {
                completion.settle(Ok(signal));
            }
            None => debug!("{:?} signalled on a ledger with no running test", signal),
        }
    }

    /// Wait for every record to settle and return them in call order.
    ///
    /// Walks the live list one entry at a time, re-reading its length after
    /// each step: a `rejects` validator may append records while an earlier
    /// one is settling, and those must be included.
    pub async fn get_assertions(&self) -> Vec<AssertionRecord> {
        let mut settled = Vec::new();
        let mut index = 0;

        loop {
            let entry = match self.state.borrow().entries.get(index) {
                Some(entry) => entry.clone(),
                None => break,
            };

            let record = match entry {
                Entry::Settled(record) => record,
                Entry::Pending(pending) => {
                    let record = pending.await;
                    self.state.borrow_mut().entries[index] = Entry::Settled(record.clone());
                    record
                }
            };

            settled.push(record);
            index += 1;
        }

        settled
    }

    /// Poll every unsettled record until the returned future is dropped.
    ///
    /// Deferred operands only make progress while something polls them, so
    /// the runner drives this next to each phase it races.
    pub(crate) async fn drive(&self) -> Infallible {
        let pending_added = Rc::clone(&self.state.borrow().pending_added);

        loop {
            let pending: Vec<PendingRecord> = self
                .state
                .borrow()
                .entries
                .iter()
                .filter_map(|entry| match entry {
                    Entry::Pending(pending) if pending.peek().is_none() => Some(pending.clone()),
                    _ => None,
                })
                .collect();

            if pending.is_empty() {
                pending_added.notified().await;
            } else {
                tokio::select! {
                    _ = future::join_all(pending) => {}
                    _ = pending_added.notified() => {}
                }
            }
        }
    }

    // ----- immediate assertions -----

    #[track_caller]
    pub fn ok(&self, value: bool) {
        self.record(AssertionKind::Ok, || truthy(value))
    }

    #[track_caller]
    pub fn fail(&self, message: impl Into<String>) {
        let message = message.into();
        self.record(AssertionKind::Fail, || Err(AssertionError::new(message)))
    }

    #[track_caller]
    pub fn equal<A, B>(&self, actual: A, expected: B)
    where
        A: PartialEq<B> + Debug,
        B: Debug,
    {
        self.record(AssertionKind::Equal, || equal(&actual, &expected))
    }

    #[track_caller]
    pub fn not_equal<A, B>(&self, actual: A, expected: B)
    where
        A: PartialEq<B> + Debug,
        B: Debug,
    {
        self.record(AssertionKind::NotEqual, || not_equal(&actual, &expected))
    }

    #[track_caller]
    pub fn strict_equal<T: PartialEq + Debug>(&self, actual: T, expected: T) {
        self.record(AssertionKind::StrictEqual, || strict_equal(&actual, &expected))
    }

    #[track_caller]
    pub fn not_strict_equal<T: PartialEq + Debug>(&self, actual: T, expected: T) {
        self.record(AssertionKind::NotStrictEqual, || {
            not_strict_equal(&actual, &expected)
        })
    }

    /// Structural equality of the operands' JSON images
    #[track_caller]
    pub fn deep_equal<A, B>(&self, actual: A, expected: B)
    where
        A: Serialize + Debug,
        B: Serialize + Debug,
    {
        self.record(AssertionKind::DeepEqual, || deep_equal(&actual, &expected))
    }

    #[track_caller]
    pub fn not_deep_equal<A, B>(&self, actual: A, expected: B)
    where
        A: Serialize + Debug,
        B: Serialize + Debug,
    {
        self.record(AssertionKind::NotDeepEqual, || {
            not_deep_equal(&actual, &expected)
        })
    }

    /// Passes when the block returns `Err` or panics
    #[track_caller]
    pub fn throws<T, E, F>(&self, block: F)
    where
        F: FnOnce() -> Result<T, E>,
    {
        self.record(AssertionKind::Throws, || {
            match catch_unwind(AssertUnwindSafe(block)) {
                Ok(Ok(_)) => Err(AssertionError::new(MISSING_EXCEPTION)),
                Ok(Err(_)) | Err(_) => Ok(()),
            }
        })
    }

    #[track_caller]
    pub fn does_not_throw<T, E, F>(&self, block: F)
    where
        E: Display,
        F: FnOnce() -> Result<T, E>,
    {
        self.record(AssertionKind::DoesNotThrow, || {
            match catch_unwind(AssertUnwindSafe(block)) {
                Ok(Ok(_)) => Ok(()),
                Ok(Err(error)) => Err(AssertionError::new(format!(
                    "Got unwanted exception: {error}"
                ))),
                Err(payload) => Err(AssertionError::new(format!(
                    "Got unwanted exception: {}",
                    panic_message(payload.as_ref())
                ))),
            }
        })
    }

    #[track_caller]
    pub fn if_error<T, E: Display>(&self, result: &Result<T, E>) {
        self.record(AssertionKind::IfError, || match result {
            Ok(_) => Ok(()),
            Err(error) => Err(AssertionError::new(format!(
                "ifError got unwanted exception: {error}"
            ))),
        })
    }

    // ----- deferred assertions -----

    /// Truthiness of a value that may still be resolving
    #[track_caller]
    pub fn ok_eventually(&self, value: Operand<bool>) {
        self.record_deferred(
            AssertionKind::Ok,
            value,
            Operand::Ready(true),
            |value, _| truthy(value),
        )
    }

    /// Compare operands that may still be resolving
    pub fn eventually<A, B>(&self, actual: Operand<A>, expected: Operand<B>) -> Eventually<'_, A, B> {
        Eventually {
            ledger: self,
            actual,
            expected,
        }
    }

    /// Passes when the future fails
    #[track_caller]
    pub fn rejects<T, F>(&self, future: F)
    where
        T: 'static,
        F: Future<Output = anyhow::Result<T>> + 'static,
    {
        self.record_rejection(future, None, None)
    }

    /// Passes when the future fails and the validator accepts the reason.
    /// The validator may make further assertions on this ledger.
    #[track_caller]
    pub fn rejects_with<T, F, V>(&self, future: F, validator: V)
    where
        T: 'static,
        F: Future<Output = anyhow::Result<T>> + 'static,
        V: FnOnce(&anyhow::Error) -> anyhow::Result<()> + 'static,
    {
        self.record_rejection(future, Some(Box::new(validator)), None)
    }

    #[track_caller]
    pub fn rejects_with_message<T, F>(&self, future: F, message: impl Into<String>)
    where
        T: 'static,
        F: Future<Output = anyhow::Result<T>> + 'static,
    {
        self.record_rejection(future, None, Some(message.into()))
    }

    // ----- recording -----

    fn push(&self, entry: Entry) {
        let mut state = self.state.borrow_mut();
        if matches!(entry, Entry::Pending(_)) {
            state.pending_added.notify_one();
        }
        state.entries.push(entry);
    }

    fn argument_deadline(&self) -> Instant {
        Instant::now() + self.state.borrow().argument_timeout
    }

    #[track_caller]
    fn record(&self, kind: AssertionKind, check: impl FnOnce() -> Result<(), AssertionError>) {
        if self.is_closed() {
            return;
        }

        let location = CallSite::caller();
        let error = check().err();
        self.push(Entry::Settled(AssertionRecord::new(location, kind, error)));
    }

    #[track_caller]
    fn record_deferred<A, B, C>(
        &self,
        kind: AssertionKind,
        actual: Operand<A>,
        expected: Operand<B>,
        check: C,
    ) where
        A: 'static,
        B: 'static,
        C: FnOnce(A, B) -> Result<(), AssertionError> + 'static,
    {
        if self.is_closed() {
            return;
        }

        let location = CallSite::caller();
        let (actual, expected) = match (actual, expected) {
            (Operand::Ready(actual), Operand::Ready(expected)) => {
                let error = check(actual, expected).err();
                self.push(Entry::Settled(AssertionRecord::new(location, kind, error)));
                return;
            }
            operands => operands,
        };

        // Deadline runs from the call, not from the first poll
        let deadline = self.argument_deadline();
        let record = async move {
            let operands = AssertUnwindSafe(future::try_join(actual.resolve(), expected.resolve()))
                .catch_unwind();
            let error = match tokio::time::timeout_at(deadline, operands).await {
                Err(_) => Some(AssertionError::new(ARGUMENT_TIMEOUT_MESSAGE)),
                Ok(Err(payload)) => Some(AssertionError::from_fault(&panic_error(payload))),
                Ok(Ok(Err(fault))) => Some(AssertionError::from_fault(&fault)),
                Ok(Ok(Ok((actual, expected)))) => {
                    catch_unwind(AssertUnwindSafe(|| check(actual, expected)))
                        .unwrap_or_else(|payload| {
                            Err(AssertionError::from_fault(&panic_error(payload)))
                        })
                        .err()
                }
            };
            AssertionRecord::new(location, kind, error)
        };

        self.push(Entry::Pending(record.boxed_local().shared()));
    }

    #[track_caller]
    fn record_rejection<T, F>(&self, future: F, validator: Option<Validator>, message: Option<String>)
    where
        T: 'static,
        F: Future<Output = anyhow::Result<T>> + 'static,
    {
        if self.is_closed() {
            return;
        }

        let location = CallSite::caller();
        let deadline = self.argument_deadline();
        let record = async move {
            let mut record = AssertionRecord::new(location, AssertionKind::Rejects, None);

            match tokio::time::timeout_at(deadline, AssertUnwindSafe(future).catch_unwind()).await {
                Err(_) => record.error = Some(AssertionError::new(ARGUMENT_TIMEOUT_MESSAGE)),
                Ok(Err(payload)) => {
                    record.error = Some(AssertionError::from_fault(&panic_error(payload)));
                }
                Ok(Ok(Ok(_))) => {
                    let message = message.unwrap_or_else(|| RESOLVED_MESSAGE.to_string());
                    record.error = Some(AssertionError::new(message));
                }
                Ok(Ok(Err(reason))) => {
                    if let Some(validator) = validator {
                        let verdict = catch_unwind(AssertUnwindSafe(|| validator(&reason)))
                            .unwrap_or_else(|payload| Err(panic_error(payload)));
                        match verdict {
                            Ok(()) => record.validation = Some(Validation::Accepted),
                            Err(fault) => {
                                record.error = Some(AssertionError::from_fault(&fault));
                                record.validation = Some(Validation::Rejected(format!("{fault:#}")));
                            }
                        }
                    }
                }
            }

            record
        };

        self.push(Entry::Pending(record.boxed_local().shared()));
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Ledger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("Ledger")
            .field("len", &state.entries.len())
            .field("closed", &state.closed)
            .field("expected", &state.expected)
            .finish()
    }
}

/// Comparison builder for operands that may still be resolving
pub struct Eventually<'a, A, B> {
    ledger: &'a Ledger,
    actual: Operand<A>,
    expected: Operand<B>,
}

impl<A, B> Eventually<'_, A, B>
where
    A: Debug + 'static,
    B: Debug + 'static,
{
    #[track_caller]
    pub fn equal(self)
    where
        A: PartialEq<B>,
    {
        self.ledger
            .record_deferred(AssertionKind::Equal, self.actual, self.expected, |a, b| {
                equal(&a, &b)
            })
    }

    #[track_caller]
    pub fn not_equal(self)
    where
        A: PartialEq<B>,
    {
        self.ledger
            .record_deferred(AssertionKind::NotEqual, self.actual, self.expected, |a, b| {
                not_equal(&a, &b)
            })
    }

    #[track_caller]
    pub fn deep_equal(self)
    where
        A: Serialize,
        B: Serialize,
    {
        self.ledger
            .record_deferred(AssertionKind::DeepEqual, self.actual, self.expected, |a, b| {
                deep_equal(&a, &b)
            })
    }

    #[track_caller]
    pub fn not_deep_equal(self)
    where
        A: Serialize,
        B: Serialize,
    {
        self.ledger.record_deferred(
            AssertionKind::NotDeepEqual,
            self.actual,
            self.expected,
            |a, b| not_deep_equal(&a, &b),
        )
    }
}

impl<T> Eventually<'_, T, T>
where
    T: PartialEq + Debug + 'static,
{
    #[track_caller]
    pub fn strict_equal(self) {
        self.ledger.record_deferred(
            AssertionKind::StrictEqual,
            self.actual,
            self.expected,
            |a, b| strict_equal(&a, &b),
        )
    }

    #[track_caller]
    pub fn not_strict_equal(self) {
        self.ledger.record_deferred(
            AssertionKind::NotStrictEqual,
            self.actual,
            self.expected,
            |a, b| not_strict_equal(&a, &b),
        )
    }
}

// ----- comparisons -----

fn verdict(pass: bool, failure: impl FnOnce() -> AssertionError) -> Result<(), AssertionError> {
    if pass {
        Ok(())
    } else {
        Err(failure())
    }
}

fn truthy(value: bool) -> Result<(), AssertionError> {
    verdict(value, || {
        AssertionError::comparison(AssertionKind::Ok.operator(), &value, &true)
    })
}

fn equal<A: PartialEq<B> + Debug, B: Debug>(actual: &A, expected: &B) -> Result<(), AssertionError> {
    verdict(actual == expected, || {
        AssertionError::comparison(AssertionKind::Equal.operator(), actual, expected)
    })
}

fn not_equal<A: PartialEq<B> + Debug, B: Debug>(actual: &A, expected: &B) -> Result<(), AssertionError> {
    verdict(actual != expected, || {
        AssertionError::comparison(AssertionKind::NotEqual.operator(), actual, expected)
    })
}

fn strict_equal<T: PartialEq + Debug>(actual: &T, expected: &T) -> Result<(), AssertionError> {
    verdict(actual == expected, || {
        AssertionError::comparison(AssertionKind::StrictEqual.operator(), actual, expected)
    })
}

fn not_strict_equal<T: PartialEq + Debug>(actual: &T, expected: &T) -> Result<(), AssertionError> {
    verdict(actual != expected, || {
        AssertionError::comparison(AssertionKind::NotStrictEqual.operator(), actual, expected)
    })
}

fn json_image<T: Serialize + Debug>(value: &T) -> Result<serde_json::Value, AssertionError> {
    serde_json::to_value(value)
        .map_err(|e| AssertionError::new(format!("cannot compare {value:?}: {e}")))
}

fn deep_equal<A, B>(actual: &A, expected: &B) -> Result<(), AssertionError>
where
    A: Serialize + Debug,
    B: Serialize + Debug,
{
    let same = json_image(actual)? == json_image(expected)?;
    verdict(same, || {
        AssertionError::comparison(AssertionKind::DeepEqual.operator(), actual, expected)
    })
}

fn not_deep_equal<A, B>(actual: &A, expected: &B) -> Result<(), AssertionError>
where
    A: Serialize + Debug,
    B: Serialize + Debug,
{
    let same = json_image(actual)? == json_image(expected)?;
    verdict(!same, || {
        AssertionError::comparison(AssertionKind::NotDeepEqual.operator(), actual, expected)
    })
}
