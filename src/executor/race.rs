//! Completion race
//!
//! Every phase settles through a single slot. The user function, its returned
//! future, the fault listener and the timeout fuse all compete for it; the
//! first settlement wins and later ones are ignored.

use futures::future::{self, FutureExt};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::Rc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::debug;

use super::fault::FaultSource;
use crate::error::EngineError;
use crate::models::{Outcome, Phase, StepResult};
use crate::utils::panic_error;

/// How a phase completed without faulting
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Signal {
    Finished,
    Skipped,
}

/// A user fault that ended a phase
#[derive(Debug)]
pub struct PhaseFault {
    pub error: anyhow::Error,
    /// Arrived through the fault listener rather than the phase itself
    pub uncaught: bool,
}

impl PhaseFault {
    pub fn thrown(error: anyhow::Error) -> Self {
        Self {
            error,
            uncaught: false,
        }
    }

    pub fn uncaught(error: anyhow::Error) -> Self {
        Self {
            error,
            uncaught: true,
        }
    }
}

pub type Settlement = Result<Signal, PhaseFault>;

/// Write end of a phase's completion slot
#[derive(Clone)]
pub struct Completion {
    slot: Rc<RefCell<Option<oneshot::Sender<Settlement>>>>,
}

impl Completion {
    pub(crate) fn new() -> (Self, oneshot::Receiver<Settlement>) {
        let (sender, receiver) = oneshot::channel();
        let completion = Self {
            slot: Rc::new(RefCell::new(Some(sender))),
        };
        (completion, receiver)
    }

    /// Settle the slot. Returns false if it was already settled.
    pub fn settle(&self, settlement: Settlement) -> bool {
        let sender = self.slot.borrow_mut().take();
        match sender {
            Some(sender) => sender.send(settlement).is_ok(),
            None => false,
        }
    }

    pub fn is_settled(&self) -> bool {
        self.slot.borrow().is_none()
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("settled", &self.is_settled())
            .finish()
    }
}

/// Completion callback handed to setup and teardown hooks
#[derive(Clone, Debug)]
pub struct Done {
    completion: Completion,
}

impl Done {
    pub(crate) fn new(completion: Completion) -> Self {
        Self { completion }
    }

    /// Signal that the hook has finished
    pub fn done(&self) {
        self.completion.settle(Ok(Signal::Finished));
    }
}

/// Run one phase function to settlement.
///
/// The fault subscription is held for the whole race and released on every
/// exit path when it drops. The fuse length is read after `invoke` returns so
/// the function may adjust it synchronously.
pub(crate) async fn race<F>(
    phase: Phase,
    faults: &dyn FaultSource,
    limit: &Cell<Duration>,
    invoke: F,
) -> Result<Settlement, EngineError>
where
    F: FnOnce(Completion) -> StepResult,
{
    let (completion, mut receiver) = Completion::new();
    let mut subscription = faults.subscribe()?;

    let returned = match catch_unwind(AssertUnwindSafe(|| invoke(completion.clone()))) {
        Ok(Ok(Outcome::Pending)) => None,
        Ok(Ok(Outcome::Future(future))) => Some(future),
        Ok(Err(error)) => {
            completion.settle(Err(PhaseFault::thrown(error)));
            None
        }
        Err(payload) => {
            completion.settle(Err(PhaseFault::thrown(panic_error(payload))));
            None
        }
    };

    let forward = async move {
        match returned {
            Some(future) => match AssertUnwindSafe(future).catch_unwind().await {
                Ok(Ok(())) => Ok(Signal::Finished),
                Ok(Err(error)) => Err(PhaseFault::thrown(error)),
                Err(payload) => Err(PhaseFault::thrown(panic_error(payload))),
            },
            None => future::pending().await,
        }
    };
    tokio::pin!(forward);

    let fuse = tokio::time::sleep(limit.get());
    tokio::pin!(fuse);

    let contender = tokio::select! {
        biased;
        settled = &mut receiver => {
            return settled.map_err(|_| EngineError::CompletionLost(phase));
        }
        settlement = &mut forward => settlement,
        fault = subscription.next_fault() => Err(PhaseFault::uncaught(fault)),
        _ = &mut fuse => {
            debug!("Phase {} hit its {}ms fuse", phase, limit.get().as_millis());
            Err(PhaseFault::thrown(anyhow::anyhow!("timed out waiting for {}", phase)))
        }
    };

    completion.settle(contender);
    drop(subscription);
    receiver
        .await
        .map_err(|_| EngineError::CompletionLost(phase))
}
