//! Asynchronous fault channel
//!
//! Faults raised away from a phase's own call stack (spawned tasks, callbacks)
//! are reported here and delivered to whichever phase is currently listening.

use futures::future::{self, FutureExt};
use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::rc::Rc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::error::EngineError;
use crate::utils::panic_error;

/// Capability to listen for asynchronous faults during a phase
pub trait FaultSource {
    /// Attach a listener. At most one may be attached at a time.
    fn subscribe(&self) -> Result<FaultSubscription, EngineError>;
}

/// An attached listener. Dropping it detaches.
pub struct FaultSubscription {
    receiver: mpsc::UnboundedReceiver<anyhow::Error>,
    release: Option<Box<dyn FnOnce()>>,
}

impl FaultSubscription {
    pub fn new(
        receiver: mpsc::UnboundedReceiver<anyhow::Error>,
        release: impl FnOnce() + 'static,
    ) -> Self {
        Self {
            receiver,
            release: Some(Box::new(release)),
        }
    }

    /// Wait for the next fault. Never resolves once the sender side is gone.
    pub async fn next_fault(&mut self) -> anyhow::Error {
        match self.receiver.recv().await {
            Some(fault) => fault,
            None => future::pending().await,
        }
    }
}

impl Drop for FaultSubscription {
    fn drop(&mut self) {
        self.receiver.close();
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl fmt::Debug for FaultSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FaultSubscription").finish_non_exhaustive()
    }
}

type Fallback = Rc<dyn Fn(anyhow::Error)>;

#[derive(Default)]
struct ChannelState {
    listener: Option<(u64, mpsc::UnboundedSender<anyhow::Error>)>,
    next_id: u64,
    fallback: Option<Fallback>,
}

/// Default fault source, one per thread
#[derive(Clone, Default)]
pub struct FaultChannel {
    state: Rc<RefCell<ChannelState>>,
}

thread_local! {
    static CURRENT: FaultChannel = FaultChannel::new();
}

impl FaultChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// The channel shared by everything on this thread
    pub fn current() -> Self {
        CURRENT.with(Clone::clone)
    }

    /// Handler for faults reported while no phase is listening
    pub fn with_fallback(self, handler: impl Fn(anyhow::Error) + 'static) -> Self {
        self.state.borrow_mut().fallback = Some(Rc::new(handler));
        self
    }

    pub fn is_listening(&self) -> bool {
        self.state.borrow().listener.is_some()
    }

    /// Deliver a fault to the listening phase. Returns false if nothing was
    /// listening and the fault went to the fallback instead.
    pub fn report(&self, fault: anyhow::Error) -> bool {
        let sender = self
            .state
            .borrow()
            .listener
            .as_ref()
            .map(|(_, sender)| sender.clone());

        let fault = match sender {
            Some(sender) => match sender.send(fault) {
                Ok(()) => return true,
                Err(mpsc::error::SendError(fault)) => fault,
            },
            None => fault,
        };

        let fallback = self.state.borrow().fallback.clone();
        match fallback {
            Some(handler) => handler(fault),
            None => warn!("Uncaught fault with no phase listening: {:#}", fault),
        }
        false
    }

    /// Spawn a task on the local set. An error or panic from it is reported
    /// as an uncaught fault.
    pub fn spawn<F>(&self, future: F) -> JoinHandle<()>
    where
        F: Future<Output = anyhow::Result<()>> + 'static,
    {
        let channel = self.clone();
        tokio::task::spawn_local(async move {
            let fault = match AssertUnwindSafe(future).catch_unwind().await {
                Ok(Ok(())) => return,
                Ok(Err(error)) => error,
                Err(payload) => panic_error(payload),
            };
            channel.report(fault);
        })
    }
}

impl FaultSource for FaultChannel {
    fn subscribe(&self) -> Result<FaultSubscription, EngineError> {
        let mut state = self.state.borrow_mut();
        if state.listener.is_some() {
            return Err(EngineError::FaultListenerBusy);
        }

        let id = state.next_id;
        state.next_id += 1;

        let (sender, receiver) = mpsc::unbounded_channel();
        state.listener = Some((id, sender));

        let channel = Rc::downgrade(&self.state);
        Ok(FaultSubscription::new(receiver, move || {
            if let Some(state) = channel.upgrade() {
                let mut state = state.borrow_mut();
                if matches!(state.listener, Some((current, _)) if current == id) {
                    state.listener = None;
                }
            }
        }))
    }
}

impl fmt::Debug for FaultChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FaultChannel")
            .field("listening", &self.is_listening())
            .finish()
    }
}
