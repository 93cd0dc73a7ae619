//! Engine errors
//!
//! Defects in the engine itself. User faults never surface here; they are
//! recorded on the test case instead.

use thiserror::Error;

use crate::models::Phase;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("fault listener already attached; phases must not overlap")]
    FaultListenerBusy,

    #[error("completion slot for {0} phase was dropped before settling")]
    CompletionLost(Phase),

    #[error("cannot add children to '{0}' after it has run")]
    Sealed(String),
}
