//! Shared utilities

pub mod clock;
pub mod logger;
pub mod panic;

pub use clock::{Clock, MonotonicClock};
pub use logger::{init_logger, LogLevel};
pub use panic::{panic_error, panic_message};
