//! Standard hooks.

pub mod logging;
pub mod timeout;

pub use logging::LoggingHook;
pub use timeout::{TimeoutError, TimeoutHook};
