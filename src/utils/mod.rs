//! Shared helpers
//!
//! Logging setup, timing, and panic containment for user-supplied bodies.

mod logger;
mod timer;
mod unwind;

pub use logger::{init_logger, LogLevel};
pub use timer::{Stopwatch, Timer};
pub use unwind::catch_panic;
