//! Utility functions module
//! 
//! Shutdown signal handling and the clock abstraction used by the timer engine.

pub mod clock;
pub mod signals;

// Re-export main items
pub use clock::{Clock, ManualClock, SystemClock};
pub use signals::shutdown_signal;
