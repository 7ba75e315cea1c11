//! Timer engine module
//! 
//! Per-user countdowns recomputed on demand; there is no ticking task.

pub mod engine;

// Re-export main types
pub use engine::{EngineOptions, Observation, SkipPolicy, TimerEngine};
