//! Pomodoro Sync - real-time timer synchronization for multi-device clients
//! 
//! This library keeps one authoritative countdown per user, recomputed from a
//! captured timestamp on every read, and pushes it to every device the user
//! has connected.

pub mod config;
pub mod error;
pub mod state;
pub mod timer;
pub mod sync;
pub mod api;
pub mod services;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use error::{StoreError, TimerError};
pub use state::AppState;
pub use timer::TimerEngine;
pub use api::create_router;
pub use utils::signals::shutdown_signal;
