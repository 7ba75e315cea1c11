//! State management module
//! 
//! This module contains the timer value object, the duration tables it reads,
//! and the shared application state handed to request handlers.

pub mod app_state;
pub mod settings;
pub mod timer_state;

// Re-export main types
pub use app_state::AppState;
pub use settings::{
    PomodoroSettings, PresetDurations, PresetType, SessionType, TaskId, TaskSummary, UserId,
};
pub use timer_state::{TimerSnapshot, TimerState};
