//! Session, preset and duration-table types

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of a user owning a timer and a set of device connections
pub type UserId = String;

/// Identifier of a task tracked by the timer
pub type TaskId = i64;

/// Kind of timed interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionType {
    Work,
    ShortBreak,
    LongBreak,
}

impl fmt::Display for SessionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionType::Work => "work",
            SessionType::ShortBreak => "short_break",
            SessionType::LongBreak => "long_break",
        };
        f.write_str(name)
    }
}

/// Named duration table selector
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresetType {
    #[default]
    Short,
    Long,
}

impl fmt::Display for PresetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PresetType::Short => "short",
            PresetType::Long => "long",
        })
    }
}

fn default_sessions_before_long_break() -> u32 {
    4
}

/// Durations (in minutes) for one preset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresetDurations {
    pub work_duration: u32,
    pub short_break: u32,
    pub long_break: u32,
    #[serde(default = "default_sessions_before_long_break")]
    pub sessions_before_long_break: u32,
}

impl PresetDurations {
    /// Configured length of a session in minutes
    pub fn minutes_for(&self, session_type: SessionType) -> u32 {
        match session_type {
            SessionType::Work => self.work_duration,
            SessionType::ShortBreak => self.short_break,
            SessionType::LongBreak => self.long_break,
        }
    }

    /// Cycle length, never below one so round arithmetic stays defined
    pub fn cycle_length(&self) -> u32 {
        self.sessions_before_long_break.max(1)
    }
}

/// A user's configured duration tables, keyed by preset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PomodoroSettings {
    pub short: PresetDurations,
    pub long: PresetDurations,
}

impl PomodoroSettings {
    pub fn preset(&self, preset_type: PresetType) -> &PresetDurations {
        match preset_type {
            PresetType::Short => &self.short,
            PresetType::Long => &self.long,
        }
    }

    /// Session length in seconds under the given preset
    pub fn duration_seconds(&self, preset_type: PresetType, session_type: SessionType) -> f64 {
        f64::from(self.preset(preset_type).minutes_for(session_type)) * 60.0
    }
}

impl Default for PomodoroSettings {
    fn default() -> Self {
        Self {
            short: PresetDurations {
                work_duration: 25,
                short_break: 5,
                long_break: 15,
                sessions_before_long_break: 4,
            },
            long: PresetDurations {
                work_duration: 50,
                short_break: 10,
                long_break: 30,
                sessions_before_long_break: 4,
            },
        }
    }
}

/// Denormalized task details shown alongside the timer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSummary {
    pub id: TaskId,
    pub title: String,
    #[serde(default)]
    pub completed_pomodoros: u32,
    #[serde(default)]
    pub estimated_pomodoros: u32,
}
