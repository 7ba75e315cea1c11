//! Per-user countdown state and its lazy recomputation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::settings::{PomodoroSettings, PresetType, SessionType, TaskId, TaskSummary};

/// One user's running or paused countdown
///
/// Remaining time is never decremented by a ticking task. It is derived from
/// `time_remaining_seconds` as of `last_update`, plus the paused flag, every
/// time somebody looks at it.
#[derive(Debug, Clone, PartialEq)]
pub struct TimerState {
    pub task_id: Option<TaskId>,
    pub session_type: SessionType,
    pub time_remaining_seconds: f64,
    pub is_paused: bool,
    pub last_update: DateTime<Utc>,
    pub round_number: u32,
    pub preset_type: PresetType,
    pub settings: PomodoroSettings,
    pub active_task: Option<TaskSummary>,
    /// Set when a recomputation crosses zero, cleared once consumed
    session_completed: bool,
}

/// Immutable rendering of a timer sent to every device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerSnapshot {
    pub task_id: Option<TaskId>,
    pub session_type: SessionType,
    pub remaining_time: u64,
    pub is_paused: bool,
    pub round_number: u32,
    pub active_task: Option<TaskSummary>,
    pub preset_type: PresetType,
}

impl TimerState {
    /// Create a paused timer in round 1
    pub fn new(
        task_id: Option<TaskId>,
        session_type: SessionType,
        time_remaining_seconds: f64,
        preset_type: PresetType,
        settings: PomodoroSettings,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            task_id,
            session_type,
            time_remaining_seconds: time_remaining_seconds.max(0.0),
            is_paused: true,
            last_update: now,
            round_number: 1,
            preset_type,
            settings,
            active_task: None,
            session_completed: false,
        }
    }

    /// Fresh paused work session at round 1 with the preset's work duration
    pub fn fresh_work(preset_type: PresetType, settings: PomodoroSettings, now: DateTime<Utc>) -> Self {
        let duration = settings.duration_seconds(preset_type, SessionType::Work);
        Self::new(None, SessionType::Work, duration, preset_type, settings, now)
    }

    /// Fold elapsed wall-clock time into the remaining time if running
    pub fn recompute(&mut self, now: DateTime<Utc>) {
        if self.is_paused {
            return;
        }

        // A clock stepping backwards counts as no elapsed time
        let elapsed = (now - self.last_update)
            .to_std()
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);
        let remaining = (self.time_remaining_seconds - elapsed).max(0.0);

        if remaining == 0.0 && self.time_remaining_seconds > 0.0 {
            self.session_completed = true;
        }

        self.time_remaining_seconds = remaining;
        if now > self.last_update {
            self.last_update = now;
        }
    }

    /// Recompute and return the remaining time rounded to whole seconds
    pub fn remaining_time(&mut self, now: DateTime<Utc>) -> u64 {
        self.recompute(now);
        self.rounded_remaining()
    }

    fn rounded_remaining(&self) -> u64 {
        self.time_remaining_seconds.max(0.0).round() as u64
    }

    pub fn pause(&mut self, now: DateTime<Utc>) {
        self.recompute(now);
        self.is_paused = true;
    }

    /// Resume counting from `now`, so time spent paused never elapses
    pub fn resume(&mut self, now: DateTime<Utc>) {
        self.recompute(now);
        self.last_update = now;
        self.is_paused = false;
    }

    /// Consume the one-shot completion edge
    pub fn take_completion(&mut self) -> bool {
        std::mem::take(&mut self.session_completed)
    }

    pub fn completion_pending(&self) -> bool {
        self.session_completed
    }

    pub fn cycle_length(&self) -> u32 {
        self.settings.preset(self.preset_type).cycle_length()
    }

    /// Session type and round that follow the current session
    pub fn next_session(&self) -> (SessionType, u32) {
        match self.session_type {
            SessionType::Work if self.round_number >= self.cycle_length() => {
                (SessionType::LongBreak, self.round_number)
            }
            SessionType::Work => (SessionType::ShortBreak, self.round_number),
            SessionType::ShortBreak => (SessionType::Work, self.round_number + 1),
            SessionType::LongBreak => (SessionType::Work, 1),
        }
    }

    /// Move to the next session with a full configured duration
    pub fn advance(&mut self, now: DateTime<Utc>, keep_running: bool) {
        let (session_type, round_number) = self.next_session();
        self.session_type = session_type;
        self.round_number = round_number;
        self.clamp_round();
        self.reset_duration();
        self.session_completed = false;
        self.last_update = now;
        self.is_paused = !keep_running;
    }

    /// Back to a paused first-round work session under the current preset
    pub fn reset_rounds(&mut self, now: DateTime<Utc>) {
        self.round_number = 1;
        self.session_type = SessionType::Work;
        self.reset_duration();
        self.session_completed = false;
        self.last_update = now;
        self.is_paused = true;
    }

    /// Switch duration tables, discarding progress in the current session
    pub fn apply_preset(&mut self, preset_type: PresetType, now: DateTime<Utc>) {
        self.preset_type = preset_type;
        self.clamp_round();
        self.reset_duration();
        self.session_completed = false;
        self.last_update = now;
    }

    /// Replace the settings snapshot; durations only change while paused
    pub fn apply_settings(&mut self, settings: PomodoroSettings) {
        self.settings = settings;
        self.clamp_round();
        if self.is_paused {
            self.reset_duration();
        }
    }

    fn reset_duration(&mut self) {
        self.time_remaining_seconds = self
            .settings
            .duration_seconds(self.preset_type, self.session_type);
    }

    pub(crate) fn clamp_round(&mut self) {
        self.round_number = self.round_number.clamp(1, self.cycle_length());
    }

    /// Render the current state without recomputing it
    pub fn snapshot(&self) -> TimerSnapshot {
        TimerSnapshot {
            task_id: self.task_id,
            session_type: self.session_type,
            remaining_time: self.rounded_remaining(),
            is_paused: self.is_paused,
            round_number: self.round_number,
            active_task: self.active_task.clone(),
            preset_type: self.preset_type,
        }
    }
}
