//! Inbound commands and outbound messages exchanged with devices

use serde::{Deserialize, Serialize};

use crate::{
    error::TimerError,
    state::{PomodoroSettings, PresetType, SessionType, TaskId, TimerSnapshot},
};

/// Decoded command sent by a device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    Start {
        #[serde(default)]
        task_id: Option<TaskId>,
        session_type: SessionType,
        /// Session length in seconds
        duration: f64,
        #[serde(default)]
        preset_type: PresetType,
    },
    Stop,
    Pause,
    Resume,
    SkipToNext,
    ResetRounds,
    ChangePreset {
        preset_type: PresetType,
    },
    SettingsUpdated {
        #[serde(default)]
        settings: Option<PomodoroSettings>,
    },
    SyncRequest,
}

impl Command {
    /// Decode a JSON frame; unknown types and enum values are invalid input
    pub fn parse(raw: &str) -> Result<Self, TimerError> {
        serde_json::from_str(raw).map_err(|e| TimerError::invalid(e.to_string()))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::Start { .. } => "start",
            Command::Stop => "stop",
            Command::Pause => "pause",
            Command::Resume => "resume",
            Command::SkipToNext => "skip_to_next",
            Command::ResetRounds => "reset_rounds",
            Command::ChangePreset { .. } => "change_preset",
            Command::SettingsUpdated { .. } => "settings_updated",
            Command::SyncRequest => "sync_request",
        }
    }
}

/// Message pushed to devices
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerMessage {
    TimerSync(TimerSnapshot),
    TimerStopped,
    RoundsReset,
    SettingsUpdated { settings: PomodoroSettings },
    Error { message: String },
}
