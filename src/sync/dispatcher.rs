//! Single entry point for device commands

use std::{sync::Arc, time::Duration};

use tracing::{info, warn};

use crate::{
    error::TimerError,
    services::{bounded, UserSettingsStore},
    state::PomodoroSettings,
    timer::TimerEngine,
};

use super::{broadcaster::SyncBroadcaster, messages::{Command, ServerMessage}};

/// Routes commands to the engine and syncs the user's devices afterwards
///
/// Commands for a user with no timer change nothing and broadcast nothing,
/// except `start`, `reset_rounds` and `settings_updated`, which apply to any user.
pub struct CommandDispatcher {
    engine: Arc<TimerEngine>,
    broadcaster: Arc<SyncBroadcaster>,
    settings_store: Arc<dyn UserSettingsStore>,
    store_timeout: Duration,
}

impl CommandDispatcher {
    pub fn new(
        engine: Arc<TimerEngine>,
        broadcaster: Arc<SyncBroadcaster>,
        settings_store: Arc<dyn UserSettingsStore>,
    ) -> Self {
        let store_timeout = engine.options().store_timeout;
        Self {
            engine,
            broadcaster,
            settings_store,
            store_timeout,
        }
    }

    pub async fn dispatch(&self, user_id: &str, command: Command) -> Result<(), TimerError> {
        info!("Command {} from user {}", command.name(), user_id);

        match command {
            Command::Start {
                task_id,
                session_type,
                duration,
                preset_type,
            } => {
                let settings = self.engine.fetch_settings(user_id).await;
                self.engine
                    .start_timer(
                        user_id,
                        task_id,
                        session_type,
                        duration,
                        preset_type,
                        Some(settings),
                    )
                    .await?;
                self.broadcaster.sync(user_id).await;
            }
            Command::Stop => {
                if self.engine.stop_timer(user_id).await {
                    self.broadcaster
                        .broadcast(user_id, ServerMessage::TimerStopped)
                        .await;
                }
            }
            Command::Pause => {
                if self.engine.pause(user_id).await {
                    self.broadcaster.sync(user_id).await;
                }
            }
            Command::Resume => {
                if self.engine.resume(user_id).await {
                    self.broadcaster.sync(user_id).await;
                }
            }
            Command::SkipToNext => {
                if self.engine.skip_to_next(user_id).await {
                    self.broadcaster.sync(user_id).await;
                }
            }
            Command::ResetRounds => {
                self.engine.reset_rounds(user_id).await;
                self.broadcaster.sync(user_id).await;
                self.broadcaster
                    .broadcast(user_id, ServerMessage::RoundsReset)
                    .await;
            }
            Command::ChangePreset { preset_type } => {
                if self.engine.change_preset(user_id, preset_type).await {
                    self.broadcaster.sync(user_id).await;
                }
            }
            Command::SettingsUpdated { settings } => {
                if let Some(settings) = self.resolve_settings(user_id, settings).await {
                    self.engine.refresh_user_settings(user_id, settings).await;
                    self.broadcaster
                        .broadcast(user_id, ServerMessage::SettingsUpdated { settings })
                        .await;
                }
                self.broadcaster.sync(user_id).await;
            }
            Command::SyncRequest => {
                self.broadcaster.sync(user_id).await;
            }
        }

        Ok(())
    }

    /// Settings carried by the command are persisted; otherwise re-fetch them
    ///
    /// `None` means the store could not be reached and the cached settings stay.
    async fn resolve_settings(
        &self,
        user_id: &str,
        carried: Option<PomodoroSettings>,
    ) -> Option<PomodoroSettings> {
        match carried {
            Some(settings) => {
                let update = self.settings_store.update(user_id, settings);
                if let Err(e) = bounded(self.store_timeout, update).await {
                    warn!("Failed to persist settings for user {}: {}", user_id, e);
                }
                Some(settings)
            }
            None => match bounded(self.store_timeout, self.settings_store.get(user_id)).await {
                Ok(settings) => Some(settings),
                Err(e) => {
                    warn!("Keeping cached settings for user {}: {}", user_id, e);
                    None
                }
            },
        }
    }
}
