//! User settings collaborator

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::{
    error::StoreError,
    state::{PomodoroSettings, UserId},
};

/// Persistence for per-user duration tables
#[async_trait]
pub trait UserSettingsStore: Send + Sync {
    async fn get(&self, user_id: &str) -> Result<PomodoroSettings, StoreError>;
    async fn update(&self, user_id: &str, settings: PomodoroSettings) -> Result<(), StoreError>;
}

/// In-process settings store; unknown users get the default tables
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    settings: RwLock<HashMap<UserId, PomodoroSettings>>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_users(users: HashMap<UserId, PomodoroSettings>) -> Self {
        Self {
            settings: RwLock::new(users),
        }
    }
}

#[async_trait]
impl UserSettingsStore for MemorySettingsStore {
    async fn get(&self, user_id: &str) -> Result<PomodoroSettings, StoreError> {
        let settings = self.settings.read().await;
        Ok(settings.get(user_id).copied().unwrap_or_default())
    }

    async fn update(&self, user_id: &str, settings: PomodoroSettings) -> Result<(), StoreError> {
        debug!("Storing settings for user {}", user_id);
        self.settings
            .write()
            .await
            .insert(user_id.to_string(), settings);
        Ok(())
    }
}
