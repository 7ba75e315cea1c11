//! Startup data for the in-memory collaborators

use std::{collections::HashMap, path::Path};

use anyhow::Context;
use serde::Deserialize;
use tracing::info;

use crate::state::{PomodoroSettings, TaskSummary, UserId};

use super::{MemorySettingsStore, MemoryTaskStore};

/// Contents of a `--data-file` seed
#[derive(Debug, Default, Deserialize)]
pub struct SeedData {
    #[serde(default)]
    pub users: HashMap<UserId, PomodoroSettings>,
    #[serde(default)]
    pub tasks: Vec<TaskSummary>,
}

impl SeedData {
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        serde_json::from_str(json).context("invalid seed data")
    }

    pub async fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read seed file {}", path.display()))?;
        let seed = Self::from_json(&raw)?;
        info!(
            "Loaded seed data: {} users, {} tasks",
            seed.users.len(),
            seed.tasks.len()
        );
        Ok(seed)
    }

    pub fn into_stores(self) -> (MemorySettingsStore, MemoryTaskStore) {
        (
            MemorySettingsStore::with_users(self.users),
            MemoryTaskStore::with_tasks(self.tasks),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{TaskStore, UserSettingsStore};

    #[tokio::test]
    async fn seed_populates_both_stores() {
        let seed = SeedData::from_json(
            r#"{
                "users": {
                    "alice": {
                        "short": {"work_duration": 20, "short_break": 5, "long_break": 15},
                        "long": {"work_duration": 45, "short_break": 10, "long_break": 25, "sessions_before_long_break": 3}
                    }
                },
                "tasks": [{"id": 1, "title": "Write report", "estimated_pomodoros": 4}]
            }"#,
        )
        .unwrap();

        let (settings, tasks) = seed.into_stores();
        let alice = settings.get("alice").await.unwrap();
        assert_eq!(alice.short.work_duration, 20);
        assert_eq!(alice.long.sessions_before_long_break, 3);
        assert_eq!(tasks.get_summary(1).await.unwrap().unwrap().title, "Write report");
    }

    #[test]
    fn empty_seed_is_valid() {
        let seed = SeedData::from_json("{}").unwrap();
        assert!(seed.users.is_empty());
        assert!(seed.tasks.is_empty());
    }
}
