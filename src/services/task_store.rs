//! Task collaborator

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::{
    error::StoreError,
    state::{TaskId, TaskSummary},
};

/// Access to task records the timer displays and credits
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Summary for display, `None` when the task does not exist
    async fn get_summary(&self, task_id: TaskId) -> Result<Option<TaskSummary>, StoreError>;

    /// Credit one completed pomodoro to the task
    async fn increment_completed(&self, task_id: TaskId) -> Result<(), StoreError>;
}

/// In-process task store
#[derive(Debug, Default)]
pub struct MemoryTaskStore {
    tasks: RwLock<HashMap<TaskId, TaskSummary>>,
}

impl MemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tasks(tasks: impl IntoIterator<Item = TaskSummary>) -> Self {
        Self {
            tasks: RwLock::new(tasks.into_iter().map(|t| (t.id, t)).collect()),
        }
    }
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    async fn get_summary(&self, task_id: TaskId) -> Result<Option<TaskSummary>, StoreError> {
        Ok(self.tasks.read().await.get(&task_id).cloned())
    }

    async fn increment_completed(&self, task_id: TaskId) -> Result<(), StoreError> {
        let mut tasks = self.tasks.write().await;
        let task = tasks
            .get_mut(&task_id)
            .ok_or_else(|| StoreError::NotFound(format!("task {}", task_id)))?;
        task.completed_pomodoros += 1;
        debug!("Task {} now has {} completed pomodoros", task_id, task.completed_pomodoros);
        Ok(())
    }
}
