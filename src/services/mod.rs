//! External collaborator module
//! 
//! The timer core reads user settings and task records through these traits
//! and never owns their persistence.

pub mod seed;
pub mod settings_store;
pub mod task_store;

use std::{future::Future, time::Duration};

use crate::error::StoreError;

// Re-export main types
pub use seed::SeedData;
pub use settings_store::{MemorySettingsStore, UserSettingsStore};
pub use task_store::{MemoryTaskStore, TaskStore};

/// Run a collaborator call with an upper bound on how long it may take
pub async fn bounded<T, F>(limit: Duration, call: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout(limit)),
    }
}
