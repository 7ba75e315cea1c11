//! Which connections each user currently has open

use std::collections::HashMap;

use dashmap::DashMap;
use tracing::debug;

use crate::state::UserId;

use super::connection::{Connection, ConnectionId};

/// Maps a user to the set of their live device connections
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    users: DashMap<UserId, HashMap<ConnectionId, Connection>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection; returns false if it was already registered
    pub fn add(&self, user_id: &str, connection: Connection) -> bool {
        let id = connection.id();
        let added = self
            .users
            .entry(user_id.to_string())
            .or_default()
            .insert(id, connection)
            .is_none();
        debug!("Registered connection {} for user {}", id, user_id);
        added
    }

    /// Deregister and close a connection, dropping the user's entry when it empties
    ///
    /// Closing tells the device's socket task to hang up, so a device pruned
    /// after a failed send reconnects instead of silently missing updates.
    pub fn remove(&self, user_id: &str, connection_id: &ConnectionId) -> bool {
        let removed = self
            .users
            .get_mut(user_id)
            .and_then(|mut connections| connections.remove(connection_id));
        self.users
            .remove_if(user_id, |_, connections| connections.is_empty());

        match removed {
            Some(connection) => {
                connection.close();
                debug!("Removed connection {} for user {}", connection_id, user_id);
                true
            }
            None => false,
        }
    }

    /// Copy of the user's current connections
    pub fn connections(&self, user_id: &str) -> Vec<Connection> {
        self.users
            .get(user_id)
            .map(|connections| connections.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn is_connected(&self, user_id: &str) -> bool {
        self.users.contains_key(user_id)
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn connection_count(&self) -> usize {
        self.users.iter().map(|entry| entry.value().len()).sum()
    }
}
