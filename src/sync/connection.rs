//! Handle to one device's duplex connection

use std::{sync::Arc, time::Duration};

use thiserror::Error;
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

use super::messages::ServerMessage;

/// Unique per device session
pub type ConnectionId = Uuid;

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum SendError {
    #[error("connection closed")]
    Closed,
    #[error("send timed out after {0:?}")]
    Timeout(Duration),
}

/// Outbound side of a device connection
///
/// Messages go into a bounded queue drained by the connection's writer task.
/// Clones share one close flag: once any of them is closed, the socket task
/// owning the device is expected to hang up.
#[derive(Debug, Clone)]
pub struct Connection {
    id: ConnectionId,
    tx: mpsc::Sender<ServerMessage>,
    closed: Arc<watch::Sender<bool>>,
}

impl Connection {
    pub fn new(tx: mpsc::Sender<ServerMessage>) -> Self {
        Self {
            id: Uuid::new_v4(),
            tx,
            closed: Arc::new(watch::channel(false).0),
        }
    }

    /// Connection plus the receiving end of its outbound queue
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ServerMessage>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Mark the connection as dead; every clone observes it
    pub fn close(&self) {
        self.closed.send_replace(true);
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Resolves once the connection has been closed
    pub async fn closed(&self) {
        let mut rx = self.closed.subscribe();
        // the sender lives in `self`, so this only returns once closed
        let _ = rx.wait_for(|closed| *closed).await;
    }

    /// Queue a message, waiting at most `limit` for room
    pub async fn send(&self, message: ServerMessage, limit: Duration) -> Result<(), SendError> {
        if self.is_closed() {
            return Err(SendError::Closed);
        }
        match tokio::time::timeout(limit, self.tx.send(message)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(SendError::Closed),
            Err(_) => Err(SendError::Timeout(limit)),
        }
    }
}
