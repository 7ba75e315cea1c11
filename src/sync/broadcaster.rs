//! Fan-out of timer snapshots to every device of a user

use std::{sync::Arc, time::Duration};

use futures::future::join_all;
use tracing::{debug, warn};

use crate::{
    state::TimerSnapshot,
    timer::{Observation, TimerEngine},
};

use super::{
    connection::{Connection, ConnectionId},
    messages::ServerMessage,
    registry::ConnectionRegistry,
};

/// Pushes recomputed timer state to a user's connections
pub struct SyncBroadcaster {
    engine: Arc<TimerEngine>,
    registry: Arc<ConnectionRegistry>,
    send_timeout: Duration,
}

impl SyncBroadcaster {
    pub fn new(
        engine: Arc<TimerEngine>,
        registry: Arc<ConnectionRegistry>,
        send_timeout: Duration,
    ) -> Self {
        Self {
            engine,
            registry,
            send_timeout,
        }
    }

    /// Register a device and bring it up to date with the user's timer
    pub async fn connect(&self, user_id: &str, connection: Connection) {
        self.registry.add(user_id, connection.clone());

        let Some((snapshot, transitioned)) = self.current_snapshot(user_id).await else {
            return;
        };

        if transitioned {
            // every device needs the new session, not only the newcomer
            self.broadcast(user_id, ServerMessage::TimerSync(snapshot)).await;
            return;
        }

        if let Err(e) = connection
            .send(ServerMessage::TimerSync(snapshot), self.send_timeout)
            .await
        {
            warn!("Initial sync to connection {} failed: {}", connection.id(), e);
            self.registry.remove(user_id, &connection.id());
        }
    }

    pub fn disconnect(&self, user_id: &str, connection_id: &ConnectionId) {
        self.registry.remove(user_id, connection_id);
    }

    /// Recompute the user's timer and push it to all their devices
    ///
    /// Returns the snapshot that was broadcast, `None` when the user has no timer.
    pub async fn sync(&self, user_id: &str) -> Option<TimerSnapshot> {
        let (snapshot, _) = self.current_snapshot(user_id).await?;
        self.broadcast(user_id, ServerMessage::TimerSync(snapshot.clone()))
            .await;
        Some(snapshot)
    }

    /// Current snapshot for a single reader
    ///
    /// Devices are only notified when the read itself completed a session.
    pub async fn peek(&self, user_id: &str) -> Option<TimerSnapshot> {
        let (snapshot, transitioned) = self.current_snapshot(user_id).await?;
        if transitioned {
            self.broadcast(user_id, ServerMessage::TimerSync(snapshot.clone()))
                .await;
        }
        Some(snapshot)
    }

    /// Snapshot after any due completion has been handled, plus whether one was
    async fn current_snapshot(&self, user_id: &str) -> Option<(TimerSnapshot, bool)> {
        match self.engine.observe(user_id).await? {
            Observation::Snapshot(snapshot) => Some((snapshot, false)),
            Observation::CompletionDue => {
                self.engine.handle_session_completion(user_id).await;
                match self.engine.observe(user_id).await? {
                    Observation::Snapshot(snapshot) => Some((snapshot, true)),
                    Observation::CompletionDue => None,
                }
            }
        }
    }

    /// Send a message to every connection of the user, pruning the ones that fail
    ///
    /// Sends run concurrently, each bounded by the send timeout. Returns how
    /// many connections accepted the message.
    pub async fn broadcast(&self, user_id: &str, message: ServerMessage) -> usize {
        let connections = self.registry.connections(user_id);
        if connections.is_empty() {
            return 0;
        }

        let sends = connections.iter().map(|connection| {
            let message = message.clone();
            async move {
                let result = connection.send(message, self.send_timeout).await;
                (connection.id(), result)
            }
        });
        let results = join_all(sends).await;

        let mut delivered = 0;
        for (connection_id, result) in results {
            match result {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!(
                        "Dropping connection {} for user {}: {}",
                        connection_id, user_id, e
                    );
                    self.registry.remove(user_id, &connection_id);
                }
            }
        }

        debug!(
            "Broadcast to user {}: {}/{} delivered",
            user_id,
            delivered,
            connections.len()
        );
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        services::{MemorySettingsStore, MemoryTaskStore},
        state::{PomodoroSettings, PresetType, SessionType},
        timer::EngineOptions,
        utils::ManualClock,
    };
    use tokio::sync::mpsc;

    struct Harness {
        broadcaster: SyncBroadcaster,
        engine: Arc<TimerEngine>,
        registry: Arc<ConnectionRegistry>,
        clock: Arc<ManualClock>,
    }

    fn harness() -> Harness {
        let clock = Arc::new(ManualClock::default());
        let engine = Arc::new(TimerEngine::new(
            Arc::new(MemorySettingsStore::new()),
            Arc::new(MemoryTaskStore::new()),
            clock.clone(),
            EngineOptions::default(),
        ));
        let registry = Arc::new(ConnectionRegistry::new());
        let broadcaster =
            SyncBroadcaster::new(engine.clone(), registry.clone(), Duration::from_millis(50));
        Harness {
            broadcaster,
            engine,
            registry,
            clock,
        }
    }

    async fn start(h: &Harness, seconds: f64) {
        h.engine
            .start_timer(
                "u1",
                None,
                SessionType::Work,
                seconds,
                PresetType::Short,
                Some(PomodoroSettings::default()),
            )
            .await
            .unwrap();
    }

    fn expect_sync(rx: &mut mpsc::Receiver<ServerMessage>) -> TimerSnapshot {
        match rx.try_recv() {
            Ok(ServerMessage::TimerSync(snapshot)) => snapshot,
            other => panic!("expected timer_sync, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn connect_without_timer_sends_nothing() {
        let h = harness();
        let (conn, mut rx) = Connection::channel(4);
        h.broadcaster.connect("u1", conn).await;
        assert!(rx.try_recv().is_err());
        assert_eq!(h.registry.connection_count(), 1);
    }

    #[tokio::test]
    async fn connect_sends_snapshot_only_to_newcomer() {
        let h = harness();
        let (first, mut first_rx) = Connection::channel(4);
        h.broadcaster.connect("u1", first).await;
        start(&h, 1500.0).await;

        let (second, mut second_rx) = Connection::channel(4);
        h.broadcaster.connect("u1", second).await;
        assert_eq!(expect_sync(&mut second_rx).remaining_time, 1500);
        assert!(first_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn sync_reaches_every_device() {
        let h = harness();
        let (a, mut a_rx) = Connection::channel(4);
        let (b, mut b_rx) = Connection::channel(4);
        h.registry.add("u1", a);
        h.registry.add("u1", b);
        start(&h, 1500.0).await;
        h.clock.advance_secs(25);

        let snapshot = h.broadcaster.sync("u1").await.unwrap();
        assert_eq!(snapshot.remaining_time, 1475);
        assert_eq!(expect_sync(&mut a_rx), snapshot);
        assert_eq!(expect_sync(&mut b_rx), snapshot);
    }

    #[tokio::test]
    async fn sync_without_timer_broadcasts_nothing() {
        let h = harness();
        let (a, mut a_rx) = Connection::channel(4);
        h.registry.add("u1", a);
        assert!(h.broadcaster.sync("u1").await.is_none());
        assert!(a_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn completed_session_is_never_shown_as_zero() {
        let h = harness();
        let (a, mut a_rx) = Connection::channel(4);
        h.registry.add("u1", a);
        start(&h, 60.0).await;
        h.clock.advance_secs(120);

        let snapshot = h.broadcaster.sync("u1").await.unwrap();
        assert_eq!(snapshot.session_type, SessionType::ShortBreak);
        assert_eq!(snapshot.remaining_time, 300);
        let received = expect_sync(&mut a_rx);
        assert_eq!(received.session_type, SessionType::ShortBreak);
        assert!(a_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn peek_is_quiet_unless_a_session_completed() {
        let h = harness();
        let (a, mut a_rx) = Connection::channel(4);
        h.registry.add("u1", a);
        start(&h, 60.0).await;

        assert_eq!(h.broadcaster.peek("u1").await.unwrap().remaining_time, 60);
        assert!(a_rx.try_recv().is_err());

        h.clock.advance_secs(61);
        let snapshot = h.broadcaster.peek("u1").await.unwrap();
        assert_eq!(snapshot.session_type, SessionType::ShortBreak);
        assert_eq!(expect_sync(&mut a_rx), snapshot);
    }

    #[tokio::test]
    async fn dead_connections_are_pruned_after_broadcast() {
        let h = harness();
        let (alive, mut alive_rx) = Connection::channel(4);
        let (dead, dead_rx) = Connection::channel(4);
        h.registry.add("u1", alive);
        h.registry.add("u1", dead);
        drop(dead_rx);

        let delivered = h.broadcaster.broadcast("u1", ServerMessage::RoundsReset).await;
        assert_eq!(delivered, 1);
        assert_eq!(h.registry.connection_count(), 1);
        assert_eq!(alive_rx.try_recv().unwrap(), ServerMessage::RoundsReset);
    }

    #[tokio::test]
    async fn device_dropped_after_timeout_is_closed_and_can_rejoin() {
        let h = harness();
        let (device, mut device_rx) = Connection::channel(1);
        h.broadcaster.connect("u1", device.clone()).await;

        start(&h, 1500.0).await;
        h.broadcaster.sync("u1").await;
        h.engine.pause("u1").await;
        // queue still holds the first sync, so this one times out
        h.broadcaster.sync("u1").await;

        assert_eq!(h.registry.connection_count(), 0);
        assert!(device.is_closed());
        assert!(!expect_sync(&mut device_rx).is_paused);

        let (rejoined, mut rejoined_rx) = Connection::channel(1);
        h.broadcaster.connect("u1", rejoined).await;
        assert!(expect_sync(&mut rejoined_rx).is_paused);
        assert_eq!(h.registry.connection_count(), 1);
    }

    #[tokio::test]
    async fn slow_connection_does_not_block_others() {
        let h = harness();
        let (slow, _slow_rx) = Connection::channel(1);
        let (fast, mut fast_rx) = Connection::channel(4);
        h.registry.add("u1", slow);
        h.registry.add("u1", fast);

        // first message fills the slow queue, the second times out on it
        h.broadcaster.broadcast("u1", ServerMessage::TimerStopped).await;
        let delivered = h.broadcaster.broadcast("u1", ServerMessage::RoundsReset).await;

        assert_eq!(delivered, 1);
        assert_eq!(h.registry.connection_count(), 1);
        assert_eq!(fast_rx.try_recv().unwrap(), ServerMessage::TimerStopped);
        assert_eq!(fast_rx.try_recv().unwrap(), ServerMessage::RoundsReset);
    }
}
