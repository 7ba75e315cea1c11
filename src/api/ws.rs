//! WebSocket endpoint: one task per device connection

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures::{Sink, SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{
    state::AppState,
    sync::{Command, Connection, ServerMessage},
};

/// Query parameters of `GET /ws`
#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub user_id: Option<String>,
}

/// Handle GET /ws - Upgrade to a timer sync connection
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsParams>,
    State(state): State<Arc<AppState>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, params.user_id, state))
}

async fn handle_socket(mut socket: WebSocket, user_id: Option<String>, state: Arc<AppState>) {
    let Some(user_id) = resolve_user(user_id) else {
        warn!("Rejecting WebSocket connection without a user id");
        let _ = socket.send(Message::Close(None)).await;
        return;
    };

    let (sink, mut stream) = socket.split();
    let (connection, outbound) = Connection::channel(state.channel_capacity);
    let connection_id = connection.id();
    info!("User {} connected ({})", user_id, connection_id);

    let mut writer = tokio::spawn(write_outbound(sink, outbound, connection.clone()));

    state.broadcaster.connect(&user_id, connection.clone()).await;

    // Commands run to completion one at a time before the next frame is read
    loop {
        let frame = tokio::select! {
            _ = connection.closed() => {
                debug!("Connection {} of user {} was dropped by the server", connection_id, user_id);
                break;
            }
            frame = stream.next() => frame,
        };
        match frame {
            Some(Ok(Message::Text(text))) => {
                handle_text(&state, &user_id, &connection, &text).await
            }
            Some(Ok(Message::Close(_))) | None => break,
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                debug!("WebSocket error for user {}: {}", user_id, e);
                break;
            }
        }
    }

    state.broadcaster.disconnect(&user_id, &connection_id);
    connection.close();
    if tokio::time::timeout(state.send_timeout, &mut writer).await.is_err() {
        writer.abort();
    }
    info!("User {} disconnected ({})", user_id, connection_id);
}

/// A usable user id, or `None` when missing or blank
fn resolve_user(user_id: Option<String>) -> Option<String> {
    user_id.filter(|id| !id.trim().is_empty())
}

/// Drain the outbound queue into the socket until either side closes
///
/// A closed connection gets a close frame so the device knows to reconnect.
async fn write_outbound<S>(
    mut sink: S,
    mut outbound: mpsc::Receiver<ServerMessage>,
    connection: Connection,
) where
    S: Sink<Message> + Unpin,
{
    loop {
        let message = tokio::select! {
            biased;
            _ = connection.closed() => break,
            message = outbound.recv() => match message {
                Some(message) => message,
                None => break,
            },
        };
        let text = match serde_json::to_string(&message) {
            Ok(text) => text,
            Err(e) => {
                warn!("Failed to encode outbound message: {}", e);
                continue;
            }
        };
        if sink.send(Message::Text(text)).await.is_err() {
            return;
        }
    }
    let _ = sink.send(Message::Close(None)).await;
    let _ = sink.close().await;
}

async fn handle_text(state: &AppState, user_id: &str, connection: &Connection, text: &str) {
    let result = match Command::parse(text) {
        Ok(command) => state.dispatcher.dispatch(user_id, command).await,
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        warn!("Rejected command from user {}: {}", user_id, e);
        let reply = ServerMessage::Error {
            message: e.to_string(),
        };
        if let Err(send_error) = connection.send(reply, state.send_timeout).await {
            debug!("Could not report error to {}: {}", connection.id(), send_error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::{
        config::Config,
        services::{MemorySettingsStore, MemoryTaskStore},
        state::{PresetType, SessionType, TimerSnapshot},
        utils::ManualClock,
    };

    const START: &str = r#"{"type": "start", "session_type": "work", "duration": 1500}"#;

    struct Devices {
        sender: Connection,
        sender_rx: mpsc::Receiver<ServerMessage>,
        other_rx: mpsc::Receiver<ServerMessage>,
    }

    fn app_state() -> AppState {
        AppState::new(
            &Config::default(),
            Arc::new(MemorySettingsStore::new()),
            Arc::new(MemoryTaskStore::new()),
            Arc::new(ManualClock::default()),
        )
    }

    fn two_devices(state: &AppState) -> Devices {
        let (sender, sender_rx) = Connection::channel(8);
        let (other, other_rx) = Connection::channel(8);
        state.registry.add("u1", sender.clone());
        state.registry.add("u1", other);
        Devices {
            sender,
            sender_rx,
            other_rx,
        }
    }

    fn expect_sync(rx: &mut mpsc::Receiver<ServerMessage>) -> TimerSnapshot {
        match rx.try_recv() {
            Ok(ServerMessage::TimerSync(snapshot)) => snapshot,
            other => panic!("expected timer_sync, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn valid_command_reaches_every_device() {
        let state = app_state();
        let mut d = two_devices(&state);

        handle_text(&state, "u1", &d.sender, START).await;

        let snapshot = expect_sync(&mut d.sender_rx);
        assert_eq!(snapshot.session_type, SessionType::Work);
        assert_eq!(snapshot.remaining_time, 1500);
        assert_eq!(expect_sync(&mut d.other_rx), snapshot);
    }

    #[tokio::test]
    async fn rejected_frames_only_answer_the_sender() {
        let state = app_state();
        let mut d = two_devices(&state);
        handle_text(&state, "u1", &d.sender, START).await;
        handle_text(&state, "u1", &d.sender, r#"{"type": "pause"}"#).await;
        let before = state.broadcaster.peek("u1").await.unwrap();
        while d.sender_rx.try_recv().is_ok() {}
        while d.other_rx.try_recv().is_ok() {}

        for frame in [
            "not json",
            r#"{"type": "explode"}"#,
            r#"{"type": "change_preset", "preset_type": "medium"}"#,
            r#"{"type": "start", "session_type": "work", "duration": -5}"#,
            r#"{"type": "start", "session_type": "nap", "duration": 60}"#,
        ] {
            handle_text(&state, "u1", &d.sender, frame).await;

            match d.sender_rx.try_recv() {
                Ok(ServerMessage::Error { message }) => assert!(!message.is_empty()),
                other => panic!("expected error for {}, got {:?}", frame, other),
            }
            assert!(d.sender_rx.try_recv().is_err(), "{}", frame);
            assert!(d.other_rx.try_recv().is_err(), "{}", frame);
        }

        let after = state.broadcaster.peek("u1").await.unwrap();
        assert_eq!(after, before);
        assert!(after.is_paused);
        assert_eq!(after.preset_type, PresetType::Short);
    }

    #[tokio::test]
    async fn rejected_start_does_not_create_a_timer() {
        let state = app_state();
        let mut d = two_devices(&state);

        handle_text(
            &state,
            "u1",
            &d.sender,
            r#"{"type": "start", "session_type": "work", "duration": 0}"#,
        )
        .await;

        assert!(matches!(d.sender_rx.try_recv(), Ok(ServerMessage::Error { .. })));
        assert!(d.other_rx.try_recv().is_err());
        assert!(!state.engine.has_timer("u1").await);
    }

    #[test]
    fn blank_or_missing_user_is_rejected() {
        assert_eq!(resolve_user(None), None);
        assert_eq!(resolve_user(Some(String::new())), None);
        assert_eq!(resolve_user(Some("  ".to_string())), None);
        assert_eq!(resolve_user(Some("u1".to_string())), Some("u1".to_string()));
    }

    #[tokio::test]
    async fn writer_forwards_queued_messages_as_text() {
        let (sink, mut frames) = futures::channel::mpsc::unbounded::<Message>();
        let (connection, outbound) = Connection::channel(4);
        let writer = tokio::spawn(write_outbound(sink, outbound, connection.clone()));

        connection
            .send(ServerMessage::RoundsReset, Duration::from_millis(50))
            .await
            .unwrap();
        match frames.next().await {
            Some(Message::Text(text)) => assert_eq!(text, r#"{"type":"rounds_reset"}"#),
            other => panic!("expected text frame, got {:?}", other),
        }

        connection.close();
        tokio::time::timeout(Duration::from_millis(200), writer)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(frames.next().await, Some(Message::Close(None)));
    }

    #[tokio::test]
    async fn writer_hangs_up_when_connection_is_dropped_by_registry() {
        let state = app_state();
        let (sink, mut frames) = futures::channel::mpsc::unbounded::<Message>();
        let (connection, outbound) = Connection::channel(1);
        let writer = tokio::spawn(write_outbound(sink, outbound, connection.clone()));
        state.registry.add("u1", connection.clone());

        state.registry.remove("u1", &connection.id());

        tokio::time::timeout(Duration::from_millis(200), writer)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(frames.next().await, Some(Message::Close(None)));
        assert_eq!(frames.next().await, None);
    }
}
