use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{sink::SinkExt, stream::StreamExt};
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, sync::Arc};
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use crate::AppState;

/// Event pushed to connected dashboard clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsMessage {
    pub event_type: String,
    pub payload: serde_json::Value,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl WsMessage {
    pub fn new(event_type: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            event_type: event_type.into(),
            payload,
            timestamp: chrono::Utc::now(),
        }
    }
}

/// Fan-out hub for live UI updates. Broadcasts are fire-and-forget: a send
/// with no connected clients is not an error.
pub struct WsManager {
    connections: Arc<RwLock<HashSet<Uuid>>>,
    broadcast: broadcast::Sender<WsMessage>,
}

impl WsManager {
    pub fn new() -> Self {
        let (broadcast, _) = broadcast::channel(1000);
        Self {
            connections: Arc::new(RwLock::new(HashSet::new())),
            broadcast,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WsMessage> {
        self.broadcast.subscribe()
    }

    pub fn broadcast_all(&self, message: WsMessage) {
        let _ = self.broadcast.send(message);
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    async fn register(&self, id: Uuid) {
        self.connections.write().await.insert(id);
    }

    async fn unregister(&self, id: &Uuid) {
        self.connections.write().await.remove(id);
    }
}

impl Default for WsManager {
    fn default() -> Self {
        Self::new()
    }
}

pub async fn websocket_handler(
    State(state): State<Arc<AppState>>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let connection_id = Uuid::new_v4();
    let mut rx = state.ws_manager.subscribe();

    state.ws_manager.register(connection_id).await;
    tracing::debug!("WebSocket client connected: {}", connection_id);

    let mut forward = tokio::spawn(async move {
        while let Ok(message) = rx.recv().await {
            let text = match serde_json::to_string(&message) {
                Ok(text) => text,
                Err(_) => continue,
            };
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    // Drain incoming frames until the client disconnects; the server side
    // is push-only.
    let mut drain = tokio::spawn(async move {
        while let Some(Ok(message)) = receiver.next().await {
            if let Message::Close(_) = message {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut forward => drain.abort(),
        _ = &mut drain => forward.abort(),
    }

    state.ws_manager.unregister(&connection_id).await;
    tracing::debug!("WebSocket client disconnected: {}", connection_id);
}
