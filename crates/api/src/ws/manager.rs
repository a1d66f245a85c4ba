use std::collections::{HashMap, HashSet};

use axum::body::Bytes;
use axum::extract::ws::Message;
use printframe_core::job_events::ServerMessage;
use printframe_core::types::{DbId, Timestamp, UserId};
use tokio::sync::{mpsc, RwLock};

/// Channel sender half for pushing messages to a WebSocket connection.
pub type WsSender = mpsc::UnboundedSender<Message>;

/// One open push channel.
pub struct WsConnection {
    /// Set by the first accepted subscription. A connection never serves
    /// two users.
    pub user_id: Option<UserId>,
    /// Jobs this connection follows.
    pub job_ids: HashSet<DbId>,
    pub sender: WsSender,
    pub connected_at: Timestamp,
}

/// Registry of open push channels and their job subscriptions.
pub struct WsManager {
    connections: RwLock<HashMap<String, WsConnection>>,
}

impl WsManager {
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new connection and return the receiver the socket writer
    /// drains.
    pub async fn add(&self, conn_id: String) -> mpsc::UnboundedReceiver<Message> {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = WsConnection {
            user_id: None,
            job_ids: HashSet::new(),
            sender: tx,
            connected_at: chrono::Utc::now(),
        };
        self.connections.write().await.insert(conn_id, conn);
        rx
    }

    pub async fn remove(&self, conn_id: &str) {
        self.connections.write().await.remove(conn_id);
    }

    /// Follow `job_id` on behalf of `user_id`.
    ///
    /// Returns false when the connection is unknown or already bound to a
    /// different user.
    pub async fn subscribe(&self, conn_id: &str, user_id: &str, job_id: DbId) -> bool {
        let mut conns = self.connections.write().await;
        let Some(conn) = conns.get_mut(conn_id) else {
            return false;
        };
        match &conn.user_id {
            Some(bound) if bound != user_id => return false,
            Some(_) => {}
            None => conn.user_id = Some(user_id.to_string()),
        }
        conn.job_ids.insert(job_id);
        true
    }

    pub async fn unsubscribe(&self, conn_id: &str, job_id: DbId) {
        if let Some(conn) = self.connections.write().await.get_mut(conn_id) {
            conn.job_ids.remove(&job_id);
        }
    }

    /// Queue a message on one connection.
    pub async fn send(&self, conn_id: &str, message: &ServerMessage) {
        if let Some(conn) = self.connections.read().await.get(conn_id) {
            let _ = conn.sender.send(to_ws_message(message));
        }
    }

    /// Deliver a message to every connection of `user_id` that follows
    /// `job_id`. Returns the number of connections reached.
    pub async fn send_to_job_subscribers(&self, user_id: &str, job_id: DbId, message: &ServerMessage) -> usize {
        let conns = self.connections.read().await;
        let mut count = 0;
        for conn in conns.values() {
            if conn.user_id.as_deref() == Some(user_id) && conn.job_ids.contains(&job_id) {
                let _ = conn.sender.send(to_ws_message(message));
                count += 1;
            }
        }
        count
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Send a Close frame to every connection, then clear the map.
    pub async fn shutdown_all(&self) {
        let mut conns = self.connections.write().await;
        let count = conns.len();
        for conn in conns.values() {
            let _ = conn.sender.send(Message::Close(None));
        }
        conns.clear();
        tracing::info!(count, "Closed all WebSocket connections");
    }

    /// Send a Ping frame to every connected client.
    pub async fn ping_all(&self) {
        let conns = self.connections.read().await;
        for conn in conns.values() {
            let _ = conn.sender.send(Message::Ping(Bytes::new()));
        }
    }
}

impl Default for WsManager {
    fn default() -> Self {
        Self::new()
    }
}

fn to_ws_message(message: &ServerMessage) -> Message {
    // Serializing these plain enums cannot fail.
    let text = serde_json::to_string(message).unwrap_or_default();
    Message::Text(text.into())
}
