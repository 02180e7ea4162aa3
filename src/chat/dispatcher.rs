use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, RwLock};
use tracing::{info, warn};
use uuid::Uuid;

use crate::chat::registry::{ChatMessage, RoomRegistry};
use crate::chat::sessions::SessionBinder;
use crate::error::ChatError;

/// Events delivered to connected clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ServerEvent {
    /// A chat message or, with an empty sender, a system notice.
    #[serde(rename = "message")]
    Message(ChatMessage),
    #[serde(rename = "receive_file")]
    ReceiveFile { username: String, file_url: String },
    #[serde(rename = "error")]
    Error { message: String },
    #[serde(rename = "ping")]
    Ping,
    #[serde(rename = "pong")]
    Pong,
}

/// Fans events out to every connection bound to a room.
///
/// Owns the connection-id to outbound-sender map; the session binder decides
/// who is in a room, this type decides how events reach them. Appends and
/// fanout for one room happen under that room's lock, which gives each room
/// FIFO delivery without serializing unrelated rooms.
#[derive(Debug)]
pub struct BroadcastDispatcher {
    registry: Arc<RoomRegistry>,
    sessions: Arc<SessionBinder>,
    senders: RwLock<HashMap<Uuid, mpsc::UnboundedSender<ServerEvent>>>,
}

impl BroadcastDispatcher {
    pub fn new(registry: Arc<RoomRegistry>, sessions: Arc<SessionBinder>) -> Self {
        Self {
            registry,
            sessions,
            senders: RwLock::new(HashMap::new()),
        }
    }

    pub async fn register(&self, id: Uuid, sender: mpsc::UnboundedSender<ServerEvent>) {
        self.senders.write().await.insert(id, sender);
        info!("Registered connection {}", id);
    }

    pub async fn unregister(&self, id: &Uuid) -> bool {
        let removed = self.senders.write().await.remove(id).is_some();
        if removed {
            info!("Unregistered connection {}", id);
        }
        removed
    }

    /// Delivers `event` to every connection currently bound to `room_code`.
    ///
    /// Chat messages (non-notice `Message` events) are appended to the
    /// room's history in the same critical section as the fanout, so history
    /// read afterwards shows each message exactly once in broadcast order.
    /// A recipient whose channel is already torn down is skipped and logged;
    /// the rest of the fanout proceeds.
    pub async fn broadcast(&self, room_code: &str, event: ServerEvent) -> Result<(), ChatError> {
        let room = self
            .registry
            .get_room(room_code)
            .await
            .ok_or(ChatError::RoomNotFound)?;

        let mut state = room.lock_state().await;
        if state.closed {
            return Err(ChatError::RoomNotFound);
        }

        if let ServerEvent::Message(message) = &event {
            if !message.is_notice() {
                state.messages.push(message.clone());
            }
        }

        let recipients = self.sessions.connections_in(room_code).await;
        let senders = self.senders.read().await;
        for id in recipients {
            let Some(sender) = senders.get(&id) else {
                warn!("Connection {} bound to room {} has no sender", id, room_code);
                continue;
            };
            if sender.send(event.clone()).is_err() {
                warn!("Failed to deliver to connection {}", id);
            }
        }

        Ok(())
    }
}
