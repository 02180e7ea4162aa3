use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, RwLock};
use tokio::time::sleep;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::chat::{ChatService, ServerEvent};
use crate::error::{ChatError, Error, WebSocketError};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
const HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(75);

/// Events accepted from clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ClientMessage {
    #[serde(rename = "join")]
    Join { room: String, name: String },
    #[serde(rename = "message")]
    Message { message: String },
    #[serde(rename = "leave")]
    Leave,
    #[serde(rename = "send_file")]
    SendFile { username: String, file_url: String },
    #[serde(rename = "ping")]
    Ping,
    #[serde(rename = "pong")]
    Pong,
}

/// One client connection: parses inbound frames and drives the chat core.
/// Outbound traffic goes through the unbounded channel owned by the
/// connection's forwarding task.
pub struct Connection {
    id: Uuid,
    chat: Arc<ChatService>,
    tx: mpsc::UnboundedSender<ServerEvent>,
    last_heartbeat: Arc<RwLock<std::time::Instant>>,
}

impl Connection {
    pub fn new(chat: Arc<ChatService>, tx: mpsc::UnboundedSender<ServerEvent>) -> Self {
        Self {
            id: Uuid::new_v4(),
            chat,
            tx,
            last_heartbeat: Arc::new(RwLock::new(std::time::Instant::now())),
        }
    }

    pub async fn handle_message(&self, msg: Message) -> Result<(), Error> {
        match msg {
            Message::Text(text) => {
                let client_msg: ClientMessage = match serde_json::from_str(&text) {
                    Ok(m) => m,
                    Err(e) => {
                        // Malformed input rejects that one frame, nothing more.
                        debug!("Unparseable frame on connection {}: {}", self.id, e);
                        self.send_event(ServerEvent::Error {
                            message: format!("Invalid message format: {e}"),
                        })?;
                        return Ok(());
                    }
                };
                self.handle_client_message(client_msg).await
            }
            Message::Close(_) => {
                info!("Client initiated close for connection {}", self.id);
                Err(Error::WebSocket(WebSocketError::ConnectionError(
                    "Connection closed by client".to_string(),
                )))
            }
            Message::Ping(_) | Message::Pong(_) => {
                *self.last_heartbeat.write().await = std::time::Instant::now();
                Ok(())
            }
            _ => {
                warn!("Unsupported message type on connection {}", self.id);
                Ok(())
            }
        }
    }

    async fn handle_client_message(&self, msg: ClientMessage) -> Result<(), Error> {
        match msg {
            ClientMessage::Join { room, name } => {
                match self.chat.join(self.id, &room, &name).await {
                    Ok(()) => {}
                    Err(ChatError::RoomNotFound) => {
                        self.send_event(ServerEvent::Error {
                            message: "Room code invalid".to_string(),
                        })?;
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            ClientMessage::Message { message } => {
                match self.chat.send_message(&self.id, &message).await {
                    Ok(()) => {}
                    // A message racing disconnect cleanup is benign; drop it.
                    Err(ChatError::UnboundSession) => {
                        debug!("Dropped message from unbound connection {}", self.id);
                    }
                    Err(ChatError::RoomNotFound) => {
                        self.send_event(ServerEvent::Error {
                            message: "Room no longer exists".to_string(),
                        })?;
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            ClientMessage::Leave => {
                if let Err(e) = self.chat.leave(&self.id).await {
                    debug!("Leave from connection {} ignored: {}", self.id, e);
                }
            }
            ClientMessage::SendFile { username, file_url } => {
                match self.chat.share_file(&self.id, &username, &file_url).await {
                    Ok(()) => {}
                    Err(ChatError::UnboundSession) => {
                        debug!("Dropped file share from unbound connection {}", self.id);
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            ClientMessage::Ping => {
                self.send_event(ServerEvent::Pong)?;
            }
            ClientMessage::Pong => {
                *self.last_heartbeat.write().await = std::time::Instant::now();
            }
        }
        Ok(())
    }

    fn send_event(&self, event: ServerEvent) -> Result<(), Error> {
        self.tx.send(event).map_err(|e| {
            Error::WebSocket(WebSocketError::SendError(format!(
                "Failed to queue event: {e}"
            )))
        })
    }

    /// Spawns the server-side heartbeat. The returned handle completes when
    /// the peer goes silent past the timeout (or the outbound channel is
    /// gone), so the connection handler can tear the socket down instead of
    /// carrying a dead peer until TCP notices.
    pub fn start_heartbeat(&self) -> tokio::task::JoinHandle<()> {
        self.heartbeat_loop(HEARTBEAT_INTERVAL, HEARTBEAT_TIMEOUT)
    }

    fn heartbeat_loop(&self, interval: Duration, timeout: Duration) -> tokio::task::JoinHandle<()> {
        let last_heartbeat = self.last_heartbeat.clone();
        let tx = self.tx.clone();
        let id = self.id;

        tokio::spawn(async move {
            loop {
                sleep(interval).await;

                let elapsed = std::time::Instant::now()
                    .duration_since(*last_heartbeat.read().await);
                if elapsed > timeout {
                    warn!("Heartbeat timeout for connection {}", id);
                    break;
                }

                if tx.send(ServerEvent::Ping).is_err() {
                    break;
                }
            }
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::ChatMessage;
    use serde_json::json;

    #[test]
    fn test_client_message_wire_shapes() {
        let msg: ClientMessage = serde_json::from_value(json!({
            "type": "join",
            "payload": { "room": "AB12CD", "name": "Alice" }
        }))
        .unwrap();
        assert!(matches!(msg, ClientMessage::Join { room, name }
            if room == "AB12CD" && name == "Alice"));

        let msg: ClientMessage = serde_json::from_value(json!({
            "type": "message",
            "payload": { "message": "hi" }
        }))
        .unwrap();
        assert!(matches!(msg, ClientMessage::Message { message } if message == "hi"));

        let msg: ClientMessage = serde_json::from_value(json!({ "type": "leave" })).unwrap();
        assert!(matches!(msg, ClientMessage::Leave));

        let msg: ClientMessage = serde_json::from_value(json!({
            "type": "send_file",
            "payload": { "username": "Alice", "file_url": "/uploads/cat.png" }
        }))
        .unwrap();
        assert!(matches!(msg, ClientMessage::SendFile { .. }));
    }

    #[test]
    fn test_server_event_wire_shapes() {
        let event = ServerEvent::Message(ChatMessage::new("Alice", "hi"));
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "message");
        assert_eq!(value["payload"]["sender"], "Alice");
        assert_eq!(value["payload"]["message"], "hi");

        let event = ServerEvent::ReceiveFile {
            username: "Alice".to_string(),
            file_url: "/uploads/cat.png".to_string(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "receive_file");
        assert_eq!(value["payload"]["file_url"], "/uploads/cat.png");
    }

    #[tokio::test]
    async fn test_join_frame_drives_chat_core() {
        let chat = Arc::new(ChatService::new(6, 32));
        let code = chat.create_room().await.unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let connection = Connection::new(chat.clone(), tx.clone());
        chat.connect(connection.id(), tx).await;

        let frame = json!({
            "type": "join",
            "payload": { "room": code, "name": "Alice" }
        });
        connection
            .handle_message(Message::Text(frame.to_string()))
            .await
            .unwrap();

        match rx.try_recv().unwrap() {
            ServerEvent::Message(m) => {
                assert_eq!(m.body, "Alice has entered the chat");
                assert!(m.is_notice());
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(chat.room_info(&code).await.unwrap().members, 1);
    }

    #[tokio::test]
    async fn test_invalid_room_code_reports_error_event() {
        let chat = Arc::new(ChatService::new(6, 32));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let connection = Connection::new(chat.clone(), tx.clone());
        chat.connect(connection.id(), tx).await;

        let frame = json!({
            "type": "join",
            "payload": { "room": "NOPE42", "name": "Alice" }
        });
        connection
            .handle_message(Message::Text(frame.to_string()))
            .await
            .unwrap();

        match rx.try_recv().unwrap() {
            ServerEvent::Error { message } => assert_eq!(message, "Room code invalid"),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_malformed_frame_is_not_fatal() {
        let chat = Arc::new(ChatService::new(6, 32));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let connection = Connection::new(chat, tx);

        connection
            .handle_message(Message::Text("not json".to_string()))
            .await
            .unwrap();

        assert!(matches!(
            rx.try_recv().unwrap(),
            ServerEvent::Error { .. }
        ));
    }

    #[tokio::test]
    async fn test_app_level_ping_gets_pong() {
        let chat = Arc::new(ChatService::new(6, 32));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let connection = Connection::new(chat, tx);

        connection
            .handle_message(Message::Text(json!({ "type": "ping" }).to_string()))
            .await
            .unwrap();

        assert!(matches!(rx.try_recv().unwrap(), ServerEvent::Pong));
    }

    #[tokio::test]
    async fn test_silent_peer_ends_heartbeat() {
        let chat = Arc::new(ChatService::new(6, 32));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let connection = Connection::new(chat, tx);

        let handle =
            connection.heartbeat_loop(Duration::from_millis(5), Duration::from_millis(20));

        // A peer that never answers must end the loop, not leave it pinging
        // forever.
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("heartbeat never gave up on the silent peer")
            .unwrap();

        assert!(matches!(rx.try_recv(), Ok(ServerEvent::Ping)));
    }
}
