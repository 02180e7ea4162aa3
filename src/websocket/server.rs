use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{error, info};

use crate::chat::ChatService;
use crate::websocket::Connection;

/// Accepts WebSocket connections and runs one handler per connection until
/// it drops. The handler's tail after the `select!` is the guaranteed
/// disconnect hook: unbind, leave and the departure notice run on every exit
/// path, abrupt ones included.
pub struct ChatServer {
    chat: Arc<ChatService>,
}

impl ChatServer {
    pub fn new(chat: Arc<ChatService>) -> Self {
        Self { chat }
    }

    pub fn chat(&self) -> Arc<ChatService> {
        self.chat.clone()
    }

    pub async fn run(self: Arc<Self>, listener: TcpListener) {
        while let Ok((stream, addr)) = listener.accept().await {
            let server = self.clone();
            tokio::spawn(async move {
                server.handle_connection(stream, addr).await;
            });
        }
    }

    pub async fn handle_connection(
        self: Arc<Self>,
        raw_stream: tokio::net::TcpStream,
        addr: std::net::SocketAddr,
    ) {
        info!("New WebSocket connection from: {}", addr);

        let ws_stream = match tokio_tungstenite::accept_async(raw_stream).await {
            Ok(ws) => ws,
            Err(e) => {
                error!("Error during WebSocket handshake: {}", e);
                return;
            }
        };

        let (ws_sink, ws_stream) = ws_stream.split();
        let (tx, rx) = mpsc::unbounded_channel();

        let connection = Connection::new(self.chat.clone(), tx.clone());
        let connection_id = connection.id();

        self.chat.connect(connection_id, tx).await;
        let mut heartbeat_task = connection.start_heartbeat();

        // Forward queued events to the socket as JSON text frames.
        let mut send_task = tokio::spawn(async move {
            let mut ws_sink = ws_sink;
            let mut rx = rx;

            while let Some(event) = rx.recv().await {
                let text = match serde_json::to_string(&event) {
                    Ok(text) => text,
                    Err(e) => {
                        error!("Failed to serialize event: {}", e);
                        continue;
                    }
                };
                if let Err(e) = ws_sink.send(Message::Text(text)).await {
                    error!("Error sending WebSocket message: {}", e);
                    break;
                }
            }

            if let Err(e) = ws_sink.close().await {
                error!("Error closing WebSocket connection: {}", e);
            }
        });

        // Drive inbound frames through the chat core.
        let mut receive_task = tokio::spawn(async move {
            let mut ws_stream = ws_stream;

            while let Some(message) = ws_stream.next().await {
                match message {
                    Ok(msg) => {
                        if let Err(e) = connection.handle_message(msg).await {
                            info!("Connection {} ending: {}", connection_id, e);
                            break;
                        }
                    }
                    Err(e) => {
                        error!("Error receiving WebSocket message: {}", e);
                        break;
                    }
                }
            }
        });

        tokio::select! {
            _ = &mut send_task => {
                info!("Send task completed for connection {}", connection_id);
            }
            _ = &mut receive_task => {
                info!("Receive task completed for connection {}", connection_id);
            }
            // Fires on heartbeat timeout: a silent peer is torn down here
            // rather than lingering until TCP reports the loss.
            _ = &mut heartbeat_task => {
                info!("Heartbeat ended for connection {}", connection_id);
            }
        }
        send_task.abort();
        receive_task.abort();
        heartbeat_task.abort();

        // Cleanup runs exactly once per connection lifecycle.
        self.chat.disconnect(&connection_id).await;
        info!("Connection {} closed", connection_id);
    }
}
