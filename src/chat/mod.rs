//! Real-time room/session coordination core.
//!
//! Four cooperating pieces: the room registry (code -> room state), the
//! session binder (connection -> room + display name), the membership
//! tracker (per-room counts and room lifecycle) and the broadcast
//! dispatcher (room-scoped fanout). `ChatService` ties them together and is
//! the only surface the transport and HTTP layers talk to.

pub mod dispatcher;
pub mod handlers;
pub mod membership;
pub mod registry;
pub mod sessions;

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

pub use dispatcher::{BroadcastDispatcher, ServerEvent};
pub use membership::MembershipTracker;
pub use registry::{ChatMessage, Room, RoomRegistry};
pub use sessions::{SessionBinder, SessionBinding};

use crate::error::ChatError;

#[derive(Debug, Clone, Serialize)]
pub struct RoomInfo {
    pub code: String,
    pub members: u32,
}

/// Facade over the coordination core. One instance per process; all room
/// state lives in memory and dies with the process.
#[derive(Debug)]
pub struct ChatService {
    registry: Arc<RoomRegistry>,
    sessions: Arc<SessionBinder>,
    membership: MembershipTracker,
    dispatcher: BroadcastDispatcher,
}

impl ChatService {
    pub fn new(code_length: usize, max_code_attempts: u32) -> Self {
        let registry = Arc::new(RoomRegistry::new(code_length, max_code_attempts));
        let sessions = Arc::new(SessionBinder::new(registry.clone()));
        let membership = MembershipTracker::new(registry.clone());
        let dispatcher = BroadcastDispatcher::new(registry.clone(), sessions.clone());
        Self {
            registry,
            sessions,
            membership,
            dispatcher,
        }
    }

    /// Allocates a room under a fresh code. Codes still referenced by a
    /// bound session are treated as taken even if their room is already
    /// gone, so a late cleanup can never collide with a new room. The
    /// referenced set is read inside the registry's allocation lock, not
    /// snapshotted ahead of it, so it cannot go stale against a concurrent
    /// bind-then-delete.
    pub async fn create_room(&self) -> Result<String, ChatError> {
        self.registry
            .create_room(|| self.sessions.referenced_codes())
            .await
    }

    pub async fn room_info(&self, code: &str) -> Option<RoomInfo> {
        let room = self.registry.get_room(code).await?;
        Some(RoomInfo {
            code: room.code().to_string(),
            members: room.member_count().await,
        })
    }

    pub async fn history(&self, code: &str) -> Result<Vec<ChatMessage>, ChatError> {
        let room = self
            .registry
            .get_room(code)
            .await
            .ok_or(ChatError::RoomNotFound)?;
        Ok(room.history().await)
    }

    /// Registers a connection's outbound channel. Must be called before the
    /// connection can receive any broadcast.
    pub async fn connect(&self, connection_id: Uuid, sender: mpsc::UnboundedSender<ServerEvent>) {
        self.dispatcher.register(connection_id, sender).await;
    }

    /// Binds the connection, records the join and announces it to the room.
    /// A connection that is already in a room is moved: the departure path
    /// runs first, with its own notice.
    pub async fn join(
        &self,
        connection_id: Uuid,
        room_code: &str,
        display_name: &str,
    ) -> Result<(), ChatError> {
        if self.sessions.resolve(&connection_id).await.is_some() {
            self.depart(&connection_id).await;
        }

        self.sessions
            .bind(connection_id, room_code, display_name)
            .await?;

        if let Err(e) = self.membership.join(room_code).await {
            // The room vanished between bind and join; roll the binding back.
            self.sessions.unbind(&connection_id).await;
            return Err(e);
        }

        let notice = ChatMessage::notice(format!("{display_name} has entered the chat"));
        if let Err(e) = self
            .dispatcher
            .broadcast(room_code, ServerEvent::Message(notice))
            .await
        {
            debug!("Join notice for room {} not delivered: {}", room_code, e);
        }
        Ok(())
    }

    /// Resolves the sender and broadcasts `{sender, message}` to their room,
    /// appending it to history in the same step.
    pub async fn send_message(&self, connection_id: &Uuid, text: &str) -> Result<(), ChatError> {
        let binding = self
            .sessions
            .resolve(connection_id)
            .await
            .ok_or(ChatError::UnboundSession)?;

        let message = ChatMessage::new(binding.display_name, text);
        match self
            .dispatcher
            .broadcast(&binding.room_code, ServerEvent::Message(message))
            .await
        {
            Ok(()) => Ok(()),
            Err(ChatError::RoomNotFound) => {
                // The room was deleted out from under the session; the
                // binding is invalid from here on.
                self.sessions.unbind(connection_id).await;
                Err(ChatError::RoomNotFound)
            }
            Err(e) => Err(e),
        }
    }

    /// Rebroadcasts a file-share notice to the sender's room. The reference
    /// behavior fanned these out globally; here they are room-scoped like
    /// every other event (see DESIGN.md).
    pub async fn share_file(
        &self,
        connection_id: &Uuid,
        username: &str,
        file_url: &str,
    ) -> Result<(), ChatError> {
        let binding = self
            .sessions
            .resolve(connection_id)
            .await
            .ok_or(ChatError::UnboundSession)?;

        self.dispatcher
            .broadcast(
                &binding.room_code,
                ServerEvent::ReceiveFile {
                    username: username.to_string(),
                    file_url: file_url.to_string(),
                },
            )
            .await
    }

    /// Explicit leave: announces the departure and releases the membership,
    /// keeping the connection itself alive for a later join.
    pub async fn leave(&self, connection_id: &Uuid) -> Result<(), ChatError> {
        self.depart(connection_id)
            .await
            .map(|_| ())
            .ok_or(ChatError::UnboundSession)
    }

    /// Disconnect hook. Runs on every exit path of a connection; unbind,
    /// leave and the departure notice each happen at most once because the
    /// binding can only be taken out of the binder once.
    pub async fn disconnect(&self, connection_id: &Uuid) {
        self.dispatcher.unregister(connection_id).await;
        self.depart(connection_id).await;
    }

    async fn depart(&self, connection_id: &Uuid) -> Option<SessionBinding> {
        let binding = self.sessions.unbind(connection_id).await?;

        // The leaver is already unbound and does not see their own notice.
        let notice =
            ChatMessage::notice(format!("{} has left the chat", binding.display_name));
        if let Err(e) = self
            .dispatcher
            .broadcast(&binding.room_code, ServerEvent::Message(notice))
            .await
        {
            debug!(
                "Departure notice for room {} not delivered: {}",
                binding.room_code, e
            );
        }

        if let Err(e) = self.membership.leave(&binding.room_code).await {
            warn!(
                "Leave bookkeeping for room {} failed: {}",
                binding.room_code, e
            );
        }
        Some(binding)
    }

    pub fn registry(&self) -> &Arc<RoomRegistry> {
        &self.registry
    }

    pub fn sessions(&self) -> &Arc<SessionBinder> {
        &self.sessions
    }

    pub fn dispatcher(&self) -> &BroadcastDispatcher {
        &self.dispatcher
    }
}
