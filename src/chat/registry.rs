use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, MutexGuard, RwLock};
use tracing::info;

use crate::error::ChatError;

/// Characters used for room codes. Uppercase only so codes survive being
/// read out loud or typed from a phone.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// A single chat message as stored in room history and sent on the wire.
/// An empty `sender` marks a system notice; those are broadcast but never
/// appended to history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub sender: String,
    #[serde(rename = "message")]
    pub body: String,
}

impl ChatMessage {
    pub fn new(sender: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            body: body.into(),
        }
    }

    pub fn notice(body: impl Into<String>) -> Self {
        Self::new("", body)
    }

    pub fn is_notice(&self) -> bool {
        self.sender.is_empty()
    }
}

/// Mutable state of one room. Always accessed through the room's mutex so
/// member-count updates and history appends for a room are serialized.
#[derive(Debug)]
pub(crate) struct RoomState {
    pub(crate) members: u32,
    pub(crate) messages: Vec<ChatMessage>,
    /// Set when the last member leaves, before the registry entry is removed.
    /// A join that raced the removal observes this and is rejected instead of
    /// incrementing a dead room.
    pub(crate) closed: bool,
}

#[derive(Debug)]
pub struct Room {
    code: String,
    state: Mutex<RoomState>,
}

impl Room {
    fn new(code: String) -> Self {
        Self {
            code,
            state: Mutex::new(RoomState {
                members: 0,
                messages: Vec::new(),
                closed: false,
            }),
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub(crate) async fn lock_state(&self) -> MutexGuard<'_, RoomState> {
        self.state.lock().await
    }

    pub async fn member_count(&self) -> u32 {
        self.state.lock().await.members
    }

    pub async fn history(&self) -> Vec<ChatMessage> {
        self.state.lock().await.messages.clone()
    }
}

/// Process-wide mapping from room code to room state.
///
/// The outer map lock is held only for lookups and insert/remove; all
/// per-room mutation happens under the room's own mutex, so unrelated rooms
/// never block each other.
#[derive(Debug)]
pub struct RoomRegistry {
    rooms: RwLock<HashMap<String, Arc<Room>>>,
    code_length: usize,
    max_code_attempts: u32,
}

impl RoomRegistry {
    pub fn new(code_length: usize, max_code_attempts: u32) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            code_length,
            max_code_attempts,
        }
    }

    fn random_code(&self) -> String {
        let mut rng = rand::thread_rng();
        (0..self.code_length)
            .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
            .collect()
    }

    /// Creates a room under a code that is neither live in the registry nor
    /// in the reserved set. Callers supply the codes still referenced by
    /// bound sessions so a code cannot be reissued while a stale session
    /// could still resolve to it.
    ///
    /// `reserved` is evaluated after the map write lock is taken. Deleting a
    /// room needs that same lock, so a binding stranded by a concurrent last
    /// leave is always in the set this allocation sees.
    pub async fn create_room<F, Fut>(&self, reserved: F) -> Result<String, ChatError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = HashSet<String>>,
    {
        let mut rooms = self.rooms.write().await;
        let reserved = reserved().await;

        for _ in 0..self.max_code_attempts {
            let code = self.random_code();
            if rooms.contains_key(&code) || reserved.contains(&code) {
                continue;
            }
            rooms.insert(code.clone(), Arc::new(Room::new(code.clone())));
            info!("Created room {}", code);
            return Ok(code);
        }

        Err(ChatError::CodeSpaceExhausted)
    }

    pub async fn get_room(&self, code: &str) -> Option<Arc<Room>> {
        self.rooms.read().await.get(code).cloned()
    }

    /// Removes the room. Idempotent: removing an absent code is a no-op.
    pub async fn delete_room(&self, code: &str) -> bool {
        let removed = self.rooms.write().await.remove(code).is_some();
        if removed {
            info!("Deleted room {}", code);
        }
        removed
    }

    /// Appends a message to the room's history. The room may have been
    /// deleted between the caller's lookup and this call; that race surfaces
    /// as `RoomNotFound`, never a panic.
    pub async fn append_message(&self, code: &str, message: ChatMessage) -> Result<(), ChatError> {
        let room = self
            .get_room(code)
            .await
            .ok_or(ChatError::RoomNotFound)?;

        let mut state = room.lock_state().await;
        if state.closed {
            return Err(ChatError::RoomNotFound);
        }
        state.messages.push(message);
        Ok(())
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }
}
