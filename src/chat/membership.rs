use std::sync::Arc;

use tracing::{info, warn};

use crate::chat::registry::RoomRegistry;
use crate::error::ChatError;

/// Tracks per-room member counts and drives room lifecycle:
/// `absent -> active (count >= 1) -> absent` when the count reaches zero.
///
/// Exactly-once semantics per connection are the caller's obligation; every
/// caller in this crate routes `leave` through the session binder's returned
/// binding, which can only be taken once.
#[derive(Debug)]
pub struct MembershipTracker {
    registry: Arc<RoomRegistry>,
}

impl MembershipTracker {
    pub fn new(registry: Arc<RoomRegistry>) -> Self {
        Self { registry }
    }

    /// Increments the room's member count by exactly one and returns the new
    /// count. The room may have been deleted between binding and this call;
    /// that is checked under the room lock, not assumed away.
    pub async fn join(&self, room_code: &str) -> Result<u32, ChatError> {
        let room = self
            .registry
            .get_room(room_code)
            .await
            .ok_or(ChatError::RoomNotFound)?;

        let mut state = room.lock_state().await;
        if state.closed {
            // Lost the race against the last leave; the registry entry is
            // on its way out or already gone.
            return Err(ChatError::RoomNotFound);
        }
        state.members += 1;
        info!("Room {} now has {} member(s)", room_code, state.members);
        Ok(state.members)
    }

    /// Decrements the member count by one and returns the new count. When
    /// the count reaches zero the room is marked closed and removed from the
    /// registry; zero is terminal for that code's lifecycle.
    pub async fn leave(&self, room_code: &str) -> Result<u32, ChatError> {
        let room = self
            .registry
            .get_room(room_code)
            .await
            .ok_or(ChatError::RoomNotFound)?;

        let remaining = {
            let mut state = room.lock_state().await;
            if state.closed {
                return Err(ChatError::RoomNotFound);
            }
            if state.members == 0 {
                // A leave without a matching join is a caller defect; refuse
                // rather than clamp so the count can never go negative.
                warn!("Leave called on room {} with zero members", room_code);
                return Err(ChatError::RoomNotFound);
            }
            state.members -= 1;
            if state.members == 0 {
                state.closed = true;
            }
            state.members
        };

        if remaining == 0 {
            self.registry.delete_room(room_code).await;
        } else {
            info!("Room {} now has {} member(s)", room_code, remaining);
        }
        Ok(remaining)
    }
}
