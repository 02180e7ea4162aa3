use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use crate::chat::registry::RoomRegistry;
use crate::error::ChatError;

/// The live binding of one connection to one room and display name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionBinding {
    pub room_code: String,
    pub display_name: String,
}

/// Associates a transport connection with a `(room, display_name)` pair for
/// the connection's lifetime. Bindings are owned exclusively by their
/// connection and are never persisted.
#[derive(Debug)]
pub struct SessionBinder {
    registry: Arc<RoomRegistry>,
    bindings: RwLock<HashMap<Uuid, SessionBinding>>,
}

impl SessionBinder {
    pub fn new(registry: Arc<RoomRegistry>) -> Self {
        Self {
            registry,
            bindings: RwLock::new(HashMap::new()),
        }
    }

    /// Records the binding so later events from the same connection resolve
    /// to `(room, name)` without re-supplying them. Rejects codes that are
    /// not currently live.
    pub async fn bind(
        &self,
        connection_id: Uuid,
        room_code: &str,
        display_name: &str,
    ) -> Result<(), ChatError> {
        let room = self
            .registry
            .get_room(room_code)
            .await
            .ok_or(ChatError::RoomNotFound)?;

        // Inserted under the room's state lock. A room closes under that
        // lock before its registry entry is removed, so no binding can come
        // into existence after the deletion path has started; every stale
        // binding is therefore visible to the code allocator's reserved set.
        let state = room.lock_state().await;
        if state.closed {
            return Err(ChatError::RoomNotFound);
        }
        self.bindings.write().await.insert(
            connection_id,
            SessionBinding {
                room_code: room_code.to_string(),
                display_name: display_name.to_string(),
            },
        );
        drop(state);

        info!("Bound connection {} to room {}", connection_id, room_code);
        Ok(())
    }

    pub async fn resolve(&self, connection_id: &Uuid) -> Option<SessionBinding> {
        self.bindings.read().await.get(connection_id).cloned()
    }

    /// Removes the binding, returning it so the caller can run leave
    /// bookkeeping exactly once. Idempotent: a second unbind returns `None`.
    pub async fn unbind(&self, connection_id: &Uuid) -> Option<SessionBinding> {
        let removed = self.bindings.write().await.remove(connection_id);
        if removed.is_some() {
            info!("Unbound connection {}", connection_id);
        }
        removed
    }

    /// Connections currently bound to the given room.
    pub async fn connections_in(&self, room_code: &str) -> Vec<Uuid> {
        self.bindings
            .read()
            .await
            .iter()
            .filter(|(_, b)| b.room_code == room_code)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Every room code referenced by a live binding. The registry consults
    /// this when allocating codes so a code with a stale session cannot be
    /// reissued before that session's cleanup completes.
    pub async fn referenced_codes(&self) -> HashSet<String> {
        self.bindings
            .read()
            .await
            .values()
            .map(|b| b.room_code.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    async fn setup() -> (Arc<RoomRegistry>, SessionBinder, String) {
        let registry = Arc::new(RoomRegistry::new(6, 32));
        let code = registry.create_room(|| async { HashSet::new() }).await.unwrap();
        let binder = SessionBinder::new(registry.clone());
        (registry, binder, code)
    }

    #[tokio::test]
    async fn test_bind_and_resolve() {
        let (_registry, binder, code) = setup().await;
        let id = Uuid::new_v4();

        binder.bind(id, &code, "Alice").await.unwrap();

        let binding = binder.resolve(&id).await.unwrap();
        assert_eq!(binding.room_code, code);
        assert_eq!(binding.display_name, "Alice");
    }

    #[tokio::test]
    async fn test_bind_to_closing_room_fails() {
        let (registry, binder, code) = setup().await;

        // The last leave marks the room closed before removing the registry
        // entry; a bind that resolved the room just before must still lose.
        let room = registry.get_room(&code).await.unwrap();
        room.lock_state().await.closed = true;

        let err = binder
            .bind(Uuid::new_v4(), &code, "Alice")
            .await
            .unwrap_err();
        assert_eq!(err, ChatError::RoomNotFound);
        assert!(binder.referenced_codes().await.is_empty());
    }

    #[tokio::test]
    async fn test_bind_to_missing_room_fails() {
        let (_registry, binder, _code) = setup().await;
        let id = Uuid::new_v4();

        let err = binder.bind(id, "NOPE42", "Alice").await.unwrap_err();
        assert_eq!(err, ChatError::RoomNotFound);
        assert!(binder.resolve(&id).await.is_none());
    }

    #[tokio::test]
    async fn test_unbind_is_idempotent() {
        let (_registry, binder, code) = setup().await;
        let id = Uuid::new_v4();
        binder.bind(id, &code, "Alice").await.unwrap();

        let first = binder.unbind(&id).await;
        assert!(first.is_some());
        assert!(binder.unbind(&id).await.is_none());
        assert!(binder.resolve(&id).await.is_none());
    }

    #[tokio::test]
    async fn test_connections_in_room() {
        let (registry, binder, code) = setup().await;
        let other = registry.create_room(|| async { HashSet::new() }).await.unwrap();

        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        binder.bind(a, &code, "Alice").await.unwrap();
        binder.bind(b, &code, "Bob").await.unwrap();
        binder.bind(c, &other, "Carol").await.unwrap();

        let mut in_room = binder.connections_in(&code).await;
        in_room.sort();
        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(in_room, expected);

        assert_eq!(binder.connections_in(&other).await, vec![c]);
    }

    #[tokio::test]
    async fn test_referenced_codes_guard_reuse() {
        let (registry, binder, code) = setup().await;
        let id = Uuid::new_v4();
        binder.bind(id, &code, "Alice").await.unwrap();

        // Room deleted while the session still references it.
        registry.delete_room(&code).await;
        assert!(binder.referenced_codes().await.contains(&code));

        // After cleanup the code is free again.
        binder.unbind(&id).await;
        assert!(!binder.referenced_codes().await.contains(&code));
    }
}
