//! Per-user conversation states, created lazily and hydrated from the store.

use log::{ debug, info, warn };
use sha2::{ Digest, Sha256 };
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{ Arc, Mutex };
use tokio::sync::{ Mutex as AsyncMutex, OnceCell };

use crate::models::chat::ConversationState;
use crate::store::UserStore;

pub const DEFAULT_HYDRATE_TURNS: usize = 5;

/// Locked for the whole of a turn so turns for one user never interleave.
pub type SessionHandle = Arc<AsyncMutex<ConversationState>>;

/// First 16 hex chars of the SHA-256 of the textual IP.
pub fn user_id_for_ip(ip: &IpAddr) -> String {
    let digest = Sha256::digest(ip.to_string().as_bytes());
    let mut id = hex::encode(digest);
    id.truncate(16);
    id
}

pub struct SessionRegistry {
    store: Arc<dyn UserStore>,
    hydrate_turns: usize,
    sessions: Mutex<HashMap<String, Arc<OnceCell<SessionHandle>>>>,
}

impl SessionRegistry {
    pub fn new(store: Arc<dyn UserStore>, hydrate_turns: usize) -> Self {
        Self {
            store,
            hydrate_turns,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Concurrent first calls for the same id share one initialisation and
    /// all receive the same handle.
    pub async fn get_or_create(&self, user_id: &str) -> SessionHandle {
        let (cell, existed) = {
            let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
            match sessions.get(user_id) {
                Some(cell) => (Arc::clone(cell), true),
                None => {
                    let cell = Arc::new(OnceCell::new());
                    sessions.insert(user_id.to_string(), Arc::clone(&cell));
                    (cell, false)
                }
            }
        };

        if existed {
            if let Some(handle) = cell.get() {
                self.touch(user_id);
                return Arc::clone(handle);
            }
        }

        let handle = cell.get_or_init(|| self.hydrate(user_id)).await;
        Arc::clone(handle)
    }

    fn touch(&self, user_id: &str) {
        let store = Arc::clone(&self.store);
        let user_id = user_id.to_string();
        tokio::spawn(async move {
            if let Err(e) = store.update_last_active(&user_id).await {
                warn!("Failed to update last activity for {}: {}", user_id, e);
            }
        });
    }

    async fn hydrate(&self, user_id: &str) -> SessionHandle {
        if let Err(e) = self.store.create_user(user_id).await {
            warn!("Failed to register user {}: {}", user_id, e);
        }

        let mut state = ConversationState::new(user_id);
        match self.store.get_chat_history(user_id, self.hydrate_turns).await {
            Ok(records) => {
                for record in records {
                    state.push_turn(record.user_message, record.bot_message);
                }
            }
            Err(e) => warn!("Starting {} with empty history, load failed: {}", user_id, e),
        }
        debug!("Session {} hydrated with {} messages", user_id, state.messages.len());
        Arc::new(AsyncMutex::new(state))
    }

    /// The durable store is untouched; the next access re-hydrates.
    pub fn clear(&self, user_id: &str) -> bool {
        let removed = self.sessions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(user_id)
            .is_some();
        if removed {
            info!("Cleared session for {}", user_id);
        }
        removed
    }

    pub fn clear_all(&self) {
        self.sessions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    pub fn len(&self) -> usize {
        self.sessions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::chat::Role;
    use crate::store::MemoryUserStore;

    #[test]
    fn user_id_is_stable_sha256_prefix() {
        let ip: IpAddr = "127.0.0.1".parse().unwrap();
        assert_eq!(user_id_for_ip(&ip), "12ca17b49af22894");
        assert_eq!(user_id_for_ip(&ip), user_id_for_ip(&ip));
        let other: IpAddr = "10.0.0.1".parse().unwrap();
        assert_ne!(user_id_for_ip(&ip), user_id_for_ip(&other));
    }

    #[tokio::test]
    async fn hydrates_last_turns_as_pairs() {
        let store = Arc::new(MemoryUserStore::default());
        for i in 0..8 {
            store.save_chat("u1", &format!("q{}", i), &format!("a{}", i)).await.unwrap();
        }
        let registry = SessionRegistry::new(store, 5);

        let handle = registry.get_or_create("u1").await;
        let state = handle.lock().await;
        assert_eq!(state.messages.len(), 10);
        assert_eq!(state.messages[0].role, Role::User);
        assert_eq!(state.messages[0].content, "q3");
        assert_eq!(state.messages[9].role, Role::Assistant);
        assert_eq!(state.messages[9].content, "a7");
        assert!(state.interest_summary.is_empty());
    }

    #[tokio::test]
    async fn new_user_is_created_with_empty_state() {
        let store = Arc::new(MemoryUserStore::default());
        let registry = SessionRegistry::new(store.clone(), 5);
        let handle = registry.get_or_create("fresh").await;
        assert!(handle.lock().await.messages.is_empty());
        assert!(store.has_user("fresh"));
    }

    #[tokio::test]
    async fn concurrent_first_access_shares_one_state() {
        let registry = Arc::new(SessionRegistry::new(Arc::new(MemoryUserStore::default()), 5));
        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                tokio::spawn(async move { registry.get_or_create("u1").await })
            })
            .collect();

        let mut handles = Vec::new();
        for task in tasks {
            handles.push(task.await.unwrap());
        }
        assert!(handles.iter().all(|h| Arc::ptr_eq(h, &handles[0])));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn clear_forces_rehydration() {
        let store = Arc::new(MemoryUserStore::default());
        let registry = SessionRegistry::new(store.clone(), 5);

        let first = registry.get_or_create("u1").await;
        first.lock().await.push_turn("unsaved", "turn");
        store.save_chat("u1", "saved", "turn").await.unwrap();

        assert!(registry.clear("u1"));
        assert!(!registry.clear("u1"));

        let second = registry.get_or_create("u1").await;
        assert!(!Arc::ptr_eq(&first, &second));
        let state = second.lock().await;
        assert_eq!(state.messages.len(), 2);
        assert_eq!(state.messages[0].content, "saved");
    }
}
