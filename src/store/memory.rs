use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::Mutex;

use super::{ now_timestamp, StoreError, UserStore };
use crate::models::store::{ ChatRecord, Favorite, TravelPlanRecord };

#[derive(Default)]
struct UserRecord {
    last_active: String,
    chats: Vec<ChatRecord>,
    plans: Vec<TravelPlanRecord>,
    favorites: Vec<Favorite>,
}

/// Process-local store. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryUserStore {
    users: Mutex<HashMap<String, UserRecord>>,
    next_plan_id: Mutex<i64>,
}

impl MemoryUserStore {
    fn with_user<T>(&self, user_id: &str, f: impl FnOnce(&mut UserRecord) -> T) -> T {
        let mut users = self.users.lock().unwrap_or_else(|e| e.into_inner());
        f(users.entry(user_id.to_string()).or_default())
    }

    fn read_user<T: Default>(&self, user_id: &str, f: impl FnOnce(&UserRecord) -> T) -> T {
        let users = self.users.lock().unwrap_or_else(|e| e.into_inner());
        users.get(user_id).map(f).unwrap_or_default()
    }

    pub fn has_user(&self, user_id: &str) -> bool {
        self.users
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(user_id)
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn create_user(&self, user_id: &str) -> Result<(), StoreError> {
        self.with_user(user_id, |user| {
            if user.last_active.is_empty() {
                user.last_active = now_timestamp();
            }
        });
        Ok(())
    }

    async fn update_last_active(&self, user_id: &str) -> Result<(), StoreError> {
        let mut users = self.users.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(user) = users.get_mut(user_id) {
            user.last_active = now_timestamp();
        }
        Ok(())
    }

    async fn save_chat(
        &self,
        user_id: &str,
        user_message: &str,
        bot_message: &str
    ) -> Result<(), StoreError> {
        self.with_user(user_id, |user| {
            user.chats.push(ChatRecord {
                timestamp: now_timestamp(),
                user_message: user_message.to_string(),
                bot_message: bot_message.to_string(),
            })
        });
        Ok(())
    }

    async fn get_chat_history(
        &self,
        user_id: &str,
        limit: usize
    ) -> Result<Vec<ChatRecord>, StoreError> {
        Ok(
            self.read_user(user_id, |user| {
                let start = user.chats.len().saturating_sub(limit);
                user.chats[start..].to_vec()
            })
        )
    }

    async fn save_travel_plan(
        &self,
        user_id: &str,
        title: &str,
        city: &str,
        date_range: &str,
        plan_data: &JsonValue
    ) -> Result<i64, StoreError> {
        let id = {
            let mut next = self.next_plan_id.lock().unwrap_or_else(|e| e.into_inner());
            *next += 1;
            *next
        };
        self.with_user(user_id, |user| {
            user.plans.push(TravelPlanRecord {
                id,
                created_at: now_timestamp(),
                title: title.to_string(),
                city: city.to_string(),
                date_range: date_range.to_string(),
                plan_data: plan_data.clone(),
            })
        });
        Ok(id)
    }

    async fn get_travel_plans(&self, user_id: &str) -> Result<Vec<TravelPlanRecord>, StoreError> {
        Ok(self.read_user(user_id, |user| user.plans.iter().rev().cloned().collect()))
    }

    async fn add_favorite(
        &self,
        user_id: &str,
        city: &str,
        category: &str,
        notes: &str
    ) -> Result<(), StoreError> {
        self.with_user(user_id, |user| {
            user.favorites.push(Favorite {
                city: city.to_string(),
                category: category.to_string(),
                notes: notes.to_string(),
                added_at: now_timestamp(),
            })
        });
        Ok(())
    }

    async fn get_favorites(&self, user_id: &str) -> Result<Vec<Favorite>, StoreError> {
        Ok(self.read_user(user_id, |user| user.favorites.iter().rev().cloned().collect()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::contract;

    #[tokio::test]
    async fn history_contract() {
        contract::history_is_recent_and_oldest_first(&MemoryUserStore::default()).await;
    }

    #[tokio::test]
    async fn plans_and_favorites_contract() {
        contract::plans_and_favorites_are_newest_first(&MemoryUserStore::default()).await;
    }

    #[tokio::test]
    async fn update_last_active_does_not_create_users() {
        let store = MemoryUserStore::default();
        store.update_last_active("ghost").await.unwrap();
        assert!(!store.has_user("ghost"));
        store.create_user("u1").await.unwrap();
        assert!(store.has_user("u1"));
    }
}
