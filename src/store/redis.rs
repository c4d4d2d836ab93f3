use async_trait::async_trait;
use log::error;
use redis::{ AsyncCommands, Client };
use serde::{ de::DeserializeOwned, Serialize };
use serde_json::Value as JsonValue;

use super::{ now_timestamp, StoreError, UserStore };
use crate::models::store::{ ChatRecord, Favorite, TravelPlanRecord };

/// Key layout under `key_prefix`:
/// `user:<id>` hash, `chat:<id>` / `plans:<id>` / `favorites:<id>` JSON lists
/// appended with RPUSH, and `plan_seq` for plan ids.
pub struct RedisUserStore {
    client: Client,
    key_prefix: String,
}

impl RedisUserStore {
    pub fn new(url: &str, key_prefix: &str) -> Result<Self, StoreError> {
        Ok(Self {
            client: Client::open(url)?,
            key_prefix: key_prefix.to_string(),
        })
    }

    async fn get_connection(&self) -> Result<redis::aio::MultiplexedConnection, redis::RedisError> {
        self.client.get_multiplexed_async_connection().await
    }

    fn key(&self, kind: &str, user_id: &str) -> String {
        format!("{}{}:{}", self.key_prefix, kind, user_id)
    }

    async fn push_json<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let mut conn = self.get_connection().await?;
        let json = serde_json::to_string(value)?;
        let _: i64 = conn.rpush(key, json).await?;
        Ok(())
    }

    /// Entries in `[start, stop]`, skipping any that fail to parse.
    async fn read_json<T: DeserializeOwned>(
        &self,
        key: &str,
        start: isize,
        stop: isize
    ) -> Result<Vec<T>, StoreError> {
        let mut conn = self.get_connection().await?;
        let entries: Vec<String> = conn.lrange(key, start, stop).await?;
        let mut items = Vec::with_capacity(entries.len());
        for entry in &entries {
            match serde_json::from_str::<T>(entry) {
                Ok(item) => items.push(item),
                Err(e) => error!("Error parsing stored entry in {}: {}", key, e),
            }
        }
        Ok(items)
    }
}

#[async_trait]
impl UserStore for RedisUserStore {
    async fn create_user(&self, user_id: &str) -> Result<(), StoreError> {
        let mut conn = self.get_connection().await?;
        let key = self.key("user", user_id);
        let now = now_timestamp();
        let _: bool = conn.hset_nx(&key, "created_at", &now).await?;
        let _: bool = conn.hset_nx(&key, "last_active", &now).await?;
        let _: bool = conn.hset_nx(&key, "preferences", "{}").await?;
        Ok(())
    }

    async fn update_last_active(&self, user_id: &str) -> Result<(), StoreError> {
        let mut conn = self.get_connection().await?;
        let key = self.key("user", user_id);
        let exists: bool = conn.exists(&key).await?;
        if exists {
            let _: i64 = conn.hset(&key, "last_active", now_timestamp()).await?;
        }
        Ok(())
    }

    async fn save_chat(
        &self,
        user_id: &str,
        user_message: &str,
        bot_message: &str
    ) -> Result<(), StoreError> {
        let record = ChatRecord {
            timestamp: now_timestamp(),
            user_message: user_message.to_string(),
            bot_message: bot_message.to_string(),
        };
        self.push_json(&self.key("chat", user_id), &record).await
    }

    async fn get_chat_history(
        &self,
        user_id: &str,
        limit: usize
    ) -> Result<Vec<ChatRecord>, StoreError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        self.read_json(&self.key("chat", user_id), -(limit as isize), -1).await
    }

    async fn save_travel_plan(
        &self,
        user_id: &str,
        title: &str,
        city: &str,
        date_range: &str,
        plan_data: &JsonValue
    ) -> Result<i64, StoreError> {
        let mut conn = self.get_connection().await?;
        let id: i64 = conn.incr(format!("{}plan_seq", self.key_prefix), 1).await?;
        let record = TravelPlanRecord {
            id,
            created_at: now_timestamp(),
            title: title.to_string(),
            city: city.to_string(),
            date_range: date_range.to_string(),
            plan_data: plan_data.clone(),
        };
        self.push_json(&self.key("plans", user_id), &record).await?;
        Ok(id)
    }

    async fn get_travel_plans(&self, user_id: &str) -> Result<Vec<TravelPlanRecord>, StoreError> {
        let mut plans: Vec<TravelPlanRecord> = self.read_json(&self.key("plans", user_id), 0, -1).await?;
        plans.reverse();
        Ok(plans)
    }

    async fn add_favorite(
        &self,
        user_id: &str,
        city: &str,
        category: &str,
        notes: &str
    ) -> Result<(), StoreError> {
        let favorite = Favorite {
            city: city.to_string(),
            category: category.to_string(),
            notes: notes.to_string(),
            added_at: now_timestamp(),
        };
        self.push_json(&self.key("favorites", user_id), &favorite).await
    }

    async fn get_favorites(&self, user_id: &str) -> Result<Vec<Favorite>, StoreError> {
        let mut favorites: Vec<Favorite> = self.read_json(&self.key("favorites", user_id), 0, -1).await?;
        favorites.reverse();
        Ok(favorites)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_namespaced_per_user() {
        let store = RedisUserStore::new("redis://127.0.0.1:6379", "smarttour:").unwrap();
        assert_eq!(store.key("chat", "abc"), "smarttour:chat:abc");
        assert_eq!(store.key("user", "abc"), "smarttour:user:abc");
    }

    #[test]
    fn rejects_malformed_url() {
        assert!(RedisUserStore::new("not a url", "p:").is_err());
    }
}
