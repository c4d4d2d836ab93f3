mod memory;
mod redis;
mod sqlite;

pub use self::memory::MemoryUserStore;
pub use self::redis::RedisUserStore;
pub use self::sqlite::SqliteUserStore;

use async_trait::async_trait;
use log::info;
use serde_json::Value as JsonValue;
use std::error::Error;
use std::sync::Arc;
use thiserror::Error;

use crate::cli::Args;
use crate::models::store::{ ChatRecord, Favorite, TravelPlanRecord };

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("redis error: {0}")]
    Redis(#[from] ::redis::RedisError),
    #[error("invalid stored json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("store task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
    #[error("store io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Durable per-user records: chat turns, saved plans and favorites.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Idempotent; an existing user is left untouched.
    async fn create_user(&self, user_id: &str) -> Result<(), StoreError>;

    async fn update_last_active(&self, user_id: &str) -> Result<(), StoreError>;

    async fn save_chat(
        &self,
        user_id: &str,
        user_message: &str,
        bot_message: &str
    ) -> Result<(), StoreError>;

    /// The most recent `limit` turns, oldest first.
    async fn get_chat_history(
        &self,
        user_id: &str,
        limit: usize
    ) -> Result<Vec<ChatRecord>, StoreError>;

    /// Returns the id of the new plan.
    async fn save_travel_plan(
        &self,
        user_id: &str,
        title: &str,
        city: &str,
        date_range: &str,
        plan_data: &JsonValue
    ) -> Result<i64, StoreError>;

    /// Newest first.
    async fn get_travel_plans(&self, user_id: &str) -> Result<Vec<TravelPlanRecord>, StoreError>;

    async fn add_favorite(
        &self,
        user_id: &str,
        city: &str,
        category: &str,
        notes: &str
    ) -> Result<(), StoreError>;

    /// Newest first.
    async fn get_favorites(&self, user_id: &str) -> Result<Vec<Favorite>, StoreError>;
}

pub(crate) fn now_timestamp() -> String {
    chrono::Local::now().naive_local().format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}

pub async fn create_store(args: &Args) -> Result<Arc<dyn UserStore>, Box<dyn Error + Send + Sync>> {
    match args.store_type.to_lowercase().as_str() {
        "sqlite" => {
            info!("User data will be stored in SQLite at {}", args.sqlite_path);
            Ok(Arc::new(SqliteUserStore::open(&args.sqlite_path)?))
        }
        "redis" => {
            info!("User data will be stored in Redis with prefix '{}'", args.redis_prefix);
            Ok(Arc::new(RedisUserStore::new(&args.redis_url, &args.redis_prefix)?))
        }
        "memory" => {
            info!("User data will be kept in memory only");
            Ok(Arc::new(MemoryUserStore::default()))
        }
        _ =>
            Err(
                Box::new(
                    std::io::Error::new(
                        std::io::ErrorKind::InvalidInput,
                        format!("Unsupported store type: {}", args.store_type)
                    )
                )
            ),
    }
}

#[cfg(test)]
pub(crate) mod contract {
    //! Behaviour every backend must share.

    use super::*;
    use serde_json::json;

    pub async fn history_is_recent_and_oldest_first(store: &dyn UserStore) {
        store.create_user("u1").await.unwrap();
        store.create_user("u1").await.unwrap();
        for i in 0..4 {
            store.save_chat("u1", &format!("q{}", i), &format!("a{}", i)).await.unwrap();
        }
        store.save_chat("u2", "other", "user").await.unwrap();

        let history = store.get_chat_history("u1", 3).await.unwrap();
        let asked: Vec<_> = history
            .iter()
            .map(|r| r.user_message.as_str())
            .collect();
        assert_eq!(asked, vec!["q1", "q2", "q3"]);
        assert_eq!(history[2].bot_message, "a3");

        assert!(store.get_chat_history("nobody", 5).await.unwrap().is_empty());
    }

    pub async fn plans_and_favorites_are_newest_first(store: &dyn UserStore) {
        store.create_user("u1").await.unwrap();
        let first = store
            .save_travel_plan("u1", "Rome - 3 Days", "Rome", "3 days", &json!({"city": "Rome"})).await
            .unwrap();
        let second = store
            .save_travel_plan("u1", "Oslo - 2 Days", "Oslo", "2 days", &json!({"city": "Oslo"})).await
            .unwrap();
        assert!(second > first);

        let plans = store.get_travel_plans("u1").await.unwrap();
        assert_eq!(plans.len(), 2);
        assert_eq!(plans[0].city, "Oslo");
        assert_eq!(plans[0].id, second);
        assert_eq!(plans[1].plan_data, json!({"city": "Rome"}));

        store.add_favorite("u1", "Lisbon", "destination", "").await.unwrap();
        store.add_favorite("u1", "Porto", "food", "francesinha").await.unwrap();
        let favorites = store.get_favorites("u1").await.unwrap();
        assert_eq!(favorites[0].city, "Porto");
        assert_eq!(favorites[0].notes, "francesinha");
        assert_eq!(favorites[1].category, "destination");
        assert!(store.get_favorites("u2").await.unwrap().is_empty());
    }
}
