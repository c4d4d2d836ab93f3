use async_trait::async_trait;
use rusqlite::{ params, Connection, OptionalExtension };
use serde_json::Value as JsonValue;
use std::path::Path;
use std::sync::{ Arc, Mutex };

use super::{ now_timestamp, StoreError, UserStore };
use crate::models::store::{ ChatRecord, Favorite, TravelPlanRecord };

const SCHEMA: &str =
    "PRAGMA foreign_keys = ON;
    CREATE TABLE IF NOT EXISTS users (
        user_id TEXT PRIMARY KEY,
        created_at TEXT,
        last_active TEXT,
        preferences TEXT
    );
    CREATE TABLE IF NOT EXISTS chat_history (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id TEXT,
        timestamp TEXT,
        user_message TEXT,
        bot_message TEXT,
        FOREIGN KEY (user_id) REFERENCES users(user_id)
    );
    CREATE TABLE IF NOT EXISTS travel_plans (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id TEXT,
        created_at TEXT,
        title TEXT,
        city TEXT,
        date_range TEXT,
        plan_data TEXT,
        FOREIGN KEY (user_id) REFERENCES users(user_id)
    );
    CREATE TABLE IF NOT EXISTS favorites (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id TEXT,
        city TEXT,
        category TEXT,
        notes TEXT,
        added_at TEXT,
        FOREIGN KEY (user_id) REFERENCES users(user_id)
    );";

/// Writes for an unknown user register it first so the foreign keys hold.
fn ensure_user(conn: &Connection, user_id: &str, now: &str) -> Result<(), StoreError> {
    conn.execute(
        "INSERT OR IGNORE INTO users (user_id, created_at, last_active, preferences)
         VALUES (?1, ?2, ?2, '{}')",
        params![user_id, now]
    )?;
    Ok(())
}

/// Single connection behind a mutex; every query runs on the blocking pool.
#[derive(Clone)]
pub struct SqliteUserStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteUserStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Self::init(Connection::open(path)?)
    }

    pub fn in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
        where T: Send + 'static, F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static
    {
        let conn = Arc::clone(&self.conn);
        tokio::task
            ::spawn_blocking(move || {
                let guard = conn.lock().unwrap_or_else(|e| e.into_inner());
                f(&guard)
            }).await?
    }
}

#[async_trait]
impl UserStore for SqliteUserStore {
    async fn create_user(&self, user_id: &str) -> Result<(), StoreError> {
        let user_id = user_id.to_string();
        self.with_conn(move |conn| ensure_user(conn, &user_id, &now_timestamp())).await
    }

    async fn update_last_active(&self, user_id: &str) -> Result<(), StoreError> {
        let user_id = user_id.to_string();
        self.with_conn(move |conn| {
            conn.execute(
                "UPDATE users SET last_active = ?1 WHERE user_id = ?2",
                params![now_timestamp(), user_id]
            )?;
            Ok(())
        }).await
    }

    async fn save_chat(
        &self,
        user_id: &str,
        user_message: &str,
        bot_message: &str
    ) -> Result<(), StoreError> {
        let (user_id, user_message, bot_message) = (
            user_id.to_string(),
            user_message.to_string(),
            bot_message.to_string(),
        );
        self.with_conn(move |conn| {
            let now = now_timestamp();
            ensure_user(conn, &user_id, &now)?;
            conn.execute(
                "INSERT INTO chat_history (user_id, timestamp, user_message, bot_message)
                 VALUES (?1, ?2, ?3, ?4)",
                params![user_id, now, user_message, bot_message]
            )?;
            Ok(())
        }).await
    }

    async fn get_chat_history(
        &self,
        user_id: &str,
        limit: usize
    ) -> Result<Vec<ChatRecord>, StoreError> {
        let user_id = user_id.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT timestamp, user_message, bot_message
                 FROM chat_history
                 WHERE user_id = ?1
                 ORDER BY id DESC
                 LIMIT ?2"
            )?;
            let mut records = stmt
                .query_map(params![user_id, limit as i64], |row| {
                    Ok(ChatRecord {
                        timestamp: row.get(0)?,
                        user_message: row.get(1)?,
                        bot_message: row.get(2)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            records.reverse();
            Ok(records)
        }).await
    }

    async fn save_travel_plan(
        &self,
        user_id: &str,
        title: &str,
        city: &str,
        date_range: &str,
        plan_data: &JsonValue
    ) -> Result<i64, StoreError> {
        let plan_json = serde_json::to_string(plan_data)?;
        let (user_id, title, city, date_range) = (
            user_id.to_string(),
            title.to_string(),
            city.to_string(),
            date_range.to_string(),
        );
        self.with_conn(move |conn| {
            let now = now_timestamp();
            ensure_user(conn, &user_id, &now)?;
            conn.execute(
                "INSERT INTO travel_plans (user_id, created_at, title, city, date_range, plan_data)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![user_id, now, title, city, date_range, plan_json]
            )?;
            Ok(conn.last_insert_rowid())
        }).await
    }

    async fn get_travel_plans(&self, user_id: &str) -> Result<Vec<TravelPlanRecord>, StoreError> {
        let user_id = user_id.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, created_at, title, city, date_range, plan_data
                 FROM travel_plans
                 WHERE user_id = ?1
                 ORDER BY created_at DESC, id DESC"
            )?;
            let rows = stmt
                .query_map(params![user_id], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                    ))
                })?
                .collect::<Result<Vec<_>, _>>()?;

            rows.into_iter()
                .map(|(id, created_at, title, city, date_range, plan_data)| -> Result<_, StoreError> {
                    Ok(TravelPlanRecord {
                        id,
                        created_at,
                        title,
                        city,
                        date_range,
                        plan_data: serde_json::from_str(&plan_data)?,
                    })
                })
                .collect()
        }).await
    }

    async fn add_favorite(
        &self,
        user_id: &str,
        city: &str,
        category: &str,
        notes: &str
    ) -> Result<(), StoreError> {
        let (user_id, city, category, notes) = (
            user_id.to_string(),
            city.to_string(),
            category.to_string(),
            notes.to_string(),
        );
        self.with_conn(move |conn| {
            let now = now_timestamp();
            ensure_user(conn, &user_id, &now)?;
            conn.execute(
                "INSERT INTO favorites (user_id, city, category, notes, added_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![user_id, city, category, notes, now]
            )?;
            Ok(())
        }).await
    }

    async fn get_favorites(&self, user_id: &str) -> Result<Vec<Favorite>, StoreError> {
        let user_id = user_id.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT city, category, notes, added_at
                 FROM favorites
                 WHERE user_id = ?1
                 ORDER BY added_at DESC, id DESC"
            )?;
            let favorites = stmt
                .query_map(params![user_id], |row| {
                    Ok(Favorite {
                        city: row.get(0)?,
                        category: row.get(1)?,
                        notes: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                        added_at: row.get(3)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(favorites)
        }).await
    }
}

impl SqliteUserStore {
    /// `None` when the user was never created.
    pub async fn last_active(&self, user_id: &str) -> Result<Option<String>, StoreError> {
        let user_id = user_id.to_string();
        self.with_conn(move |conn| {
            let value = conn
                .query_row(
                    "SELECT last_active FROM users WHERE user_id = ?1",
                    params![user_id],
                    |row| row.get::<_, String>(0)
                )
                .optional()?;
            Ok(value)
        }).await
    }
}
