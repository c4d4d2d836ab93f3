use serde::{ Serialize, Deserialize };
use serde_json::Value as JsonValue;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatRecord {
    pub timestamp: String,
    pub user_message: String,
    pub bot_message: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TravelPlanRecord {
    pub id: i64,
    pub created_at: String,
    pub title: String,
    pub city: String,
    pub date_range: String,
    pub plan_data: JsonValue,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Favorite {
    pub city: String,
    pub category: String,
    pub notes: String,
    pub added_at: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UserStats {
    pub total_messages: usize,
    pub total_plans: usize,
    pub total_favorites: usize,
    pub recent_cities: Vec<String>,
}
