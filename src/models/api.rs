use serde::{ Serialize, Deserialize };

use super::store::{ ChatRecord, Favorite, TravelPlanRecord, UserStats };

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub location: Option<Location>,
}

#[derive(Debug, Deserialize)]
pub struct CreatePlanRequest {
    #[serde(default = "default_city")]
    pub city: String,
    #[serde(default = "default_days")]
    pub days: u32,
    #[serde(default)]
    pub interests: Vec<String>,
}

fn default_city() -> String {
    "Paris".to_string()
}

fn default_days() -> u32 {
    3
}

#[derive(Debug, Deserialize)]
pub struct FavoriteRequest {
    #[serde(default)]
    pub city: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default)]
    pub notes: String,
}

fn default_category() -> String {
    "destination".to_string()
}

#[derive(Debug, Serialize)]
pub struct UserOverview {
    pub success: bool,
    pub history: Vec<ChatRecord>,
    pub plans: Vec<TravelPlanRecord>,
    pub favorites: Vec<Favorite>,
    pub stats: UserStats,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}
