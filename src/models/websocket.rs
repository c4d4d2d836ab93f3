use serde::{ Serialize, Deserialize };

use super::api::Location;
use super::plan::Plan;

#[derive(Serialize, Deserialize, Debug)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "chat")] Chat {
        content: String,
        #[serde(default)]
        location: Option<Location>,
    },
    #[serde(rename = "create_plan")] CreatePlan {
        city: String,
        #[serde(default = "default_days")]
        days: u32,
        #[serde(default)]
        interests: Vec<String>,
    },
    #[serde(rename = "clear")]
    Clear,
}

fn default_days() -> u32 {
    3
}

#[derive(Serialize, Debug)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "processing")]
    Processing,
    #[serde(rename = "token")] Token {
        content: String,
    },
    #[serde(rename = "done")] Done {
        timestamp: i64,
    },
    #[serde(rename = "plan")] Plan {
        plan: Plan,
    },
    #[serde(rename = "cleared")]
    Cleared,
    #[serde(rename = "error")] Error {
        message: String,
    },
}
