use log::{ info, warn };
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_stream::wrappers::ReceiverStream;

use crate::cache::{ self, CachedValue, ResponseCache };
use crate::cli::Args;
use crate::config::prompt::{ self, PromptConfig };
use crate::engine::{ ConversationEngine, TurnEvent };
use crate::llm::chat::{ new_client as new_chat_client, ChatClient };
use crate::llm::{ LlmConfig, LlmError };
use crate::models::api::{ Location, UserOverview };
use crate::models::plan::Plan;
use crate::models::store::UserStats;
use crate::planner::PlanOrchestrator;
use crate::session::SessionRegistry;
use crate::store::{ create_store, StoreError, UserStore };
use crate::tools::geocode::{ NominatimGeocoder, ReverseGeocoder, FALLBACK_PLACE };
use crate::tools::{ DataAdapters, HttpDataAdapters };

const OVERVIEW_HISTORY_LIMIT: usize = 20;
const STATS_HISTORY_LIMIT: usize = 100;
const RECENT_PLAN_CITIES: usize = 5;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("{0}")]
    InvalidInput(String),
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AgentError {
    pub fn is_client_error(&self) -> bool {
        matches!(self, AgentError::InvalidInput(_))
    }
}

/// Everything both transports need, built once at startup.
pub struct TravelAgent {
    engine: ConversationEngine,
    sessions: SessionRegistry,
    cache: ResponseCache,
    planner: PlanOrchestrator,
    geocoder: Arc<dyn ReverseGeocoder>,
    store: Arc<dyn UserStore>,
}

fn llm_config(
    llm_type: &str,
    base_url: Option<String>,
    api_key: &str,
    model: Option<String>,
    temperature: f32
) -> Result<LlmConfig, Box<dyn Error + Send + Sync>> {
    Ok(LlmConfig {
        llm_type: llm_type.parse()?,
        base_url,
        api_key: Some(api_key.to_string()).filter(|k| !k.is_empty()),
        completion_model: model,
        temperature,
    })
}

impl TravelAgent {
    fn initialize_llm_clients(
        args: &Args
    ) -> Result<(Arc<dyn ChatClient>, Arc<dyn ChatClient>), Box<dyn Error + Send + Sync>> {
        let chat_config = llm_config(
            &args.chat_llm_type,
            args.chat_base_url.clone(),
            &args.chat_api_key,
            args.chat_model.clone(),
            args.temperature
        )?;
        let chat_client = new_chat_client(&chat_config)?;
        info!(
            "Chat client configured: Type={}, Model={}, BaseURL={}, Streaming={}",
            chat_config.llm_type,
            chat_client.get_model(),
            chat_config.base_url.as_deref().unwrap_or("adapter default"),
            if chat_client.supports_native_streaming() { "native" } else { "single fragment" }
        );

        let planner_type = match &args.planner_llm_type {
            Some(s) if !s.trim().is_empty() => s.as_str(),
            _ => args.chat_llm_type.as_str(),
        };
        let planner_config = llm_config(
            planner_type,
            args.planner_base_url.clone().or_else(|| args.chat_base_url.clone()),
            args.planner_api_key.as_deref().unwrap_or(&args.chat_api_key),
            args.planner_model.clone().or_else(|| args.chat_model.clone()),
            args.temperature
        )?;
        let planner_client = new_chat_client(&planner_config)?;
        info!(
            "Planner client configured: Type={}, Model={}",
            planner_config.llm_type,
            planner_client.get_model()
        );

        Ok((chat_client, planner_client))
    }

    pub async fn new(args: &Args) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let (chat_client, planner_client) = Self::initialize_llm_clients(args)?;
        let prompts = prompt::load_prompts(args.prompts_path.as_deref())?;
        let store = create_store(args).await?;
        let adapters: Arc<dyn DataAdapters> = Arc::new(HttpDataAdapters::from_args(args)?);
        let geocoder: Arc<dyn ReverseGeocoder> = Arc::new(
            NominatimGeocoder::new(
                args.geocoder_base_url.clone(),
                args.geocoder_user_agent.clone(),
                Duration::from_secs(args.geocoder_timeout_secs)
            )?
        );

        Ok(
            Self::with_parts(
                chat_client,
                planner_client,
                adapters,
                geocoder,
                store,
                prompts,
                AgentSettings {
                    cache_ttl: Duration::from_secs(args.cache_ttl),
                    hydrate_turns: args.hydrate_turns,
                    summary_window: args.summary_window,
                }
            )
        )
    }

    pub fn with_parts(
        chat_client: Arc<dyn ChatClient>,
        planner_client: Arc<dyn ChatClient>,
        adapters: Arc<dyn DataAdapters>,
        geocoder: Arc<dyn ReverseGeocoder>,
        store: Arc<dyn UserStore>,
        prompts: Arc<PromptConfig>,
        settings: AgentSettings
    ) -> Self {
        Self {
            engine: ConversationEngine::new(
                chat_client,
                adapters,
                Arc::clone(&prompts),
                Arc::clone(&store),
                settings.summary_window
            ),
            sessions: SessionRegistry::new(Arc::clone(&store), settings.hydrate_turns),
            cache: ResponseCache::new(settings.cache_ttl),
            planner: PlanOrchestrator::new(planner_client, prompts),
            geocoder,
            store,
        }
    }

    /// Place name for a coordinate. Only successful lookups are cached.
    pub async fn resolve_place(&self, location: Location) -> String {
        let key = cache::geo_key(location.lat, location.lon);
        if let Some(CachedValue::Place(place)) = self.cache.get(&key) {
            return place;
        }
        match self.geocoder.reverse(location.lat, location.lon).await {
            Ok(place) => {
                self.cache.set(key, CachedValue::Place(place.clone()));
                place
            }
            Err(e) => {
                warn!("Reverse geocoding {:?} failed: {}", location, e);
                FALLBACK_PLACE.to_string()
            }
        }
    }

    /// Prefixes the current place for "near me" style questions.
    async fn localize(&self, message: &str, location: Option<Location>) -> String {
        let Some(location) = location else {
            return message.to_string();
        };
        let lowered = message.to_lowercase();
        if !lowered.contains("around me") && !lowered.contains("near me") {
            return message.to_string();
        }
        let place = self.resolve_place(location).await;
        format!("I'm currently in {}. {}", place, message)
    }

    pub async fn chat_stream(
        &self,
        user_id: &str,
        message: &str,
        location: Option<Location>
    ) -> Result<ReceiverStream<TurnEvent>, AgentError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(AgentError::InvalidInput("Message cannot be empty".to_string()));
        }
        let input = self.localize(message, location).await;
        let session = self.sessions.get_or_create(user_id).await;
        Ok(self.engine.stream_turn(session, input))
    }

    pub async fn create_plan(
        &self,
        user_id: &str,
        city: &str,
        days: u32,
        interests: &[String]
    ) -> Result<Plan, AgentError> {
        if days == 0 {
            return Err(AgentError::InvalidInput("days must be at least 1".to_string()));
        }
        let key = cache::plan_key(city, days, interests);
        if let Some(CachedValue::Plan(plan)) = self.cache.get(&key) {
            info!("Plan cache hit: {}", key);
            return Ok(plan);
        }

        let plan = self.planner.create_plan(city, days, interests).await?;
        self.cache.set(key, CachedValue::Plan(plan.clone()));

        match serde_json::to_value(&plan) {
            Ok(plan_data) => {
                let title = format!("{} - {} Days", city, days);
                let date_range = format!("{} days", days);
                if
                    let Err(e) = self.store.save_travel_plan(
                        user_id,
                        &title,
                        city,
                        &date_range,
                        &plan_data
                    ).await
                {
                    warn!("Failed to save plan for {}: {}", user_id, e);
                }
            }
            Err(e) => warn!("Failed to serialize plan for {}: {}", user_id, e),
        }
        Ok(plan)
    }

    pub async fn user_overview(&self, user_id: &str) -> Result<UserOverview, AgentError> {
        let history = self.store.get_chat_history(user_id, OVERVIEW_HISTORY_LIMIT).await?;
        let plans = self.store.get_travel_plans(user_id).await?;
        let favorites = self.store.get_favorites(user_id).await?;
        let total_messages = self.store.get_chat_history(user_id, STATS_HISTORY_LIMIT).await?.len();

        let mut recent_cities: Vec<String> = Vec::new();
        for plan in plans.iter().take(RECENT_PLAN_CITIES) {
            if !recent_cities.contains(&plan.city) {
                recent_cities.push(plan.city.clone());
            }
        }

        let stats = UserStats {
            total_messages,
            total_plans: plans.len(),
            total_favorites: favorites.len(),
            recent_cities,
        };
        Ok(UserOverview { success: true, history, plans, favorites, stats })
    }

    pub async fn add_favorite(
        &self,
        user_id: &str,
        city: &str,
        category: &str,
        notes: &str
    ) -> Result<(), AgentError> {
        if city.trim().is_empty() {
            return Err(AgentError::InvalidInput("city cannot be empty".to_string()));
        }
        self.store.add_favorite(user_id, city, category, notes).await?;
        Ok(())
    }

    /// Drops the in-memory conversation; durable history stays.
    pub fn clear_session(&self, user_id: &str) -> bool {
        self.sessions.clear(user_id)
    }

    pub fn shutdown(&self) {
        info!("Dropping {} sessions and {} cache entries", self.sessions.len(), self.cache.len());
        self.sessions.clear_all();
        self.cache.clear();
    }
}

pub struct AgentSettings {
    pub cache_ttl: Duration,
    pub hydrate_turns: usize,
    pub summary_window: usize,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(cache::DEFAULT_TTL_SECS),
            hydrate_turns: crate::session::DEFAULT_HYDRATE_TURNS,
            summary_window: crate::engine::DEFAULT_SUMMARY_WINDOW,
        }
    }
}
