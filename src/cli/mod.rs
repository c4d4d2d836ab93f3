use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- Server Args ---
    /// Host address and port for the HTTP API (chat SSE, plans, user data).
    #[arg(long, env = "SERVER_ADDR", default_value = "0.0.0.0:5000")]
    pub server_addr: String,

    /// Optional address for the WebSocket server. Disabled when unset.
    #[arg(long, env = "WS_ADDR")]
    pub ws_addr: Option<String>,

    /// Optional path to the TLS certificate file (PEM format). Requires --tls-key-path.
    #[arg(long, env = "TLS_CERT_PATH")]
    pub tls_cert_path: Option<String>,

    /// Optional path to the TLS private key file (PEM format). Requires --tls-cert-path.
    #[arg(long, env = "TLS_KEY_PATH")]
    pub tls_key_path: Option<String>,

    #[arg(long, env = "ENABLE_TLS", default_value = "false")]
    pub enable_tls: bool,

    // --- Chat LLM Provider Args ---
    /// Type of LLM provider for chat (ollama, openai, anthropic, gemini, deepseek, groq, xai)
    #[arg(long, env = "CHAT_LLM_TYPE", default_value = "ollama")]
    pub chat_llm_type: String,

    /// Base URL for the chat LLM provider API (e.g., http://localhost:11434 for Ollama)
    #[arg(long, env = "CHAT_BASE_URL")]
    pub chat_base_url: Option<String>,

    /// API key for the chat LLM provider
    #[arg(long, env = "CHAT_API_KEY", default_value = "")]
    pub chat_api_key: String,

    /// Model name for chat (defaults to llama3.2:3b on Ollama)
    #[arg(long, env = "CHAT_MODEL")]
    pub chat_model: Option<String>,

    /// Sampling temperature for every model call.
    #[arg(long, env = "LLM_TEMPERATURE", default_value = "0.7")]
    pub temperature: f32,

    // --- Planner LLM Provider Args (Optional) ---
    /// Type of LLM provider for travel plans. Defaults to CHAT_LLM_TYPE if not set.
    #[arg(long, env = "PLANNER_LLM_TYPE")]
    pub planner_llm_type: Option<String>,

    /// Base URL for the planner LLM provider. Defaults to CHAT_BASE_URL if not set.
    #[arg(long, env = "PLANNER_BASE_URL")]
    pub planner_base_url: Option<String>,

    /// API key for the planner LLM provider. Defaults to CHAT_API_KEY if not set.
    #[arg(long, env = "PLANNER_API_KEY")]
    pub planner_api_key: Option<String>,

    /// Model name for travel plans. Defaults to CHAT_MODEL if not set.
    #[arg(long, env = "PLANNER_MODEL")]
    pub planner_model: Option<String>,

    // --- External Data Args ---
    #[arg(long, env = "OPENWEATHER_API_KEY", default_value = "")]
    pub openweather_api_key: String,

    #[arg(long, env = "WEATHER_BASE_URL")]
    pub weather_base_url: Option<String>,

    #[arg(long, env = "WEATHER_TIMEOUT_SECS", default_value = "5")]
    pub weather_timeout_secs: u64,

    #[arg(long, env = "AVIATIONSTACK_API_KEY", default_value = "")]
    pub aviationstack_api_key: String,

    #[arg(long, env = "FLIGHT_BASE_URL")]
    pub flight_base_url: Option<String>,

    #[arg(long, env = "FLIGHT_TIMEOUT_SECS", default_value = "10")]
    pub flight_timeout_secs: u64,

    #[arg(long, env = "CURRENCYAPI_KEY", default_value = "")]
    pub currencyapi_key: String,

    #[arg(long, env = "CURRENCY_BASE_URL")]
    pub currency_base_url: Option<String>,

    #[arg(long, env = "CURRENCY_TIMEOUT_SECS", default_value = "5")]
    pub currency_timeout_secs: u64,

    /// Reverse geocoder endpoint (Nominatim compatible).
    #[arg(long, env = "GEOCODER_BASE_URL")]
    pub geocoder_base_url: Option<String>,

    /// User-Agent sent to the reverse geocoder.
    #[arg(long, env = "GEOCODER_USER_AGENT")]
    pub geocoder_user_agent: Option<String>,

    #[arg(long, env = "GEOCODER_TIMEOUT_SECS", default_value = "5")]
    pub geocoder_timeout_secs: u64,

    // --- State Args ---
    /// Time-to-live in seconds for cached plans and place names.
    #[arg(long, env = "CACHE_TTL", default_value = "1800")]
    pub cache_ttl: u64,

    /// Durable user store (sqlite, redis, memory)
    #[arg(long, env = "STORE_TYPE", default_value = "sqlite")]
    pub store_type: String,

    #[arg(long, env = "SQLITE_PATH", default_value = "data/users.db")]
    pub sqlite_path: String,

    #[arg(long, env = "REDIS_URL", default_value = "redis://127.0.0.1:6379")]
    pub redis_url: String,

    /// Prefix for Redis store keys.
    #[arg(long, env = "REDIS_PREFIX", default_value = "smarttour:")]
    pub redis_prefix: String,

    /// Number of past turns loaded into a new session.
    #[arg(long, env = "HYDRATE_TURNS", default_value = "5")]
    pub hydrate_turns: usize,

    /// Number of recent messages used to recompute the interest summary.
    #[arg(long, env = "SUMMARY_WINDOW", default_value = "6")]
    pub summary_window: usize,

    /// Optional JSON file overriding prompt templates.
    #[arg(long, env = "PROMPTS_PATH")]
    pub prompts_path: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_deployment() {
        let args = Args::parse_from(["smart-tour"]);
        assert_eq!(args.server_addr, "0.0.0.0:5000");
        assert_eq!(args.chat_llm_type, "ollama");
        assert_eq!(args.cache_ttl, 1800);
        assert_eq!(args.store_type, "sqlite");
        assert_eq!(args.sqlite_path, "data/users.db");
        assert_eq!(args.hydrate_turns, 5);
        assert_eq!(args.summary_window, 6);
        assert_eq!(args.flight_timeout_secs, 10);
        assert!(args.ws_addr.is_none());
    }

    #[test]
    fn flags_override_defaults() {
        let args = Args::parse_from([
            "smart-tour",
            "--store-type",
            "memory",
            "--planner-llm-type",
            "openai",
            "--cache-ttl",
            "60",
        ]);
        assert_eq!(args.store_type, "memory");
        assert_eq!(args.planner_llm_type.as_deref(), Some("openai"));
        assert_eq!(args.cache_ttl, 60);
    }
}
