pub mod agent;
pub mod cache;
pub mod cli;
pub mod config;
pub mod engine;
pub mod intent;
pub mod llm;
pub mod models;
pub mod planner;
pub mod server;
pub mod session;
pub mod store;
pub mod tools;

#[cfg(test)]
mod test_support;

use agent::TravelAgent;
use cli::Args;
use log::info;
use server::Server;
use std::error::Error;
use std::sync::Arc;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Core Configuration ---");
    info!("Server Address: {}", args.server_addr);
    info!("WebSocket Address: {}", args.ws_addr.as_deref().unwrap_or("disabled"));
    info!("TLS Enabled: {}", args.enable_tls);
    info!("Chat LLM Type: {}", args.chat_llm_type);
    info!(
        "Planner LLM Type: {}",
        args.planner_llm_type.as_deref().unwrap_or(args.chat_llm_type.as_str())
    );
    info!("User Store Type: {}", args.store_type);
    match args.store_type.as_str() {
        "sqlite" => info!("SQLite Path: {}", args.sqlite_path),
        "redis" => info!("Redis Prefix: {}", args.redis_prefix),
        _ => {}
    }
    info!("Cache TTL: {}s", args.cache_ttl);
    info!("Hydrate Turns: {}", args.hydrate_turns);
    info!("Summary Window: {}", args.summary_window);
    info!("Prompts Path: {}", args.prompts_path.as_deref().unwrap_or("built-in"));
    info!("-------------------------");

    let agent = Arc::new(TravelAgent::new(&args).await?);
    let server = Server::new(agent, args);
    server.run().await?;

    Ok(())
}
