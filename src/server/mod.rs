pub mod api;
pub mod websocket;

use crate::agent::TravelAgent;
use crate::cli::Args;
use log::{ info, warn };
use std::error::Error;
use std::sync::Arc;

pub struct Server {
    agent: Arc<TravelAgent>,
    args: Args,
}

impl Server {
    pub fn new(agent: Arc<TravelAgent>, args: Args) -> Self {
        Self { agent, args }
    }

    /// Runs the HTTP API, plus the WebSocket transport when `ws_addr` is set,
    /// until either fails or ctrl-c arrives.
    pub async fn run(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        let http = api::start_http_server(&self.args.server_addr, self.agent.clone(), &self.args);
        let ws = async {
            match &self.args.ws_addr {
                Some(addr) => websocket::start_ws_server(addr, self.agent.clone(), &self.args).await,
                None => std::future::pending().await,
            }
        };

        let result = tokio::select! {
            res = http => res,
            res = ws => res,
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                Ok(())
            }
        };

        if let Err(e) = &result {
            warn!("Server stopped with error: {}", e);
        }
        self.agent.shutdown();
        result
    }
}
