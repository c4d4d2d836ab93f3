use crate::agent::{ AgentError, TravelAgent };
use crate::cli::Args;
use crate::models::api::{ ChatRequest, CreatePlanRequest, ErrorBody, FavoriteRequest };
use crate::session::user_id_for_ip;

use std::convert::Infallible;
use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    routing::{ get, post },
    Router,
    Json,
    extract::{ ConnectInfo, State },
    response::{ IntoResponse, Response },
    response::sse::{ Event, KeepAlive, Sse },
    http::StatusCode,
};
use futures::StreamExt;
use serde_json::json;
use tower_http::cors::{ Any, CorsLayer };
use log::{ info, error };

type AppState = Arc<TravelAgent>;

pub fn router(agent: Arc<TravelAgent>) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/chat", post(chat_handler))
        .route("/create_plan", post(create_plan_handler))
        .route("/user/history", get(user_history_handler))
        .route("/user/favorite", post(add_favorite_handler))
        .route("/session/clear", post(clear_session_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .with_state(agent)
}

/// Serves until the listener fails.
pub async fn start_http_server(
    addr: &str,
    agent: Arc<TravelAgent>,
    args: &Args
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let addr = addr.parse::<SocketAddr>()?;
    let app = router(agent);

    match (args.enable_tls, &args.tls_cert_path, &args.tls_key_path) {
        (true, Some(cert_path), Some(key_path)) => {
            let tls_config = axum_server::tls_rustls::RustlsConfig
                ::from_pem_file(cert_path, key_path).await?;
            info!("Starting HTTPS API server on: https://{}", addr);
            axum_server
                ::bind_rustls(addr, tls_config)
                .serve(app.into_make_service_with_connect_info::<SocketAddr>()).await?;
        }
        _ => {
            let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
                error!("Failed to bind HTTP server to {}: {}. Try a different port.", addr, e);
                e
            })?;
            info!("Starting HTTP API server on: http://{}", addr);
            axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
        }
    }
    Ok(())
}

fn error_response(err: AgentError) -> Response {
    let status = if err.is_client_error() {
        StatusCode::BAD_REQUEST
    } else {
        error!("Request failed: {}", err);
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, Json(ErrorBody { error: err.to_string() })).into_response()
}

async fn chat_handler(
    State(agent): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Json(req): Json<ChatRequest>
) -> Response {
    let user_id = user_id_for_ip(&peer.ip());
    match agent.chat_stream(&user_id, &req.message, req.location).await {
        Ok(events) => {
            let frames = events.map(|event| {
                Ok::<_, Infallible>(Event::default().data(event.payload().to_string()))
            });
            Sse::new(frames)
                .keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
                .into_response()
        }
        Err(e) => error_response(e),
    }
}

async fn create_plan_handler(
    State(agent): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Json(req): Json<CreatePlanRequest>
) -> Response {
    let user_id = user_id_for_ip(&peer.ip());
    match agent.create_plan(&user_id, &req.city, req.days, &req.interests).await {
        Ok(plan) => Json(plan).into_response(),
        Err(e) => error_response(e),
    }
}

async fn user_history_handler(
    State(agent): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>
) -> Response {
    match agent.user_overview(&user_id_for_ip(&peer.ip())).await {
        Ok(overview) => Json(overview).into_response(),
        Err(e) => error_response(e),
    }
}

async fn add_favorite_handler(
    State(agent): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Json(req): Json<FavoriteRequest>
) -> Response {
    let user_id = user_id_for_ip(&peer.ip());
    match agent.add_favorite(&user_id, &req.city, &req.category, &req.notes).await {
        Ok(()) => Json(json!({ "success": true })).into_response(),
        Err(e) => error_response(e),
    }
}

async fn clear_session_handler(
    State(agent): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>
) -> Response {
    let cleared = agent.clear_session(&user_id_for_ip(&peer.ip()));
    Json(json!({ "success": true, "cleared": cleared })).into_response()
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({ "status": "healthy", "service": "SmartTour Assistant" }))
}
