use crate::agent::TravelAgent;
use crate::cli::Args;
use crate::engine::TurnEvent;
use crate::models::api::Location;
use crate::models::websocket::{ ClientMessage, ServerMessage };
use crate::session::user_id_for_ip;

use std::error::Error;
use std::fmt::Display;
use std::fs::File;
use std::io::BufReader;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::io::{ AsyncRead, AsyncWrite };

use tokio_tungstenite::{ accept_async, WebSocketStream };
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_rustls::TlsAcceptor;

use rustls::ServerConfig;
use rustls::pki_types::{ CertificateDer, PrivateKeyDer };
use rustls_pemfile::{ certs, pkcs8_private_keys };

use chrono::Utc;
use log::{ info, warn, error };
use futures::{ Sink, SinkExt, StreamExt };
use uuid::Uuid;

const MAX_MESSAGE_SIZE: usize = 1024 * 1024;

fn load_tls_config(
    cert_path: &str,
    key_path: &str
) -> Result<Arc<ServerConfig>, Box<dyn Error + Send + Sync>> {
    let cert_file = File::open(cert_path).map_err(|e|
        format!("Failed to open TLS certificate file '{}': {}", cert_path, e)
    )?;
    let key_file = File::open(key_path).map_err(|e|
        format!("Failed to open TLS key file '{}': {}", key_path, e)
    )?;

    let mut cert_reader = BufReader::new(cert_file);
    let mut key_reader = BufReader::new(key_file);
    let cert_chain: Vec<CertificateDer<'static>> = certs(&mut cert_reader)
        .collect::<Result<_, _>>()
        .map_err(|e| format!("Failed to read certificate(s): {}", e))?;

    let mut keys = pkcs8_private_keys(&mut key_reader);
    let key = match keys.next() {
        Some(Ok(k)) => PrivateKeyDer::Pkcs8(k),
        Some(Err(e)) => {
            return Err(format!("Error reading private key: {}", e).into());
        }
        None => {
            return Err("No PKCS8 private key found in key file".into());
        }
    };

    let config = ServerConfig::builder().with_no_client_auth().with_single_cert(cert_chain, key)?;
    Ok(Arc::new(config))
}

pub async fn start_ws_server(
    addr: &str,
    agent: Arc<TravelAgent>,
    args: &Args
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let listener = TcpListener::bind(addr).await?;

    let tls_acceptor = if args.enable_tls {
        match (&args.tls_cert_path, &args.tls_key_path) {
            (Some(cert_path), Some(key_path)) => {
                info!(
                    "TLS enabled. Loading certificate from '{}' and key from '{}'",
                    cert_path,
                    key_path
                );
                let config = load_tls_config(cert_path, key_path)?;
                Some(TlsAcceptor::from(config))
            }
            (Some(_), None) | (None, Some(_)) => {
                error!("Both --tls-cert-path and --tls-key-path must be provided to enable TLS.");
                return Err("Missing TLS certificate or key path".into());
            }
            (None, None) => {
                error!("--enable-tls was set but no certificate/key paths provided.");
                return Err("TLS enabled without cert/key".into());
            }
        }
    } else {
        None
    };
    let protocol = if tls_acceptor.is_some() { "WSS" } else { "WS" };
    info!("{} server listening on: {}", protocol, addr);

    loop {
        let (stream, peer) = listener.accept().await?;
        info!("Incoming connection from: {}", peer);
        let agent = Arc::clone(&agent);
        let tls_acceptor = tls_acceptor.clone();

        tokio::spawn(async move {
            let process_result = if let Some(acceptor) = tls_acceptor {
                match acceptor.accept(stream).await {
                    Ok(tls_stream) => process_connection(peer, tls_stream, agent).await,
                    Err(e) => {
                        error!("TLS handshake error for {}: {}", peer, e);
                        Err(Box::new(e) as Box<dyn Error + Send + Sync>)
                    }
                }
            } else {
                process_connection(peer, stream, agent).await
            };

            if let Err(e) = process_result {
                error!("Failed to process connection for {}: {}", peer, e);
            }
        });
    }
}

async fn process_connection<S>(
    peer: SocketAddr,
    stream: S,
    agent: Arc<TravelAgent>
) -> Result<(), Box<dyn Error + Send + Sync>>
    where S: AsyncRead + AsyncWrite + Unpin + Send + 'static
{
    match accept_async(stream).await {
        Ok(ws) => {
            handle_connection(peer, ws, agent).await;
            Ok(())
        }
        Err(e) => {
            error!("Handshake failed for {}: {}", peer, e);
            Err(Box::new(e) as _)
        }
    }
}

/// Returns false once the client is gone.
async fn send_frame<T>(tx: &mut T, peer: SocketAddr, frame: &ServerMessage) -> bool
    where T: Sink<Message> + Unpin, T::Error: Display
{
    let json = match serde_json::to_string(frame) {
        Ok(json) => json,
        Err(e) => {
            error!("Failed to encode frame for {}: {}", peer, e);
            return true;
        }
    };
    match tx.send(Message::Text(json)).await {
        Ok(()) => true,
        Err(e) => {
            error!("Error sending to {}: {}", peer, e);
            false
        }
    }
}

/// Relays one chat turn. Dropping the event stream early abandons the turn.
async fn relay_chat<T>(
    tx: &mut T,
    peer: SocketAddr,
    agent: &TravelAgent,
    user_id: &str,
    content: &str,
    location: Option<Location>
) -> bool
    where T: Sink<Message> + Unpin, T::Error: Display
{
    if !send_frame(tx, peer, &ServerMessage::Processing).await {
        return false;
    }

    let mut events = match agent.chat_stream(user_id, content, location).await {
        Ok(events) => events,
        Err(e) => {
            return send_frame(tx, peer, &ServerMessage::Error { message: e.to_string() }).await;
        }
    };

    while let Some(event) = events.next().await {
        let frame = match event {
            TurnEvent::Token(content) => ServerMessage::Token { content },
            TurnEvent::Done => ServerMessage::Done { timestamp: Utc::now().timestamp() },
            TurnEvent::Error(message) => {
                warn!("Turn failed for {}: {}", peer, message);
                ServerMessage::Error { message }
            }
        };
        if !send_frame(tx, peer, &frame).await {
            return false;
        }
    }
    true
}

pub async fn handle_connection<S>(
    peer: SocketAddr,
    websocket: WebSocketStream<S>,
    agent: Arc<TravelAgent>
)
    where S: AsyncRead + AsyncWrite + Unpin
{
    let (mut tx, mut rx) = websocket.split();
    let user_id = user_id_for_ip(&peer.ip());
    let connection_id = Uuid::new_v4().to_string();
    info!("Assigned connection ID {} to {} (user {})", connection_id, peer, user_id);

    while let Some(msg) = rx.next().await {
        let message = match msg {
            Ok(message) => message,
            Err(e) => {
                match e {
                    | tokio_tungstenite::tungstenite::Error::ConnectionClosed
                    | tokio_tungstenite::tungstenite::Error::Protocol(_)
                    | tokio_tungstenite::tungstenite::Error::Utf8 => {
                        info!("WebSocket connection closed or protocol error for {}: {}", peer, e);
                    }
                    tokio_tungstenite::tungstenite::Error::Io(ref io_err) if
                        io_err.kind() == std::io::ErrorKind::ConnectionReset
                    => {
                        info!("WebSocket connection reset by peer {}", peer);
                    }
                    _ => {
                        error!("Error receiving message from {}: {}", peer, e);
                    }
                }
                break;
            }
        };

        if message.len() > MAX_MESSAGE_SIZE {
            warn!(
                "Message from {} exceeds size limit ({} > {})",
                peer,
                message.len(),
                MAX_MESSAGE_SIZE
            );
            let frame = ServerMessage::Error { message: "Message too large".to_string() };
            send_frame(&mut tx, peer, &frame).await;
            let _ = tx.send(Message::Close(None)).await;
            break;
        }

        let open = match message {
            Message::Text(text) =>
                match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(ClientMessage::Chat { content, location }) => {
                        relay_chat(&mut tx, peer, &agent, &user_id, &content, location).await
                    }
                    Ok(ClientMessage::CreatePlan { city, days, interests }) => {
                        let frame = match agent.create_plan(&user_id, &city, days, &interests).await {
                            Ok(plan) => ServerMessage::Plan { plan },
                            Err(e) => {
                                error!("Plan failed for {}: {}", peer, e);
                                ServerMessage::Error { message: e.to_string() }
                            }
                        };
                        send_frame(&mut tx, peer, &frame).await
                    }
                    Ok(ClientMessage::Clear) => {
                        agent.clear_session(&user_id);
                        send_frame(&mut tx, peer, &ServerMessage::Cleared).await
                    }
                    Err(e) => {
                        warn!("Failed to parse message from {}: {}", peer, e);
                        let frame = ServerMessage::Error {
                            message: format!("Failed to parse message: {}", e),
                        };
                        send_frame(&mut tx, peer, &frame).await
                    }
                }
            Message::Close(_) => {
                info!("Received close frame from {}", peer);
                false
            }
            Message::Ping(ping_data) => tx.send(Message::Pong(ping_data)).await.is_ok(),
            Message::Binary(_) => {
                warn!("Ignoring binary message from {}", peer);
                true
            }
            Message::Pong(_) | Message::Frame(_) => true,
        };
        if !open {
            break;
        }
    }
    info!("WebSocket connection closed for {} (connection {})", peer, connection_id);
}
