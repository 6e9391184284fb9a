//! WebSocket transport
//!
//! This file implements the WebSocket server that feeds the broker.
//! Responsibilities:
//! - Accept TCP/WebSocket connections, requiring a session cookie on the
//!   upgrade request (HTTP 401 without one)
//! - Resolve the session once at connect time and refuse unknown ones with a
//!   policy-violation close frame
//! - Create a `Client` for each accepted connection and register it in the
//!   `ClientDirectory`
//! - Translate `subscribe` / `unsubscribe` frames and disconnects into broker
//!   events, and `publish` frames into broadcasts when enabled
//!
//! Registry failures are logged here and otherwise dropped; a connection
//! never learns that its subscribe did not stick.

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::spawn;
use tokio::sync::mpsc;
use tokio_tungstenite::{WebSocketStream, accept_hdr_async};
use tracing::{debug, error, info, warn};
use tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tungstenite::http::StatusCode;
use tungstenite::http::header::COOKIE;
use tungstenite::protocol::frame::Utf8Bytes;
use tungstenite::protocol::frame::coding::CloseCode;
use tungstenite::protocol::{CloseFrame, Message as WsMessage};

use crate::broker::{Broker, ConnectionEvent, EventOutcome};
use crate::client::{Client, ClientDirectory, ConnectionState};
use crate::config::Settings;
use crate::persistence::RegistryStore;
use crate::session::{SessionStore, cookie};
use crate::transport::message::ClientMessage;
use crate::utils::error::ServerError;

/// Everything a connection task needs.
pub struct ServerContext {
    pub broker: Arc<Broker>,
    pub directory: Arc<ClientDirectory>,
    pub sessions: Arc<dyn SessionStore>,
    pub settings: Settings,
}

impl ServerContext {
    pub fn new(
        settings: Settings,
        store: Arc<dyn RegistryStore>,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        let directory = Arc::new(ClientDirectory::new());
        let broker = Arc::new(Broker::new(store, directory.clone(), sessions.clone()));
        Self {
            broker,
            directory,
            sessions,
            settings,
        }
    }
}

pub async fn start_websocket_server(
    addr: String,
    ctx: Arc<ServerContext>,
) -> Result<(), ServerError> {
    let listener = TcpListener::bind(&addr).await?;
    info!("WebSocket server listening on ws://{addr}");
    serve(listener, ctx).await;
    Ok(())
}

/// Accept connections on `listener` forever.
pub async fn serve(listener: TcpListener, ctx: Arc<ServerContext>) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                let ctx = ctx.clone();
                spawn(async move { handle_connection(stream, peer, ctx).await });
            }
            Err(e) => warn!("Failed to accept connection: {e}"),
        }
    }
}

fn reject(status: StatusCode, reason: &str) -> ErrorResponse {
    let mut response = ErrorResponse::new(Some(reason.to_string()));
    *response.status_mut() = status;
    response
}

async fn refuse(mut ws_stream: WebSocketStream<TcpStream>, reason: &'static str) {
    let frame = CloseFrame {
        code: CloseCode::Policy,
        reason: Utf8Bytes::from_static(reason),
    };
    if let Err(e) = ws_stream.close(Some(frame)).await {
        debug!("Failed to close refused connection: {e}");
    }
}

async fn handle_connection(stream: TcpStream, peer: SocketAddr, ctx: Arc<ServerContext>) {
    let cookie_name = ctx.settings.session.cookie_name.clone();
    let mut session_id = None;

    let callback = |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
        let found = request
            .headers()
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .find_map(|header| cookie::session_id(header, &cookie_name));
        match found {
            Some(sid) => {
                session_id = Some(sid);
                Ok(response)
            }
            None => Err(reject(StatusCode::UNAUTHORIZED, "missing session cookie")),
        }
    };

    let handshake = accept_hdr_async(stream, callback).await;
    let ws_stream = match handshake {
        Ok(ws) => ws,
        Err(e) => {
            warn!("WebSocket handshake with {peer} failed: {e}");
            return;
        }
    };
    let Some(session_id) = session_id else {
        return;
    };

    match ctx.sessions.load(&session_id).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            warn!("Refusing {peer}: unknown session");
            refuse(ws_stream, "unknown session").await;
            return;
        }
        Err(e) => {
            error!("Refusing {peer}: {e}");
            refuse(ws_stream, "session store unavailable").await;
            return;
        }
    }

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<WsMessage>();
    let client = Arc::new(Client::new(session_id, tx));
    let client_id = client.id.clone();
    ctx.directory.register(client.clone());
    info!("{client_id} connected from {peer}");

    {
        let client_id = client_id.clone();
        spawn(async move {
            while let Some(msg) = rx.recv().await {
                let closing = msg.is_close();
                if let Err(e) = ws_sender.send(msg).await {
                    warn!("Failed to send message to {client_id}: {e}");
                    break;
                }
                if closing {
                    break;
                }
            }
            debug!("Send loop closed for {client_id}");
        });
    }

    loop {
        // a terminated client is dropped without waiting for its close reply
        let frame = tokio::select! {
            frame = ws_receiver.next() => frame,
            _ = client.terminated() => {
                debug!("{client_id} terminated; closing without waiting for the peer");
                break;
            }
        };
        let Some(frame) = frame else {
            break;
        };
        let msg = match frame {
            Ok(msg) => msg,
            Err(e) => {
                debug!("Read from {client_id} failed: {e}");
                break;
            }
        };
        if client.state().is_terminated() || msg.is_close() {
            break;
        }
        if !msg.is_text() {
            continue;
        }
        let Ok(text) = msg.to_text() else {
            continue;
        };

        match serde_json::from_str::<ClientMessage>(text) {
            Ok(ClientMessage::Publish { topics, data }) => {
                if ctx.settings.server.allow_client_publish {
                    let report = ctx.broker.publish(&topics, &data).await;
                    info!("{client_id} published to {topics:?}: {report:?}");
                } else {
                    warn!("{client_id} tried to publish but client publishing is disabled");
                }
            }
            Ok(message) => match message.into_event() {
                Some(event) => apply_event(&ctx.broker, &client, event).await,
                None => warn!("{client_id} sent an empty topic"),
            },
            Err(err) => {
                warn!(
                    "Invalid client message from {client_id}: {err} | {}",
                    &text.chars().take(100).collect::<String>()
                );
            }
        }
    }

    info!("{client_id} disconnected");
    ctx.directory.remove(&client_id);
    client.transition(ConnectionState::terminate);
    apply_event(&ctx.broker, &client, ConnectionEvent::Disconnect).await;
}

/// Run `event` through the broker and track its effect on the client's
/// lifecycle state.
async fn apply_event(broker: &Broker, client: &Client, event: ConnectionEvent) {
    let description = format!("{event:?}");
    match broker.handle_event(&client.id, event).await {
        Ok(EventOutcome::Subscribed(count)) => {
            let state = client.transition(|s| s.subscribed(count));
            debug!("{} {description}: {state:?}", client.id);
        }
        Ok(EventOutcome::Unsubscribed(outcome)) => {
            let state = client.transition(|s| s.unsubscribed(outcome));
            debug!("{} {description}: {state:?}", client.id);
        }
        Ok(EventOutcome::Purged(topics)) => {
            debug!("{} purged from {} topic(s)", client.id, topics.len());
        }
        Err(e) => error!("{} {description} failed: {e}", client.id),
    }
}
