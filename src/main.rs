//! CLI for sockmap
//!
//! Subcommands:
//! - `server`: run the WebSocket server
//! - `client`: connect with a session cookie, subscribe, publish one document
//!   and print whatever arrives (useful for smoke tests)

use std::sync::Arc;

use clap::Parser;
use sockmap::config::{StoreBackend, load_config};
use sockmap::persistence::{MemoryStore, RegistryStore, SledStore};
use sockmap::session::MemorySessionStore;
use sockmap::session::cookie::DEFAULT_COOKIE_NAME;
use sockmap::transport::{ServerContext, start_websocket_server};
use sockmap::utils::error::ServerError;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "sockmap")]
enum Command {
    /// Start the WebSocket server
    Server,
    /// Run the example client (connect, subscribe, publish, listen)
    Client {
        /// WebSocket server URL to connect to
        #[arg(long, default_value = "ws://127.0.0.1:8080")]
        url: String,
        /// Session id sent in the session cookie
        #[arg(long)]
        session: String,
        /// Cookie name carrying the session id
        #[arg(long, default_value = DEFAULT_COOKIE_NAME)]
        cookie: String,
        /// Topic to subscribe and publish to
        #[arg(long, default_value = "demo")]
        topic: String,
    },
}

#[tokio::main]
async fn main() {
    let cmd = Command::parse();

    match cmd {
        Command::Server => {
            if let Err(e) = run_server().await {
                error!("Server failed: {e}");
            }
        }
        Command::Client {
            url,
            session,
            cookie,
            topic,
        } => {
            sockmap::utils::logging::init("info");
            if let Err(e) = run_client(&url, &cookie, &session, &topic).await {
                error!("Client failed: {e}");
            }
        }
    }
}

async fn run_server() -> Result<(), ServerError> {
    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            sockmap::utils::logging::init("info");
            return Err(e.into());
        }
    };
    sockmap::utils::logging::init(&config.log.level);

    let sled_store = match config.store.backend {
        StoreBackend::Sled => Some(Arc::new(SledStore::open(&config.store.path)?)),
        StoreBackend::Memory => None,
    };
    let store: Arc<dyn RegistryStore> = match &sled_store {
        Some(sled) => sled.clone() as Arc<dyn RegistryStore>,
        None => Arc::new(MemoryStore::new()),
    };
    info!("Registry store: {:?}", config.store.backend);

    let sessions = Arc::new(MemorySessionStore::seeded(
        config.session.seed.iter().cloned(),
        config.session.ttl_secs,
    ));
    info!("Seeded {} session(s)", sessions.len());

    let addr = config.address();
    let ctx = Arc::new(ServerContext::new(config, store, sessions));

    tokio::select! {
        res = start_websocket_server(addr, ctx) => {
            res?;
            error!("WebSocket server exited unexpectedly.");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received. Exiting gracefully.");
        }
    }

    if let Some(sled) = sled_store {
        sled.flush().await?;
    }
    Ok(())
}

async fn run_client(
    url: &str,
    cookie: &str,
    session: &str,
    topic: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    use futures_util::{SinkExt, StreamExt};
    use serde_json::json;
    use tokio_tungstenite::connect_async;
    use tokio_tungstenite::tungstenite::Message as WsMessage;
    use tokio_tungstenite::tungstenite::client::IntoClientRequest;
    use tokio_tungstenite::tungstenite::http::HeaderValue;
    use tokio_tungstenite::tungstenite::http::header::COOKIE;

    let mut request = url.into_client_request()?;
    request
        .headers_mut()
        .insert(COOKIE, HeaderValue::from_str(&format!("{cookie}={session}"))?);
    let (mut ws_stream, _response) = connect_async(request).await?;

    // 1. Subscribe
    let subscribe = json!({ "type": "subscribe", "topic": topic });
    ws_stream
        .send(WsMessage::Text(subscribe.to_string().into()))
        .await?;

    // 2. Publish
    let publish = json!({
        "type": "publish",
        "topics": [topic],
        "data": { "from": "sockmap client", "at": chrono::Utc::now().timestamp_millis() }
    });
    ws_stream
        .send(WsMessage::Text(publish.to_string().into()))
        .await?;

    // 3. Print incoming events until the server closes the socket
    while let Some(msg) = ws_stream.next().await {
        match msg? {
            WsMessage::Text(text) => info!("Incoming: {text}"),
            WsMessage::Close(frame) => {
                info!("Closed by server: {frame:?}");
                break;
            }
            _ => {}
        }
    }

    Ok(())
}
