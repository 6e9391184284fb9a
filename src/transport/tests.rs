use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{sleep, timeout};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tungstenite::client::IntoClientRequest;
use tungstenite::http::HeaderValue;
use tungstenite::http::header::COOKIE;
use tungstenite::protocol::Message as WsMessage;
use tungstenite::protocol::frame::coding::CloseCode;

use super::message::ClientMessage;
use super::websocket::{ServerContext, serve};
use crate::broker::ConnectionEvent;
use crate::broker::message::{EventFrame, NOT_AUTHENTICATED, Payload};
use crate::config::Settings;
use crate::persistence::MemoryStore;
use crate::session::{MemorySessionStore, Session};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[test]
fn test_parse_client_messages() {
    let msg: ClientMessage =
        serde_json::from_value(json!({"type": "subscribe", "topic": "doc-1"})).unwrap();
    assert_eq!(
        msg.into_event(),
        Some(ConnectionEvent::Subscribe("doc-1".to_string()))
    );

    let msg: ClientMessage =
        serde_json::from_value(json!({"type": "unsubscribe", "topic": "doc-1"})).unwrap();
    assert_eq!(
        msg.into_event(),
        Some(ConnectionEvent::Unsubscribe("doc-1".to_string()))
    );

    let msg: ClientMessage = serde_json::from_value(
        json!({"type": "publish", "topics": ["a", "b"], "data": {"x": 1}}),
    )
    .unwrap();
    match msg {
        ClientMessage::Publish { topics, data } => {
            assert_eq!(topics, vec!["a", "b"]);
            assert_eq!(data, json!({"x": 1}));
        }
        other => panic!("Expected publish, got {other:?}"),
    }
}

#[test]
fn test_empty_topic_maps_to_no_event() {
    let msg: ClientMessage =
        serde_json::from_value(json!({"type": "subscribe", "topic": ""})).unwrap();
    assert_eq!(msg.into_event(), None);
}

#[test]
fn test_unknown_message_type_is_rejected() {
    let res = serde_json::from_value::<ClientMessage>(json!({"type": "login"}));
    assert!(res.is_err());
}

async fn start_server(
    settings: Settings,
) -> (SocketAddr, Arc<ServerContext>, Arc<MemorySessionStore>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let sessions = Arc::new(MemorySessionStore::seeded(["alice", "bob"], None));
    let ctx = Arc::new(ServerContext::new(
        settings,
        Arc::new(MemoryStore::new()),
        sessions.clone(),
    ));
    tokio::spawn(serve(listener, ctx.clone()));
    (addr, ctx, sessions)
}

async fn connect(addr: SocketAddr, cookie: Option<&str>) -> Result<Socket, tungstenite::Error> {
    let url = format!("ws://{addr}/");
    let mut request = url.as_str().into_client_request()?;
    if let Some(cookie) = cookie {
        request
            .headers_mut()
            .insert(COOKIE, HeaderValue::from_str(cookie).expect("header value"));
    }
    connect_async(request).await.map(|(ws, _)| ws)
}

async fn send(ws: &mut Socket, value: Value) {
    ws.send(WsMessage::Text(value.to_string().into()))
        .await
        .expect("send frame");
}

async fn next_message(ws: &mut Socket) -> WsMessage {
    timeout(Duration::from_secs(5), ws.next())
        .await
        .expect("timed out waiting for a frame")
        .expect("stream ended")
        .expect("read error")
}

async fn next_event(ws: &mut Socket) -> EventFrame {
    match next_message(ws).await {
        WsMessage::Text(text) => serde_json::from_str(&text).expect("event frame"),
        other => panic!("Expected an event frame, got {other:?}"),
    }
}

/// Poll until `topic` has exactly `n` subscribers.
async fn wait_for_subscribers(ctx: &ServerContext, topic: &str, n: usize) {
    for _ in 0..200 {
        let subscribers = ctx.broker.registry().subscribers(topic).await.unwrap();
        if subscribers.len() == n {
            return;
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!("{topic} never reached {n} subscriber(s)");
}

async fn wait_for_empty_directory(ctx: &ServerContext) {
    for _ in 0..200 {
        if ctx.directory.is_empty() {
            return;
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!("client was never removed from the directory");
}

#[tokio::test]
async fn test_upgrade_without_cookie_is_rejected() {
    let (addr, ctx, _) = start_server(Settings::default()).await;

    let err = connect(addr, None).await.expect_err("handshake should fail");
    match err {
        tungstenite::Error::Http(response) => assert_eq!(response.status(), 401),
        other => panic!("Expected HTTP rejection, got {other:?}"),
    }
    assert!(ctx.directory.is_empty());
}

#[tokio::test]
async fn test_unknown_session_is_closed() {
    let (addr, ctx, _) = start_server(Settings::default()).await;

    let mut ws = connect(addr, Some("connect.sid=mallory")).await.unwrap();
    match next_message(&mut ws).await {
        WsMessage::Close(Some(frame)) => assert_eq!(frame.code, CloseCode::Policy),
        other => panic!("Expected close frame, got {other:?}"),
    }
    assert!(ctx.directory.is_empty());
}

#[tokio::test]
async fn test_subscriber_receives_application_publish() {
    let (addr, ctx, _) = start_server(Settings::default()).await;
    let mut ws = connect(addr, Some("theme=dark; connect.sid=alice")).await.unwrap();

    send(&mut ws, json!({"type": "subscribe", "topic": "doc-1"})).await;
    wait_for_subscribers(&ctx, "doc-1", 1).await;

    let doc = json!({"id": "doc-1", "body": "hello"});
    let report = ctx.broker.publish(["doc-1"], &doc).await;
    assert_eq!(report.delivered, 1);

    let frame = next_event(&mut ws).await;
    assert_eq!(frame.event, "doc-1");
    assert_eq!(frame.payload, Payload::update(&doc));
}

#[tokio::test]
async fn test_client_publish_reaches_other_subscribers() {
    let (addr, ctx, _) = start_server(Settings::default()).await;
    let mut alice = connect(addr, Some("connect.sid=alice")).await.unwrap();
    let mut bob = connect(addr, Some("connect.sid=bob")).await.unwrap();

    send(&mut alice, json!({"type": "subscribe", "topic": "chat"})).await;
    wait_for_subscribers(&ctx, "chat", 1).await;

    send(
        &mut bob,
        json!({"type": "publish", "topics": ["chat"], "data": "hi"}),
    )
    .await;

    let frame = next_event(&mut alice).await;
    assert_eq!(frame.event, "chat");
    assert_eq!(frame.payload.data, json!("hi"));
}

#[tokio::test]
async fn test_unsubscribe_over_the_wire() {
    let (addr, ctx, _) = start_server(Settings::default()).await;
    let mut ws = connect(addr, Some("connect.sid=alice")).await.unwrap();

    send(&mut ws, json!({"type": "subscribe", "topic": "doc-1"})).await;
    send(&mut ws, json!({"type": "subscribe", "topic": "doc-1"})).await;
    send(&mut ws, json!({"type": "unsubscribe", "topic": "doc-1"})).await;
    wait_for_subscribers(&ctx, "doc-1", 1).await;

    send(&mut ws, json!({"type": "unsubscribe", "topic": "doc-1"})).await;
    wait_for_subscribers(&ctx, "doc-1", 0).await;
}

#[tokio::test]
async fn test_revoked_session_gets_failure_then_close() {
    let (addr, ctx, sessions) = start_server(Settings::default()).await;
    let mut ws = connect(addr, Some("connect.sid=alice")).await.unwrap();

    send(&mut ws, json!({"type": "subscribe", "topic": "doc-1"})).await;
    send(&mut ws, json!({"type": "subscribe", "topic": "doc-2"})).await;
    wait_for_subscribers(&ctx, "doc-1", 1).await;
    wait_for_subscribers(&ctx, "doc-2", 1).await;

    sessions.revoke("alice");
    let report = ctx.broker.publish(["doc-1"], &json!({})).await;
    assert_eq!(report.rejected, 1);

    let frame = next_event(&mut ws).await;
    assert_eq!(frame.event, "doc-1");
    assert_eq!(frame.payload, Payload::failure(NOT_AUTHENTICATED));
    assert!(matches!(next_message(&mut ws).await, WsMessage::Close(_)));

    assert!(ctx.broker.registry().subscribers("doc-2").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_disconnect_purges_subscriptions() {
    let (addr, ctx, _) = start_server(Settings::default()).await;
    let mut ws = connect(addr, Some("connect.sid=alice")).await.unwrap();

    send(&mut ws, json!({"type": "subscribe", "topic": "doc-1"})).await;
    wait_for_subscribers(&ctx, "doc-1", 1).await;

    ws.close(None).await.expect("close");
    wait_for_subscribers(&ctx, "doc-1", 0).await;
    wait_for_empty_directory(&ctx).await;
}

#[tokio::test]
async fn test_revoked_client_is_dropped_without_replying() {
    let (addr, ctx, sessions) = start_server(Settings::default()).await;
    // never read from or write to this socket after subscribing
    let mut ws = connect(addr, Some("connect.sid=alice")).await.unwrap();

    send(&mut ws, json!({"type": "subscribe", "topic": "doc-1"})).await;
    wait_for_subscribers(&ctx, "doc-1", 1).await;
    assert_eq!(ctx.directory.len(), 1);

    sessions.revoke("alice");
    let report = ctx.broker.publish(["doc-1"], &json!({})).await;
    assert_eq!(report.rejected, 1);

    wait_for_empty_directory(&ctx).await;
    assert!(ctx.broker.registry().subscribers("doc-1").await.unwrap().is_empty());
    drop(ws);
}

#[tokio::test]
async fn test_url_encoded_session_cookie_is_decoded() {
    let (addr, ctx, sessions) = start_server(Settings::default()).await;
    sessions.insert("s:carol.sig", Session::authenticated());

    let mut ws = connect(addr, Some("connect.sid=s%3Acarol.sig")).await.unwrap();
    send(&mut ws, json!({"type": "subscribe", "topic": "doc-1"})).await;
    wait_for_subscribers(&ctx, "doc-1", 1).await;

    let id = ctx.broker.registry().subscribers("doc-1").await.unwrap()[0].clone();
    let client = ctx.directory.get(&id).expect("registered");
    assert_eq!(client.session_id, "s:carol.sig");
}
