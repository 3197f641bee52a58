//! End-to-end tests against a real relay server.

use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use relayhub_core::{ServerCore, ServerOptions};
use relayhub_protocols::RelayError;

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(5);
const QUIET: Duration = Duration::from_millis(200);

async fn start_server(options: ServerOptions) -> (ServerCore, SocketAddr, JoinHandle<Result<(), RelayError>>) {
    let core = ServerCore::new(options);
    let listener = core.bind().await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn({
        let core = core.clone();
        async move { core.serve(listener).await }
    });
    (core, addr, server)
}

async fn start_default() -> (ServerCore, SocketAddr, JoinHandle<Result<(), RelayError>>) {
    start_server(ServerOptions::new("e2e", "127.0.0.1:0")).await
}

async fn connect(addr: SocketAddr, user: &str) -> Client {
    let url = format!("ws://{}/?user={}", addr, user);
    let (client, _response) = connect_async(url).await.unwrap();
    client
}

/// Poll until the registry holds `count` sessions.
async fn wait_for_sessions(core: &ServerCore, count: usize) {
    tokio::time::timeout(WAIT, async {
        while core.registry().len() != count {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("expected {} sessions, have {}", count, core.registry().len()));
}

/// Next text or binary message, skipping transport pings and pongs.
async fn next_data(client: &mut Client) -> Message {
    tokio::time::timeout(WAIT, async {
        loop {
            match client.next().await {
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
                Some(Ok(message)) => return message,
                other => panic!("connection ended: {:?}", other),
            }
        }
    })
    .await
    .unwrap()
}

async fn assert_quiet(client: &mut Client) {
    let result = tokio::time::timeout(QUIET, client.next()).await;
    assert!(result.is_err(), "unexpected message: {:?}", result);
}

/// Read until the server closes the connection.
async fn wait_closed(client: &mut Client) {
    tokio::time::timeout(WAIT, async {
        loop {
            match client.next().await {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return,
                Some(Ok(_)) => continue,
            }
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_text_is_broadcast_to_everyone_else() {
    let (core, addr, _server) = start_default().await;
    let mut alice = connect(addr, "alice").await;
    let mut bob = connect(addr, "bob").await;
    let mut carol = connect(addr, "carol").await;
    wait_for_sessions(&core, 3).await;

    alice.send(Message::text("hello all")).await.unwrap();

    assert_eq!(next_data(&mut bob).await.into_text().unwrap(), "hello all");
    assert_eq!(next_data(&mut carol).await.into_text().unwrap(), "hello all");
    assert_quiet(&mut alice).await;
}

#[tokio::test]
async fn test_heartbeat_is_answered_to_sender_only() {
    let (core, addr, _server) = start_default().await;
    let mut alice = connect(addr, "alice").await;
    let mut bob = connect(addr, "bob").await;
    wait_for_sessions(&core, 2).await;

    alice
        .send(Message::binary(vec![0u8, 100, 0, 0, 0, 0]))
        .await
        .unwrap();

    let reply = next_data(&mut alice).await;
    assert!(reply.is_binary());
    assert_eq!(reply.into_data(), vec![0u8, 101, 0, 0, 0, 0]);
    assert_quiet(&mut bob).await;
}

#[tokio::test]
async fn test_malformed_binary_keeps_connection_open() {
    let (core, addr, _server) = start_default().await;
    let mut alice = connect(addr, "alice").await;
    let mut bob = connect(addr, "bob").await;
    wait_for_sessions(&core, 2).await;

    alice.send(Message::binary(vec![0u8, 100, 0])).await.unwrap();
    alice.send(Message::text("after garbage")).await.unwrap();

    assert_eq!(next_data(&mut bob).await.into_text().unwrap(), "after garbage");
    assert!(core.registry().contains("alice"));
}

#[tokio::test]
async fn test_transport_ping_gets_pong() {
    let (core, addr, _server) = start_default().await;
    let mut alice = connect(addr, "alice").await;
    wait_for_sessions(&core, 1).await;

    alice.send(Message::Ping(b"tick".to_vec())).await.unwrap();

    let pong = tokio::time::timeout(WAIT, async {
        loop {
            if let Some(Ok(Message::Pong(payload))) = alice.next().await {
                return payload;
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(pong, b"tick".to_vec());
}

#[tokio::test]
async fn test_second_login_displaces_first() {
    let (core, addr, _server) = start_default().await;
    let mut first = connect(addr, "alice").await;
    wait_for_sessions(&core, 1).await;
    let first_session = core.registry().get("alice").unwrap();

    let mut second = connect(addr, "alice").await;
    wait_closed(&mut first).await;

    let current = core.registry().get("alice").unwrap();
    assert!(!current.is_same(&first_session));
    assert_eq!(core.registry().len(), 1);

    let mut bob = connect(addr, "bob").await;
    wait_for_sessions(&core, 2).await;
    bob.send(Message::text("for the new alice")).await.unwrap();
    assert_eq!(
        next_data(&mut second).await.into_text().unwrap(),
        "for the new alice"
    );
}

#[tokio::test]
async fn test_missing_user_is_rejected() {
    let (core, addr, _server) = start_default().await;

    let err = connect_async(format!("ws://{}/", addr)).await.unwrap_err();
    assert!(
        matches!(err, tungstenite::Error::Http(ref response) if response.status() == 400),
        "unexpected error: {:?}",
        err
    );
    assert!(core.registry().is_empty());
}

#[tokio::test]
async fn test_disconnect_deregisters() {
    let (core, addr, _server) = start_default().await;
    let mut alice = connect(addr, "alice").await;
    wait_for_sessions(&core, 1).await;

    alice.close(None).await.unwrap();
    wait_for_sessions(&core, 0).await;
}

#[tokio::test]
async fn test_idle_client_is_closed() {
    let options = ServerOptions::new("e2e", "127.0.0.1:0").with_read_timeout(Duration::from_millis(300));
    let (core, addr, _server) = start_server(options).await;
    let mut alice = connect(addr, "alice").await;
    wait_for_sessions(&core, 1).await;

    wait_closed(&mut alice).await;
    wait_for_sessions(&core, 0).await;
}

#[tokio::test]
async fn test_health_endpoint() {
    let (core, addr, _server) = start_default().await;
    let _alice = connect(addr, "alice").await;
    wait_for_sessions(&core, 1).await;

    let health: serde_json::Value = reqwest::get(format!("http://{}/health", addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(health["status"], "ok");
    assert_eq!(health["server_id"], "e2e");
    assert_eq!(health["connections"], 1);
}

#[tokio::test]
async fn test_shutdown_closes_every_client() {
    let (core, addr, server) = start_default().await;
    let mut alice = connect(addr, "alice").await;
    let mut bob = connect(addr, "bob").await;
    wait_for_sessions(&core, 2).await;

    let (first, second) = tokio::join!(core.shutdown(), core.shutdown());
    assert_eq!(first, 2);
    assert_eq!(second, 2);

    wait_closed(&mut alice).await;
    wait_closed(&mut bob).await;
    tokio::time::timeout(WAIT, server).await.unwrap().unwrap().unwrap();
}
