//! Admission, capacity and shutdown over real loopback sockets.

mod common;

use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use common::{start_server, wait_for_sessions, TestClient, POLL, WAIT};
use linechat::server::{ClientHandler, HandlerContext, HandlerState};
use linechat::{ChatSession, DisplayName, MemorySurface, Registry, Renderer, SessionEnd, ShutdownSignal};

#[tokio::test]
async fn test_eleventh_client_rejected() {
    let server = start_server(10, false).await;

    let mut members = Vec::new();
    for i in 0..10 {
        members.push(TestClient::register(server.addr, &format!("u{}", i)).await);
    }
    wait_for_sessions(&server.registry, 10).await;

    let mut extra = TestClient::register(server.addr, "extra").await;
    assert_eq!(extra.next_line().await.as_deref(), Some("SERVER:FULL"));
    assert_eq!(extra.next_line().await, None);
    assert_eq!(server.registry.len().await, 10);

    members[0].send("still ten").await;
    for member in members.iter_mut().skip(1) {
        let line = member.next_line().await.unwrap();
        assert!(line.starts_with("127.0.0.1       [u0   ] << still ten"));
    }
    members[0].expect_silence(Duration::from_millis(100)).await;
}

#[tokio::test]
async fn test_slot_frees_after_leave() {
    let server = start_server(2, false).await;

    let mut first = TestClient::register(server.addr, "one").await;
    let _second = TestClient::register(server.addr, "two").await;
    wait_for_sessions(&server.registry, 2).await;

    first.send("bye").await;
    assert_eq!(first.next_line().await, None);
    wait_for_sessions(&server.registry, 1).await;

    let mut third = TestClient::register(server.addr, "three").await;
    wait_for_sessions(&server.registry, 2).await;
    third.expect_silence(Duration::from_millis(100)).await;
}

#[tokio::test]
async fn test_last_leave_stops_server() {
    let server = start_server(10, true).await;

    let client = TestClient::register(server.addr, "solo").await;
    wait_for_sessions(&server.registry, 1).await;
    assert!(!server.shutdown.is_triggered());

    // Drop without the sentinel: the close alone ends the session
    drop(client);

    let result = tokio::time::timeout(WAIT, server.task)
        .await
        .expect("server did not stop")
        .unwrap();
    assert!(result.is_ok());
    assert!(server.shutdown.is_triggered());
    assert!(server.registry.is_empty().await);

    // The listener is gone with the server
    assert!(TcpStream::connect(server.addr).await.is_err());
}

#[tokio::test]
async fn test_keep_alive_survives_empty_registry() {
    let server = start_server(10, false).await;

    let mut client = TestClient::register(server.addr, "solo").await;
    wait_for_sessions(&server.registry, 1).await;
    client.send("bye").await;
    assert_eq!(client.next_line().await, None);
    wait_for_sessions(&server.registry, 0).await;

    tokio::time::sleep(POLL * 5).await;
    assert!(!server.shutdown.is_triggered());
    assert!(!server.task.is_finished());

    let _again = TestClient::register(server.addr, "back").await;
    wait_for_sessions(&server.registry, 1).await;

    server.shutdown.trigger();
    let result = tokio::time::timeout(WAIT, server.task).await.unwrap().unwrap();
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_rejected_session_reports_rejection() {
    let server = start_server(1, false).await;

    let _member = TestClient::register(server.addr, "full").await;
    wait_for_sessions(&server.registry, 1).await;

    let (_input_tx, input) = mpsc::channel(8);
    let (render, render_task) = Renderer::spawn(MemorySurface::new(10));
    let stream = TcpStream::connect(server.addr).await.unwrap();

    let end = tokio::time::timeout(
        WAIT,
        ChatSession::new(DisplayName::new("late"), POLL).run(stream, input, render),
    )
    .await
    .expect("session did not end")
    .unwrap();
    assert_eq!(end, SessionEnd::Rejected);

    let surface = render_task.await.unwrap().unwrap();
    assert!(surface
        .history()
        .iter()
        .any(|line| line.contains("connection rejected")));
    assert_eq!(server.registry.len().await, 1);
}

#[tokio::test]
async fn test_session_sees_server_stop() {
    let server = start_server(10, true).await;

    let (input_tx, input) = mpsc::channel(8);
    let (render, render_task) = Renderer::spawn(MemorySurface::new(10));
    let stream = TcpStream::connect(server.addr).await.unwrap();
    let session = tokio::spawn(ChatSession::new(DisplayName::new("stay"), POLL).run(stream, input, render));

    wait_for_sessions(&server.registry, 1).await;
    server.shutdown.trigger();

    let end = tokio::time::timeout(WAIT, session)
        .await
        .expect("session did not end")
        .unwrap()
        .unwrap();
    assert_eq!(end, SessionEnd::ServerClosed);
    drop(input_tx);

    let surface = render_task.await.unwrap().unwrap();
    assert!(surface
        .history()
        .iter()
        .any(|line| line.contains("server closed the connection")));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_simultaneous_last_leaves_fire_shutdown_once() {
    for _ in 0..10 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let ctx = HandlerContext {
            registry: Arc::new(Registry::new(10)),
            shutdown: ShutdownSignal::new(),
            shutdown_on_empty: true,
            poll_interval: POLL,
            drain_timeout: WAIT,
        };

        let mut clients = Vec::new();
        let mut handlers = Vec::new();
        for name in ["one", "two"] {
            clients.push(TestClient::register(addr, name).await);
            let (stream, peer) = listener.accept().await.unwrap();
            handlers.push(tokio::spawn(ClientHandler::new(peer, ctx.clone()).run(stream)));
        }
        wait_for_sessions(&ctx.registry, 2).await;

        let (first, second) = clients.split_at_mut(1);
        tokio::join!(first[0].send("bye"), second[0].send("bye"));

        let mut fired = 0;
        for handler in handlers {
            let exit = tokio::time::timeout(WAIT, handler).await.unwrap().unwrap();
            assert_eq!(exit.state, HandlerState::Closed);
            if exit.fired_shutdown {
                fired += 1;
            }
        }
        assert_eq!(fired, 1);
        assert!(ctx.shutdown.is_triggered());
        assert!(ctx.registry.is_empty().await);
    }
}
