#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;

use linechat::error::ServerError;
use linechat::{Registry, Server, ServerConfig, ShutdownSignal};

pub const POLL: Duration = Duration::from_millis(20);
pub const WAIT: Duration = Duration::from_secs(3);

/// A server running on an ephemeral loopback port
pub struct TestServer {
    pub addr: SocketAddr,
    pub registry: Arc<Registry>,
    pub shutdown: ShutdownSignal,
    pub task: JoinHandle<Result<(), ServerError>>,
}

pub async fn start_server(capacity: usize, shutdown_on_empty: bool) -> TestServer {
    let config = ServerConfig {
        bind: "127.0.0.1".to_string(),
        port: 0,
        capacity,
        shutdown_on_empty,
        poll_interval_ms: POLL.as_millis() as u64,
        drain_timeout_ms: 500,
    };
    let server = Server::new(config).bind().await.expect("bind test server");
    let addr = server.local_addr().expect("local addr");
    let registry = server.registry();
    let shutdown = server.shutdown_signal();
    let task = tokio::spawn(server.run());

    TestServer {
        addr,
        registry,
        shutdown,
        task,
    }
}

/// Poll until the registry holds exactly `n` sessions
pub async fn wait_for_sessions(registry: &Registry, n: usize) {
    let deadline = tokio::time::Instant::now() + WAIT;
    while tokio::time::Instant::now() < deadline {
        if registry.len().await == n {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("registry never reached {} sessions (has {})", n, registry.len().await);
}

/// A protocol-level client with no session logic
pub struct TestClient {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl TestClient {
    pub async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.expect("connect");
        let (reader, writer) = stream.into_split();
        Self {
            lines: BufReader::new(reader).lines(),
            writer,
        }
    }

    pub async fn register(addr: SocketAddr, name: &str) -> Self {
        let mut client = Self::connect(addr).await;
        client.send(&format!("USER:{}", name)).await;
        client
    }

    pub async fn send(&mut self, text: &str) {
        self.writer
            .write_all(format!("{}\n", text).as_bytes())
            .await
            .expect("send");
    }

    /// Next line from the server, `None` on close
    pub async fn next_line(&mut self) -> Option<String> {
        tokio::time::timeout(WAIT, self.lines.next_line())
            .await
            .expect("timed out waiting for a line")
            .expect("read error")
    }

    /// Assert nothing arrives for `period`
    pub async fn expect_silence(&mut self, period: Duration) {
        if let Ok(line) = tokio::time::timeout(period, self.lines.next_line()).await {
            panic!("expected silence, got {:?}", line);
        }
    }
}
