//! Shared utilities for integration and load testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};

use relay_proxy::config::ProxyConfig;
use relay_proxy::http::{codec, Limits, ProxyRequest, ProxyResponse};
use relay_proxy::net::Listener;
use relay_proxy::proxy::{ProxyServer, ProxyState};
use relay_proxy::Shutdown;

/// A scripted origin server.
pub struct MockOrigin {
    pub addr: SocketAddr,
    /// Connections accepted so far (one per proxy dial).
    pub connections: Arc<AtomicUsize>,
    /// Requests answered so far, across all connections.
    pub requests: Arc<AtomicU64>,
}

impl MockOrigin {
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::SeqCst)
    }
}

/// Reply produced by a mock origin: raw bytes, and whether to hang up afterwards.
pub struct Reply {
    pub bytes: Vec<u8>,
    pub hang_up: bool,
}

impl Reply {
    pub fn keep(bytes: Vec<u8>) -> Self {
        Self { bytes, hang_up: false }
    }

    pub fn then_close(bytes: Vec<u8>) -> Self {
        Self { bytes, hang_up: true }
    }
}

/// Start an origin that answers each request with `respond(n, &request)`,
/// where `n` counts requests from 1 across all connections.
pub async fn start_origin<F>(respond: F) -> MockOrigin
where
    F: Fn(u64, &ProxyRequest) -> Reply + Send + Sync + 'static,
{
    start_origin_at("127.0.0.1:0".parse().unwrap(), respond).await
}

/// Like [`start_origin`], bound to a fixed address.
pub async fn start_origin_at<F>(addr: SocketAddr, respond: F) -> MockOrigin
where
    F: Fn(u64, &ProxyRequest) -> Reply + Send + Sync + 'static,
{
    let listener = TcpListener::bind(addr).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let connections = Arc::new(AtomicUsize::new(0));
    let requests = Arc::new(AtomicU64::new(0));
    let respond = Arc::new(respond);

    let (conns, reqs) = (connections.clone(), requests.clone());
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            conns.fetch_add(1, Ordering::SeqCst);
            let respond = respond.clone();
            let reqs = reqs.clone();
            tokio::spawn(async move {
                let (read_half, mut write_half) = socket.into_split();
                let mut reader = BufReader::new(read_half);
                while let Ok(request) = codec::read_request(&mut reader, Limits::default()).await {
                    let n = reqs.fetch_add(1, Ordering::SeqCst) + 1;
                    let reply = respond(n, &request);
                    if write_half.write_all(&reply.bytes).await.is_err() || reply.hang_up {
                        break;
                    }
                }
            });
        }
    });

    MockOrigin {
        addr,
        connections,
        requests,
    }
}

/// `200 OK` with a content-length body.
pub fn ok(body: &str) -> Vec<u8> {
    format!(
        "HTTP/1.1 200 OK\r\nContent-Length: {}\r\n\r\n{}",
        body.len(),
        body
    )
    .into_bytes()
}

/// `200 OK` with a chunked body.
pub fn ok_chunked(body: &str) -> Vec<u8> {
    format!(
        "HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n{:x}\r\n{}\r\n0\r\n\r\n",
        body.len(),
        body
    )
    .into_bytes()
}

/// A running proxy under test.
pub struct TestProxy {
    pub addr: SocketAddr,
    pub state: ProxyState,
    pub shutdown: Shutdown,
}

/// Config pointing at `origin` with the given pool capacity.
pub fn config_for(origin: SocketAddr, capacity: usize) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.origin.address = origin.to_string();
    config.origin.connect_timeout_ms = 1_000;
    config.pool.capacity = capacity;
    config
}

/// Start a proxy on an ephemeral port.
pub async fn start_proxy(config: ProxyConfig) -> TestProxy {
    let server = ProxyServer::new(config.clone()).unwrap();
    let state = server.state().clone();
    let listener = Listener::bind(&config.listener).await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        server.run(listener, server_shutdown).await;
    });

    TestProxy {
        addr,
        state,
        shutdown,
    }
}

/// A raw HTTP/1.x client connection to the proxy.
pub struct RawClient {
    pub reader: BufReader<OwnedReadHalf>,
    pub writer: OwnedWriteHalf,
}

impl RawClient {
    pub async fn connect(addr: SocketAddr) -> Self {
        let (read_half, writer) = TcpStream::connect(addr).await.unwrap().into_split();
        Self {
            reader: BufReader::new(read_half),
            writer,
        }
    }

    pub async fn send(&mut self, raw: &[u8]) {
        self.writer.write_all(raw).await.unwrap();
    }

    /// Send a request and read the response to it.
    pub async fn exchange(&mut self, raw: &[u8], method: http::Method) -> ProxyResponse {
        self.send(raw).await;
        codec::read_response(&mut self.reader, &method, Limits::default())
            .await
            .unwrap()
    }

    /// Everything the proxy still sends before closing.
    pub async fn drain(&mut self) -> Vec<u8> {
        use tokio::io::AsyncReadExt;
        let mut rest = Vec::new();
        let _ = self.reader.read_to_end(&mut rest).await;
        rest
    }
}

/// An address nobody listens on.
pub async fn unused_addr() -> SocketAddr {
    TcpListener::bind("127.0.0.1:0")
        .await
        .unwrap()
        .local_addr()
        .unwrap()
}
