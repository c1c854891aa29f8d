//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use edge_proxy::config::parse_config;
use edge_proxy::net::Listener;
use edge_proxy::{ProxyServer, Shutdown};
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::header::HeaderMap;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Response, Version};
use hyper_util::rt::TokioIo;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// A request as seen by a mock backend.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub uri: String,
    pub version: Version,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// What a recording backend has seen so far.
#[derive(Debug, Default)]
pub struct BackendLog {
    pub connections: AtomicUsize,
    pub requests: Mutex<Vec<RecordedRequest>>,
}

impl BackendLog {
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

/// Start a keep-alive HTTP/1.1 backend that records every request and
/// answers `200` with `name` in the `x-backend` header and the request body echoed.
pub async fn start_recording_backend(addr: SocketAddr, name: &'static str) -> Arc<BackendLog> {
    let listener = TcpListener::bind(addr).await.unwrap();
    let log = Arc::new(BackendLog::default());
    let accept_log = log.clone();

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            accept_log.connections.fetch_add(1, Ordering::SeqCst);
            let log = accept_log.clone();

            tokio::spawn(async move {
                let service = service_fn(move |request: hyper::Request<hyper::body::Incoming>| {
                    let log = log.clone();
                    async move {
                        let (parts, body) = request.into_parts();
                        let body = body.collect().await.unwrap().to_bytes();
                        log.requests.lock().unwrap().push(RecordedRequest {
                            method: parts.method.to_string(),
                            uri: parts.uri.to_string(),
                            version: parts.version,
                            headers: parts.headers,
                            body: body.clone(),
                        });

                        let response = Response::builder()
                            .header("x-backend", name)
                            .body(Full::new(body))
                            .unwrap();
                        Ok::<_, Infallible>(response)
                    }
                });

                let _ = http1::Builder::new()
                    .serve_connection(TokioIo::new(socket), service)
                    .await;
            });
        }
    });

    log
}

/// Start a raw backend that answers every connection with a fixed body and closes it.
pub async fn start_mock_backend(addr: SocketAddr, response: &'static str) {
    let listener = TcpListener::bind(addr).await.unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let response_str = format!(
                    "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    response.len(),
                    response
                );
                let _ = socket.write_all(response_str.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });
}

/// Start a proxy from a TOML configuration; it runs until `shutdown` is triggered.
pub async fn start_proxy(config: &str) -> (SocketAddr, Shutdown) {
    let config = parse_config(config).unwrap();
    let addr: SocketAddr = config.listen_address().parse().unwrap();

    let server = ProxyServer::new(&config).unwrap();
    let listener = Listener::bind(addr, 64).await.unwrap();
    let shutdown = Shutdown::new();
    let sender = shutdown.sender();

    tokio::spawn(async move {
        let _ = server.run(listener, sender).await;
    });

    (addr, shutdown)
}

/// Write a raw request and read until the proxy closes the connection.
pub async fn raw_exchange(addr: SocketAddr, request: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut response = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut response))
        .await
        .expect("proxy did not close the connection")
        .unwrap();
    String::from_utf8_lossy(&response).to_lowercase()
}

/// HTTP client that neither pools nor goes through a system proxy.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
