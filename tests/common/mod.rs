//! Shared utilities for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use proxy_console::document::{Category, ConfigurationDocument, Resource};
use proxy_console::remote::{ConfigService, MemoryService, RemoteError};

/// Document with upstream "x" = {addrs: ["10.0.0.1:80"]}.
pub fn seeded_document() -> ConfigurationDocument {
    let mut doc = ConfigurationDocument::default();
    let mut upstream = Resource::new();
    upstream.set("addrs", vec!["10.0.0.1:80"]);
    doc.put(Category::Upstreams, "x", upstream);

    let mut other = Resource::new();
    other.set("addrs", vec!["10.0.1.1:80", "10.0.1.2:80"]);
    other.set("algo", "hash:ip");
    doc.put(Category::Upstreams, "y", other);
    doc
}

/// Wraps a `MemoryService` and holds every gated call until the test
/// releases it, so completion order is chosen by the test.
pub struct GatedService {
    pub inner: MemoryService,
    gates: Mutex<Vec<Option<oneshot::Sender<()>>>>,
    gate_fetch: AtomicBool,
}

impl GatedService {
    pub fn new(inner: MemoryService) -> Arc<Self> {
        Arc::new(Self {
            inner,
            gates: Mutex::new(Vec::new()),
            gate_fetch: AtomicBool::new(false),
        })
    }

    /// Hold fetches too (writes are always held).
    pub fn gate_fetches(&self, on: bool) {
        self.gate_fetch.store(on, Ordering::SeqCst);
    }

    /// Number of calls that reached the gate so far.
    pub fn arrived(&self) -> usize {
        self.gates.lock().unwrap().len()
    }

    pub async fn wait_for_arrivals(&self, n: usize) {
        while self.arrived() < n {
            tokio::task::yield_now().await;
        }
    }

    /// Let the `index`-th arrived call proceed.
    pub fn release(&self, index: usize) {
        if let Some(tx) = self.gates.lock().unwrap()[index].take() {
            let _ = tx.send(());
        }
    }

    async fn wait_turn(&self) {
        let (tx, rx) = oneshot::channel();
        self.gates.lock().unwrap().push(Some(tx));
        let _ = rx.await;
    }
}

#[async_trait]
impl ConfigService for GatedService {
    /// The document is read when the request arrives and delivered when
    /// released, like a slow response from a real server.
    async fn fetch(&self) -> Result<ConfigurationDocument, RemoteError> {
        let snapshot = self.inner.fetch().await;
        if self.gate_fetch.load(Ordering::SeqCst) {
            self.wait_turn().await;
        }
        snapshot
    }

    async fn upsert(
        &self,
        category: Category,
        name: &str,
        resource: &Resource,
    ) -> Result<(), RemoteError> {
        self.wait_turn().await;
        self.inner.upsert(category, name, resource).await
    }

    async fn delete(&self, category: Category, name: &str) -> Result<(), RemoteError> {
        self.wait_turn().await;
        self.inner.delete(category, name).await
    }
}

/// A request as seen by the mock admin API.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Start a programmable mock admin API on an ephemeral port.
pub async fn start_admin_api<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(RecordedRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let Some(request) = read_request(&mut socket).await else {
                            return;
                        };
                        let (status, body) = f(request).await;
                        let status_text = match status {
                            200 => "200 OK",
                            204 => "204 No Content",
                            400 => "400 Bad Request",
                            401 => "401 Unauthorized",
                            404 => "404 Not Found",
                            409 => "409 Conflict",
                            500 => "500 Internal Server Error",
                            _ => "200 OK",
                        };

                        let response_str = format!(
                            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> Option<RecordedRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let head_end = loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let path = request_line.next()?.to_string();
    let headers: Vec<(String, String)> = lines
        .filter_map(|l| l.split_once(':'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect();

    let content_length = headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);
    while buf.len() < head_end + content_length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let body = String::from_utf8_lossy(&buf[head_end..]).to_string();

    Some(RecordedRequest { method, path, headers, body })
}
